//! Constant values and constant folding.
//!
//! `Const` instructions carry a [`ConstValue`]. When folding is enabled in the
//! [`crate::BuildConfig`], the builder evaluates operators on constant operands with
//! [`ConstValue::fold_binary`] / [`ConstValue::fold_unary`] instead of emitting the operation.
//! Folding is conservative: whenever the result depends on language specific semantics
//! (mixed type equality, division by zero, overflowing shifts) nothing is folded.

use std::fmt;

use crate::ssa::{BinaryOp, SsaType, UnaryOp};

/// Constant values that can appear in SSA form.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    /// Null / nil / None.
    Null,

    /// Boolean constant.
    Bool(bool),

    /// 64-bit signed integer.
    Int(i64),

    /// 64-bit floating point.
    Float(f64),

    /// String constant.
    Str(String),
}

impl ConstValue {
    /// Returns `true` if this is the null constant.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` if this is a boolean constant.
    #[must_use]
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    /// Returns the constant as an i64 if applicable.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the constant as a string slice if applicable.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the truthiness of the constant.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(v) => Some(*v != 0),
            Self::Null => Some(false),
            Self::Str(s) => Some(!s.is_empty()),
            Self::Float(_) => None,
        }
    }

    /// Static type of the constant.
    #[must_use]
    pub const fn ty(&self) -> SsaType {
        match self {
            Self::Null => SsaType::Null,
            Self::Bool(_) => SsaType::Boolean,
            Self::Int(_) | Self::Float(_) => SsaType::Number,
            Self::Str(_) => SsaType::String,
        }
    }

    /// Text used when the constant names a member (`obj.key`, `obj[0]`).
    #[must_use]
    pub fn key_name(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Evaluates `self op rhs`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fold_binary(&self, op: BinaryOp, rhs: &Self) -> Option<Self> {
        match (self, rhs) {
            (Self::Int(a), Self::Int(b)) => fold_int(op, *a, *b),
            (Self::Float(a), Self::Float(b)) => fold_float(op, *a, *b),
            (Self::Int(a), Self::Float(b)) => fold_float(op, *a as f64, *b),
            (Self::Float(a), Self::Int(b)) => fold_float(op, *a, *b as f64),
            (Self::Str(a), Self::Str(b)) => match op {
                BinaryOp::Add => Some(Self::Str(format!("{a}{b}"))),
                BinaryOp::Eq => Some(Self::Bool(a == b)),
                BinaryOp::NotEq => Some(Self::Bool(a != b)),
                BinaryOp::Lt => Some(Self::Bool(a < b)),
                BinaryOp::LtEq => Some(Self::Bool(a <= b)),
                BinaryOp::Gt => Some(Self::Bool(a > b)),
                BinaryOp::GtEq => Some(Self::Bool(a >= b)),
                BinaryOp::In => Some(Self::Bool(b.contains(a.as_str()))),
                _ => None,
            },
            (Self::Bool(a), Self::Bool(b)) => match op {
                BinaryOp::LogicAnd | BinaryOp::BitAnd => Some(Self::Bool(*a && *b)),
                BinaryOp::LogicOr | BinaryOp::BitOr => Some(Self::Bool(*a || *b)),
                BinaryOp::Xor | BinaryOp::NotEq => Some(Self::Bool(a != b)),
                BinaryOp::Eq => Some(Self::Bool(a == b)),
                _ => None,
            },
            (Self::Null, Self::Null) => match op {
                BinaryOp::Eq => Some(Self::Bool(true)),
                BinaryOp::NotEq => Some(Self::Bool(false)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Evaluates `op self`.
    #[must_use]
    pub fn fold_unary(&self, op: UnaryOp) -> Option<Self> {
        match (op, self) {
            (UnaryOp::Not, Self::Bool(b)) => Some(Self::Bool(!b)),
            (UnaryOp::Not, Self::Int(v)) => Some(Self::Bool(*v == 0)),
            (UnaryOp::Neg, Self::Int(v)) => v.checked_neg().map(Self::Int),
            (UnaryOp::Neg, Self::Float(v)) => Some(Self::Float(-v)),
            (UnaryOp::Plus, Self::Int(_) | Self::Float(_)) => Some(self.clone()),
            (UnaryOp::BitwiseNot, Self::Int(v)) => Some(Self::Int(!v)),
            _ => None,
        }
    }
}

fn fold_int(op: BinaryOp, a: i64, b: i64) -> Option<ConstValue> {
    let value = match op {
        BinaryOp::Add => ConstValue::Int(a.wrapping_add(b)),
        BinaryOp::Sub => ConstValue::Int(a.wrapping_sub(b)),
        BinaryOp::Mul => ConstValue::Int(a.wrapping_mul(b)),
        BinaryOp::Div => ConstValue::Int(a.checked_div(b)?),
        BinaryOp::Mod => ConstValue::Int(a.checked_rem(b)?),
        BinaryOp::Shl => ConstValue::Int(a.checked_shl(u32::try_from(b).ok()?)?),
        BinaryOp::Shr => ConstValue::Int(a.checked_shr(u32::try_from(b).ok()?)?),
        BinaryOp::BitAnd => ConstValue::Int(a & b),
        BinaryOp::BitOr => ConstValue::Int(a | b),
        BinaryOp::Xor => ConstValue::Int(a ^ b),
        BinaryOp::AndNot => ConstValue::Int(a & !b),
        BinaryOp::LogicAnd => ConstValue::Bool(a != 0 && b != 0),
        BinaryOp::LogicOr => ConstValue::Bool(a != 0 || b != 0),
        BinaryOp::Eq => ConstValue::Bool(a == b),
        BinaryOp::NotEq => ConstValue::Bool(a != b),
        BinaryOp::Lt => ConstValue::Bool(a < b),
        BinaryOp::LtEq => ConstValue::Bool(a <= b),
        BinaryOp::Gt => ConstValue::Bool(a > b),
        BinaryOp::GtEq => ConstValue::Bool(a >= b),
        BinaryOp::In | BinaryOp::Send => return None,
    };
    Some(value)
}

#[allow(clippy::float_cmp)]
fn fold_float(op: BinaryOp, a: f64, b: f64) -> Option<ConstValue> {
    let value = match op {
        BinaryOp::Add => ConstValue::Float(a + b),
        BinaryOp::Sub => ConstValue::Float(a - b),
        BinaryOp::Mul => ConstValue::Float(a * b),
        BinaryOp::Div if b != 0.0 => ConstValue::Float(a / b),
        BinaryOp::Eq => ConstValue::Bool(a == b),
        BinaryOp::NotEq => ConstValue::Bool(a != b),
        BinaryOp::Lt => ConstValue::Bool(a < b),
        BinaryOp::LtEq => ConstValue::Bool(a <= b),
        BinaryOp::Gt => ConstValue::Bool(a > b),
        BinaryOp::GtEq => ConstValue::Bool(a >= b),
        _ => return None,
    };
    Some(value)
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for ConstValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConstValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ConstValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for ConstValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ConstValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ConstValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}
