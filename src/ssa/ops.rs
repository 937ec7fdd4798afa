//! Operators of `BinOp` and `UnOp` instructions.

use strum::{EnumIter, IntoStaticStr};

use crate::ssa::SsaType;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum BinaryOp {
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b`
    Div,
    /// `a % b`
    Mod,
    /// `a << b`
    Shl,
    /// `a >> b`
    Shr,
    /// `a & b`
    BitAnd,
    /// `a | b`
    BitOr,
    /// `a ^ b`
    Xor,
    /// `a &^ b`
    AndNot,
    /// `a && b`
    LogicAnd,
    /// `a || b`
    LogicOr,
    /// `a == b`
    Eq,
    /// `a != b`
    NotEq,
    /// `a < b`
    Lt,
    /// `a <= b`
    LtEq,
    /// `a > b`
    Gt,
    /// `a >= b`
    GtEq,
    /// `a in b`
    In,
    /// `a <- b`
    Send,
}

impl BinaryOp {
    /// Returns `true` for operators producing a boolean.
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq
                | Self::NotEq
                | Self::Lt
                | Self::LtEq
                | Self::Gt
                | Self::GtEq
                | Self::In
                | Self::LogicAnd
                | Self::LogicOr
        )
    }

    /// Static type of `lhs op rhs`.
    #[must_use]
    pub fn result_type(self, lhs: &SsaType, rhs: &SsaType) -> SsaType {
        if self.is_comparison() {
            return SsaType::Boolean;
        }
        match self {
            Self::Send => SsaType::Any,
            Self::Add if *lhs == SsaType::String || *rhs == SsaType::String => SsaType::String,
            _ if *lhs == SsaType::Number && *rhs == SsaType::Number => SsaType::Number,
            _ => SsaType::Any,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum UnaryOp {
    /// `!a`
    Not,
    /// `-a`
    Neg,
    /// `+a`
    Plus,
    /// `^a` / `~a`
    BitwiseNot,
    /// `<-a`
    Receive,
}

impl UnaryOp {
    /// Static type of `op operand`.
    #[must_use]
    pub fn result_type(self, operand: &SsaType) -> SsaType {
        match self {
            Self::Not => SsaType::Boolean,
            Self::Neg | Self::Plus | Self::BitwiseNot if *operand == SsaType::Number => {
                SsaType::Number
            }
            _ => SsaType::Any,
        }
    }
}
