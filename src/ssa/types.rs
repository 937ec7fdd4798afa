//! Static types carried by SSA values.
//!
//! The engine only needs a small type model: enough to tell primitives from objects when a
//! member is read, to find the callee of a call, and to compute the signature of a finished
//! function. Anything the engine can not decide is [`SsaType::Any`].

use std::fmt;

use crate::ssa::{BlueprintId, FunctionId};

/// Type of an SSA value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SsaType {
    /// Unknown or dynamic type.
    #[default]
    Any,

    /// The null / nil / None value.
    Null,

    /// Boolean.
    Boolean,

    /// Integer or floating point number.
    Number,

    /// Text string.
    String,

    /// Byte string.
    Bytes,

    /// A caught error or exception.
    Error,

    /// An untyped object or map.
    Object,

    /// A reference whose pointee may be mutated by a callee.
    Pointer,

    /// A function value. Calls through such a value bind the function's free values.
    Function(FunctionId),

    /// An instance of a blueprint.
    Blueprint(BlueprintId),

    /// Multiple return values.
    Tuple(Vec<SsaType>),
}

impl SsaType {
    /// Returns `true` for the dynamic type.
    #[must_use]
    pub const fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Returns `true` if values of this type have no members.
    #[must_use]
    pub const fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Null | Self::Boolean | Self::Number | Self::String | Self::Bytes
        )
    }

    /// Returns the function this type refers to, if it is a function type.
    #[must_use]
    pub const fn function(&self) -> Option<FunctionId> {
        match self {
            Self::Function(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the blueprint this type refers to, if it is a blueprint instance.
    #[must_use]
    pub const fn blueprint(&self) -> Option<BlueprintId> {
        match self {
            Self::Blueprint(id) => Some(*id),
            _ => None,
        }
    }

    /// Common type of two values meeting at a merge point.
    ///
    /// Equal types stay, everything else widens to [`SsaType::Any`].
    #[must_use]
    pub fn unify(&self, other: &Self) -> Self {
        if self == other {
            self.clone()
        } else {
            Self::Any
        }
    }

    /// Common type of a sequence of types, [`SsaType::Any`] for an empty sequence.
    pub fn unify_all<'a>(types: impl IntoIterator<Item = &'a SsaType>) -> Self {
        let mut iter = types.into_iter();
        match iter.next() {
            Some(first) => iter.fold(first.clone(), |acc, ty| acc.unify(ty)),
            None => Self::Any,
        }
    }
}

impl fmt::Display for SsaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Null => write!(f, "null"),
            Self::Boolean => write!(f, "boolean"),
            Self::Number => write!(f, "number"),
            Self::String => write!(f, "string"),
            Self::Bytes => write!(f, "bytes"),
            Self::Error => write!(f, "error"),
            Self::Object => write!(f, "object"),
            Self::Pointer => write!(f, "pointer"),
            Self::Function(id) => write!(f, "fn {id}"),
            Self::Blueprint(id) => write!(f, "{id}"),
            Self::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}
