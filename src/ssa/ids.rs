//! Typed handles into the [`crate::ssa::Program`] arenas.
//!
//! Every cross reference in the IR (operands, users, phi edges, predecessor and successor
//! lists, scope parents) is one of these handles. They are plain indices, cheap to copy and
//! compare, and carry no semantic information. A handle is only meaningful for the program
//! that created it.
//!
//! [`GlobalId`] is different: it is allocated by the shared
//! [`crate::IdAllocator`] and stays unique across all programs built with the same
//! [`crate::ProgramContext`].

use std::fmt;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(usize);

        impl $name {
            /// Creates a new handle from an arena index.
            #[must_use]
            pub const fn new(index: usize) -> Self {
                Self(index)
            }

            /// Returns the underlying arena index.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Handle of an instruction. Value-kind instructions are referenced by their users
    /// through this id, terminators use it for bookkeeping only.
    ValueId,
    "v"
);

arena_id!(
    /// Handle of a basic block.
    BlockId,
    "b"
);

arena_id!(
    /// Handle of a function (top-level or closure).
    FunctionId,
    "f"
);

arena_id!(
    /// Handle of a lexical scope.
    ScopeId,
    "s"
);

arena_id!(
    /// Handle of a declared name inside a lexical scope.
    SymbolId,
    "sym"
);

arena_id!(
    /// Handle of one version of a symbol, bound in one block.
    VariableId,
    "var"
);

arena_id!(
    /// Handle of a blueprint (class / interface descriptor).
    BlueprintId,
    "bp"
);

/// Globally unique instruction id handed out by the [`crate::IdAllocator`].
///
/// Persistence layers key their caches on this id; it is never reused and never assumed to
/// be dense.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId(u64);

impl GlobalId {
    /// Creates a new global id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
