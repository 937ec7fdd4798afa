//! Lexical scopes, symbols and variable versions.
//!
//! - A [`Scope`] is one lexical block. It maps names to the [`Symbol`]s declared in it and
//!   links to the enclosing scope of the same function.
//! - A [`Symbol`] is one declaration: an explicit local, an implicit function-level name
//!   created by the first write or read of an unknown name, or a synthesized member name
//!   (`#<object>.<key>`).
//! - A [`Variable`] is one version of a symbol, bound to a value in one block. Versions are
//!   linked to the version they replaced in the same block.
//!
//! Name lookup walks the scope chain; which *value* a symbol has at a program point is
//! decided by the read protocol over the control-flow graph.

use std::collections::HashMap;

use crate::ssa::{BlockId, FunctionId, ScopeId, SymbolId, ValueId, VariableId};

/// A lexical scope.
#[derive(Debug, Clone)]
pub struct Scope {
    pub(crate) id: ScopeId,
    pub(crate) parent: Option<ScopeId>,
    pub(crate) function: FunctionId,
    pub(crate) symbols: HashMap<String, SymbolId>,
}

impl Scope {
    pub(crate) fn new(id: ScopeId, parent: Option<ScopeId>, function: FunctionId) -> Self {
        Self {
            id,
            parent,
            function,
            symbols: HashMap::new(),
        }
    }

    /// Returns the scope id.
    #[must_use]
    pub const fn id(&self) -> ScopeId {
        self.id
    }

    /// Returns the enclosing scope of the same function.
    #[must_use]
    pub const fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    /// Returns the owning function.
    #[must_use]
    pub const fn function(&self) -> FunctionId {
        self.function
    }

    /// Returns the symbol declared under `name` in this scope (not its parents).
    #[must_use]
    pub fn symbol(&self, name: &str) -> Option<SymbolId> {
        self.symbols.get(name).copied()
    }
}

/// How a symbol came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// Explicitly declared in a lexical scope (`let x`, `var x`, a parameter).
    Declared,

    /// Created in the function's root scope by the first use of an unknown name.
    Implicit,

    /// A member of an object, named `#<object>.<key>`.
    Member {
        /// The object
        object: ValueId,
        /// The member key
        key: ValueId,
    },
}

/// A named declaration.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub(crate) id: SymbolId,
    pub(crate) name: String,
    pub(crate) scope: ScopeId,
    pub(crate) function: FunctionId,
    pub(crate) kind: SymbolKind,
    pub(crate) versions: u32,
}

impl Symbol {
    /// Returns the symbol id.
    #[must_use]
    pub const fn id(&self) -> SymbolId {
        self.id
    }

    /// Returns the declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declaring scope.
    #[must_use]
    pub const fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Returns the owning function.
    #[must_use]
    pub const fn function(&self) -> FunctionId {
        self.function
    }

    /// Returns how the symbol was declared.
    #[must_use]
    pub const fn kind(&self) -> SymbolKind {
        self.kind
    }

    /// Returns the number of versions created so far.
    #[must_use]
    pub const fn versions(&self) -> u32 {
        self.versions
    }

    /// Returns `true` for synthesized member symbols.
    #[must_use]
    pub const fn is_member(&self) -> bool {
        matches!(self.kind, SymbolKind::Member { .. })
    }
}

/// How a variable version was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingOrigin {
    /// An assignment by the front end or a call-site side effect.
    Write,

    /// The memoized result of a read at block entry.
    Read,
}

/// One version of a symbol.
#[derive(Debug, Clone)]
pub struct Variable {
    pub(crate) id: VariableId,
    pub(crate) symbol: SymbolId,
    pub(crate) version: u32,
    pub(crate) value: ValueId,
    pub(crate) block: BlockId,
    pub(crate) local: bool,
    pub(crate) origin: BindingOrigin,
    pub(crate) prev: Option<VariableId>,
}

impl Variable {
    /// Returns the variable id.
    #[must_use]
    pub const fn id(&self) -> VariableId {
        self.id
    }

    /// Returns the symbol this is a version of.
    #[must_use]
    pub const fn symbol(&self) -> SymbolId {
        self.symbol
    }

    /// Returns the version number, starting at 1.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Returns the bound value.
    #[must_use]
    pub const fn value(&self) -> ValueId {
        self.value
    }

    /// Returns the block the version is bound in.
    #[must_use]
    pub const fn block(&self) -> BlockId {
        self.block
    }

    /// Returns `true` if the version was declared in the current lexical scope rather than
    /// written through to an enclosing declaration.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        self.local
    }

    /// Returns how the version was produced.
    #[must_use]
    pub const fn origin(&self) -> BindingOrigin {
        self.origin
    }

    /// Returns the version this one replaced in the same block.
    #[must_use]
    pub const fn prev(&self) -> Option<VariableId> {
        self.prev
    }
}
