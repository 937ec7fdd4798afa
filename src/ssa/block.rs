//! Basic blocks of the SSA IR.
//!
//! A block holds its phi nodes, its ordered instruction list, its predecessor and successor
//! lists, and the two pieces of state that drive on-demand SSA construction:
//!
//! - **sealed** - the predecessor set is final. Reads in an unsealed block produce
//!   *incomplete* phis which are completed when the block is sealed.
//! - **finished** - a terminator has been emitted. Nothing may be appended afterwards.
//!
//! # Block Structure
//!
//! ```text
//! b3 if.done  preds: [b1, b2]  sealed finished
//!   v7 = phi [v5, b1] [v2, b2]
//!   v8 = add v7, v3
//!   jump b4
//! ```
//!
//! Each block also keeps two variable maps: `current_defs` holds the bindings written inside
//! the block, `entry_defs` memoizes the result of reading a symbol at block entry (a phi, the
//! single predecessor's value, a free value, an extern or an `Undefined` placeholder).

use std::collections::HashMap;

use bitflags::bitflags;

use crate::ssa::{BlockId, FunctionId, ScopeId, SymbolId, ValueId, VariableId};

bitflags! {
    /// Construction state of a block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BlockFlags: u8 {
        /// All predecessors are known
        const SEALED = 0x01;
        /// A terminator has been emitted
        const FINISHED = 0x02;
    }
}

/// Advisory reachability of a block, derived from constant branch conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Reachability {
    /// Nothing is known.
    #[default]
    Unknown,

    /// Reached by a branch whose condition is constant and selects this block.
    Reachable,

    /// Only reached through a branch whose constant condition never selects it.
    Unreachable,
}

impl Reachability {
    /// The ternary encoding: `1` reachable, `-1` dead, `0` unknown.
    #[must_use]
    pub const fn as_ternary(self) -> i8 {
        match self {
            Self::Reachable => 1,
            Self::Unreachable => -1,
            Self::Unknown => 0,
        }
    }
}

/// A basic block.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub(crate) id: BlockId,
    pub(crate) name: String,
    pub(crate) function: FunctionId,
    pub(crate) scope: ScopeId,
    pub(crate) phis: Vec<ValueId>,
    pub(crate) insts: Vec<ValueId>,
    pub(crate) preds: Vec<BlockId>,
    pub(crate) succs: Vec<BlockId>,
    pub(crate) flags: BlockFlags,
    pub(crate) reachable: Reachability,
    /// Placeholder phis created while the block was unsealed
    pub(crate) incomplete_phis: Vec<(SymbolId, ValueId)>,
    pub(crate) current_defs: HashMap<SymbolId, VariableId>,
    pub(crate) entry_defs: HashMap<SymbolId, VariableId>,
    /// `ErrorHandler` protecting this block
    pub(crate) handler: Option<ValueId>,
}

impl BasicBlock {
    pub(crate) fn new(
        id: BlockId,
        name: impl Into<String>,
        function: FunctionId,
        scope: ScopeId,
        sealed: bool,
    ) -> Self {
        let flags = if sealed {
            BlockFlags::SEALED
        } else {
            BlockFlags::empty()
        };

        Self {
            id,
            name: name.into(),
            function,
            scope,
            phis: Vec::new(),
            insts: Vec::new(),
            preds: Vec::new(),
            succs: Vec::new(),
            flags,
            reachable: Reachability::Unknown,
            incomplete_phis: Vec::new(),
            current_defs: HashMap::new(),
            entry_defs: HashMap::new(),
            handler: None,
        }
    }

    /// Returns the block id.
    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    /// Returns the block name (`entry`, `if.true`, `loop.header`, ...).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the owning function.
    #[must_use]
    pub const fn function(&self) -> FunctionId {
        self.function
    }

    /// Returns the lexical scope that was current when the block was created.
    #[must_use]
    pub const fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Returns the phi nodes in this block.
    #[must_use]
    pub fn phis(&self) -> &[ValueId] {
        &self.phis
    }

    /// Returns the non-phi instructions in this block, terminator last.
    #[must_use]
    pub fn insts(&self) -> &[ValueId] {
        &self.insts
    }

    /// Returns the predecessors in edge order.
    #[must_use]
    pub fn preds(&self) -> &[BlockId] {
        &self.preds
    }

    /// Returns the successors in edge order.
    #[must_use]
    pub fn succs(&self) -> &[BlockId] {
        &self.succs
    }

    /// Returns the construction flags.
    #[must_use]
    pub const fn flags(&self) -> BlockFlags {
        self.flags
    }

    /// Returns `true` once all predecessors are known.
    #[must_use]
    pub const fn is_sealed(&self) -> bool {
        self.flags.contains(BlockFlags::SEALED)
    }

    /// Returns `true` once a terminator has been emitted.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.flags.contains(BlockFlags::FINISHED)
    }

    /// Returns the advisory reachability.
    #[must_use]
    pub const fn reachable(&self) -> Reachability {
        self.reachable
    }

    /// Returns the terminator, if the block is finished.
    #[must_use]
    pub fn terminator(&self) -> Option<ValueId> {
        if self.is_finished() {
            self.insts.last().copied()
        } else {
            None
        }
    }

    /// Returns the `ErrorHandler` protecting this block.
    #[must_use]
    pub const fn handler(&self) -> Option<ValueId> {
        self.handler
    }

    /// Returns the number of placeholder phis still waiting for the block to be sealed.
    #[must_use]
    pub fn incomplete_phi_count(&self) -> usize {
        self.incomplete_phis.len()
    }

    /// Returns the variable written last for `symbol` inside this block.
    #[must_use]
    pub fn current_def(&self, symbol: SymbolId) -> Option<VariableId> {
        self.current_defs.get(&symbol).copied()
    }

    /// Returns the memoized entry binding of `symbol`.
    #[must_use]
    pub fn entry_def(&self, symbol: SymbolId) -> Option<VariableId> {
        self.entry_defs.get(&symbol).copied()
    }

    pub(crate) fn remove_inst(&mut self, value: ValueId) -> bool {
        if let Some(pos) = self.phis.iter().position(|v| *v == value) {
            self.phis.remove(pos);
            return true;
        }
        if let Some(pos) = self.insts.iter().position(|v| *v == value) {
            self.insts.remove(pos);
            return true;
        }
        false
    }
}
