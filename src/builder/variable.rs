//! Variable reads and writes.
//!
//! Writes record a new [`crate::ssa::Variable`] version in the current block. Reads look
//! for the version written in the block itself, then for the value at block entry, which
//! is computed once per block and symbol and memoized in the block's entry bindings.

use std::collections::HashSet;

use tracing::{error, trace};

use crate::{
    builder::{emit::Placement, phi::PhiOperands, FunctionBuilder},
    diagnostics::{DiagnosticTag, Severity},
    ssa::{
        BindingOrigin, BlockId, FunctionId, InstKind, SsaType, SymbolId, SymbolKind,
        UndefinedKind, ValueId, VariableId,
    },
};

/// Next thing to resolve while reading a variable.
pub(crate) enum Step {
    /// Value at the end of a block
    Exit(BlockId),
    /// Value at the entry of a block
    Entry(BlockId),
    /// Resolved value, handed to the innermost pending read
    Value(ValueId),
}

/// A read waiting for the value of a predecessor.
pub(crate) enum Pending {
    /// Entry binding of a block with a single predecessor
    Forward(BlockId),
    /// Phi collecting one edge per predecessor
    Operands(PhiOperands),
}

impl<'p> FunctionBuilder<'p> {
    /// Returns the value `name` has at the current position.
    ///
    /// Unknown names resolve to a free value of the enclosing closure, an extern, or an
    /// `Undefined` placeholder, in that order.
    pub fn read_variable(&mut self, name: &str) -> ValueId {
        let symbol = self.lookup_or_implicit(name);
        self.read_symbol(symbol, self.frame.block)
    }

    /// Assigns `value` to `name`. Undeclared names are bound in the function's root scope
    /// and may be seen by callers of a closure as a side effect.
    pub fn write_variable(&mut self, name: &str, value: ValueId) {
        self.assign(name, value, false);
    }

    /// Declares `name` in the current scope and binds `value` to it.
    pub fn declare_variable(&mut self, name: &str, value: ValueId) {
        self.assign(name, value, true);
    }

    /// Returns `true` if `name` has a binding on some path reaching the current position,
    /// including bindings captured by the enclosing closures.
    pub fn has_variable(&self, name: &str) -> bool {
        self.binds_here(name)
    }

    fn assign(&mut self, name: &str, value: ValueId, local: bool) {
        if !self.program.is_live(value) {
            error!(name, value = %value, "BUG: assignment of a deleted value");
            return;
        }
        let symbol = if local {
            self.declare_symbol(name)
        } else {
            self.lookup_or_implicit(name)
        };
        self.write_symbol(symbol, self.frame.block, value, local, BindingOrigin::Write);

        if let Some(inst) = self.program.inst_mut(value) {
            if inst.name.is_none() {
                inst.name = Some(name.to_string());
            }
        }
        self.program.index_name(name, value);
        if !local {
            self.note_captured_write(symbol, value);
        }
    }

    pub(crate) fn declare_symbol(&mut self, name: &str) -> SymbolId {
        let scope = self.frame.scope;
        if let Some(symbol) = self.program.scopes[scope.index()].symbol(name) {
            return symbol;
        }
        self.program.new_symbol(scope, name, SymbolKind::Declared)
    }

    pub(crate) fn lookup_or_implicit(&mut self, name: &str) -> SymbolId {
        if let Some(symbol) = self.program.resolve_symbol(self.frame.scope, name) {
            return symbol;
        }
        let root = self.program.func(self.frame.function).root_scope;
        self.program.new_symbol(root, name, SymbolKind::Implicit)
    }

    pub(crate) fn write_symbol(
        &mut self,
        symbol: SymbolId,
        block: BlockId,
        value: ValueId,
        local: bool,
        origin: BindingOrigin,
    ) -> VariableId {
        let prev = self.program.blk(block).current_defs.get(&symbol).copied();
        let variable = self
            .program
            .new_variable(symbol, value, block, local, origin, prev);
        self.program
            .blk_mut(block)
            .current_defs
            .insert(symbol, variable);
        variable
    }

    fn bind_entry(&mut self, symbol: SymbolId, block: BlockId, value: ValueId) {
        let variable =
            self.program
                .new_variable(symbol, value, block, false, BindingOrigin::Read, None);
        self.program
            .blk_mut(block)
            .entry_defs
            .insert(symbol, variable);
    }

    /// Value of `symbol` at the end of what has been built of `block`.
    pub(crate) fn read_symbol(&mut self, symbol: SymbolId, block: BlockId) -> ValueId {
        self.resolve(symbol, Step::Exit(block), Vec::new())
    }

    /// Value of `symbol` when control enters `block`.
    pub(crate) fn read_entry(&mut self, symbol: SymbolId, block: BlockId) -> ValueId {
        self.resolve(symbol, Step::Entry(block), Vec::new())
    }

    /// Runs a read of `symbol` to completion.
    ///
    /// Reads that wait for a predecessor are kept in `pending` rather than on the call
    /// stack, so the distance between a read and the write it finds is not limited by
    /// stack depth.
    pub(crate) fn resolve(
        &mut self,
        symbol: SymbolId,
        mut step: Step,
        mut pending: Vec<Pending>,
    ) -> ValueId {
        loop {
            step = match step {
                Step::Exit(block) => match self.current_def(symbol, block) {
                    Some(value) => Step::Value(value),
                    None => Step::Entry(block),
                },
                Step::Entry(block) => self.entry_step(symbol, block, &mut pending),
                Step::Value(value) => match pending.pop() {
                    None => return value,
                    Some(Pending::Forward(block)) => {
                        self.bind_entry(symbol, block, value);
                        Step::Value(value)
                    }
                    Some(Pending::Operands(operands)) => {
                        self.push_operand(operands, value, &mut pending)
                    }
                },
            };
        }
    }

    fn current_def(&self, symbol: SymbolId, block: BlockId) -> Option<ValueId> {
        let variable = self.program.blk(block).current_defs.get(&symbol)?;
        let value = self.program.var(*variable).value;
        self.program.is_live(value).then_some(value)
    }

    fn entry_step(&mut self, symbol: SymbolId, block: BlockId, pending: &mut Vec<Pending>) -> Step {
        let blk = self.program.blk(block);
        if let Some(variable) = blk.entry_defs.get(&symbol) {
            let value = self.program.var(*variable).value;
            if self.program.is_live(value) {
                return Step::Value(value);
            }
        }

        let sealed = blk.is_sealed();
        let preds = blk.preds.clone();
        if !sealed {
            let phi = self.new_phi(block, symbol);
            self.program
                .blk_mut(block)
                .incomplete_phis
                .push((symbol, phi));
            self.bind_entry(symbol, block, phi);
            return Step::Value(phi);
        }

        match preds.as_slice() {
            [] => {
                let value = self.resolve_unbound(symbol, block);
                self.bind_entry(symbol, block, value);
                Step::Value(value)
            }
            [pred] => {
                pending.push(Pending::Forward(block));
                Step::Exit(*pred)
            }
            _ => {
                let phi = self.new_phi(block, symbol);
                self.bind_entry(symbol, block, phi);
                self.begin_operands(phi, pending)
            }
        }
    }

    /// Resolves a symbol with no binding at the entry of its function.
    fn resolve_unbound(&mut self, symbol: SymbolId, block: BlockId) -> ValueId {
        let sym = self.program.sym(symbol);
        let name = sym.name.clone();
        let kind = sym.kind;
        let function = self.program.blk(block).function;

        if let SymbolKind::Member { object, key } = kind {
            return self.member_fallback(function, block, object, key);
        }
        if let Some(value) = self.free_value(function, &name) {
            return value;
        }
        if let Some(value) = self.extern_value(function, &name) {
            return value;
        }

        let value = self.insert(
            InstKind::Undefined {
                name: name.clone(),
                kind: UndefinedKind::Value,
            },
            SsaType::Any,
            block,
            Placement::Front,
        );
        self.set_name(value, &name);
        if self.config().report_undefined {
            self.report_in(
                function,
                Severity::Warn,
                DiagnosticTag::UndefinedValue,
                format!("{name} is not defined"),
            );
        }
        trace!(name = %name, value = %value, "unbound name is undefined");
        value
    }

    /// Returns the host binding for `name`, created once per function.
    fn extern_value(&mut self, function: FunctionId, name: &str) -> Option<ValueId> {
        if let Some(value) = self.program.func(function).externs.get(name) {
            return Some(*value);
        }
        let binding = self.program.context().try_build_extern_value(name)?;
        let entry = self.program.func(function).entry;
        let value = self.insert(
            InstKind::Extern {
                name: binding.name.clone(),
            },
            binding.ty,
            entry,
            Placement::Detached,
        );
        self.set_name(value, name);
        self.program
            .func_mut(function)
            .externs
            .insert(name.to_string(), value);
        Some(value)
    }

    /// Returns `true` if a predecessor path of `block` writes `symbol`.
    pub(crate) fn bound_before(&self, symbol: SymbolId, block: BlockId) -> bool {
        let mut visited = HashSet::from([block]);
        let mut stack = self.program.blk(block).preds.clone();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let blk = self.program.blk(current);
            if blk.current_defs.contains_key(&symbol) {
                return true;
            }
            stack.extend(blk.preds.iter().copied());
        }
        false
    }

    /// Returns `true` if `name` is bound at the current position, in this function or in
    /// a function enclosing it.
    pub(crate) fn binds_here(&self, name: &str) -> bool {
        let function = self.frame.function;
        let block = self.frame.block;
        if let Some(symbol) = self.program.resolve_symbol(self.frame.scope, name) {
            let blk = self.program.blk(block);
            if blk.current_defs.contains_key(&symbol) || self.bound_before(symbol, block) {
                return true;
            }
        }
        let func = self.program.func(function);
        if func.free_value(name).is_some() {
            return true;
        }
        func.capture
            .as_ref()
            .is_some_and(|site| self.site_binds(site, name, 0))
    }
}
