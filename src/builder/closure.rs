//! Closures, free values, calls and side effects.
//!
//! A closure sees the variables of its defining function through free values: `Parameter`
//! instructions whose default is the value at the capture site. A call binds every free
//! value of the callee to the value the name has at the call site. Assignments a closure
//! makes to captured variables, and to members of its parameters, become side effects:
//! each call creates a fresh `SideEffect` value and rebinds the name in the caller.
//!
//! Calls of functions that are not finished yet are recorded and bound when the callee is
//! finished, against a snapshot of the call site.

use tracing::{debug, trace};

use crate::{
    builder::{emit::Placement, FunctionBuilder},
    diagnostics::{DiagnosticTag, Severity},
    ssa::{
        CaptureSite, FunctionId, FunctionSideEffect, InstKind, MemberRoot, ParameterKind,
        PendingBinding, SideEffectKind, SsaType, SymbolId, SymbolKind, ValueId,
    },
};

impl<'p> FunctionBuilder<'p> {
    /// Creates a closure defined at the current position.
    ///
    /// Returns the new function and the `Function` value standing for it here. The body is
    /// built through [`FunctionBuilder::push_function`] or a [`crate::builder::BuildQueue`].
    pub fn new_closure(&mut self, name: &str) -> (FunctionId, ValueId) {
        let parent = self.frame.function;
        let site = self.capture_site();
        let function = self.program.new_function(name, Some(parent));
        self.program.func_mut(function).capture = Some(site);

        let value = self.insert(
            InstKind::Function(function),
            SsaType::Function(function),
            self.frame.block,
            Placement::BeforeTerminator,
        );
        self.set_name(value, name);
        self.program.func_mut(function).value = Some(value);
        debug!(parent = %parent, closure = %function, name, "created closure");
        (function, value)
    }

    fn capture_site(&self) -> CaptureSite {
        CaptureSite {
            function: self.frame.function,
            block: self.frame.block,
            scope: self.frame.scope,
            defs: self.program.blk(self.frame.block).current_defs.clone(),
        }
    }

    /// Returns the free value `name` of `function`, created on first use if the capture
    /// site of the closure binds the name.
    pub(crate) fn free_value(&mut self, function: FunctionId, name: &str) -> Option<ValueId> {
        let func = self.program.func(function);
        if let Some(value) = func.free_value(name) {
            return Some(value);
        }
        let site = func.capture.as_ref()?;
        if !self.site_binds(site, name, 0) {
            return None;
        }
        let site = site.clone();
        let entry = func.entry;

        let default = self.read_at_site(&site, name);
        let ty = self.program.type_of(default);
        let value = self.insert(
            InstKind::Parameter {
                name: name.to_string(),
                kind: ParameterKind::FreeValue,
                default: Some(default),
            },
            ty,
            entry,
            Placement::Detached,
        );
        self.set_name(value, name);
        self.program
            .func_mut(function)
            .free_values
            .push((name.to_string(), value));
        trace!(function = %function, name, value = %value, default = %default, "created free value");
        Some(value)
    }

    /// Returns `true` if `name` is bound at `site`, or captured by an enclosing closure.
    pub(crate) fn site_binds(&self, site: &CaptureSite, name: &str, depth: usize) -> bool {
        if let Some(symbol) = self.program.resolve_symbol(site.scope, name) {
            if site.defs.contains_key(&symbol) || self.bound_before(symbol, site.block) {
                return true;
            }
        }
        let func = self.program.func(site.function);
        if func.free_value(name).is_some() {
            return true;
        }
        if depth >= self.program.config().max_lookup_depth {
            return false;
        }
        func.capture
            .as_ref()
            .is_some_and(|outer| self.site_binds(outer, name, depth + 1))
    }

    /// Value of `name` at `site`: the snapshot binding, or the value at block entry.
    pub(crate) fn read_at_site(&mut self, site: &CaptureSite, name: &str) -> ValueId {
        let symbol = match self.program.resolve_symbol(site.scope, name) {
            Some(symbol) => symbol,
            None => {
                let root = self.program.func(site.function).root_scope;
                self.program.new_symbol(root, name, SymbolKind::Implicit)
            }
        };
        if let Some(variable) = site.defs.get(&symbol) {
            let value = self.program.var(*variable).value;
            if self.program.is_live(value) {
                return value;
            }
        }
        self.read_entry(symbol, site.block)
    }

    /// Registers a side effect for an assignment to a captured variable.
    pub(crate) fn note_captured_write(&mut self, symbol: SymbolId, value: ValueId) {
        let function = self.frame.function;
        let func = self.program.func(function);
        let sym = self.program.sym(symbol);
        if sym.kind != SymbolKind::Implicit || sym.scope != func.root_scope {
            return;
        }
        if func.side_effect(&sym.name).is_some() {
            return;
        }
        let captured = func.free_value(&sym.name).is_some()
            || func
                .capture
                .as_ref()
                .is_some_and(|site| self.site_binds(site, &sym.name, 0));
        if !captured {
            return;
        }

        let name = sym.name.clone();
        trace!(function = %function, name = %name, value = %value, "captured variable written");
        self.program
            .func_mut(function)
            .side_effects
            .push(FunctionSideEffect {
                name,
                kind: SideEffectKind::Value,
                member: None,
                modified: None,
                symbol: Some(symbol),
            });
    }

    /// Emits a call of `method`.
    ///
    /// If `method` is a known function, its free values are bound and its side effects
    /// rebind the affected names after the call. For functions not finished yet this
    /// happens when they are finished.
    pub fn emit_call(&mut self, method: ValueId, args: Vec<ValueId>) -> Option<ValueId> {
        if self.frame.stopped {
            return None;
        }
        let callee = self.callee_of(method);
        let ty = callee
            .and_then(|f| self.program.func(f).ty.as_ref())
            .map(|t| t.returns.clone())
            .unwrap_or_default();
        let call = self.emit_value(
            InstKind::Call {
                method,
                args,
                binding: Default::default(),
                side_effects: Default::default(),
            },
            ty,
        )?;

        if let Some(callee) = callee {
            if self.program.func(callee).finished {
                self.bind_call(call, callee);
            } else {
                let site = self.capture_site();
                trace!(call = %call, callee = %callee, "callee not finished, binding deferred");
                self.program.pending.push(PendingBinding { call, callee, site });
            }
        }
        Some(call)
    }

    fn callee_of(&self, method: ValueId) -> Option<FunctionId> {
        match self.program.kind(method)? {
            InstKind::Function(function) => Some(*function),
            _ => self.program.type_of(method).function(),
        }
    }

    fn check_arity(&self, caller: FunctionId, call: ValueId, callee: FunctionId) {
        let func = self.program.func(callee);
        let passed = match self.program.kind(call) {
            Some(InstKind::Call { args, .. }) => args.len(),
            _ => return,
        };
        let expected = func.arity();
        let mismatch = if func.variadic {
            passed + 1 < expected
        } else {
            passed != expected
        };
        if mismatch {
            self.report_in(
                caller,
                Severity::Warn,
                DiagnosticTag::TypeMismatch,
                format!(
                    "{} called with {passed} argument(s), expected {expected}",
                    func.name
                ),
            );
        }
    }

    fn bind_call(&mut self, call: ValueId, callee: FunctionId) {
        let caller = self.frame.function;
        self.check_arity(caller, call, callee);

        let func = self.program.func(callee);
        let free_values = func.free_values.clone();
        let side_effects = func.side_effects.clone();

        for (name, param) in free_values {
            let value = if self.binds_here(&name) {
                self.read_variable(&name)
            } else {
                self.unbound_free_value(caller, callee, &name, param)
            };
            self.set_binding(call, &name, value);
        }

        for side_effect in &side_effects {
            self.apply_side_effect(call, side_effect);
        }
    }

    fn unbound_free_value(
        &mut self,
        caller: FunctionId,
        callee: FunctionId,
        name: &str,
        param: ValueId,
    ) -> ValueId {
        let callee_name = self.program.func(callee).name.clone();
        self.report_in(
            caller,
            Severity::Warn,
            DiagnosticTag::UnboundFreeValue,
            format!("free value {name} of {callee_name} is not bound at the call site"),
        );
        let default = match self.program.kind(param) {
            Some(InstKind::Parameter { default, .. }) => *default,
            _ => None,
        };
        match default.filter(|d| self.program.is_live(*d)) {
            Some(default) => default,
            None => self.emit_undefined(name),
        }
    }

    fn set_binding(&mut self, call: ValueId, name: &str, value: ValueId) {
        let Some(InstKind::Call { binding, .. }) =
            self.program.inst_mut(call).map(|i| &mut i.kind)
        else {
            return;
        };
        let replaced = binding.insert(name.to_string(), value);
        self.program.add_user(value, call);
        if let Some(old) = replaced.filter(|old| *old != value) {
            let still_used = self
                .program
                .kind(call)
                .is_some_and(|kind| kind.operands().contains(&old));
            if !still_used {
                self.program.remove_user(old, call);
            }
        }
    }

    fn record_side_effect(&mut self, call: ValueId, name: &str, value: ValueId) {
        if let Some(InstKind::Call { side_effects, .. }) =
            self.program.inst_mut(call).map(|i| &mut i.kind)
        {
            side_effects.insert(name.to_string(), value);
        }
    }

    /// Creates the `SideEffect` value of one side effect of the callee and rebinds the
    /// affected name or member in the caller.
    fn apply_side_effect(&mut self, call: ValueId, side_effect: &FunctionSideEffect) {
        let name = side_effect.name.as_str();
        let Some(path) = &side_effect.member else {
            if !self.binds_here(name) {
                return;
            }
            let Some(value) = self.emit_side_effect(name, call, side_effect.modified) else {
                return;
            };
            self.write_variable(name, value);
            self.record_side_effect(call, name, value);
            return;
        };

        let Some(InstKind::Call {
            method,
            args,
            binding,
            ..
        }) = self.program.kind(call).cloned()
        else {
            return;
        };
        let root = match &path.root {
            MemberRoot::Parameter(index) => self.argument_for(method, &args, *index),
            MemberRoot::FreeValue(free) => binding.get(free).copied(),
        };
        let Some(mut object) = root else {
            self.report(
                Severity::Warn,
                DiagnosticTag::TypeMismatch,
                format!("no object for side effect {name} at call {call}"),
            );
            return;
        };
        let Some((last, inner)) = path.path.split_last() else {
            return;
        };
        for key in inner {
            let key = self.emit_const(key.clone());
            object = self.read_member(object, key);
        }
        let ty = self.program.type_of(object);
        if ty.is_primitive() {
            self.report(
                Severity::Warn,
                DiagnosticTag::TypeMismatch,
                format!("side effect {name} targets a {ty} value"),
            );
            return;
        }

        let key = self.emit_const(last.clone());
        let Some(value) = self.emit_side_effect(name, call, side_effect.modified) else {
            return;
        };
        self.bind_member(object, key, value);
        self.record_side_effect(call, name, value);
    }

    /// Argument passed for parameter `index` of the callee. The receiver of a method call
    /// is the object the method was read from.
    fn argument_for(&self, method: ValueId, args: &[ValueId], index: usize) -> Option<ValueId> {
        let is_method = self
            .callee_of(method)
            .is_some_and(|f| self.program.func(f).is_method);
        if !is_method {
            return args.get(index).copied();
        }
        match index {
            0 => self.program.inst(method).and_then(|i| i.object),
            n => args.get(n - 1).copied(),
        }
    }

    /// Binds the free values of calls that waited for `callee` to be finished.
    pub(crate) fn resolve_pending_bindings(&mut self, callee: FunctionId) {
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.program.pending)
            .into_iter()
            .partition(|p| p.callee == callee);
        self.program.pending = waiting;

        for pending in ready {
            let PendingBinding { call, site, .. } = pending;
            if !self.program.is_live(call) {
                continue;
            }
            let caller = site.function;
            self.check_arity(caller, call, callee);

            let func = self.program.func(callee);
            let free_values = func.free_values.clone();
            let has_side_effects = !func.side_effects.is_empty();
            let callee_name = func.name.clone();

            for (name, param) in free_values {
                let value = if self.site_binds(&site, &name, 0) {
                    self.read_at_site(&site, &name)
                } else {
                    self.unbound_free_value(caller, callee, &name, param)
                };
                self.set_binding(call, &name, value);
            }
            if has_side_effects {
                self.report_in(
                    caller,
                    Severity::Warn,
                    DiagnosticTag::CalleeNotBuilt,
                    format!(
                        "side effects of {callee_name} are not applied to {call}, it was called before being built"
                    ),
                );
            }
            trace!(call = %call, callee = %callee, "resolved deferred binding");
        }
    }

    /// Records, for each side effect, the value the name has at the returns.
    pub(crate) fn compute_side_effect_values(&mut self) {
        let function = self.frame.function;
        let func = self.program.func(function);
        let side_effects = func.side_effects.clone();
        let return_blocks: Vec<_> = func
            .returns
            .iter()
            .filter_map(|r| self.program.inst(*r).map(|i| i.block))
            .collect();

        for (index, side_effect) in side_effects.iter().enumerate() {
            let Some(symbol) = side_effect.symbol else {
                continue;
            };
            let values: Vec<ValueId> = return_blocks
                .iter()
                .map(|block| self.read_symbol(symbol, *block))
                .collect();
            let modified = match values.split_first() {
                Some((first, rest)) if rest.iter().all(|v| v == first) => Some(*first),
                _ => None,
            };
            self.program.func_mut(function).side_effects[index].modified = modified;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        diagnostics::DiagnosticTag,
        ssa::{BinaryOp, InstKind, ParameterKind, Program, SideEffectKind},
        ProgramContext,
    };

    fn program() -> Program {
        Program::new("test", ProgramContext::default().into_shared())
    }

    #[test]
    fn test_free_value_default_is_capture_time_value() {
        let mut program = program();
        let mut b = program.new_function_builder("main");
        let one = b.emit_const(1);
        b.write_variable("ca", one);

        let mut free = None;
        let closure = b.build_closure("f", |b| {
            let ca = b.read_variable("ca");
            free = Some(ca);
            b.emit_return(vec![ca]);
        });
        b.finish();

        let free = free.unwrap();
        match program.instruction(free).unwrap().kind() {
            InstKind::Parameter {
                kind: ParameterKind::FreeValue,
                default,
                ..
            } => assert_eq!(*default, Some(one)),
            other => panic!("expected free value, got {other:?}"),
        }
        let function = program.instruction(closure).unwrap().ty().function().unwrap();
        assert_eq!(program.function(function).unwrap().free_values().len(), 1);
        assert!(program.diagnostics().is_empty());
    }

    #[test]
    fn test_call_binds_current_value() {
        let mut program = program();
        let mut b = program.new_function_builder("main");
        let one = b.emit_const(1);
        b.write_variable("ca", one);
        let f = b.build_closure("f", |b| {
            let ca = b.read_variable("ca");
            b.emit_return(vec![ca]);
        });
        let two = b.emit_const(2);
        b.write_variable("ca", two);
        let call = b.emit_call(f, vec![]).unwrap();
        b.finish();

        match program.instruction(call).unwrap().kind() {
            InstKind::Call { binding, .. } => assert_eq!(binding.get("ca"), Some(&two)),
            other => panic!("expected call, got {other:?}"),
        }
        assert!(program.users(two).contains(&call));
        assert!(program.verify().is_empty());
    }

    #[test]
    fn test_each_call_has_its_own_side_effect() {
        let mut program = program();
        let mut b = program.new_function_builder("main");
        let zero = b.emit_const(0);
        b.write_variable("count", zero);
        let inc = b.build_closure("inc", |b| {
            let count = b.read_variable("count");
            let one = b.emit_const(1);
            let next = b.emit_binop(BinaryOp::Add, count, one).unwrap();
            b.write_variable("count", next);
        });

        let first = b.emit_call(inc, vec![]).unwrap();
        let after_first = b.read_variable("count");
        let second = b.emit_call(inc, vec![]).unwrap();
        let after_second = b.read_variable("count");
        b.finish();

        assert_ne!(after_first, after_second);
        for (call, value) in [(first, after_first), (second, after_second)] {
            match program.instruction(value).unwrap().kind() {
                InstKind::SideEffect { name, call: from, .. } => {
                    assert_eq!(name, "count");
                    assert_eq!(*from, call);
                }
                other => panic!("expected side effect, got {other:?}"),
            }
        }
        match program.instruction(second).unwrap().kind() {
            InstKind::Call { binding, .. } => assert_eq!(binding.get("count"), Some(&after_first)),
            other => panic!("expected call, got {other:?}"),
        }

        let function = program.instruction(inc).unwrap().ty().function().unwrap();
        let side_effect = program.function(function).unwrap().side_effect("count").unwrap();
        assert_eq!(side_effect.kind, SideEffectKind::Value);
        assert!(side_effect.modified.is_some());
        assert!(program.verify().is_empty());
    }

    #[test]
    fn test_grandchild_side_effect_reaches_caller() {
        let mut program = program();
        let mut b = program.new_function_builder("outer");
        let zero = b.emit_const(0);
        b.write_variable("x", zero);

        let mut g = None;
        let mut next = None;
        let mut inner_call = None;
        let f = b.build_closure("f", |b| {
            let closure = b.build_closure("g", |b| {
                let x = b.read_variable("x");
                let one = b.emit_const(1);
                next = b.emit_binop(BinaryOp::Add, x, one);
                b.write_variable("x", next.unwrap());
            });
            g = Some(closure);
            inner_call = b.emit_call(closure, vec![]);
        });
        let call = b.emit_call(f, vec![]).unwrap();
        let after = b.read_variable("x");
        b.finish();

        let function_of = |value| program.instruction(value).unwrap().ty().function().unwrap();
        let f_func = program.function(function_of(f)).unwrap();
        let g_func = program.function(function_of(g.unwrap())).unwrap();
        let default_of = |free| match program.instruction(free).unwrap().kind() {
            InstKind::Parameter {
                kind: ParameterKind::FreeValue,
                default,
                ..
            } => *default,
            other => panic!("expected free value, got {other:?}"),
        };
        let f_free = f_func.free_value("x").unwrap();
        let g_free = g_func.free_value("x").unwrap();
        assert_eq!(default_of(g_free), Some(f_free));
        assert_eq!(default_of(f_free), Some(zero));
        assert_eq!(f_func.side_effect("x").unwrap().kind, SideEffectKind::Value);
        assert_eq!(g_func.side_effect("x").unwrap().modified, next);

        let inner_effect = match program.instruction(after).unwrap().kind() {
            InstKind::SideEffect {
                name,
                call: from,
                modified,
            } => {
                assert_eq!(name, "x");
                assert_eq!(*from, call);
                modified.unwrap()
            }
            other => panic!("expected side effect, got {other:?}"),
        };
        match program.instruction(inner_effect).unwrap().kind() {
            InstKind::SideEffect {
                call: from,
                modified,
                ..
            } => {
                assert_eq!(Some(*from), inner_call);
                assert_eq!(*modified, next);
            }
            other => panic!("expected side effect, got {other:?}"),
        }
        assert!(program.verify().is_empty());
    }

    #[test]
    fn test_unbound_free_value_falls_back_to_default() {
        let mut program = program();
        let outer = program.new_function("outer", None);
        let mut b = program.function_builder(outer).unwrap();
        let one = b.emit_const(1);
        b.write_variable("ca", one);
        let f = b.build_closure("f", |b| {
            let ca = b.read_variable("ca");
            b.emit_return(vec![ca]);
        });
        b.finish();

        let mut other = program.new_function_builder("other");
        let call = other.emit_call(f, vec![]).unwrap();
        other.finish();

        match program.instruction(call).unwrap().kind() {
            InstKind::Call { binding, .. } => assert_eq!(binding.get("ca"), Some(&one)),
            other => panic!("expected call, got {other:?}"),
        }
        assert!(program
            .diagnostics()
            .iter()
            .any(|d| d.tag == DiagnosticTag::UnboundFreeValue));
    }

    #[test]
    fn test_pending_binding_resolved_on_finish() {
        let mut program = program();
        let mut b = program.new_function_builder("main");
        let one = b.emit_const(1);
        b.write_variable("ca", one);
        let (function, value) = b.new_closure("f");
        let call = b.emit_call(value, vec![]).unwrap();
        b.finish();

        let mut inner = program.function_builder(function).unwrap();
        let ca = inner.read_variable("ca");
        inner.emit_return(vec![ca]);
        inner.finish();

        match program.instruction(call).unwrap().kind() {
            InstKind::Call { binding, .. } => assert_eq!(binding.get("ca"), Some(&one)),
            other => panic!("expected call, got {other:?}"),
        }
        assert!(program.diagnostics().is_empty());
    }

    #[test]
    fn test_arity_mismatch_is_reported() {
        let mut program = program();
        let mut b = program.new_function_builder("main");
        let f = b.build_closure("f", |b| {
            b.new_param("x");
        });
        b.emit_call(f, vec![]);
        b.finish();

        assert!(program
            .diagnostics()
            .iter()
            .any(|d| d.tag == DiagnosticTag::TypeMismatch));
    }
}
