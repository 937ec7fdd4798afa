//! Member reads and writes.
//!
//! Each `(object, key)` pair gets a member symbol in the function's root scope, named
//! `#<object>.<key>`, so member values flow through blocks exactly like variables. The
//! first read of a member without a binding observes it: a `ParameterMember` for members
//! of parameters and free values, a blueprint lookup for typed objects, a `Field` read
//! otherwise. Writes to members of parameters register a pointer side effect.

use tracing::trace;

use crate::{
    builder::{emit::Placement, FunctionBuilder},
    diagnostics::{DiagnosticTag, Severity},
    ssa::{
        BindingOrigin, BlockId, BlueprintId, BlueprintMember, FunctionId, FunctionSideEffect,
        InstKind, MemberPath, MemberRoot, ParameterKind, SideEffectKind, SsaType, SymbolId,
        SymbolKind, UndefinedKind, ValueId,
    },
};

impl<'p> FunctionBuilder<'p> {
    /// Returns the value of `object.key` at the current position.
    pub fn read_member(&mut self, object: ValueId, key: ValueId) -> ValueId {
        let symbol = self.member_symbol(object, key);
        let block = self.frame.block;
        if self.member_bound(symbol, block) {
            return self.read_symbol(symbol, block);
        }

        let value = self.observe_member(object, key);
        self.write_symbol(symbol, block, value, false, BindingOrigin::Read);
        self.set_member_relation(object, key, value);
        value
    }

    /// Reads `object.name` with a constant key.
    pub fn read_member_by_name(&mut self, object: ValueId, name: &str) -> ValueId {
        let key = self.emit_const(name);
        self.read_member(object, key)
    }

    /// Emits `object.key = value` and binds the member to `value`.
    pub fn write_member(
        &mut self,
        object: ValueId,
        key: ValueId,
        value: ValueId,
    ) -> Option<ValueId> {
        let update = self.emit_value(InstKind::Update { object, key, value }, SsaType::Any)?;
        self.bind_member(object, key, value);
        Some(update)
    }

    /// Writes `object.name = value` with a constant key.
    pub fn write_member_by_name(
        &mut self,
        object: ValueId,
        name: &str,
        value: ValueId,
    ) -> Option<ValueId> {
        let key = self.emit_const(name);
        self.write_member(object, key, value)
    }

    /// Binds the member symbol of `object.key` to `value` in the current block.
    pub(crate) fn bind_member(&mut self, object: ValueId, key: ValueId, value: ValueId) {
        let symbol = self.member_symbol(object, key);
        self.write_symbol(symbol, self.frame.block, value, false, BindingOrigin::Write);
        self.set_member_relation(object, key, value);

        let function = self.frame.function;
        let Some(path) = self.parameter_member_path(object, key) else {
            return;
        };
        if self.program.inst(object).map(|i| i.function) != Some(function) {
            return;
        }
        let name = self.verbose_member_name(object, key);
        if self.program.func(function).side_effect(&name).is_some() {
            return;
        }
        trace!(function = %function, name = %name, "parameter member written");
        self.program
            .func_mut(function)
            .side_effects
            .push(FunctionSideEffect {
                name,
                kind: SideEffectKind::Pointer,
                member: Some(path),
                modified: None,
                symbol: Some(symbol),
            });
    }

    pub(crate) fn member_symbol(&mut self, object: ValueId, key: ValueId) -> SymbolId {
        let name = format!("#{}.{}", object.index(), self.key_text(key));
        let root = self.program.func(self.frame.function).root_scope;
        if let Some(symbol) = self.program.scopes[root.index()].symbol(&name) {
            return symbol;
        }
        self.program
            .new_symbol(root, &name, SymbolKind::Member { object, key })
    }

    fn member_bound(&self, symbol: SymbolId, block: BlockId) -> bool {
        let blk = self.program.blk(block);
        blk.current_defs.contains_key(&symbol)
            || blk.entry_defs.contains_key(&symbol)
            || self.bound_before(symbol, block)
    }

    /// Constant keys by their name, other keys by value id.
    fn key_text(&self, key: ValueId) -> String {
        match self.program.const_value(key) {
            Some(value) => value.key_name(),
            None => format!("#{}", key.index()),
        }
    }

    /// `o.x` style name, using the object's name when it has one.
    pub(crate) fn verbose_member_name(&self, object: ValueId, key: ValueId) -> String {
        let object_name = self
            .program
            .inst(object)
            .and_then(|i| i.name.clone())
            .unwrap_or_else(|| format!("#{}", object.index()));
        format!("{object_name}.{}", self.key_text(key))
    }

    /// Path from a parameter or free value to `object.key`, if `object` is one of them or a
    /// member of one.
    fn parameter_member_path(&self, object: ValueId, key: ValueId) -> Option<MemberPath> {
        let key = self.program.const_value(key)?.clone();
        match self.program.kind(object)? {
            InstKind::Parameter {
                kind: ParameterKind::Normal { index },
                ..
            } => Some(MemberPath {
                root: MemberRoot::Parameter(*index),
                path: vec![key],
            }),
            InstKind::Parameter {
                kind: ParameterKind::FreeValue,
                name,
                ..
            } => Some(MemberPath {
                root: MemberRoot::FreeValue(name.clone()),
                path: vec![key],
            }),
            InstKind::ParameterMember { member, .. } => Some(member.child(key)),
            _ => None,
        }
    }

    fn parameter_member(
        &mut self,
        function: FunctionId,
        path: MemberPath,
        object: ValueId,
        key: ValueId,
    ) -> ValueId {
        let name = self.verbose_member_name(object, key);
        if let Some(value) = self.program.func(function).parameter_member(&name) {
            return value;
        }
        let entry = self.program.func(function).entry;
        let value = self.insert(
            InstKind::ParameterMember {
                name: name.clone(),
                member: path,
            },
            SsaType::Any,
            entry,
            Placement::Detached,
        );
        self.set_name(value, &name);
        self.program
            .func_mut(function)
            .parameter_members
            .push((name, value));
        self.set_member_relation(object, key, value);
        value
    }

    /// First observation of a member with no binding on any path.
    fn observe_member(&mut self, object: ValueId, key: ValueId) -> ValueId {
        let function = self.frame.function;
        if let Some(path) = self.parameter_member_path(object, key) {
            let owner = self.program.inst(object).map_or(function, |i| i.function);
            return self.parameter_member(owner, path, object, key);
        }

        let ty = self.program.type_of(object);
        let key_name = self.program.const_value(key).map(|k| k.key_name());
        if let (Some(blueprint), Some(key_name)) = (ty.blueprint(), key_name.as_deref()) {
            return self.blueprint_member(object, key, blueprint, key_name);
        }
        if ty.is_primitive() {
            let name = self.verbose_member_name(object, key);
            self.report(
                Severity::Warn,
                DiagnosticTag::InvalidMember,
                format!("{name}: {ty} value has no members"),
            );
            return self.undefined_member(self.frame.block, &name, Placement::BeforeTerminator);
        }
        self.emit_field(object, key, SsaType::Any)
    }

    fn blueprint_member(
        &mut self,
        object: ValueId,
        key: ValueId,
        blueprint: BlueprintId,
        key_name: &str,
    ) -> ValueId {
        match self.program.lookup_blueprint_member(blueprint, key_name) {
            Some(BlueprintMember::Method(method)) => {
                let value = self.insert(
                    InstKind::Function(method),
                    SsaType::Function(method),
                    self.frame.block,
                    Placement::BeforeTerminator,
                );
                let name = self.verbose_member_name(object, key);
                self.set_name(value, &name);
                value
            }
            Some(BlueprintMember::Static(constant)) => self.emit_const(constant),
            Some(BlueprintMember::Member(ty)) => self.emit_field(object, key, ty),
            None => {
                let blueprint_name = self
                    .program
                    .blueprint(blueprint)
                    .map(|b| b.name().to_string())
                    .unwrap_or_default();
                self.report(
                    Severity::Warn,
                    DiagnosticTag::InvalidMember,
                    format!("{blueprint_name} has no member {key_name}"),
                );
                self.emit_field(object, key, SsaType::Any)
            }
        }
    }

    /// `Field` reads are pure, in a finished block they go before the terminator.
    fn emit_field(&mut self, object: ValueId, key: ValueId, ty: SsaType) -> ValueId {
        let value = self.insert(
            InstKind::Field { object, key },
            ty,
            self.frame.block,
            Placement::BeforeTerminator,
        );
        let name = self.verbose_member_name(object, key);
        self.set_name(value, &name);
        value
    }

    fn undefined_member(&mut self, block: BlockId, name: &str, placement: Placement) -> ValueId {
        let value = self.insert(
            InstKind::Undefined {
                name: name.to_string(),
                kind: UndefinedKind::Member,
            },
            SsaType::Any,
            block,
            placement,
        );
        self.set_name(value, name);
        value
    }

    /// Value of a member symbol at the entry of its function.
    pub(crate) fn member_fallback(
        &mut self,
        function: FunctionId,
        block: BlockId,
        object: ValueId,
        key: ValueId,
    ) -> ValueId {
        if let Some(path) = self.parameter_member_path(object, key) {
            return self.parameter_member(function, path, object, key);
        }
        let name = self.verbose_member_name(object, key);
        let value = self.undefined_member(block, &name, Placement::Front);
        self.set_member_relation(object, key, value);
        value
    }

    /// Records `member` as `object.key` on both instructions.
    pub(crate) fn set_member_relation(&mut self, object: ValueId, key: ValueId, member: ValueId) {
        if member == object {
            return;
        }
        if let Some(inst) = self.program.inst_mut(member) {
            if inst.object.is_none() {
                inst.object = Some(object);
                inst.key = Some(key);
            }
        }
        let text = self.key_text(key);
        let existing = self.program.inst(object).and_then(|o| {
            o.members
                .iter()
                .position(|(k, _)| self.key_text(*k) == text)
        });
        if let Some(inst) = self.program.inst_mut(object) {
            match existing {
                Some(index) => inst.members[index] = (key, member),
                None => inst.members.push((key, member)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        diagnostics::DiagnosticTag,
        ssa::{BlueprintMember, ConstValue, InstKind, MemberRoot, Program, SideEffectKind, SsaType},
        ProgramContext,
    };

    fn program() -> Program {
        Program::new("test", ProgramContext::default().into_shared())
    }

    #[test]
    fn test_member_write_then_read() {
        let mut program = program();
        let mut b = program.new_function_builder("main");
        let object = b.emit_make(None).unwrap();
        let one = b.emit_const(1);
        b.write_member_by_name(object, "x", one).unwrap();
        assert_eq!(b.read_member_by_name(object, "x"), one);
        b.finish();

        let inst = program.instruction(one).unwrap();
        assert_eq!(inst.object(), Some(object));
        assert_eq!(program.instruction(object).unwrap().members().len(), 1);
    }

    #[test]
    fn test_member_merges_through_phi() {
        let mut program = program();
        let mut b = program.new_function_builder("main");
        let cond = b.new_param("cond");
        let object = b.emit_make(None).unwrap();
        let zero = b.emit_const(0);
        b.write_member_by_name(object, "x", zero);

        let yes = b.new_basic_block("if.true");
        let no = b.new_basic_block("if.false");
        let done = b.new_basic_block_unsealed("if.done");
        b.emit_if(cond, yes, no);
        b.set_current_block(yes);
        let one = b.emit_const(1);
        b.write_member_by_name(object, "x", one);
        b.emit_jump(done);
        b.set_current_block(no);
        b.emit_jump(done);
        b.seal(done);
        b.set_current_block(done);
        let x = b.read_member_by_name(object, "x");
        b.finish();

        match program.instruction(x).unwrap().kind() {
            InstKind::Phi { edges } => assert_eq!(edges, &vec![one, zero]),
            other => panic!("expected phi, got {other:?}"),
        }
        assert!(program.verify().is_empty());
    }

    #[test]
    fn test_parameter_member_and_pointer_side_effect() {
        let mut program = program();
        let mut b = program.new_function_builder("set_x");
        let o = b.new_param("o");
        let before = b.read_member_by_name(o, "x");
        let one = b.emit_const(1);
        b.write_member_by_name(o, "x", one);
        b.finish();
        let function = b.function();

        match program.instruction(before).unwrap().kind() {
            InstKind::ParameterMember { name, member } => {
                assert_eq!(name, "o.x");
                assert_eq!(member.root, MemberRoot::Parameter(0));
                assert_eq!(member.path, vec![ConstValue::Str("x".into())]);
            }
            other => panic!("expected parameter member, got {other:?}"),
        }
        let func = program.function(function).unwrap();
        let side_effect = func.side_effect("o.x").unwrap();
        assert_eq!(side_effect.kind, SideEffectKind::Pointer);
        assert_eq!(side_effect.modified, Some(one));
    }

    #[test]
    fn test_pointer_side_effect_at_call_site() {
        let mut program = program();
        let mut b = program.new_function_builder("main");
        let set_x = b.build_closure("set_x", |b| {
            let o = b.new_param("o");
            let one = b.emit_const(1);
            b.write_member_by_name(o, "x", one);
        });
        let object = b.emit_make(None).unwrap();
        let zero = b.emit_const(0);
        b.write_member_by_name(object, "x", zero);
        let call = b.emit_call(set_x, vec![object]).unwrap();
        let x = b.read_member_by_name(object, "x");
        b.finish();

        match program.instruction(x).unwrap().kind() {
            InstKind::SideEffect { call: from, name, .. } => {
                assert_eq!(*from, call);
                assert_eq!(name, "o.x");
            }
            other => panic!("expected side effect, got {other:?}"),
        }
        assert!(program.verify().is_empty());
    }

    #[test]
    fn test_blueprint_members() {
        let mut program = program();
        let method = program.new_function("Point.len", None);
        let point = program.new_blueprint("Point");
        {
            let bp = program.blueprint_mut(point).unwrap();
            bp.add_method("len", method);
            bp.add_member("x", SsaType::Number);
            bp.add_static_member("ORIGIN", ConstValue::Int(0));
        }
        assert!(matches!(
            program.lookup_blueprint_member(point, "len"),
            Some(BlueprintMember::Method(_))
        ));

        let mut b = program.new_function_builder("main");
        let p = b.emit_make(Some(point)).unwrap();
        let len = b.read_member_by_name(p, "len");
        let x = b.read_member_by_name(p, "x");
        let origin = b.read_member_by_name(p, "ORIGIN");
        let missing = b.read_member_by_name(p, "y");
        b.finish();

        assert_eq!(program.instruction(len).unwrap().kind(), &InstKind::Function(method));
        assert_eq!(program.instruction(x).unwrap().ty(), &SsaType::Number);
        assert_eq!(program.const_value(origin), Some(&ConstValue::Int(0)));
        assert!(matches!(
            program.instruction(missing).unwrap().kind(),
            InstKind::Field { .. }
        ));
        assert!(program
            .diagnostics()
            .iter()
            .any(|d| d.tag == DiagnosticTag::InvalidMember));
    }

    #[test]
    fn test_member_of_primitive_is_invalid() {
        let mut program = program();
        let mut b = program.new_function_builder("main");
        let n = b.emit_const(1);
        let member = b.read_member_by_name(n, "x");
        b.finish();

        assert!(program.instruction(member).unwrap().kind().is_undefined());
        assert_eq!(program.diagnostics()[0].tag, DiagnosticTag::InvalidMember);
    }
}
