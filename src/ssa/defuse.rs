//! Def-use graph primitives.
//!
//! Every def-use edge is stored twice: the user lists it among its operands
//! ([`crate::ssa::InstKind::operands`]) and the value lists the user in its user list. The
//! operations in this module are the only ones that change those edges after an instruction
//! was allocated, and each of them updates both sides.
//!
//! # Operations
//!
//! - [`Program::replace_value`] - rewire the operand slots of one user
//! - [`Program::replace_all_value`] - rewire every user, the variable versions bound to the
//!   value, its member relationships and the name index
//! - [`Program::delete_inst`] - splice an unused instruction out of its block
//!
//! ```rust,ignore
//! program.replace_all_value(phi, same)?;
//! program.delete_inst(phi)?;
//! ```

use tracing::{error, trace};

use crate::{
    error::Error,
    ssa::{Program, SymbolKind, ValueId},
    Result,
};

impl Program {
    /// Returns the users of `value`.
    #[must_use]
    pub fn users(&self, value: ValueId) -> &[ValueId] {
        self.inst(value).map_or(&[], |i| i.users.as_slice())
    }

    pub(crate) fn add_user(&mut self, value: ValueId, user: ValueId) {
        if let Some(inst) = self.inst_mut(value) {
            if !inst.users.contains(&user) {
                inst.users.push(user);
            }
        }
    }

    pub(crate) fn remove_user(&mut self, value: ValueId, user: ValueId) {
        if let Some(inst) = self.inst_mut(value) {
            inst.users.retain(|u| *u != user);
        }
    }

    /// Replaces the operand slots of `user` equal to `from` by `to` and moves the user edge.
    ///
    /// Returns `true` if any slot changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownValue`] if `user` or `to` is not a live instruction.
    pub fn replace_value(&mut self, user: ValueId, from: ValueId, to: ValueId) -> Result<bool> {
        if !self.is_live(to) {
            return Err(Error::UnknownValue(to));
        }
        let inst = self.inst_mut(user).ok_or(Error::UnknownValue(user))?;
        if !inst.kind.replace_operand(from, to) {
            return Ok(false);
        }

        self.remove_user(from, user);
        self.add_user(to, user);
        Ok(true)
    }

    /// Replaces every use of `from` by `to`.
    ///
    /// Besides the operand slots of all users this re-points:
    ///
    /// - the variable versions bound to `from`, so memoized reads see `to`
    /// - the member relationships: members of `from` become members of `to`, and if `from`
    ///   was itself a member, `to` takes its place in the object's member list
    /// - the member symbols keyed by `from`
    /// - the name index
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownValue`] if either value is not a live instruction, and
    /// [`Error::Invariant`] if a deleted instruction is still listed as a user of `from`.
    pub fn replace_all_value(&mut self, from: ValueId, to: ValueId) -> Result<()> {
        if from == to {
            return Ok(());
        }
        if !self.is_live(to) {
            return Err(Error::UnknownValue(to));
        }
        let dangling = self
            .inst(from)
            .ok_or(Error::UnknownValue(from))?
            .users
            .iter()
            .copied()
            .find(|user| !self.is_live(*user));
        if let Some(user) = dangling {
            error!(value = %from, user = %user, "BUG: deleted instruction still listed as user");
            return Err(invariant_error!("{} lists deleted user {}", from, user));
        }

        let source = self.inst_mut(from).ok_or(Error::UnknownValue(from))?;
        let users = std::mem::take(&mut source.users);
        let variables = std::mem::take(&mut source.variables);
        let members = std::mem::take(&mut source.members);
        let object = source.object;
        let key = source.key;
        let name = source.name.clone();

        for user in users {
            let changed = self
                .inst_mut(user)
                .is_some_and(|inst| inst.kind.replace_operand(from, to));
            if changed {
                self.add_user(to, user);
            }
        }

        for variable in &variables {
            self.variables[variable.index()].value = to;
        }

        if let Some(object) = object {
            if let Some(obj) = self.inst_mut(object) {
                for entry in &mut obj.members {
                    if entry.1 == from {
                        entry.1 = to;
                    }
                }
            }
        }

        for (_, member) in &members {
            if let Some(inst) = self.inst_mut(*member) {
                inst.object = Some(to);
            }
        }

        if let Some(target) = self.inst_mut(to) {
            target.variables.extend(variables);
            if target.object.is_none() {
                target.object = object;
                target.key = key;
            }
            for member in members {
                if !target.members.iter().any(|(_, m)| *m == member.1) {
                    target.members.push(member);
                }
            }
            if target.name.is_none() {
                target.name.clone_from(&name);
            }
        }

        self.rebind_member_symbols(from, to);
        if let Some(name) = name {
            self.rename_in_index(&name, from, to);
        }

        trace!(from = %from, to = %to, "replaced value");
        Ok(())
    }

    /// Moves the member symbols `#from.key` over to `#to.key`.
    fn rebind_member_symbols(&mut self, from: ValueId, to: ValueId) {
        let Some(symbols) = self.member_symbols.remove(&from) else {
            return;
        };

        for symbol in &symbols {
            let sym = &mut self.symbols[symbol.index()];
            let SymbolKind::Member { key, .. } = sym.kind else {
                continue;
            };
            sym.kind = SymbolKind::Member { object: to, key };

            let old_name = std::mem::take(&mut sym.name);
            let suffix = old_name
                .split_once('.')
                .map_or(String::new(), |(_, rest)| rest.to_string());
            let new_name = format!("#{}.{}", to.index(), suffix);
            sym.name.clone_from(&new_name);

            let scope = &mut self.scopes[sym.scope.index()];
            if scope.symbols.get(&old_name) == Some(symbol) {
                scope.symbols.remove(&old_name);
            }
            scope.symbols.entry(new_name).or_insert(*symbol);
        }

        self.member_symbols.entry(to).or_default().extend(symbols);
    }

    /// Removes an instruction which has no users anymore.
    ///
    /// The instruction is removed from its block's phi or instruction list and from the user
    /// list of every value it referenced. Uses of the instruction by itself (a phi listing
    /// itself as an edge) do not count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InstructionInUse`] while other instructions still use the value, and
    /// [`Error::UnknownValue`] if it is not a live instruction.
    pub fn delete_inst(&mut self, id: ValueId) -> Result<()> {
        let inst = self.inst(id).ok_or(Error::UnknownValue(id))?;
        let users = inst.users.iter().filter(|u| **u != id).count();
        if users > 0 {
            return Err(Error::InstructionInUse { value: id, users });
        }

        let block = inst.block;
        let global_id = inst.global_id;
        let operands = inst.kind.operands();
        let object = inst.object;
        let members: Vec<ValueId> = inst.members.iter().map(|(_, m)| *m).collect();

        let blk = self.blk_mut(block);
        blk.remove_inst(id);
        blk.incomplete_phis.retain(|(_, phi)| *phi != id);

        for operand in operands {
            if operand != id {
                self.remove_user(operand, id);
            }
        }
        if let Some(object) = object {
            if let Some(obj) = self.inst_mut(object) {
                obj.members.retain(|(_, m)| *m != id);
            }
        }
        for member in members {
            if let Some(inst) = self.inst_mut(member) {
                inst.object = None;
                inst.key = None;
            }
        }

        self.forget_global(global_id);
        self.instructions[id.index()] = None;
        trace!(value = %id, block = %block, "deleted instruction");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::Error,
        ssa::{BinaryOp, BindingOrigin, ConstValue, InstKind, Program, SsaType, SymbolKind},
        ProgramContext,
    };

    fn setup() -> (Program, crate::ssa::BlockId) {
        let mut program = Program::new("test", ProgramContext::default().into_shared());
        let main = program.new_function("main", None);
        let entry = program.function(main).unwrap().entry();
        (program, entry)
    }

    fn push(program: &mut Program, kind: InstKind, block: crate::ssa::BlockId) -> crate::ssa::ValueId {
        let id = program.alloc_value(kind, block, SsaType::Any, None);
        program.blk_mut(block).insts.push(id);
        id
    }

    #[test]
    fn test_replace_value() {
        let (mut program, entry) = setup();
        let a = push(&mut program, InstKind::Const(ConstValue::Int(1)), entry);
        let b = push(&mut program, InstKind::Const(ConstValue::Int(2)), entry);
        let neg = push(
            &mut program,
            InstKind::UnOp {
                op: crate::ssa::UnaryOp::Neg,
                operand: a,
            },
            entry,
        );

        assert!(program.replace_value(neg, a, b).unwrap());
        assert!(program.users(a).is_empty());
        assert_eq!(program.users(b), &[neg]);
        assert_eq!(program.instruction(neg).unwrap().operands(), vec![b]);
        assert!(!program.replace_value(neg, a, b).unwrap());
    }

    #[test]
    fn test_replace_all_value_rewires_users_and_variables() {
        let (mut program, entry) = setup();
        let a = push(&mut program, InstKind::Const(ConstValue::Int(1)), entry);
        let b = push(&mut program, InstKind::Const(ConstValue::Int(2)), entry);
        let sum = push(
            &mut program,
            InstKind::BinOp {
                op: BinaryOp::Add,
                lhs: a,
                rhs: a,
            },
            entry,
        );

        let scope = program.function(crate::ssa::FunctionId::new(0)).unwrap().root_scope();
        let symbol = program.new_symbol(scope, "x", SymbolKind::Declared);
        let var = program.new_variable(symbol, a, entry, true, BindingOrigin::Write, None);

        program.replace_all_value(a, b).unwrap();
        assert!(program.users(a).is_empty());
        assert_eq!(program.users(b), &[sum]);
        assert_eq!(program.instruction(sum).unwrap().operands(), vec![b, b]);
        assert_eq!(program.variable(var).unwrap().value(), b);
        assert_eq!(program.instruction(b).unwrap().variables(), &[var]);
    }

    #[test]
    fn test_replace_all_value_moves_members() {
        let (mut program, entry) = setup();
        let obj = push(&mut program, InstKind::Make { blueprint: None }, entry);
        let other = push(&mut program, InstKind::Make { blueprint: None }, entry);
        let key = push(&mut program, InstKind::Const(ConstValue::from("x")), entry);
        let member = push(&mut program, InstKind::Field { object: obj, key }, entry);
        program.inst_mut(member).unwrap().object = Some(obj);
        program.inst_mut(member).unwrap().key = Some(key);
        program.inst_mut(obj).unwrap().members.push((key, member));

        let scope = program.function(crate::ssa::FunctionId::new(0)).unwrap().root_scope();
        let name = format!("#{}.x", obj.index());
        let symbol = program.new_symbol(scope, &name, SymbolKind::Member { object: obj, key });

        program.replace_all_value(obj, other).unwrap();
        assert_eq!(program.instruction(member).unwrap().object(), Some(other));
        assert_eq!(program.instruction(other).unwrap().members(), &[(key, member)]);
        assert!(program.instruction(obj).unwrap().members().is_empty());

        let renamed = format!("#{}.x", other.index());
        assert_eq!(program.symbol(symbol).unwrap().name(), renamed);
        assert_eq!(program.resolve_symbol(scope, &renamed), Some(symbol));
        assert_eq!(program.resolve_symbol(scope, &name), None);
    }

    #[test]
    fn test_delete_inst_with_users_is_rejected() {
        let (mut program, entry) = setup();
        let a = push(&mut program, InstKind::Const(ConstValue::Int(1)), entry);
        let neg = push(
            &mut program,
            InstKind::UnOp {
                op: crate::ssa::UnaryOp::Neg,
                operand: a,
            },
            entry,
        );

        match program.delete_inst(a) {
            Err(Error::InstructionInUse { value, users }) => {
                assert_eq!(value, a);
                assert_eq!(users, 1);
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(program.instruction(a).is_some());

        program.delete_inst(neg).unwrap();
        assert!(program.users(a).is_empty());
        assert!(!program.block(entry).unwrap().insts().contains(&neg));

        program.delete_inst(a).unwrap();
        assert!(program.instruction(a).is_none());
        assert!(matches!(program.delete_inst(a), Err(Error::UnknownValue(_))));
    }

    #[test]
    fn test_delete_self_referencing_phi() {
        let (mut program, entry) = setup();
        let a = push(&mut program, InstKind::Const(ConstValue::Int(1)), entry);
        let phi = program.alloc_value(InstKind::Phi { edges: vec![a] }, entry, SsaType::Any, None);
        program.blk_mut(entry).phis.push(phi);
        program.inst_mut(phi).unwrap().kind = InstKind::Phi { edges: vec![a, phi] };
        program.add_user(phi, phi);

        program.delete_inst(phi).unwrap();
        assert!(program.users(a).is_empty());
        assert!(program.block(entry).unwrap().phis().is_empty());
    }

    #[test]
    fn test_replace_all_value_rejects_dangling_user() {
        let (mut program, entry) = setup();
        let a = push(&mut program, InstKind::Const(ConstValue::Int(1)), entry);
        let b = push(&mut program, InstKind::Const(ConstValue::Int(2)), entry);
        let ghost = push(&mut program, InstKind::Const(ConstValue::Int(3)), entry);
        program.add_user(a, ghost);
        program.instructions[ghost.index()] = None;

        assert!(matches!(
            program.replace_all_value(a, b),
            Err(Error::Invariant { .. })
        ));
        assert_eq!(program.users(a), &[ghost]);
    }
}
