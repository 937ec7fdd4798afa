//! Phi construction and trivial phi elimination.
//!
//! A phi is created before its edges are read, so cyclic reads through loops terminate at
//! the phi itself. Once all edges are known, a phi that merges only itself and one other
//! value is replaced by that value, and phis using it are re-checked.

use tracing::{error, trace};

use crate::{
    builder::{
        emit::Placement,
        variable::{Pending, Step},
        FunctionBuilder,
    },
    diagnostics::{DiagnosticTag, Severity},
    ssa::{BlockFlags, BlockId, InstKind, SsaType, SymbolId, UndefinedKind, ValueId},
};

impl<'p> FunctionBuilder<'p> {
    /// Declares the predecessor set of `block` final and completes its incomplete phis.
    ///
    /// Sealing a sealed block changes nothing and is reported.
    pub fn seal(&mut self, block: BlockId) {
        if !self.owns_block(block) {
            return;
        }
        if self.program.blk(block).is_sealed() {
            self.report_structure(
                DiagnosticTag::DoubleSeal,
                format!("{block} is already sealed"),
            );
            return;
        }

        let blk = self.program.blk_mut(block);
        blk.flags.insert(BlockFlags::SEALED);
        let incomplete = std::mem::take(&mut blk.incomplete_phis);
        trace!(block = %block, phis = incomplete.len(), "sealed block");

        for (symbol, phi) in incomplete {
            if self.program.is_live(phi) {
                self.add_phi_operands(symbol, phi);
            }
        }
    }

    pub(crate) fn new_phi(&mut self, block: BlockId, symbol: SymbolId) -> ValueId {
        let name = self.program.sym(symbol).name.clone();
        let phi = self.insert(
            InstKind::Phi { edges: Vec::new() },
            SsaType::Any,
            block,
            Placement::Phi,
        );
        self.set_name(phi, &name);
        phi
    }

    /// Reads `symbol` in every predecessor of the phi's block and appends the values as
    /// edges, then tries to remove the phi.
    pub(crate) fn add_phi_operands(&mut self, symbol: SymbolId, phi: ValueId) -> ValueId {
        let mut pending = Vec::new();
        let step = self.begin_operands(phi, &mut pending);
        self.resolve(symbol, step, pending)
    }

    /// Starts collecting the edges of `phi`, first predecessor first.
    pub(crate) fn begin_operands(&mut self, phi: ValueId, pending: &mut Vec<Pending>) -> Step {
        let Some(block) = self.program.inst(phi).map(|i| i.block) else {
            return Step::Value(phi);
        };
        let preds = self.program.blk(block).preds.clone();
        self.building_phis.insert(phi);
        self.next_operand(
            PhiOperands {
                phi,
                block,
                preds,
                next: 0,
            },
            pending,
        )
    }

    /// Appends the value read in the current predecessor and moves on to the next one.
    pub(crate) fn push_operand(
        &mut self,
        mut operands: PhiOperands,
        value: ValueId,
        pending: &mut Vec<Pending>,
    ) -> Step {
        let phi = operands.phi;
        let Some(InstKind::Phi { edges }) = self.program.inst_mut(phi).map(|i| &mut i.kind) else {
            error!(phi = %phi, "BUG: phi deleted while reading its edges");
            self.building_phis.remove(&phi);
            return Step::Value(value);
        };
        edges.push(value);
        self.program.add_user(value, phi);
        operands.next += 1;
        self.next_operand(operands, pending)
    }

    fn next_operand(&mut self, operands: PhiOperands, pending: &mut Vec<Pending>) -> Step {
        if let Some(pred) = operands.preds.get(operands.next).copied() {
            pending.push(Pending::Operands(operands));
            return Step::Exit(pred);
        }
        self.building_phis.remove(&operands.phi);
        Step::Value(self.complete_phi(operands.phi, operands.block))
    }

    /// Checks and types a phi whose edges are all read, then tries to remove it.
    fn complete_phi(&mut self, phi: ValueId, block: BlockId) -> ValueId {
        let edges = match self.program.kind(phi) {
            Some(InstKind::Phi { edges }) => edges.clone(),
            _ => Vec::new(),
        };
        let preds = self.program.blk(block).preds.len();
        if edges.len() != preds {
            self.report(
                Severity::Error,
                DiagnosticTag::PhiEdgeMismatch,
                format!("{phi} has {} edge(s) for {preds} predecessor(s)", edges.len()),
            );
        }
        let types: Vec<SsaType> = edges
            .iter()
            .filter(|e| **e != phi)
            .map(|e| self.program.type_of(*e))
            .collect();
        if let Some(inst) = self.program.inst_mut(phi) {
            inst.ty = SsaType::unify_all(types.iter());
        }

        if self.config().eliminate_trivial_phis {
            self.try_remove_trivial_phi(phi)
        } else {
            phi
        }
    }

    /// Replaces `phi` by the single value it merges, if there is one, then re-checks the
    /// phis that used it.
    ///
    /// Returns the value standing for the phi afterwards.
    pub(crate) fn try_remove_trivial_phi(&mut self, phi: ValueId) -> ValueId {
        let Some((same, mut worklist)) = self.remove_if_trivial(phi) else {
            return phi;
        };
        while let Some(user) = worklist.pop() {
            let is_phi = self.program.kind(user).is_some_and(InstKind::is_phi);
            if !is_phi || self.building_phis.contains(&user) {
                continue;
            }
            if let Some((_, users)) = self.remove_if_trivial(user) {
                worklist.extend(users);
            }
        }
        same
    }

    /// Removes `phi` if it merges at most one value besides itself.
    ///
    /// Returns the replacement and the former users of the phi.
    fn remove_if_trivial(&mut self, phi: ValueId) -> Option<(ValueId, Vec<ValueId>)> {
        let inst = self.program.inst(phi)?;
        let InstKind::Phi { edges } = &inst.kind else {
            return None;
        };

        let mut same = None;
        for edge in edges {
            if Some(*edge) == same || *edge == phi {
                continue;
            }
            if same.is_some() {
                return None;
            }
            same = Some(*edge);
        }

        let block = inst.block;
        let users: Vec<ValueId> = inst.users.iter().filter(|u| **u != phi).copied().collect();
        let same = match same {
            Some(value) => value,
            None => {
                let name = inst.name.clone().unwrap_or_default();
                self.undefined_for_phi(block, &name)
            }
        };

        if let Err(e) = self.program.replace_all_value(phi, same) {
            error!(phi = %phi, error = %e, "BUG: failed to replace trivial phi");
            return None;
        }
        if let Err(e) = self.program.delete_inst(phi) {
            error!(phi = %phi, error = %e, "BUG: failed to delete trivial phi");
        }
        trace!(phi = %phi, replacement = %same, "removed trivial phi");
        Some((same, users))
    }

    /// A phi that only merges itself reads a name no path defines.
    fn undefined_for_phi(&mut self, block: BlockId, name: &str) -> ValueId {
        let undefined = self.insert(
            InstKind::Undefined {
                name: name.to_string(),
                kind: UndefinedKind::Value,
            },
            SsaType::Any,
            block,
            Placement::Front,
        );
        self.set_name(undefined, name);
        if self.config().report_undefined {
            let function = self.program.blk(block).function;
            self.report_in(
                function,
                Severity::Warn,
                DiagnosticTag::UndefinedValue,
                format!("{name} is not defined"),
            );
        }
        undefined
    }
}

/// A phi collecting one edge per predecessor of its block.
pub(crate) struct PhiOperands {
    phi: ValueId,
    block: BlockId,
    preds: Vec<BlockId>,
    next: usize,
}

#[cfg(test)]
mod tests {
    use crate::{
        diagnostics::DiagnosticTag,
        ssa::{BinaryOp, InstKind, Program},
        BuildConfig, ProgramContext,
    };

    fn program() -> Program {
        Program::new("test", ProgramContext::default().into_shared())
    }

    #[test]
    fn test_merge_of_equal_values_has_no_phi() {
        let mut program = program();
        let mut b = program.new_function_builder("main");
        let cond = b.new_param("cond");
        let one = b.emit_const(1);
        b.write_variable("a", one);

        let left = b.new_basic_block("left");
        let right = b.new_basic_block("right");
        let join = b.new_basic_block_unsealed("join");
        b.emit_if(cond, left, right);
        b.set_current_block(left);
        b.emit_jump(join);
        b.set_current_block(right);
        b.emit_jump(join);
        b.seal(join);
        b.set_current_block(join);

        assert_eq!(b.read_variable("a"), one);
        b.finish();
        assert!(program.block(join).unwrap().phis().is_empty());
    }

    #[test]
    fn test_incomplete_phi_completed_on_seal() {
        let mut program = program();
        let mut b = program.new_function_builder("main");
        let cond = b.new_param("cond");
        let zero = b.emit_const(0);
        b.write_variable("i", zero);

        let header = b.new_basic_block_unsealed("header");
        b.emit_jump(header);
        b.set_current_block(header);
        let i = b.read_variable("i");
        assert_eq!(b.program().block(header).unwrap().incomplete_phi_count(), 1);

        let body = b.new_basic_block("body");
        let exit = b.new_basic_block("exit");
        b.emit_loop(cond, body, exit);
        b.set_current_block(body);
        let one = b.emit_const(1);
        let next = b.emit_binop(BinaryOp::Add, i, one).unwrap();
        b.write_variable("i", next);
        b.emit_jump(header);
        b.seal(header);
        b.finish();

        let inst = program.instruction(i).unwrap();
        match inst.kind() {
            InstKind::Phi { edges } => assert_eq!(edges, &vec![zero, next]),
            other => panic!("expected phi, got {other:?}"),
        }
        assert!(program.verify().is_empty());
    }

    #[test]
    fn test_loop_without_writes_removes_phi() {
        let mut program = program();
        let mut b = program.new_function_builder("main");
        let cond = b.new_param("cond");
        let zero = b.emit_const(0);
        b.write_variable("i", zero);

        let header = b.new_basic_block_unsealed("header");
        b.emit_jump(header);
        b.set_current_block(header);
        let body = b.new_basic_block("body");
        let exit = b.new_basic_block("exit");
        b.emit_loop(cond, body, exit);
        b.set_current_block(body);
        let phi = b.read_variable("i");
        b.emit_jump(header);
        b.seal(header);
        b.set_current_block(exit);
        let after = b.read_variable("i");
        b.finish();

        assert_eq!(after, zero);
        assert!(program.instruction(phi).is_none());
        assert!(program.block(header).unwrap().phis().is_empty());
        assert!(program.verify().is_empty());
    }

    #[test]
    fn test_phi_kept_when_elimination_disabled() {
        let context = ProgramContext::new(BuildConfig {
            eliminate_trivial_phis: false,
            ..BuildConfig::default()
        })
        .into_shared();
        let mut program = Program::new("test", context);
        let mut b = program.new_function_builder("main");
        let cond = b.new_param("cond");
        let one = b.emit_const(1);
        b.write_variable("a", one);
        let left = b.new_basic_block("left");
        let right = b.new_basic_block("right");
        let join = b.new_basic_block_unsealed("join");
        b.emit_if(cond, left, right);
        b.set_current_block(left);
        b.emit_jump(join);
        b.set_current_block(right);
        b.emit_jump(join);
        b.seal(join);
        b.set_current_block(join);
        let a = b.read_variable("a");
        b.finish();

        assert!(program.instruction(a).unwrap().kind().is_phi());
    }

    #[test]
    fn test_phi_without_edges_becomes_undefined() {
        let mut program = program();
        let mut b = program.new_function_builder("main");
        let orphan = b.new_basic_block_unsealed("orphan");
        b.emit_return(vec![]);
        b.set_current_block(orphan);
        let phi = b.read_variable("a");
        b.seal(orphan);
        let a = b.read_variable("a");
        b.finish();

        assert!(program.instruction(phi).is_none());
        let inst = program.instruction(a).unwrap();
        assert!(inst.kind().is_undefined());
        assert_eq!(program.block(orphan).unwrap().insts()[0], a);
        let diagnostics = program.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].tag, DiagnosticTag::UndefinedValue);
        assert!(program.verify().is_empty());
    }

    #[test]
    fn test_long_block_chain_resolves() {
        let mut program = program();
        let mut b = program.new_function_builder("main");
        let one = b.emit_const(1);
        b.write_variable("a", one);
        for _ in 0..20_000 {
            let next = b.new_basic_block("next");
            b.emit_jump(next);
            b.set_current_block(next);
        }
        assert_eq!(b.read_variable("a"), one);
        b.finish();

        assert!(program.verify().is_empty());
    }

    #[test]
    fn test_double_seal_is_reported() {
        let mut program = program();
        let mut b = program.new_function_builder("main");
        let entry = b.current_block();
        b.seal(entry);
        b.finish();

        let diagnostics = program.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].tag, DiagnosticTag::DoubleSeal);
        assert!(program.block(entry).unwrap().is_sealed());
    }
}
