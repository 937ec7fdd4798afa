//! Structural verification of a built program.
//!
//! [`Program::verify`] checks the invariants every mutation has to preserve:
//!
//! - def-use reciprocity: `u` in `v.users` iff `v` in `u.operands`
//! - CFG reciprocity: `s` in `b.succs` iff `b` in `s.preds`
//! - phi completeness: phis of sealed blocks have one live edge per predecessor
//! - block membership: instructions listed in a block name that block as their owner
//! - finish flag: a block is finished iff its last instruction is a terminator, and no
//!   terminator appears anywhere else
//!
//! Functions are checked in parallel with `rayon`.

use std::fmt;

use rayon::prelude::*;
use strum::IntoStaticStr;

use crate::ssa::{FunctionId, InstKind, Program, ValueId};

/// Which invariant a [`Violation`] breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, IntoStaticStr)]
pub enum ViolationKind {
    /// A def-use edge is only recorded on one side.
    DefUse,
    /// A CFG edge is only recorded on one side.
    Cfg,
    /// A phi of a sealed block does not have one live edge per predecessor.
    PhiIncomplete,
    /// An instruction is listed in a block it does not belong to.
    BlockMembership,
    /// The finish flag disagrees with the instruction list.
    FinishFlag,
}

/// A broken invariant found by [`Program::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// The broken invariant
    pub kind: ViolationKind,
    /// Function the violation was found in
    pub function: FunctionId,
    /// Description
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}: {}", self.kind, self.function, self.message)
    }
}

impl Program {
    /// Checks the structural invariants of every function, returns all violations found.
    #[must_use]
    pub fn verify(&self) -> Vec<Violation> {
        (0..self.functions.len())
            .into_par_iter()
            .flat_map_iter(|index| self.verify_function(FunctionId::new(index)))
            .collect()
    }

    /// Checks the structural invariants of one function.
    #[must_use]
    pub fn verify_function(&self, function: FunctionId) -> Vec<Violation> {
        let mut violations = Vec::new();
        let Some(func) = self.function(function) else {
            return violations;
        };
        let mut report = |kind: ViolationKind, message: String| {
            violations.push(Violation {
                kind,
                function,
                message,
            });
        };

        for block_id in &func.blocks {
            let block = self.blk(*block_id);

            for succ in &block.succs {
                if !self.blk(*succ).preds.contains(block_id) {
                    report(
                        ViolationKind::Cfg,
                        format!("{block_id} -> {succ} missing in preds of {succ}"),
                    );
                }
            }
            for pred in &block.preds {
                if !self.blk(*pred).succs.contains(block_id) {
                    report(
                        ViolationKind::Cfg,
                        format!("{pred} -> {block_id} missing in succs of {pred}"),
                    );
                }
            }

            for id in block.phis.iter().chain(block.insts.iter()) {
                let Some(inst) = self.inst(*id) else {
                    report(
                        ViolationKind::BlockMembership,
                        format!("{block_id} lists deleted instruction {id}"),
                    );
                    continue;
                };
                if inst.block != *block_id {
                    report(
                        ViolationKind::BlockMembership,
                        format!("{id} is listed in {block_id} but owned by {}", inst.block),
                    );
                }
            }

            for phi in &block.phis {
                let Some(InstKind::Phi { edges }) = self.kind(*phi) else {
                    report(
                        ViolationKind::BlockMembership,
                        format!("{phi} is listed as phi of {block_id} but is not a phi"),
                    );
                    continue;
                };
                if !block.is_sealed() {
                    continue;
                }
                if edges.len() != block.preds.len() {
                    report(
                        ViolationKind::PhiIncomplete,
                        format!(
                            "{phi} has {} edge(s) for {} predecessor(s) of {block_id}",
                            edges.len(),
                            block.preds.len()
                        ),
                    );
                }
                if let Some(dead) = edges.iter().find(|e| !self.is_live(**e)) {
                    report(
                        ViolationKind::PhiIncomplete,
                        format!("{phi} has dead edge {dead}"),
                    );
                }
            }

            let last_is_terminator = block
                .insts
                .last()
                .and_then(|id| self.kind(*id))
                .is_some_and(InstKind::is_terminator);
            if block.is_finished() != last_is_terminator {
                report(
                    ViolationKind::FinishFlag,
                    format!(
                        "{block_id} finished={} but last instruction terminator={}",
                        block.is_finished(),
                        last_is_terminator
                    ),
                );
            }
            let inner_terminators = block
                .insts
                .iter()
                .rev()
                .skip(1)
                .filter(|id| self.kind(**id).is_some_and(InstKind::is_terminator))
                .count();
            if inner_terminators > 0 {
                report(
                    ViolationKind::FinishFlag,
                    format!("{block_id} has {inner_terminators} terminator(s) before its end"),
                );
            }
        }

        for inst in self.instructions().filter(|i| i.function == function) {
            for operand in inst.kind.operands() {
                match self.inst(operand) {
                    Some(value) if value.users.contains(&inst.id) => {}
                    Some(_) => report(
                        ViolationKind::DefUse,
                        format!("{} uses {operand} but is not among its users", inst.id),
                    ),
                    None => report(
                        ViolationKind::DefUse,
                        format!("{} uses deleted value {operand}", inst.id),
                    ),
                }
            }
            for user in &inst.users {
                let uses = self
                    .inst(*user)
                    .is_some_and(|u| u.kind.operands().contains(&inst.id));
                if !uses {
                    report(
                        ViolationKind::DefUse,
                        format!("{user} is a user of {} but does not use it", inst.id),
                    );
                }
            }
        }

        violations
    }

    /// Returns `true` if `value` is live and its user list is consistent.
    #[must_use]
    pub fn is_consistent(&self, value: ValueId) -> bool {
        self.inst(value).is_some_and(|inst| {
            inst.users.iter().all(|u| {
                self.inst(*u)
                    .is_some_and(|user| user.kind.operands().contains(&value))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ssa::{ConstValue, InstKind, Program, SsaType, ViolationKind},
        ProgramContext,
    };

    #[test]
    fn test_verify_empty_program() {
        let mut program = Program::new("test", ProgramContext::default().into_shared());
        program.new_function("main", None);
        assert!(program.verify().is_empty());
    }

    #[test]
    fn test_verify_detects_broken_edges() {
        let mut program = Program::new("test", ProgramContext::default().into_shared());
        let main = program.new_function("main", None);
        let entry = program.function(main).unwrap().entry();
        let scope = program.function(main).unwrap().root_scope();
        let other = program.new_block(main, "other", scope, true);

        let a = program.alloc_value(InstKind::Const(ConstValue::Int(1)), entry, SsaType::Number, None);
        program.blk_mut(entry).insts.push(a);
        let neg = program.alloc_value(
            InstKind::UnOp {
                op: crate::ssa::UnaryOp::Neg,
                operand: a,
            },
            entry,
            SsaType::Number,
            None,
        );
        program.blk_mut(entry).insts.push(neg);

        program.inst_mut(a).unwrap().users.clear();
        program.blk_mut(entry).succs.push(other);

        let violations = program.verify();
        assert!(violations.iter().any(|v| v.kind == ViolationKind::DefUse));
        assert!(violations.iter().any(|v| v.kind == ViolationKind::Cfg));
        assert!(program.is_consistent(neg));
    }
}
