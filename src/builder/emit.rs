//! Instruction emission.
//!
//! Every instruction enters the IR through [`FunctionBuilder::insert`], which allocates it,
//! records it as a user of its operands and places it in a block. Once the builder has
//! observed cancellation, new instructions stay detached. The public `emit_*`
//! methods add the construction rules on top: nothing is appended after a terminator,
//! constants are folded, terminators add their CFG edges.

use tracing::trace;

use crate::{
    builder::FunctionBuilder,
    diagnostics::DiagnosticTag,
    ssa::{
        BinaryOp, BlockId, BlueprintId, ConstValue, InstKind, Reachability, SsaType,
        SwitchLabel, UnaryOp, UndefinedKind, ValueId,
    },
};

/// Where [`FunctionBuilder::insert`] puts a new instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    /// End of the instruction list
    Append,
    /// Before the terminator of a finished block, at the end otherwise
    BeforeTerminator,
    /// Start of the instruction list
    Front,
    /// Phi list
    Phi,
    /// Not listed in any block (parameters, externs)
    Detached,
}

/// Values produced by [`FunctionBuilder::emit_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextValues {
    /// The `Next` instruction
    pub next: ValueId,
    /// Current key
    pub key: ValueId,
    /// Current element
    pub field: ValueId,
    /// `true` while the iteration produced a step
    pub ok: ValueId,
}

impl<'p> FunctionBuilder<'p> {
    pub(crate) fn insert(
        &mut self,
        kind: InstKind,
        ty: SsaType,
        block: BlockId,
        placement: Placement,
    ) -> ValueId {
        let id = self.program.alloc_value(kind, block, ty, self.frame.range);
        // A cancelled builder still hands out values but lists none of them in a block.
        let placement = if self.frame.stopped {
            Placement::Detached
        } else {
            placement
        };
        let blk = self.program.blk_mut(block);
        match placement {
            Placement::Append => blk.insts.push(id),
            Placement::BeforeTerminator => {
                if blk.is_finished() && !blk.insts.is_empty() {
                    let at = blk.insts.len() - 1;
                    blk.insts.insert(at, id);
                } else {
                    blk.insts.push(id);
                }
            }
            Placement::Front => blk.insts.insert(0, id),
            Placement::Phi => blk.phis.push(id),
            Placement::Detached => {}
        }
        id
    }

    pub(crate) fn set_name(&mut self, value: ValueId, name: &str) {
        if let Some(inst) = self.program.inst_mut(value) {
            inst.name = Some(name.to_string());
        }
    }

    fn can_emit(&self) -> bool {
        if self.frame.stopped {
            return false;
        }
        if self.is_finished() {
            self.report_structure(
                DiagnosticTag::FinishedBlock,
                format!("instruction emitted into finished block {}", self.frame.block),
            );
            return false;
        }
        true
    }

    /// Appends a value instruction to the current block.
    pub(crate) fn emit_value(&mut self, kind: InstKind, ty: SsaType) -> Option<ValueId> {
        if !self.can_emit() {
            return None;
        }
        Some(self.insert(kind, ty, self.frame.block, Placement::Append))
    }

    /// Appends a terminator, marks the block finished and adds the CFG edges.
    pub(crate) fn emit_terminator(&mut self, kind: InstKind) -> Option<ValueId> {
        if !self.can_emit() {
            return None;
        }
        let block = self.frame.block;
        let successors = kind.successors();
        if !successors.iter().all(|succ| self.owns_block(*succ)) {
            return None;
        }
        let id = self.insert(kind, SsaType::Any, block, Placement::Append);
        self.mark_finished(block);
        for succ in successors {
            self.add_succ(block, succ);
        }
        Some(id)
    }

    /// Emits a constant.
    ///
    /// Constants are pure, in a finished block they go before the terminator.
    pub fn emit_const(&mut self, value: impl Into<ConstValue>) -> ValueId {
        let value = value.into();
        let ty = value.ty();
        self.insert(
            InstKind::Const(value),
            ty,
            self.frame.block,
            Placement::BeforeTerminator,
        )
    }

    /// Emits a placeholder for a declared but unassigned name at the start of the block.
    pub fn emit_undefined(&mut self, name: &str) -> ValueId {
        let id = self.insert(
            InstKind::Undefined {
                name: name.to_string(),
                kind: UndefinedKind::Declared,
            },
            SsaType::Any,
            self.frame.block,
            Placement::Front,
        );
        self.set_name(id, name);
        id
    }

    /// Emits `lhs op rhs`, folded to a constant when both operands are constants.
    pub fn emit_binop(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> Option<ValueId> {
        if self.config().fold_constants {
            let folded = match (self.program.const_value(lhs), self.program.const_value(rhs)) {
                (Some(l), Some(r)) => l.fold_binary(op, r),
                _ => None,
            };
            if let Some(value) = folded {
                trace!(op = %op, lhs = %lhs, rhs = %rhs, value = %value, "folded binary operation");
                return Some(self.emit_const(value));
            }
        }
        let ty = op.result_type(&self.program.type_of(lhs), &self.program.type_of(rhs));
        self.emit_value(InstKind::BinOp { op, lhs, rhs }, ty)
    }

    /// Emits `op operand`, folded to a constant when the operand is a constant.
    pub fn emit_unop(&mut self, op: UnaryOp, operand: ValueId) -> Option<ValueId> {
        if self.config().fold_constants {
            if let Some(value) = self
                .program
                .const_value(operand)
                .and_then(|c| c.fold_unary(op))
            {
                return Some(self.emit_const(value));
            }
        }
        let ty = op.result_type(&self.program.type_of(operand));
        self.emit_value(InstKind::UnOp { op, operand }, ty)
    }

    /// Emits an explicit phi in the current block, one edge per predecessor.
    pub fn emit_phi(&mut self, name: &str, edges: Vec<ValueId>) -> Option<ValueId> {
        if self.frame.stopped {
            return None;
        }
        let block = self.frame.block;
        let preds = self.program.blk(block).preds.len();
        if edges.len() != preds {
            self.report(
                crate::diagnostics::Severity::Error,
                DiagnosticTag::PhiEdgeMismatch,
                format!(
                    "phi {name} has {} edge(s) for {preds} predecessor(s) of {block}",
                    edges.len()
                ),
            );
        }
        let types: Vec<SsaType> = edges.iter().map(|e| self.program.type_of(*e)).collect();
        let id = self.insert(
            InstKind::Phi { edges },
            SsaType::unify_all(types.iter()),
            block,
            Placement::Phi,
        );
        self.set_name(id, name);
        Some(id)
    }

    /// Emits `jump to`.
    pub fn emit_jump(&mut self, to: BlockId) -> Option<ValueId> {
        self.emit_terminator(InstKind::Jump { to })
    }

    /// Emits a two way branch. A constant condition marks the untaken arm unreachable.
    pub fn emit_if(&mut self, cond: ValueId, on_true: BlockId, on_false: BlockId) -> Option<ValueId> {
        let id = self.emit_terminator(InstKind::If {
            cond,
            on_true,
            on_false,
        })?;
        if on_true != on_false {
            if let Some(taken) = self.program.const_value(cond).and_then(ConstValue::as_bool) {
                let (t, f) = if taken {
                    (Reachability::Reachable, Reachability::Unreachable)
                } else {
                    (Reachability::Unreachable, Reachability::Reachable)
                };
                self.program.blk_mut(on_true).reachable = t;
                self.program.blk_mut(on_false).reachable = f;
            }
        }
        Some(id)
    }

    /// Emits a loop header branch to `body` or `exit`.
    pub fn emit_loop(&mut self, cond: ValueId, body: BlockId, exit: BlockId) -> Option<ValueId> {
        let id = self.emit_terminator(InstKind::Loop { cond, body, exit })?;
        if let Some(taken) = self.program.const_value(cond).and_then(ConstValue::as_bool) {
            self.program.blk_mut(body).reachable = if taken {
                Reachability::Reachable
            } else {
                Reachability::Unreachable
            };
        }
        Some(id)
    }

    /// Emits a multi way branch over `(label value, handler)` pairs.
    pub fn emit_switch(
        &mut self,
        cond: ValueId,
        default: BlockId,
        labels: Vec<(ValueId, BlockId)>,
    ) -> Option<ValueId> {
        let labels = labels
            .into_iter()
            .map(|(value, dest)| SwitchLabel { value, dest })
            .collect();
        self.emit_terminator(InstKind::Switch {
            cond,
            default,
            labels,
        })
    }

    /// Emits a return and records it on the function.
    pub fn emit_return(&mut self, results: Vec<ValueId>) -> Option<ValueId> {
        let id = self.emit_terminator(InstKind::Return { results })?;
        self.program.func_mut(self.frame.function).returns.push(id);
        Some(id)
    }

    /// Emits the entry of a `try` statement.
    ///
    /// Edges go to the protected block and to every catch block. The handler is recorded
    /// on those blocks.
    pub fn emit_error_handler(
        &mut self,
        try_block: BlockId,
        catches: Vec<BlockId>,
        finally: Option<BlockId>,
        done: BlockId,
    ) -> Option<ValueId> {
        let handled: Vec<BlockId> = std::iter::once(try_block)
            .chain(catches.iter().copied())
            .collect();
        let id = self.emit_terminator(InstKind::ErrorHandler {
            try_block,
            catches,
            finally,
            done,
        })?;
        for block in handled {
            self.program.blk_mut(block).handler = Some(id);
        }
        Some(id)
    }

    /// Emits the error caught by a catch clause of `handler`.
    pub fn emit_error_catch(&mut self, handler: ValueId, name: &str) -> Option<ValueId> {
        let id = self.emit_value(
            InstKind::ErrorCatch {
                handler,
                name: name.to_string(),
            },
            SsaType::Error,
        )?;
        self.set_name(id, name);
        Some(id)
    }

    /// Emits the new version of `name` produced by `call`.
    pub fn emit_side_effect(
        &mut self,
        name: &str,
        call: ValueId,
        modified: Option<ValueId>,
    ) -> Option<ValueId> {
        let ty = modified.map(|m| self.program.type_of(m)).unwrap_or_default();
        let id = self.emit_value(
            InstKind::SideEffect {
                name: name.to_string(),
                call,
                modified,
            },
            ty,
        )?;
        self.set_name(id, name);
        Some(id)
    }

    /// Emits a conversion of `value` to `ty`.
    pub fn emit_type_cast(&mut self, value: ValueId, ty: SsaType) -> Option<ValueId> {
        self.emit_value(InstKind::TypeCast { value }, ty)
    }

    /// Emits `ty` as a value.
    pub fn emit_type_value(&mut self, ty: SsaType) -> Option<ValueId> {
        self.emit_value(InstKind::TypeValue(ty.clone()), ty)
    }

    /// Emits `assert cond, message`. `text` is the message as written in the source.
    pub fn emit_assert(
        &mut self,
        cond: ValueId,
        message: Option<ValueId>,
        text: &str,
    ) -> Option<ValueId> {
        self.emit_value(
            InstKind::Assert {
                cond,
                message,
                text: text.to_string(),
            },
            SsaType::Null,
        )
    }

    /// Emits a raise of `info`. Control flow is left to the enclosing `try`; the block stays
    /// open.
    pub fn emit_panic(&mut self, info: ValueId) -> Option<ValueId> {
        self.emit_value(InstKind::Panic { info }, SsaType::Null)
    }

    /// Emits a recovery of the error being raised.
    pub fn emit_recover(&mut self) -> Option<ValueId> {
        self.emit_value(InstKind::Recover, SsaType::Any)
    }

    /// Emits one iteration step over `iter` and reads its `key`, `field` and `ok` members.
    pub fn emit_next(&mut self, iter: ValueId, is_in: bool) -> Option<NextValues> {
        let next = self.emit_value(InstKind::Next { iter, is_in }, SsaType::Object)?;
        let key = self.read_member_by_name(next, "key");
        let field = self.read_member_by_name(next, "field");
        let ok = self.read_member_by_name(next, "ok");
        self.set_type(ok, SsaType::Boolean);
        Some(NextValues {
            next,
            key,
            field,
            ok,
        })
    }

    /// Emits an object construction, typed as an instance of `blueprint` if given.
    pub fn emit_make(&mut self, blueprint: Option<BlueprintId>) -> Option<ValueId> {
        let ty = blueprint.map_or(SsaType::Object, SsaType::Blueprint);
        self.emit_value(InstKind::Make { blueprint }, ty)
    }
}
