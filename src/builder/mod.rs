//! Incremental SSA construction.
//!
//! A [`FunctionBuilder`] is the front end's handle on one function under construction. The
//! front end walks its AST once and, per node, asks the builder to create blocks, read and
//! write variables, emit instructions, or run one of the structured control-flow builders in
//! [`cfg`]. The IR stays in SSA form after every call.
//!
//! # Construction Protocol
//!
//! - [`FunctionBuilder::read_variable`] resolves a name on demand: the binding written in
//!   the current block, or the value at block entry. Unsealed blocks get an incomplete phi,
//!   blocks with one predecessor forward the read, merge points get a phi whose edges are
//!   read in the predecessors. At the entry block the name becomes a free value, an extern
//!   or an `Undefined` placeholder.
//! - [`FunctionBuilder::seal`] declares a block's predecessor set final and completes its
//!   incomplete phis. Phis that turn out to merge one value are replaced by that value.
//! - Closures are built as nested frames ([`FunctionBuilder::push_function`] /
//!   [`FunctionBuilder::pop_function`]) or queued in a [`BuildQueue`] and built later.
//!
//! # Example
//!
//! ```rust
//! use ssakit::prelude::*;
//!
//! let mut program = Program::new("demo", ProgramContext::default().into_shared());
//! let mut builder = program.new_function_builder("main");
//! let x = builder.new_param("x");
//! let one = builder.emit_const(1);
//!
//! IfBuilder::new()
//!     .build_condition(move |b| b.emit_binop(BinaryOp::Lt, x, one).unwrap())
//!     .build_true(|b| {
//!         let two = b.emit_const(2);
//!         b.write_variable("y", two);
//!     })
//!     .build_false(|b| {
//!         let three = b.emit_const(3);
//!         b.write_variable("y", three);
//!     })
//!     .finish(&mut builder);
//!
//! let y = builder.read_variable("y");
//! builder.emit_return(vec![y]);
//! builder.finish();
//!
//! assert!(program.instruction(y).unwrap().kind().is_phi());
//! ```

mod closure;
mod emit;
mod member;
mod phi;
mod queue;
mod variable;

pub mod cfg;

use std::collections::HashSet;

use tracing::debug;

use crate::{
    diagnostics::{Diagnostic, DiagnosticTag, Severity, SourceRange},
    ssa::{
        BlockFlags, BlockId, FunctionId, FunctionType, InstKind, ParameterKind, Program,
        ScopeId, SsaType, ValueId,
    },
    BuildConfig, Error, Result,
};

pub use cfg::{IfBuilder, LoopBuilder, SwitchBuilder, TryBuilder};
pub use emit::NextValues;
pub use queue::{BuildQueue, BuildTask};

/// Statements built into the defer block when the function is finished.
///
/// Deferred statements own what they capture; they may outlive the statement that queued
/// them.
pub type DeferFn = Box<dyn for<'b> FnOnce(&mut FunctionBuilder<'b>)>;

/// Where `break`, `continue` and `fallthrough` jump to inside a construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JumpTarget {
    /// Target of `break`
    pub break_to: Option<BlockId>,
    /// Target of `continue`
    pub continue_to: Option<BlockId>,
    /// Target of `fallthrough`
    pub fallthrough_to: Option<BlockId>,
}

/// Per-function construction state.
pub(crate) struct Frame {
    pub(crate) function: FunctionId,
    pub(crate) block: BlockId,
    pub(crate) scope: ScopeId,
    pub(crate) range: Option<SourceRange>,
    pub(crate) targets: Vec<JumpTarget>,
    pub(crate) defers: Vec<DeferFn>,
    pub(crate) stopped: bool,
}

impl Frame {
    fn enter(program: &Program, function: FunctionId) -> Self {
        let func = program.func(function);
        Self {
            function,
            block: func.entry,
            scope: func.root_scope,
            range: None,
            targets: Vec::new(),
            defers: Vec::new(),
            stopped: program.context().is_cancelled(),
        }
    }
}

/// Builds one function, and nested closures as pushed frames, into a [`Program`].
pub struct FunctionBuilder<'p> {
    pub(crate) program: &'p mut Program,
    pub(crate) frame: Frame,
    parents: Vec<Frame>,
    /// Phis whose edges are being collected
    pub(crate) building_phis: HashSet<ValueId>,
}

impl Program {
    /// Returns a builder positioned at the entry block of `function`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFunction`] if `function` is not a function of this program.
    pub fn function_builder(&mut self, function: FunctionId) -> Result<FunctionBuilder<'_>> {
        if self.function(function).is_none() {
            return Err(Error::UnknownFunction(function));
        }
        Ok(FunctionBuilder::new(self, function))
    }

    /// Creates a new top-level function and returns a builder for it.
    pub fn new_function_builder(&mut self, name: &str) -> FunctionBuilder<'_> {
        let function = self.new_function(name, None);
        FunctionBuilder::new(self, function)
    }
}

impl<'p> FunctionBuilder<'p> {
    fn new(program: &'p mut Program, function: FunctionId) -> Self {
        let frame = Frame::enter(program, function);
        Self {
            program,
            frame,
            parents: Vec::new(),
            building_phis: HashSet::new(),
        }
    }

    /// Returns the program being built.
    #[must_use]
    pub fn program(&self) -> &Program {
        self.program
    }

    /// Returns the function being built.
    #[must_use]
    pub fn function(&self) -> FunctionId {
        self.frame.function
    }

    /// Returns the block instructions are emitted into.
    #[must_use]
    pub fn current_block(&self) -> BlockId {
        self.frame.block
    }

    /// Returns the current lexical scope.
    #[must_use]
    pub fn current_scope(&self) -> ScopeId {
        self.frame.scope
    }

    /// Returns `true` if the current block already ends in a terminator.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.program.blk(self.frame.block).is_finished()
    }

    /// Returns `true` once cancellation was observed; nothing is emitted anymore.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.frame.stopped
    }

    /// Returns the build configuration.
    #[must_use]
    pub fn config(&self) -> BuildConfig {
        *self.program.config()
    }

    /// Sets the source range attached to emitted instructions and diagnostics, returns the
    /// previous one.
    pub fn set_range(&mut self, range: Option<SourceRange>) -> Option<SourceRange> {
        std::mem::replace(&mut self.frame.range, range)
    }

    /// Creates a block whose only predecessor is known at creation time.
    pub fn new_basic_block(&mut self, name: &str) -> BlockId {
        self.program
            .new_block(self.frame.function, name, self.frame.scope, true)
    }

    /// Creates a block whose predecessors are still being discovered.
    pub fn new_basic_block_unsealed(&mut self, name: &str) -> BlockId {
        self.program
            .new_block(self.frame.function, name, self.frame.scope, false)
    }

    /// Moves the insertion point to `block`.
    ///
    /// This is the point where cancellation of the shared context is observed.
    pub fn set_current_block(&mut self, block: BlockId) {
        if !self.owns_block(block) {
            return;
        }
        self.frame.block = block;
        if !self.frame.stopped && self.program.context().is_cancelled() {
            debug!(function = %self.frame.function, block = %block, "construction cancelled");
            self.frame.stopped = true;
        }
    }

    /// Adds the CFG edge `from -> to`.
    ///
    /// Terminators add their edges themselves; this is for edges without a terminator, such
    /// as exceptional edges. Adding an edge to a sealed block that already has predecessors
    /// is reported, its phis would miss an edge.
    pub fn add_succ(&mut self, from: BlockId, to: BlockId) {
        if !self.owns_block(from) || !self.owns_block(to) {
            return;
        }
        let target = self.program.blk(to);
        let late = target.is_sealed()
            && !target.preds.contains(&from)
            && (!target.preds.is_empty() || !target.entry_defs.is_empty());
        if late {
            let tag = if target.phis.is_empty() {
                DiagnosticTag::SealedBlockEdge
            } else {
                DiagnosticTag::PhiEdgeMismatch
            };
            self.report_structure(tag, format!("edge {from} -> {to} added to sealed block"));
        }
        self.program.add_succ(from, to);
    }

    /// Opens a nested lexical scope.
    pub fn push_scope(&mut self) -> ScopeId {
        let scope = self
            .program
            .new_scope(self.frame.function, Some(self.frame.scope));
        self.frame.scope = scope;
        scope
    }

    /// Closes the current lexical scope. The root scope of a function is never closed.
    pub fn pop_scope(&mut self) {
        if let Some(parent) = self.program.scopes[self.frame.scope.index()].parent {
            self.frame.scope = parent;
        }
    }

    /// Pushes the targets of `break` / `continue` / `fallthrough` for a construct.
    pub fn push_target(&mut self, target: JumpTarget) {
        self.frame.targets.push(target);
    }

    /// Pops the innermost jump targets.
    pub fn pop_target(&mut self) -> Option<JumpTarget> {
        self.frame.targets.pop()
    }

    /// Jumps to the innermost `break` target.
    pub fn emit_break(&mut self) -> Option<ValueId> {
        self.emit_to_target("break", |t| t.break_to)
    }

    /// Jumps to the innermost `continue` target.
    pub fn emit_continue(&mut self) -> Option<ValueId> {
        self.emit_to_target("continue", |t| t.continue_to)
    }

    /// Jumps to the innermost `fallthrough` target.
    pub fn emit_fallthrough(&mut self) -> Option<ValueId> {
        self.emit_to_target("fallthrough", |t| t.fallthrough_to)
    }

    fn emit_to_target(
        &mut self,
        what: &str,
        select: impl Fn(&JumpTarget) -> Option<BlockId>,
    ) -> Option<ValueId> {
        let Some(to) = self.frame.targets.iter().rev().find_map(select) else {
            self.report(
                Severity::Error,
                DiagnosticTag::MissingTarget,
                format!("{what} outside of an enclosing construct"),
            );
            return None;
        };
        self.emit_jump(to)
    }

    /// Adds a positional parameter and declares it under `name`.
    pub fn new_param(&mut self, name: &str) -> ValueId {
        let function = self.frame.function;
        let func = self.program.func(function);
        let index = func.params.len();
        let entry = func.entry;

        let param = self.program.alloc_value(
            InstKind::Parameter {
                name: name.to_string(),
                kind: ParameterKind::Normal { index },
                default: None,
            },
            entry,
            SsaType::Any,
            self.frame.range,
        );
        self.program.func_mut(function).params.push(param);
        self.declare_variable(name, param);
        param
    }

    /// Marks the function as a method: the first parameter is the receiver.
    pub fn set_method(&mut self, is_method: bool) {
        self.program.func_mut(self.frame.function).is_method = is_method;
    }

    /// Marks the last parameter as collecting extra arguments.
    pub fn set_variadic(&mut self, variadic: bool) {
        self.program.func_mut(self.frame.function).variadic = variadic;
    }

    /// Sets the static type of a value.
    pub fn set_type(&mut self, value: ValueId, ty: SsaType) {
        if let Some(inst) = self.program.inst_mut(value) {
            inst.ty = ty;
        }
    }

    /// Queues statements for the defer block, built in reverse order when the function is
    /// finished.
    pub fn build_defer(&mut self, body: impl for<'b> FnOnce(&mut FunctionBuilder<'b>) + 'static) {
        self.frame.defers.push(Box::new(body));
    }

    /// Enters `function` as a nested frame. The current frame is resumed by
    /// [`FunctionBuilder::pop_function`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFunction`] if `function` is not a function of this program.
    pub fn push_function(&mut self, function: FunctionId) -> Result<()> {
        if self.program.function(function).is_none() {
            return Err(Error::UnknownFunction(function));
        }
        self.enter_function(function);
        Ok(())
    }

    fn enter_function(&mut self, function: FunctionId) {
        let frame = Frame::enter(self.program, function);
        let parent = std::mem::replace(&mut self.frame, frame);
        self.parents.push(parent);
    }

    /// Finishes the current nested function and resumes its parent frame.
    ///
    /// Returns the finished function, or `None` if there is no parent frame.
    pub fn pop_function(&mut self) -> Option<FunctionId> {
        if self.parents.is_empty() {
            return None;
        }
        self.finish();
        let finished = self.frame.function;
        if let Some(parent) = self.parents.pop() {
            self.frame = parent;
        }
        Some(finished)
    }

    /// Creates a closure, builds its body in a nested frame and finishes it.
    ///
    /// Returns the `Function` value standing for the closure in the current function.
    pub fn build_closure(&mut self, name: &str, body: impl FnOnce(&mut Self)) -> ValueId {
        let (function, value) = self.new_closure(name);
        self.enter_function(function);
        body(self);
        self.pop_function();
        value
    }

    /// Finishes the current function.
    ///
    /// An unterminated current block gets an implicit `return`, deferred statements are built,
    /// remaining blocks are sealed, the values of side effects at the returns are recorded,
    /// the function type is computed and calls waiting for this function get their free
    /// values bound.
    pub fn finish(&mut self) {
        let function = self.frame.function;
        if self.program.func(function).finished {
            debug!(function = %function, "function already finished");
            return;
        }

        if !self.is_finished() && !self.frame.stopped {
            self.emit_return(Vec::new());
        }
        self.program.func_mut(function).exit = Some(self.frame.block);

        self.build_defers();

        let blocks = self.program.func(function).blocks.clone();
        for block in blocks {
            if !self.program.blk(block).is_sealed() {
                self.seal(block);
            }
        }

        self.compute_side_effect_values();
        let ty = self.compute_function_type();
        let func = self.program.func_mut(function);
        func.ty = Some(ty);
        func.finished = true;

        self.resolve_pending_bindings(function);

        let func = self.program.func(function);
        debug!(
            function = %function,
            name = %func.name,
            blocks = func.blocks.len(),
            free_values = func.free_values.len(),
            side_effects = func.side_effects.len(),
            diagnostics = func.diagnostics.count(),
            "function finished"
        );
    }

    fn build_defers(&mut self) {
        let defers = std::mem::take(&mut self.frame.defers);
        if defers.is_empty() {
            return;
        }

        let function = self.frame.function;
        let block = self.new_basic_block_unsealed("defer");
        let returns = self.program.func(function).returns.clone();
        for ret in returns {
            if let Some(from) = self.program.inst(ret).map(|i| i.block) {
                self.program.add_succ(from, block);
            }
        }
        self.seal(block);
        self.set_current_block(block);

        for body in defers.into_iter().rev() {
            body(self);
        }
        if !self.is_finished() {
            self.emit_terminator(InstKind::Return {
                results: Vec::new(),
            });
        }
        self.program.func_mut(function).defer = Some(block);
    }

    fn compute_function_type(&self) -> FunctionType {
        let func = self.program.func(self.frame.function);

        let skip = usize::from(func.is_method);
        let params = func
            .params
            .iter()
            .skip(skip)
            .map(|p| self.program.type_of(*p))
            .collect();

        let results: Vec<Vec<ValueId>> = func
            .returns
            .iter()
            .filter_map(|r| match self.program.kind(*r) {
                Some(InstKind::Return { results }) => Some(results.clone()),
                _ => None,
            })
            .collect();
        let arity = results.first().map_or(0, Vec::len);
        let returns = if results.iter().any(|r| r.len() != arity) {
            SsaType::Any
        } else {
            let column = |i: usize| {
                let types: Vec<SsaType> =
                    results.iter().map(|r| self.program.type_of(r[i])).collect();
                SsaType::unify_all(types.iter())
            };
            match arity {
                0 => SsaType::Null,
                1 => column(0),
                n => SsaType::Tuple((0..n).map(column).collect()),
            }
        };

        FunctionType {
            params,
            returns,
            free_values: func.free_values.iter().map(|(n, _)| n.clone()).collect(),
            side_effects: func.side_effects.iter().map(|s| s.name.clone()).collect(),
            is_method: func.is_method,
            variadic: func.variadic,
        }
    }

    pub(crate) fn report(&self, severity: Severity, tag: DiagnosticTag, message: impl Into<String>) {
        self.report_in(self.frame.function, severity, tag, message);
    }

    pub(crate) fn report_in(
        &self,
        function: FunctionId,
        severity: Severity,
        tag: DiagnosticTag,
        message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic::new(severity, tag, message)
            .with_function(function)
            .with_range(self.frame.range);
        self.program.func(function).diagnostics.push(diagnostic);
    }

    /// Reports builder misuse, as error in strict mode.
    pub(crate) fn report_structure(&self, tag: DiagnosticTag, message: impl Into<String>) {
        let severity = if self.program.config().strict_structure {
            Severity::Error
        } else {
            Severity::Warn
        };
        self.report(severity, tag, message);
    }

    /// Returns `true` if `block` belongs to the function being built, reports it otherwise.
    pub(crate) fn owns_block(&self, block: BlockId) -> bool {
        match self.program.block(block) {
            Some(blk) if blk.function == self.frame.function => true,
            _ => {
                self.report(
                    Severity::Error,
                    DiagnosticTag::UnknownBlock,
                    format!("{block} is not a block of {}", self.frame.function),
                );
                false
            }
        }
    }

    pub(crate) fn mark_finished(&mut self, block: BlockId) {
        self.program.blk_mut(block).flags.insert(BlockFlags::FINISHED);
    }

    /// Jumps to `to` unless the current block is already terminated.
    pub(crate) fn jump_if_open(&mut self, to: BlockId) {
        if !self.is_finished() && !self.frame.stopped {
            self.emit_jump(to);
        }
    }
}
