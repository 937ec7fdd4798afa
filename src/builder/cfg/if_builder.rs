//! `if` / `elif` / `else`.

use crate::{
    builder::{cfg::BuildFn, FunctionBuilder},
    ssa::{BlockId, ValueId},
};

/// Builds a conditional chain.
///
/// ```text
///  cond ──► if.true ─────────────┐
///    └────► if.elif ──► ... ──┐  │
///                    if.false ┴──┴─► if.done
/// ```
///
/// The last condition always branches to an `if.false` block, so the true arm is the
/// first predecessor of `if.done`. Every arm that does not end in a terminator jumps to the
/// shared `if.done` block, which is sealed once all arms are built.
pub struct IfBuilder<'a, 'p> {
    condition: Option<BuildFn<'a, 'p, ValueId>>,
    arms: Vec<(BuildFn<'a, 'p, ValueId>, BuildFn<'a, 'p>)>,
    otherwise: Option<BuildFn<'a, 'p>>,
    child: Option<Box<IfBuilder<'a, 'p>>>,
}

impl<'a, 'p> Default for IfBuilder<'a, 'p> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, 'p> IfBuilder<'a, 'p> {
    /// Creates an empty conditional.
    #[must_use]
    pub fn new() -> Self {
        Self {
            condition: None,
            arms: Vec::new(),
            otherwise: None,
            child: None,
        }
    }

    /// Sets the condition of the next `build_true` arm.
    #[must_use]
    pub fn build_condition(
        mut self,
        condition: impl FnOnce(&mut FunctionBuilder<'p>) -> ValueId + 'a,
    ) -> Self {
        self.condition = Some(Box::new(condition));
        self
    }

    /// Adds the arm taken when the pending condition holds (`true` if none was set).
    #[must_use]
    pub fn build_true(mut self, body: impl FnOnce(&mut FunctionBuilder<'p>) + 'a) -> Self {
        let condition: BuildFn<'a, 'p, ValueId> = match self.condition.take() {
            Some(condition) => condition,
            None => Box::new(|b: &mut FunctionBuilder<'p>| b.emit_const(true)),
        };
        self.arms.push((condition, Box::new(body)));
        self
    }

    /// Adds an `elif` arm, evaluated in the false arm of the previous one.
    #[must_use]
    pub fn build_elif(
        mut self,
        condition: impl FnOnce(&mut FunctionBuilder<'p>) -> ValueId + 'a,
        body: impl FnOnce(&mut FunctionBuilder<'p>) + 'a,
    ) -> Self {
        self.arms.push((Box::new(condition), Box::new(body)));
        self
    }

    /// Sets the `else` arm. Replaces a child conditional.
    #[must_use]
    pub fn build_false(mut self, body: impl FnOnce(&mut FunctionBuilder<'p>) + 'a) -> Self {
        self.otherwise = Some(Box::new(body));
        self.child = None;
        self
    }

    /// Nests `child` as the false arm; it shares this conditional's `if.done` block.
    /// Replaces an `else` arm.
    #[must_use]
    pub fn build_child(mut self, child: IfBuilder<'a, 'p>) -> Self {
        self.child = Some(Box::new(child));
        self.otherwise = None;
        self
    }

    /// Builds the conditional at the current position and continues in `if.done`.
    pub fn finish(self, builder: &mut FunctionBuilder<'p>) {
        let done = builder.new_basic_block_unsealed("if.done");
        self.build_arms(builder, done);
        builder.seal(done);
        builder.set_current_block(done);
    }

    fn build_arms(self, builder: &mut FunctionBuilder<'p>, done: BlockId) {
        let Self {
            arms,
            otherwise,
            child,
            ..
        } = self;
        let count = arms.len();

        for (index, (condition, body)) in arms.into_iter().enumerate() {
            let cond = condition(builder);
            let on_true = builder.new_basic_block("if.true");
            let on_false = if index + 1 == count {
                builder.new_basic_block("if.false")
            } else {
                builder.new_basic_block("if.elif")
            };
            if builder.emit_if(cond, on_true, on_false).is_none() {
                return;
            }

            builder.set_current_block(on_true);
            body(builder);
            builder.jump_if_open(done);
            builder.set_current_block(on_false);
        }

        if let Some(otherwise) = otherwise {
            otherwise(builder);
            builder.jump_if_open(done);
        } else if let Some(child) = child {
            child.build_arms(builder, done);
        } else {
            builder.jump_if_open(done);
        }
    }
}
