//! `for` / `while` loops.

use crate::{
    builder::{cfg::BuildFn, FunctionBuilder, JumpTarget},
    ssa::ValueId,
};

/// Builds a loop.
///
/// ```text
/// first ──► loop.header ──► loop.body ──► loop.latch (third) ──┐
///               ▲   └─────► loop.exit                          │
///               └──────────────────────────────────────────────┘
/// ```
///
/// `break` jumps to `loop.exit`, `continue` to `loop.latch`. The header is sealed after the
/// latch jumped back, the exit after the body, so reads in the header of variables written
/// in the body produce phis.
pub struct LoopBuilder<'a, 'p> {
    first: Option<BuildFn<'a, 'p>>,
    condition: Option<BuildFn<'a, 'p, ValueId>>,
    body: Option<BuildFn<'a, 'p>>,
    third: Option<BuildFn<'a, 'p>>,
}

impl<'a, 'p> Default for LoopBuilder<'a, 'p> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, 'p> LoopBuilder<'a, 'p> {
    /// Creates an empty loop; without a condition it loops until `break`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            first: None,
            condition: None,
            body: None,
            third: None,
        }
    }

    /// Sets the initializer, run once before the header in the loop's scope.
    #[must_use]
    pub fn build_first_expr(mut self, first: impl FnOnce(&mut FunctionBuilder<'p>) + 'a) -> Self {
        self.first = Some(Box::new(first));
        self
    }

    /// Sets the condition evaluated in the header.
    #[must_use]
    pub fn build_condition(
        mut self,
        condition: impl FnOnce(&mut FunctionBuilder<'p>) -> ValueId + 'a,
    ) -> Self {
        self.condition = Some(Box::new(condition));
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn build_body(mut self, body: impl FnOnce(&mut FunctionBuilder<'p>) + 'a) -> Self {
        self.body = Some(Box::new(body));
        self
    }

    /// Sets the step, run in the latch before jumping back to the header.
    #[must_use]
    pub fn build_third(mut self, third: impl FnOnce(&mut FunctionBuilder<'p>) + 'a) -> Self {
        self.third = Some(Box::new(third));
        self
    }

    /// Builds the loop at the current position and continues in `loop.exit`.
    pub fn finish(self, builder: &mut FunctionBuilder<'p>) {
        builder.push_scope();
        if let Some(first) = self.first {
            first(builder);
        }

        let header = builder.new_basic_block_unsealed("loop.header");
        let body = builder.new_basic_block("loop.body");
        let exit = builder.new_basic_block_unsealed("loop.exit");
        let latch = builder.new_basic_block_unsealed("loop.latch");
        builder.jump_if_open(header);

        builder.set_current_block(header);
        let cond = match self.condition {
            Some(condition) => condition(builder),
            None => builder.emit_const(true),
        };
        builder.emit_loop(cond, body, exit);

        builder.set_current_block(body);
        builder.push_target(JumpTarget {
            break_to: Some(exit),
            continue_to: Some(latch),
            fallthrough_to: None,
        });
        if let Some(body) = self.body {
            body(builder);
        }
        builder.pop_target();
        builder.jump_if_open(latch);

        builder.seal(latch);
        let latch_reached = !builder.program().blk(latch).preds.is_empty();
        if latch_reached {
            builder.set_current_block(latch);
            if let Some(third) = self.third {
                third(builder);
            }
            builder.jump_if_open(header);
        }

        builder.seal(header);
        builder.seal(exit);
        builder.set_current_block(exit);
        builder.pop_scope();
    }
}
