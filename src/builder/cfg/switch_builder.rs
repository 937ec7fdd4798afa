//! `switch` statements.

use crate::{
    builder::{cfg::BuildFn, FunctionBuilder, JumpTarget},
    ssa::{BlockId, ValueId},
};

/// Builds a multi way branch.
///
/// Labels are evaluated in the entry block before the `Switch` terminator. Each case gets a
/// handler block; `fallthrough` jumps to the next handler, or to the default block after
/// the last case. With auto break (the default) a handler that does not end in a terminator
/// jumps to `switch.done`, otherwise it falls through.
pub struct SwitchBuilder<'a, 'p> {
    condition: Option<BuildFn<'a, 'p, ValueId>>,
    cases: Vec<(BuildFn<'a, 'p, Vec<ValueId>>, BuildFn<'a, 'p>)>,
    default: Option<BuildFn<'a, 'p>>,
    auto_break: bool,
}

impl<'a, 'p> Default for SwitchBuilder<'a, 'p> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, 'p> SwitchBuilder<'a, 'p> {
    /// Creates an empty switch with auto break.
    #[must_use]
    pub fn new() -> Self {
        Self {
            condition: None,
            cases: Vec::new(),
            default: None,
            auto_break: true,
        }
    }

    /// Sets the value compared against the labels. Defaults to `true`.
    #[must_use]
    pub fn build_condition(
        mut self,
        condition: impl FnOnce(&mut FunctionBuilder<'p>) -> ValueId + 'a,
    ) -> Self {
        self.condition = Some(Box::new(condition));
        self
    }

    /// Adds a case with its label values and body.
    #[must_use]
    pub fn build_case(
        mut self,
        labels: impl FnOnce(&mut FunctionBuilder<'p>) -> Vec<ValueId> + 'a,
        body: impl FnOnce(&mut FunctionBuilder<'p>) + 'a,
    ) -> Self {
        self.cases.push((Box::new(labels), Box::new(body)));
        self
    }

    /// Sets the default body.
    #[must_use]
    pub fn build_default(mut self, body: impl FnOnce(&mut FunctionBuilder<'p>) + 'a) -> Self {
        self.default = Some(Box::new(body));
        self
    }

    /// Sets whether handlers end with an implicit `break`.
    #[must_use]
    pub fn set_auto_break(mut self, auto_break: bool) -> Self {
        self.auto_break = auto_break;
        self
    }

    /// Builds the switch at the current position and continues in `switch.done`.
    pub fn finish(self, builder: &mut FunctionBuilder<'p>) {
        let cond = match self.condition {
            Some(condition) => condition(builder),
            None => builder.emit_const(true),
        };

        let mut labels = Vec::new();
        let mut handlers = Vec::with_capacity(self.cases.len());
        for (values, body) in self.cases {
            let values = values(builder);
            let handler = builder.new_basic_block_unsealed("switch.handler");
            labels.extend(values.into_iter().map(|value| (value, handler)));
            handlers.push((handler, body));
        }
        let default = builder.new_basic_block_unsealed("switch.default");
        let done = builder.new_basic_block_unsealed("switch.done");
        builder.emit_switch(cond, default, labels);

        let next_blocks: Vec<BlockId> = handlers
            .iter()
            .skip(1)
            .map(|(handler, _)| *handler)
            .chain(std::iter::once(default))
            .collect();

        for ((handler, body), next) in handlers.into_iter().zip(next_blocks) {
            builder.seal(handler);
            builder.set_current_block(handler);
            builder.push_target(JumpTarget {
                break_to: Some(done),
                continue_to: None,
                fallthrough_to: Some(next),
            });
            body(builder);
            builder.pop_target();
            builder.jump_if_open(if self.auto_break { done } else { next });
        }

        builder.seal(default);
        builder.set_current_block(default);
        builder.push_target(JumpTarget {
            break_to: Some(done),
            ..JumpTarget::default()
        });
        if let Some(body) = self.default {
            body(builder);
        }
        builder.pop_target();
        builder.jump_if_open(done);

        builder.seal(done);
        builder.set_current_block(done);
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        builder::cfg::SwitchBuilder,
        diagnostics::DiagnosticTag,
        ssa::{InstKind, Program},
        ProgramContext,
    };

    fn program() -> Program {
        Program::new("test", ProgramContext::default().into_shared())
    }

    #[test]
    fn test_switch_merges_cases() {
        let mut program = program();
        let mut b = program.new_function_builder("main");
        let x = b.new_param("x");

        SwitchBuilder::new()
            .build_condition(move |_| x)
            .build_case(
                |b| vec![b.emit_const(1), b.emit_const(2)],
                |b| {
                    let v = b.emit_const("small");
                    b.write_variable("r", v);
                },
            )
            .build_case(
                |b| vec![b.emit_const(3)],
                |b| {
                    let v = b.emit_const("three");
                    b.write_variable("r", v);
                },
            )
            .build_default(|b| {
                let v = b.emit_const("other");
                b.write_variable("r", v);
            })
            .finish(&mut b);
        let r = b.read_variable("r");
        let done = b.current_block();
        b.finish();

        assert_eq!(program.block(done).unwrap().preds().len(), 3);
        match program.instruction(r).unwrap().kind() {
            InstKind::Phi { edges } => assert_eq!(edges.len(), 3),
            other => panic!("expected phi, got {other:?}"),
        }
        assert!(program.verify().is_empty());
    }

    #[test]
    fn test_fallthrough_reaches_next_handler() {
        let mut program = program();
        let mut b = program.new_function_builder("main");
        let x = b.new_param("x");

        SwitchBuilder::new()
            .build_condition(move |_| x)
            .build_case(
                |b| vec![b.emit_const(1)],
                |b| {
                    b.emit_fallthrough();
                },
            )
            .build_case(|b| vec![b.emit_const(2)], |_| {})
            .finish(&mut b);
        b.finish();
        let main = b.function();

        let func = program.function(main).unwrap();
        let handlers: Vec<_> = func
            .blocks()
            .iter()
            .copied()
            .filter(|id| program.block(*id).unwrap().name() == "switch.handler")
            .collect();
        assert_eq!(program.block(handlers[1]).unwrap().preds().len(), 2);
        assert!(program.verify().is_empty());
    }

    #[test]
    fn test_fallthrough_outside_switch() {
        let mut program = program();
        let mut b = program.new_function_builder("main");
        assert!(b.emit_fallthrough().is_none());
        b.finish();
        assert_eq!(program.diagnostics()[0].tag, DiagnosticTag::MissingTarget);
    }
}
