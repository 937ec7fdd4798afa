//! Deferred function bodies.
//!
//! Front ends that build closure bodies after their parent (to keep the AST walk
//! non-recursive, or to build callees before their callers) queue one task per function.
//! [`BuildQueue::drain`] runs the tasks in FIFO order, each with a fresh builder, and
//! finishes every function. Free values still resolve against the capture site recorded
//! when the closure was created.

use std::collections::VecDeque;

use tracing::debug;

use crate::{
    builder::FunctionBuilder,
    ssa::{FunctionId, Program},
    Error, Result,
};

/// A queued function body.
pub type BuildTask<'a> = Box<dyn for<'p> FnOnce(&mut FunctionBuilder<'p>) + 'a>;

/// FIFO queue of function bodies to build.
#[derive(Default)]
pub struct BuildQueue<'a> {
    tasks: VecDeque<(FunctionId, BuildTask<'a>)>,
}

impl<'a> BuildQueue<'a> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: VecDeque::new(),
        }
    }

    /// Queues the body of `function`.
    pub fn push(
        &mut self,
        function: FunctionId,
        task: impl for<'p> FnOnce(&mut FunctionBuilder<'p>) + 'a,
    ) {
        self.tasks.push_back((function, Box::new(task)));
    }

    /// Number of queued bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Builds and finishes every queued function, returns how many were built.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if the program context was cancelled; remaining tasks stay queued
    /// - [`Error::UnknownFunction`] / [`Error::FunctionFinished`] if a task names a function
    ///   that does not exist or is already finished
    pub fn drain(&mut self, program: &mut Program) -> Result<usize> {
        let mut built = 0;
        while let Some((function, task)) = self.tasks.pop_front() {
            if program.context().is_cancelled() {
                self.tasks.push_front((function, task));
                debug!(built, remaining = self.tasks.len(), "build queue cancelled");
                return Err(Error::Cancelled);
            }
            match program.function(function) {
                None => return Err(Error::UnknownFunction(function)),
                Some(f) if f.is_finished() => return Err(Error::FunctionFinished(function)),
                Some(_) => {}
            }

            let mut builder = program.function_builder(function)?;
            task(&mut builder);
            builder.finish();
            built += 1;
        }
        debug!(built, "build queue drained");
        Ok(built)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ssa::InstKind, ProgramContext};

    #[test]
    fn test_queued_closure_sees_capture_time_value() {
        let mut program = Program::new("test", ProgramContext::default().into_shared());
        let mut queue = BuildQueue::new();

        let mut b = program.new_function_builder("main");
        let one = b.emit_const(1);
        b.write_variable("ca", one);
        let (closure, _) = b.new_closure("f");
        let two = b.emit_const(2);
        b.write_variable("ca", two);
        b.finish();

        queue.push(closure, |b| {
            let ca = b.read_variable("ca");
            b.emit_return(vec![ca]);
        });
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain(&mut program).unwrap(), 1);
        assert!(queue.is_empty());

        let function = program.function(closure).unwrap();
        assert!(function.is_finished());
        let free = function.free_values()[0].1;
        match program.instruction(free).unwrap().kind() {
            InstKind::Parameter { default, .. } => assert_eq!(*default, Some(one)),
            other => panic!("expected free value, got {other:?}"),
        }
    }

    #[test]
    fn test_drain_stops_when_cancelled() {
        let context = ProgramContext::default().into_shared();
        let mut program = Program::new("test", context.clone());
        let a = program.new_function("a", None);
        let mut queue = BuildQueue::new();
        queue.push(a, |_| {});
        context.cancel();

        assert!(matches!(queue.drain(&mut program), Err(Error::Cancelled)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_drain_rejects_finished_function() {
        let mut program = Program::new("test", ProgramContext::default().into_shared());
        let mut b = program.new_function_builder("main");
        b.finish();
        let main = b.function();

        let mut queue = BuildQueue::new();
        queue.push(main, |_| {});
        assert!(matches!(
            queue.drain(&mut program),
            Err(Error::FunctionFinished(f)) if f == main
        ));
    }
}
