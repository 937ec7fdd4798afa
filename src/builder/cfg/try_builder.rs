//! `try` / `catch` / `finally`.

use crate::builder::{cfg::BuildFn, FunctionBuilder};

/// Builds an error handling statement.
///
/// The entry block ends in an `ErrorHandler` terminator with edges to `error.try` and to
/// every `error.catch` block. The end of the protected code also gets an edge to each catch
/// block, so a catch sees values assigned in the `try` body through phis. Inside a catch,
/// the caught error is declared under the clause's name.
pub struct TryBuilder<'a, 'p> {
    body: Option<BuildFn<'a, 'p>>,
    catches: Vec<(Option<String>, BuildFn<'a, 'p>)>,
    finally: Option<BuildFn<'a, 'p>>,
}

impl<'a, 'p> Default for TryBuilder<'a, 'p> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, 'p> TryBuilder<'a, 'p> {
    /// Creates an empty statement.
    #[must_use]
    pub fn new() -> Self {
        Self {
            body: None,
            catches: Vec::new(),
            finally: None,
        }
    }

    /// Sets the protected code.
    #[must_use]
    pub fn build_try(mut self, body: impl FnOnce(&mut FunctionBuilder<'p>) + 'a) -> Self {
        self.body = Some(Box::new(body));
        self
    }

    /// Adds a catch clause, binding the error to `name` if given.
    #[must_use]
    pub fn build_catch(
        mut self,
        name: Option<&str>,
        body: impl FnOnce(&mut FunctionBuilder<'p>) + 'a,
    ) -> Self {
        self.catches
            .push((name.map(str::to_string), Box::new(body)));
        self
    }

    /// Sets the `finally` code, run after the protected code and after every catch.
    #[must_use]
    pub fn build_finally(mut self, body: impl FnOnce(&mut FunctionBuilder<'p>) + 'a) -> Self {
        self.finally = Some(Box::new(body));
        self
    }

    /// Builds the statement at the current position and continues in `error.done`.
    pub fn finish(self, builder: &mut FunctionBuilder<'p>) {
        let try_block = builder.new_basic_block("error.try");
        let catch_blocks: Vec<_> = self
            .catches
            .iter()
            .map(|_| builder.new_basic_block_unsealed("error.catch"))
            .collect();
        let final_block = self
            .finally
            .as_ref()
            .map(|_| builder.new_basic_block_unsealed("error.final"));
        let done = builder.new_basic_block_unsealed("error.done");
        let after = final_block.unwrap_or(done);

        let handler =
            builder.emit_error_handler(try_block, catch_blocks.clone(), final_block, done);

        builder.set_current_block(try_block);
        if let Some(body) = self.body {
            body(builder);
        }
        let try_end = builder.current_block();
        builder.jump_if_open(after);
        for catch in &catch_blocks {
            builder.add_succ(try_end, *catch);
        }

        for ((name, body), catch) in self.catches.into_iter().zip(catch_blocks) {
            builder.seal(catch);
            builder.set_current_block(catch);
            builder.push_scope();
            if let (Some(name), Some(handler)) = (name, handler) {
                if let Some(error) = builder.emit_error_catch(handler, &name) {
                    builder.declare_variable(&name, error);
                }
            }
            body(builder);
            builder.pop_scope();
            builder.jump_if_open(after);
        }

        if let (Some(body), Some(final_block)) = (self.finally, final_block) {
            builder.seal(final_block);
            builder.set_current_block(final_block);
            body(builder);
            builder.jump_if_open(done);
        }

        builder.seal(done);
        builder.set_current_block(done);
    }
}
