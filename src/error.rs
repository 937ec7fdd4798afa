use thiserror::Error;

use crate::ssa::{BlockId, FunctionId, ValueId, VariableId};

/// The generic Error type, which provides coverage for all fatal errors this library can
/// return.
///
/// Construction problems caused by front-end input (unbound names, emitting into a finished
/// block, sealing twice, ...) are never reported through this type. They are recorded as
/// [`crate::diagnostics::Diagnostic`]s on the owning function and building continues. The
/// variants below cover misuse of the IR handles and broken internal invariants only.
///
/// # Error Categories
///
/// ## Handle Errors
/// - [`Error::UnknownValue`] - A value id that does not name a live instruction
/// - [`Error::UnknownBlock`] - A block id outside of the program arena
/// - [`Error::UnknownFunction`] - A function id outside of the program arena
/// - [`Error::UnknownVariable`] - A variable id outside of the program arena
///
/// ## Def-Use Errors
/// - [`Error::InstructionInUse`] - Deleting an instruction which still has users
/// - [`Error::Invariant`] - An internal invariant was found broken
///
/// ## Lifecycle Errors
/// - [`Error::FunctionFinished`] - Building into a function which is already finished
/// - [`Error::Cancelled`] - The surrounding context requested cancellation
///
/// # Examples
///
/// ```rust
/// use ssakit::prelude::*;
///
/// let mut program = Program::new("demo", ProgramContext::default().into_shared());
/// let main = program.new_function("main", None);
/// let mut builder = program.function_builder(main)?;
/// let x = builder.new_param("x");
/// let one = builder.emit_const(1);
/// builder.emit_binop(BinaryOp::Add, x, one);
/// builder.finish();
///
/// match program.delete_inst(one) {
///     Err(Error::InstructionInUse { users, .. }) => assert_eq!(users, 1),
///     other => panic!("unexpected result: {other:?}"),
/// }
/// # Ok::<(), ssakit::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The value id does not refer to a live instruction.
    ///
    /// Either the id was allocated by another program or the instruction has been deleted.
    #[error("Unknown value - {0}")]
    UnknownValue(ValueId),

    /// The block id does not refer to a block of this program.
    #[error("Unknown block - {0}")]
    UnknownBlock(BlockId),

    /// The function id does not refer to a function of this program.
    #[error("Unknown function - {0}")]
    UnknownFunction(FunctionId),

    /// The variable id does not refer to a variable of this program.
    #[error("Unknown variable - {0}")]
    UnknownVariable(VariableId),

    /// An instruction was deleted while other instructions still use it.
    ///
    /// Callers have to rewire the users first, typically through
    /// [`crate::ssa::Program::replace_all_value`].
    ///
    /// # Fields
    ///
    /// * `value` - The instruction that was about to be deleted
    /// * `users` - Number of remaining users
    #[error("Instruction {value} still has {users} user(s)")]
    InstructionInUse {
        /// The instruction that was about to be deleted
        value: ValueId,
        /// Number of remaining users
        users: usize,
    },

    /// The function has already been finished and can not be built into.
    #[error("Function {0} is already finished")]
    FunctionFinished(FunctionId),

    /// Construction was cancelled through the shared [`crate::ProgramContext`].
    #[error("Construction was cancelled")]
    Cancelled,

    /// An internal invariant of the IR is broken.
    ///
    /// These are bugs, they must not be reachable from front-end input. The error includes
    /// the source location where the violation was detected.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the broken invariant
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Invariant - {file}:{line}: {message}")]
    Invariant {
        /// The message to be printed for the Invariant error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },
}
