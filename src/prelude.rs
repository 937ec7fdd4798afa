//! # ssakit Prelude
//!
//! This module re-exports the types a language front end needs to drive the engine. Import
//! it to get the program arena, the function builder, the control-flow builders and the
//! diagnostics in one line.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all ssakit operations
pub use crate::Error;

/// The result type used throughout ssakit
pub use crate::Result;

/// Construction switches shared by every function of a program
pub use crate::BuildConfig;

/// Shared context: id allocation, extern resolution and cancellation
pub use crate::{ExternBinding, ProgramContext};

// ================================================================================================
// IR
// ================================================================================================

/// The program arena and its ids
pub use crate::ssa::{
    BlockId, BlueprintId, FunctionId, Program, ScopeId, SymbolId, ValueId, VariableId,
};

/// Instructions, operators, constants and types
pub use crate::ssa::{BinaryOp, ConstValue, InstKind, SsaType, UnaryOp};

/// Blueprints describing object layouts
pub use crate::ssa::{Blueprint, BlueprintMember};

/// Verifier output
pub use crate::ssa::{Violation, ViolationKind};

// ================================================================================================
// Construction
// ================================================================================================

/// The per function construction cursor
pub use crate::builder::{FunctionBuilder, JumpTarget, NextValues};

/// Structured control-flow builders
pub use crate::builder::{IfBuilder, LoopBuilder, SwitchBuilder, TryBuilder};

/// Deferred function bodies
pub use crate::builder::BuildQueue;

// ================================================================================================
// Diagnostics
// ================================================================================================

/// Non-fatal problems recorded while building
pub use crate::diagnostics::{Diagnostic, DiagnosticTag, Severity, SourceRange};
