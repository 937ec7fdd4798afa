//! The SSA intermediate representation.
//!
//! This module contains the data model the builders produce: the [`Program`] arena and
//! everything stored in it.
//!
//! # Architecture
//!
//! ```text
//! Program
//!  ├── functions: Function ─── blocks ──► BasicBlock ─── phis / insts ──► Instruction
//!  │                      └── params / free values / side effects
//!  ├── scopes: Scope ─── symbols ──► Symbol ◄── Variable (one version per binding)
//!  └── blueprints: Blueprint
//! ```
//!
//! All links are typed ids ([`ValueId`], [`BlockId`], ...). The def-use graph is kept
//! reciprocal by the primitives in [`Program::replace_value`], [`Program::replace_all_value`]
//! and [`Program::delete_inst`]; [`Program::verify`] checks it.
//!
//! # Key Types
//!
//! - [`Program`] - owns all arenas of one compilation unit
//! - [`Instruction`] / [`InstKind`] - one instruction and its closed set of kinds
//! - [`BasicBlock`] - phi and instruction lists, CFG edges, sealed / finished flags
//! - [`Function`] - blocks, parameters, free values, side effects, diagnostics
//! - [`Scope`], [`Symbol`], [`Variable`] - lexical names and their versions

mod block;
mod blueprint;
mod defuse;
mod display;
mod function;
mod ids;
mod instruction;
mod ops;
mod program;
mod scope;
mod types;
mod value;
mod verify;

pub use block::{BasicBlock, BlockFlags, Reachability};
pub use blueprint::{Blueprint, BlueprintMember};
pub use display::FunctionDisplay;
pub use function::{CaptureSite, Function, FunctionSideEffect, FunctionType, SideEffectKind};
pub use ids::{
    BlockId, BlueprintId, FunctionId, GlobalId, ScopeId, SymbolId, ValueId, VariableId,
};
pub use instruction::{
    InstKind, Instruction, MemberPath, MemberRoot, ParameterKind, SwitchLabel, UndefinedKind,
};
pub use ops::{BinaryOp, UnaryOp};
pub use program::Program;
pub(crate) use program::PendingBinding;
pub use scope::{BindingOrigin, Scope, Symbol, SymbolKind, Variable};
pub use types::SsaType;
pub use value::ConstValue;
pub use verify::{Violation, ViolationKind};
