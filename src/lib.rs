// Copyright 2026 The ssakit Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # ssakit
//!
//! An incremental Static Single Assignment construction engine for static analysis front ends.
//!
//! A language front end walks its AST once and drives the engine node by node: it asks for
//! basic blocks, reads and writes named variables, emits instructions and uses the structured
//! control-flow builders for `if`, loops, `switch` and `try`. The engine keeps the IR in SSA
//! form at every step, creating phi nodes on demand while the control-flow graph is still
//! incomplete, and removing them again once they turn out to be trivial.
//!
//! ## Features
//!
//! - **On-demand SSA** - sealed / unsealed blocks, incomplete phis and trivial phi elimination
//! - **Closures** - captured variables become free-value parameters with a definition-time
//!   default, call sites bind the current value of every free value
//! - **Side effects** - writes to captured variables or members of captured objects are
//!   materialized as `SideEffect` values after every call of the closure
//! - **Structured control flow** - reusable builders for `if`/`elif`/`else`, `for`, `switch`
//!   with `fallthrough` and `try`/`catch`/`finally`
//! - **Diagnostics, not panics** - builder misuse and unresolved names are recorded on the
//!   owning function and construction always continues
//!
//! ## Architecture
//!
//! - [`ssa`] - the IR itself: the [`ssa::Program`] arena, instructions, blocks, functions,
//!   scopes, the def-use graph primitives, the pretty printer and the verifier
//! - [`builder`] - [`builder::FunctionBuilder`], the read / write protocol, the phi protocol,
//!   closure capture and the control-flow builders
//! - [`context`] - the [`ProgramContext`] shared by every program: id allocation, extern
//!   resolution, configuration and cancellation
//! - [`diagnostics`] - non-fatal problems found while building
//!
//! ## Quick Start
//!
//! ```rust
//! use ssakit::prelude::*;
//!
//! let mut program = Program::new("demo", ProgramContext::default().into_shared());
//! let main = program.new_function("main", None);
//! let mut builder = program.function_builder(main)?;
//!
//! let five = builder.emit_const(5);
//! builder.write_variable("a", five);
//! let a = builder.read_variable("a");
//! let one = builder.emit_const(1);
//! let sum = builder.emit_binop(BinaryOp::Add, a, one);
//! assert!(sum.is_some());
//! builder.finish();
//!
//! assert!(program.verify().is_empty());
//! # Ok::<(), ssakit::Error>(())
//! ```
//!
//! ## Concurrency
//!
//! Building one function is single threaded. Independent programs can be built on separate
//! threads while sharing one [`ProgramContext`]; the id allocator and the cancellation flag
//! are atomic. A finished [`ssa::Program`] can be queried from many threads at once.

#[macro_use]
pub(crate) mod macros;

mod config;
mod context;
mod error;

pub mod builder;
pub mod diagnostics;
pub mod prelude;
pub mod ssa;

pub use config::BuildConfig;
pub use context::{
    AtomicIdAllocator, ExternBinding, ExternResolver, IdAllocator, ProgramContext,
};
pub use error::Error;

/// `ssakit` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
