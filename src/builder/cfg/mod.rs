//! Structured control-flow builders.
//!
//! Each builder collects callbacks for the parts of a construct and, on `finish`, creates
//! the blocks, runs the callbacks in the right blocks and seals every block as soon as its
//! predecessor set is complete. After `finish` the insertion point is the block following
//! the construct.
//!
//! | Builder | Construct | Blocks |
//! |---------|-----------|--------|
//! | [`IfBuilder`] | `if` / `elif` / `else` | `if.true`, `if.elif`, `if.false`, `if.done` |
//! | [`LoopBuilder`] | `for` / `while` | `loop.header`, `loop.body`, `loop.latch`, `loop.exit` |
//! | [`SwitchBuilder`] | `switch` | `switch.handler`, `switch.default`, `switch.done` |
//! | [`TryBuilder`] | `try` / `catch` / `finally` | `error.try`, `error.catch`, `error.final`, `error.done` |

mod if_builder;
mod loop_builder;
mod switch_builder;
mod try_builder;

pub use if_builder::IfBuilder;
pub use loop_builder::LoopBuilder;
pub use switch_builder::SwitchBuilder;
pub use try_builder::TryBuilder;

use crate::builder::FunctionBuilder;

/// A part of a construct, run by the builder at the right position.
pub type BuildFn<'a, 'p, T = ()> = Box<dyn FnOnce(&mut FunctionBuilder<'p>) -> T + 'a>;
