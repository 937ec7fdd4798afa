//! Human-readable rendering of functions.
//!
//! ```text
//! fn main() -> number
//! b0 entry [sealed finished] preds: [] succs: [b1, b2]
//!   v2 = const 5
//!   if v3 -> b1, b2
//! b2 if.done [sealed] preds: [b1, b0] succs: []
//!   v7 = phi [v6, b1] [v2, b0]
//!   return v7
//! ```

use std::fmt::{self, Write as _};

use crate::ssa::{FunctionId, InstKind, ParameterKind, Program, ValueId};

/// Displays one function of a program, see [`Program::display_function`].
pub struct FunctionDisplay<'a> {
    program: &'a Program,
    function: FunctionId,
}

impl Program {
    /// Returns a value rendering `function` with its blocks, phis and instructions.
    #[must_use]
    pub fn display_function(&self, function: FunctionId) -> FunctionDisplay<'_> {
        FunctionDisplay {
            program: self,
            function,
        }
    }

    /// Renders a single instruction, e.g. `v6 = add v1, v2`.
    #[must_use]
    pub fn render_instruction(&self, id: ValueId) -> String {
        let Some(inst) = self.instruction(id) else {
            return format!("{id} = <deleted>");
        };

        let mut out = String::new();
        let _ = match &inst.kind {
            InstKind::Const(value) => write!(out, "{id} = const {value}"),
            InstKind::Undefined { name, .. } => write!(out, "{id} = undefined {name}"),
            InstKind::Parameter {
                name,
                kind: ParameterKind::Normal { index },
                ..
            } => write!(out, "{id} = param #{index} {name}"),
            InstKind::Parameter {
                name,
                kind: ParameterKind::FreeValue,
                default,
            } => match default {
                Some(default) => write!(out, "{id} = free {name} default {default}"),
                None => write!(out, "{id} = free {name}"),
            },
            InstKind::ParameterMember { name, .. } => write!(out, "{id} = param_member {name}"),
            InstKind::BinOp { op, lhs, rhs } => write!(out, "{id} = {op} {lhs}, {rhs}"),
            InstKind::UnOp { op, operand } => write!(out, "{id} = {op} {operand}"),
            InstKind::Call {
                method,
                args,
                binding,
                side_effects,
            } => {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                let _ = write!(out, "{id} = call {method}({})", args.join(", "));
                if !binding.is_empty() {
                    let items: Vec<String> =
                        binding.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                    let _ = write!(out, " binding[{}]", items.join(", "));
                }
                if !side_effects.is_empty() {
                    let items: Vec<String> = side_effects
                        .iter()
                        .map(|(k, v)| format!("{k}: {v}"))
                        .collect();
                    let _ = write!(out, " side_effects[{}]", items.join(", "));
                }
                Ok(())
            }
            InstKind::Phi { edges } => {
                let preds = self.blk(inst.block).preds.clone();
                let _ = write!(out, "{id} = phi");
                for (i, edge) in edges.iter().enumerate() {
                    match preds.get(i) {
                        Some(pred) => {
                            let _ = write!(out, " [{edge}, {pred}]");
                        }
                        None => {
                            let _ = write!(out, " [{edge}, ?]");
                        }
                    }
                }
                Ok(())
            }
            InstKind::SideEffect { name, call, .. } => {
                write!(out, "{id} = side_effect {name} from {call}")
            }
            InstKind::Field { object, key } => write!(out, "{id} = field {object}.{key}"),
            InstKind::Update { object, key, value } => {
                write!(out, "{id} = update {object}.{key} = {value}")
            }
            InstKind::Make { blueprint } => match blueprint {
                Some(bp) => write!(out, "{id} = make {bp}"),
                None => write!(out, "{id} = make"),
            },
            InstKind::Function(function) => write!(out, "{id} = function {function}"),
            InstKind::Extern { name } => write!(out, "{id} = extern {name}"),
            InstKind::TypeCast { value } => write!(out, "{id} = cast {value} to {}", inst.ty),
            InstKind::TypeValue(ty) => write!(out, "{id} = type {ty}"),
            InstKind::Assert { cond, message, .. } => match message {
                Some(message) => write!(out, "{id} = assert {cond}, {message}"),
                None => write!(out, "{id} = assert {cond}"),
            },
            InstKind::Panic { info } => write!(out, "{id} = panic {info}"),
            InstKind::Recover => write!(out, "{id} = recover"),
            InstKind::Next { iter, is_in } => {
                let how = if *is_in { "in" } else { "range" };
                write!(out, "{id} = next {how} {iter}")
            }
            InstKind::ErrorCatch { name, .. } => write!(out, "{id} = error_catch {name}"),
            InstKind::Jump { to } => write!(out, "jump {to}"),
            InstKind::If {
                cond,
                on_true,
                on_false,
            } => write!(out, "if {cond} -> {on_true}, {on_false}"),
            InstKind::Loop { cond, body, exit } => write!(out, "loop {cond} -> {body}, {exit}"),
            InstKind::Switch {
                cond,
                default,
                labels,
            } => {
                let labels: Vec<String> = labels
                    .iter()
                    .map(|l| format!("{}: {}", l.value, l.dest))
                    .collect();
                write!(out, "switch {cond} [{}] default {default}", labels.join(", "))
            }
            InstKind::Return { results } => {
                let results: Vec<String> = results.iter().map(ToString::to_string).collect();
                if results.is_empty() {
                    write!(out, "return")
                } else {
                    write!(out, "return {}", results.join(", "))
                }
            }
            InstKind::ErrorHandler {
                try_block,
                catches,
                finally,
                done,
            } => {
                let catches: Vec<String> = catches.iter().map(ToString::to_string).collect();
                let _ = write!(out, "error_handler try {try_block} catch [{}]", catches.join(", "));
                if let Some(finally) = finally {
                    let _ = write!(out, " final {finally}");
                }
                write!(out, " done {done}")
            }
        };
        out
    }
}

fn join_blocks(blocks: &[crate::ssa::BlockId]) -> String {
    blocks
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for FunctionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(function) = self.program.function(self.function) else {
            return write!(f, "<unknown function {}>", self.function);
        };

        let params: Vec<&str> = function
            .params
            .iter()
            .filter_map(|p| self.program.instruction(*p))
            .map(|p| p.name().unwrap_or("_"))
            .collect();
        write!(f, "fn {}({})", function.name, params.join(", "))?;
        if let Some(ty) = &function.ty {
            write!(f, " -> {}", ty.returns)?;
        }
        writeln!(f)?;

        for (_, free) in &function.free_values {
            writeln!(f, "  {}", self.program.render_instruction(*free))?;
        }
        for side_effect in &function.side_effects {
            writeln!(f, "  side effect {} ({})", side_effect.name, side_effect.kind)?;
        }

        for block_id in &function.blocks {
            let Some(block) = self.program.block(*block_id) else {
                continue;
            };
            let mut flags = Vec::new();
            if block.is_sealed() {
                flags.push("sealed");
            }
            if block.is_finished() {
                flags.push("finished");
            }
            writeln!(
                f,
                "{} {} [{}] preds: [{}] succs: [{}]",
                block.id,
                block.name,
                flags.join(" "),
                join_blocks(&block.preds),
                join_blocks(&block.succs)
            )?;
            for id in block.phis.iter().chain(block.insts.iter()) {
                writeln!(f, "  {}", self.program.render_instruction(*id))?;
            }
        }
        Ok(())
    }
}
