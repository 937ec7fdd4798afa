//! End-to-end construction tests.
//!
//! These tests drive the engine through the public API the way a language front end does:
//! 1. Create a program and a function builder
//! 2. Read and write named variables while emitting instructions
//! 3. Use the control-flow builders for structured statements
//! 4. Finish the function and check the resulting SSA form
//! 5. Run the verifier over the whole program

use std::thread;

use ssakit::{
    prelude::*,
    ssa::{ParameterKind, SideEffectKind},
};

fn program() -> Program {
    Program::new("test", ProgramContext::default().into_shared())
}

/// Returns the first block of `function` with the given name.
fn block_named(program: &Program, function: FunctionId, name: &str) -> BlockId {
    program
        .function(function)
        .unwrap()
        .blocks()
        .iter()
        .copied()
        .find(|id| program.block(*id).unwrap().name() == name)
        .unwrap_or_else(|| panic!("no block named {name}"))
}

/// Returns the phi edges of `value`, panicking if it is not a phi.
fn phi_edges(program: &Program, value: ValueId) -> Vec<ValueId> {
    match program.instruction(value).unwrap().kind() {
        InstKind::Phi { edges } => edges.clone(),
        other => panic!("expected phi, got {other:?}"),
    }
}

fn int(program: &Program, value: ValueId) -> Option<i64> {
    program.const_value(value).and_then(|c| c.as_int())
}

#[test]
fn test_if_merges_only_mutated_variable() {
    let mut program = program();
    let mut b = program.new_function_builder("main");

    let five = b.emit_const(5);
    b.write_variable("a", five);

    IfBuilder::new()
        .build_condition(|b| {
            let a = b.read_variable("a");
            let two = b.emit_const(2);
            b.emit_binop(BinaryOp::Lt, a, two).unwrap()
        })
        .build_true(|b| {
            let six = b.emit_const(6);
            b.write_variable("b", six);
            let a = b.read_variable("a");
            let b_value = b.read_variable("b");
            let sum = b.emit_binop(BinaryOp::Add, a, b_value).unwrap();
            b.write_variable("a", sum);
        })
        .finish(&mut b);

    let one = b.emit_const(1);
    let two = b.emit_const(2);
    let d = b.emit_binop(BinaryOp::Add, one, two).unwrap();
    b.write_variable("d", d);

    let a = b.read_variable("a");
    let d_read = b.read_variable("d");
    let main = b.function();
    b.finish();

    let done = block_named(&program, main, "if.done");
    let done_block = program.block(done).unwrap();
    assert_eq!(done_block.phis(), &[a]);

    let edges = phi_edges(&program, a);
    assert_eq!(edges.len(), 2);
    assert_eq!(int(&program, edges[0]), Some(11));
    assert_eq!(edges[1], five);

    assert_eq!(d_read, d);
    assert_eq!(int(&program, d), Some(3));
    assert!(program.verify().is_empty());
}

#[test]
fn test_thousands_of_sequential_ifs() {
    let mut program = program();
    let mut b = program.new_function_builder("main");
    let x = b.new_param("x");
    let one = b.emit_const(1);
    b.write_variable("a", one);

    for _ in 0..4_000 {
        IfBuilder::new()
            .build_condition(move |_| x)
            .build_true(|b| {
                let two = b.emit_const(2);
                b.write_variable("t", two);
            })
            .finish(&mut b);
    }
    let a = b.read_variable("a");
    let t = b.read_variable("t");
    b.emit_return(vec![a, t]);
    let main = b.function();
    b.finish();

    assert_eq!(a, one);
    let edges = phi_edges(&program, t);
    assert_eq!(edges.len(), 2);
    assert_eq!(int(&program, edges[0]), Some(2));
    assert!(program.instruction(edges[1]).unwrap().kind().is_phi());
    let last = program.instruction(t).unwrap().block();
    assert_eq!(program.block(last).unwrap().phis(), &[t]);
    assert!(program.function(main).unwrap().blocks().len() > 12_000);
    assert!(program.verify().is_empty());
}

#[test]
fn test_loop_with_break_and_continue() {
    let mut program = program();
    let mut b = program.new_function_builder("main");

    let one = b.emit_const(1);
    b.write_variable("a", one);

    LoopBuilder::new()
        .build_first_expr(|b| {
            let zero = b.emit_const(0);
            b.write_variable("i", zero);
        })
        .build_condition(|b| {
            let i = b.read_variable("i");
            let ten = b.emit_const(10);
            b.emit_binop(BinaryOp::Lt, i, ten).unwrap()
        })
        .build_body(|b| {
            IfBuilder::new()
                .build_condition(|b| {
                    let a = b.read_variable("a");
                    let three = b.emit_const(3);
                    b.emit_binop(BinaryOp::GtEq, a, three).unwrap()
                })
                .build_true(|b| {
                    b.emit_break();
                })
                .finish(b);
            IfBuilder::new()
                .build_condition(|b| {
                    let a = b.read_variable("a");
                    let two = b.emit_const(2);
                    b.emit_binop(BinaryOp::Eq, a, two).unwrap()
                })
                .build_true(|b| {
                    let five = b.emit_const(5);
                    b.write_variable("a", five);
                    b.emit_continue();
                })
                .finish(b);
            let a = b.read_variable("a");
            let two = b.emit_const(2);
            let doubled = b.emit_binop(BinaryOp::Mul, a, two).unwrap();
            b.write_variable("a", doubled);
        })
        .build_third(|b| {
            let i = b.read_variable("i");
            let one = b.emit_const(1);
            let next = b.emit_binop(BinaryOp::Add, i, one).unwrap();
            b.write_variable("i", next);
        })
        .finish(&mut b);

    let main = b.function();
    b.finish();

    let function = program.function(main).unwrap();
    let names: Vec<&str> = function
        .blocks()
        .iter()
        .map(|id| program.block(*id).unwrap().name())
        .filter(|name| name.starts_with("loop."))
        .collect();
    assert_eq!(names, ["loop.header", "loop.body", "loop.exit", "loop.latch"]);

    let header = program.block(block_named(&program, main, "loop.header")).unwrap();
    assert_eq!(header.preds().len(), 2);
    assert_eq!(header.phis().len(), 2);
    for phi in header.phis() {
        assert_eq!(phi_edges(&program, *phi).len(), 2);
    }
    let a_phi = header
        .phis()
        .iter()
        .copied()
        .find(|phi| program.instruction(*phi).unwrap().name() == Some("a"))
        .unwrap();
    assert_eq!(phi_edges(&program, a_phi)[0], one);

    let exit = program.block(block_named(&program, main, "loop.exit")).unwrap();
    let latch = block_named(&program, main, "loop.latch");
    assert_eq!(exit.preds().len(), 2);
    assert!(!exit.preds().contains(&latch));
    assert_eq!(program.block(latch).unwrap().preds().len(), 2);

    assert!(program.verify().is_empty());
}

#[test]
fn test_loop_without_writes_has_no_header_phi() {
    let mut program = program();
    let mut b = program.new_function_builder("main");
    let seven = b.emit_const(7);
    b.write_variable("x", seven);
    let limit = b.new_param("limit");

    let mut used = None;
    LoopBuilder::new()
        .build_condition(move |b| {
            let x = b.read_variable("x");
            b.emit_binop(BinaryOp::Lt, x, limit).unwrap()
        })
        .build_body(|b| {
            let x = b.read_variable("x");
            let one = b.emit_const(1);
            used = b.emit_binop(BinaryOp::Add, x, one);
        })
        .finish(&mut b);
    let after = b.read_variable("x");
    let main = b.function();
    b.finish();

    let header = program.block(block_named(&program, main, "loop.header")).unwrap();
    assert!(header.phis().is_empty());
    match program.instruction(used.unwrap()).unwrap().kind() {
        InstKind::BinOp { lhs, .. } => assert_eq!(*lhs, seven),
        other => panic!("expected binop, got {other:?}"),
    }
    assert_eq!(after, seven);
    assert!(program.verify().is_empty());
}

#[test]
fn test_closure_binds_call_site_value() {
    let mut program = program();
    let mut b = program.new_function_builder("main");

    let one = b.emit_const(1);
    b.write_variable("ca", one);
    let mut free = None;
    let f = b.build_closure("f", |b| {
        let ca = b.read_variable("ca");
        free = Some(ca);
        b.emit_return(vec![ca]);
    });

    let first = b.emit_call(f, vec![]).unwrap();
    let two = b.emit_const(2);
    b.write_variable("ca", two);
    let second = b.emit_call(f, vec![]).unwrap();
    b.finish();

    match program.instruction(free.unwrap()).unwrap().kind() {
        InstKind::Parameter {
            kind: ParameterKind::FreeValue,
            default,
            ..
        } => assert_eq!(*default, Some(one)),
        other => panic!("expected free value, got {other:?}"),
    }
    for (call, expected) in [(first, one), (second, two)] {
        match program.instruction(call).unwrap().kind() {
            InstKind::Call { binding, .. } => assert_eq!(binding.get("ca"), Some(&expected)),
            other => panic!("expected call, got {other:?}"),
        }
    }
    assert!(program.diagnostics().is_empty());
    assert!(program.verify().is_empty());
}

#[test]
fn test_closure_side_effect_per_call() {
    let mut program = program();
    let mut b = program.new_function_builder("main");

    let zero = b.emit_const(0);
    b.write_variable("cadd", zero);
    let inc = b.build_closure("inc", |b| {
        let cadd = b.read_variable("cadd");
        let one = b.emit_const(1);
        let next = b.emit_binop(BinaryOp::Add, cadd, one).unwrap();
        b.write_variable("cadd", next);
    });

    b.emit_call(inc, vec![]).unwrap();
    let after_first = b.read_variable("cadd");
    b.emit_call(inc, vec![]).unwrap();
    let after_second = b.read_variable("cadd");
    b.finish();

    assert_ne!(after_first, zero);
    assert_ne!(after_first, after_second);
    for value in [after_first, after_second] {
        assert!(matches!(
            program.instruction(value).unwrap().kind(),
            InstKind::SideEffect { name, .. } if name == "cadd"
        ));
    }

    let function = program.function_by_name("inc").unwrap();
    let effect = program.function(function).unwrap().side_effect("cadd").unwrap();
    assert_eq!(effect.kind, SideEffectKind::Value);
    assert!(program.values_by_name("cadd").contains(&after_second));
    assert!(program.verify().is_empty());
}

#[test]
fn test_delete_rejected_while_used() {
    let mut program = program();
    let mut b = program.new_function_builder("main");
    let x = b.new_param("x");
    let y = b.new_param("y");
    let sum = b.emit_binop(BinaryOp::Add, x, y).unwrap();
    b.emit_return(vec![sum]);
    b.finish();

    assert!(matches!(
        program.delete_inst(sum),
        Err(Error::InstructionInUse { users: 1, .. })
    ));
    assert!(program.instruction(sum).is_some());

    program.replace_all_value(sum, x).unwrap();
    program.delete_inst(sum).unwrap();
    assert!(program.instruction(sum).is_none());
    assert!(!program.users(x).is_empty());
    assert!(program.verify().is_empty());
}

#[test]
fn test_seal_twice_keeps_phi_edges() {
    let mut program = program();
    let mut b = program.new_function_builder("main");
    let cond = b.new_param("cond");
    let one = b.emit_const(1);
    let two = b.emit_const(2);

    let left = b.new_basic_block("left");
    let right = b.new_basic_block("right");
    let join = b.new_basic_block_unsealed("join");
    b.emit_if(cond, left, right);

    b.set_current_block(left);
    b.write_variable("v", one);
    b.emit_jump(join);
    b.set_current_block(right);
    b.write_variable("v", two);
    b.emit_jump(join);

    b.set_current_block(join);
    let v = b.read_variable("v");
    b.seal(join);
    b.seal(join);
    b.finish();

    assert_eq!(phi_edges(&program, v), vec![one, two]);
    let diagnostics = program.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].tag, DiagnosticTag::DoubleSeal);
    assert_eq!(diagnostics[0].severity, Severity::Warn);
    assert!(program.verify().is_empty());
}

#[test]
fn test_try_catch_sees_protected_writes() {
    let mut program = program();
    let mut b = program.new_function_builder("main");
    let zero = b.emit_const(0);
    b.write_variable("state", zero);

    TryBuilder::new()
        .build_try(|b| {
            let one = b.emit_const(1);
            b.write_variable("state", one);
        })
        .build_catch(Some("e"), |b| {
            let two = b.emit_const(2);
            b.write_variable("state", two);
        })
        .finish(&mut b);
    let state = b.read_variable("state");
    b.finish();

    let edges = phi_edges(&program, state);
    assert_eq!(edges.len(), 2);
    assert_eq!(int(&program, edges[0]), Some(1));
    assert_eq!(int(&program, edges[1]), Some(2));
    assert!(program.verify().is_empty());
}

#[test]
fn test_queued_bodies_build_in_order() {
    let mut program = program();
    let mut b = program.new_function_builder("main");
    let one = b.emit_const(1);
    b.write_variable("ca", one);
    let (f, f_value) = b.new_closure("f");
    let call = b.emit_call(f_value, vec![]).unwrap();
    b.finish();

    let mut queue = BuildQueue::new();
    queue.push(f, |b: &mut FunctionBuilder<'_>| {
        let ca = b.read_variable("ca");
        b.emit_return(vec![ca]);
    });
    assert_eq!(queue.drain(&mut program).unwrap(), 1);
    assert!(queue.is_empty());

    match program.instruction(call).unwrap().kind() {
        InstKind::Call { binding, .. } => assert_eq!(binding.get("ca"), Some(&one)),
        other => panic!("expected call, got {other:?}"),
    }
    assert!(program.verify().is_empty());
}

#[test]
fn test_programs_share_context_across_threads() {
    let context = ProgramContext::default().into_shared();

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let context = context.clone();
            thread::spawn(move || {
                let mut program = Program::new(format!("unit{n}"), context);
                let mut b = program.new_function_builder("main");
                let x = b.new_param("x");
                let k = b.emit_const(n);
                let sum = b.emit_binop(BinaryOp::Add, x, k).unwrap();
                b.emit_return(vec![sum]);
                b.finish();
                program
            })
        })
        .collect();

    let programs: Vec<Program> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let mut globals: Vec<_> = programs
        .iter()
        .flat_map(|p| p.instructions().map(|i| i.global_id()).collect::<Vec<_>>())
        .collect();
    let total = globals.len();
    globals.sort();
    globals.dedup();
    assert_eq!(globals.len(), total);

    for program in &programs {
        assert!(program.verify().is_empty());
        for inst in program.instructions() {
            assert!(program.instruction_by_global(inst.global_id()).is_some());
        }
    }
}

#[test]
fn test_display_renders_phi() {
    let mut program = program();
    let mut b = program.new_function_builder("main");
    let x = b.new_param("x");
    IfBuilder::new()
        .build_condition(move |_| x)
        .build_true(|b| {
            let one = b.emit_const(1);
            b.write_variable("r", one);
        })
        .build_false(|b| {
            let two = b.emit_const(2);
            b.write_variable("r", two);
        })
        .finish(&mut b);
    let r = b.read_variable("r");
    b.emit_return(vec![r]);
    let main = b.function();
    b.finish();

    let text = program.display_function(main).to_string();
    assert!(text.contains("if.done"));
    assert!(text.contains("phi"));
}
