//! Tests for the light compiler: emitted code, label validation and
//! variable resolution.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use expect_test::{Expect, expect};
use pretty_assertions::assert_eq;

use super::CompileError;
use crate::api::{CompileOptionsOverride, Error, compile, compile_with};
use crate::expr::{
    CatchBlock, Expr, LabelTarget, LambdaExpr, MethodInfo, ParameterExpr, SwitchCase,
};
use crate::interpreter::{Instruction, Interpreter, LightLambda};
use crate::types::{ClassBuilder, Type};
use crate::values::{Callable, Value};

/// One instruction per line, without indices or label markers.
fn listing(interpreter: &Interpreter) -> String {
    interpreter
        .instructions()
        .iter()
        .map(|instruction| format!("{}\n", instruction))
        .collect()
}

fn check_listing(lambda: &LightLambda, expect: Expect) {
    expect.assert_eq(&listing(lambda.interpreter()));
}

fn compile_error(lambda: &LambdaExpr) -> CompileError {
    match compile(lambda) {
        Err(Error::Compilation(err)) => err,
        other => panic!("expected a compilation error, got {:?}", other),
    }
}

fn run(lambda: &LightLambda, args: &[Value]) -> Value {
    let mut args = args.to_vec();
    lambda.run(&mut args).unwrap()
}

fn has_instruction(interpreter: &Interpreter, name: &str) -> bool {
    interpreter.instructions().iter().any(|i| i.name() == name)
}

#[test]
fn test_compile_addition() {
    let x = ParameterExpr::new(Type::I32, "x");
    let lambda = compile(&LambdaExpr::new(
        Some("inc"),
        vec![x.clone()],
        Expr::add(x.expr(), Expr::constant(1)),
    ))
    .unwrap();

    check_listing(
        &lambda,
        expect![[r#"
            InitParameter 0
            LoadLocal 0
            LoadConstant I32(1)
            Arith Add.I32
        "#]],
    );
    assert_eq!(lambda.interpreter().max_stack_depth(), 2);
    assert_eq!(lambda.interpreter().local_count(), 1);
    assert_eq!(run(&lambda, &[Value::I32(41)]), Value::I32(42));
}

#[test]
fn test_string_constants_go_through_the_object_pool() {
    let lambda = compile(&LambdaExpr::new(None, vec![], Expr::constant("hello"))).unwrap();
    check_listing(
        &lambda,
        expect![[r#"
            LoadCached #0
        "#]],
    );
    assert_eq!(run(&lambda, &[]), Value::str("hello"));
}

#[test]
fn test_void_lambda_pops_unused_values() {
    let x = ParameterExpr::new(Type::I32, "x");
    let body = Expr::block_typed(
        Type::Void,
        vec![],
        vec![Expr::add(x.expr(), Expr::constant(1))],
    );
    let lambda = compile(&LambdaExpr::new(None, vec![x], body)).unwrap();
    check_listing(
        &lambda,
        expect![[r#"
            InitParameter 0
            LoadLocal 0
            LoadConstant I32(1)
            Arith Add.I32
            Pop
        "#]],
    );
    assert_eq!(run(&lambda, &[Value::I32(1)]), Value::Null);
}

#[test]
fn test_captured_parameter_is_boxed() {
    let x = ParameterExpr::new(Type::I32, "x");
    let inner = LambdaExpr::new(
        Some("inner"),
        vec![],
        Expr::add(x.expr(), Expr::constant(1)),
    );
    let outer = compile(&LambdaExpr::new(
        Some("outer"),
        vec![x],
        Expr::lambda(&inner),
    ))
    .unwrap();

    check_listing(
        &outer,
        expect![[r#"
            InitParameter 0 (boxed)
            LoadLocalBox 0 (boxed)
            CreateClosure inner (1 captured)
        "#]],
    );

    let Some(Instruction::CreateClosure { creator, .. }) =
        outer.interpreter().instructions().last()
    else {
        panic!("expected a closure creation");
    };
    assert_eq!(creator.interpreter().closure_size(), 1);
    expect![[r#"
        LoadClosure 0
        LoadConstant I32(1)
        Arith Add.I32
    "#]]
    .assert_eq(&listing(creator.interpreter()));

    let Value::Function(delegate) = run(&outer, &[Value::I32(5)]) else {
        panic!("expected a delegate");
    };
    assert_eq!(delegate.invoke(&mut []).unwrap(), Value::I32(6));
}

#[test]
fn test_uncaptured_locals_stay_in_frame_slots() {
    let y = ParameterExpr::new(Type::I32, "y");
    let body = Expr::block(
        vec![y.clone()],
        vec![
            Expr::assign(y.expr(), Expr::constant(3)),
            Expr::multiply(y.expr(), y.expr()),
        ],
    );
    let lambda = compile(&LambdaExpr::new(None, vec![], body)).unwrap();
    check_listing(
        &lambda,
        expect![[r#"
            InitLocal 0
            LoadConstant I32(3)
            StoreLocal 0
            LoadLocal 0
            LoadLocal 0
            Arith Mul.I32
        "#]],
    );
    assert_eq!(run(&lambda, &[]), Value::I32(9));
}

#[test]
fn test_sibling_blocks_reuse_slots() {
    let a = ParameterExpr::new(Type::I32, "a");
    let b = ParameterExpr::new(Type::I32, "b");
    let body = Expr::block(
        vec![],
        vec![
            Expr::block(vec![a.clone()], vec![Expr::assign(a.expr(), Expr::constant(1))]),
            Expr::block(vec![b.clone()], vec![Expr::assign(b.expr(), Expr::constant(2))]),
        ],
    );
    let lambda = compile(&LambdaExpr::new(None, vec![], body)).unwrap();
    assert_eq!(lambda.interpreter().local_count(), 1);
    assert_eq!(run(&lambda, &[]), Value::I32(2));
}

#[test]
fn test_short_circuit_skips_right_operand() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let tick = MethodInfo::native_static("tick", vec![], Type::Bool, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Bool(true))
    });

    let and_also = compile(&LambdaExpr::new(
        None,
        vec![],
        Expr::and_also(Expr::constant(false), Expr::call(None, &tick, vec![])),
    ))
    .unwrap();
    assert_eq!(run(&and_also, &[]), Value::Bool(false));

    let or_else = compile(&LambdaExpr::new(
        None,
        vec![],
        Expr::or_else(Expr::constant(true), Expr::call(None, &tick, vec![])),
    ))
    .unwrap();
    assert_eq!(run(&or_else, &[]), Value::Bool(true));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let evaluated = compile(&LambdaExpr::new(
        None,
        vec![],
        Expr::and_also(Expr::constant(true), Expr::call(None, &tick, vec![])),
    ))
    .unwrap();
    assert_eq!(run(&evaluated, &[]), Value::Bool(true));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

fn int_switch(x: &ParameterExpr) -> Arc<LambdaExpr> {
    let body = Expr::switch(
        x.expr(),
        Some(Expr::constant(-1)),
        None,
        vec![
            SwitchCase::new(vec![Expr::constant(1)], Expr::constant(10)),
            SwitchCase::new(vec![Expr::constant(2), Expr::constant(3)], Expr::constant(20)),
        ],
    );
    LambdaExpr::new(Some("classify"), vec![x.clone()], body)
}

#[test]
fn test_integer_switch_uses_jump_table() {
    let x = ParameterExpr::new(Type::I32, "x");
    let lambda = compile(&int_switch(&x)).unwrap();
    assert!(has_instruction(lambda.interpreter(), "IntSwitch"));
    assert!(!has_instruction(lambda.interpreter(), "Compare"));
    lambda.interpreter().validate().unwrap();

    assert_eq!(run(&lambda, &[Value::I32(1)]), Value::I32(10));
    assert_eq!(run(&lambda, &[Value::I32(3)]), Value::I32(20));
    assert_eq!(run(&lambda, &[Value::I32(7)]), Value::I32(-1));
}

#[test]
fn test_small_switch_compiles_to_tests() {
    let x = ParameterExpr::new(Type::I32, "x");
    let lambda = compile_with(
        CompileOptionsOverride {
            switch_table_threshold: Some(4),
            ..Default::default()
        },
        &int_switch(&x),
    )
    .unwrap();
    assert!(!has_instruction(lambda.interpreter(), "IntSwitch"));
    assert!(has_instruction(lambda.interpreter(), "Compare"));
    lambda.interpreter().validate().unwrap();

    assert_eq!(run(&lambda, &[Value::I32(1)]), Value::I32(10));
    assert_eq!(run(&lambda, &[Value::I32(2)]), Value::I32(20));
    assert_eq!(run(&lambda, &[Value::I32(0)]), Value::I32(-1));
}

#[test]
fn test_string_switch_with_null_case() {
    let s = ParameterExpr::new(Type::Str, "s");
    let body = Expr::switch(
        s.expr(),
        Some(Expr::constant("other")),
        None,
        vec![
            SwitchCase::new(vec![Expr::constant("a")], Expr::constant("first")),
            SwitchCase::new(
                vec![Expr::constant("b"), Expr::constant_typed(Value::Null, Type::Str)],
                Expr::constant("second or null"),
            ),
        ],
    );
    let lambda = compile(&LambdaExpr::new(None, vec![s], body)).unwrap();
    assert!(has_instruction(lambda.interpreter(), "StringSwitch"));

    assert_eq!(run(&lambda, &[Value::str("a")]), Value::str("first"));
    assert_eq!(run(&lambda, &[Value::str("b")]), Value::str("second or null"));
    assert_eq!(run(&lambda, &[Value::Null]), Value::str("second or null"));
    assert_eq!(run(&lambda, &[Value::str("z")]), Value::str("other"));
}

#[test]
fn test_switch_with_computed_tests() {
    let x = ParameterExpr::new(Type::I32, "x");
    let y = ParameterExpr::new(Type::I32, "y");
    let body = Expr::switch(
        x.expr(),
        Some(Expr::constant("no")),
        None,
        vec![SwitchCase::new(
            vec![Expr::add(y.expr(), Expr::constant(1))],
            Expr::constant("next"),
        )],
    );
    let lambda = compile(&LambdaExpr::new(None, vec![x, y], body)).unwrap();
    assert!(!has_instruction(lambda.interpreter(), "IntSwitch"));

    assert_eq!(run(&lambda, &[Value::I32(5), Value::I32(4)]), Value::str("next"));
    assert_eq!(run(&lambda, &[Value::I32(5), Value::I32(5)]), Value::str("no"));
}

#[test]
fn test_jump_between_switch_cases() {
    crate::test_utils::init_test_logging();
    // case 1: goto two; case 2: two: result = 2
    let x = ParameterExpr::new(Type::I32, "x");
    let result = ParameterExpr::new(Type::I32, "result");
    let two = LabelTarget::new("two");
    let switch = Expr::switch(
        x.expr(),
        None,
        None,
        vec![
            SwitchCase::new(
                vec![Expr::constant(1)],
                Expr::block(vec![], vec![Expr::goto(&two)]),
            ),
            SwitchCase::new(
                vec![Expr::constant(2)],
                Expr::block(
                    vec![],
                    vec![
                        Expr::label(&two, None),
                        Expr::assign(result.expr(), Expr::constant(2)),
                    ],
                ),
            ),
        ],
    );
    let body = Expr::block(
        vec![result.clone()],
        vec![switch, result.expr()],
    );
    let lambda = compile(&LambdaExpr::new(None, vec![x], body)).unwrap();
    assert_eq!(run(&lambda, &[Value::I32(1)]), Value::I32(2));
    assert_eq!(run(&lambda, &[Value::I32(3)]), Value::I32(0));
}

// ============================================================================
// Compilation errors
// ============================================================================

#[test]
fn test_undefined_variable() {
    let y = ParameterExpr::new(Type::I32, "y");
    let err = compile_error(&LambdaExpr::new(None, vec![], y.expr()));
    assert_eq!(err, CompileError::UndefinedVariable("y".into()));
}

#[test]
fn test_rethrow_outside_catch() {
    let err = compile_error(&LambdaExpr::new(None, vec![], Expr::rethrow()));
    assert_eq!(err, CompileError::RethrowOutsideCatch);
}

#[test]
fn test_rethrow_inside_catch_compiles() {
    let body = Expr::try_catch(
        Expr::empty(),
        vec![CatchBlock::any(None, Expr::rethrow())],
    );
    assert!(compile(&LambdaExpr::new(None, vec![], body)).is_ok());
}

#[test]
fn test_assignment_to_constant() {
    let body = Expr::assign(Expr::constant(1), Expr::constant(2));
    let err = compile_error(&LambdaExpr::new(None, vec![], body));
    assert_eq!(err, CompileError::NotAnLvalue("Constant"));
}

#[test]
fn test_abstract_class_construction() {
    let shape = ClassBuilder::new("Shape").abstract_class().build();
    let err = compile_error(&LambdaExpr::new(
        None,
        vec![],
        Expr::new_object(&shape, None, vec![]),
    ));
    assert_eq!(err, CompileError::AbstractConstruction("Shape".into()));
}

#[test]
fn test_user_defined_and_also_is_unsupported() {
    let both = MethodInfo::native_static(
        "both",
        vec![],
        Type::Bool,
        |_| Ok(Value::Bool(true)),
    );
    let body = Expr::binary_with_method(
        crate::expr::BinaryOp::AndAlso,
        Expr::constant(true),
        Expr::constant(true),
        false,
        both,
    );
    let err = compile_error(&LambdaExpr::new(None, vec![], body));
    assert!(matches!(err, CompileError::Unsupported(_)));
}

#[test]
fn test_undefined_label() {
    let nowhere = LabelTarget::new("nowhere");
    let err = compile_error(&LambdaExpr::new(None, vec![], Expr::goto(&nowhere)));
    assert_eq!(err, CompileError::LabelTargetUndefined("nowhere".into()));
}

#[test]
fn test_jump_into_expression() {
    let inside = LabelTarget::new("inside");
    let body = Expr::block(
        vec![],
        vec![
            Expr::goto(&inside),
            Expr::add(
                Expr::block(
                    vec![],
                    vec![Expr::label(&inside, None), Expr::constant(1)],
                ),
                Expr::constant(2),
            ),
        ],
    );
    let err = compile_error(&LambdaExpr::new(None, vec![], body));
    assert_eq!(err, CompileError::ControlCannotEnterExpression("inside".into()));
}

#[test]
fn test_jump_into_try() {
    let inside = LabelTarget::new("inside");
    let body = Expr::block(
        vec![],
        vec![
            Expr::goto(&inside),
            Expr::try_finally(
                Expr::block(vec![], vec![Expr::label(&inside, None)]),
                Expr::empty(),
            ),
        ],
    );
    let err = compile_error(&LambdaExpr::new(None, vec![], body));
    assert_eq!(err, CompileError::ControlCannotEnterTry("inside".into()));
}

#[test]
fn test_jump_out_of_finally() {
    let exit = LabelTarget::new("exit");
    let body = Expr::block(
        vec![],
        vec![
            Expr::try_finally(Expr::empty(), Expr::goto(&exit)),
            Expr::label(&exit, None),
        ],
    );
    let err = compile_error(&LambdaExpr::new(None, vec![], body));
    assert_eq!(err, CompileError::ControlCannotLeaveFinally);
}

#[test]
fn test_jump_out_of_filter() {
    let exit = LabelTarget::new("exit");
    let filter = Expr::block(
        vec![],
        vec![Expr::goto(&exit), Expr::constant(true)],
    );
    let body = Expr::block(
        vec![],
        vec![
            Expr::try_catch(
                Expr::empty(),
                vec![CatchBlock::any(None, Expr::empty()).with_filter(filter)],
            ),
            Expr::label(&exit, None),
        ],
    );
    let err = compile_error(&LambdaExpr::new(None, vec![], body));
    assert_eq!(err, CompileError::ControlCannotLeaveFilterTest);
}

#[test]
fn test_ambiguous_jump() {
    let twice = LabelTarget::new("twice");
    let body = Expr::block(
        vec![],
        vec![
            Expr::goto(&twice),
            Expr::block(vec![], vec![Expr::label(&twice, None)]),
            Expr::block(vec![], vec![Expr::label(&twice, None)]),
        ],
    );
    let err = compile_error(&LambdaExpr::new(None, vec![], body));
    assert_eq!(err, CompileError::AmbiguousJump("twice".into()));
}

#[test]
fn test_label_reused_in_sibling_blocks_with_local_jumps() {
    crate::test_utils::init_test_logging();
    let again = LabelTarget::new("again");
    let n = ParameterExpr::new(Type::I32, "n");
    let countdown = || {
        Expr::block(
            vec![],
            vec![
                Expr::label(&again, None),
                Expr::assign(n.expr(), Expr::subtract(n.expr(), Expr::constant(1))),
                Expr::if_then(
                    Expr::greater_than(n.expr(), Expr::constant(0)),
                    Expr::goto(&again),
                ),
            ],
        )
    };
    let body = Expr::block(
        vec![],
        vec![
            countdown(),
            Expr::assign(n.expr(), Expr::constant(2)),
            countdown(),
            n.expr(),
        ],
    );
    let lambda = compile(&LambdaExpr::new(None, vec![n.clone()], body)).unwrap();
    assert_eq!(run(&lambda, &[Value::I32(3)]), Value::I32(0));
}

#[test]
fn test_non_local_jump_with_value() {
    let valued = LabelTarget::typed(Type::I32, "valued");
    let body = Expr::block(
        vec![],
        vec![
            Expr::block(
                vec![],
                vec![Expr::goto_value(&valued, Expr::constant(1))],
            ),
            Expr::block(
                vec![],
                vec![Expr::label(&valued, Some(Expr::constant(0)))],
            ),
        ],
    );
    let err = compile_error(&LambdaExpr::new(None, vec![], body));
    assert_eq!(err, CompileError::NonLocalJumpWithValue("valued".into()));
}

// ============================================================================
// Options and determinism
// ============================================================================

#[test]
fn test_compilation_is_repeatable() {
    let x = ParameterExpr::new(Type::I32, "x");
    let tree = int_switch(&x);
    let first = compile(&tree).unwrap();
    let second = compile(&tree).unwrap();
    assert_eq!(
        first.interpreter().disassemble(),
        second.interpreter().disassemble()
    );
    assert_eq!(run(&first, &[Value::I32(2)]), run(&second, &[Value::I32(2)]));
}

#[test]
fn test_debug_info_can_be_disabled() {
    let document = crate::expr::SymbolDocument::new("script.lvm");
    let body = Expr::block(
        vec![],
        vec![Expr::debug_info(&document, 1, 1, 1, 10), Expr::constant(1)],
    );
    let tree = LambdaExpr::new(None, vec![], body);

    let with = compile(&tree).unwrap();
    assert_eq!(with.interpreter().debug_infos().len(), 1);

    let without = compile_with(
        CompileOptionsOverride {
            emit_debug_info: Some(false),
            ..Default::default()
        },
        &tree,
    )
    .unwrap();
    assert!(without.interpreter().debug_infos().is_empty());
}
