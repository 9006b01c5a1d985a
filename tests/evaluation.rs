#[macro_use]
mod cases;

use lightvm::expr::{CatchBlock, Expr, LabelTarget, LambdaExpr, ParameterExpr};
use lightvm::{BuiltinClasses, ClassBuilder, Error, Type, Value};

fn main_lambda(body: Expr) -> std::sync::Arc<LambdaExpr> {
    LambdaExpr::new(Some("main"), vec![], body)
}

test_case! {
    name: sum_of_constants,
    input: main_lambda(Expr::equal(
        Expr::add(Expr::constant(3), Expr::constant(4)),
        Expr::constant(7),
    )),
    result: { Value::Bool(true) },
    listing: { vec![
        "LoadConstant I32(3)",
        "LoadConstant I32(4)",
        "Arith Add.I32",
        "LoadConstant I32(7)",
        "Compare Eq.I32",
    ] },
}

test_case! {
    name: null_plus_five,
    input: main_lambda(Expr::add(
        Expr::null(Type::nullable(Type::I32)),
        Expr::convert(Expr::constant(5), Type::nullable(Type::I32)),
    )),
    result: { Value::Null },
}

test_case! {
    name: coalesce_null,
    input: main_lambda(Expr::coalesce(
        Expr::null(Type::nullable(Type::I32)),
        Expr::constant(5),
    )),
    result: { Value::I32(5) },
}

test_case! {
    name: unchecked_overflow_wraps,
    input: main_lambda(Expr::add(Expr::constant(i32::MAX), Expr::constant(1))),
    result: { Value::I32(i32::MIN) },
}

test_case! {
    name: checked_overflow_throws,
    input: main_lambda(Expr::add_checked(Expr::constant(i32::MAX), Expr::constant(1))),
    result: { Err(Error::Runtime(e)) if e.class().name() == "OverflowException" },
    error: { "Error: OverflowException: Arithmetic operation resulted in an overflow.\n  at main\n" },
}

test_case! {
    name: catch_overflow,
    input: main_lambda(Expr::try_catch(
        Expr::add_checked(Expr::constant(i32::MAX), Expr::constant(1)),
        vec![CatchBlock::new(
            Type::class(&BuiltinClasses::get().overflow),
            None,
            Expr::constant(-1),
        )],
    )),
    result: { Value::I32(-1) },
}

test_case! {
    name: goto_out_of_finally_keeps_value,
    input: {
        let total = ParameterExpr::new(Type::I32, "total");
        let out = LabelTarget::new("out");
        main_lambda(Expr::block(
            vec![total.clone()],
            vec![
                Expr::try_finally(
                    Expr::try_finally(
                        Expr::goto(&out),
                        Expr::assign(total.expr(), Expr::add(total.expr(), Expr::constant(1))),
                    ),
                    Expr::assign(total.expr(), Expr::add(total.expr(), Expr::constant(10))),
                ),
                Expr::label(&out, None),
                total.expr(),
            ],
        ))
    },
    result: { Value::I32(11) },
}

test_case! {
    name: undefined_label,
    input: main_lambda(Expr::goto(&LabelTarget::new("nowhere"))),
    error: { "Compilation error: Reference to undefined label 'nowhere'\n" },
}

test_case! {
    name: abstract_construction,
    input: {
        let shape = ClassBuilder::new("Shape").abstract_class().build();
        main_lambda(Expr::new_object(&shape, None, vec![]))
    },
    result: { Err(Error::Compilation(_)) },
    error: { "Compilation error: Cannot create an instance of abstract class 'Shape'\n" },
}
