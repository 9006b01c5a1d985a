//! Captured variables are shared cells between a lambda and its closures.

use lightvm_core::api::compile;
use lightvm_core::expr::{Expr, LabelTarget, LambdaExpr, ParameterExpr};
use lightvm_core::types::Type;
use lightvm_core::values::{Callable, Value};
use pretty_assertions::assert_eq;

fn run(parameters: Vec<ParameterExpr>, body: Expr, args: &mut [Value]) -> Value {
    let lambda = compile(&LambdaExpr::new(Some("main"), parameters, body)).unwrap();
    lambda.interpreter().validate().unwrap();
    lambda.run(args).unwrap()
}

#[test]
fn test_closure_mutation_is_visible_outside() {
    let c = ParameterExpr::new(Type::I32, "c");
    let inc_ty = Type::delegate(vec![], Type::I32);
    let inc = ParameterExpr::new(inc_ty, "inc");
    let increment = LambdaExpr::new(
        Some("increment"),
        vec![],
        Expr::assign(c.expr(), Expr::add(c.expr(), Expr::constant(1))),
    );

    let body = Expr::block(
        vec![c.clone(), inc.clone()],
        vec![
            Expr::assign(inc.expr(), Expr::lambda(&increment)),
            Expr::invoke(inc.expr(), vec![]),
            Expr::invoke(inc.expr(), vec![]),
            c.expr(),
        ],
    );
    assert_eq!(run(vec![], body, &mut []), Value::I32(2));
}

#[test]
fn test_closure_sees_later_writes() {
    let c = ParameterExpr::new(Type::I32, "c");
    let get = ParameterExpr::new(Type::delegate(vec![], Type::I32), "get");
    let read = LambdaExpr::new(Some("read"), vec![], c.expr());

    let body = Expr::block(
        vec![c.clone(), get.clone()],
        vec![
            Expr::assign(get.expr(), Expr::lambda(&read)),
            Expr::assign(c.expr(), Expr::constant(10)),
            Expr::invoke(get.expr(), vec![]),
        ],
    );
    assert_eq!(run(vec![], body, &mut []), Value::I32(10));
}

#[test]
fn test_captured_parameter_through_two_levels() {
    let x = ParameterExpr::new(Type::I32, "x");
    let innermost = LambdaExpr::new(Some("inner"), vec![], Expr::add(x.expr(), Expr::constant(1)));
    let middle = LambdaExpr::new(Some("middle"), vec![], Expr::lambda(&innermost));
    let body = Expr::invoke(Expr::invoke(Expr::lambda(&middle), vec![]), vec![]);
    assert_eq!(run(vec![x], body, &mut [Value::I32(41)]), Value::I32(42));
}

#[test]
fn test_each_block_entry_gets_a_fresh_cell() {
    let getter_ty = Type::delegate(vec![], Type::I32);
    let getters = ParameterExpr::new(Type::array(getter_ty.clone()), "getters");
    let i = ParameterExpr::new(Type::I32, "i");
    let v = ParameterExpr::new(Type::I32, "v");
    let read_v = LambdaExpr::new(Some("read_v"), vec![], v.expr());
    let brk = LabelTarget::new("brk");

    let body = Expr::block(
        vec![getters.clone(), i.clone()],
        vec![
            Expr::assign(
                getters.expr(),
                Expr::new_array_bounds(getter_ty, Expr::constant(2)),
            ),
            Expr::loop_(
                Expr::block(
                    vec![],
                    vec![
                        Expr::if_then(
                            Expr::equal(i.expr(), Expr::constant(2)),
                            Expr::break_(&brk, None),
                        ),
                        Expr::block(
                            vec![v.clone()],
                            vec![
                                Expr::assign(v.expr(), Expr::multiply(i.expr(), Expr::constant(10))),
                                Expr::assign(
                                    Expr::array_access(getters.expr(), i.expr()),
                                    Expr::lambda(&read_v),
                                ),
                            ],
                        ),
                        Expr::assign(i.expr(), Expr::add(i.expr(), Expr::constant(1))),
                    ],
                ),
                Some(brk),
                None,
            ),
            Expr::add(
                Expr::invoke(Expr::array_index(getters.expr(), Expr::constant(0)), vec![]),
                Expr::invoke(Expr::array_index(getters.expr(), Expr::constant(1)), vec![]),
            ),
        ],
    );
    assert_eq!(run(vec![], body, &mut []), Value::I32(10));
}

#[test]
fn test_closure_over_argument_updates_it() {
    let n = ParameterExpr::new(Type::I32, "n");
    let reset = LambdaExpr::new(Some("reset"), vec![], Expr::assign(n.expr(), Expr::constant(0)));
    let body = Expr::block(
        vec![],
        vec![Expr::invoke(Expr::lambda(&reset), vec![]), n.expr()],
    );
    assert_eq!(run(vec![n], body, &mut [Value::I32(7)]), Value::I32(0));
}

#[test]
fn test_returned_closure_outlives_its_frame() {
    let x = ParameterExpr::new(Type::I32, "x");
    let adder = LambdaExpr::new(Some("adder"), vec![], Expr::add(x.expr(), Expr::constant(100)));
    let make = compile(&LambdaExpr::new(Some("make"), vec![x.clone()], Expr::lambda(&adder))).unwrap();

    let Value::Function(add) = make.run(&mut [Value::I32(5)]).unwrap() else {
        panic!("expected a function");
    };
    assert_eq!(add.invoke(&mut []).unwrap(), Value::I32(105));
    assert_eq!(add.name(), "adder");
}
