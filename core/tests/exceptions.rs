//! Exception handling: catch ordering, filters, finally and fault blocks,
//! rethrow identity, and jumps out of protected regions.

use std::sync::Arc;

use lightvm_core::api::{Error, compile};
use lightvm_core::expr::{CatchBlock, Expr, LabelTarget, LambdaExpr, MethodInfo, ParameterExpr, ParameterInfo};
use lightvm_core::types::{BuiltinClasses, ClassBuilder, ClassInfo, Type};
use lightvm_core::values::{Exception, ExceptionRef, Value};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

/// A static `record(i32)` method appending to a shared log.
fn recorder() -> (Arc<Mutex<Vec<i32>>>, Arc<MethodInfo>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let method = MethodInfo::native_static(
        "record",
        vec![ParameterInfo::new("value", Type::I32)],
        Type::Void,
        move |args| {
            sink.lock().push(args[0].as_i64().unwrap() as i32);
            Ok(Value::Null)
        },
    );
    (log, method)
}

fn record(method: &Arc<MethodInfo>, value: i32) -> Expr {
    Expr::call(None, method, vec![Expr::constant(value)])
}

fn custom_exception(name: &str) -> Arc<ClassInfo> {
    ClassBuilder::new(name)
        .extends(&BuiltinClasses::get().exception)
        .build()
}

fn throw_new(class: &Arc<ClassInfo>) -> Expr {
    Expr::throw(Expr::new_object(class, None, vec![]))
}

fn run(body: Expr) -> Result<Value, Error> {
    let lambda = compile(&LambdaExpr::new(Some("main"), vec![], body))?;
    lambda.interpreter().validate().map_err(Error::Api)?;
    lambda.run(&mut [])
}

#[test]
fn test_finally_runs_once_on_normal_exit() {
    let (log, record_m) = recorder();
    run(Expr::try_finally(record(&record_m, 1), record(&record_m, 2))).unwrap();
    assert_eq!(*log.lock(), vec![1, 2]);
}

#[test]
fn test_goto_out_of_nested_finally_runs_each_once() {
    let (log, record_m) = recorder();
    let exit = LabelTarget::new("exit");
    let body = Expr::block(
        vec![],
        vec![
            Expr::try_finally(
                Expr::try_finally(
                    Expr::block(vec![], vec![record(&record_m, 1), Expr::goto(&exit)]),
                    record(&record_m, 2),
                ),
                record(&record_m, 3),
            ),
            record(&record_m, 99),
            Expr::label(&exit, None),
            record(&record_m, 4),
        ],
    );
    run(body).unwrap();
    assert_eq!(*log.lock(), vec![1, 2, 3, 4]);
}

#[test]
fn test_return_from_try_runs_finally_first() {
    let (log, record_m) = recorder();
    let ret = LabelTarget::typed(Type::I32, "ret");
    let body = Expr::block(
        vec![],
        vec![
            Expr::try_finally(
                Expr::block(
                    vec![],
                    vec![
                        record(&record_m, 1),
                        Expr::return_(&ret, Some(Expr::constant(10))),
                    ],
                ),
                record(&record_m, 2),
            ),
            record(&record_m, 99),
            Expr::label(&ret, Some(Expr::constant(0))),
        ],
    );
    assert_eq!(run(body).unwrap(), Value::I32(10));
    assert_eq!(*log.lock(), vec![1, 2]);
}

#[test]
fn test_finally_runs_before_exception_is_caught() {
    let (log, record_m) = recorder();
    let boom = custom_exception("BoomException");
    let body = Expr::try_catch(
        Expr::try_finally(throw_new(&boom), record(&record_m, 2)),
        vec![CatchBlock::any(None, record(&record_m, 3))],
    );
    run(body).unwrap();
    assert_eq!(*log.lock(), vec![2, 3]);
}

#[test]
fn test_first_matching_handler_wins() {
    let builtins = BuiltinClasses::get();
    let x = ParameterExpr::new(Type::I32, "x");
    let body = Expr::try_catch(
        Expr::block(
            vec![],
            vec![
                Expr::add_checked(x.expr(), Expr::constant(1)),
                Expr::constant("none"),
            ],
        ),
        vec![
            CatchBlock::new(Type::class(&builtins.arithmetic), None, Expr::constant("arithmetic")),
            CatchBlock::new(Type::class(&builtins.overflow), None, Expr::constant("overflow")),
        ],
    );
    let lambda = compile(&LambdaExpr::new(Some("order"), vec![x], body)).unwrap();
    assert_eq!(lambda.run(&mut [Value::I32(1)]).unwrap(), Value::str("none"));
    assert_eq!(
        lambda.run(&mut [Value::I32(i32::MAX)]).unwrap(),
        Value::str("arithmetic")
    );
}

#[test]
fn test_unhandled_exception_escapes() {
    let builtins = BuiltinClasses::get();
    let boom = custom_exception("BoomException");
    let body = Expr::try_catch(
        throw_new(&boom),
        vec![CatchBlock::new(Type::class(&builtins.overflow), None, Expr::empty())],
    );
    let err = run(body).unwrap_err();
    assert_eq!(err.exception().unwrap().class().name(), "BoomException");
}

#[test]
fn test_rethrow_preserves_identity() {
    let boom = custom_exception("BoomException");
    let exception_ty = Type::class(&BuiltinClasses::get().exception);
    let thrown: ExceptionRef = Exception::new(&boom, "original");
    let e = ParameterExpr::new(exception_ty.clone(), "e");

    let inner = Expr::make_try(
        exception_ty.clone(),
        Expr::throw_typed(Expr::constant(thrown.clone()), exception_ty.clone()),
        None,
        None,
        vec![CatchBlock::any(None, Expr::rethrow_typed(exception_ty))],
    );
    let caught = run(Expr::try_catch(inner.clone(), vec![CatchBlock::any(Some(e.clone()), e.expr())]))
        .unwrap();
    let Value::Exception(caught) = caught else {
        panic!("expected an exception value");
    };
    assert!(Arc::ptr_eq(&caught, &thrown));

    let escaped = run(inner).unwrap_err();
    assert!(Arc::ptr_eq(escaped.exception().unwrap(), &thrown));
}

#[test]
fn test_catch_variable_binds_exception() {
    let builtins = BuiltinClasses::get();
    let e = ParameterExpr::new(Type::class(&builtins.exception), "e");
    let message = MethodInfo::native_instance(
        "get_Message",
        Type::class(&builtins.exception),
        vec![],
        Type::Str,
        |args| match &args[0] {
            Value::Exception(e) => Ok(Value::str(e.message())),
            _ => Err(Exception::invalid_operation("not an exception")),
        },
    );
    let body = Expr::try_catch(
        Expr::block(
            vec![],
            vec![
                Expr::divide(Expr::constant(1), Expr::constant(0)),
                Expr::constant(""),
            ],
        ),
        vec![CatchBlock::any(
            Some(e.clone()),
            Expr::call(Some(e.expr()), &message, vec![]),
        )],
    );
    let Value::Str(text) = run(body).unwrap() else {
        panic!("expected a message");
    };
    assert!(!text.is_empty());
}

#[test]
fn test_filters() {
    let boom = custom_exception("BoomException");
    let other = custom_exception("OtherException");
    let guarded = |filter: Expr| {
        Expr::try_catch(
            Expr::throw_typed(Expr::new_object(&boom, None, vec![]), Type::Str),
            vec![
                CatchBlock::new(Type::class(&boom), None, Expr::constant("filtered")).with_filter(filter),
                CatchBlock::any(None, Expr::constant("fallback")),
            ],
        )
    };

    assert_eq!(run(guarded(Expr::constant(true))).unwrap(), Value::str("filtered"));
    assert_eq!(run(guarded(Expr::constant(false))).unwrap(), Value::str("fallback"));

    // A filter that throws counts as not matching.
    let throwing = Expr::block(
        vec![],
        vec![throw_new(&other), Expr::constant(true)],
    );
    assert_eq!(run(guarded(throwing)).unwrap(), Value::str("fallback"));
}

#[test]
fn test_filter_sees_the_exception() {
    let boom = custom_exception("BoomException");
    let e = ParameterExpr::new(Type::class(&boom), "e");
    let body = Expr::try_catch(
        Expr::throw_typed(Expr::new_object(&boom, None, vec![]), Type::Bool),
        vec![
            CatchBlock::new(Type::class(&boom), Some(e.clone()), Expr::constant(true))
                .with_filter(Expr::type_is(e.expr(), Type::class(&boom))),
        ],
    );
    assert_eq!(run(body).unwrap(), Value::Bool(true));
}

/// `record(value); accept`, as a filter body.
fn recording_filter(method: &Arc<MethodInfo>, value: i32, accept: bool) -> Expr {
    Expr::block(vec![], vec![record(method, value), Expr::constant(accept)])
}

#[test]
fn test_outer_filter_runs_before_inner_finally() {
    let (log, record_m) = recorder();
    let boom = custom_exception("BoomException");
    let body = Expr::try_catch(
        Expr::try_finally(throw_new(&boom), record(&record_m, 1)),
        vec![
            CatchBlock::new(Type::class(&boom), None, record(&record_m, 3))
                .with_filter(recording_filter(&record_m, 2, true)),
        ],
    );
    run(body).unwrap();
    assert_eq!(*log.lock(), vec![2, 1, 3]);
}

#[test]
fn test_rejecting_filter_still_runs_before_inner_finally() {
    let (log, record_m) = recorder();
    let boom = custom_exception("BoomException");
    let body = Expr::try_catch(
        Expr::try_catch(
            Expr::try_fault(throw_new(&boom), record(&record_m, 1)),
            vec![
                CatchBlock::new(Type::class(&boom), None, record(&record_m, 99))
                    .with_filter(recording_filter(&record_m, 2, false)),
            ],
        ),
        vec![CatchBlock::any(None, record(&record_m, 3))],
    );
    run(body).unwrap();
    assert_eq!(*log.lock(), vec![2, 1, 3]);
}

#[test]
fn test_exception_from_catch_is_filtered_before_its_finally() {
    let (log, record_m) = recorder();
    let first = custom_exception("FirstException");
    let second = custom_exception("SecondException");
    let body = Expr::try_catch(
        Expr::try_catch_finally(
            throw_new(&first),
            record(&record_m, 3),
            vec![CatchBlock::new(
                Type::class(&first),
                None,
                Expr::block(vec![], vec![record(&record_m, 1), throw_new(&second)]),
            )],
        ),
        vec![
            CatchBlock::new(Type::class(&second), None, record(&record_m, 4))
                .with_filter(recording_filter(&record_m, 2, true)),
        ],
    );
    run(body).unwrap();
    assert_eq!(*log.lock(), vec![1, 2, 3, 4]);
}

#[test]
fn test_fault_runs_only_on_exception() {
    let (log, record_m) = recorder();
    run(Expr::try_fault(record(&record_m, 1), record(&record_m, 2))).unwrap();
    assert_eq!(*log.lock(), vec![1]);

    log.lock().clear();
    let boom = custom_exception("BoomException");
    let body = Expr::try_catch(
        Expr::try_fault(throw_new(&boom), record(&record_m, 2)),
        vec![CatchBlock::any(None, record(&record_m, 3))],
    );
    run(body).unwrap();
    assert_eq!(*log.lock(), vec![2, 3]);
}

#[test]
fn test_try_catch_finally_order() {
    let (log, record_m) = recorder();
    let boom = custom_exception("BoomException");
    let body = Expr::try_catch_finally(
        Expr::block(vec![], vec![record(&record_m, 1), throw_new(&boom), record(&record_m, 99)]),
        record(&record_m, 3),
        vec![CatchBlock::new(Type::class(&boom), None, record(&record_m, 2))],
    );
    run(body).unwrap();
    assert_eq!(*log.lock(), vec![1, 2, 3]);
}

#[test]
fn test_exception_from_finally_replaces_pending_one() {
    let first = custom_exception("FirstException");
    let second = custom_exception("SecondException");
    let body = Expr::try_finally(throw_new(&first), throw_new(&second));
    let err = run(body).unwrap_err();
    assert_eq!(err.exception().unwrap().class().name(), "SecondException");
}

#[test]
fn test_native_invocation_wrapper_is_unwrapped() {
    let boom = custom_exception("BoomException");
    let inner_class = boom.clone();
    let failing = MethodInfo::native_static("fail", vec![], Type::Void, move |_| {
        Err(Exception::target_invocation(Exception::new(&inner_class, "inner")))
    });
    let body = Expr::try_catch(
        Expr::block(vec![], vec![Expr::call(None, &failing, vec![]), Expr::constant(0)]),
        vec![CatchBlock::new(Type::class(&boom), None, Expr::constant(1))],
    );
    assert_eq!(run(body).unwrap(), Value::I32(1));
}

#[test]
fn test_throwing_null_raises_null_reference() {
    let builtins = BuiltinClasses::get();
    let body = Expr::throw(Expr::null(Type::class(&builtins.exception)));
    let err = run(body).unwrap_err();
    assert_eq!(err.exception().unwrap().class().name(), "NullReferenceException");
}

#[test]
fn test_jump_into_protected_region_is_rejected() {
    let inside = LabelTarget::new("inside");
    let body = Expr::block(
        vec![],
        vec![
            Expr::goto(&inside),
            Expr::try_finally(Expr::label(&inside, None), Expr::empty()),
        ],
    );
    let err = compile(&LambdaExpr::new(None, vec![], body)).unwrap_err();
    assert!(matches!(err, Error::Compilation(_)), "{err:?}");
}

#[test]
fn test_jump_out_of_finally_is_rejected() {
    let out = LabelTarget::new("out");
    let body = Expr::block(
        vec![],
        vec![
            Expr::try_finally(Expr::empty(), Expr::goto(&out)),
            Expr::label(&out, None),
        ],
    );
    let err = compile(&LambdaExpr::new(None, vec![], body)).unwrap_err();
    assert!(matches!(err, Error::Compilation(_)), "{err:?}");
}
