use pretty_assertions::assert_eq;

use super::*;

#[test]
fn test_builtin_hierarchy() {
    let builtins = BuiltinClasses::get();
    assert!(builtins.overflow.is_subclass_of(&builtins.arithmetic));
    assert!(builtins.overflow.is_subclass_of(&builtins.exception));
    assert!(!builtins.arithmetic.is_subclass_of(&builtins.overflow));
    assert!(!builtins.target_invocation.is_subclass_of(&builtins.system_exception));
}

#[test]
fn test_assignability() {
    let builtins = BuiltinClasses::get();
    let exception = Type::class(&builtins.exception);
    let overflow = Type::class(&builtins.overflow);

    assert!(exception.is_assignable_from(&overflow));
    assert!(!overflow.is_assignable_from(&exception));
    assert!(Type::Object.is_assignable_from(&Type::I32));
    assert!(Type::nullable(Type::I32).is_assignable_from(&Type::I32));
    assert!(!Type::I32.is_assignable_from(&Type::nullable(Type::I32)));
    assert!(Type::array(Type::Object).is_assignable_from(&Type::array(Type::Str)));
    assert!(!Type::array(Type::Object).is_assignable_from(&Type::array(Type::I32)));
    assert!(!Type::Object.is_assignable_from(&Type::Void));
}

#[test]
fn test_class_layout() {
    let base = ClassBuilder::new("Base")
        .field("a", Type::I32)
        .static_field("count", Type::I64)
        .build();
    let derived = ClassBuilder::new("Derived")
        .extends(&base)
        .field("b", Type::Str)
        .build();

    assert_eq!(derived.instance_field_count(), 2);
    let a = derived.field("a").unwrap();
    let b = derived.field("b").unwrap();
    assert_eq!((a.slot(), b.slot()), (0, 1));
    assert_eq!(a.declaring_class(), "Base");
    assert_eq!(derived.default_fields(), vec![Value::I32(0), Value::Null]);

    let count = base.field("count").unwrap();
    assert!(count.is_static());
    assert_eq!(count.static_value(), Value::I64(0));
    count.set_static_value(Value::I64(9));
    assert_eq!(derived.field("count").unwrap().static_value(), Value::I64(9));
}

#[test]
fn test_nullable_does_not_nest() {
    let t = Type::nullable(Type::nullable(Type::Bool));
    assert_eq!(t, Type::nullable(Type::Bool));
    assert!(t.is_bool_like());
    assert_eq!(t.underlying_kind(), Some(NumericKind::Bool));
    assert_eq!(t.to_string(), "Bool?");
}

#[test]
fn test_default_values() {
    let point = ClassBuilder::new("Point")
        .value_type()
        .field("x", Type::F64)
        .build();
    assert_eq!(Type::I16.default_value(), Value::I16(0));
    assert_eq!(Type::nullable(Type::I32).default_value(), Value::Null);
    assert_eq!(Type::Str.default_value(), Value::Null);
    match Type::class(&point).default_value() {
        Value::Struct(s) => assert_eq!(s.field(0), Value::F64(0.0)),
        other => panic!("expected struct, got {:?}", other),
    }
}
