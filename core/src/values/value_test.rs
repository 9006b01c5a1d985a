use pretty_assertions::assert_eq;

use super::*;
use crate::types::{BuiltinClasses, ClassBuilder};

#[test]
fn test_reference_and_value_semantics() {
    let array = ArrayRef::with_len(Type::I32, 3);
    let alias = Value::Array(array.clone());
    array.set(1, Value::I32(7)).unwrap();
    assert_eq!(alias, Value::Array(array.clone()));
    assert_eq!(array.get(1).unwrap(), Value::I32(7));
    assert_ne!(alias, Value::Array(ArrayRef::with_len(Type::I32, 3)));

    let point = ClassBuilder::new("Point")
        .value_type()
        .field("x", Type::I32)
        .build();
    let original = StructValue::new(point);
    let copy = original.clone().with_field(0, Value::I32(5));
    assert_eq!(original.field(0), Value::I32(0));
    assert_eq!(copy.field(0), Value::I32(5));
}

#[test]
fn test_array_bounds() {
    let array = ArrayRef::new(Type::Str, vec![Value::str("a")]);
    let err = array.get(3).unwrap_err();
    assert!(err.is_instance_of(&BuiltinClasses::get().index_out_of_range));
    assert!(array.set(-1, Value::Null).is_err());
}

#[test]
fn test_float_equality() {
    assert_ne!(Value::F64(f64::NAN), Value::F64(f64::NAN));
    assert_eq!(Value::F32(1.5), Value::F32(1.5));
    assert_ne!(Value::I32(1), Value::I64(1));
}

#[test]
fn test_instance_checks() {
    let builtins = BuiltinClasses::get();
    let overflow = Value::Exception(Exception::overflow());
    assert!(overflow.is_instance_of(&Type::class(&builtins.arithmetic)));
    assert!(!overflow.has_exact_type(&Type::class(&builtins.arithmetic)));
    assert!(overflow.has_exact_type(&Type::class(&builtins.overflow)));
    assert!(Value::I32(3).is_instance_of(&Type::nullable(Type::I32)));
    assert!(!Value::Null.is_instance_of(&Type::Object));
    assert!(Value::str("x").is_instance_of(&Type::Object));
}

#[test]
fn test_unwrap_invocation() {
    let inner = Exception::divide_by_zero();
    let wrapped = Exception::target_invocation(Exception::target_invocation(inner.clone()));
    assert!(Arc::ptr_eq(&wrapped.unwrap_invocation(), &inner));
    assert!(Arc::ptr_eq(&inner.unwrap_invocation(), &inner));
}

#[test]
fn test_strong_box_sharing() {
    let cell = StrongBox::new(Value::I32(1));
    let alias = cell.clone();
    alias.set(Value::I32(2));
    assert_eq!(cell.get(), Value::I32(2));

    let vars = RuntimeVariables::new(vec![cell.clone()]);
    assert!(vars.set(0, Value::I32(3)));
    assert_eq!(cell.get(), Value::I32(3));
    assert!(!vars.set(1, Value::Null));
}
