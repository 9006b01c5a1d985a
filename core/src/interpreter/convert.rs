//! Conversions and runtime type tests.

use crate::types::{NumericKind, Type};
use crate::values::{Exception, ExceptionRef, Value};

enum Number {
    Int(i128),
    Float(f64),
}

fn as_number(value: &Value) -> Option<Number> {
    Some(match value {
        Value::Bool(b) => Number::Int(i128::from(*b)),
        Value::Char(c) => Number::Int(i128::from(u32::from(*c))),
        Value::I8(v) => Number::Int((*v).into()),
        Value::U8(v) => Number::Int((*v).into()),
        Value::I16(v) => Number::Int((*v).into()),
        Value::U16(v) => Number::Int((*v).into()),
        Value::I32(v) => Number::Int((*v).into()),
        Value::U32(v) => Number::Int((*v).into()),
        Value::I64(v) => Number::Int((*v).into()),
        Value::U64(v) => Number::Int((*v).into()),
        Value::F32(v) => Number::Float((*v).into()),
        Value::F64(v) => Number::Float(*v),
        _ => return None,
    })
}

macro_rules! int_to {
    ($i:expr, $variant:ident, $t:ty, $checked:expr) => {{
        let i: i128 = $i;
        if $checked {
            Value::$variant(<$t>::try_from(i).map_err(|_| Exception::overflow())?)
        } else {
            Value::$variant(i as $t)
        }
    }};
}

fn float_to_int(f: f64, checked: bool) -> Result<i128, ExceptionRef> {
    if checked && !f.is_finite() {
        return Err(Exception::overflow());
    }
    Ok(f.trunc() as i128)
}

fn numeric(value: &Value, to: NumericKind, checked: bool) -> Result<Option<Value>, ExceptionRef> {
    let Some(number) = as_number(value) else {
        return Ok(None);
    };
    let int = match number {
        Number::Float(f) => match to {
            NumericKind::F32 => return Ok(Some(Value::F32(f as f32))),
            NumericKind::F64 => return Ok(Some(Value::F64(f))),
            NumericKind::Bool => return Ok(Some(Value::Bool(f != 0.0))),
            _ => float_to_int(f, checked)?,
        },
        Number::Int(i) => i,
    };
    Ok(Some(match to {
        NumericKind::Bool => Value::Bool(int != 0),
        NumericKind::Char => {
            let code = if checked {
                u16::try_from(int).map_err(|_| Exception::overflow())?
            } else {
                int as u16
            };
            Value::Char(char::from_u32(code.into()).unwrap_or(char::REPLACEMENT_CHARACTER))
        }
        NumericKind::I8 => int_to!(int, I8, i8, checked),
        NumericKind::U8 => int_to!(int, U8, u8, checked),
        NumericKind::I16 => int_to!(int, I16, i16, checked),
        NumericKind::U16 => int_to!(int, U16, u16, checked),
        NumericKind::I32 => int_to!(int, I32, i32, checked),
        NumericKind::U32 => int_to!(int, U32, u32, checked),
        NumericKind::I64 => int_to!(int, I64, i64, checked),
        NumericKind::U64 => int_to!(int, U64, u64, checked),
        NumericKind::F32 => Value::F32(int as f32),
        NumericKind::F64 => Value::F64(int as f64),
    }))
}

/// Converts `value` to `to`.
///
/// Numeric conversions truncate (or throw `OverflowException` when checked).
/// Null converts to any type that admits null and throws
/// `NullReferenceException` for plain value types. Reference conversions
/// succeed only when the value is an instance of the target.
pub fn convert(value: Value, to: &Type, checked: bool) -> Result<Value, ExceptionRef> {
    match to {
        Type::Void => return Ok(Value::Null),
        Type::Object => return Ok(value),
        _ => {}
    }
    if value.is_null() {
        return if to.admits_null() {
            Ok(Value::Null)
        } else {
            Err(Exception::null_reference())
        };
    }
    if let Some(kind) = to.underlying_kind() {
        if let Some(converted) = numeric(&value, kind, checked)? {
            return Ok(converted);
        }
    }
    if value.is_instance_of(to) {
        Ok(value)
    } else {
        Err(Exception::invalid_cast(&value.type_name(), to))
    }
}

/// `value as T`: the value itself when it is an instance of `T`, else null.
pub fn type_as(value: Value, to: &Type) -> Value {
    if value.is_instance_of(to) {
        value
    } else {
        Value::Null
    }
}
