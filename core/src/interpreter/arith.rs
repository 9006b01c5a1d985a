//! Arithmetic and bitwise operations over the primitive kinds.
//!
//! One function per operator family; the per-kind specializations are
//! expanded by macros into a single `match` on the operand pair.

use crate::types::NumericKind;
use crate::values::{Exception, ExceptionRef, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryArith {
    Negate,
    /// Logical not for bools, ones complement for integers.
    Not,
    Increment,
    Decrement,
}

fn unsupported(op: impl std::fmt::Debug, kind: NumericKind) -> ExceptionRef {
    Exception::invalid_operation(format!(
        "The operator {:?} is not defined for {}.",
        op,
        kind.name()
    ))
}

fn mismatch(op: impl std::fmt::Debug, left: &Value, right: &Value) -> ExceptionRef {
    Exception::invalid_operation(format!(
        "The operator {:?} is not defined for '{}' and '{}'.",
        op,
        left.type_name(),
        right.type_name()
    ))
}

macro_rules! int_binary {
    ($variant:ident, $kind:ident, $a:expr, $b:expr, $op:expr, $checked:expr) => {{
        let (a, b) = ($a, $b);
        Value::$variant(match $op {
            ArithOp::Add if $checked => a.checked_add(b).ok_or_else(crate::values::Exception::overflow)?,
            ArithOp::Add => a.wrapping_add(b),
            ArithOp::Sub if $checked => a.checked_sub(b).ok_or_else(crate::values::Exception::overflow)?,
            ArithOp::Sub => a.wrapping_sub(b),
            ArithOp::Mul if $checked => a.checked_mul(b).ok_or_else(crate::values::Exception::overflow)?,
            ArithOp::Mul => a.wrapping_mul(b),
            ArithOp::Div | ArithOp::Rem if b == 0 => return Err(crate::values::Exception::divide_by_zero()),
            ArithOp::Div => a.checked_div(b).ok_or_else(crate::values::Exception::overflow)?,
            ArithOp::Rem => a.checked_rem(b).ok_or_else(crate::values::Exception::overflow)?,
            ArithOp::And => a & b,
            ArithOp::Or => a | b,
            ArithOp::Xor => a ^ b,
            ArithOp::Pow | ArithOp::Shl | ArithOp::Shr => {
                return Err(unsupported($op, NumericKind::$kind))
            }
        })
    }};
}

macro_rules! float_binary {
    ($variant:ident, $kind:ident, $a:expr, $b:expr, $op:expr) => {{
        let (a, b) = ($a, $b);
        Value::$variant(match $op {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
            ArithOp::Rem => a % b,
            ArithOp::Pow => a.powf(b),
            _ => return Err(unsupported($op, NumericKind::$kind)),
        })
    }};
}

/// `left op right`. Either operand null yields null.
pub fn binary(op: ArithOp, checked: bool, left: &Value, right: &Value) -> Result<Value, ExceptionRef> {
    use Value::*;
    if left.is_null() || right.is_null() {
        return Ok(Null);
    }
    if matches!(op, ArithOp::Shl | ArithOp::Shr) {
        return shift(op, left, right);
    }
    Ok(match (left, right) {
        (I8(a), I8(b)) => int_binary!(I8, I8, *a, *b, op, checked),
        (U8(a), U8(b)) => int_binary!(U8, U8, *a, *b, op, checked),
        (I16(a), I16(b)) => int_binary!(I16, I16, *a, *b, op, checked),
        (U16(a), U16(b)) => int_binary!(U16, U16, *a, *b, op, checked),
        (I32(a), I32(b)) => int_binary!(I32, I32, *a, *b, op, checked),
        (U32(a), U32(b)) => int_binary!(U32, U32, *a, *b, op, checked),
        (I64(a), I64(b)) => int_binary!(I64, I64, *a, *b, op, checked),
        (U64(a), U64(b)) => int_binary!(U64, U64, *a, *b, op, checked),
        (F32(a), F32(b)) => float_binary!(F32, F32, *a, *b, op),
        (F64(a), F64(b)) => float_binary!(F64, F64, *a, *b, op),
        (Bool(a), Bool(b)) => Bool(match op {
            ArithOp::And => *a & *b,
            ArithOp::Or => *a | *b,
            ArithOp::Xor => *a ^ *b,
            _ => return Err(unsupported(op, NumericKind::Bool)),
        }),
        _ => return Err(mismatch(op, left, right)),
    })
}

macro_rules! int_shift {
    ($variant:ident, $a:expr, $n:expr, $op:expr) => {{
        let (a, n) = ($a, $n);
        Value::$variant(match $op {
            ArithOp::Shl => a.wrapping_shl(n),
            _ => a.wrapping_shr(n),
        })
    }};
    // Narrow operands are promoted to 32 bits and the result truncated.
    ($variant:ident as $wide:ty, $a:expr, $n:expr, $op:expr) => {{
        let (a, n) = ($a as $wide, $n);
        let wide: $wide = match $op {
            ArithOp::Shl => a.wrapping_shl(n),
            _ => a.wrapping_shr(n),
        };
        Value::$variant(wide as _)
    }};
}

/// Shift counts are masked to the width of the (promoted) operand: 31 below
/// 64 bits, 63 otherwise.
fn shift(op: ArithOp, left: &Value, right: &Value) -> Result<Value, ExceptionRef> {
    use Value::*;
    let n = match right {
        I32(n) => *n as u32,
        _ => return Err(mismatch(op, left, right)),
    };
    Ok(match left {
        I8(a) => int_shift!(I8 as i32, *a, n, op),
        U8(a) => int_shift!(U8 as i32, *a, n, op),
        I16(a) => int_shift!(I16 as i32, *a, n, op),
        U16(a) => int_shift!(U16 as i32, *a, n, op),
        I32(a) => int_shift!(I32, *a, n, op),
        U32(a) => int_shift!(U32, *a, n, op),
        I64(a) => int_shift!(I64, *a, n, op),
        U64(a) => int_shift!(U64, *a, n, op),
        _ => return Err(mismatch(op, left, right)),
    })
}

macro_rules! int_unary {
    ($variant:ident, $a:expr, $op:expr, $checked:expr) => {{
        let a = $a;
        Value::$variant(match $op {
            UnaryArith::Negate if $checked => a.checked_neg().ok_or_else(crate::values::Exception::overflow)?,
            UnaryArith::Negate => a.wrapping_neg(),
            UnaryArith::Not => !a,
            UnaryArith::Increment => a.wrapping_add(1),
            UnaryArith::Decrement => a.wrapping_sub(1),
        })
    }};
}

macro_rules! float_unary {
    ($variant:ident, $kind:ident, $a:expr, $op:expr) => {{
        let a = $a;
        Value::$variant(match $op {
            UnaryArith::Negate => -a,
            UnaryArith::Increment => a + 1.0,
            UnaryArith::Decrement => a - 1.0,
            UnaryArith::Not => return Err(unsupported($op, NumericKind::$kind)),
        })
    }};
}

/// `op operand`. Null yields null.
pub fn unary(op: UnaryArith, checked: bool, operand: &Value) -> Result<Value, ExceptionRef> {
    use Value::*;
    Ok(match operand {
        Null => Null,
        I8(a) => int_unary!(I8, *a, op, checked),
        U8(a) => int_unary!(U8, *a, op, checked),
        I16(a) => int_unary!(I16, *a, op, checked),
        U16(a) => int_unary!(U16, *a, op, checked),
        I32(a) => int_unary!(I32, *a, op, checked),
        U32(a) => int_unary!(U32, *a, op, checked),
        I64(a) => int_unary!(I64, *a, op, checked),
        U64(a) => int_unary!(U64, *a, op, checked),
        F32(a) => float_unary!(F32, F32, *a, op),
        F64(a) => float_unary!(F64, F64, *a, op),
        Bool(b) if op == UnaryArith::Not => Bool(!b),
        other => {
            return Err(crate::values::Exception::invalid_operation(format!(
                "The operator {:?} is not defined for '{}'.",
                op,
                other.type_name()
            )));
        }
    })
}

/// Three-valued `&` and `|` over nullable bools.
pub fn lifted_logical(is_and: bool, left: &Value, right: &Value) -> Value {
    let (l, r) = (left.as_bool(), right.as_bool());
    let dominant = !is_and;
    if l == Some(dominant) || r == Some(dominant) {
        return Value::Bool(dominant);
    }
    match (l, r) {
        (Some(_), Some(_)) => Value::Bool(!dominant),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BuiltinClasses;

    #[test]
    fn test_checked_overflow() {
        let max = Value::I32(i32::MAX);
        let one = Value::I32(1);
        assert_eq!(binary(ArithOp::Add, false, &max, &one).unwrap(), Value::I32(i32::MIN));
        let err = binary(ArithOp::Add, true, &max, &one).unwrap_err();
        assert!(err.is_instance_of(&BuiltinClasses::get().overflow));
        assert!(unary(UnaryArith::Negate, true, &Value::I64(i64::MIN)).is_err());
        assert_eq!(
            unary(UnaryArith::Negate, false, &Value::I64(i64::MIN)).unwrap(),
            Value::I64(i64::MIN)
        );
    }

    #[test]
    fn test_divide_by_zero() {
        let err = binary(ArithOp::Div, false, &Value::U8(1), &Value::U8(0)).unwrap_err();
        assert!(err.is_instance_of(&BuiltinClasses::get().divide_by_zero));
        let err = binary(ArithOp::Rem, false, &Value::I32(1), &Value::I32(0)).unwrap_err();
        assert!(err.is_instance_of(&BuiltinClasses::get().divide_by_zero));
        let inf = binary(ArithOp::Div, false, &Value::F64(1.0), &Value::F64(0.0)).unwrap();
        assert_eq!(inf, Value::F64(f64::INFINITY));
    }

    #[test]
    fn test_null_propagation() {
        assert_eq!(binary(ArithOp::Add, false, &Value::Null, &Value::I32(5)).unwrap(), Value::Null);
        assert_eq!(unary(UnaryArith::Not, false, &Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_shift_masks_count() {
        let v = binary(ArithOp::Shl, false, &Value::I32(1), &Value::I32(33)).unwrap();
        assert_eq!(v, Value::I32(2));
        let v = binary(ArithOp::Shr, false, &Value::I64(-8), &Value::I32(1)).unwrap();
        assert_eq!(v, Value::I64(-4));
    }

    #[test]
    fn test_narrow_shift_promotes_to_32_bits() {
        let shl = |a: Value, n: i32| binary(ArithOp::Shl, false, &a, &Value::I32(n)).unwrap();
        let shr = |a: Value, n: i32| binary(ArithOp::Shr, false, &a, &Value::I32(n)).unwrap();
        assert_eq!(shl(Value::I16(1), 16), Value::I16(0));
        assert_eq!(shl(Value::U8(1), 8), Value::U8(0));
        assert_eq!(shl(Value::U16(3), 15), Value::U16(0x8000));
        // Masked by 31, not by the operand width.
        assert_eq!(shl(Value::I16(1), 32), Value::I16(1));
        assert_eq!(shl(Value::I8(1), 9), Value::I8(0));
        assert_eq!(shr(Value::I8(-128), 7), Value::I8(-1));
        assert_eq!(shr(Value::U8(0x80), 7), Value::U8(1));
        assert_eq!(shr(Value::U16(0x8000), 20), Value::U16(0));
    }

    #[test]
    fn test_lifted_logical_truth_table() {
        let t = Value::Bool(true);
        let f = Value::Bool(false);
        let n = Value::Null;
        let cases = [
            (&t, &t, Value::Bool(true), Value::Bool(true)),
            (&t, &f, Value::Bool(false), Value::Bool(true)),
            (&t, &n, Value::Null, Value::Bool(true)),
            (&f, &t, Value::Bool(false), Value::Bool(true)),
            (&f, &f, Value::Bool(false), Value::Bool(false)),
            (&f, &n, Value::Bool(false), Value::Null),
            (&n, &t, Value::Null, Value::Bool(true)),
            (&n, &f, Value::Bool(false), Value::Null),
            (&n, &n, Value::Null, Value::Null),
        ];
        for (l, r, and, or) in cases {
            assert_eq!(lifted_logical(true, l, r), and, "{:?} & {:?}", l, r);
            assert_eq!(lifted_logical(false, l, r), or, "{:?} | {:?}", l, r);
        }
    }
}
