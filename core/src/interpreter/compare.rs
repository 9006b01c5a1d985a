//! Equality and ordering, lifted over null.

use std::cmp::Ordering;

use crate::values::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

macro_rules! ordering {
    ($left:expr, $right:expr; $($variant:ident),*) => {
        match ($left, $right) {
            $((Value::$variant(a), Value::$variant(b)) => a.partial_cmp(b),)*
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    };
}

fn order(left: &Value, right: &Value) -> Option<Ordering> {
    ordering!(left, right; Bool, Char, I8, U8, I16, U16, I32, U32, I64, U64, F32, F64)
}

/// Compares two operands.
///
/// Null handling: with `lifted_to_null` any null operand gives null.
/// Otherwise null equals null, null differs from everything else, and
/// ordering against null is false.
pub fn compare(op: CompareOp, lifted_to_null: bool, left: &Value, right: &Value) -> Value {
    if left.is_null() || right.is_null() {
        if lifted_to_null {
            return Value::Null;
        }
        let both = left.is_null() && right.is_null();
        return Value::Bool(match op {
            CompareOp::Eq => both,
            CompareOp::Ne => !both,
            _ => false,
        });
    }
    Value::Bool(match op {
        CompareOp::Eq => left == right,
        CompareOp::Ne => left != right,
        CompareOp::Lt => order(left, right) == Some(Ordering::Less),
        CompareOp::Le => matches!(order(left, right), Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Gt => order(left, right) == Some(Ordering::Greater),
        CompareOp::Ge => matches!(
            order(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_equality_rules() {
        let n = Value::Null;
        let five = Value::I32(5);
        assert_eq!(compare(CompareOp::Eq, false, &n, &n), Value::Bool(true));
        assert_eq!(compare(CompareOp::Eq, false, &n, &five), Value::Bool(false));
        assert_eq!(compare(CompareOp::Ne, false, &five, &n), Value::Bool(true));
        assert_eq!(compare(CompareOp::Lt, false, &n, &five), Value::Bool(false));
        assert_eq!(compare(CompareOp::Ge, false, &n, &n), Value::Bool(false));
        assert_eq!(compare(CompareOp::Eq, true, &n, &five), Value::Null);
    }

    #[test]
    fn test_nan_ordering() {
        let nan = Value::F64(f64::NAN);
        let one = Value::F64(1.0);
        assert_eq!(compare(CompareOp::Lt, false, &nan, &one), Value::Bool(false));
        assert_eq!(compare(CompareOp::Ge, false, &nan, &one), Value::Bool(false));
        assert_eq!(compare(CompareOp::Ne, false, &nan, &nan), Value::Bool(true));
    }

    #[test]
    fn test_string_ordering() {
        let a = Value::str("apple");
        let b = Value::str("banana");
        assert_eq!(compare(CompareOp::Lt, false, &a, &b), Value::Bool(true));
        assert_eq!(compare(CompareOp::Eq, false, &a, &Value::str("apple")), Value::Bool(true));
    }
}
