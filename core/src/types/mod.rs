//! Static type descriptors.
//!
//! Trees are assumed to be well typed, so types here only drive code
//! selection: which opcode specialization to emit, whether a value can be
//! null, which handler matches an exception, and what default a fresh local
//! starts with.

mod builtin;
mod class;

#[cfg(test)]
mod types_test;

pub use builtin::BuiltinClasses;
pub use class::{ClassBuilder, ClassInfo, FieldInfo};

use std::fmt;
use std::sync::Arc;

use crate::values::{StructValue, Value};

/// The closed set of primitive tags opcodes are specialized over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    Bool,
    Char,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl NumericKind {
    pub fn is_integer(self) -> bool {
        !matches!(self, Self::Bool | Self::Char | Self::F32 | Self::F64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::F32 | Self::F64
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::Char => "Char",
            Self::I8 => "I8",
            Self::U8 => "U8",
            Self::I16 => "I16",
            Self::U16 => "U16",
            Self::I32 => "I32",
            Self::U32 => "U32",
            Self::I64 => "I64",
            Self::U64 => "U64",
            Self::F32 => "F32",
            Self::F64 => "F64",
        }
    }

    pub fn to_type(self) -> Type {
        match self {
            Self::Bool => Type::Bool,
            Self::Char => Type::Char,
            Self::I8 => Type::I8,
            Self::U8 => Type::U8,
            Self::I16 => Type::I16,
            Self::U16 => Type::U16,
            Self::I32 => Type::I32,
            Self::U32 => Type::U32,
            Self::I64 => Type::I64,
            Self::U64 => Type::U64,
            Self::F32 => Type::F32,
            Self::F64 => Type::F64,
        }
    }
}

/// Parameter and return types of an invocable value.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub parameters: Vec<Type>,
    pub by_ref: Vec<bool>,
    pub return_type: Type,
}

impl Signature {
    pub fn new(parameters: Vec<Type>, return_type: Type) -> Self {
        let by_ref = vec![false; parameters.len()];
        Self {
            parameters,
            by_ref,
            return_type,
        }
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

#[derive(Debug, Clone)]
pub enum Type {
    Void,
    Bool,
    Char,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Str,
    /// The root of every type; any value converts to it without a check.
    Object,
    Nullable(Arc<Type>),
    Array(Arc<Type>),
    Class(Arc<ClassInfo>),
    Delegate(Arc<Signature>),
    /// The type of a quoted expression.
    Expression,
    RuntimeVariables,
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        use Type::*;
        match (self, other) {
            (Nullable(a), Nullable(b)) | (Array(a), Array(b)) => a == b,
            (Class(a), Class(b)) => Arc::ptr_eq(a, b),
            (Delegate(a), Delegate(b)) => a == b,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl Type {
    pub fn nullable(inner: Type) -> Type {
        match inner {
            Type::Nullable(_) => inner,
            other => Type::Nullable(Arc::new(other)),
        }
    }

    pub fn array(element: Type) -> Type {
        Type::Array(Arc::new(element))
    }

    pub fn class(class: &Arc<ClassInfo>) -> Type {
        Type::Class(class.clone())
    }

    pub fn delegate(parameters: Vec<Type>, return_type: Type) -> Type {
        Type::Delegate(Arc::new(Signature::new(parameters, return_type)))
    }

    /// Primitive tag of a non-nullable primitive type.
    pub fn numeric_kind(&self) -> Option<NumericKind> {
        Some(match self {
            Type::Bool => NumericKind::Bool,
            Type::Char => NumericKind::Char,
            Type::I8 => NumericKind::I8,
            Type::U8 => NumericKind::U8,
            Type::I16 => NumericKind::I16,
            Type::U16 => NumericKind::U16,
            Type::I32 => NumericKind::I32,
            Type::U32 => NumericKind::U32,
            Type::I64 => NumericKind::I64,
            Type::U64 => NumericKind::U64,
            Type::F32 => NumericKind::F32,
            Type::F64 => NumericKind::F64,
            _ => return None,
        })
    }

    /// Primitive tag after stripping one level of `Nullable`.
    pub fn underlying_kind(&self) -> Option<NumericKind> {
        self.non_nullable().numeric_kind()
    }

    pub fn non_nullable(&self) -> &Type {
        match self {
            Type::Nullable(inner) => inner,
            other => other,
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::Nullable(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_value_type(&self) -> bool {
        match self {
            Type::Nullable(_) => true,
            Type::Class(class) => class.is_value_type(),
            other => other.numeric_kind().is_some(),
        }
    }

    /// True when values of this type may be null.
    pub fn admits_null(&self) -> bool {
        !self.is_void() && (self.is_nullable() || !self.is_value_type())
    }

    pub fn is_bool_like(&self) -> bool {
        matches!(self.non_nullable(), Type::Bool)
    }

    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::Array(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&Arc<ClassInfo>> {
        match self {
            Type::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn signature(&self) -> Option<&Arc<Signature>> {
        match self {
            Type::Delegate(signature) => Some(signature),
            _ => None,
        }
    }

    /// Whether a value statically typed `other` may be stored where `self` is
    /// expected without a conversion.
    pub fn is_assignable_from(&self, other: &Type) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (_, Type::Void) => false,
            (Type::Object, _) => true,
            (Type::Nullable(inner), other) => inner.as_ref() == other,
            (Type::Class(target), Type::Class(source)) => source.is_subclass_of(target),
            (Type::Array(target), Type::Array(source)) => {
                !source.is_value_type() && target.is_assignable_from(source)
            }
            _ => false,
        }
    }

    /// The value a fresh local of this type starts with.
    pub fn default_value(&self) -> Value {
        match self {
            Type::Bool => Value::Bool(false),
            Type::Char => Value::Char('\0'),
            Type::I8 => Value::I8(0),
            Type::U8 => Value::U8(0),
            Type::I16 => Value::I16(0),
            Type::U16 => Value::U16(0),
            Type::I32 => Value::I32(0),
            Type::U32 => Value::U32(0),
            Type::I64 => Value::I64(0),
            Type::U64 => Value::U64(0),
            Type::F32 => Value::F32(0.0),
            Type::F64 => Value::F64(0.0),
            Type::Class(class) if class.is_value_type() => {
                Value::Struct(StructValue::new(class.clone()))
            }
            _ => Value::Null,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "Void"),
            Type::Str => write!(f, "String"),
            Type::Object => write!(f, "Object"),
            Type::Nullable(inner) => write!(f, "{}?", inner),
            Type::Array(elem) => write!(f, "{}[]", elem),
            Type::Class(class) => write!(f, "{}", class.name()),
            Type::Delegate(signature) => {
                write!(f, "(")?;
                for (i, param) in signature.parameters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if signature.by_ref.get(i).copied().unwrap_or(false) {
                        write!(f, "ref ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ") => {}", signature.return_type)
            }
            Type::Expression => write!(f, "Expression"),
            Type::RuntimeVariables => write!(f, "RuntimeVariables"),
            other => match other.numeric_kind() {
                Some(kind) => write!(f, "{}", kind.name()),
                None => write!(f, "?"),
            },
        }
    }
}
