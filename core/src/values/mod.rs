//! Runtime values.
//!
//! Primitives are stored inline. Arrays, objects and boxed locals have
//! reference identity (`Arc` plus a `parking_lot::Mutex` for interior
//! mutation); structs have value semantics and are copied on write.

mod exception;
pub mod function;

#[cfg(test)]
mod value_test;

pub use exception::{Exception, ExceptionRef};
pub use function::{Callable, FunctionRef, NativeFn, NativeFunction};

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::expr::{Expr, ParameterExpr};
use crate::types::{ClassInfo, NumericKind, Type};

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(Arc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Struct(StructValue),
    Exception(ExceptionRef),
    Function(FunctionRef),
    Quote(Arc<QuotedExpr>),
    RuntimeVariables(Arc<RuntimeVariables>),
    /// Heap cell of a captured local. Only ever found in frame slots and on
    /// the operand stack while a closure or quote is being built.
    #[doc(hidden)]
    Cell(StrongBox),
}

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(Arc::from(s))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn numeric_kind(&self) -> Option<NumericKind> {
        Some(match self {
            Value::Bool(_) => NumericKind::Bool,
            Value::Char(_) => NumericKind::Char,
            Value::I8(_) => NumericKind::I8,
            Value::U8(_) => NumericKind::U8,
            Value::I16(_) => NumericKind::I16,
            Value::U16(_) => NumericKind::U16,
            Value::I32(_) => NumericKind::I32,
            Value::U32(_) => NumericKind::U32,
            Value::I64(_) => NumericKind::I64,
            Value::U64(_) => NumericKind::U64,
            Value::F32(_) => NumericKind::F32,
            Value::F64(_) => NumericKind::F64,
            _ => return None,
        })
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer and char payloads widened to `i64`, for indexing and switch keys.
    pub fn as_i64(&self) -> Option<i64> {
        Some(match self {
            Value::Char(c) => *c as i64,
            Value::I8(v) => *v as i64,
            Value::U8(v) => *v as i64,
            Value::I16(v) => *v as i64,
            Value::U16(v) => *v as i64,
            Value::I32(v) => *v as i64,
            Value::U32(v) => *v as i64,
            Value::I64(v) => *v,
            Value::U64(v) => i64::try_from(*v).ok()?,
            _ => return None,
        })
    }

    /// Name of the runtime type, for diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Str(_) => "String".to_string(),
            Value::Array(array) => format!("{}[]", array.element_type()),
            Value::Object(object) => object.class().name().to_string(),
            Value::Struct(value) => value.class().name().to_string(),
            Value::Exception(exception) => exception.class().name().to_string(),
            Value::Function(_) => "Delegate".to_string(),
            Value::Quote(_) => "Expression".to_string(),
            Value::RuntimeVariables(_) => "RuntimeVariables".to_string(),
            Value::Cell(_) => "StrongBox".to_string(),
            other => other
                .numeric_kind()
                .map_or_else(|| "?".to_string(), |kind| kind.name().to_string()),
        }
    }

    fn class(&self) -> Option<&Arc<ClassInfo>> {
        match self {
            Value::Object(object) => Some(object.class()),
            Value::Struct(value) => Some(value.class()),
            Value::Exception(exception) => Some(exception.class()),
            _ => None,
        }
    }

    /// Runtime type test: `value is T`. Null is never an instance.
    pub fn is_instance_of(&self, ty: &Type) -> bool {
        if self.is_null() {
            return false;
        }
        match ty {
            Type::Object => true,
            Type::Nullable(inner) => self.is_instance_of(inner),
            Type::Str => matches!(self, Value::Str(_)),
            Type::Array(elem) => match self {
                Value::Array(array) => elem.is_assignable_from(array.element_type()),
                _ => false,
            },
            Type::Class(target) => self.class().is_some_and(|c| c.is_subclass_of(target)),
            Type::Delegate(_) => matches!(self, Value::Function(_)),
            Type::Expression => matches!(self, Value::Quote(_)),
            Type::RuntimeVariables => matches!(self, Value::RuntimeVariables(_)),
            Type::Void => false,
            other => other.numeric_kind() == self.numeric_kind(),
        }
    }

    /// Exact runtime type test: `value.GetType() == T`.
    pub fn has_exact_type(&self, ty: &Type) -> bool {
        if self.is_null() {
            return false;
        }
        match ty.non_nullable() {
            Type::Class(target) => self.class().is_some_and(|c| Arc::ptr_eq(c, target)),
            Type::Array(elem) => matches!(self, Value::Array(a) if a.element_type() == elem.as_ref()),
            Type::Object => false,
            other => self.is_instance_of(other),
        }
    }

    /// Reads an instance field slot of an object, struct or exception.
    pub fn load_field(&self, slot: usize) -> Result<Value, ExceptionRef> {
        match self {
            Value::Object(object) => Ok(object.field(slot)),
            Value::Struct(value) => Ok(value.field(slot)),
            Value::Exception(exception) => Ok(exception.field(slot)),
            Value::Null => Err(Exception::null_reference()),
            other => Err(Exception::invalid_operation(format!(
                "Value of type '{}' has no fields.",
                other.type_name()
            ))),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (I8(a), I8(b)) => a == b,
            (U8(a), U8(b)) => a == b,
            (I16(a), I16(b)) => a == b,
            (U16(a), U16(b)) => a == b,
            (I32(a), I32(b)) => a == b,
            (U32(a), U32(b)) => a == b,
            (I64(a), I64(b)) => a == b,
            (U64(a), U64(b)) => a == b,
            // Standard float equality: NaN != NaN
            (F32(a), F32(b)) => a == b,
            (F64(a), F64(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Array(a), Array(b)) => Arc::ptr_eq(&a.0, &b.0),
            (Object(a), Object(b)) => Arc::ptr_eq(&a.0, &b.0),
            (Struct(a), Struct(b)) => Arc::ptr_eq(&a.0.class, &b.0.class) && a.0.fields == b.0.fields,
            (Exception(a), Exception(b)) => Arc::ptr_eq(a, b),
            (Function(a), Function(b)) => Arc::ptr_eq(a, b),
            (Quote(a), Quote(b)) => Arc::ptr_eq(a, b),
            (RuntimeVariables(a), RuntimeVariables(b)) => Arc::ptr_eq(a, b),
            (Cell(a), Cell(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(v) => write!(f, "Bool({})", v),
            Value::Char(v) => write!(f, "Char({:?})", v),
            Value::I8(v) => write!(f, "I8({})", v),
            Value::U8(v) => write!(f, "U8({})", v),
            Value::I16(v) => write!(f, "I16({})", v),
            Value::U16(v) => write!(f, "U16({})", v),
            Value::I32(v) => write!(f, "I32({})", v),
            Value::U32(v) => write!(f, "U32({})", v),
            Value::I64(v) => write!(f, "I64({})", v),
            Value::U64(v) => write!(f, "U64({})", v),
            Value::F32(v) => write!(f, "F32({:?})", v),
            Value::F64(v) => write!(f, "F64({:?})", v),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Array(array) => {
                write!(f, "[")?;
                for (i, item) in array.to_vec().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(object) => write!(f, "<{} @ {:p}>", object.class().name(), Arc::as_ptr(&object.0)),
            Value::Struct(value) => {
                write!(f, "{} {{", value.class().name())?;
                for (i, field) in value.0.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {:?}", field)?;
                }
                write!(f, " }}")
            }
            Value::Exception(exception) => write!(f, "<{}>", exception),
            Value::Function(function) => write!(f, "<Function {}>", function.name()),
            Value::Quote(quote) => write!(f, "<Quote {:?}>", quote.expr()),
            Value::RuntimeVariables(vars) => write!(f, "<RuntimeVariables({})>", vars.len()),
            Value::Cell(cell) => write!(f, "<Cell {:?}>", cell.get()),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

impl_from! {
    bool => Bool, char => Char, i8 => I8, u8 => U8, i16 => I16, u16 => U16,
    i32 => I32, u32 => U32, i64 => I64, u64 => U64, f32 => F32, f64 => F64,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::str(v)
    }
}

impl From<ExceptionRef> for Value {
    fn from(v: ExceptionRef) -> Self {
        Value::Exception(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// ============================================================================
// Reference cells
// ============================================================================

/// A shared mutable cell holding one value (a captured local).
#[derive(Clone)]
pub struct StrongBox(Arc<Mutex<Value>>);

impl StrongBox {
    pub fn new(value: Value) -> Self {
        Self(Arc::new(Mutex::new(value)))
    }

    pub fn get(&self) -> Value {
        self.0.lock().clone()
    }

    pub fn set(&self, value: Value) {
        *self.0.lock() = value;
    }

    pub fn ptr_eq(&self, other: &StrongBox) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for StrongBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StrongBox({:?})", self.get())
    }
}

pub struct ArrayData {
    element: Type,
    items: Mutex<Vec<Value>>,
}

/// A one-dimensional array with reference identity.
#[derive(Clone)]
pub struct ArrayRef(Arc<ArrayData>);

impl ArrayRef {
    pub fn new(element: Type, items: Vec<Value>) -> Self {
        Self(Arc::new(ArrayData {
            element,
            items: Mutex::new(items),
        }))
    }

    /// An array of `len` default-initialized elements.
    pub fn with_len(element: Type, len: usize) -> Self {
        let items = vec![element.default_value(); len];
        Self::new(element, items)
    }

    pub fn element_type(&self) -> &Type {
        &self.0.element
    }

    pub fn len(&self) -> usize {
        self.0.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: i64) -> Result<Value, ExceptionRef> {
        let items = self.0.items.lock();
        usize::try_from(index)
            .ok()
            .and_then(|i| items.get(i).cloned())
            .ok_or_else(Exception::index_out_of_range)
    }

    pub fn set(&self, index: i64, value: Value) -> Result<(), ExceptionRef> {
        let mut items = self.0.items.lock();
        let slot = usize::try_from(index)
            .ok()
            .and_then(|i| items.get_mut(i))
            .ok_or_else(Exception::index_out_of_range)?;
        *slot = value;
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.0.items.lock().clone()
    }
}

pub struct ObjectData {
    class: Arc<ClassInfo>,
    fields: Mutex<Vec<Value>>,
}

/// An instance of a reference class.
#[derive(Clone)]
pub struct ObjectRef(Arc<ObjectData>);

impl ObjectRef {
    pub fn new(class: &Arc<ClassInfo>) -> Self {
        Self(Arc::new(ObjectData {
            class: class.clone(),
            fields: Mutex::new(class.default_fields()),
        }))
    }

    pub fn class(&self) -> &Arc<ClassInfo> {
        &self.0.class
    }

    pub fn field(&self, slot: usize) -> Value {
        self.0.fields.lock().get(slot).cloned().unwrap_or(Value::Null)
    }

    pub fn set_field(&self, slot: usize, value: Value) {
        if let Some(cell) = self.0.fields.lock().get_mut(slot) {
            *cell = value;
        }
    }
}

#[derive(Clone)]
pub struct StructData {
    class: Arc<ClassInfo>,
    fields: Vec<Value>,
}

/// An instance of a value class. Cloning is cheap; mutation copies.
#[derive(Clone)]
pub struct StructValue(Arc<StructData>);

impl StructValue {
    pub fn new(class: Arc<ClassInfo>) -> Self {
        let fields = class.default_fields();
        Self(Arc::new(StructData { class, fields }))
    }

    pub fn class(&self) -> &Arc<ClassInfo> {
        &self.0.class
    }

    pub fn field(&self, slot: usize) -> Value {
        self.0.fields.get(slot).cloned().unwrap_or(Value::Null)
    }

    /// Returns a copy with one field replaced.
    pub fn with_field(mut self, slot: usize, value: Value) -> Self {
        if let Some(cell) = Arc::make_mut(&mut self.0).fields.get_mut(slot) {
            *cell = value;
        }
        self
    }
}

// ============================================================================
// Reified trees and variables
// ============================================================================

/// A quoted expression together with the cells of the enclosing variables it
/// refers to, so that it observes their current values.
pub struct QuotedExpr {
    expr: Expr,
    bindings: Vec<(ParameterExpr, StrongBox)>,
}

impl QuotedExpr {
    pub fn new(expr: Expr, bindings: Vec<(ParameterExpr, StrongBox)>) -> Self {
        Self { expr, bindings }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn variable(&self, parameter: &ParameterExpr) -> Option<&StrongBox> {
        self.bindings
            .iter()
            .find(|(p, _)| p == parameter)
            .map(|(_, cell)| cell)
    }
}

/// Live view over a list of variables: reads and writes go to the variables
/// themselves.
pub struct RuntimeVariables {
    cells: Vec<StrongBox>,
}

impl RuntimeVariables {
    pub fn new(cells: Vec<StrongBox>) -> Self {
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.cells.get(index).map(StrongBox::get)
    }

    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.cells.get(index) {
            Some(cell) => {
                cell.set(value);
                true
            }
            None => false,
        }
    }
}
