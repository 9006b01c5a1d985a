use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::Type;
use crate::values::Value;

/// A field declared by a class.
///
/// Instance fields index into the object's field vector; inherited fields keep
/// their base-class slot. Static fields carry their own storage.
#[derive(Debug)]
pub struct FieldInfo {
    name: String,
    ty: Type,
    slot: usize,
    declaring_class: String,
    /// Storage of a static field; `None` for instance fields.
    static_value: Option<Mutex<Value>>,
}

impl FieldInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn is_static(&self) -> bool {
        self.static_value.is_some()
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn declaring_class(&self) -> &str {
        &self.declaring_class
    }

    pub fn static_value(&self) -> Value {
        self.static_value
            .as_ref()
            .map_or(Value::Null, |cell| cell.lock().clone())
    }

    pub fn set_static_value(&self, value: Value) {
        if let Some(cell) = &self.static_value {
            *cell.lock() = value;
        }
    }
}

pub struct ClassInfo {
    name: String,
    base: Option<Arc<ClassInfo>>,
    fields: Vec<Arc<FieldInfo>>,
    instance_field_count: usize,
    is_value_type: bool,
    is_abstract: bool,
}

impl ClassInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<&Arc<ClassInfo>> {
        self.base.as_ref()
    }

    pub fn is_value_type(&self) -> bool {
        self.is_value_type
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Number of instance slots, inherited ones included.
    pub fn instance_field_count(&self) -> usize {
        self.instance_field_count
    }

    /// Fields declared directly on this class.
    pub fn declared_fields(&self) -> &[Arc<FieldInfo>] {
        &self.fields
    }

    /// Looks a field up by name, walking the base chain.
    pub fn field(&self, name: &str) -> Option<Arc<FieldInfo>> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(field) = class.fields.iter().find(|f| f.name == name) {
                return Some(field.clone());
            }
            current = class.base.as_deref();
        }
        None
    }

    /// True when `self` is `ancestor` or derives from it.
    pub fn is_subclass_of(&self, ancestor: &ClassInfo) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if std::ptr::eq(class, ancestor) {
                return true;
            }
            current = class.base.as_deref();
        }
        false
    }

    /// Default contents of a fresh instance, slot order.
    pub fn default_fields(&self) -> Vec<Value> {
        let mut values = vec![Value::Null; self.instance_field_count];
        let mut current = Some(self);
        while let Some(class) = current {
            for field in class.fields.iter().filter(|f| !f.is_static()) {
                if !matches!(&field.ty, Type::Class(c) if std::ptr::eq(c.as_ref(), self)) {
                    values[field.slot] = field.ty.default_value();
                }
            }
            current = class.base.as_deref();
        }
        values
    }
}

impl fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassInfo")
            .field("name", &self.name)
            .field("base", &self.base.as_ref().map(|b| b.name()))
            .field("value_type", &self.is_value_type)
            .finish()
    }
}

/// Incremental construction of a [`ClassInfo`].
///
/// ```ignore
/// let point = ClassBuilder::new("Point")
///     .value_type()
///     .field("x", Type::I32)
///     .field("y", Type::I32)
///     .build();
/// ```
pub struct ClassBuilder {
    name: String,
    base: Option<Arc<ClassInfo>>,
    fields: Vec<(String, Type, bool)>,
    is_value_type: bool,
    is_abstract: bool,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            fields: Vec::new(),
            is_value_type: false,
            is_abstract: false,
        }
    }

    pub fn extends(mut self, base: &Arc<ClassInfo>) -> Self {
        self.base = Some(base.clone());
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.fields.push((name.into(), ty, false));
        self
    }

    pub fn static_field(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.fields.push((name.into(), ty, true));
        self
    }

    pub fn value_type(mut self) -> Self {
        self.is_value_type = true;
        self
    }

    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn build(self) -> Arc<ClassInfo> {
        let mut next_instance = self
            .base
            .as_ref()
            .map_or(0, |base| base.instance_field_count);
        let mut next_static = 0;
        let mut fields = Vec::with_capacity(self.fields.len());

        for (name, ty, is_static) in self.fields {
            let counter = if is_static {
                &mut next_static
            } else {
                &mut next_instance
            };
            let slot = *counter;
            *counter += 1;
            let static_value = is_static.then(|| Mutex::new(ty.default_value()));
            fields.push(Arc::new(FieldInfo {
                name,
                ty,
                slot,
                declaring_class: self.name.clone(),
                static_value,
            }));
        }

        Arc::new(ClassInfo {
            name: self.name,
            base: self.base,
            fields,
            instance_field_count: next_instance,
            is_value_type: self.is_value_type,
            is_abstract: self.is_abstract,
        })
    }
}
