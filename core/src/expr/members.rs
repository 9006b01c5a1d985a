//! Reflection-like metadata for methods, properties and fields.

use std::fmt;
use std::sync::Arc;

use crate::interpreter::LightLambda;
use crate::types::Type;
use crate::values::{ExceptionRef, NativeFn, Value};

pub use crate::types::FieldInfo;

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInfo {
    pub name: String,
    pub ty: Type,
    pub by_ref: bool,
}

impl ParameterInfo {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            by_ref: false,
        }
    }

    pub fn by_ref(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            by_ref: true,
        }
    }
}

/// What runs when a method is called.
#[derive(Clone)]
pub enum MethodBody {
    Native(NativeFn),
    /// A compiled lambda; instance methods receive the receiver as their
    /// first parameter.
    Interpreted(LightLambda),
    Abstract,
}

/// A callable member.
///
/// Arguments are passed as one slice: for instance methods slot 0 holds the
/// receiver and declared parameters follow. Constructors are static methods
/// returning the new instance.
pub struct MethodInfo {
    pub name: String,
    pub declaring_type: Option<Type>,
    pub is_static: bool,
    pub parameters: Vec<ParameterInfo>,
    pub return_type: Type,
    pub body: MethodBody,
}

impl MethodInfo {
    pub fn native_static(
        name: impl Into<String>,
        parameters: Vec<ParameterInfo>,
        return_type: Type,
        body: impl Fn(&mut [Value]) -> Result<Value, ExceptionRef> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            declaring_type: None,
            is_static: true,
            parameters,
            return_type,
            body: MethodBody::Native(Arc::new(body)),
        })
    }

    pub fn native_instance(
        name: impl Into<String>,
        declaring_type: Type,
        parameters: Vec<ParameterInfo>,
        return_type: Type,
        body: impl Fn(&mut [Value]) -> Result<Value, ExceptionRef> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            declaring_type: Some(declaring_type),
            is_static: false,
            parameters,
            return_type,
            body: MethodBody::Native(Arc::new(body)),
        })
    }

    /// Wraps a compiled lambda as a method. The lambda's parameter list must
    /// start with the receiver when `is_static` is false.
    pub fn interpreted(
        name: impl Into<String>,
        declaring_type: Option<Type>,
        is_static: bool,
        parameters: Vec<ParameterInfo>,
        return_type: Type,
        lambda: LightLambda,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            declaring_type,
            is_static,
            parameters,
            return_type,
            body: MethodBody::Interpreted(lambda),
        })
    }

    pub fn has_by_ref_parameters(&self) -> bool {
        self.parameters.iter().any(|p| p.by_ref)
    }

    /// Total argument slots, receiver included.
    pub fn arg_count(&self) -> usize {
        self.parameters.len() + usize::from(!self.is_static)
    }

    pub fn returns_value(&self) -> bool {
        !self.return_type.is_void()
    }

    pub fn display_name(&self) -> String {
        match &self.declaring_type {
            Some(ty) => format!("{}.{}", ty, self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.display_name())?;
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if p.by_ref {
                write!(f, "ref ")?;
            }
            write!(f, "{}: {}", p.name, p.ty)?;
        }
        write!(f, ") -> {}", self.return_type)
    }
}

/// A property or indexer, accessed through its getter and setter methods.
///
/// Getter arguments are `[receiver?, index...]`; setter arguments are
/// `[receiver?, index..., value]`.
#[derive(Debug)]
pub struct PropertyInfo {
    pub name: String,
    pub ty: Type,
    pub getter: Option<Arc<MethodInfo>>,
    pub setter: Option<Arc<MethodInfo>>,
    pub index_parameters: Vec<ParameterInfo>,
}

impl PropertyInfo {
    pub fn is_static(&self) -> bool {
        self.getter
            .as_ref()
            .or(self.setter.as_ref())
            .is_some_and(|m| m.is_static)
    }
}
