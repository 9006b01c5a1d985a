//! Expression trees.
//!
//! An [`Expr`] is an immutable, cheaply clonable typed node. Builders compute
//! the node type with simple rules and never validate: the compiler assumes
//! the tree it is handed is well formed.

mod members;
mod visit;

pub use members::{FieldInfo, MethodBody, MethodInfo, ParameterInfo, PropertyInfo};
pub use visit::free_variables;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::types::{BuiltinClasses, ClassInfo, Signature, Type};
use crate::values::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    NegateChecked,
    Not,
    OnesComplement,
    UnaryPlus,
    Increment,
    Decrement,
    IsTrue,
    IsFalse,
    Convert,
    ConvertChecked,
    TypeAs,
    ArrayLength,
    Unbox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    AddChecked,
    Subtract,
    SubtractChecked,
    Multiply,
    MultiplyChecked,
    Divide,
    Modulo,
    Power,
    And,
    Or,
    ExclusiveOr,
    LeftShift,
    RightShift,
    AndAlso,
    OrElse,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    ArrayIndex,
    Coalesce,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::LessThan
                | Self::LessThanOrEqual
                | Self::GreaterThan
                | Self::GreaterThanOrEqual
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GotoKind {
    Goto,
    Return,
    Break,
    Continue,
}

// ============================================================================
// Identity nodes
// ============================================================================

#[derive(Debug)]
struct ParameterData {
    name: Option<String>,
    ty: Type,
    by_ref: bool,
}

/// A variable or lambda parameter. Two parameters are the same variable only
/// if they are the same node.
#[derive(Clone)]
pub struct ParameterExpr(Arc<ParameterData>);

impl ParameterExpr {
    pub fn new(ty: Type, name: impl Into<String>) -> Self {
        Self(Arc::new(ParameterData {
            name: Some(name.into()),
            ty,
            by_ref: false,
        }))
    }

    pub fn anonymous(ty: Type) -> Self {
        Self(Arc::new(ParameterData {
            name: None,
            ty,
            by_ref: false,
        }))
    }

    /// A by-reference lambda parameter: its final value is written back to
    /// the caller's argument slot.
    pub fn by_ref(ty: Type, name: impl Into<String>) -> Self {
        Self(Arc::new(ParameterData {
            name: Some(name.into()),
            ty,
            by_ref: true,
        }))
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn ty(&self) -> &Type {
        &self.0.ty
    }

    pub fn is_by_ref(&self) -> bool {
        self.0.by_ref
    }

    pub fn expr(&self) -> Expr {
        Expr::new(self.0.ty.clone(), ExprKind::Parameter(self.clone()))
    }
}

impl PartialEq for ParameterExpr {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ParameterExpr {}

impl Hash for ParameterExpr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for ParameterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name().unwrap_or("_"), self.ty())
    }
}

#[derive(Debug)]
struct LabelData {
    name: Option<String>,
    ty: Type,
}

/// A jump target. Identity semantics, like [`ParameterExpr`].
#[derive(Clone)]
pub struct LabelTarget(Arc<LabelData>);

impl LabelTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self::typed(Type::Void, name)
    }

    /// A label that receives a value of type `ty` from the jumps targeting it.
    pub fn typed(ty: Type, name: impl Into<String>) -> Self {
        Self(Arc::new(LabelData {
            name: Some(name.into()),
            ty,
        }))
    }

    pub fn anonymous(ty: Type) -> Self {
        Self(Arc::new(LabelData { name: None, ty }))
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn ty(&self) -> &Type {
        &self.0.ty
    }
}

impl PartialEq for LabelTarget {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for LabelTarget {}

impl Hash for LabelTarget {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for LabelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "label {}", self.name().unwrap_or("_"))
    }
}

// ============================================================================
// Composite parts
// ============================================================================

#[derive(Debug)]
pub struct LambdaExpr {
    pub name: Option<String>,
    pub parameters: Vec<ParameterExpr>,
    pub body: Expr,
    pub return_type: Type,
}

impl LambdaExpr {
    /// A lambda returning its body's type.
    pub fn new(name: Option<&str>, parameters: Vec<ParameterExpr>, body: Expr) -> Arc<Self> {
        let return_type = body.ty().clone();
        Self::typed(name, parameters, body, return_type)
    }

    pub fn typed(
        name: Option<&str>,
        parameters: Vec<ParameterExpr>,
        body: Expr,
        return_type: Type,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.map(str::to_string),
            parameters,
            body,
            return_type,
        })
    }

    pub fn signature(&self) -> Signature {
        Signature {
            parameters: self.parameters.iter().map(|p| p.ty().clone()).collect(),
            by_ref: self.parameters.iter().map(ParameterExpr::is_by_ref).collect(),
            return_type: self.return_type.clone(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<lambda>")
    }
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub test_values: Vec<Expr>,
    pub body: Expr,
}

impl SwitchCase {
    pub fn new(test_values: Vec<Expr>, body: Expr) -> Self {
        Self { test_values, body }
    }
}

#[derive(Debug, Clone)]
pub struct CatchBlock {
    /// Exception type the handler accepts.
    pub test: Type,
    pub variable: Option<ParameterExpr>,
    pub filter: Option<Expr>,
    pub body: Expr,
}

impl CatchBlock {
    pub fn new(test: Type, variable: Option<ParameterExpr>, body: Expr) -> Self {
        Self {
            test,
            variable,
            filter: None,
            body,
        }
    }

    /// Catch-all for any exception.
    pub fn any(variable: Option<ParameterExpr>, body: Expr) -> Self {
        Self::new(Type::class(&BuiltinClasses::get().exception), variable, body)
    }

    pub fn with_filter(mut self, filter: Expr) -> Self {
        self.filter = Some(filter);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolDocument {
    pub file_name: String,
}

impl SymbolDocument {
    pub fn new(file_name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            file_name: file_name.into(),
        })
    }
}

/// Marks the source span of the following expressions.
#[derive(Debug, Clone)]
pub struct DebugInfoExpr {
    pub document: Arc<SymbolDocument>,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl DebugInfoExpr {
    /// Line number that clears the current sequence point.
    pub const CLEAR_LINE: u32 = 0xfeefee;

    pub fn is_clear(&self) -> bool {
        self.start_line == Self::CLEAR_LINE
    }
}

#[derive(Debug, Clone)]
pub enum Member {
    Field(Arc<FieldInfo>),
    Property(Arc<PropertyInfo>),
}

// ============================================================================
// Nodes
// ============================================================================

#[derive(Debug)]
pub enum ExprKind {
    Constant(Value),
    Default,
    Parameter(ParameterExpr),
    Unary {
        op: UnaryOp,
        operand: Expr,
        method: Option<Arc<MethodInfo>>,
    },
    Binary {
        op: BinaryOp,
        left: Expr,
        right: Expr,
        method: Option<Arc<MethodInfo>>,
        lifted_to_null: bool,
    },
    Assign {
        target: Expr,
        value: Expr,
    },
    Conditional {
        test: Expr,
        if_true: Expr,
        if_false: Expr,
    },
    Block {
        variables: Vec<ParameterExpr>,
        expressions: Vec<Expr>,
    },
    Loop {
        body: Expr,
        break_label: Option<LabelTarget>,
        continue_label: Option<LabelTarget>,
    },
    Label {
        target: LabelTarget,
        default_value: Option<Expr>,
    },
    Goto {
        kind: GotoKind,
        target: LabelTarget,
        value: Option<Expr>,
    },
    Switch {
        value: Expr,
        cases: Vec<SwitchCase>,
        default_body: Option<Expr>,
        comparison: Option<Arc<MethodInfo>>,
    },
    Try {
        body: Expr,
        handlers: Vec<CatchBlock>,
        finally: Option<Expr>,
        fault: Option<Expr>,
    },
    /// `None` is a rethrow of the exception being handled.
    Throw(Option<Expr>),
    Call {
        method: Arc<MethodInfo>,
        instance: Option<Expr>,
        arguments: Vec<Expr>,
    },
    Invoke {
        target: Expr,
        arguments: Vec<Expr>,
    },
    New {
        class: Arc<ClassInfo>,
        constructor: Option<Arc<MethodInfo>>,
        arguments: Vec<Expr>,
    },
    NewArrayInit {
        element: Type,
        items: Vec<Expr>,
    },
    NewArrayBounds {
        element: Type,
        length: Expr,
    },
    /// Array element access (no indexer) or indexed property access.
    Index {
        object: Expr,
        indexer: Option<Arc<PropertyInfo>>,
        arguments: Vec<Expr>,
    },
    Member {
        object: Option<Expr>,
        member: Member,
    },
    Lambda(Arc<LambdaExpr>),
    Quote(Expr),
    RuntimeVariables(Vec<ParameterExpr>),
    DebugInfo(DebugInfoExpr),
    TypeIs {
        operand: Expr,
        test: Type,
    },
    TypeEqual {
        operand: Expr,
        test: Type,
    },
}

#[derive(Debug)]
struct ExprNode {
    ty: Type,
    kind: ExprKind,
}

#[derive(Clone)]
pub struct Expr(Arc<ExprNode>);

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Constant(v) => write!(f, "{:?}", v),
            ExprKind::Parameter(p) => write!(f, "{:?}", p),
            kind => write!(f, "{}: {}", kind.name(), self.ty()),
        }
    }
}

impl ExprKind {
    pub fn name(&self) -> &'static str {
        match self {
            ExprKind::Constant(_) => "Constant",
            ExprKind::Default => "Default",
            ExprKind::Parameter(_) => "Parameter",
            ExprKind::Unary { .. } => "Unary",
            ExprKind::Binary { .. } => "Binary",
            ExprKind::Assign { .. } => "Assign",
            ExprKind::Conditional { .. } => "Conditional",
            ExprKind::Block { .. } => "Block",
            ExprKind::Loop { .. } => "Loop",
            ExprKind::Label { .. } => "Label",
            ExprKind::Goto { .. } => "Goto",
            ExprKind::Switch { .. } => "Switch",
            ExprKind::Try { .. } => "Try",
            ExprKind::Throw(_) => "Throw",
            ExprKind::Call { .. } => "Call",
            ExprKind::Invoke { .. } => "Invoke",
            ExprKind::New { .. } => "New",
            ExprKind::NewArrayInit { .. } => "NewArrayInit",
            ExprKind::NewArrayBounds { .. } => "NewArrayBounds",
            ExprKind::Index { .. } => "Index",
            ExprKind::Member { .. } => "Member",
            ExprKind::Lambda(_) => "Lambda",
            ExprKind::Quote(_) => "Quote",
            ExprKind::RuntimeVariables(_) => "RuntimeVariables",
            ExprKind::DebugInfo(_) => "DebugInfo",
            ExprKind::TypeIs { .. } => "TypeIs",
            ExprKind::TypeEqual { .. } => "TypeEqual",
        }
    }
}

fn binary_result_type(op: BinaryOp, left: &Type, right: &Type, lifted_to_null: bool) -> Type {
    match op {
        _ if op.is_comparison() => {
            if lifted_to_null && (left.is_nullable() || right.is_nullable()) {
                Type::nullable(Type::Bool)
            } else {
                Type::Bool
            }
        }
        BinaryOp::ArrayIndex => left.element_type().cloned().unwrap_or(Type::Object),
        BinaryOp::Coalesce => {
            if left.is_nullable() && !right.is_nullable() {
                right.clone()
            } else {
                left.clone()
            }
        }
        BinaryOp::Power => left.clone(),
        _ => {
            if right.is_nullable() && !left.is_nullable() {
                Type::nullable(left.clone())
            } else {
                left.clone()
            }
        }
    }
}

fn infer_constant_type(value: &Value) -> Type {
    match value {
        Value::Str(_) => Type::Str,
        Value::Array(a) => Type::array(a.element_type().clone()),
        Value::Object(o) => Type::class(o.class()),
        Value::Struct(s) => Type::class(s.class()),
        Value::Exception(e) => Type::class(e.class()),
        Value::Function(f) => Type::Delegate(Arc::new(f.signature().clone())),
        Value::Quote(_) => Type::Expression,
        Value::RuntimeVariables(_) => Type::RuntimeVariables,
        other => other
            .numeric_kind()
            .map_or(Type::Object, |kind| kind.to_type()),
    }
}

impl Expr {
    pub fn new(ty: Type, kind: ExprKind) -> Expr {
        Expr(Arc::new(ExprNode { ty, kind }))
    }

    pub fn ty(&self) -> &Type {
        &self.0.ty
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    // === Leaves ===

    /// A constant whose type is inferred from the value (null is `Object`).
    pub fn constant(value: impl Into<Value>) -> Expr {
        let value = value.into();
        let ty = infer_constant_type(&value);
        Expr::new(ty, ExprKind::Constant(value))
    }

    pub fn constant_typed(value: impl Into<Value>, ty: Type) -> Expr {
        Expr::new(ty, ExprKind::Constant(value.into()))
    }

    pub fn null(ty: Type) -> Expr {
        Expr::new(ty, ExprKind::Constant(Value::Null))
    }

    pub fn default(ty: Type) -> Expr {
        Expr::new(ty, ExprKind::Default)
    }

    pub fn empty() -> Expr {
        Expr::default(Type::Void)
    }

    pub fn parameter(parameter: &ParameterExpr) -> Expr {
        parameter.expr()
    }

    // === Unary ===

    pub fn unary(op: UnaryOp, operand: Expr, ty: Type) -> Expr {
        Expr::new(
            ty,
            ExprKind::Unary {
                op,
                operand,
                method: None,
            },
        )
    }

    pub fn unary_with_method(op: UnaryOp, operand: Expr, method: Arc<MethodInfo>) -> Expr {
        let ty = if operand.ty().is_nullable() && !method.return_type.admits_null() {
            Type::nullable(method.return_type.clone())
        } else {
            method.return_type.clone()
        };
        Expr::new(
            ty,
            ExprKind::Unary {
                op,
                operand,
                method: Some(method),
            },
        )
    }

    fn same_type_unary(op: UnaryOp, operand: Expr) -> Expr {
        let ty = operand.ty().clone();
        Expr::unary(op, operand, ty)
    }

    pub fn negate(operand: Expr) -> Expr {
        Expr::same_type_unary(UnaryOp::Negate, operand)
    }

    pub fn negate_checked(operand: Expr) -> Expr {
        Expr::same_type_unary(UnaryOp::NegateChecked, operand)
    }

    pub fn not(operand: Expr) -> Expr {
        Expr::same_type_unary(UnaryOp::Not, operand)
    }

    pub fn ones_complement(operand: Expr) -> Expr {
        Expr::same_type_unary(UnaryOp::OnesComplement, operand)
    }

    pub fn unary_plus(operand: Expr) -> Expr {
        Expr::same_type_unary(UnaryOp::UnaryPlus, operand)
    }

    pub fn increment(operand: Expr) -> Expr {
        Expr::same_type_unary(UnaryOp::Increment, operand)
    }

    pub fn decrement(operand: Expr) -> Expr {
        Expr::same_type_unary(UnaryOp::Decrement, operand)
    }

    pub fn is_true(operand: Expr) -> Expr {
        Expr::same_type_unary(UnaryOp::IsTrue, operand)
    }

    pub fn is_false(operand: Expr) -> Expr {
        Expr::same_type_unary(UnaryOp::IsFalse, operand)
    }

    pub fn convert(operand: Expr, ty: Type) -> Expr {
        Expr::unary(UnaryOp::Convert, operand, ty)
    }

    pub fn convert_checked(operand: Expr, ty: Type) -> Expr {
        Expr::unary(UnaryOp::ConvertChecked, operand, ty)
    }

    pub fn type_as(operand: Expr, ty: Type) -> Expr {
        Expr::unary(UnaryOp::TypeAs, operand, ty)
    }

    pub fn unbox(operand: Expr, ty: Type) -> Expr {
        Expr::unary(UnaryOp::Unbox, operand, ty)
    }

    pub fn array_length(array: Expr) -> Expr {
        Expr::unary(UnaryOp::ArrayLength, array, Type::I32)
    }

    // === Binary ===

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::make_binary(op, left, right, false, None)
    }

    pub fn binary_lifted_to_null(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::make_binary(op, left, right, true, None)
    }

    /// A binary node implemented by a user-defined operator method.
    pub fn binary_with_method(
        op: BinaryOp,
        left: Expr,
        right: Expr,
        lifted_to_null: bool,
        method: Arc<MethodInfo>,
    ) -> Expr {
        Expr::make_binary(op, left, right, lifted_to_null, Some(method))
    }

    fn make_binary(
        op: BinaryOp,
        left: Expr,
        right: Expr,
        lifted_to_null: bool,
        method: Option<Arc<MethodInfo>>,
    ) -> Expr {
        let ty = match &method {
            Some(m) => {
                let lifted = left.ty().is_nullable() || right.ty().is_nullable();
                let lifts = !op.is_comparison() || lifted_to_null;
                if lifted && lifts && !m.return_type.admits_null() {
                    Type::nullable(m.return_type.clone())
                } else {
                    m.return_type.clone()
                }
            }
            None => binary_result_type(op, left.ty(), right.ty(), lifted_to_null),
        };
        Expr::new(
            ty,
            ExprKind::Binary {
                op,
                left,
                right,
                method,
                lifted_to_null,
            },
        )
    }

    pub fn add(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Add, left, right)
    }

    pub fn add_checked(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::AddChecked, left, right)
    }

    pub fn subtract(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Subtract, left, right)
    }

    pub fn subtract_checked(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::SubtractChecked, left, right)
    }

    pub fn multiply(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Multiply, left, right)
    }

    pub fn multiply_checked(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::MultiplyChecked, left, right)
    }

    pub fn divide(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Divide, left, right)
    }

    pub fn modulo(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Modulo, left, right)
    }

    pub fn equal(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Equal, left, right)
    }

    pub fn not_equal(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::NotEqual, left, right)
    }

    pub fn less_than(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::LessThan, left, right)
    }

    pub fn greater_than(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::GreaterThan, left, right)
    }

    pub fn and_also(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::AndAlso, left, right)
    }

    pub fn or_else(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::OrElse, left, right)
    }

    pub fn coalesce(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Coalesce, left, right)
    }

    pub fn array_index(array: Expr, index: Expr) -> Expr {
        Expr::binary(BinaryOp::ArrayIndex, array, index)
    }

    // === Statements ===

    pub fn assign(target: Expr, value: Expr) -> Expr {
        let ty = target.ty().clone();
        Expr::new(ty, ExprKind::Assign { target, value })
    }

    pub fn condition(test: Expr, if_true: Expr, if_false: Expr) -> Expr {
        let ty = if_true.ty().clone();
        Expr::condition_typed(test, if_true, if_false, ty)
    }

    pub fn condition_typed(test: Expr, if_true: Expr, if_false: Expr, ty: Type) -> Expr {
        Expr::new(
            ty,
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
            },
        )
    }

    pub fn if_then(test: Expr, if_true: Expr) -> Expr {
        Expr::condition_typed(test, if_true, Expr::empty(), Type::Void)
    }

    pub fn if_then_else(test: Expr, if_true: Expr, if_false: Expr) -> Expr {
        Expr::condition_typed(test, if_true, if_false, Type::Void)
    }

    /// A block typed by its last expression.
    pub fn block(variables: Vec<ParameterExpr>, expressions: Vec<Expr>) -> Expr {
        let ty = expressions
            .last()
            .map_or(Type::Void, |last| last.ty().clone());
        Expr::block_typed(ty, variables, expressions)
    }

    pub fn block_typed(ty: Type, variables: Vec<ParameterExpr>, expressions: Vec<Expr>) -> Expr {
        Expr::new(
            ty,
            ExprKind::Block {
                variables,
                expressions,
            },
        )
    }

    pub fn loop_(
        body: Expr,
        break_label: Option<LabelTarget>,
        continue_label: Option<LabelTarget>,
    ) -> Expr {
        let ty = break_label
            .as_ref()
            .map_or(Type::Void, |label| label.ty().clone());
        Expr::new(
            ty,
            ExprKind::Loop {
                body,
                break_label,
                continue_label,
            },
        )
    }

    pub fn label(target: &LabelTarget, default_value: Option<Expr>) -> Expr {
        Expr::new(
            target.ty().clone(),
            ExprKind::Label {
                target: target.clone(),
                default_value,
            },
        )
    }

    fn make_goto(kind: GotoKind, target: &LabelTarget, value: Option<Expr>) -> Expr {
        Expr::new(
            Type::Void,
            ExprKind::Goto {
                kind,
                target: target.clone(),
                value,
            },
        )
    }

    pub fn goto(target: &LabelTarget) -> Expr {
        Expr::make_goto(GotoKind::Goto, target, None)
    }

    pub fn goto_value(target: &LabelTarget, value: Expr) -> Expr {
        Expr::make_goto(GotoKind::Goto, target, Some(value))
    }

    pub fn return_(target: &LabelTarget, value: Option<Expr>) -> Expr {
        Expr::make_goto(GotoKind::Return, target, value)
    }

    pub fn break_(target: &LabelTarget, value: Option<Expr>) -> Expr {
        Expr::make_goto(GotoKind::Break, target, value)
    }

    pub fn continue_(target: &LabelTarget) -> Expr {
        Expr::make_goto(GotoKind::Continue, target, None)
    }

    pub fn switch(
        value: Expr,
        default_body: Option<Expr>,
        comparison: Option<Arc<MethodInfo>>,
        cases: Vec<SwitchCase>,
    ) -> Expr {
        let ty = cases
            .first()
            .map(|c| c.body.ty().clone())
            .or_else(|| default_body.as_ref().map(|d| d.ty().clone()))
            .unwrap_or(Type::Void);
        Expr::switch_typed(ty, value, default_body, comparison, cases)
    }

    pub fn switch_typed(
        ty: Type,
        value: Expr,
        default_body: Option<Expr>,
        comparison: Option<Arc<MethodInfo>>,
        cases: Vec<SwitchCase>,
    ) -> Expr {
        Expr::new(
            ty,
            ExprKind::Switch {
                value,
                cases,
                default_body,
                comparison,
            },
        )
    }

    pub fn try_catch(body: Expr, handlers: Vec<CatchBlock>) -> Expr {
        let ty = body.ty().clone();
        Expr::make_try(ty, body, None, None, handlers)
    }

    pub fn try_finally(body: Expr, finally: Expr) -> Expr {
        let ty = body.ty().clone();
        Expr::make_try(ty, body, Some(finally), None, Vec::new())
    }

    pub fn try_catch_finally(body: Expr, finally: Expr, handlers: Vec<CatchBlock>) -> Expr {
        let ty = body.ty().clone();
        Expr::make_try(ty, body, Some(finally), None, handlers)
    }

    pub fn try_fault(body: Expr, fault: Expr) -> Expr {
        let ty = body.ty().clone();
        Expr::make_try(ty, body, None, Some(fault), Vec::new())
    }

    pub fn make_try(
        ty: Type,
        body: Expr,
        finally: Option<Expr>,
        fault: Option<Expr>,
        handlers: Vec<CatchBlock>,
    ) -> Expr {
        Expr::new(
            ty,
            ExprKind::Try {
                body,
                handlers,
                finally,
                fault,
            },
        )
    }

    pub fn throw(exception: Expr) -> Expr {
        Expr::throw_typed(exception, Type::Void)
    }

    /// A throw used where a value of type `ty` is expected.
    pub fn throw_typed(exception: Expr, ty: Type) -> Expr {
        Expr::new(ty, ExprKind::Throw(Some(exception)))
    }

    pub fn rethrow() -> Expr {
        Expr::new(Type::Void, ExprKind::Throw(None))
    }

    pub fn rethrow_typed(ty: Type) -> Expr {
        Expr::new(ty, ExprKind::Throw(None))
    }

    // === Calls and objects ===

    pub fn call(instance: Option<Expr>, method: &Arc<MethodInfo>, arguments: Vec<Expr>) -> Expr {
        Expr::new(
            method.return_type.clone(),
            ExprKind::Call {
                method: method.clone(),
                instance,
                arguments,
            },
        )
    }

    pub fn invoke(target: Expr, arguments: Vec<Expr>) -> Expr {
        let ty = target
            .ty()
            .signature()
            .map_or(Type::Object, |s| s.return_type.clone());
        Expr::new(ty, ExprKind::Invoke { target, arguments })
    }

    pub fn new_object(
        class: &Arc<ClassInfo>,
        constructor: Option<&Arc<MethodInfo>>,
        arguments: Vec<Expr>,
    ) -> Expr {
        Expr::new(
            Type::class(class),
            ExprKind::New {
                class: class.clone(),
                constructor: constructor.cloned(),
                arguments,
            },
        )
    }

    pub fn new_array_init(element: Type, items: Vec<Expr>) -> Expr {
        Expr::new(
            Type::array(element.clone()),
            ExprKind::NewArrayInit { element, items },
        )
    }

    pub fn new_array_bounds(element: Type, length: Expr) -> Expr {
        Expr::new(
            Type::array(element.clone()),
            ExprKind::NewArrayBounds { element, length },
        )
    }

    /// Assignable array element access.
    pub fn array_access(array: Expr, index: Expr) -> Expr {
        let ty = array.ty().element_type().cloned().unwrap_or(Type::Object);
        Expr::new(
            ty,
            ExprKind::Index {
                object: array,
                indexer: None,
                arguments: vec![index],
            },
        )
    }

    pub fn property_index(object: Expr, indexer: &Arc<PropertyInfo>, arguments: Vec<Expr>) -> Expr {
        Expr::new(
            indexer.ty.clone(),
            ExprKind::Index {
                object,
                indexer: Some(indexer.clone()),
                arguments,
            },
        )
    }

    /// Field access; `object` is `None` for static fields.
    pub fn field(object: Option<Expr>, field: &Arc<FieldInfo>) -> Expr {
        Expr::new(
            field.ty().clone(),
            ExprKind::Member {
                object,
                member: Member::Field(field.clone()),
            },
        )
    }

    pub fn property(object: Option<Expr>, property: &Arc<PropertyInfo>) -> Expr {
        Expr::new(
            property.ty.clone(),
            ExprKind::Member {
                object,
                member: Member::Property(property.clone()),
            },
        )
    }

    // === Functions, reification, diagnostics ===

    pub fn lambda(lambda: &Arc<LambdaExpr>) -> Expr {
        Expr::new(
            Type::Delegate(Arc::new(lambda.signature())),
            ExprKind::Lambda(lambda.clone()),
        )
    }

    pub fn quote(expr: Expr) -> Expr {
        Expr::new(Type::Expression, ExprKind::Quote(expr))
    }

    pub fn runtime_variables(variables: Vec<ParameterExpr>) -> Expr {
        Expr::new(Type::RuntimeVariables, ExprKind::RuntimeVariables(variables))
    }

    pub fn debug_info(
        document: &Arc<SymbolDocument>,
        start_line: u32,
        start_column: u32,
        end_line: u32,
        end_column: u32,
    ) -> Expr {
        Expr::new(
            Type::Void,
            ExprKind::DebugInfo(DebugInfoExpr {
                document: document.clone(),
                start_line,
                start_column,
                end_line,
                end_column,
            }),
        )
    }

    pub fn clear_debug_info(document: &Arc<SymbolDocument>) -> Expr {
        let clear = DebugInfoExpr::CLEAR_LINE;
        Expr::debug_info(document, clear, 0, clear, 0)
    }

    pub fn type_is(operand: Expr, test: Type) -> Expr {
        Expr::new(Type::Bool, ExprKind::TypeIs { operand, test })
    }

    pub fn type_equal(operand: Expr, test: Type) -> Expr {
        Expr::new(Type::Bool, ExprKind::TypeEqual { operand, test })
    }
}
