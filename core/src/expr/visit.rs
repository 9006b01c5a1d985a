use hashbrown::HashSet;

use super::{Expr, ExprKind, ParameterExpr};

impl Expr {
    /// Calls `f` on every direct child, in evaluation order.
    pub fn for_each_child(&self, f: &mut dyn FnMut(&Expr)) {
        match self.kind() {
            ExprKind::Constant(_)
            | ExprKind::Default
            | ExprKind::Parameter(_)
            | ExprKind::RuntimeVariables(_)
            | ExprKind::DebugInfo(_) => {}
            ExprKind::Unary { operand, .. }
            | ExprKind::TypeIs { operand, .. }
            | ExprKind::TypeEqual { operand, .. } => f(operand),
            ExprKind::Binary { left, right, .. } => {
                f(left);
                f(right);
            }
            ExprKind::Assign { target, value } => {
                f(target);
                f(value);
            }
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
            } => {
                f(test);
                f(if_true);
                f(if_false);
            }
            ExprKind::Block { expressions, .. } => expressions.iter().for_each(f),
            ExprKind::Loop { body, .. } => f(body),
            ExprKind::Label { default_value, .. } => default_value.iter().for_each(f),
            ExprKind::Goto { value, .. } => value.iter().for_each(f),
            ExprKind::Switch {
                value,
                cases,
                default_body,
                ..
            } => {
                f(value);
                for case in cases {
                    case.test_values.iter().for_each(&mut *f);
                    f(&case.body);
                }
                default_body.iter().for_each(f);
            }
            ExprKind::Try {
                body,
                handlers,
                finally,
                fault,
            } => {
                f(body);
                for handler in handlers {
                    handler.filter.iter().for_each(&mut *f);
                    f(&handler.body);
                }
                finally.iter().for_each(&mut *f);
                fault.iter().for_each(f);
            }
            ExprKind::Throw(value) => value.iter().for_each(f),
            ExprKind::Call {
                instance,
                arguments,
                ..
            } => {
                instance.iter().for_each(&mut *f);
                arguments.iter().for_each(f);
            }
            ExprKind::Invoke { target, arguments } => {
                f(target);
                arguments.iter().for_each(f);
            }
            ExprKind::New { arguments, .. } => arguments.iter().for_each(f),
            ExprKind::NewArrayInit { items, .. } => items.iter().for_each(f),
            ExprKind::NewArrayBounds { length, .. } => f(length),
            ExprKind::Index {
                object, arguments, ..
            } => {
                f(object);
                arguments.iter().for_each(f);
            }
            ExprKind::Member { object, .. } => object.iter().for_each(f),
            ExprKind::Lambda(lambda) => f(&lambda.body),
            ExprKind::Quote(expr) => f(expr),
        }
    }
}

/// Variables referenced by `expr` that it does not itself define, in order of
/// first reference.
pub fn free_variables(expr: &Expr) -> Vec<ParameterExpr> {
    let mut collector = FreeVariables::default();
    collector.visit(expr);
    collector.found
}

#[derive(Default)]
struct FreeVariables {
    scopes: Vec<Vec<ParameterExpr>>,
    seen: HashSet<ParameterExpr>,
    found: Vec<ParameterExpr>,
}

impl FreeVariables {
    fn reference(&mut self, parameter: &ParameterExpr) {
        let bound = self.scopes.iter().any(|scope| scope.contains(parameter));
        if !bound && self.seen.insert(parameter.clone()) {
            self.found.push(parameter.clone());
        }
    }

    fn scoped(&mut self, variables: &[ParameterExpr], body: impl FnOnce(&mut Self)) {
        self.scopes.push(variables.to_vec());
        body(self);
        self.scopes.pop();
    }

    fn visit(&mut self, expr: &Expr) {
        match expr.kind() {
            ExprKind::Parameter(p) => self.reference(p),
            ExprKind::RuntimeVariables(variables) => {
                variables.iter().for_each(|v| self.reference(v));
            }
            ExprKind::Block {
                variables,
                expressions,
            } => self.scoped(variables, |this| {
                expressions.iter().for_each(|e| this.visit(e));
            }),
            ExprKind::Lambda(lambda) => self.scoped(&lambda.parameters, |this| {
                this.visit(&lambda.body);
            }),
            ExprKind::Try {
                body,
                handlers,
                finally,
                fault,
            } => {
                self.visit(body);
                for handler in handlers {
                    let variables: Vec<_> = handler.variable.iter().cloned().collect();
                    self.scoped(&variables, |this| {
                        if let Some(filter) = &handler.filter {
                            this.visit(filter);
                        }
                        this.visit(&handler.body);
                    });
                }
                finally.iter().chain(fault.iter()).for_each(|e| self.visit(e));
            }
            _ => expr.for_each_child(&mut |child| self.visit(child)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::LambdaExpr;
    use crate::types::Type;

    #[test]
    fn test_free_variables_skip_bound() {
        let x = ParameterExpr::new(Type::I32, "x");
        let y = ParameterExpr::new(Type::I32, "y");
        let z = ParameterExpr::new(Type::I32, "z");
        let inner = LambdaExpr::new(None, vec![y.clone()], Expr::add(y.expr(), x.expr()));
        let body = Expr::block(
            vec![z.clone()],
            vec![
                Expr::assign(z.expr(), x.expr()),
                Expr::lambda(&inner),
                Expr::add(z.expr(), x.expr()),
            ],
        );
        assert_eq!(free_variables(&body), vec![x]);
    }
}
