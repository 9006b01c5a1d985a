//! Frame-slot allocation for the lambda being compiled.
//!
//! Every definition of a variable gets its own [`VarId`], so a variable
//! shadowed by an inner block (or a slot reused after its block ends) can be
//! boxed independently. Slots are released in LIFO order when scopes close.

use hashbrown::{HashMap, HashSet};

use crate::expr::ParameterExpr;
use crate::interpreter::{LocalOperand, VarId};

/// Where a variable lives, as seen from the current lambda.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolved {
    Local(LocalOperand),
    /// Index into the closure this lambda receives when it is created.
    Closure(u32),
}

#[derive(Debug, Clone)]
pub(crate) struct LocalDefinition {
    pub operand: LocalOperand,
    pub parameter: ParameterExpr,
}

#[derive(Debug, Default)]
pub(crate) struct LocalVariables {
    /// Active definitions per variable; the last one shadows the rest.
    scopes: HashMap<ParameterExpr, Vec<LocalOperand>>,
    closure_variables: Vec<ParameterExpr>,
    closure_index: HashMap<ParameterExpr, u32>,
    boxed: HashSet<VarId>,
    local_count: usize,
    max_local_count: usize,
    next_var: u32,
}

impl LocalVariables {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> LocalOperand {
        let operand = LocalOperand::new(self.local_count as u32, VarId(self.next_var));
        self.next_var += 1;
        self.local_count += 1;
        self.max_local_count = self.max_local_count.max(self.local_count);
        operand
    }

    pub fn define(&mut self, parameter: &ParameterExpr) -> LocalDefinition {
        let operand = self.allocate();
        self.scopes
            .entry(parameter.clone())
            .or_default()
            .push(operand);
        LocalDefinition {
            operand,
            parameter: parameter.clone(),
        }
    }

    pub fn undefine(&mut self, definition: &LocalDefinition) {
        if let Some(stack) = self.scopes.get_mut(&definition.parameter) {
            stack.pop();
            if stack.is_empty() {
                self.scopes.remove(&definition.parameter);
            }
        }
        self.release(definition.operand);
    }

    /// A slot no expression can name.
    pub fn define_temp(&mut self) -> LocalOperand {
        self.allocate()
    }

    pub fn release(&mut self, operand: LocalOperand) {
        debug_assert_eq!(
            operand.index as usize + 1,
            self.local_count,
            "locals released out of order"
        );
        self.local_count -= 1;
    }

    pub fn lookup(&self, parameter: &ParameterExpr) -> Option<Resolved> {
        if let Some(operand) = self.scopes.get(parameter).and_then(|s| s.last()) {
            return Some(Resolved::Local(*operand));
        }
        self.closure_index
            .get(parameter)
            .map(|&index| Resolved::Closure(index))
    }

    pub fn add_closure_variable(&mut self, parameter: &ParameterExpr) -> u32 {
        if let Some(&index) = self.closure_index.get(parameter) {
            return index;
        }
        let index = self.closure_variables.len() as u32;
        self.closure_variables.push(parameter.clone());
        self.closure_index.insert(parameter.clone(), index);
        index
    }

    pub fn box_variable(&mut self, var: VarId) {
        self.boxed.insert(var);
    }

    pub fn is_boxed(&self, var: VarId) -> bool {
        self.boxed.contains(&var)
    }

    pub fn max_local_count(&self) -> usize {
        self.max_local_count
    }

    /// Variables the enclosing lambda must supply, in closure-slot order.
    pub fn closure_variables(&self) -> &[ParameterExpr] {
        &self.closure_variables
    }
}
