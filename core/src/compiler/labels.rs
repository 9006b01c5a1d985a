//! Label scopes and jump validation.
//!
//! Every compiled node that can contain labels opens a scope. A jump is
//! valid when walking outward from the jump reaches the label's scope, or,
//! failing that, when the path from the common ancestor down to the label
//! only crosses scopes that can be entered (blocks, statements, switches)
//! and the path up from the jump crosses no finally or filter.

use hashbrown::HashSet;
use smallvec::SmallVec;

use super::error::{label_name, CompileError};
use crate::expr::LabelTarget;
use crate::interpreter::{BranchLabelId, InstructionList};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LabelScopeKind {
    /// Any statement-like node: conditional, loop, goto, label.
    Statement,
    Block,
    Switch,
    Lambda,
    Try,
    Catch,
    Finally,
    Filter,
    /// A value-producing node; its stack state cannot be jumped into.
    Expression,
}

impl LabelScopeKind {
    fn can_jump_into(self) -> bool {
        matches!(
            self,
            LabelScopeKind::Statement
                | LabelScopeKind::Block
                | LabelScopeKind::Switch
                | LabelScopeKind::Lambda
        )
    }
}

pub(crate) type ScopeId = usize;

#[derive(Debug)]
struct LabelScope {
    parent: Option<ScopeId>,
    kind: LabelScopeKind,
    labels: HashSet<LabelTarget>,
}

/// Scope tree of one lambda. Scopes stay allocated after they close so
/// labels can keep referring to them.
#[derive(Debug)]
pub(crate) struct LabelScopes {
    scopes: Vec<LabelScope>,
    current: ScopeId,
}

impl LabelScopes {
    pub fn new() -> Self {
        Self {
            scopes: vec![LabelScope {
                parent: None,
                kind: LabelScopeKind::Lambda,
                labels: HashSet::new(),
            }],
            current: 0,
        }
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    pub fn kind(&self, scope: ScopeId) -> LabelScopeKind {
        self.scopes[scope].kind
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope].parent
    }

    pub fn push(&mut self, kind: LabelScopeKind) {
        self.scopes.push(LabelScope {
            parent: Some(self.current),
            kind,
            labels: HashSet::new(),
        });
        self.current = self.scopes.len() - 1;
    }

    pub fn pop(&mut self) {
        if let Some(parent) = self.scopes[self.current].parent {
            self.current = parent;
        }
    }

    pub fn contains(&self, scope: ScopeId, target: &LabelTarget) -> bool {
        self.scopes[scope].labels.contains(target)
    }

    fn ancestors(&self, scope: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(scope), move |&s| self.scopes[s].parent)
    }
}

/// Compile-time state of one label target within a lambda.
#[derive(Debug)]
pub(crate) struct LabelInfo {
    target: LabelTarget,
    label: Option<BranchLabelId>,
    definitions: SmallVec<[ScopeId; 1]>,
    references: SmallVec<[ScopeId; 2]>,
    across_block_jump: bool,
}

impl LabelInfo {
    pub fn new(target: LabelTarget) -> Self {
        Self {
            target,
            label: None,
            definitions: SmallVec::new(),
            references: SmallVec::new(),
            across_block_jump: false,
        }
    }

    pub fn branch_label(&mut self, instructions: &mut InstructionList) -> BranchLabelId {
        *self.label.get_or_insert_with(|| instructions.make_label())
    }

    pub fn define(&mut self, scopes: &mut LabelScopes, scope: ScopeId) -> Result<(), CompileError> {
        // Labels cannot be shadowed; one active branch label per target.
        if scopes
            .ancestors(scope)
            .any(|s| scopes.contains(s, &self.target))
        {
            return Err(CompileError::LabelTargetAlreadyDefined(label_name(
                &self.target,
            )));
        }
        self.definitions.push(scope);
        scopes.scopes[scope].labels.insert(self.target.clone());

        if self.definitions.len() == 1 {
            let references = self.references.clone();
            for reference in references {
                self.validate_jump(scopes, reference)?;
            }
        } else {
            // Redefined in a sibling scope: earlier cross-block jumps became
            // ambiguous, local ones get a fresh branch label.
            if self.across_block_jump {
                return Err(CompileError::AmbiguousJump(label_name(&self.target)));
            }
            self.label = None;
        }
        Ok(())
    }

    pub fn reference(&mut self, scopes: &LabelScopes, scope: ScopeId) -> Result<(), CompileError> {
        self.references.push(scope);
        if !self.definitions.is_empty() {
            self.validate_jump(scopes, scope)?;
        }
        Ok(())
    }

    fn validate_jump(&mut self, scopes: &LabelScopes, reference: ScopeId) -> Result<(), CompileError> {
        for scope in scopes.ancestors(reference) {
            if self.definitions.contains(&scope) {
                return Ok(());
            }
            if matches!(
                scopes.kind(scope),
                LabelScopeKind::Finally | LabelScopeKind::Filter
            ) {
                break;
            }
        }

        self.across_block_jump = true;
        let name = label_name(&self.target);
        if self.definitions.len() > 1 {
            return Err(CompileError::AmbiguousJump(name));
        }
        if !self.target.ty().is_void() {
            return Err(CompileError::NonLocalJumpWithValue(name));
        }

        let definition = self.definitions[0];
        let definition_path: HashSet<ScopeId> = scopes.ancestors(definition).collect();
        let common = scopes
            .ancestors(reference)
            .find(|s| definition_path.contains(s));

        for scope in scopes.ancestors(reference) {
            if Some(scope) == common {
                break;
            }
            match scopes.kind(scope) {
                LabelScopeKind::Finally => return Err(CompileError::ControlCannotLeaveFinally),
                LabelScopeKind::Filter => return Err(CompileError::ControlCannotLeaveFilterTest),
                _ => {}
            }
        }
        for scope in scopes.ancestors(definition) {
            if Some(scope) == common {
                break;
            }
            let kind = scopes.kind(scope);
            if !kind.can_jump_into() {
                return Err(if kind == LabelScopeKind::Expression {
                    CompileError::ControlCannotEnterExpression(name)
                } else {
                    CompileError::ControlCannotEnterTry(name)
                });
            }
        }
        Ok(())
    }

    /// Checks, once the lambda is fully compiled, that referenced labels
    /// were defined.
    pub fn validate_finish(&self) -> Result<(), CompileError> {
        if !self.references.is_empty() && self.definitions.is_empty() {
            return Err(CompileError::LabelTargetUndefined(label_name(&self.target)));
        }
        Ok(())
    }
}
