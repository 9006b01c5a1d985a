//! Instruction emission with label fixups and stack-depth tracking.

use std::fmt::Write as _;

use smallvec::SmallVec;
use tracing::trace;

use super::instruction::{Instruction, LocalOperand, VarId};
use crate::values::Value;

/// Where a jump lands: the instruction index plus the operand-stack and
/// continuation-stack depths in effect there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeLabel {
    pub index: usize,
    pub stack_depth: usize,
    pub continuation_stack_depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BranchLabelId(usize);

/// A jump target within one instruction list.
#[derive(Debug, Default)]
struct BranchLabel {
    target: Option<RuntimeLabel>,
    /// Index in the runtime label table, when a `Goto` or handler needs it.
    runtime_index: Option<u32>,
    /// Branches emitted before the label was marked.
    fixups: SmallVec<[usize; 4]>,
}

/// The frozen form of an [`InstructionList`].
#[derive(Debug)]
pub struct InstructionArray {
    pub instructions: Box<[Instruction]>,
    pub objects: Box<[Value]>,
    pub labels: Box<[RuntimeLabel]>,
    pub max_stack_depth: usize,
    pub max_continuation_depth: usize,
    /// `(instruction index, stack depth)` of every marked label.
    marks: Box<[(usize, usize)]>,
}

#[derive(Debug, Default)]
pub struct InstructionList {
    instructions: Vec<Instruction>,
    objects: Vec<Value>,
    labels: Vec<BranchLabel>,
    runtime_labels: Vec<BranchLabelId>,
    current_stack_depth: usize,
    max_stack_depth: usize,
    current_continuations_depth: usize,
    max_continuations_depth: usize,
}

impl InstructionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.instructions.len()
    }

    pub fn current_stack_depth(&self) -> usize {
        self.current_stack_depth
    }

    pub fn current_continuations_depth(&self) -> usize {
        self.current_continuations_depth
    }

    pub fn max_stack_depth(&self) -> usize {
        self.max_stack_depth
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Instruction> {
        self.instructions.get_mut(index)
    }

    fn update_depths(&mut self, instruction: &Instruction) {
        let consumed = instruction.consumed_stack();
        debug_assert!(
            self.current_stack_depth >= consumed,
            "{} underflows the stack at {}",
            instruction.name(),
            self.instructions.len()
        );
        self.current_stack_depth = self.current_stack_depth.saturating_sub(consumed);
        self.current_stack_depth += instruction.produced_stack();
        self.max_stack_depth = self.max_stack_depth.max(self.current_stack_depth);

        self.current_continuations_depth = self
            .current_continuations_depth
            .saturating_sub(instruction.consumed_continuations());
        self.current_continuations_depth += instruction.produced_continuations();
        self.max_continuations_depth = self
            .max_continuations_depth
            .max(self.current_continuations_depth);
    }

    /// Appends an instruction, returning its index.
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        self.update_depths(&instruction);
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    /// Pushes `value`: primitives inline, everything else through the object pool.
    pub fn emit_load(&mut self, value: Value) {
        let inline = value.is_null() || value.numeric_kind().is_some();
        if inline {
            self.emit(Instruction::LoadConstant(value));
        } else {
            let index = self.objects.len() as u32;
            self.objects.push(value);
            self.emit(Instruction::LoadCached(index));
        }
    }

    pub fn emit_pop(&mut self) {
        self.emit(Instruction::Pop);
    }

    // === Labels ===

    pub fn make_label(&mut self) -> BranchLabelId {
        self.labels.push(BranchLabel::default());
        BranchLabelId(self.labels.len() - 1)
    }

    pub fn is_marked(&self, label: BranchLabelId) -> bool {
        self.labels[label.0].target.is_some()
    }

    pub fn mark_label(&mut self, label: BranchLabelId) {
        let target = RuntimeLabel {
            index: self.instructions.len(),
            stack_depth: self.current_stack_depth,
            continuation_stack_depth: self.current_continuations_depth,
        };
        let entry = &mut self.labels[label.0];
        debug_assert!(entry.target.is_none(), "label marked twice");
        entry.target = Some(target);
        let fixups = std::mem::take(&mut entry.fixups);
        for site in fixups {
            trace!(site, target = target.index, "Fixing up branch");
            self.instructions[site].set_offset(target.index as i32 - site as i32);
        }
    }

    /// Index of `label` in the runtime label table, allocating one if needed.
    pub fn runtime_label_index(&mut self, label: BranchLabelId) -> u32 {
        if let Some(index) = self.labels[label.0].runtime_index {
            return index;
        }
        let index = self.runtime_labels.len() as u32;
        self.runtime_labels.push(label);
        self.labels[label.0].runtime_index = Some(index);
        index
    }

    /// Marks a fresh label here and returns its runtime index.
    pub fn mark_runtime_label(&mut self) -> u32 {
        let label = self.make_label();
        self.mark_label(label);
        self.runtime_label_index(label)
    }

    fn emit_branch_to(&mut self, label: BranchLabelId, instruction: Instruction) {
        let site = self.emit(instruction);
        match self.labels[label.0].target {
            Some(target) => {
                self.instructions[site].set_offset(target.index as i32 - site as i32);
            }
            None => self.labels[label.0].fixups.push(site),
        }
    }

    pub fn emit_branch(&mut self, label: BranchLabelId, has_result: bool, has_value: bool) {
        self.emit_branch_to(
            label,
            Instruction::Branch {
                offset: 0,
                has_result,
                has_value,
            },
        );
    }

    pub fn emit_branch_true(&mut self, label: BranchLabelId) {
        self.emit_branch_to(label, Instruction::BranchTrue(0));
    }

    pub fn emit_branch_false(&mut self, label: BranchLabelId) {
        self.emit_branch_to(label, Instruction::BranchFalse(0));
    }

    pub fn emit_coalescing_branch(&mut self, label: BranchLabelId) {
        self.emit_branch_to(label, Instruction::CoalescingBranch(0));
    }

    pub fn emit_goto(
        &mut self,
        label: BranchLabelId,
        has_result: bool,
        has_value: bool,
        label_gets_value: bool,
    ) {
        let label = self.runtime_label_index(label);
        self.emit(Instruction::Goto {
            label,
            has_result,
            has_value,
            label_gets_value,
        });
    }

    /// Fills in the `boxed` bit of every local operand.
    pub fn resolve_locals(&mut self, is_boxed: impl Fn(VarId) -> bool) {
        let mut resolve = |local: &mut LocalOperand| local.boxed = is_boxed(local.var);
        for instruction in &mut self.instructions {
            instruction.for_each_local_mut(&mut resolve);
        }
    }

    /// Freezes the list. Fails with the offending label's index when a label
    /// that jumps refer to was never marked.
    pub fn to_array(self) -> Result<InstructionArray, usize> {
        if let Some(unmarked) = self
            .labels
            .iter()
            .position(|l| l.target.is_none() && (!l.fixups.is_empty() || l.runtime_index.is_some()))
        {
            return Err(unmarked);
        }
        let labels: Box<[RuntimeLabel]> = self
            .runtime_labels
            .iter()
            .filter_map(|id| self.labels[id.0].target)
            .collect();
        let mut marks: Vec<(usize, usize)> = self
            .labels
            .iter()
            .filter_map(|l| l.target.map(|t| (t.index, t.stack_depth)))
            .collect();
        marks.sort_unstable();
        marks.dedup();
        Ok(InstructionArray {
            instructions: self.instructions.into_boxed_slice(),
            objects: self.objects.into_boxed_slice(),
            labels,
            max_stack_depth: self.max_stack_depth,
            max_continuation_depth: self.max_continuations_depth,
            marks: marks.into_boxed_slice(),
        })
    }
}

impl InstructionArray {
    /// Replays the stack effects in instruction order, resetting the depth at
    /// every label, and checks the depth never goes negative nor exceeds the
    /// recorded maximum.
    pub fn validate(&self) -> Result<(), String> {
        let mut depth = 0usize;
        let mut marks = self.marks.iter().peekable();
        for (index, instruction) in self.instructions.iter().enumerate() {
            while let Some(&&(at, label_depth)) = marks.peek() {
                if at > index {
                    break;
                }
                if at == index {
                    depth = label_depth;
                }
                marks.next();
            }
            depth = depth.checked_sub(instruction.consumed_stack()).ok_or_else(|| {
                format!("{}: {} pops an empty stack", index, instruction)
            })?;
            depth += instruction.produced_stack();
            if depth > self.max_stack_depth {
                return Err(format!(
                    "{}: stack depth {} exceeds maximum {}",
                    index, depth, self.max_stack_depth
                ));
            }
        }
        Ok(())
    }

    /// One line per instruction, with label markers.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for (index, instruction) in self.instructions.iter().enumerate() {
            for (label, target) in self.labels.iter().enumerate() {
                if target.index == index {
                    let _ = writeln!(out, "L{}:", label);
                }
            }
            let _ = writeln!(out, "{:4}  {}", index, instruction);
        }
        out
    }
}
