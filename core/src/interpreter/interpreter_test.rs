//! Tests for instruction emission and for running hand-assembled code.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use super::*;
use crate::api::{CompileOptions, Error};
use crate::interpreter::arith::ArithOp;
use crate::interpreter::compare::CompareOp;
use crate::types::{NumericKind, Signature, Type};
use crate::values::Value;

fn local(index: u32) -> LocalOperand {
    LocalOperand::new(index, VarId(index))
}

fn assemble(
    list: InstructionList,
    local_count: usize,
    arg_count: usize,
    by_ref_parameters: Vec<usize>,
    returns_value: bool,
) -> LightLambda {
    let code = list.to_array().unwrap();
    let interpreter = Interpreter {
        name: "assembled".into(),
        code,
        local_count,
        arg_count,
        by_ref_parameters,
        returns_value,
        closure_size: 0,
        debug_infos: Vec::new(),
        options: CompileOptions::default(),
    };
    let signature = Signature::new(vec![Type::I32; arg_count], Type::I32);
    Arc::new(LightDelegateCreator::new(interpreter, signature)).create_delegate(None)
}

fn arith(op: ArithOp) -> Instruction {
    Instruction::Arith {
        op,
        kind: NumericKind::I32,
        checked: false,
    }
}

/// `acc = 0; while (n > 0) { acc += n; n -= 1 } acc`
fn sum_down() -> InstructionList {
    let (n, acc) = (local(0), local(1));
    let mut list = InstructionList::new();
    let top = list.make_label();
    let end = list.make_label();

    list.emit(Instruction::InitParameter(n));
    list.emit_load(Value::I32(0));
    list.emit(Instruction::StoreLocal(acc));
    list.mark_label(top);
    list.emit(Instruction::LoadLocal(n));
    list.emit_load(Value::I32(0));
    list.emit(Instruction::Compare {
        op: CompareOp::Gt,
        kind: Some(NumericKind::I32),
        lifted_to_null: false,
    });
    list.emit_branch_false(end);
    list.emit(Instruction::LoadLocal(acc));
    list.emit(Instruction::LoadLocal(n));
    list.emit(arith(ArithOp::Add));
    list.emit(Instruction::StoreLocal(acc));
    list.emit(Instruction::LoadLocal(n));
    list.emit_load(Value::I32(1));
    list.emit(arith(ArithOp::Sub));
    list.emit(Instruction::StoreLocal(n));
    list.emit_branch(top, false, false);
    list.mark_label(end);
    list.emit(Instruction::LoadLocal(acc));
    list
}

#[test]
fn test_branch_offsets_are_relative() {
    let lambda = assemble(sum_down(), 2, 1, vec![], true);
    let instructions = lambda.interpreter().instructions();
    assert_eq!(instructions[6].to_string(), "BranchFalse +10");
    assert_eq!(instructions[15].to_string(), "Branch -12");
    assert_eq!(lambda.interpreter().max_stack_depth(), 2);
    lambda.interpreter().validate().unwrap();
}

#[test]
fn test_run_assembled_loop() {
    let lambda = assemble(sum_down(), 2, 1, vec![], true);
    assert_eq!(lambda.run(&mut [Value::I32(4)]).unwrap(), Value::I32(10));
    assert_eq!(lambda.run(&mut [Value::I32(0)]).unwrap(), Value::I32(0));
}

#[test]
fn test_frames_are_independent() {
    let lambda = assemble(sum_down(), 2, 1, vec![], true);
    let first = lambda.run(&mut [Value::I32(3)]).unwrap();
    let second = lambda.run(&mut [Value::I32(3)]).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_argument_count_is_checked() {
    let lambda = assemble(sum_down(), 2, 1, vec![], true);
    let err = lambda.run(&mut []).unwrap_err();
    assert!(matches!(err, Error::Api(_)), "{:?}", err);
}

#[test]
fn test_by_ref_parameter_is_written_back() {
    let mut list = InstructionList::new();
    list.emit(Instruction::InitParameter(local(0)));
    list.emit_load(Value::I32(7));
    list.emit(Instruction::StoreLocal(local(0)));
    let lambda = assemble(list, 1, 1, vec![0], false);

    let mut args = [Value::I32(1)];
    assert_eq!(lambda.run(&mut args).unwrap(), Value::Null);
    assert_eq!(args[0], Value::I32(7));
}

#[test]
fn test_unmarked_label_fails_to_freeze() {
    let mut list = InstructionList::new();
    let nowhere = list.make_label();
    list.emit_branch(nowhere, false, false);
    assert_eq!(list.to_array().err(), Some(0));
}

#[test]
fn test_constants_are_pooled_unless_primitive() {
    let mut list = InstructionList::new();
    list.emit_load(Value::I64(5));
    list.emit_load(Value::Null);
    list.emit_load(Value::str("pooled"));
    let code = list.to_array().unwrap();
    let names: Vec<_> = code.instructions.iter().map(Instruction::name).collect();
    assert_eq!(names, vec!["LoadConstant", "LoadConstant", "LoadCached"]);
    assert_eq!(code.objects.len(), 1);
}

#[test]
fn test_branch_with_value_tracks_depth() {
    // cond ? 1 : 2, the shape the compiler emits for a valued conditional
    let mut list = InstructionList::new();
    let else_label = list.make_label();
    let end = list.make_label();
    list.emit_load(Value::Bool(true));
    list.emit_branch_false(else_label);
    list.emit_load(Value::I32(1));
    list.emit_branch(end, false, true);
    assert_eq!(list.current_stack_depth(), 0);
    list.mark_label(else_label);
    list.emit_load(Value::I32(2));
    list.mark_label(end);
    assert_eq!(list.current_stack_depth(), 1);
    assert_eq!(list.max_stack_depth(), 1);
}

#[test]
fn test_resolve_locals_marks_boxed_operands() {
    let mut list = InstructionList::new();
    list.emit(Instruction::InitParameter(local(0)));
    list.emit(Instruction::LoadLocal(local(1)));
    list.emit(Instruction::LoadLocalBox(local(0)));
    list.resolve_locals(|var| var == VarId(0));
    let code = list.to_array().unwrap();
    let listing: Vec<_> = code.instructions.iter().map(ToString::to_string).collect();
    assert_eq!(
        listing,
        vec!["InitParameter 0 (boxed)", "LoadLocal 1", "LoadLocalBox 0 (boxed)"]
    );
}

#[test]
fn test_goto_uses_runtime_label_table() {
    let mut list = InstructionList::new();
    let target = list.make_label();
    list.emit_goto(target, false, false, false);
    list.mark_label(target);
    list.emit(Instruction::Nop);
    let code = list.to_array().unwrap();
    assert_eq!(code.labels.len(), 1);
    assert_eq!(code.labels[0].index, 1);
    assert_eq!(code.disassemble(), "   0  Goto L0\nL0:\n   1  Nop\n");
}
