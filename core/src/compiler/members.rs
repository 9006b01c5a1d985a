//! Calls, object creation, member access and assignment.

use std::sync::Arc;

use smallvec::SmallVec;

use super::error::CompileError;
use super::light_compiler::LightCompiler;
use super::locals::Resolved;
use crate::expr::{Expr, ExprKind, Member, MethodInfo, PropertyInfo};
use crate::interpreter::{ByRefUpdater, Instruction, LocalOperand, WriteBack};
use crate::types::ClassInfo;

/// Temps holding the evaluated parts of by-reference locations; released
/// together, in reverse, once the write-backs have been emitted.
type Temps = SmallVec<[LocalOperand; 4]>;

impl LightCompiler {
    fn release_temps(&mut self, temps: Temps) {
        for temp in temps.into_iter().rev() {
            self.locals.release(temp);
        }
    }

    /// Evaluates `expr` into a fresh temp.
    fn stash(&mut self, expr: &Expr, temps: &mut Temps) -> Result<LocalOperand, CompileError> {
        self.compile(expr)?;
        let temp = self.locals.define_temp();
        temps.push(temp);
        self.instructions.emit(Instruction::StoreLocal(temp));
        Ok(temp)
    }

    fn compile_receiver(&mut self, object: Option<&Expr>, member: &str) -> Result<(), CompileError> {
        let object = object.ok_or_else(|| {
            CompileError::Unsupported(format!("instance member '{}' accessed without a receiver", member))
        })?;
        self.compile(object)
    }

    /// Keeps a copy of the value on top of the stack when the assignment's
    /// result is used.
    fn keep_value(&mut self, as_void: bool) -> Option<LocalOperand> {
        if as_void {
            return None;
        }
        let temp = self.locals.define_temp();
        self.instructions.emit(Instruction::AssignLocal(temp));
        Some(temp)
    }

    fn restore_value(&mut self, kept: Option<LocalOperand>) {
        if let Some(temp) = kept {
            self.instructions.emit(Instruction::LoadLocal(temp));
            self.locals.release(temp);
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Compiles one argument. A by-reference argument that names a storage
    /// location gets an updater writing the callee's final value back.
    fn compile_argument(
        &mut self,
        argument: &Expr,
        by_ref: bool,
        arg_index: usize,
        temps: &mut Temps,
        updaters: &mut Vec<ByRefUpdater>,
    ) -> Result<(), CompileError> {
        if !by_ref {
            return self.compile(argument);
        }
        if let Some(write_back) = self.compile_address(argument, temps)? {
            updaters.push(ByRefUpdater {
                arg_index,
                write_back,
            });
        }
        Ok(())
    }

    pub(super) fn compile_call(
        &mut self,
        method: &Arc<MethodInfo>,
        instance: Option<&Expr>,
        arguments: &[Expr],
    ) -> Result<(), CompileError> {
        let offset = usize::from(!method.is_static);
        if !method.is_static {
            self.compile_receiver(instance, &method.name)?;
        }

        let mut temps = Temps::new();
        let mut updaters = Vec::new();
        for (i, argument) in arguments.iter().enumerate() {
            let by_ref = method.parameters.get(i).is_some_and(|p| p.by_ref);
            self.compile_argument(argument, by_ref, offset + i, &mut temps, &mut updaters)?;
        }

        self.instructions.emit(Instruction::Call {
            method: method.clone(),
            arg_count: (offset + arguments.len()) as u32,
            updaters: (!updaters.is_empty()).then(|| updaters.into_boxed_slice()),
            null_result: None,
        });
        self.release_temps(temps);
        Ok(())
    }

    pub(super) fn compile_invoke(
        &mut self,
        expr: &Expr,
        target: &Expr,
        arguments: &[Expr],
    ) -> Result<(), CompileError> {
        self.compile(target)?;
        let by_ref: Vec<bool> = target
            .ty()
            .signature()
            .map(|signature| signature.by_ref.clone())
            .unwrap_or_default();

        let mut temps = Temps::new();
        let mut updaters = Vec::new();
        for (i, argument) in arguments.iter().enumerate() {
            let by_ref = by_ref.get(i).copied().unwrap_or(false);
            self.compile_argument(argument, by_ref, i, &mut temps, &mut updaters)?;
        }

        self.instructions.emit(Instruction::Invoke {
            arg_count: arguments.len() as u32,
            has_result: !expr.ty().is_void(),
            updaters: (!updaters.is_empty()).then(|| updaters.into_boxed_slice()),
        });
        self.release_temps(temps);
        Ok(())
    }

    pub(super) fn compile_new(
        &mut self,
        class: &Arc<ClassInfo>,
        constructor: Option<&Arc<MethodInfo>>,
        arguments: &[Expr],
    ) -> Result<(), CompileError> {
        if class.is_abstract() {
            return Err(CompileError::AbstractConstruction(class.name().to_string()));
        }
        for argument in arguments {
            self.compile(argument)?;
        }
        self.instructions.emit(Instruction::New {
            class: class.clone(),
            constructor: constructor.cloned(),
            arg_count: arguments.len() as u32,
        });
        Ok(())
    }

    // ========================================================================
    // Member access
    // ========================================================================

    fn getter(property: &PropertyInfo) -> Result<&Arc<MethodInfo>, CompileError> {
        property.getter.as_ref().ok_or_else(|| {
            CompileError::Unsupported(format!("property '{}' has no getter", property.name))
        })
    }

    fn setter(property: &PropertyInfo) -> Result<&Arc<MethodInfo>, CompileError> {
        property.setter.as_ref().ok_or_else(|| {
            CompileError::Unsupported(format!("property '{}' has no setter", property.name))
        })
    }

    fn emit_accessor_call(&mut self, method: &Arc<MethodInfo>) {
        self.instructions.emit(Instruction::Call {
            method: method.clone(),
            arg_count: method.arg_count() as u32,
            updaters: None,
            null_result: None,
        });
    }

    pub(super) fn compile_index(
        &mut self,
        object: &Expr,
        indexer: Option<&Arc<PropertyInfo>>,
        arguments: &[Expr],
    ) -> Result<(), CompileError> {
        match indexer {
            None => {
                let [index] = arguments else {
                    return Err(CompileError::Unsupported(
                        "arrays with more than one dimension".into(),
                    ));
                };
                self.compile(object)?;
                self.compile(index)?;
                self.instructions.emit(Instruction::GetArrayItem);
            }
            Some(indexer) => {
                let getter = Self::getter(indexer)?;
                if !getter.is_static {
                    self.compile(object)?;
                }
                for argument in arguments {
                    self.compile(argument)?;
                }
                self.emit_accessor_call(getter);
            }
        }
        Ok(())
    }

    pub(super) fn compile_member(
        &mut self,
        object: Option<&Expr>,
        member: &Member,
    ) -> Result<(), CompileError> {
        match member {
            Member::Field(field) => {
                if !field.is_static() {
                    self.compile_receiver(object, field.name())?;
                }
                self.instructions.emit(Instruction::LoadField(field.clone()));
            }
            Member::Property(property) => {
                let getter = Self::getter(property)?;
                if !getter.is_static {
                    self.compile_receiver(object, &property.name)?;
                }
                self.emit_accessor_call(getter);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    pub(super) fn compile_assign(
        &mut self,
        target: &Expr,
        value: &Expr,
        as_void: bool,
    ) -> Result<(), CompileError> {
        match target.kind() {
            ExprKind::Parameter(parameter) => {
                self.compile(value)?;
                self.compile_set_variable(parameter, as_void)
            }
            ExprKind::Index {
                object,
                indexer: None,
                arguments,
            } => {
                let [index] = arguments.as_slice() else {
                    return Err(CompileError::Unsupported(
                        "arrays with more than one dimension".into(),
                    ));
                };
                self.compile(object)?;
                self.compile(index)?;
                self.compile(value)?;
                let kept = self.keep_value(as_void);
                self.instructions.emit(Instruction::SetArrayItem);
                self.restore_value(kept);
                Ok(())
            }
            ExprKind::Index {
                object,
                indexer: Some(indexer),
                arguments,
            } => self.compile_property_assign(Some(object), indexer, arguments, value, as_void),
            ExprKind::Member {
                object,
                member: Member::Property(property),
            } => self.compile_property_assign(object.as_ref(), property, &[], value, as_void),
            ExprKind::Member {
                object,
                member: Member::Field(field),
            } => {
                if field.is_static() {
                    self.compile(value)?;
                    if !as_void {
                        self.instructions.emit(Instruction::Dup);
                    }
                    self.instructions.emit(Instruction::StoreField(field.clone()));
                    return Ok(());
                }

                let object = object.as_ref().ok_or_else(|| {
                    CompileError::Unsupported(format!(
                        "instance field '{}' assigned without a receiver",
                        field.name()
                    ))
                })?;
                if object.ty().is_value_type() {
                    // The struct is rebuilt with the new field and stored
                    // back into the location it was read from.
                    let mut temps = Temps::new();
                    let write_back = self.compile_address(object, &mut temps)?;
                    self.compile(value)?;
                    let kept = self.keep_value(as_void);
                    self.instructions
                        .emit(Instruction::SetStructField(field.clone()));
                    match write_back {
                        Some(write_back) => {
                            self.instructions
                                .emit(Instruction::StoreByRef(Box::new(write_back)));
                        }
                        None => self.instructions.emit_pop(),
                    }
                    self.restore_value(kept);
                    self.release_temps(temps);
                } else {
                    self.compile(object)?;
                    self.compile(value)?;
                    let kept = self.keep_value(as_void);
                    self.instructions.emit(Instruction::StoreField(field.clone()));
                    self.restore_value(kept);
                }
                Ok(())
            }
            _ => Err(CompileError::NotAnLvalue(target.kind().name())),
        }
    }

    fn compile_property_assign(
        &mut self,
        object: Option<&Expr>,
        property: &PropertyInfo,
        arguments: &[Expr],
        value: &Expr,
        as_void: bool,
    ) -> Result<(), CompileError> {
        let setter = Self::setter(property)?;
        if !setter.is_static {
            self.compile_receiver(object, &property.name)?;
        }
        for argument in arguments {
            self.compile(argument)?;
        }
        self.compile(value)?;
        let kept = self.keep_value(as_void);
        self.emit_accessor_call(setter);
        self.restore_value(kept);
        Ok(())
    }

    /// Pushes the current value of `expr` and, when `expr` is a storage
    /// location, returns how to write a new value back to it. The parts of
    /// the location (array, index, receiver) are evaluated once, into temps.
    pub(super) fn compile_address(
        &mut self,
        expr: &Expr,
        temps: &mut Temps,
    ) -> Result<Option<WriteBack>, CompileError> {
        match expr.kind() {
            ExprKind::Parameter(parameter) => {
                let resolved = self.resolve(parameter)?;
                Ok(Some(match resolved {
                    Resolved::Local(local) => {
                        self.instructions.emit(Instruction::LoadLocal(local));
                        WriteBack::Local(local)
                    }
                    Resolved::Closure(index) => {
                        self.instructions.emit(Instruction::LoadClosure(index));
                        WriteBack::Closure(index)
                    }
                }))
            }
            ExprKind::Index {
                object,
                indexer: None,
                arguments,
            } if arguments.len() == 1 => {
                let array = self.stash(object, temps)?;
                let index = self.stash(&arguments[0], temps)?;
                self.instructions.emit(Instruction::LoadLocal(array));
                self.instructions.emit(Instruction::LoadLocal(index));
                self.instructions.emit(Instruction::GetArrayItem);
                Ok(Some(WriteBack::ArrayElement { array, index }))
            }
            ExprKind::Index {
                object,
                indexer: Some(indexer),
                arguments,
            } if indexer.getter.is_some() && indexer.setter.is_some() => {
                self.compile_property_address(Some(object), indexer, arguments, temps)
            }
            ExprKind::Member {
                object,
                member: Member::Property(property),
            } if property.getter.is_some() && property.setter.is_some() => {
                self.compile_property_address(object.as_ref(), property, &[], temps)
            }
            ExprKind::Member {
                object,
                member: Member::Field(field),
            } => {
                if field.is_static() {
                    self.instructions.emit(Instruction::LoadField(field.clone()));
                    return Ok(Some(WriteBack::Field {
                        object: None,
                        field: field.clone(),
                        parent: None,
                    }));
                }
                let Some(object) = object else {
                    return Err(CompileError::Unsupported(format!(
                        "instance field '{}' accessed without a receiver",
                        field.name()
                    )));
                };
                // A struct receiver must itself be written back once updated.
                let parent = if object.ty().is_value_type() {
                    self.compile_address(object, temps)?
                } else {
                    self.compile(object)?;
                    None
                };
                let receiver = self.locals.define_temp();
                temps.push(receiver);
                self.instructions.emit(Instruction::AssignLocal(receiver));
                self.instructions.emit(Instruction::LoadField(field.clone()));
                Ok(Some(WriteBack::Field {
                    object: Some(receiver),
                    field: field.clone(),
                    parent: parent.map(Box::new),
                }))
            }
            _ => {
                self.compile(expr)?;
                Ok(None)
            }
        }
    }

    fn compile_property_address(
        &mut self,
        object: Option<&Expr>,
        property: &PropertyInfo,
        arguments: &[Expr],
        temps: &mut Temps,
    ) -> Result<Option<WriteBack>, CompileError> {
        let getter = Self::getter(property)?.clone();
        let setter = Self::setter(property)?.clone();

        let receiver = if getter.is_static {
            None
        } else {
            let object = object.ok_or_else(|| {
                CompileError::Unsupported(format!(
                    "instance property '{}' accessed without a receiver",
                    property.name
                ))
            })?;
            Some(self.stash(object, temps)?)
        };
        let mut stashed: SmallVec<[LocalOperand; 2]> = SmallVec::new();
        for argument in arguments {
            stashed.push(self.stash(argument, temps)?);
        }

        if let Some(receiver) = receiver {
            self.instructions.emit(Instruction::LoadLocal(receiver));
        }
        for argument in &stashed {
            self.instructions.emit(Instruction::LoadLocal(*argument));
        }
        self.emit_accessor_call(&getter);

        Ok(Some(WriteBack::Property {
            setter,
            object: receiver,
            arguments: stashed,
        }))
    }
}
