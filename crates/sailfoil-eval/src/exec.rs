//! Block-graph execution.
//!
//! [`Simulator`] owns a linked program and its [`Machine`]; each call runs
//! in an [`Executor`] that walks basic blocks until a terminator leaves the
//! function. Operands are side-effect free, so evaluation order inside one
//! operation is not observable.

use sailfoil_codegen::{
    BasicBlock, Callee, FuncId, FunctionDef, Op, Operand, Place, PlaceRoot, PrimOp, Program,
    Terminator, UnionId,
};

use crate::config::SimConfig;
use crate::error::{EvalError, EvalResult};
use crate::hooks::TraceHooks;
use crate::loader::{self, Image, LoadReport};
use crate::machine::Machine;
use crate::support::{self, Builtin};
use crate::value::Value;

// ══════════════════════════════════════════════════════════════════════════════
// Simulator
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct Simulator {
    program: Program,
    /// Indexed by `ExternId`.
    externs: Vec<&'static Builtin>,
    machine: Machine,
    max_call_depth: usize,
}

impl Simulator {
    /// Link `program` against the support library and build a fresh machine.
    pub fn new(program: Program, config: SimConfig) -> EvalResult<Self> {
        let externs = program
            .externs
            .iter()
            .map(|def| {
                let builtin = support::lookup(&def.symbol)
                    .ok_or_else(|| EvalError::UnknownExtern(def.symbol.clone()))?;
                if builtin.arity != def.params.len() {
                    return Err(EvalError::ArityMismatch {
                        name: def.name.clone(),
                        expected: builtin.arity,
                        found: def.params.len(),
                    });
                }
                Ok(builtin)
            })
            .collect::<EvalResult<Vec<_>>>()?;

        let registers = program
            .registers
            .iter()
            .map(|r| Ok((r.name.clone(), Value::default_for(&program, &r.ty)?)))
            .collect::<EvalResult<Vec<_>>>()?;

        tracing::debug!(
            externs = externs.len(),
            registers = registers.len(),
            functions = program.functions.len(),
            memory = ?config.memory,
            "linked program"
        );

        let machine = Machine::new(registers, config.memory.build()?, config.trace);
        Ok(Self {
            program,
            externs,
            machine,
            max_call_depth: config.max_call_depth,
        })
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    pub fn set_hooks(&mut self, hooks: Box<dyn TraceHooks>) {
        self.machine.set_hooks(hooks);
    }

    /// Call a function by name. A model exception does not make this fail:
    /// it returns the type default with [`Simulator::have_exception`] set.
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> EvalResult<Value> {
        let (id, _) = self
            .program
            .function(name)
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
        let mut executor = Executor {
            program: &self.program,
            externs: &self.externs,
            machine: &mut self.machine,
            max_depth: self.max_call_depth,
            depth: 0,
        };
        executor.call(id, args)
    }

    pub fn register(&self, name: &str) -> Option<&Value> {
        let index = self.machine.register_index(name)?;
        self.machine.registers.get(index)
    }

    pub fn set_register(&mut self, name: &str, value: Value) -> EvalResult<()> {
        let index = self
            .machine
            .register_index(name)
            .ok_or_else(|| EvalError::UnknownRegister(name.to_string()))?;
        self.machine.write_register(index, value)
    }

    pub fn output(&self) -> &[String] {
        &self.machine.output
    }

    pub fn have_exception(&self) -> bool {
        self.machine.exception.pending
    }

    /// Copy an image into this machine's memory.
    pub fn load_image(&mut self, image: &Image) -> EvalResult<LoadReport> {
        Ok(loader::load_image(&mut self.machine.memory, image)?)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Executor
// ══════════════════════════════════════════════════════════════════════════════

struct Frame {
    locals: Vec<Value>,
    ret: Value,
}

impl Frame {
    fn local(&self, index: usize) -> EvalResult<&Value> {
        self.locals
            .get(index)
            .ok_or_else(|| EvalError::TypeMismatch(format!("no local #{index}")))
    }

    fn local_mut(&mut self, index: usize) -> EvalResult<&mut Value> {
        self.locals
            .get_mut(index)
            .ok_or_else(|| EvalError::TypeMismatch(format!("no local #{index}")))
    }
}

/// Runs calls against one machine. Lives for a single top-level call.
struct Executor<'a> {
    program: &'a Program,
    externs: &'a [&'static Builtin],
    machine: &'a mut Machine,
    max_depth: usize,
    depth: usize,
}

impl<'a> Executor<'a> {
    fn call(&mut self, id: FuncId, args: Vec<Value>) -> EvalResult<Value> {
        let program = self.program;
        let function = program
            .functions
            .get(id.index())
            .ok_or_else(|| EvalError::UnknownFunction(format!("#{}", id.0)))?;
        if args.len() != function.params.len() {
            return Err(EvalError::ArityMismatch {
                name: function.name.clone(),
                expected: function.params.len(),
                found: args.len(),
            });
        }
        if self.depth >= self.max_depth {
            return Err(EvalError::CallDepthExceeded(self.max_depth));
        }
        self.depth += 1;
        let result = self.run(function, args);
        self.depth -= 1;
        result
    }

    fn run(&mut self, function: &'a FunctionDef, args: Vec<Value>) -> EvalResult<Value> {
        let mut frame = Frame {
            locals: function
                .locals
                .iter()
                .map(|l| Value::default_for(self.program, &l.ty))
                .collect::<EvalResult<_>>()?,
            ret: Value::default_for(self.program, &function.ret)?,
        };
        for (param, arg) in function.params.iter().zip(args) {
            *frame.local_mut(param.index())? = arg;
        }

        let mut current = function.entry;
        loop {
            let block: &BasicBlock = function.blocks.get(current.index()).ok_or_else(|| {
                EvalError::Unreachable {
                    location: format!("{}: missing block bb{}", function.name, current.0),
                }
            })?;
            for op in &block.ops {
                self.exec_op(function, &mut frame, op)?;
            }
            match &block.terminator {
                Terminator::Goto(next) => current = *next,
                Terminator::Branch {
                    cond,
                    then_block,
                    else_block,
                } => {
                    current = if self.eval(&frame, cond)?.as_bool()? {
                        *then_block
                    } else {
                        *else_block
                    };
                }
                Terminator::Return => return Ok(frame.ret),
                Terminator::Arbitrary => return Value::default_for(self.program, &function.ret),
                Terminator::Unreachable { location } => {
                    return Err(EvalError::Unreachable {
                        location: location.clone(),
                    })
                }
            }
        }
    }

    fn exec_op(&mut self, function: &FunctionDef, frame: &mut Frame, op: &Op) -> EvalResult<()> {
        match op {
            Op::Declare { local } => {
                let ty = &function
                    .locals
                    .get(local.index())
                    .ok_or_else(|| EvalError::TypeMismatch(format!("no local #{}", local.0)))?
                    .ty;
                *frame.local_mut(local.index())? = Value::default_for(self.program, ty)?;
            }
            Op::Assign { dest, value } => {
                let value = self.eval(frame, value)?;
                self.store(frame, dest, value)?;
            }
            Op::Call { dest, callee, args } => {
                let args = args
                    .iter()
                    .map(|a| self.eval(frame, a))
                    .collect::<EvalResult<Vec<_>>>()?;
                let result = match callee {
                    Callee::Function(id) => self.call(*id, args)?,
                    Callee::Extern(id) => {
                        let builtin = *self.externs.get(id.index()).ok_or_else(|| {
                            EvalError::UnknownExtern(format!("#{}", id.0))
                        })?;
                        builtin.call(&mut *self.machine, &args)?
                    }
                };
                if let Some(dest) = dest {
                    self.store(frame, dest, result)?;
                }
            }
        }
        Ok(())
    }

    // ── Places ───────────────────────────────────────────────────────

    fn store(&mut self, frame: &mut Frame, place: &Place, value: Value) -> EvalResult<()> {
        match place.root {
            PlaceRoot::Local(id) => assign_path(frame.local_mut(id.index())?, &place.path, value),
            PlaceRoot::Return => assign_path(&mut frame.ret, &place.path, value),
            PlaceRoot::Register(id) => {
                let slot = self
                    .machine
                    .registers
                    .get_mut(id.index())
                    .ok_or_else(|| EvalError::UnknownRegister(format!("#{}", id.0)))?;
                assign_path(slot, &place.path, value)?;
                self.machine.notify_register(id.index());
                Ok(())
            }
            PlaceRoot::CurrentException => {
                let exception = &mut self.machine.exception;
                if place.path.is_empty() {
                    exception.value = Some(value);
                    return Ok(());
                }
                let slot = exception
                    .value
                    .as_mut()
                    .ok_or(EvalError::NoPendingException)?;
                assign_path(slot, &place.path, value)
            }
            PlaceRoot::HaveException => {
                self.machine.exception.pending = value.as_bool()?;
                Ok(())
            }
            PlaceRoot::ThrowLocation => {
                self.machine.exception.location = value.as_str()?.to_string();
                Ok(())
            }
        }
    }

    // ── Operands ─────────────────────────────────────────────────────

    fn eval(&self, frame: &Frame, operand: &Operand) -> EvalResult<Value> {
        let value = match operand {
            Operand::Const(c) => Value::from_const(c),
            Operand::Local(id) => frame.local(id.index())?.clone(),
            Operand::Register(id) => self
                .machine
                .registers
                .get(id.index())
                .cloned()
                .ok_or_else(|| EvalError::UnknownRegister(format!("#{}", id.0)))?,
            Operand::HaveException => Value::Bool(self.machine.exception.pending),
            Operand::CurrentException => self
                .machine
                .exception
                .value
                .clone()
                .ok_or(EvalError::NoPendingException)?,
            Operand::ThrowLocation => Value::Str(self.machine.exception.location.clone()),
            Operand::Prim { op, args } => self.prim(frame, *op, args)?,
            Operand::IsVariant { value, union, tag } => {
                let value = self.eval(frame, value)?;
                let held = self.union_tag(&value, *union)?;
                Value::Bool(held == *tag)
            }
            Operand::AsVariant { value, union, tag } => {
                let value = self.eval(frame, value)?;
                let held = self.union_tag(&value, *union)?;
                if held != *tag {
                    return Err(EvalError::VariantMismatch {
                        expected: self.variant_name(*union, *tag),
                        found: self.variant_name(*union, held),
                    });
                }
                match value {
                    Value::Union(u) => u.payload,
                    other => other,
                }
            }
            Operand::Field { value, index } => self.eval(frame, value)?.field(*index)?.clone(),
            Operand::Tuple(items) => Value::Tuple(
                items
                    .iter()
                    .map(|item| self.eval(frame, item))
                    .collect::<EvalResult<_>>()?,
            ),
            Operand::Construct {
                union,
                tag,
                payload,
            } => Value::union(*union, *tag, self.eval(frame, payload)?),
        };
        Ok(value)
    }

    fn prim(&self, frame: &Frame, op: PrimOp, args: &[Operand]) -> EvalResult<Value> {
        if args.len() != op.arity() {
            return Err(EvalError::ArityMismatch {
                name: format!("@{}", op.name()),
                expected: op.arity(),
                found: args.len(),
            });
        }
        let arg = |i: usize| self.eval(frame, &args[i]);
        let result = match op {
            PrimOp::Not => !arg(0)?.as_bool()?,
            PrimOp::And => arg(0)?.as_bool()? && arg(1)?.as_bool()?,
            PrimOp::Or => arg(0)?.as_bool()? || arg(1)?.as_bool()?,
            PrimOp::Eq => arg(0)? == arg(1)?,
            PrimOp::Neq => arg(0)? != arg(1)?,
        };
        Ok(Value::Bool(result))
    }

    fn union_tag(&self, value: &Value, union: UnionId) -> EvalResult<u32> {
        let held = value.as_union()?;
        if held.union != union {
            return Err(EvalError::TypeMismatch(format!(
                "expected union {}, found union {}",
                self.union_name(union),
                self.union_name(held.union)
            )));
        }
        Ok(held.tag)
    }

    fn union_name(&self, union: UnionId) -> String {
        self.program
            .unions
            .get(union.index())
            .map_or_else(|| format!("#{}", union.0), |u| u.name.clone())
    }

    fn variant_name(&self, union: UnionId, tag: u32) -> String {
        self.program
            .unions
            .get(union.index())
            .and_then(|u| u.variant(tag))
            .map_or_else(|| format!("#{tag}"), |v| v.name.clone())
    }
}

fn assign_path(slot: &mut Value, path: &[u32], value: Value) -> EvalResult<()> {
    let mut target = slot;
    for index in path {
        target = target.field_mut(*index)?;
    }
    *target = value;
    Ok(())
}
