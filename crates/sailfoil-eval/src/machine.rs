//! Machine state: everything a generated program can observe or change.

use sailfoil_mem::{AnyMemory, Memory};

use crate::config::TraceConfig;
use crate::error::{EvalError, EvalResult};
use crate::hooks::{AccessKind, MemoryAccess, NoHooks, TraceHooks};
use crate::value::Value;

/// The model's exception flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExceptionState {
    /// `have_exception`.
    pub pending: bool,
    /// `current_exception`; stays recorded after the flag is cleared.
    pub value: Option<Value>,
    /// `throw_location`.
    pub location: String,
}

/// One simulated machine. Owned by a [`Simulator`](crate::Simulator);
/// independent simulations never share one.
pub struct Machine {
    pub registers: Vec<Value>,
    register_names: Vec<String>,
    pub exception: ExceptionState,
    pub memory: AnyMemory,
    /// Address held by an outstanding load-reserved, if any.
    pub reservation: Option<u64>,
    pub output: Vec<String>,
    pub trace: TraceConfig,
    hooks: Box<dyn TraceHooks>,
}

impl Machine {
    pub(crate) fn new(
        registers: Vec<(String, Value)>,
        memory: AnyMemory,
        trace: TraceConfig,
    ) -> Self {
        let (register_names, registers) = registers.into_iter().unzip();
        Self {
            registers,
            register_names,
            exception: ExceptionState::default(),
            memory,
            reservation: None,
            output: Vec::new(),
            trace,
            hooks: Box::new(NoHooks),
        }
    }

    pub fn set_hooks(&mut self, hooks: Box<dyn TraceHooks>) {
        self.hooks = hooks;
    }

    pub fn hooks_mut(&mut self) -> &mut dyn TraceHooks {
        self.hooks.as_mut()
    }

    pub fn register_index(&self, name: &str) -> Option<usize> {
        self.register_names.iter().position(|n| n == name)
    }

    pub(crate) fn write_register(&mut self, index: usize, value: Value) -> EvalResult<()> {
        let slot = self
            .registers
            .get_mut(index)
            .ok_or_else(|| EvalError::UnknownRegister(format!("#{index}")))?;
        *slot = value;
        self.notify_register(index);
        Ok(())
    }

    pub(crate) fn notify_register(&mut self, index: usize) {
        if !self.trace.print_reg {
            return;
        }
        if let (Some(name), Some(value)) = (self.register_names.get(index), self.registers.get(index)) {
            self.hooks.on_register_write(name, value);
        }
    }

    /// Append a line of program output.
    pub fn print(&mut self, line: String) {
        if self.trace.echo_output {
            println!("{line}");
        }
        self.output.push(line);
    }

    pub fn platform_message(&mut self, message: &str) {
        if self.trace.print_platform {
            self.hooks.on_platform(message);
        }
    }

    // ── Traced memory ────────────────────────────────────────────────

    pub fn read_memory(&mut self, address: u64, width: usize) -> EvalResult<u64> {
        let value = self.memory.read(address, width)?;
        self.notify_access(AccessKind::Read, address, width, value);
        Ok(value)
    }

    pub fn write_memory(&mut self, address: u64, width: usize, value: u64) -> EvalResult<()> {
        self.memory.write(address, width, value)?;
        self.notify_access(AccessKind::Write, address, width, sailfoil_mem::truncate(value, width));
        Ok(())
    }

    fn notify_access(&mut self, kind: AccessKind, address: u64, width: usize, value: u64) {
        if self.trace.print_mem_access {
            self.hooks.on_memory_access(&MemoryAccess {
                kind,
                address,
                width,
                value,
            });
        }
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("registers", &self.registers)
            .field("exception", &self.exception)
            .field("reservation", &self.reservation)
            .field("output", &self.output)
            .field("trace", &self.trace)
            .finish_non_exhaustive()
    }
}
