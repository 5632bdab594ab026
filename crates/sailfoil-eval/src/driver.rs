//! The top-level step loop.
//!
//! The driver calls the model's step function once per iteration. A step
//! that returns `true` retired an instruction; every `insns_per_tick`
//! retirements the tick functions run (timers, platform devices). The loop
//! ends when the done register reads true, when the instruction limit is
//! reached, or when a step leaves an exception pending.

use serde::{Deserialize, Serialize};

use sailfoil_codegen::Ty;

use crate::error::{EvalError, EvalResult};
use crate::exec::Simulator;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub step_function: String,
    pub tick_functions: Vec<String>,
    pub insns_per_tick: u64,
    /// Zero means no limit.
    pub insn_limit: u64,
    /// A `%bool` register the model sets when the program has finished.
    pub done_register: Option<String>,
    /// Passed to the retire hook.
    pub pc_register: Option<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            step_function: "zstep".into(),
            tick_functions: Vec::new(),
            insns_per_tick: 100,
            insn_limit: 100_000,
            done_register: None,
            pc_register: None,
        }
    }
}

impl DriverConfig {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Done,
    InsnLimit,
    /// A step returned with the exception flag still set.
    UncaughtException,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub retired: u64,
    pub steps: u64,
    pub ticks: u64,
    pub stop: StopReason,
}

pub struct Driver {
    config: DriverConfig,
}

impl Driver {
    pub fn new(config: DriverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Run until a stop condition. Host errors end the run with `Err`.
    pub fn run(&self, sim: &mut Simulator) -> EvalResult<RunSummary> {
        let step_arg = self.step_argument(sim)?;
        let mut summary = RunSummary {
            retired: 0,
            steps: 0,
            ticks: 0,
            stop: StopReason::Done,
        };
        let mut since_tick = 0u64;

        loop {
            if self.is_done(sim)? {
                summary.stop = StopReason::Done;
                break;
            }
            if self.config.insn_limit != 0 && summary.retired >= self.config.insn_limit {
                tracing::warn!(
                    limit = self.config.insn_limit,
                    "stopped at instruction limit"
                );
                summary.stop = StopReason::InsnLimit;
                break;
            }

            let arg = match step_arg {
                StepArg::Count => Value::Int(i64::try_from(summary.retired).unwrap_or(i64::MAX)),
                StepArg::Unit => Value::Unit,
            };
            let stepped = sim.call(&self.config.step_function, vec![arg])?.as_bool()?;
            summary.steps += 1;
            if sim.have_exception() {
                tracing::debug!(
                    location = %sim.machine().exception.location,
                    "step raised an uncaught exception"
                );
                summary.stop = StopReason::UncaughtException;
                break;
            }

            if stepped {
                summary.retired += 1;
                since_tick += 1;
                self.retire(sim, summary.retired);
            }
            if since_tick >= self.config.insns_per_tick && self.config.insns_per_tick != 0 {
                since_tick = 0;
                summary.ticks += 1;
                for tick in &self.config.tick_functions {
                    sim.call(tick, vec![Value::Unit])?;
                }
                tracing::trace!(ticks = summary.ticks, "tick");
            }
        }

        tracing::debug!(
            retired = summary.retired,
            steps = summary.steps,
            ticks = summary.ticks,
            stop = ?summary.stop,
            "driver stopped"
        );
        Ok(summary)
    }

    fn step_argument(&self, sim: &Simulator) -> EvalResult<StepArg> {
        let name = &self.config.step_function;
        let (_, function) = sim
            .program()
            .function(name)
            .ok_or_else(|| EvalError::UnknownFunction(name.clone()))?;
        let param = match function.params.as_slice() {
            [param] => function.locals.get(param.index()).map(|l| &l.ty),
            params => {
                return Err(EvalError::ArityMismatch {
                    name: name.clone(),
                    expected: 1,
                    found: params.len(),
                })
            }
        };
        match param {
            Some(Ty::Int) => Ok(StepArg::Count),
            Some(Ty::Unit) => Ok(StepArg::Unit),
            _ => Err(EvalError::TypeMismatch(format!(
                "step function '{name}' must take an int or unit"
            ))),
        }
    }

    fn is_done(&self, sim: &Simulator) -> EvalResult<bool> {
        let Some(name) = &self.config.done_register else {
            return Ok(false);
        };
        sim.register(name)
            .ok_or_else(|| EvalError::UnknownRegister(name.clone()))?
            .as_bool()
    }

    fn retire(&self, sim: &mut Simulator, retired: u64) {
        let machine = sim.machine_mut();
        if !machine.trace.print_instr {
            return;
        }
        let pc = self
            .config
            .pc_register
            .as_deref()
            .and_then(|name| machine.register_index(name))
            .and_then(|i| machine.registers.get(i))
            .cloned();
        machine.hooks_mut().on_retire(retired, pc.as_ref());
    }
}

#[derive(Clone, Copy)]
enum StepArg {
    Count,
    Unit,
}
