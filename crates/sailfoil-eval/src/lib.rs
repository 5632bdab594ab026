//! sailfoil runtime: executes a generated [`Program`](sailfoil_codegen::Program).
//!
//! A [`Simulator`] links the program's externs against the [`support`]
//! library, gives every register its type default and owns one [`Machine`].
//! Memory goes through the backend selected by [`SimConfig::memory`].
//! The [`Driver`] runs the model's step function in a loop with periodic
//! ticks.
//!
//! Model exceptions are data: a raise sets `have_exception` and
//! `current_exception` in the machine, and the program's own branches
//! decide what happens next. Only host failures surface as [`EvalError`].

pub mod config;
pub mod driver;
pub mod error;
pub mod exec;
pub mod hooks;
pub mod loader;
pub mod machine;
pub mod support;
pub mod value;

pub use config::{SimConfig, TraceConfig};
pub use driver::{Driver, DriverConfig, RunSummary, StopReason};
pub use error::{EvalError, EvalResult};
pub use exec::Simulator;
pub use hooks::{AccessKind, MemoryAccess, NoHooks, TraceHooks};
pub use loader::{load_image, Image, LoadReport, Section};
pub use machine::{ExceptionState, Machine};
pub use value::{UnionValue, Value};
