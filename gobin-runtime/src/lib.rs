//! Process runtime: signal handling, task wiring and tracing setup.

mod error;
mod runtime;
pub mod shutdown;

pub use error::RuntimeError;
pub use runtime::{init_tracing, run, run_pipeline, start_blocking, LogFormat, RunReport};
pub use shutdown::{ShutdownCoordinator, SignalSet, TerminationKind};
