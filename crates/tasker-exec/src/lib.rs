//! `tasker-exec`: runs task commands through a shell with output capture
//! and an optional kill deadline.

pub mod clip;
pub mod error;
pub mod runner;

pub use error::{ExecError, Result};
pub use runner::{CommandOutput, ShellRunner};
