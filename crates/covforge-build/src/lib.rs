//! Build-side collaborators for covforge.
//!
//! - [`GccHarness`] compiles generated tests with `--coverage` and runs them
//! - [`GcovCollector`] gathers gcov listings (and lcov tracefiles) per build directory
//! - [`probe_toolchain`] checks the required tools before a run

pub mod collector;
pub mod harness;
pub mod probe;
pub mod runner;
pub mod toolchain;

pub use collector::GcovCollector;
pub use harness::GccHarness;
pub use probe::{probe_tool, probe_toolchain, ToolchainReport};
pub use runner::{CommandResult, ProcessRunner};
pub use toolchain::{compile_command, CommandConfig, ToolStage};
