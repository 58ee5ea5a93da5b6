//! stage-runner - A declarative CI pipeline runner

pub mod agent;
pub mod cli;
pub mod core;
pub mod execution;

// Re-export commonly used types
pub use agent::{AgentDescriptor, AgentError, AgentExecutor, AgentPool, CommandOutput, RunnerConfig};
pub use agent::{ShellCommand, ShellExecutor};
pub use core::{ExecutionStatus, Pipeline, RunError, RunReport, StageRecord, StageStatus};
pub use execution::{ExecutionEngine, ExecutionEvent, ParallelScheduler};
