//! Agents: where step commands run

pub mod config;
pub mod pool;
pub mod response;
pub mod shell;

use async_trait::async_trait;
pub use config::{AgentDescriptor, RunnerConfig};
pub use pool::{AgentLease, AgentPool};
pub use response::{AgentError, CommandOutput};
pub use shell::ShellExecutor;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// A fully resolved command ready to run on an agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    /// Shell binary (`sh`, `bash`, ...)
    pub shell: String,

    /// Script passed to `<shell> -c`
    pub script: String,

    /// Working directory
    pub workdir: Option<PathBuf>,

    /// Environment variables added to the process
    pub env: BTreeMap<String, String>,

    /// Kill the process after this long
    pub timeout: Duration,
}

/// Trait for command execution - allows for different implementations
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Run a command to completion and capture its exit code and output
    async fn execute(&self, command: &ShellCommand) -> Result<CommandOutput, AgentError>;
}
