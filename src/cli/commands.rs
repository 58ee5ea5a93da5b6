//! CLI command definitions

use crate::core::config::ParallelFailure;
use crate::core::AgentSelector;
use clap::Args;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Variable overrides (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub variable: Vec<(String, String)>,

    /// What a parallel block does when one branch fails
    #[arg(long, value_enum)]
    pub parallel_failure: Option<ParallelFailureArg>,

    /// Run on this agent label instead of the one the pipeline declares
    #[arg(long, value_parser = parse_agent)]
    pub agent: Option<AgentSelector>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Validate a pipeline definition
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parallel failure policy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ParallelFailureArg {
    Finish,
    Cancel,
}

impl From<ParallelFailureArg> for ParallelFailure {
    fn from(arg: ParallelFailureArg) -> Self {
        match arg {
            ParallelFailureArg::Finish => ParallelFailure::Finish,
            ParallelFailureArg::Cancel => ParallelFailure::Cancel,
        }
    }
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 || parts[0].is_empty() {
        return Err(format!("Invalid key=value pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

fn parse_agent(s: &str) -> Result<AgentSelector, String> {
    s.parse()
}
