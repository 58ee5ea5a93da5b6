//! Test utility functions for stage-runner

#![allow(dead_code)]

use async_trait::async_trait;
use stage_runner::agent::{AgentDescriptor, AgentError, AgentExecutor, AgentPool, CommandOutput, ShellCommand};
use stage_runner::core::config::PipelineConfig;
use stage_runner::core::{Pipeline, RunReport, StageStatus};
use stage_runner::execution::ExecutionEngine;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

/// Shared record of every command a [`ScriptedExecutor`] was asked to run
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<ShellCommand>>>,
}

impl CallLog {
    fn push(&self, command: &ShellCommand) {
        self.calls.lock().unwrap().push(command.clone());
    }

    /// Scripts in the order they were started
    pub fn scripts(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|c| c.script.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn ran(&self, script: &str) -> bool {
        self.scripts().iter().any(|s| s == script)
    }

    /// Environment the first call of `script` was started with
    pub fn env_of(&self, script: &str) -> Option<BTreeMap<String, String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.script == script)
            .map(|c| c.env.clone())
    }
}

/// Mock agent: scripted exit codes and delays per command, everything else exits 0
#[derive(Default)]
pub struct ScriptedExecutor {
    exit_codes: HashMap<String, i32>,
    delays: HashMap<String, Duration>,
    rendezvous: Option<(HashSet<String>, Arc<Barrier>)>,
    log: CallLog,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// `script` exits with `code`
    pub fn exit(mut self, script: &str, code: i32) -> Self {
        self.exit_codes.insert(script.to_string(), code);
        self
    }

    /// `script` takes `ms` milliseconds before it exits
    pub fn delay(mut self, script: &str, ms: u64) -> Self {
        self.delays.insert(script.to_string(), Duration::from_millis(ms));
        self
    }

    /// Every listed script blocks until all of them are running at once
    pub fn rendezvous(mut self, scripts: &[&str]) -> Self {
        let barrier = Arc::new(Barrier::new(scripts.len()));
        self.rendezvous = Some((scripts.iter().map(|s| s.to_string()).collect(), barrier));
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

#[async_trait]
impl AgentExecutor for ScriptedExecutor {
    async fn execute(&self, command: &ShellCommand) -> Result<CommandOutput, AgentError> {
        self.log.push(command);

        if let Some((scripts, barrier)) = &self.rendezvous {
            if scripts.contains(&command.script) {
                barrier.wait().await;
            }
        }

        if let Some(delay) = self.delays.get(&command.script) {
            tokio::time::sleep(*delay).await;
        }

        let code = self.exit_codes.get(&command.script).copied().unwrap_or(0);
        Ok(CommandOutput::with_exit_code(code))
    }
}

/// Parse a pipeline, panicking on invalid YAML
pub fn pipeline(yaml: &str) -> Pipeline {
    PipelineConfig::from_yaml(yaml)
        .expect("pipeline YAML should be valid")
        .to_pipeline()
}

/// Run a pipeline on the local agent
pub async fn run_pipeline<A: AgentExecutor>(yaml: &str, agent: A) -> RunReport {
    run_pipeline_on(yaml, agent, AgentPool::local()).await
}

/// Run a pipeline on a custom agent pool
pub async fn run_pipeline_on<A: AgentExecutor>(yaml: &str, agent: A, pool: AgentPool) -> RunReport {
    let pipeline = pipeline(yaml);
    let engine = ExecutionEngine::new(agent, pool);
    tokio::time::timeout(Duration::from_secs(10), engine.execute(&pipeline))
        .await
        .expect("pipeline run should not hang")
}

/// Pool of labelled agents: `(name, "label label ...")`
pub fn pool_of(agents: &[(&str, &str)]) -> AgentPool {
    AgentPool::new(
        agents
            .iter()
            .map(|(name, labels)| {
                labels
                    .split_whitespace()
                    .fold(AgentDescriptor::new(*name), |agent, label| agent.with_label(label))
            })
            .collect(),
    )
}

// ============================================================================
// Assertions
// ============================================================================

pub fn assert_succeeded(report: &RunReport) {
    assert!(
        report.is_success(),
        "expected the run to succeed, got {:?} ({:?})",
        report.status,
        report.error
    );
}

pub fn assert_failed(report: &RunReport) {
    assert!(
        !report.is_success(),
        "expected the run to fail, got {:?}",
        report.status
    );
}

pub fn assert_stage(report: &RunReport, path: &str, expected: StageStatus) {
    let actual = report
        .status_of(path)
        .unwrap_or_else(|| panic!("no stage with path '{}'", path));
    assert_eq!(actual, expected, "status of stage '{}'", path);
}

pub fn assert_stages(report: &RunReport, expected: &[(&str, StageStatus)]) {
    for (path, status) in expected {
        assert_stage(report, path, *status);
    }
}

/// Every stage ended in a final status
pub fn assert_all_terminal(report: &RunReport) {
    for record in &report.stages {
        assert!(
            record.status.is_terminal(),
            "stage '{}' left in {:?}",
            record.path,
            record.status
        );
    }
}
