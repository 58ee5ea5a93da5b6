//! Execution state models

use crate::core::{Pipeline, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Overall pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Pipeline has not started
    Pending,
    /// Pipeline is currently running
    Running,
    /// Pipeline completed successfully
    Completed,
    /// Pipeline failed
    Failed,
}

/// Status of a single stage within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    /// Stage has not started
    Pending,
    /// Stage is currently running
    Running,
    /// Every step (or child stage) succeeded
    Success,
    /// A step exited non-zero, timed out, or a child stage failed
    Failed,
    /// Stage never started (earlier failure, or no agent)
    Skipped,
    /// Stage was running when its parallel block was cancelled
    Cancelled,
}

impl StageStatus {
    /// Check if the status is final for this run
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StageStatus::Pending | StageStatus::Running)
    }
}

/// Errors that end a stage or the whole run
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunError {
    #[error("no agent available matching '{selector}'")]
    AgentUnavailable { selector: String },

    #[error("stage '{stage}' failed: `{command}` exited with code {exit_code}")]
    StepFailure {
        stage: String,
        command: String,
        exit_code: i32,
    },

    #[error("stage '{stage}' failed: `{command}` timed out after {timeout_secs} seconds")]
    StepTimeout {
        stage: String,
        command: String,
        timeout_secs: u64,
    },

    #[error("stage '{stage}' failed: could not run `{command}`: {message}")]
    Spawn {
        stage: String,
        command: String,
        message: String,
    },
}

/// Execution record for one stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage id (pre-order position in the pipeline)
    pub id: usize,

    /// Slash-joined stage path
    pub path: String,

    /// Stage name as declared
    pub name: String,

    /// Current status
    pub status: StageStatus,

    /// When the stage started running
    pub started_at: Option<DateTime<Utc>>,

    /// When the stage reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,

    /// Number of steps that were started
    pub steps_run: usize,

    /// Why the stage failed
    pub error: Option<RunError>,

    /// Why the stage was skipped
    pub skip_reason: Option<String>,
}

impl StageRecord {
    /// Create a pending record for a stage
    pub fn pending(stage: &Stage) -> Self {
        Self {
            id: stage.id,
            path: stage.path.clone(),
            name: stage.name.clone(),
            status: StageStatus::Pending,
            started_at: None,
            completed_at: None,
            steps_run: 0,
            error: None,
            skip_reason: None,
        }
    }

    /// Mark the stage as running
    pub fn start(&mut self) {
        self.status = StageStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Mark the stage as successful
    pub fn succeed(&mut self) {
        self.status = StageStatus::Success;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the stage as failed
    pub fn fail(&mut self, error: Option<RunError>) {
        self.status = StageStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = error;
    }

    /// Mark the stage as skipped
    pub fn skip(&mut self, reason: &str) {
        self.status = StageStatus::Skipped;
        self.skip_reason = Some(reason.to_string());
    }

    /// Mark the stage as cancelled
    pub fn cancel(&mut self) {
        self.status = StageStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }

    /// Wall-clock duration, once the stage has finished
    pub fn duration(&self) -> Option<std::time::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => end.signed_duration_since(start).to_std().ok(),
            _ => None,
        }
    }
}

/// Outcome of one pipeline run
///
/// Created when the run starts with one pending record per stage and
/// returned to the caller when the run ends. Nothing here outlives the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique execution ID
    pub execution_id: Uuid,

    /// Pipeline name
    pub pipeline_name: String,

    /// Current execution status
    pub status: ExecutionStatus,

    /// Name of the agent the run was scheduled on
    pub agent: Option<String>,

    /// When execution started
    pub started_at: DateTime<Utc>,

    /// When execution completed/failed
    pub completed_at: Option<DateTime<Utc>>,

    /// First error that failed the run
    pub error: Option<RunError>,

    /// Per-stage records, indexed by stage id
    pub stages: Vec<StageRecord>,
}

impl RunReport {
    /// Create a running report with pending records for every stage
    pub fn start(pipeline: &Pipeline) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            pipeline_name: pipeline.name.clone(),
            status: ExecutionStatus::Running,
            agent: None,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
            stages: pipeline.all_stages().into_iter().map(StageRecord::pending).collect(),
        }
    }

    /// Mark the run as completed
    pub fn complete(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the run as failed, keeping the first error seen
    pub fn fail(&mut self, error: Option<RunError>) {
        self.status = ExecutionStatus::Failed;
        self.completed_at = Some(Utc::now());
        if self.error.is_none() {
            self.error = error;
        }
    }

    /// Whether the run succeeded
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }

    /// Look up a stage record by path
    pub fn stage(&self, path: &str) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.path == path)
    }

    /// Status of a stage by path
    pub fn status_of(&self, path: &str) -> Option<StageStatus> {
        self.stage(path).map(|r| r.status)
    }

    /// Number of stages in the given status
    pub fn count(&self, status: StageStatus) -> usize {
        self.stages.iter().filter(|r| r.status == status).count()
    }

    /// Wall-clock duration of the run
    pub fn duration(&self) -> Option<std::time::Duration> {
        self.completed_at
            .and_then(|end| end.signed_duration_since(self.started_at).to_std().ok())
    }
}
