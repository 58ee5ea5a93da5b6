//! Pipeline context - variables and environment scoped to a stage

use crate::core::{Pipeline, Stage, Step};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Execution context for a stage
///
/// Built once per run from the pipeline and agent, then narrowed with
/// [`PipelineContext::enter`] as the runner walks down the stage tree so that
/// each stage sees its ancestors' environment variables plus its own.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Template variables
    pub variables: HashMap<String, String>,

    /// Environment variables passed to every step
    pub env: BTreeMap<String, String>,
}

impl PipelineContext {
    /// Create the root context for a run
    pub fn for_run(
        pipeline: &Pipeline,
        agent_env: &BTreeMap<String, String>,
        execution_id: Uuid,
    ) -> Self {
        let mut env = agent_env.clone();
        env.extend(pipeline.env.clone());
        env.insert("PIPELINE_NAME".to_string(), pipeline.name.clone());
        env.insert("PIPELINE_EXECUTION_ID".to_string(), execution_id.to_string());
        if let Some(environment) = &pipeline.environment {
            env.insert("PIPELINE_ENVIRONMENT".to_string(), environment.name.clone());
        }

        Self {
            variables: pipeline.variables.clone(),
            env,
        }
    }

    /// Context for a child stage
    pub fn enter(&self, stage: &Stage) -> Self {
        let mut env = self.env.clone();
        env.extend(stage.env.clone());
        env.insert("STAGE_NAME".to_string(), stage.name.clone());
        env.insert("STAGE_PATH".to_string(), stage.path.clone());

        Self {
            variables: self.variables.clone(),
            env,
        }
    }

    /// Render a step's command
    pub fn render(&self, step: &Step) -> String {
        step.render_command(&self.variables)
    }

    /// Environment for a step: stage environment plus the step's own
    pub fn env_for(&self, step: &Step) -> BTreeMap<String, String> {
        let mut env = self.env.clone();
        env.extend(step.env.clone());
        env
    }
}
