//! Step executor - runs the step list of one stage on an agent

use crate::{
    agent::{AgentDescriptor, AgentError, AgentExecutor, ShellCommand},
    core::{PipelineContext, RunError, Stage, Step},
    execution::{EventSink, ExecutionEvent},
};
use std::time::Duration;
use tracing::{debug, error, info};

/// Result of executing a stage's steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Every step exited 0
    Success { steps_run: usize },
    /// A step failed; later steps were not started
    Failed { steps_run: usize, error: RunError },
}

/// Executes the steps of a single stage
pub struct StepExecutor<A> {
    agent: A,
}

impl<A: AgentExecutor> StepExecutor<A> {
    pub fn new(agent: A) -> Self {
        Self { agent }
    }

    /// Run `steps` in order, stopping at the first failure
    pub async fn execute(
        &self,
        stage: &Stage,
        steps: &[Step],
        agent: &AgentDescriptor,
        context: &PipelineContext,
        events: &EventSink,
    ) -> ExecutionResult {
        info!("Executing stage: {} ({} steps)", stage.path, steps.len());

        for (index, step) in steps.iter().enumerate() {
            let script = context.render(step);
            let command = ShellCommand {
                shell: agent.shell.clone(),
                script: script.clone(),
                workdir: agent.workdir.clone(),
                env: context.env_for(step),
                timeout: Duration::from_secs(step.timeout_secs),
            };

            debug!("Step {}/{} of {}: {}", index + 1, steps.len(), stage.path, script);
            events.emit(ExecutionEvent::StepStarted {
                path: stage.path.clone(),
                index,
                total: steps.len(),
                command: script.clone(),
            });

            let error = match self.agent.execute(&command).await {
                Ok(output) => {
                    let combined = output.combined();
                    if !combined.is_empty() {
                        events.emit(ExecutionEvent::StepOutput {
                            path: stage.path.clone(),
                            output: combined,
                        });
                    }
                    if output.success() {
                        continue;
                    }
                    RunError::StepFailure {
                        stage: stage.path.clone(),
                        command: script,
                        exit_code: output.exit_code,
                    }
                }
                Err(AgentError::Timeout(_)) => RunError::StepTimeout {
                    stage: stage.path.clone(),
                    command: script,
                    timeout_secs: step.timeout_secs,
                },
                Err(e) => RunError::Spawn {
                    stage: stage.path.clone(),
                    command: script,
                    message: e.to_string(),
                },
            };

            error!("{}", error);
            return ExecutionResult::Failed {
                steps_run: index + 1,
                error,
            };
        }

        ExecutionResult::Success {
            steps_run: steps.len(),
        }
    }
}
