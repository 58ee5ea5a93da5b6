//! Main execution engine - orchestrates the entire pipeline run

use crate::{
    agent::{AgentDescriptor, AgentExecutor, AgentPool},
    core::{
        config::ParallelFailure, ExecutionStatus, Pipeline, PipelineContext, RunError, RunReport,
        Stage, StageBody, StageRecord, StageStatus,
    },
    execution::{BranchOutcome, ExecutionResult, ParallelScheduler, StepExecutor},
};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
    },
    AgentAcquired {
        agent: String,
    },
    AgentReleased {
        agent: String,
    },
    StageStarted {
        path: String,
    },
    StepStarted {
        path: String,
        index: usize,
        total: usize,
        command: String,
    },
    StepOutput {
        path: String,
        output: String,
    },
    StageCompleted {
        path: String,
    },
    StageFailed {
        path: String,
        error: Option<String>,
    },
    StageSkipped {
        path: String,
        reason: String,
    },
    StageCancelled {
        path: String,
    },
    PipelineCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Registered event handlers
#[derive(Clone, Default)]
pub struct EventSink {
    handlers: Vec<EventHandler>,
}

impl EventSink {
    /// Register a handler
    pub fn add<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    pub fn emit(&self, event: ExecutionEvent) {
        for handler in &self.handlers {
            handler(event.clone());
        }
    }
}

/// Mutable state of one run, shared by concurrently running branches
struct RunState {
    records: Mutex<Vec<StageRecord>>,
    first_error: Mutex<Option<RunError>>,
    agent: AgentDescriptor,
    scheduler: ParallelScheduler,
}

impl RunState {
    async fn update<F: FnOnce(&mut StageRecord)>(&self, id: usize, f: F) {
        if let Some(record) = self.records.lock().await.get_mut(id) {
            f(record);
        }
    }

    async fn record_error(&self, error: RunError) {
        let mut first = self.first_error.lock().await;
        if first.is_none() {
            *first = Some(error);
        }
    }
}

/// Main pipeline execution engine
pub struct ExecutionEngine<A> {
    pool: AgentPool,
    executor: StepExecutor<A>,
    events: EventSink,
    parallel_failure: Option<ParallelFailure>,
}

impl<A: AgentExecutor> ExecutionEngine<A> {
    pub fn new(agent: A, pool: AgentPool) -> Self {
        Self {
            pool,
            executor: StepExecutor::new(agent),
            events: EventSink::default(),
            parallel_failure: None,
        }
    }

    /// Override the pipeline's parallel failure policy
    pub fn with_parallel_failure(mut self, policy: ParallelFailure) -> Self {
        self.parallel_failure = Some(policy);
        self
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.events.add(handler);
    }

    /// Execute the entire pipeline
    ///
    /// Failures are reported in the returned [`RunReport`], never as a panic
    /// or an early return: the agent lease and the environment scope are
    /// released on every path.
    pub async fn execute(&self, pipeline: &Pipeline) -> RunReport {
        let mut report = RunReport::start(pipeline);
        let execution_id = report.execution_id;

        info!("Starting pipeline execution: {} ({})", pipeline.name, execution_id);
        self.events.emit(ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name: pipeline.name.clone(),
        });

        let lease = match self.pool.acquire(&pipeline.agent) {
            Ok(lease) => lease,
            Err(e) => {
                error!("{}", e);
                for record in report.stages.iter_mut() {
                    record.skip("no agent available");
                }
                report.fail(Some(RunError::AgentUnavailable {
                    selector: pipeline.agent.to_string(),
                }));
                self.finish(&report);
                return report;
            }
        };

        let agent_name = lease.name().to_string();
        info!("Running on agent {}", agent_name);
        report.agent = Some(agent_name.clone());
        self.events.emit(ExecutionEvent::AgentAcquired {
            agent: agent_name.clone(),
        });

        let run = RunState {
            records: Mutex::new(std::mem::take(&mut report.stages)),
            first_error: Mutex::new(None),
            agent: lease.descriptor().clone(),
            scheduler: ParallelScheduler::new(
                self.parallel_failure.unwrap_or(pipeline.parallel_failure),
            ),
        };
        let root = PipelineContext::for_run(pipeline, &run.agent.env, execution_id);

        let activated = match &pipeline.environment {
            Some(environment) => {
                info!("Activating environment {}", environment.name);
                self.run_stage(&run, &environment.activate, root.enter(&environment.activate))
                    .await
            }
            None => true,
        };

        let mut success = if activated {
            self.run_sequence(&run, &pipeline.stages, &root).await
        } else {
            for stage in &pipeline.stages {
                self.skip_subtree(&run, stage, "environment activation failed").await;
            }
            false
        };

        if let Some(environment) = &pipeline.environment {
            if activated {
                info!("Deactivating environment {}", environment.name);
                success &= self
                    .run_stage(&run, &environment.deactivate, root.enter(&environment.deactivate))
                    .await;
            } else {
                self.skip_subtree(&run, &environment.deactivate, "environment was not activated")
                    .await;
            }
        }

        drop(lease);
        self.events.emit(ExecutionEvent::AgentReleased { agent: agent_name });

        report.stages = run.records.into_inner();
        if success {
            report.complete();
        } else {
            report.fail(run.first_error.into_inner());
        }

        info!(
            "Pipeline execution finished: {} - {:?}",
            pipeline.name, report.status
        );
        self.finish(&report);
        report
    }

    fn finish(&self, report: &RunReport) {
        self.events.emit(ExecutionEvent::PipelineCompleted {
            execution_id: report.execution_id,
            status: report.status,
        });
    }

    /// Run stages in order; after a failure only `always` stages run
    async fn run_sequence(&self, run: &RunState, stages: &[Stage], context: &PipelineContext) -> bool {
        let mut success = true;
        for stage in stages {
            if !success && !stage.always {
                self.skip_subtree(run, stage, "an earlier stage failed").await;
                continue;
            }
            if !self.run_stage(run, stage, context.enter(stage)).await {
                success = false;
            }
        }
        success
    }

    /// Run a single stage and everything below it
    fn run_stage<'a>(
        &'a self,
        run: &'a RunState,
        stage: &'a Stage,
        context: PipelineContext,
    ) -> BoxFuture<'a, bool> {
        async move {
            run.update(stage.id, StageRecord::start).await;
            self.events.emit(ExecutionEvent::StageStarted {
                path: stage.path.clone(),
            });

            let outcome: Result<(), Option<RunError>> = match &stage.body {
                StageBody::Steps(steps) => {
                    match self
                        .executor
                        .execute(stage, steps, &run.agent, &context, &self.events)
                        .await
                    {
                        ExecutionResult::Success { steps_run } => {
                            run.update(stage.id, |r| r.steps_run = steps_run).await;
                            Ok(())
                        }
                        ExecutionResult::Failed { steps_run, error } => {
                            run.update(stage.id, |r| r.steps_run = steps_run).await;
                            Err(Some(error))
                        }
                    }
                }
                StageBody::Sequential(children) => {
                    if self.run_sequence(run, children, &context).await {
                        Ok(())
                    } else {
                        Err(None)
                    }
                }
                StageBody::Parallel(children) => {
                    let branches = children
                        .iter()
                        .map(|child| self.run_stage(run, child, context.enter(child)))
                        .collect();
                    let outcomes = run.scheduler.run(branches).await;

                    for (child, outcome) in children.iter().zip(&outcomes) {
                        if *outcome == BranchOutcome::Cancelled {
                            self.cancel_subtree(run, child).await;
                        }
                    }

                    if outcomes.iter().all(|o| *o == BranchOutcome::Succeeded) {
                        Ok(())
                    } else {
                        Err(None)
                    }
                }
            };

            match outcome {
                Ok(()) => {
                    run.update(stage.id, StageRecord::succeed).await;
                    self.events.emit(ExecutionEvent::StageCompleted {
                        path: stage.path.clone(),
                    });
                    true
                }
                Err(error) => {
                    if let Some(error) = &error {
                        run.record_error(error.clone()).await;
                    }
                    let message = error.as_ref().map(ToString::to_string);
                    run.update(stage.id, |r| r.fail(error)).await;
                    self.events.emit(ExecutionEvent::StageFailed {
                        path: stage.path.clone(),
                        error: message,
                    });
                    false
                }
            }
        }
        .boxed()
    }

    /// Mark every pending stage in the subtree as skipped
    async fn skip_subtree(&self, run: &RunState, stage: &Stage, reason: &str) {
        for s in stage.subtree() {
            let mut skipped = false;
            run.update(s.id, |r| {
                if r.status == StageStatus::Pending {
                    r.skip(reason);
                    skipped = true;
                }
            })
            .await;
            if skipped {
                self.events.emit(ExecutionEvent::StageSkipped {
                    path: s.path.clone(),
                    reason: reason.to_string(),
                });
            }
        }
    }

    /// Settle the records of a branch that was dropped mid-run
    async fn cancel_subtree(&self, run: &RunState, stage: &Stage) {
        for s in stage.subtree() {
            let mut status = StageStatus::Pending;
            run.update(s.id, |r| {
                match r.status {
                    StageStatus::Running => r.cancel(),
                    StageStatus::Pending => r.skip("parallel block was cancelled"),
                    _ => {}
                }
                status = r.status;
            })
            .await;
            if status == StageStatus::Cancelled {
                warn!("Stage {} cancelled", s.path);
                self.events.emit(ExecutionEvent::StageCancelled {
                    path: s.path.clone(),
                });
            }
        }
    }
}
