//! Test: Cancel Policy - a failing branch cancels its running siblings

use crate::helpers::*;
use stage_runner::agent::AgentPool;
use stage_runner::core::config::ParallelFailure;
use stage_runner::core::StageStatus;
use stage_runner::execution::ExecutionEngine;
use std::time::{Duration, Instant};

const CANCEL: &str = r#"
name: "Test: Cancel"
options:
  parallel_failure: cancel
stages:
  - name: checks
    parallel:
      - name: lint
        steps: ["make lint"]
      - name: integration
        stages:
          - name: start
            steps: ["docker compose up"]
          - name: run
            steps: ["pytest integration"]
  - name: cleanup
    always: true
    steps: ["docker compose down"]
"#;

fn slow_integration() -> ScriptedExecutor {
    ScriptedExecutor::new()
        .exit("make lint", 1)
        .delay("make lint", 20)
        .delay("docker compose up", 5_000)
}

#[tokio::test]
async fn test_running_sibling_is_cancelled() {
    let agent = slow_integration();
    let log = agent.log();

    let started = Instant::now();
    let report = run_pipeline(CANCEL, agent).await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_failed(&report);
    assert_stages(
        &report,
        &[
            ("checks", StageStatus::Failed),
            ("checks/lint", StageStatus::Failed),
            ("checks/integration", StageStatus::Cancelled),
            ("checks/integration/start", StageStatus::Cancelled),
            ("checks/integration/run", StageStatus::Skipped),
            ("cleanup", StageStatus::Success),
        ],
    );
    assert!(!log.ran("pytest integration"));
    assert_all_terminal(&report);
}

#[tokio::test]
async fn test_finished_sibling_keeps_its_status() {
    let agent = ScriptedExecutor::new()
        .exit("pytest integration", 1)
        .delay("pytest integration", 50);
    let report = run_pipeline(CANCEL, agent).await;

    // lint finished before the failure and is not rewritten
    assert_stage(&report, "checks/lint", StageStatus::Success);
    assert_stage(&report, "checks/integration", StageStatus::Failed);
    assert_eq!(report.count(StageStatus::Cancelled), 0);
}

#[tokio::test]
async fn test_engine_override_beats_pipeline_option() {
    let pipeline = pipeline(CANCEL);
    assert_eq!(pipeline.parallel_failure, ParallelFailure::Cancel);

    let agent = ScriptedExecutor::new()
        .exit("make lint", 1)
        .delay("docker compose up", 100);
    let log = agent.log();
    let engine = ExecutionEngine::new(agent, AgentPool::local())
        .with_parallel_failure(ParallelFailure::Finish);
    let report = engine.execute(&pipeline).await;

    assert_failed(&report);
    assert_stages(
        &report,
        &[
            ("checks/lint", StageStatus::Failed),
            ("checks/integration", StageStatus::Success),
            ("checks/integration/run", StageStatus::Success),
        ],
    );
    assert!(log.ran("pytest integration"));
}
