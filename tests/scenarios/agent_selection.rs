//! Test: Agent Selection - runs are scheduled only on matching idle agents

use crate::helpers::*;
use stage_runner::core::{RunError, StageStatus};

const ON_GPU: &str = r#"
name: "Test: GPU"
agent:
  label: gpu
stages:
  - name: train
    steps: ["python train.py"]
  - name: evaluate
    parallel:
      - name: metrics
        steps: ["python eval.py"]
"#;

#[tokio::test]
async fn test_runs_on_labelled_agent() {
    let pool = pool_of(&[("cpu-1", "linux"), ("gpu-1", "linux gpu")]);
    let report = run_pipeline_on(ON_GPU, ScriptedExecutor::new(), pool).await;

    assert_succeeded(&report);
    assert_eq!(report.agent.as_deref(), Some("gpu-1"));
}

#[tokio::test]
async fn test_agent_name_is_a_selector() {
    let yaml = ON_GPU.replace("label: gpu", "label: cpu-1");
    let pool = pool_of(&[("cpu-1", "linux"), ("gpu-1", "gpu")]);
    let report = run_pipeline_on(&yaml, ScriptedExecutor::new(), pool).await;

    assert_eq!(report.agent.as_deref(), Some("cpu-1"));
}

#[tokio::test]
async fn test_no_matching_agent_short_circuits() {
    let agent = ScriptedExecutor::new();
    let log = agent.log();
    let pool = pool_of(&[("cpu-1", "linux")]);
    let report = run_pipeline_on(ON_GPU, agent, pool).await;

    assert_failed(&report);
    assert_eq!(
        report.error,
        Some(RunError::AgentUnavailable {
            selector: "gpu".to_string()
        })
    );
    assert_eq!(log.count(), 0);
    assert!(report.agent.is_none());
    assert_eq!(report.count(StageStatus::Skipped), report.stages.len());
    for record in &report.stages {
        assert!(record.started_at.is_none());
    }
}

#[tokio::test]
async fn test_busy_agent_is_unavailable() {
    let pool = pool_of(&[("gpu-1", "gpu")]);
    let _held = pool.acquire(&"gpu".parse().unwrap()).unwrap();

    let agent = ScriptedExecutor::new();
    let log = agent.log();
    let report = run_pipeline_on(ON_GPU, agent, pool.clone()).await;

    assert!(matches!(report.error, Some(RunError::AgentUnavailable { .. })));
    assert_eq!(log.count(), 0);
    assert_eq!(pool.idle_count(), 0);
}

#[tokio::test]
async fn test_lease_released_after_failed_run() {
    let pool = pool_of(&[("gpu-1", "gpu")]);
    let agent = ScriptedExecutor::new().exit("python train.py", 1);
    let report = run_pipeline_on(ON_GPU, agent, pool.clone()).await;

    assert_failed(&report);
    assert_eq!(pool.idle_count(), 1);

    // The same agent can take the next run
    let report = run_pipeline_on(ON_GPU, ScriptedExecutor::new(), pool).await;
    assert_succeeded(&report);
}

#[tokio::test]
async fn test_empty_pool_rejects_any() {
    let yaml = "name: p\nagent: any\nstages:\n  - name: a\n    steps: [\"true\"]\n";
    let report = run_pipeline_on(yaml, ScriptedExecutor::new(), pool_of(&[])).await;

    assert_eq!(
        report.error,
        Some(RunError::AgentUnavailable {
            selector: "any".to_string()
        })
    );
}
