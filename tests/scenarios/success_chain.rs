//! Test: Success Chain - sequential stages where every step exits 0

use crate::helpers::*;
use stage_runner::core::{ExecutionStatus, StageStatus};

const CHAIN: &str = r#"
name: "Test: Success Chain"

variables:
  target: release

stages:
  - name: checkout
    steps:
      - "git fetch"
      - "git checkout main"
  - name: build
    stages:
      - name: compile
        steps: ["make {{ target }}"]
      - name: package
        steps:
          - sh: "tar czf out.tgz build/"
            name: archive
  - name: publish
    steps: ["upload out.tgz"]
"#;

#[tokio::test]
async fn test_every_stage_succeeds() {
    let report = run_pipeline(CHAIN, ScriptedExecutor::new()).await;

    assert_succeeded(&report);
    assert_eq!(report.status, ExecutionStatus::Completed);
    assert!(report.error.is_none());
    assert_eq!(report.stages.len(), 5);
    assert_eq!(report.count(StageStatus::Success), 5);
    assert!(report.completed_at.is_some());
}

#[tokio::test]
async fn test_steps_run_in_declaration_order() {
    let agent = ScriptedExecutor::new();
    let log = agent.log();
    run_pipeline(CHAIN, agent).await;

    assert_eq!(
        log.scripts(),
        vec![
            "git fetch",
            "git checkout main",
            "make release",
            "tar czf out.tgz build/",
            "upload out.tgz",
        ]
    );
}

#[tokio::test]
async fn test_records_follow_stage_tree() {
    let report = run_pipeline(CHAIN, ScriptedExecutor::new()).await;

    let paths: Vec<&str> = report.stages.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["checkout", "build", "build/compile", "build/package", "publish"]
    );
    assert_eq!(report.stage("checkout").unwrap().steps_run, 2);
    assert_eq!(report.stage("build").unwrap().steps_run, 0);
    for record in &report.stages {
        assert!(record.started_at.is_some(), "{} never started", record.path);
        assert!(record.duration().is_some());
    }
}

#[tokio::test]
async fn test_step_environment_names_the_stage() {
    let yaml = r#"
name: "env-chain"
env:
  CI: "true"
stages:
  - name: build
    env:
      TARGET: release
    stages:
      - name: compile
        steps: ["make"]
"#;
    let agent = ScriptedExecutor::new();
    let log = agent.log();
    let report = run_pipeline(yaml, agent).await;
    assert_succeeded(&report);

    let env = log.env_of("make").unwrap();
    assert_eq!(env.get("CI").map(String::as_str), Some("true"));
    assert_eq!(env.get("TARGET").map(String::as_str), Some("release"));
    assert_eq!(env.get("STAGE_NAME").map(String::as_str), Some("compile"));
    assert_eq!(env.get("STAGE_PATH").map(String::as_str), Some("build/compile"));
    assert_eq!(env.get("PIPELINE_NAME").map(String::as_str), Some("env-chain"));
    assert_eq!(
        env.get("PIPELINE_EXECUTION_ID"),
        Some(&report.execution_id.to_string())
    );
}
