//! Test: climada pipeline - activate, parallel lint/unit_test, deactivate
//!
//! `unit_test` exits 1 in every case below. A plain `deactivate` stage
//! follows fail-fast sequencing and is skipped; marking it `always` or
//! declaring an `environment` scope makes it run.

use crate::helpers::*;
use stage_runner::core::{RunError, StageStatus};

const PLAIN: &str = r#"
name: "climada"
agent: any
variables:
  env_name: climada_env
stages:
  - name: activate
    steps: ["conda activate {{ env_name }}"]
  - name: checks
    parallel:
      - name: lint
        steps: ["make lint"]
      - name: unit_test
        steps: ["make unit_test"]
  - name: deactivate
    steps: ["conda deactivate"]
"#;

const TEARDOWN: &str = r#"
name: "climada"
agent: any
variables:
  env_name: climada_env
stages:
  - name: activate
    steps: ["conda activate {{ env_name }}"]
  - name: checks
    parallel:
      - name: lint
        steps: ["make lint"]
      - name: unit_test
        steps: ["make unit_test"]
  - name: deactivate
    always: true
    steps: ["conda deactivate"]
"#;

const SCOPED: &str = r#"
name: "climada"
agent: any
variables:
  env_name: climada_env
environment:
  name: "{{ env_name }}"
  activate: ["conda activate {{ env_name }}"]
  deactivate: ["conda deactivate"]
stages:
  - name: lint
    steps: ["make lint"]
  - name: unit_test
    steps: ["make unit_test"]
"#;

fn failing_unit_test() -> ScriptedExecutor {
    ScriptedExecutor::new().exit("make unit_test", 1)
}

#[tokio::test]
async fn test_plain_deactivate_is_skipped() {
    let agent = failing_unit_test();
    let log = agent.log();
    let report = run_pipeline(PLAIN, agent).await;

    assert_failed(&report);
    assert_stages(
        &report,
        &[
            ("activate", StageStatus::Success),
            ("checks/lint", StageStatus::Success),
            ("checks/unit_test", StageStatus::Failed),
            ("checks", StageStatus::Failed),
            ("deactivate", StageStatus::Skipped),
        ],
    );
    assert!(!log.ran("conda deactivate"));
    assert!(matches!(
        report.error,
        Some(RunError::StepFailure { ref stage, exit_code: 1, .. }) if stage == "checks/unit_test"
    ));
}

#[tokio::test]
async fn test_always_deactivate_still_runs() {
    let agent = failing_unit_test();
    let log = agent.log();
    let report = run_pipeline(TEARDOWN, agent).await;

    assert_failed(&report);
    assert_stages(
        &report,
        &[
            ("activate", StageStatus::Success),
            ("checks/lint", StageStatus::Success),
            ("checks/unit_test", StageStatus::Failed),
            ("deactivate", StageStatus::Success),
        ],
    );
    assert_eq!(log.scripts().first().map(String::as_str), Some("conda activate climada_env"));
    assert_eq!(log.scripts().last().map(String::as_str), Some("conda deactivate"));
}

#[tokio::test]
async fn test_environment_scope_deactivates_after_failure() {
    let agent = failing_unit_test();
    let log = agent.log();
    let report = run_pipeline(SCOPED, agent).await;

    assert_failed(&report);
    assert_stages(
        &report,
        &[
            ("@environment/activate", StageStatus::Success),
            ("lint", StageStatus::Success),
            ("unit_test", StageStatus::Failed),
            ("@environment/deactivate", StageStatus::Success),
        ],
    );
    assert_eq!(
        log.scripts(),
        vec![
            "conda activate climada_env",
            "make lint",
            "make unit_test",
            "conda deactivate",
        ]
    );
}

#[tokio::test]
async fn test_all_green_run() {
    let report = run_pipeline(PLAIN, ScriptedExecutor::new()).await;

    assert_succeeded(&report);
    assert_eq!(report.count(StageStatus::Success), 5);
}
