//! Scenario-based tests for stage-runner

mod agent_selection;
mod cancel_policy;
mod climada_scenario;
mod success_chain;
