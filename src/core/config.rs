//! Pipeline configuration from YAML

use crate::core::Pipeline;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Agent the pipeline runs on (`any` or `{ label: ... }`)
    #[serde(default)]
    pub agent: AgentDirective,

    /// Template variables for step commands
    #[serde(default)]
    variables: HashMap<String, Value>,

    /// Environment variables for every step
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Scoped environment activated around the stage tree
    #[serde(default)]
    pub environment: Option<EnvironmentConfig>,

    /// Run options
    #[serde(default)]
    pub options: OptionsConfig,

    /// Top-level stages
    pub stages: Vec<StageConfig>,
}

/// Agent declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentDirective {
    /// Bare keyword; only `any` is accepted
    Keyword(String),
    /// Agent carrying the given label
    Label { label: String },
}

impl Default for AgentDirective {
    fn default() -> Self {
        AgentDirective::Keyword("any".to_string())
    }
}

/// Pipeline-wide options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsConfig {
    /// Default step timeout (in seconds)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// What a parallel block does when one branch fails
    #[serde(default)]
    pub parallel_failure: ParallelFailure,
}

/// Behaviour of a parallel block after one of its branches fails
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParallelFailure {
    /// Let the other branches run to completion
    #[default]
    Finish,
    /// Stop the other branches and kill their processes
    Cancel,
}

/// Environment scope configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentConfig {
    /// Environment name, may use variables
    pub name: String,

    /// Commands that activate the environment
    #[serde(default)]
    pub activate: Vec<StepConfig>,

    /// Commands that deactivate the environment
    #[serde(default)]
    pub deactivate: Vec<StepConfig>,
}

/// Stage configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    /// Stage name (may be empty)
    #[serde(default)]
    pub name: String,

    /// Run even after an earlier stage in the same sequence failed
    #[serde(default)]
    pub always: bool,

    /// Environment variables for every step under this stage
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Shell steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<StepConfig>>,

    /// Child stages run in order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stages: Option<Vec<StageConfig>>,

    /// Child stages run concurrently
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<Vec<StageConfig>>,
}

/// Step configuration: a bare command or a detailed mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepConfig {
    Command(String),
    Detailed(DetailedStepConfig),
}

/// Detailed step configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetailedStepConfig {
    /// Shell command
    pub sh: String,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Timeout for this step (overrides options.timeout_secs)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Extra environment variables
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl StepConfig {
    fn command(&self) -> &str {
        match self {
            StepConfig::Command(command) => command,
            StepConfig::Detailed(detailed) => &detailed.sh,
        }
    }

    fn timeout_secs(&self) -> Option<u64> {
        match self {
            StepConfig::Command(_) => None,
            StepConfig::Detailed(detailed) => detailed.timeout_secs,
        }
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Pipeline name must not be empty");
        }

        match &self.agent {
            AgentDirective::Keyword(keyword) if keyword != "any" => {
                anyhow::bail!(
                    "Unknown agent '{}': use 'any' or a mapping with a 'label'",
                    keyword
                );
            }
            AgentDirective::Label { label } if label.trim().is_empty() => {
                anyhow::bail!("Agent label must not be empty");
            }
            _ => {}
        }

        if self.options.timeout_secs == Some(0) {
            anyhow::bail!("options.timeout_secs must be greater than zero");
        }

        if self.stages.is_empty() {
            anyhow::bail!("Pipeline '{}' has no stages", self.name);
        }

        Self::validate_siblings(&self.stages, "")?;

        if let Some(environment) = &self.environment {
            if environment.name.trim().is_empty() {
                anyhow::bail!("Environment name must not be empty");
            }
            if environment.activate.is_empty() && environment.deactivate.is_empty() {
                anyhow::bail!(
                    "Environment '{}' has neither activate nor deactivate steps",
                    environment.name
                );
            }
            for step in environment.activate.iter().chain(&environment.deactivate) {
                Self::validate_step(step, "environment")?;
            }
        }

        Ok(())
    }

    fn validate_siblings(stages: &[StageConfig], parent: &str) -> Result<()> {
        let mut seen_names = HashSet::new();
        for (index, stage) in stages.iter().enumerate() {
            let label = if stage.name.is_empty() {
                format!("{}#{}", parent, index)
            } else {
                format!("{}{}", parent, stage.name)
            };

            if !stage.name.is_empty() && !seen_names.insert(&stage.name) {
                anyhow::bail!("Duplicate stage name: {}", label);
            }
            if stage.name.contains('/')
                || stage.name.starts_with('@')
                || stage.name.starts_with('#')
            {
                anyhow::bail!(
                    "Stage name '{}' must not contain '/' or start with '@' or '#'",
                    stage.name
                );
            }

            Self::validate_stage(stage, &label)?;
        }
        Ok(())
    }

    fn validate_stage(stage: &StageConfig, label: &str) -> Result<()> {
        let bodies = [
            stage.steps.is_some(),
            stage.stages.is_some(),
            stage.parallel.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count();

        if bodies != 1 {
            anyhow::bail!(
                "Stage '{}' must define exactly one of 'steps', 'stages' or 'parallel'",
                label
            );
        }

        if let Some(steps) = &stage.steps {
            if steps.is_empty() {
                anyhow::bail!("Stage '{}' has an empty 'steps' list", label);
            }
            for step in steps {
                Self::validate_step(step, label)?;
            }
        }

        for children in [&stage.stages, &stage.parallel].into_iter().flatten() {
            if children.is_empty() {
                anyhow::bail!("Stage '{}' has no child stages", label);
            }
            Self::validate_siblings(children, &format!("{}/", label))?;
        }

        Ok(())
    }

    fn validate_step(step: &StepConfig, label: &str) -> Result<()> {
        if step.command().trim().is_empty() {
            anyhow::bail!("Stage '{}' has a step with an empty command", label);
        }
        if step.timeout_secs() == Some(0) {
            anyhow::bail!("Stage '{}' has a step with a zero timeout", label);
        }
        Ok(())
    }

    /// Override a template variable
    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), Value::String(value.into()));
    }

    /// Get variables as string map
    pub fn variables_as_string_map(&self) -> HashMap<String, String> {
        self.variables
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    Value::Bool(b) => b.to_string(),
                    Value::Number(n) => n.to_string(),
                    Value::Null => String::new(),
                    other => serde_yaml::to_string(other)
                        .unwrap_or_default()
                        .trim_end()
                        .to_string(),
                };
                (key.clone(), rendered)
            })
            .collect()
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Pipeline {
        Pipeline::from_config(self)
    }
}
