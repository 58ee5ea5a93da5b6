//! Runner configuration: the agents a pipeline can be scheduled on

use crate::core::AgentSelector;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

fn default_shell() -> String {
    "sh".to_string()
}

/// One execution host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Agent name
    pub name: String,

    /// Labels pipelines can select the agent by
    #[serde(default)]
    pub labels: Vec<String>,

    /// Working directory for every step (defaults to the runner's)
    #[serde(default)]
    pub workdir: Option<PathBuf>,

    /// Shell used to run step commands
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Environment variables for every step on this agent
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl AgentDescriptor {
    /// Create an agent with the default shell and no labels
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: Vec::new(),
            workdir: None,
            shell: default_shell(),
            env: BTreeMap::new(),
        }
    }

    /// The agent the runner uses when nothing is configured
    pub fn local() -> Self {
        Self::new("local").with_label("local").with_label(std::env::consts::OS)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    /// Whether this agent satisfies the selector
    pub fn matches(&self, selector: &AgentSelector) -> bool {
        match selector {
            AgentSelector::Any => true,
            AgentSelector::Label(label) => &self.name == label || self.labels.contains(label),
        }
    }
}

/// Runner configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Available agents, in preference order
    #[serde(default)]
    pub agents: Vec<AgentDescriptor>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            agents: vec![AgentDescriptor::local()],
        }
    }
}

impl RunnerConfig {
    /// Load runner configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse runner configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: RunnerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the runner configuration
    pub fn validate(&self) -> Result<()> {
        if self.agents.is_empty() {
            anyhow::bail!("Runner configuration defines no agents");
        }

        let mut seen = HashSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                anyhow::bail!("Agent name must not be empty");
            }
            if !seen.insert(&agent.name) {
                anyhow::bail!("Duplicate agent name: {}", agent.name);
            }
            if agent.shell.trim().is_empty() {
                anyhow::bail!("Agent '{}' has an empty shell", agent.name);
            }
        }

        Ok(())
    }
}
