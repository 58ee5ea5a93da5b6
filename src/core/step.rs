//! Step domain model

use crate::core::config::StepConfig;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// A single shell command inside a stage
#[derive(Debug, Clone)]
pub struct Step {
    /// Optional display name
    pub name: Option<String>,

    /// Command template, may contain `{{ variable }}` placeholders
    pub command: String,

    /// Timeout in seconds
    pub timeout_secs: u64,

    /// Extra environment variables for this command only
    pub env: BTreeMap<String, String>,
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.-]*)\s*\}\}").expect("placeholder regex is valid")
    })
}

/// Replace `{{ name }}` placeholders with values from `variables`.
///
/// Unknown placeholders are left untouched.
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &regex::Captures<'_>| {
            variables
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Names of all placeholders referenced by `template`
pub fn template_placeholders(template: &str) -> Vec<String> {
    placeholder_regex()
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

impl Step {
    /// Create a step from a step config
    pub fn from_config(config: &StepConfig, defaults: &StepDefaults) -> Self {
        match config {
            StepConfig::Command(command) => Step {
                name: None,
                command: command.clone(),
                timeout_secs: defaults.timeout_secs,
                env: BTreeMap::new(),
            },
            StepConfig::Detailed(detailed) => Step {
                name: detailed.name.clone(),
                command: detailed.sh.clone(),
                timeout_secs: detailed.timeout_secs.unwrap_or(defaults.timeout_secs),
                env: detailed.env.clone(),
            },
        }
    }

    /// Render the command with variable substitution
    pub fn render_command(&self, variables: &HashMap<String, String>) -> String {
        render_template(&self.command, variables)
    }

    /// Name shown in output; falls back to the command itself
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.command)
    }
}

#[derive(Debug, Clone)]
pub struct StepDefaults {
    pub timeout_secs: u64,
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: 3600, // 1 hour
        }
    }
}
