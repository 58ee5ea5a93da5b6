//! Pipeline domain model

use crate::core::{
    config::{AgentDirective, EnvironmentConfig, ParallelFailure, PipelineConfig, StageConfig},
    stage::{join_path, path_segment, Stage, StageBody},
    step::{render_template, template_placeholders, Step, StepDefaults},
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Report path of the environment activation stage
pub const ENVIRONMENT_ACTIVATE_PATH: &str = "@environment/activate";

/// Report path of the environment deactivation stage
pub const ENVIRONMENT_DEACTIVATE_PATH: &str = "@environment/deactivate";

/// Which agent a pipeline may run on
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AgentSelector {
    /// Any available agent
    #[default]
    Any,
    /// An agent carrying this label
    Label(String),
}

impl fmt::Display for AgentSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentSelector::Any => write!(f, "any"),
            AgentSelector::Label(label) => write!(f, "{}", label),
        }
    }
}

impl std::str::FromStr for AgentSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err("agent label must not be empty".to_string()),
            "any" => Ok(AgentSelector::Any),
            label => Ok(AgentSelector::Label(label.to_string())),
        }
    }
}

/// Scoped environment: activated before the stage tree, deactivated after it
#[derive(Debug, Clone)]
pub struct EnvironmentScope {
    /// Environment name (rendered)
    pub name: String,

    /// Activation steps
    pub activate: Stage,

    /// Deactivation steps, run whenever activation succeeded
    pub deactivate: Stage,
}

/// A pipeline definition
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Agent the run must be scheduled on
    pub agent: AgentSelector,

    /// Template variables for step commands
    pub variables: HashMap<String, String>,

    /// Environment variables for every step
    pub env: BTreeMap<String, String>,

    /// Optional activation/deactivation scope around the stage tree
    pub environment: Option<EnvironmentScope>,

    /// What a parallel block does when one branch fails
    pub parallel_failure: ParallelFailure,

    /// Top-level stages, run in order
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        let defaults = StepDefaults {
            timeout_secs: config
                .options
                .timeout_secs
                .unwrap_or(StepDefaults::default().timeout_secs),
        };

        let mut next_id = 0;
        let stages = config
            .stages
            .iter()
            .enumerate()
            .map(|(index, stage)| build_stage(stage, index, "", &mut next_id, &defaults))
            .collect();

        let variables = config.variables_as_string_map();
        let environment = config
            .environment
            .as_ref()
            .map(|env| build_environment(env, &variables, &mut next_id, &defaults));

        Pipeline {
            name: config.name.clone(),
            agent: match &config.agent {
                AgentDirective::Keyword(_) => AgentSelector::Any,
                AgentDirective::Label { label } => AgentSelector::Label(label.clone()),
            },
            variables,
            env: config.env.clone(),
            environment,
            parallel_failure: config.options.parallel_failure,
            stages,
        }
    }

    /// All stages in id order: the stage tree pre-order, then the
    /// environment activation and deactivation stages
    pub fn all_stages(&self) -> Vec<&Stage> {
        let mut out: Vec<&Stage> = self.stages.iter().flat_map(Stage::subtree).collect();
        if let Some(environment) = &self.environment {
            out.push(&environment.activate);
            out.push(&environment.deactivate);
        }
        out
    }

    /// Get a stage by path
    pub fn stage(&self, path: &str) -> Option<&Stage> {
        self.all_stages().into_iter().find(|s| s.path == path)
    }

    /// Total number of steps in the stage tree
    pub fn step_count(&self) -> usize {
        self.stages.iter().map(Stage::step_count).sum()
    }

    /// Placeholders referenced by commands or the environment name that have
    /// no variable defined
    pub fn undefined_variables(&self) -> Vec<String> {
        // The environment name is rendered at build time; unknown
        // placeholders survive rendering verbatim
        let mut templates: Vec<&str> = self
            .environment
            .iter()
            .map(|environment| environment.name.as_str())
            .collect();
        for stage in self.all_stages() {
            if let StageBody::Steps(steps) = &stage.body {
                templates.extend(steps.iter().map(|step| step.command.as_str()));
            }
        }

        let mut missing = BTreeSet::new();
        for template in templates {
            for name in template_placeholders(template) {
                if !self.variables.contains_key(&name) {
                    missing.insert(name);
                }
            }
        }
        missing.into_iter().collect()
    }
}

fn build_stage(
    config: &StageConfig,
    index: usize,
    parent_path: &str,
    next_id: &mut usize,
    defaults: &StepDefaults,
) -> Stage {
    let id = *next_id;
    *next_id += 1;
    let path = join_path(parent_path, &path_segment(&config.name, index));

    let mut children = |configs: &[StageConfig]| -> Vec<Stage> {
        configs
            .iter()
            .enumerate()
            .map(|(i, child)| build_stage(child, i, &path, next_id, defaults))
            .collect()
    };

    let body = if let Some(parallel) = &config.parallel {
        StageBody::Parallel(children(parallel))
    } else if let Some(stages) = &config.stages {
        StageBody::Sequential(children(stages))
    } else {
        let steps = config.steps.as_deref().unwrap_or_default();
        StageBody::Steps(steps.iter().map(|s| Step::from_config(s, defaults)).collect())
    };

    Stage {
        id,
        name: config.name.clone(),
        path,
        always: config.always,
        env: config.env.clone(),
        body,
    }
}

fn build_environment(
    config: &EnvironmentConfig,
    variables: &HashMap<String, String>,
    next_id: &mut usize,
    defaults: &StepDefaults,
) -> EnvironmentScope {
    let mut scope_stage = |name: &str, path: &str, steps: &[crate::core::config::StepConfig]| {
        let id = *next_id;
        *next_id += 1;
        Stage {
            id,
            name: name.to_string(),
            path: path.to_string(),
            always: true,
            env: BTreeMap::new(),
            body: StageBody::Steps(steps.iter().map(|s| Step::from_config(s, defaults)).collect()),
        }
    };

    EnvironmentScope {
        name: render_template(&config.name, variables),
        activate: scope_stage("activate", ENVIRONMENT_ACTIVATE_PATH, &config.activate),
        deactivate: scope_stage("deactivate", ENVIRONMENT_DEACTIVATE_PATH, &config.deactivate),
    }
}
