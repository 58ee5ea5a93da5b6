//! Stage tree model

use crate::core::step::Step;
use serde::Serialize;
use std::collections::BTreeMap;

/// What a stage contains
#[derive(Debug, Clone)]
pub enum StageBody {
    /// Shell steps run in order
    Steps(Vec<Step>),
    /// Child stages run in declaration order
    Sequential(Vec<Stage>),
    /// Child stages run concurrently
    Parallel(Vec<Stage>),
}

/// Kind of stage body, for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Steps,
    Sequential,
    Parallel,
}

/// A named unit of pipeline work
#[derive(Debug, Clone)]
pub struct Stage {
    /// Pre-order position in the pipeline
    pub id: usize,

    /// Declared name (may be empty)
    pub name: String,

    /// Slash-joined path from the root, used in reports
    pub path: String,

    /// Run even when an earlier stage in the same sequence failed
    pub always: bool,

    /// Environment variables for every step under this stage
    pub env: BTreeMap<String, String>,

    /// Stage contents
    pub body: StageBody,
}

impl Stage {
    /// Kind of this stage's body
    pub fn kind(&self) -> StageKind {
        match self.body {
            StageBody::Steps(_) => StageKind::Steps,
            StageBody::Sequential(_) => StageKind::Sequential,
            StageBody::Parallel(_) => StageKind::Parallel,
        }
    }

    /// Child stages (empty for a steps stage)
    pub fn children(&self) -> &[Stage] {
        match &self.body {
            StageBody::Steps(_) => &[],
            StageBody::Sequential(children) | StageBody::Parallel(children) => children,
        }
    }

    /// This stage and all descendants, pre-order
    pub fn subtree(&self) -> Vec<&Stage> {
        let mut out = vec![self];
        for child in self.children() {
            out.extend(child.subtree());
        }
        out
    }

    /// Number of steps in this stage and its descendants
    pub fn step_count(&self) -> usize {
        match &self.body {
            StageBody::Steps(steps) => steps.len(),
            StageBody::Sequential(children) | StageBody::Parallel(children) => {
                children.iter().map(Stage::step_count).sum()
            }
        }
    }
}

/// Path segment for a stage; unnamed stages are addressed by sibling index
pub fn path_segment(name: &str, index: usize) -> String {
    if name.is_empty() {
        format!("#{}", index)
    } else {
        name.to_string()
    }
}

/// Join a parent path and a segment
pub fn join_path(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else {
        format!("{}/{}", parent, segment)
    }
}
