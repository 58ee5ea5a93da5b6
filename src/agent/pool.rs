//! Agent pool - exclusive leases on configured agents

use crate::agent::{AgentDescriptor, AgentError, RunnerConfig};
use crate::core::AgentSelector;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
struct AgentSlot {
    descriptor: AgentDescriptor,
    leased: AtomicBool,
}

/// Set of agents a runner may schedule pipelines on
#[derive(Debug, Clone)]
pub struct AgentPool {
    slots: Vec<Arc<AgentSlot>>,
}

impl AgentPool {
    pub fn new(agents: Vec<AgentDescriptor>) -> Self {
        Self {
            slots: agents
                .into_iter()
                .map(|descriptor| {
                    Arc::new(AgentSlot {
                        descriptor,
                        leased: AtomicBool::new(false),
                    })
                })
                .collect(),
        }
    }

    /// Pool with the single local agent
    pub fn local() -> Self {
        Self::new(vec![AgentDescriptor::local()])
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(config.agents.clone())
    }

    /// Lease the first idle agent matching `selector`
    ///
    /// There is no waiting: if every matching agent is busy, or none
    /// matches, the pool reports the selector as unavailable.
    pub fn acquire(&self, selector: &AgentSelector) -> Result<AgentLease, AgentError> {
        for slot in self.slots.iter().filter(|s| s.descriptor.matches(selector)) {
            if slot
                .leased
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                debug!("Leased agent {} for '{}'", slot.descriptor.name, selector);
                return Ok(AgentLease { slot: slot.clone() });
            }
        }
        Err(AgentError::Unavailable(selector.to_string()))
    }

    /// Number of agents not currently leased
    pub fn idle_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| !s.leased.load(Ordering::Acquire))
            .count()
    }
}

impl Default for AgentPool {
    fn default() -> Self {
        Self::local()
    }
}

/// Exclusive use of one agent; released on drop
#[derive(Debug)]
pub struct AgentLease {
    slot: Arc<AgentSlot>,
}

impl AgentLease {
    pub fn descriptor(&self) -> &AgentDescriptor {
        &self.slot.descriptor
    }

    pub fn name(&self) -> &str {
        &self.slot.descriptor.name
    }
}

impl Drop for AgentLease {
    fn drop(&mut self) {
        debug!("Released agent {}", self.slot.descriptor.name);
        self.slot.leased.store(false, Ordering::Release);
    }
}
