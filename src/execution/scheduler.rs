//! Parallel scheduler - runs the branches of a parallel block

use crate::core::config::ParallelFailure;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, warn};

/// How one branch of a parallel block ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchOutcome {
    Succeeded,
    Failed,
    /// Dropped before it finished because a sibling failed
    Cancelled,
}

/// Runs the branches of a parallel block concurrently
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelScheduler {
    policy: ParallelFailure,
}

impl ParallelScheduler {
    pub fn new(policy: ParallelFailure) -> Self {
        Self { policy }
    }

    /// Drive every branch to completion and report each outcome by index.
    ///
    /// Under [`ParallelFailure::Finish`] all branches always run to the end.
    /// Under [`ParallelFailure::Cancel`] the first failure drops the branches
    /// still running; dropping a branch kills its step's process group.
    pub async fn run<'a>(&self, branches: Vec<BoxFuture<'a, bool>>) -> Vec<BranchOutcome> {
        let mut outcomes = vec![BranchOutcome::Cancelled; branches.len()];

        let mut running: FuturesUnordered<_> = branches
            .into_iter()
            .enumerate()
            .map(|(index, branch)| async move { (index, branch.await) })
            .collect();

        while let Some((index, success)) = running.next().await {
            debug!("Parallel branch {} finished (success: {})", index, success);
            if success {
                outcomes[index] = BranchOutcome::Succeeded;
                continue;
            }

            outcomes[index] = BranchOutcome::Failed;
            if self.policy == ParallelFailure::Cancel && !running.is_empty() {
                warn!("Cancelling {} running parallel branch(es)", running.len());
                break;
            }
        }

        outcomes
    }
}
