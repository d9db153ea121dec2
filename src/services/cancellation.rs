//! Supersession registry for clustering runs
//!
//! Each organization has at most one live clustering run. Starting a new run
//! cancels the previous one; the superseded request replies `CANCELLED`
//! instead of a stale cluster mapping. Cleanup is RAII-based via `RunGuard`.

use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use once_cell::sync::Lazy;

/// Global clustering run registry
pub static CLUSTER_RUNS: Lazy<RunRegistry> = Lazy::new(RunRegistry::default);

struct RunEntry {
    run_id: Uuid,
    token: CancellationToken,
}

/// RAII guard for a live run. Dropping it removes the run from the
/// registry unless a newer run already replaced it.
pub struct RunGuard {
    run_id: Uuid,
    lane: Uuid,
    token: CancellationToken,
    registry: RunRegistry,
}

impl RunGuard {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Token cancelled when a newer run starts in the same lane.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_superseded(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.registry.finish(&self.lane, &self.run_id);
    }
}

/// Thread-safe map of lane (organization) to its live run.
#[derive(Clone, Default)]
pub struct RunRegistry {
    runs: Arc<Mutex<HashMap<Uuid, RunEntry>>>,
}

impl RunRegistry {
    /// Start a run in `lane`, cancelling whatever run was live there.
    pub fn start(&self, lane: Uuid) -> RunGuard {
        let run_id = Uuid::new_v4();
        let token = CancellationToken::new();

        let previous = self.runs.lock().insert(
            lane,
            RunEntry {
                run_id,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(
                "Clustering run {} superseded by {} in lane {}",
                previous.run_id,
                run_id,
                lane
            );
            previous.token.cancel();
        }

        RunGuard {
            run_id,
            lane,
            token,
            registry: self.clone(),
        }
    }

    /// Cancel the live run in `lane`. Returns whether one was running.
    #[cfg(test)]
    pub fn cancel(&self, lane: &Uuid) -> bool {
        match self.runs.lock().remove(lane) {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    fn finish(&self, lane: &Uuid, run_id: &Uuid) {
        let mut runs = self.runs.lock();
        if runs.get(lane).map_or(false, |e| &e.run_id == run_id) {
            runs.remove(lane);
        }
    }

    #[cfg(test)]
    fn live_run(&self, lane: &Uuid) -> Option<Uuid> {
        self.runs.lock().get(lane).map(|e| e.run_id)
    }
}
