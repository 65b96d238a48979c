//! Workflow trait and the pause/resume signal workflows consult

use async_trait::async_trait;
use eyre::Result;
use tokio::sync::watch;
use tracing::debug;

use crate::progress::ProgressSnapshot;

/// Outcome of a single successful advance
#[derive(Debug, Clone)]
pub enum Step {
    /// The workflow produced its next snapshot and has more work
    Yield(ProgressSnapshot),
    /// The workflow has no more work
    Exhausted,
}

/// Per-entity resumable producer of progress snapshots
///
/// The engine calls [`advance`](Workflow::advance) repeatedly, never twice at the
/// same time for one workflow. Transient failures belong inside the workflow:
/// report them in a snapshot's `error` field and back off before the next step.
/// Returning `Err` is fatal and stops the whole engine.
#[async_trait]
pub trait Workflow: Send + 'static {
    /// Produce the next snapshot, or signal exhaustion
    async fn advance(&mut self) -> Result<Step>;

    /// Work this entity still has outstanding (cards left, orders to watch, ...)
    fn remaining_work(&self) -> u64 {
        0
    }
}

/// Externally owned pause/resume switch
///
/// Clones share the same state. Workflows call
/// [`wait_until_resumed`](PauseGate::wait_until_resumed) before doing work.
#[derive(Debug, Clone)]
pub struct PauseGate {
    tx: watch::Sender<bool>,
}

impl PauseGate {
    /// Create a gate in the running state
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn pause(&self) {
        debug!("PauseGate::pause: called");
        self.tx.send_replace(true);
    }

    pub fn resume(&self) {
        debug!("PauseGate::resume: called");
        self.tx.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.tx.borrow()
    }

    /// Return immediately when running, otherwise wait for [`resume`](Self::resume)
    pub async fn wait_until_resumed(&self) {
        let mut rx = self.tx.subscribe();
        if !*rx.borrow_and_update() {
            return;
        }
        debug!("PauseGate::wait_until_resumed: paused, waiting");
        // The sender lives in self, so the channel cannot close while we wait.
        let _ = rx.wait_for(|paused| !*paused).await;
        debug!("PauseGate::wait_until_resumed: resumed");
    }
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}
