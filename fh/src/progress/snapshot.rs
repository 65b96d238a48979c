//! ProgressSnapshot and the values the engine attaches to it

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

/// What the consumer should do with a snapshot beyond displaying it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Plain status update
    #[default]
    None,
    /// The payload carries a long-lived side resource the consumer should track
    Check,
    /// Refresh whatever view the unit is bound to
    Update,
    /// Refresh the drop counters of the unit
    UpdateDrops,
    /// The unit's view can be cleared
    Clear,
}

/// Position within the current step, `(0, 0)` meaning "no progress bar"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub position: u64,
    pub total: u64,
}

impl Progress {
    /// No progress bar
    pub const NONE: Progress = Progress { position: 0, total: 0 };

    /// Create a progress pair, clamping `position` to `total` when a total is set
    pub fn new(position: u64, total: u64) -> Self {
        if total > 0 && position > total {
            debug!(position, total, "Progress::new: clamping position to total");
            return Self { position: total, total };
        }
        Self { position, total }
    }

    /// Whether this pair means "no progress bar"
    pub fn is_none(&self) -> bool {
        self.total == 0 && self.position == 0
    }

    /// Completed fraction in `0.0..=1.0`, or `None` without a total
    pub fn fraction(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(self.position as f64 / self.total as f64)
    }
}

/// Opaque value handed from a workflow to the consumer
///
/// The engine never looks inside. Consumers recover the concrete type with
/// [`Payload::downcast_ref`].
#[derive(Clone)]
pub struct Payload(Arc<dyn Any + Send + Sync>);

impl Payload {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Payload(..)")
    }
}

/// One unit of reportable state produced by a workflow advance
///
/// Snapshots are built once and never mutated after they leave the workflow.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProgressSnapshot {
    /// Main text, usually naming the entity
    pub display: String,
    /// Short status line
    pub status: String,
    /// Secondary info line
    pub info: String,
    /// Error text; empty when the step went fine
    pub error: String,
    pub progress: Progress,
    pub action: Action,
    #[serde(skip)]
    pub payload: Option<Payload>,
    /// Consumers may skip rendering quiet snapshots
    pub quiet: bool,
}

impl ProgressSnapshot {
    /// Create a snapshot with the given display text
    pub fn new(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = error.into();
        self
    }

    pub fn with_progress(mut self, position: u64, total: u64) -> Self {
        self.progress = Progress::new(position, total);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Whether the workflow reported an error in this step
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

/// Cross-unit summary recomputed every time a snapshot is forwarded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateCounters {
    /// Advances in flight at the moment of forwarding
    pub running_count: usize,
    /// Units not yet exhausted
    pub remaining_count: usize,
    /// Sum of the work units report as still outstanding
    pub total_outstanding_work: u64,
}

/// A snapshot as the consumer receives it
#[derive(Debug, Clone, Serialize)]
pub struct UnitProgress<K> {
    /// Entity whose workflow produced the snapshot
    pub unit: K,
    pub snapshot: ProgressSnapshot,
    pub counters: AggregateCounters,
}
