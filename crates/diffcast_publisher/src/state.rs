//! Publisher lifecycle and reporting types.

use diffcast_broker::FailedDelivery;
use std::fmt;
use std::time::Instant;

/// The lifecycle state of a publisher.
///
/// Transitions move strictly forward through a start or stop:
/// `Stopped -> Starting -> Running -> Stopping -> Stopped`. A failed
/// start reverts to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Not connected; publishes are rejected.
    Stopped,
    /// Connecting to the broker.
    Starting,
    /// Connected; publishes are accepted.
    Running,
    /// Draining buffered records before shutdown.
    Stopping,
}

impl LifecycleState {
    /// Returns the lowercase name of the state.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }

    /// Returns `true` if publishes are accepted in this state.
    #[must_use]
    pub fn accepts_publishes(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns `true` if a start may begin from this state.
    #[must_use]
    pub fn can_start(self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns `true` if a stop may begin from this state.
    ///
    /// Stopping from `Starting` is allowed; the half-open connection is
    /// drained and closed like a running one.
    #[must_use]
    pub fn can_stop(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What publishing one diff accomplished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Records delivered to the producer.
    pub records: usize,
    /// Node records among them.
    pub nodes: usize,
    /// Relationship records among them.
    pub relationships: usize,
    /// Changes skipped because they could not be serialized.
    pub skipped: usize,
}

impl PublishReport {
    /// A report with nothing published.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

/// What a stop accomplished.
#[derive(Debug, Clone, Default)]
pub struct StopReport {
    /// Buffered records delivered during the final flush.
    pub flushed: usize,
    /// Records that could not be delivered before shutdown.
    pub failed: Vec<FailedDelivery>,
}

impl StopReport {
    /// Returns `true` when no records were lost.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Counters accumulated over a publisher's lifetime.
#[derive(Debug, Clone, Default)]
pub struct PublisherStats {
    /// Diffs published successfully.
    pub diffs_published: u64,
    /// Records delivered to the producer.
    pub records_published: u64,
    /// Records that failed delivery.
    pub records_failed: u64,
    /// Changes skipped because they could not be serialized.
    pub serialization_skips: u64,
    /// When the last successful publish finished.
    pub last_publish_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}
