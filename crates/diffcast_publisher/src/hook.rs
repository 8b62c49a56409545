//! Commit observation hooks.
//!
//! A host embeds the publisher by registering it as a commit observer:
//! the host calls [`ObserverRegistry::notify`] on its commit thread
//! after each transaction, and the publisher turns the diff into broker
//! records before the call returns.

use crate::error::PublisherError;
use crate::publisher::ChangeEventPublisher;
use diffcast_broker::ProducerClient;
use diffcast_model::TransactionDiff;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Error returned by a commit observer.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ObserverError(pub String);

impl ObserverError {
    /// Creates an observer error.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<PublisherError> for ObserverError {
    fn from(err: PublisherError) -> Self {
        Self(err.to_string())
    }
}

/// Callback invoked synchronously after each transaction commit.
///
/// Observers run on the host's commit thread, so a slow observer slows
/// commits. Errors are reported back to the host per observer; the host
/// decides whether to surface or ignore them.
pub trait CommitObserver: Send + Sync {
    /// Called once per committed transaction with its diff.
    fn on_commit(&self, diff: &TransactionDiff) -> Result<(), ObserverError>;
}

impl<P: ProducerClient> CommitObserver for ChangeEventPublisher<P> {
    fn on_commit(&self, diff: &TransactionDiff) -> Result<(), ObserverError> {
        self.publish(diff).map(|_| ()).map_err(ObserverError::from)
    }
}

/// Handle identifying a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

/// The observers registered with a host.
///
/// Observers are notified in registration order. Every observer sees
/// every diff: one observer failing does not stop the others.
pub struct ObserverRegistry {
    next_id: AtomicU64,
    observers: RwLock<Vec<(ObserverId, Arc<dyn CommitObserver>)>>,
}

impl ObserverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Registers an observer and returns its handle.
    pub fn register(&self, observer: Arc<dyn CommitObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.observers.write().push((id, observer));
        id
    }

    /// Removes an observer. Returns `false` if the handle is unknown.
    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Returns `true` when no observers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// Delivers one committed diff to every observer.
    ///
    /// Returns each observer's outcome in notification order.
    pub fn notify(&self, diff: &TransactionDiff) -> Vec<(ObserverId, Result<(), ObserverError>)> {
        let observers: Vec<(ObserverId, Arc<dyn CommitObserver>)> =
            self.observers.read().clone();

        let mut results = Vec::with_capacity(observers.len());
        for (id, observer) in observers {
            let result = observer.on_commit(diff);
            if let Err(err) = &result {
                warn!(observer = %id, error = %err, "commit observer failed");
            }
            results.push((id, result));
        }
        results
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
