//! Per-event serialization boundary for admission-relevant commands.
//!
//! [`AdmissionLocks`] keeps one [`tokio::sync::Mutex`] per event in a
//! `HashMap` behind an outer [`RwLock`]. Commands that read the confirmed
//! count and then write based on it (submission, bulk status change, edits
//! of limit or moderation) hold the event's mutex for the whole
//! check-and-write sequence. Commands on different events never contend.
//! Mutexes nobody holds or waits on are dropped when a new event's mutex
//! is allocated, so the registry only grows with concurrent events.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::EventId;
use crate::error::ServiceError;

/// Registry of per-event admission mutexes with bounded acquisition.
///
/// # Concurrency
///
/// - Commands on the same event are serialized.
/// - Commands on different events run concurrently.
/// - Waiting for a busy event gives up after the configured timeout with
///   [`ServiceError::AdmissionBusy`].
#[derive(Debug)]
pub struct AdmissionLocks {
    locks: RwLock<HashMap<EventId, Arc<Mutex<()>>>>,
    wait: Duration,
}

/// Exclusive admission rights over one event, released on drop.
#[derive(Debug)]
pub struct AdmissionGuard {
    event_id: EventId,
    _guard: OwnedMutexGuard<()>,
}

impl AdmissionGuard {
    /// Returns the event this guard serializes.
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        self.event_id
    }
}

impl AdmissionLocks {
    /// Creates an empty registry whose acquisitions wait at most `wait`.
    #[must_use]
    pub fn new(wait: Duration) -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
            wait,
        }
    }

    /// Returns the maximum time [`AdmissionLocks::acquire`] waits.
    #[must_use]
    pub const fn wait(&self) -> Duration {
        self.wait
    }

    /// Acquires exclusive admission rights over `event_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::AdmissionBusy`] if the event stays locked
    /// for longer than the configured wait.
    pub async fn acquire(&self, event_id: EventId) -> Result<AdmissionGuard, ServiceError> {
        let mutex = self.mutex_for(event_id).await;
        match tokio::time::timeout(self.wait, mutex.lock_owned()).await {
            Ok(guard) => Ok(AdmissionGuard {
                event_id,
                _guard: guard,
            }),
            Err(_) => {
                tracing::warn!(%event_id, wait = ?self.wait, "admission lock wait timed out");
                Err(ServiceError::AdmissionBusy { event_id })
            }
        }
    }

    /// Returns the number of events that have a mutex allocated.
    pub async fn len(&self) -> usize {
        self.locks.read().await.len()
    }

    /// Returns `true` if no event has a mutex allocated yet.
    pub async fn is_empty(&self) -> bool {
        self.locks.read().await.is_empty()
    }

    async fn mutex_for(&self, event_id: EventId) -> Arc<Mutex<()>> {
        if let Some(mutex) = self.locks.read().await.get(&event_id) {
            return Arc::clone(mutex);
        }
        let mut map = self.locks.write().await;
        // Only the map owns an idle mutex.
        map.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        Arc::clone(map.entry(event_id).or_default())
    }
}

impl Default for AdmissionLocks {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}
