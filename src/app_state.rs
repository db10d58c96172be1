//! Shared application state injected into all Axum handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{AdmissionLocks, Clock};
use crate::persistence::memory::{InMemoryTelemetry, MemoryStore};
use crate::persistence::postgres::PostgresStore;
use crate::persistence::{CategoryCatalog, EventStore, RequestLedger, TelemetrySink, UserDirectory};
use crate::service::{AdmissionController, EventLifecycleManager, LifecyclePolicy};

/// The collaborator implementations the services run against.
#[derive(Debug, Clone)]
pub struct Backends {
    /// User directory.
    pub users: Arc<dyn UserDirectory>,
    /// Category catalog.
    pub categories: Arc<dyn CategoryCatalog>,
    /// Event store.
    pub events: Arc<dyn EventStore>,
    /// Participation request ledger.
    pub ledger: Arc<dyn RequestLedger>,
    /// View statistics.
    pub telemetry: Arc<dyn TelemetrySink>,
}

impl Backends {
    /// Serves every collaborator from one in-process store.
    #[must_use]
    pub fn in_memory(store: &Arc<MemoryStore>) -> Self {
        Self {
            users: Arc::clone(store) as Arc<dyn UserDirectory>,
            categories: Arc::clone(store) as Arc<dyn CategoryCatalog>,
            events: Arc::clone(store) as Arc<dyn EventStore>,
            ledger: Arc::clone(store) as Arc<dyn RequestLedger>,
            telemetry: Arc::new(InMemoryTelemetry::new()),
        }
    }

    /// Serves users, categories, events, and requests from PostgreSQL.
    ///
    /// Hits stay in process: no statistics service is wired in.
    #[must_use]
    pub fn postgres(store: &Arc<PostgresStore>) -> Self {
        Self {
            users: Arc::clone(store) as Arc<dyn UserDirectory>,
            categories: Arc::clone(store) as Arc<dyn CategoryCatalog>,
            events: Arc::clone(store) as Arc<dyn EventStore>,
            ledger: Arc::clone(store) as Arc<dyn RequestLedger>,
            telemetry: Arc::new(InMemoryTelemetry::new()),
        }
    }
}

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Participation request admission.
    pub admission: Arc<AdmissionController>,
    /// Event lifecycle.
    pub lifecycle: Arc<EventLifecycleManager>,
}

impl AppState {
    /// Builds both services over `backends`, sharing one lock registry.
    #[must_use]
    pub fn new(
        backends: Backends,
        clock: Arc<dyn Clock>,
        lock_wait: Duration,
        policy: LifecyclePolicy,
    ) -> Self {
        let locks = Arc::new(AdmissionLocks::new(lock_wait));
        let admission = AdmissionController::new(
            Arc::clone(&backends.users),
            Arc::clone(&backends.events),
            Arc::clone(&backends.ledger),
            Arc::clone(&locks),
            Arc::clone(&clock),
        );
        let lifecycle = EventLifecycleManager::new(
            backends.users,
            backends.categories,
            backends.events,
            backends.ledger,
            backends.telemetry,
            locks,
            clock,
            policy,
        );
        Self {
            admission: Arc::new(admission),
            lifecycle: Arc::new(lifecycle),
        }
    }
}
