//! Persistence layer: collaborator interfaces and their backends.
//!
//! The services depend only on the traits below. Two backends exist:
//! [`memory::MemoryStore`] keeps everything in process (tests, local runs
//! with persistence disabled) and [`postgres::PostgresStore`] uses
//! `sqlx::PgPool`. Telemetry is recorded through [`TelemetrySink`], backed
//! in process by [`memory::InMemoryTelemetry`].

pub mod memory;
pub mod models;
pub mod postgres;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::domain::{
    CategoryId, Event, EventDraft, EventId, EventQuery, ParticipationRequest, RequestDraft,
    RequestId, RequestStatus, UserId,
};
use crate::error::ServiceError;

/// Read-only view of the user directory.
#[async_trait]
pub trait UserDirectory: Send + Sync + fmt::Debug {
    /// Returns `true` if the user is registered.
    async fn exists(&self, id: UserId) -> Result<bool, ServiceError>;
}

/// Read-only view of the category catalog.
#[async_trait]
pub trait CategoryCatalog: Send + Sync + fmt::Debug {
    /// Returns `true` if the category exists.
    async fn exists(&self, id: CategoryId) -> Result<bool, ServiceError>;
}

/// Durable record of events.
#[async_trait]
pub trait EventStore: Send + Sync + fmt::Debug {
    /// Loads an event by id.
    async fn get(&self, id: EventId) -> Result<Option<Event>, ServiceError>;

    /// Stores a new event and returns it with its assigned id.
    async fn insert(&self, draft: EventDraft) -> Result<Event, ServiceError>;

    /// Overwrites an existing event. The stored `views` counter is kept;
    /// it only moves through [`EventStore::increment_views`].
    async fn save(&self, event: &Event) -> Result<(), ServiceError>;

    /// Adds one view to the event in a single write and returns the new
    /// count.
    async fn increment_views(&self, id: EventId) -> Result<u64, ServiceError>;

    /// Returns the events matching `query`, ordered by id.
    async fn find(&self, query: &EventQuery) -> Result<Vec<Event>, ServiceError>;
}

/// A set of status changes committed as one unit.
///
/// Every request in the batch leaves `PENDING`. Backends write each one
/// only if it is still `PENDING` when the batch commits; otherwise the
/// whole batch is discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusBatch {
    /// Pending requests to move to their new status.
    pub requests: Vec<ParticipationRequest>,
    /// When set, every request of this event still `PENDING` after the
    /// batch is applied becomes `REJECTED` in the same commit.
    pub reject_remaining_pending: Option<EventId>,
}

/// Durable record of participation requests.
#[async_trait]
pub trait RequestLedger: Send + Sync + fmt::Debug {
    /// Returns every request of `requester_id` for `event_id`, any status.
    async fn find_by_requester_and_event(
        &self,
        requester_id: UserId,
        event_id: EventId,
    ) -> Result<Vec<ParticipationRequest>, ServiceError>;

    /// Loads a request by id.
    async fn find_by_id(&self, id: RequestId) -> Result<Option<ParticipationRequest>, ServiceError>;

    /// Loads the requests that exist among `ids`, in the order of `ids`.
    async fn find_by_ids(&self, ids: &[RequestId])
    -> Result<Vec<ParticipationRequest>, ServiceError>;

    /// Returns every request submitted by `requester_id`.
    async fn find_by_requester(
        &self,
        requester_id: UserId,
    ) -> Result<Vec<ParticipationRequest>, ServiceError>;

    /// Returns every request for `event_id`.
    async fn find_by_event(
        &self,
        event_id: EventId,
    ) -> Result<Vec<ParticipationRequest>, ServiceError>;

    /// Counts the requests of `event_id` currently in `status`.
    async fn count_by_event_and_status(
        &self,
        event_id: EventId,
        status: RequestStatus,
    ) -> Result<u64, ServiceError>;

    /// Stores a new request and returns it with its assigned id.
    async fn insert(&self, draft: RequestDraft) -> Result<ParticipationRequest, ServiceError>;

    /// Overwrites an existing request.
    async fn save(&self, request: &ParticipationRequest) -> Result<(), ServiceError>;

    /// Counts `CONFIRMED` requests per event. Events without any are
    /// absent from the map.
    async fn confirmed_counts(
        &self,
        event_ids: &[EventId],
    ) -> Result<HashMap<EventId, u64>, ServiceError>;

    /// Commits `batch` atomically and returns how many requests the
    /// cascade rejected.
    ///
    /// Fails with [`ForbiddenReason::RequestNotPending`] and writes
    /// nothing if a request of the batch is no longer `PENDING`.
    ///
    /// [`ForbiddenReason::RequestNotPending`]: crate::error::ForbiddenReason::RequestNotPending
    async fn save_all(&self, batch: StatusBatch) -> Result<u64, ServiceError>;
}

/// A single recorded page view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    /// Application that served the page.
    pub app: String,
    /// Requested URI.
    pub uri: String,
    /// Client address.
    pub ip: String,
    /// When the view happened.
    pub timestamp: NaiveDateTime,
}

/// Hit-recording and hit-query interface of the statistics service.
#[async_trait]
pub trait TelemetrySink: Send + Sync + fmt::Debug {
    /// Records a view.
    async fn record_hit(&self, hit: Hit) -> Result<(), ServiceError>;

    /// Counts hits on `uris` within `[from, to]`, distinct by client
    /// address when `unique` is set.
    async fn query_hit_count(
        &self,
        uris: &[String],
        from: NaiveDateTime,
        to: NaiveDateTime,
        unique: bool,
    ) -> Result<u64, ServiceError>;
}

/// Collapses repeated ids while keeping the first occurrence's position.
#[must_use]
pub fn dedup_ids(ids: &[RequestId]) -> Vec<RequestId> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
