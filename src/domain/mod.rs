//! Domain layer: identifiers, events, participation requests, and the
//! per-event admission boundary.
//!
//! Lifecycle rules live on the types themselves as explicit transition
//! tables ([`EventState::transition`], [`RequestStatus::transition`]);
//! the service layer only orchestrates lookups, locking, and persistence.

pub mod admission_locks;
pub mod clock;
pub mod datetime;
pub mod event;
pub mod ids;
pub mod request;
pub mod search;

pub use admission_locks::{AdmissionGuard, AdmissionLocks};
pub use clock::{Clock, FixedClock, SystemClock};
pub use event::{
    Event, EventChanges, EventDraft, EventState, EventTransition, Location, MAX_PARTICIPANT_LIMIT,
    StateAdminAction, StateUserAction,
};
pub use ids::{CategoryId, EventId, RequestId, UserId};
pub use request::{BulkTarget, ParticipationRequest, RequestDraft, RequestStatus, StatusUpdateResult};
pub use search::{EventQuery, EventSort, Page};
