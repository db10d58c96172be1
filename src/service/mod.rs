//! Service layer: business logic orchestration.
//!
//! [`AdmissionController`] decides participation requests against event
//! capacity and [`EventLifecycleManager`] drives events from review to
//! publication. Both share one [`crate::domain::AdmissionLocks`] so that
//! capacity decisions and capacity edits of the same event never
//! interleave.

pub mod admission;
pub mod lifecycle;

pub use admission::AdmissionController;
pub use lifecycle::{
    AdminEventSearch, AdminEventUpdate, EventDetails, EventLifecycleManager, LifecyclePolicy,
    NewEvent, OwnerEventUpdate, PublicEventSearch,
};
