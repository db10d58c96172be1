//! # ewm-admission
//!
//! Admission control and event lifecycle for an event-hosting platform.
//!
//! Users ask to take part in published events; initiators confirm or
//! reject those requests in bulk against a participant limit; admins
//! publish or reject events that initiators submit for review. Capacity
//! is never overbooked: every admission decision for an event is taken
//! inside that event's admission lock against a freshly counted set of
//! confirmed requests.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── AdmissionController, EventLifecycleManager (service/)
//!     ├── AdmissionLocks, transition tables (domain/)
//!     │
//!     ├── UserDirectory, CategoryCatalog, EventStore,
//!     │   RequestLedger, TelemetrySink (persistence/)
//!     │
//!     └── PostgreSQL or in-memory backend
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
