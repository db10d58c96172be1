//! Data Transfer Objects for REST request/response serialization.
//!
//! Field names are camelCase and timestamps travel as
//! `yyyy-MM-dd HH:mm:ss` strings.

pub mod event_dto;
pub mod request_dto;
pub mod search_dto;

pub use event_dto::*;
pub use request_dto::*;
pub use search_dto::*;
