//! Service error types with HTTP status code mapping.
//!
//! [`ServiceError`] is the central error type. Business-rule violations and
//! input validation failures carry a typed rule ([`ForbiddenReason`],
//! [`ValidationRule`]) so callers can branch without matching on strings.

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{EventId, EventState, RequestId, RequestStatus};

/// Structured JSON error response body.
///
/// ```json
/// {
///   "error": {
///     "code": 3001,
///     "message": "forbidden: participant limit of the event has been reached",
///     "details": "PARTICIPANT_LIMIT_REACHED"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Machine-readable rule token, when the error carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Kind of entity referenced by a [`ServiceError::NotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    /// A registered user.
    User,
    /// An event.
    Event,
    /// A participation request.
    Request,
    /// An event category.
    Category,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Event => "event",
            Self::Request => "participation request",
            Self::Category => "category",
        })
    }
}

/// Business rule violated by a command (409-equivalent).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForbiddenReason {
    /// The requester already holds a non-canceled request for the event.
    #[error("a participation request for this event already exists")]
    DuplicateRequest,

    /// The requester is the initiator of the event.
    #[error("the initiator cannot request participation in their own event")]
    OwnEvent,

    /// The event is not in the `PUBLISHED` state.
    #[error("the event is not published")]
    EventNotPublished,

    /// Confirmed participants already fill the event's limit.
    #[error("participant limit of the event has been reached")]
    ParticipantLimitReached,

    /// Bulk confirmation requested for an event that auto-confirms.
    #[error("requests of an event without moderation or limit cannot be confirmed in bulk")]
    BulkConfirmNotApplicable,

    /// A request selected for a bulk transition is not pending.
    #[error("request {request_id} must be PENDING but is {status}")]
    RequestNotPending {
        /// Offending request.
        request_id: RequestId,
        /// Its current status.
        status: RequestStatus,
    },

    /// The caller does not own the event.
    #[error("only the initiator may modify the event")]
    NotEventOwner,

    /// Owner edits are only allowed while the event is pending or canceled.
    #[error("only pending or canceled events can be changed, event is {state}")]
    EventNotEditable {
        /// Current event state.
        state: EventState,
    },

    /// Publication requires a pending event.
    #[error("cannot publish an event in state {state}")]
    EventNotPending {
        /// Current event state.
        state: EventState,
    },

    /// A published event cannot be rejected.
    #[error("cannot reject an event that is already published")]
    PublishedEventRejection,

    /// A new participant limit would leave confirmed participants over it.
    #[error("participant limit {limit} is below the {confirmed} confirmed participants")]
    LimitBelowConfirmed {
        /// Requested limit.
        limit: u32,
        /// Requests currently confirmed.
        confirmed: u64,
    },
}

impl ForbiddenReason {
    /// Returns the machine-readable token for this rule.
    #[must_use]
    pub const fn token(&self) -> &'static str {
        match self {
            Self::DuplicateRequest => "DUPLICATE_REQUEST",
            Self::OwnEvent => "OWN_EVENT",
            Self::EventNotPublished => "EVENT_NOT_PUBLISHED",
            Self::ParticipantLimitReached => "PARTICIPANT_LIMIT_REACHED",
            Self::BulkConfirmNotApplicable => "BULK_CONFIRM_NOT_APPLICABLE",
            Self::RequestNotPending { .. } => "REQUEST_NOT_PENDING",
            Self::NotEventOwner => "NOT_EVENT_OWNER",
            Self::EventNotEditable { .. } => "EVENT_NOT_EDITABLE",
            Self::EventNotPending { .. } => "EVENT_NOT_PENDING",
            Self::PublishedEventRejection => "PUBLISHED_EVENT_REJECTION",
            Self::LimitBelowConfirmed { .. } => "LIMIT_BELOW_CONFIRMED",
        }
    }
}

/// Input validation rule violated by a command (400-equivalent).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationRule {
    /// Event date is closer to now than the configured lead time.
    #[error("event date {event_date} must be at least {min_lead_minutes} minutes from now")]
    EventDateTooSoon {
        /// Requested event date.
        event_date: NaiveDateTime,
        /// Required lead time in minutes.
        min_lead_minutes: i64,
    },

    /// Event starts too soon after the publish instant.
    #[error("event date {event_date} must be more than {min_lead_minutes} minutes after publication")]
    PublishTooLate {
        /// Event date at publication time.
        event_date: NaiveDateTime,
        /// Required lead time in minutes.
        min_lead_minutes: i64,
    },

    /// A date-time string does not match `yyyy-MM-dd HH:mm:ss`.
    #[error("malformed date-time '{0}', expected yyyy-MM-dd HH:mm:ss")]
    MalformedDateTime(String),

    /// Unknown event state action token.
    #[error("unknown state action '{0}'")]
    UnknownStateAction(String),

    /// Unknown or unsupported request status token.
    #[error("unsupported request status '{0}'")]
    UnknownStatus(String),

    /// An identifier in a query list is not an integer.
    #[error("malformed identifier '{0}'")]
    MalformedId(String),

    /// An identifier that must be positive is not.
    #[error("{field} must be positive, got {value}")]
    NonPositiveId {
        /// Name of the offending field.
        field: &'static str,
        /// Value received.
        value: i64,
    },

    /// A text field is outside its length bounds.
    #[error("{field} length must be between {min} and {max} characters, got {actual}")]
    FieldLength {
        /// Name of the offending field.
        field: &'static str,
        /// Minimum length.
        min: usize,
        /// Maximum length.
        max: usize,
        /// Length received.
        actual: usize,
    },

    /// Participant limit exceeds what the event store can hold.
    #[error("participant limit {value} exceeds the maximum of {max}")]
    ParticipantLimitTooLarge {
        /// Limit received.
        value: u32,
        /// Largest accepted limit.
        max: u32,
    },

    /// Unknown sort token in an event search.
    #[error("unsupported sort '{0}', expected EVENT_DATE or VIEWS")]
    UnknownSort(String),

    /// Search range starts after it ends.
    #[error("range start {start} is after range end {end}")]
    InvalidRange {
        /// Lower bound received.
        start: NaiveDateTime,
        /// Upper bound received.
        end: NaiveDateTime,
    },

    /// Page size must be positive.
    #[error("page size must be positive")]
    EmptyPage,
}

impl ValidationRule {
    /// Returns the machine-readable token for this rule.
    #[must_use]
    pub const fn token(&self) -> &'static str {
        match self {
            Self::EventDateTooSoon { .. } => "EVENT_DATE_TOO_SOON",
            Self::PublishTooLate { .. } => "PUBLISH_TOO_LATE",
            Self::MalformedDateTime(_) => "MALFORMED_DATE_TIME",
            Self::UnknownStateAction(_) => "UNKNOWN_STATE_ACTION",
            Self::UnknownStatus(_) => "UNKNOWN_STATUS",
            Self::MalformedId(_) => "MALFORMED_ID",
            Self::NonPositiveId { .. } => "NON_POSITIVE_ID",
            Self::FieldLength { .. } => "FIELD_LENGTH",
            Self::ParticipantLimitTooLarge { .. } => "PARTICIPANT_LIMIT_TOO_LARGE",
            Self::UnknownSort(_) => "UNKNOWN_SORT",
            Self::InvalidRange { .. } => "INVALID_RANGE",
            Self::EmptyPage => "EMPTY_PAGE",
        }
    }
}

/// Service error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category   | HTTP Status               |
/// |-----------|------------|---------------------------|
/// | 1000–1999 | Validation | 400 Bad Request           |
/// | 2000–2999 | Not Found  | 404 Not Found             |
/// | 3000–3999 | Forbidden  | 409 Conflict              |
/// | 5000–5999 | Server     | 500 Internal Server Error |
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A referenced entity does not exist.
    #[error("{entity} with id={id} was not found")]
    NotFound {
        /// Kind of the missing entity.
        entity: Entity,
        /// Identifier that was looked up.
        id: i64,
    },

    /// A business rule forbids the command.
    #[error("forbidden: {0}")]
    Forbidden(ForbiddenReason),

    /// The event's admission lock could not be acquired in time.
    #[error("admission for event {event_id} is busy, retry later")]
    AdmissionBusy {
        /// Contended event.
        event_id: EventId,
    },

    /// Request input is malformed or violates a date rule.
    #[error("validation failed: {0}")]
    Validation(ValidationRule),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Shorthand for [`ServiceError::NotFound`].
    #[must_use]
    pub fn not_found(entity: Entity, id: impl Into<i64>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation(_) => 1001,
            Self::NotFound { entity, .. } => match entity {
                Entity::User => 2001,
                Entity::Event => 2002,
                Entity::Request => 2003,
                Entity::Category => 2004,
            },
            Self::Forbidden(_) => 3001,
            Self::AdmissionBusy { .. } => 3002,
            Self::Persistence(_) => 5001,
            Self::Internal(_) => 5000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Forbidden(_) | Self::AdmissionBusy { .. } => StatusCode::CONFLICT,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` if the caller may retry the same command unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::AdmissionBusy { .. })
    }

    /// Returns the machine-readable rule token, if any.
    #[must_use]
    pub const fn rule_token(&self) -> Option<&'static str> {
        match self {
            Self::Forbidden(reason) => Some(reason.token()),
            Self::Validation(rule) => Some(rule.token()),
            Self::AdmissionBusy { .. } => Some("ADMISSION_BUSY"),
            Self::NotFound { .. } | Self::Persistence(_) | Self::Internal(_) => None,
        }
    }
}

impl From<ForbiddenReason> for ServiceError {
    fn from(reason: ForbiddenReason) -> Self {
        Self::Forbidden(reason)
    }
}

impl From<ValidationRule> for ServiceError {
    fn from(rule: ValidationRule) -> Self {
        Self::Validation(rule)
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: self.rule_token().map(str::to_string),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
