//! Database row models for events and participation requests.

use chrono::NaiveDateTime;

use crate::domain::{
    CategoryId, Event, EventId, EventState, Location, ParticipationRequest, RequestId,
    RequestStatus, UserId,
};
use crate::error::{ServiceError, ValidationRule};

/// Column list shared by every `SELECT` on `events`.
pub const EVENT_COLUMNS: &str = "id, title, annotation, description, category_id, initiator_id, \
     lat, lon, paid, participant_limit, request_moderation, event_date, created_on, \
     published_on, state, views";

/// Column list shared by every `SELECT` on `participation_requests`.
pub const REQUEST_COLUMNS: &str = "id, event_id, requester_id, status, created";

/// A row from the `events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// Primary key.
    pub id: i64,
    /// Short title.
    pub title: String,
    /// Brief summary.
    pub annotation: String,
    /// Full description.
    pub description: String,
    /// Category foreign key.
    pub category_id: i64,
    /// Initiator foreign key.
    pub initiator_id: i64,
    /// Venue latitude.
    pub lat: f32,
    /// Venue longitude.
    pub lon: f32,
    /// Paid flag.
    pub paid: bool,
    /// Participant limit, `0` meaning unlimited.
    pub participant_limit: i32,
    /// Moderation flag.
    pub request_moderation: bool,
    /// Start date.
    pub event_date: NaiveDateTime,
    /// Creation timestamp.
    pub created_on: NaiveDateTime,
    /// Publication timestamp.
    pub published_on: Option<NaiveDateTime>,
    /// State token.
    pub state: String,
    /// View counter.
    pub views: i64,
}

impl TryFrom<EventRow> for Event {
    type Error = ServiceError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let state: EventState = row.state.parse().map_err(|_| {
            ServiceError::Persistence(format!("event {} has unknown state {}", row.id, row.state))
        })?;
        Ok(Self {
            id: EventId::new(row.id),
            title: row.title,
            annotation: row.annotation,
            description: row.description,
            category_id: CategoryId::new(row.category_id),
            initiator_id: UserId::new(row.initiator_id),
            location: Location {
                lat: row.lat,
                lon: row.lon,
            },
            paid: row.paid,
            participant_limit: u32::try_from(row.participant_limit).unwrap_or_default(),
            request_moderation: row.request_moderation,
            event_date: row.event_date,
            created_on: row.created_on,
            published_on: row.published_on,
            state,
            views: u64::try_from(row.views).unwrap_or_default(),
        })
    }
}

/// A row from the `participation_requests` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RequestRow {
    /// Primary key.
    pub id: i64,
    /// Event foreign key.
    pub event_id: i64,
    /// Requester foreign key.
    pub requester_id: i64,
    /// Status token.
    pub status: String,
    /// Submission timestamp.
    pub created: NaiveDateTime,
}

impl TryFrom<RequestRow> for ParticipationRequest {
    type Error = ServiceError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        let status: RequestStatus = row.status.parse().map_err(|_| {
            ServiceError::Persistence(format!(
                "request {} has unknown status {}",
                row.id, row.status
            ))
        })?;
        Ok(Self {
            id: RequestId::new(row.id),
            event_id: EventId::new(row.event_id),
            requester_id: UserId::new(row.requester_id),
            status,
            created: row.created,
        })
    }
}

/// Converts a participant limit to its `INTEGER` column value.
///
/// # Errors
///
/// Returns [`ValidationRule::ParticipantLimitTooLarge`] if the limit does
/// not fit the column.
pub fn limit_column(limit: u32) -> Result<i32, ValidationRule> {
    i32::try_from(limit).map_err(|_| ValidationRule::ParticipantLimitTooLarge {
        value: limit,
        max: crate::domain::MAX_PARTICIPANT_LIMIT,
    })
}

/// Builds an `ILIKE` pattern matching `text` anywhere, with the pattern
/// metacharacters of `text` escaped.
#[must_use]
pub fn contains_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Converts a batch of rows, failing on the first undecodable one.
///
/// # Errors
///
/// Returns [`ServiceError::Persistence`] if a row carries an unknown
/// status token.
pub fn requests_from_rows(rows: Vec<RequestRow>) -> Result<Vec<ParticipationRequest>, ServiceError> {
    rows.into_iter().map(ParticipationRequest::try_from).collect()
}
