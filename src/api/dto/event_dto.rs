//! Event DTOs for creation, owner and admin edits, and full views.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::datetime::{format_date_time, parse_date_time};
use crate::domain::{CategoryId, EventChanges, Location};
use crate::error::ServiceError;
use crate::service::{AdminEventUpdate, EventDetails, NewEvent, OwnerEventUpdate};

/// Venue coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LocationDto {
    /// Latitude.
    pub lat: f32,
    /// Longitude.
    pub lon: f32,
}

impl From<LocationDto> for Location {
    fn from(dto: LocationDto) -> Self {
        Self {
            lat: dto.lat,
            lon: dto.lon,
        }
    }
}

impl From<Location> for LocationDto {
    fn from(location: Location) -> Self {
        Self {
            lat: location.lat,
            lon: location.lon,
        }
    }
}

/// Body of `POST /users/{userId}/events`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewEventDto {
    /// Short title (3 to 120 characters).
    pub title: String,
    /// Brief summary (20 to 2000 characters).
    pub annotation: String,
    /// Full description (20 to 7000 characters).
    pub description: String,
    /// Category identifier.
    pub category: i64,
    /// Start time, `yyyy-MM-dd HH:mm:ss`.
    pub event_date: String,
    /// Venue.
    pub location: LocationDto,
    /// Paid attendance. Defaults to `false`.
    #[serde(default)]
    pub paid: Option<bool>,
    /// Participant limit, `0` for unlimited. Defaults to `0`.
    #[serde(default)]
    pub participant_limit: Option<u32>,
    /// Whether requests need approval. Defaults to `true`.
    #[serde(default)]
    pub request_moderation: Option<bool>,
}

impl TryFrom<NewEventDto> for NewEvent {
    type Error = ServiceError;

    fn try_from(dto: NewEventDto) -> Result<Self, Self::Error> {
        Ok(Self {
            title: dto.title,
            annotation: dto.annotation,
            description: dto.description,
            category_id: CategoryId::try_from(dto.category)?,
            location: dto.location.into(),
            paid: dto.paid,
            participant_limit: dto.participant_limit,
            request_moderation: dto.request_moderation,
            event_date: parse_date_time(&dto.event_date)?,
        })
    }
}

/// Optional field edits shared by owner and admin update bodies.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventFieldsDto {
    /// New title.
    #[serde(default)]
    pub title: Option<String>,
    /// New annotation.
    #[serde(default)]
    pub annotation: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New category identifier.
    #[serde(default)]
    pub category: Option<i64>,
    /// New start time, `yyyy-MM-dd HH:mm:ss`.
    #[serde(default)]
    pub event_date: Option<String>,
    /// New venue.
    #[serde(default)]
    pub location: Option<LocationDto>,
    /// New paid flag.
    #[serde(default)]
    pub paid: Option<bool>,
    /// New participant limit.
    #[serde(default)]
    pub participant_limit: Option<u32>,
    /// New moderation flag.
    #[serde(default)]
    pub request_moderation: Option<bool>,
}

impl TryFrom<EventFieldsDto> for EventChanges {
    type Error = ServiceError;

    fn try_from(dto: EventFieldsDto) -> Result<Self, Self::Error> {
        Ok(Self {
            title: dto.title,
            annotation: dto.annotation,
            description: dto.description,
            category_id: dto.category.map(CategoryId::try_from).transpose()?,
            event_date: dto
                .event_date
                .as_deref()
                .map(parse_date_time)
                .transpose()?,
            location: dto.location.map(Into::into),
            paid: dto.paid,
            participant_limit: dto.participant_limit,
            request_moderation: dto.request_moderation,
        })
    }
}

/// Body of `PATCH /users/{userId}/events/{eventId}`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventUserRequest {
    /// Field edits.
    #[serde(flatten)]
    pub fields: EventFieldsDto,
    /// `SEND_TO_REVIEW` or `CANCEL_REVIEW`.
    #[serde(default)]
    pub state_action: Option<String>,
}

impl TryFrom<UpdateEventUserRequest> for OwnerEventUpdate {
    type Error = ServiceError;

    fn try_from(dto: UpdateEventUserRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            changes: dto.fields.try_into()?,
            state_action: dto.state_action.as_deref().map(str::parse).transpose()?,
        })
    }
}

/// Body of `PATCH /admin/events/{eventId}`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventAdminRequest {
    /// Field edits.
    #[serde(flatten)]
    pub fields: EventFieldsDto,
    /// `PUBLISH_EVENT` or `REJECT_EVENT`.
    #[serde(default)]
    pub state_action: Option<String>,
}

impl TryFrom<UpdateEventAdminRequest> for AdminEventUpdate {
    type Error = ServiceError;

    fn try_from(dto: UpdateEventAdminRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            changes: dto.fields.try_into()?,
            state_action: dto.state_action.as_deref().map(str::parse).transpose()?,
        })
    }
}

/// Full event view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventFullDto {
    /// Event identifier.
    pub id: i64,
    /// Short title.
    pub title: String,
    /// Brief summary.
    pub annotation: String,
    /// Full description.
    pub description: String,
    /// Category identifier.
    pub category: i64,
    /// Initiator identifier.
    pub initiator: i64,
    /// Venue.
    pub location: LocationDto,
    /// Paid attendance.
    pub paid: bool,
    /// Participant limit, `0` for unlimited.
    pub participant_limit: u32,
    /// Whether requests need approval.
    pub request_moderation: bool,
    /// Start time.
    pub event_date: String,
    /// Creation time.
    pub created_on: String,
    /// Publication time, absent unless published.
    pub published_on: Option<String>,
    /// `PENDING`, `PUBLISHED`, or `CANCELED`.
    pub state: String,
    /// Requests currently confirmed.
    pub confirmed_requests: u64,
    /// Unique page views.
    pub views: u64,
}

impl From<EventDetails> for EventFullDto {
    fn from(details: EventDetails) -> Self {
        let event = details.event;
        Self {
            id: event.id.get(),
            title: event.title,
            annotation: event.annotation,
            description: event.description,
            category: event.category_id.get(),
            initiator: event.initiator_id.get(),
            location: event.location.into(),
            paid: event.paid,
            participant_limit: event.participant_limit,
            request_moderation: event.request_moderation,
            event_date: format_date_time(event.event_date),
            created_on: format_date_time(event.created_on),
            published_on: event.published_on.map(format_date_time),
            state: event.state.as_str().to_string(),
            confirmed_requests: details.confirmed_requests,
            views: event.views,
        }
    }
}
