//! Participation request DTOs.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::datetime::format_date_time;
use crate::domain::{EventId, ParticipationRequest, RequestId, StatusUpdateResult};
use crate::error::ServiceError;

/// A participation request as rendered to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipationRequestDto {
    /// Request identifier.
    pub id: i64,
    /// Event identifier.
    pub event: i64,
    /// Requester identifier.
    pub requester: i64,
    /// `PENDING`, `CONFIRMED`, `REJECTED`, or `CANCELED`.
    pub status: String,
    /// Submission time, `yyyy-MM-dd HH:mm:ss`.
    pub created: String,
}

impl From<&ParticipationRequest> for ParticipationRequestDto {
    fn from(request: &ParticipationRequest) -> Self {
        Self {
            id: request.id.get(),
            event: request.event_id.get(),
            requester: request.requester_id.get(),
            status: request.status.as_str().to_string(),
            created: format_date_time(request.created),
        }
    }
}

impl From<ParticipationRequest> for ParticipationRequestDto {
    fn from(request: ParticipationRequest) -> Self {
        Self::from(&request)
    }
}

/// Query string of `POST /users/{userId}/requests`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SubmitRequestParams {
    /// Event to take part in.
    pub event_id: i64,
}

impl SubmitRequestParams {
    /// Returns the validated event identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] if the id is not positive.
    pub fn event_id(&self) -> Result<EventId, ServiceError> {
        EventId::try_from(self.event_id)
    }
}

/// Body of `PATCH /users/{userId}/events/{eventId}/requests`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventRequestStatusUpdateRequest {
    /// Requests to decide, in processing order.
    pub request_ids: Vec<i64>,
    /// `CONFIRMED` or `REJECTED`.
    pub status: String,
}

impl EventRequestStatusUpdateRequest {
    /// Returns the validated request identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] for the first non-positive id.
    pub fn request_ids(&self) -> Result<Vec<RequestId>, ServiceError> {
        self.request_ids
            .iter()
            .map(|raw| RequestId::try_from(*raw))
            .collect()
    }
}

/// Outcome of a bulk status change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventRequestStatusUpdateResult {
    /// Requests confirmed by the call.
    pub confirmed_requests: Vec<ParticipationRequestDto>,
    /// Requests rejected from the submitted batch.
    pub rejected_requests: Vec<ParticipationRequestDto>,
}

impl From<StatusUpdateResult> for EventRequestStatusUpdateResult {
    fn from(result: StatusUpdateResult) -> Self {
        Self {
            confirmed_requests: result.confirmed.iter().map(Into::into).collect(),
            rejected_requests: result.rejected.iter().map(Into::into).collect(),
        }
    }
}
