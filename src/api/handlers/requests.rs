//! Participation request handlers: submit, cancel, list, bulk decide.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};

use crate::api::dto::{
    EventRequestStatusUpdateRequest, EventRequestStatusUpdateResult, ParticipationRequestDto,
    SubmitRequestParams,
};
use crate::app_state::AppState;
use crate::domain::{EventId, RequestId, UserId};
use crate::error::{ErrorResponse, ServiceError};

/// `POST /users/{userId}/requests?eventId=`: Ask to take part in an event.
///
/// # Errors
///
/// Returns [`ServiceError`] if the user or event is missing, a
/// participation rule is violated, or the event is busy.
#[utoipa::path(
    post,
    path = "/api/v1/users/{userId}/requests",
    tag = "Requests",
    summary = "Submit a participation request",
    description = "Creates a request for the event. It is confirmed immediately when the event has no participant limit or no moderation.",
    params(
        ("userId" = i64, Path, description = "Requester id"),
        SubmitRequestParams,
    ),
    responses(
        (status = 201, description = "Request created", body = ParticipationRequestDto),
        (status = 404, description = "User or event not found", body = ErrorResponse),
        (status = 409, description = "Participation rule violated", body = ErrorResponse),
    )
)]
pub async fn submit_request(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<SubmitRequestParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let request = state
        .admission
        .submit_request(UserId::try_from(user_id)?, params.event_id()?)
        .await?;
    Ok((StatusCode::CREATED, Json(ParticipationRequestDto::from(request))))
}

/// `PATCH /users/{userId}/requests/{requestId}/cancel`: Withdraw a request.
///
/// # Errors
///
/// Returns [`ServiceError::NotFound`] if the user or request is missing.
#[utoipa::path(
    patch,
    path = "/api/v1/users/{userId}/requests/{requestId}/cancel",
    tag = "Requests",
    summary = "Cancel a participation request",
    params(
        ("userId" = i64, Path, description = "Requester id"),
        ("requestId" = i64, Path, description = "Request id"),
    ),
    responses(
        (status = 200, description = "Request canceled", body = ParticipationRequestDto),
        (status = 404, description = "User or request not found", body = ErrorResponse),
    )
)]
pub async fn cancel_request(
    State(state): State<AppState>,
    Path((user_id, request_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ServiceError> {
    let request = state
        .admission
        .cancel_request(UserId::try_from(user_id)?, RequestId::try_from(request_id)?)
        .await?;
    Ok(Json(ParticipationRequestDto::from(request)))
}

/// `GET /users/{userId}/requests`: The user's own requests.
///
/// # Errors
///
/// Returns [`ServiceError::NotFound`] if the user is missing.
#[utoipa::path(
    get,
    path = "/api/v1/users/{userId}/requests",
    tag = "Requests",
    summary = "List a user's participation requests",
    params(
        ("userId" = i64, Path, description = "Requester id"),
    ),
    responses(
        (status = 200, description = "Requests of the user", body = Vec<ParticipationRequestDto>),
        (status = 404, description = "User not found", body = ErrorResponse),
    )
)]
pub async fn list_user_requests(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let requests = state
        .admission
        .list_by_requester(UserId::try_from(user_id)?)
        .await?;
    Ok(Json(
        requests
            .iter()
            .map(ParticipationRequestDto::from)
            .collect::<Vec<_>>(),
    ))
}

/// `GET /users/{userId}/events/{eventId}/requests`: Requests for an owned
/// event.
///
/// # Errors
///
/// Returns [`ServiceError::NotFound`] if the user is missing.
#[utoipa::path(
    get,
    path = "/api/v1/users/{userId}/events/{eventId}/requests",
    tag = "Requests",
    summary = "List requests for an owned event",
    description = "Returns an empty list when the event does not belong to the user.",
    params(
        ("userId" = i64, Path, description = "Event owner id"),
        ("eventId" = i64, Path, description = "Event id"),
    ),
    responses(
        (status = 200, description = "Requests of the event", body = Vec<ParticipationRequestDto>),
        (status = 404, description = "User not found", body = ErrorResponse),
    )
)]
pub async fn list_event_requests(
    State(state): State<AppState>,
    Path((user_id, event_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ServiceError> {
    let requests = state
        .admission
        .list_by_event_owner(UserId::try_from(user_id)?, EventId::try_from(event_id)?)
        .await?;
    Ok(Json(
        requests
            .iter()
            .map(ParticipationRequestDto::from)
            .collect::<Vec<_>>(),
    ))
}

/// `PATCH /users/{userId}/events/{eventId}/requests`: Confirm or reject a
/// batch of pending requests.
///
/// # Errors
///
/// Returns [`ServiceError`] for an unsupported status, a missing user or
/// event, a non-pending request, a full event, or a busy event.
#[utoipa::path(
    patch,
    path = "/api/v1/users/{userId}/events/{eventId}/requests",
    tag = "Requests",
    summary = "Confirm or reject participation requests",
    description = "Requests are processed in the given order. Confirming the last free seat rejects every other pending request of the event.",
    params(
        ("userId" = i64, Path, description = "Event owner id"),
        ("eventId" = i64, Path, description = "Event id"),
    ),
    request_body = EventRequestStatusUpdateRequest,
    responses(
        (status = 200, description = "Decisions applied", body = EventRequestStatusUpdateResult),
        (status = 400, description = "Unsupported target status", body = ErrorResponse),
        (status = 404, description = "User or event not found", body = ErrorResponse),
        (status = 409, description = "Decision not allowed", body = ErrorResponse),
    )
)]
pub async fn update_event_requests(
    State(state): State<AppState>,
    Path((user_id, event_id)): Path<(i64, i64)>,
    Json(body): Json<EventRequestStatusUpdateRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let result = state
        .admission
        .bulk_update_status(
            UserId::try_from(user_id)?,
            EventId::try_from(event_id)?,
            &body.request_ids()?,
            &body.status,
        )
        .await?;
    Ok(Json(EventRequestStatusUpdateResult::from(result)))
}

/// Participation request routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users/{userId}/requests",
            post(submit_request).get(list_user_requests),
        )
        .route(
            "/users/{userId}/requests/{requestId}/cancel",
            patch(cancel_request),
        )
        .route(
            "/users/{userId}/events/{eventId}/requests",
            get(list_event_requests).patch(update_event_requests),
        )
}
