//! Event handlers: create, owner read, edit and listing, admin edit and
//! search, public view and search.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, OriginalUri, Path, Query, State};
use axum::http::{Extensions, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};

use crate::api::dto::{
    AdminEventSearchParams, EventFullDto, EventShortDto, NewEventDto, PageParams,
    PublicEventSearchParams, UpdateEventAdminRequest, UpdateEventUserRequest,
};
use crate::app_state::AppState;
use crate::domain::{EventId, Page, UserId};
use crate::error::{ErrorResponse, ServiceError};

/// `POST /users/{userId}/events`: Create an event awaiting review.
///
/// # Errors
///
/// Returns [`ServiceError`] if the user or category is missing, a field
/// is out of bounds, or the date is too close.
#[utoipa::path(
    post,
    path = "/api/v1/users/{userId}/events",
    tag = "Events",
    summary = "Create an event",
    description = "Creates a PENDING event. The event date must be at least two hours away.",
    params(
        ("userId" = i64, Path, description = "Initiator id"),
    ),
    request_body = NewEventDto,
    responses(
        (status = 201, description = "Event created", body = EventFullDto),
        (status = 400, description = "Invalid event", body = ErrorResponse),
        (status = 404, description = "User or category not found", body = ErrorResponse),
    )
)]
pub async fn create_event(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(body): Json<NewEventDto>,
) -> Result<impl IntoResponse, ServiceError> {
    let details = state
        .lifecycle
        .create_event(UserId::try_from(user_id)?, body.try_into()?)
        .await?;
    Ok((StatusCode::CREATED, Json(EventFullDto::from(details))))
}

/// `GET /users/{userId}/events/{eventId}`: Full view of an event.
///
/// # Errors
///
/// Returns [`ServiceError::NotFound`] if the user or event is missing.
#[utoipa::path(
    get,
    path = "/api/v1/users/{userId}/events/{eventId}",
    tag = "Events",
    summary = "Get an event for its owner",
    params(
        ("userId" = i64, Path, description = "User id"),
        ("eventId" = i64, Path, description = "Event id"),
    ),
    responses(
        (status = 200, description = "Event details", body = EventFullDto),
        (status = 404, description = "User or event not found", body = ErrorResponse),
    )
)]
pub async fn get_owner_event(
    State(state): State<AppState>,
    Path((user_id, event_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ServiceError> {
    let details = state
        .lifecycle
        .get_owner_event(UserId::try_from(user_id)?, EventId::try_from(event_id)?)
        .await?;
    Ok(Json(EventFullDto::from(details)))
}

/// `PATCH /users/{userId}/events/{eventId}`: Owner edit.
///
/// # Errors
///
/// Returns [`ServiceError`] if the caller does not own the event, the
/// event is published, or the edit is invalid.
#[utoipa::path(
    patch,
    path = "/api/v1/users/{userId}/events/{eventId}",
    tag = "Events",
    summary = "Edit an event as its owner",
    description = "Only PENDING or CANCELED events can be edited. `stateAction` is SEND_TO_REVIEW or CANCEL_REVIEW.",
    params(
        ("userId" = i64, Path, description = "Event owner id"),
        ("eventId" = i64, Path, description = "Event id"),
    ),
    request_body = UpdateEventUserRequest,
    responses(
        (status = 200, description = "Event updated", body = EventFullDto),
        (status = 400, description = "Invalid edit", body = ErrorResponse),
        (status = 404, description = "User, event, or category not found", body = ErrorResponse),
        (status = 409, description = "Edit not allowed", body = ErrorResponse),
    )
)]
pub async fn update_owner_event(
    State(state): State<AppState>,
    Path((user_id, event_id)): Path<(i64, i64)>,
    Json(body): Json<UpdateEventUserRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let details = state
        .lifecycle
        .update_by_owner(
            UserId::try_from(user_id)?,
            EventId::try_from(event_id)?,
            body.try_into()?,
        )
        .await?;
    Ok(Json(EventFullDto::from(details)))
}

/// `PATCH /admin/events/{eventId}`: Admin edit, publish, or reject.
///
/// # Errors
///
/// Returns [`ServiceError`] if the event is missing, the transition is
/// not allowed, or the edit is invalid.
#[utoipa::path(
    patch,
    path = "/api/v1/admin/events/{eventId}",
    tag = "Admin",
    summary = "Edit, publish, or reject an event",
    description = "`stateAction` is PUBLISH_EVENT or REJECT_EVENT. Publishing requires a PENDING event starting more than one hour later.",
    params(
        ("eventId" = i64, Path, description = "Event id"),
    ),
    request_body = UpdateEventAdminRequest,
    responses(
        (status = 200, description = "Event updated", body = EventFullDto),
        (status = 400, description = "Invalid edit", body = ErrorResponse),
        (status = 404, description = "Event or category not found", body = ErrorResponse),
        (status = 409, description = "Transition not allowed", body = ErrorResponse),
    )
)]
pub async fn update_admin_event(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    Json(body): Json<UpdateEventAdminRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let details = state
        .lifecycle
        .update_by_admin(EventId::try_from(event_id)?, body.try_into()?)
        .await?;
    Ok(Json(EventFullDto::from(details)))
}

/// `GET /events/{id}`: Public view of a published event.
///
/// # Errors
///
/// Returns [`ServiceError::NotFound`] if the event is missing or not
/// published.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "View a published event",
    description = "Records a hit for the page and counts unique views.",
    params(
        ("id" = i64, Path, description = "Event id"),
    ),
    responses(
        (status = 200, description = "Event details", body = EventFullDto),
        (status = 404, description = "Event not found or not published", body = ErrorResponse),
    )
)]
pub async fn view_event(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    extensions: Extensions,
) -> Result<impl IntoResponse, ServiceError> {
    let ip = client_ip(&headers, &extensions);
    let details = state
        .lifecycle
        .view_published_event(EventId::try_from(event_id)?, uri.path(), &ip)
        .await?;
    Ok(Json(EventFullDto::from(details)))
}

/// `GET /users/{userId}/events`: Events initiated by a user.
///
/// # Errors
///
/// Returns [`ServiceError`] if the user is missing or the page is empty.
#[utoipa::path(
    get,
    path = "/api/v1/users/{userId}/events",
    tag = "Events",
    summary = "List a user's events",
    params(
        ("userId" = i64, Path, description = "Initiator id"),
        PageParams,
    ),
    responses(
        (status = 200, description = "Events in id order", body = Vec<EventShortDto>),
        (status = 400, description = "Invalid paging", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    )
)]
pub async fn list_owner_events(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let events = state
        .lifecycle
        .list_owner_events(UserId::try_from(user_id)?, Page::try_from(params)?)
        .await?;
    Ok(Json(
        events.into_iter().map(EventShortDto::from).collect::<Vec<_>>(),
    ))
}

/// `GET /admin/events`: Search events in any state.
///
/// # Errors
///
/// Returns [`ServiceError::Validation`] for a malformed filter.
#[utoipa::path(
    get,
    path = "/api/v1/admin/events",
    tag = "Admin",
    summary = "Search events",
    description = "List filters are comma-separated. Results are in id order.",
    params(AdminEventSearchParams),
    responses(
        (status = 200, description = "Matching events", body = Vec<EventFullDto>),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
    )
)]
pub async fn search_admin_events(
    State(state): State<AppState>,
    Query(params): Query<AdminEventSearchParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let events = state.lifecycle.search_admin(params.try_into()?).await?;
    Ok(Json(
        events.into_iter().map(EventFullDto::from).collect::<Vec<_>>(),
    ))
}

/// `GET /events`: Search published events.
///
/// # Errors
///
/// Returns [`ServiceError::Validation`] for a malformed filter or sort.
#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Search published events",
    description = "Records a hit for the search page. Without `rangeStart` only future events are listed.",
    params(PublicEventSearchParams),
    responses(
        (status = 200, description = "Matching events", body = Vec<EventShortDto>),
        (status = 400, description = "Invalid filter or sort", body = ErrorResponse),
    )
)]
pub async fn search_events(
    State(state): State<AppState>,
    Query(params): Query<PublicEventSearchParams>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    extensions: Extensions,
) -> Result<impl IntoResponse, ServiceError> {
    let ip = client_ip(&headers, &extensions);
    let events = state
        .lifecycle
        .search_published(params.try_into()?, uri.path(), &ip)
        .await?;
    Ok(Json(
        events.into_iter().map(EventShortDto::from).collect::<Vec<_>>(),
    ))
}

/// Resolves the client address from `X-Forwarded-For`, then the socket.
fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users/{userId}/events",
            post(create_event).get(list_owner_events),
        )
        .route(
            "/users/{userId}/events/{eventId}",
            get(get_owner_event).patch(update_owner_event),
        )
        .route("/admin/events", get(search_admin_events))
        .route("/admin/events/{eventId}", patch(update_admin_event))
        .route("/events", get(search_events))
        .route("/events/{id}", get(view_event))
}
