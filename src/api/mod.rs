//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All endpoints are mounted under `/api/v1`, except `/health`. With the
//! `swagger-ui` feature the OpenAPI document is served at
//! `/api-docs/openapi.json` and browsable at `/swagger-ui`.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI description of every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "ewm-admission",
        description = "Participation requests and event lifecycle"
    ),
    paths(
        handlers::requests::submit_request,
        handlers::requests::cancel_request,
        handlers::requests::list_user_requests,
        handlers::requests::list_event_requests,
        handlers::requests::update_event_requests,
        handlers::events::create_event,
        handlers::events::get_owner_event,
        handlers::events::update_owner_event,
        handlers::events::update_admin_event,
        handlers::events::view_event,
        handlers::events::list_owner_events,
        handlers::events::search_admin_events,
        handlers::events::search_events,
        handlers::system::health_handler,
    ),
    components(schemas(
        dto::ParticipationRequestDto,
        dto::EventRequestStatusUpdateRequest,
        dto::EventRequestStatusUpdateResult,
        dto::LocationDto,
        dto::NewEventDto,
        dto::EventFieldsDto,
        dto::UpdateEventUserRequest,
        dto::UpdateEventAdminRequest,
        dto::EventFullDto,
        dto::EventShortDto,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    ))
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());
    with_docs(router)
}

#[cfg(feature = "swagger-ui")]
fn with_docs(router: Router<AppState>) -> Router<AppState> {
    use utoipa_swagger_ui::SwaggerUi;

    router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(not(feature = "swagger-ui"))]
fn with_docs(router: Router<AppState>) -> Router<AppState> {
    router
}
