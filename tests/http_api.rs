//! End-to-end tests of the REST surface over the in-memory backend.

#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Value, json};
use tower::ServiceExt;

use ewm_admission::api;
use ewm_admission::app_state::{AppState, Backends};
use ewm_admission::domain::datetime::format_date_time;
use ewm_admission::domain::{CategoryId, FixedClock, UserId};
use ewm_admission::persistence::memory::MemoryStore;
use ewm_admission::service::LifecyclePolicy;

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 8, 10)
        .and_then(|d| d.and_hms_opt(9, 0, 0))
        .unwrap_or_default()
}

async fn app() -> Router {
    let store = Arc::new(MemoryStore::new());
    for id in 1..=5 {
        store.add_user(UserId::new(id)).await;
    }
    store.add_category(CategoryId::new(1)).await;
    let state = AppState::new(
        Backends::in_memory(&store),
        Arc::new(FixedClock::new(now())),
        Duration::from_secs(1),
        LifecyclePolicy::default(),
    );
    api::build_router().with_state(state)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let body = body.map_or_else(Body::empty, |v| Body::from(v.to_string()));
    let Ok(request) = builder.body(body) else {
        panic!("bad request for {uri}");
    };
    let Ok(response) = app.clone().oneshot(request).await else {
        panic!("router failed on {uri}");
    };
    let status = response.status();
    let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
        panic!("unreadable body from {uri}");
    };
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn int(value: &Value, key: &str) -> i64 {
    value.get(key).and_then(Value::as_i64).unwrap_or_default()
}

fn text<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn rule(value: &Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("details"))
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn len(value: &Value, key: &str) -> usize {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or_default()
}

fn new_event(limit: u32) -> Value {
    json!({
        "title": "Climbing weekend",
        "annotation": "Two days of bouldering in the hills",
        "description": "Gear rental included, transport from the city centre",
        "category": 1,
        "eventDate": format_date_time(now() + chrono::Duration::days(5)),
        "location": { "lat": 43.1, "lon": 131.9 },
        "participantLimit": limit
    })
}

async fn published_event(app: &Router, limit: u32) -> i64 {
    let (status, event) = call(app, "POST", "/api/v1/users/1/events", Some(new_event(limit))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(text(&event, "state"), "PENDING");
    let id = int(&event, "id");

    let uri = format!("/api/v1/admin/events/{id}");
    let (status, event) = call(app, "PATCH", &uri, Some(json!({"stateAction": "PUBLISH_EVENT"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text(&event, "state"), "PUBLISHED");
    assert_eq!(text(&event, "publishedOn"), "2026-08-10 09:00:00");
    id
}

#[tokio::test]
async fn health_is_served_at_root() {
    let app = app().await;
    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text(&body, "status"), "healthy");
}

#[tokio::test]
async fn unpublished_event_refuses_requests() {
    let app = app().await;
    let (_, event) = call(&app, "POST", "/api/v1/users/1/events", Some(new_event(2))).await;
    let uri = format!("/api/v1/users/2/requests?eventId={}", int(&event, "id"));
    let (status, body) = call(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(rule(&body), "EVENT_NOT_PUBLISHED");
}

#[tokio::test]
async fn bulk_confirmation_fills_the_event() {
    let app = app().await;
    let event = published_event(&app, 2).await;

    let mut ids = Vec::new();
    for user in 2..=5 {
        let uri = format!("/api/v1/users/{user}/requests?eventId={event}");
        let (status, request) = call(&app, "POST", &uri, None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(text(&request, "status"), "PENDING");
        assert_eq!(text(&request, "created"), "2026-08-10 09:00:00");
        ids.push(int(&request, "id"));
    }

    let own = format!("/api/v1/users/1/requests?eventId={event}");
    let (status, body) = call(&app, "POST", &own, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(rule(&body), "OWN_EVENT");

    let batch: Vec<i64> = ids.iter().copied().take(3).collect();
    let uri = format!("/api/v1/users/1/events/{event}/requests");
    let (status, result) = call(
        &app,
        "PATCH",
        &uri,
        Some(json!({"requestIds": batch, "status": "CONFIRMED"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(len(&result, "confirmedRequests"), 2);
    assert_eq!(len(&result, "rejectedRequests"), 1);

    let (status, listed) = call(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let statuses: Vec<&str> = listed
        .as_array()
        .map(|all| all.iter().map(|r| text(r, "status")).collect())
        .unwrap_or_default();
    assert_eq!(statuses, vec!["CONFIRMED", "CONFIRMED", "REJECTED", "REJECTED"]);

    let owner_view = format!("/api/v1/users/1/events/{event}");
    let (_, details) = call(&app, "GET", &owner_view, None).await;
    assert_eq!(int(&details, "confirmedRequests"), 2);
}

#[tokio::test]
async fn rejecting_twice_is_forbidden() {
    let app = app().await;
    let event = published_event(&app, 3).await;
    let (_, request) = call(
        &app,
        "POST",
        &format!("/api/v1/users/2/requests?eventId={event}"),
        None,
    )
    .await;
    let body = json!({"requestIds": [int(&request, "id")], "status": "REJECTED"});
    let uri = format!("/api/v1/users/1/events/{event}/requests");

    let (status, _) = call(&app, "PATCH", &uri, Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, again) = call(&app, "PATCH", &uri, Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(rule(&again), "REQUEST_NOT_PENDING");
}

#[tokio::test]
async fn cancel_and_list_own_requests() {
    let app = app().await;
    let event = published_event(&app, 0).await;
    let (status, request) = call(
        &app,
        "POST",
        &format!("/api/v1/users/3/requests?eventId={event}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(text(&request, "status"), "CONFIRMED");

    let uri = format!("/api/v1/users/3/requests/{}/cancel", int(&request, "id"));
    let (status, canceled) = call(&app, "PATCH", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text(&canceled, "status"), "CANCELED");

    let (status, mine) = call(&app, "GET", "/api/v1/users/3/requests", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn public_view_counts_unique_visitors() {
    let app = app().await;
    let event = published_event(&app, 0).await;
    let uri = format!("/api/v1/events/{event}");

    let (status, first) = call(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(int(&first, "views"), 1);
    let (_, second) = call(&app, "GET", &uri, None).await;
    assert_eq!(int(&second, "views"), 1);

    let (status, _) = call(&app, "GET", "/api/v1/events/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn error_statuses_follow_the_taxonomy() {
    let app = app().await;

    let (status, body) = call(&app, "GET", "/api/v1/users/42/requests", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body.get("error").and_then(|e| e.get("code")).and_then(Value::as_u64),
        Some(2001)
    );

    let mut early = new_event(1);
    if let Some(fields) = early.as_object_mut() {
        fields.insert(
            "eventDate".to_string(),
            json!(format_date_time(now() + chrono::Duration::minutes(90))),
        );
    }
    let (status, body) = call(&app, "POST", "/api/v1/users/1/events", Some(early)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(rule(&body), "EVENT_DATE_TOO_SOON");

    let event = published_event(&app, 1).await;
    let uri = format!("/api/v1/users/1/events/{event}/requests");
    let (status, body) = call(
        &app,
        "PATCH",
        &uri,
        Some(json!({"requestIds": [1], "status": "PENDING"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(rule(&body), "UNKNOWN_STATUS");

    let reject = format!("/api/v1/admin/events/{event}");
    let (status, body) = call(
        &app,
        "PATCH",
        &reject,
        Some(json!({"stateAction": "REJECT_EVENT"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(rule(&body), "PUBLISHED_EVENT_REJECTION");

    let (status, _) = call(&app, "GET", "/api/v1/users/0/requests", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn ids(value: &Value) -> Vec<i64> {
    value
        .as_array()
        .map(|all| all.iter().map(|e| int(e, "id")).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn listings_and_searches() {
    let app = app().await;
    let full = published_event(&app, 2).await;
    let open = published_event(&app, 0).await;
    let (_, pending) = call(&app, "POST", "/api/v1/users/1/events", Some(new_event(0))).await;
    let pending = int(&pending, "id");

    let mut requests = Vec::new();
    for user in 2..=3 {
        let uri = format!("/api/v1/users/{user}/requests?eventId={full}");
        let (_, request) = call(&app, "POST", &uri, None).await;
        requests.push(int(&request, "id"));
    }
    let uri = format!("/api/v1/users/1/events/{full}/requests");
    let body = json!({"requestIds": requests, "status": "CONFIRMED"});
    let (status, _) = call(&app, "PATCH", &uri, Some(body)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, page) = call(&app, "GET", "/api/v1/users/1/events?from=1&size=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&page), vec![open]);

    let (status, public) = call(&app, "GET", "/api/v1/events", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&public), vec![full, open]);
    let confirmed: Vec<i64> = public
        .as_array()
        .map(|all| all.iter().map(|e| int(e, "confirmedRequests")).collect())
        .unwrap_or_default();
    assert_eq!(confirmed, vec![2, 0]);

    let (_, available) = call(&app, "GET", "/api/v1/events?onlyAvailable=true", None).await;
    assert_eq!(ids(&available), vec![open]);

    let (status, admin) = call(&app, "GET", "/api/v1/admin/events?states=PENDING", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&admin), vec![pending]);
    let (_, admin) = call(
        &app,
        "GET",
        "/api/v1/admin/events?users=1&states=PUBLISHED,PENDING",
        None,
    )
    .await;
    assert_eq!(ids(&admin), vec![full, open, pending]);
}

#[tokio::test]
async fn search_rejects_bad_tokens() {
    let app = app().await;

    let (status, body) = call(&app, "GET", "/api/v1/events?sort=POPULAR", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(rule(&body), "UNKNOWN_SORT");

    let (status, body) = call(&app, "GET", "/api/v1/admin/events?states=BOGUS", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(rule(&body), "UNKNOWN_STATUS");

    let (status, body) = call(&app, "GET", "/api/v1/users/1/events?size=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(rule(&body), "EMPTY_PAGE");
}

#[tokio::test]
async fn limit_edits_respect_confirmed_and_storage_bounds() {
    let app = app().await;
    let event = published_event(&app, 0).await;
    for user in 2..=3 {
        let uri = format!("/api/v1/users/{user}/requests?eventId={event}");
        let (status, request) = call(&app, "POST", &uri, None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(text(&request, "status"), "CONFIRMED");
    }

    let uri = format!("/api/v1/admin/events/{event}");
    let (status, body) = call(&app, "PATCH", &uri, Some(json!({"participantLimit": 1}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(rule(&body), "LIMIT_BELOW_CONFIRMED");
    let (status, body) = call(&app, "PATCH", &uri, Some(json!({"participantLimit": 2}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(int(&body, "participantLimit"), 2);

    let (status, body) = call(
        &app,
        "PATCH",
        &uri,
        Some(json!({"participantLimit": 3_000_000_000_u64})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(rule(&body), "PARTICIPANT_LIMIT_TOO_LARGE");
}
