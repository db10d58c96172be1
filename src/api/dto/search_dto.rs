//! Event listing DTOs: query parameters and the short event view.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::datetime::{format_date_time, parse_date_time};
use crate::domain::{CategoryId, EventState, Page, UserId};
use crate::error::{ServiceError, ValidationRule};
use crate::service::{AdminEventSearch, EventDetails, PublicEventSearch};

/// Paging parameters of `GET /users/{userId}/events`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// Items to skip. Defaults to `0`.
    pub from: Option<u32>,
    /// Items to return. Defaults to `10`.
    pub size: Option<u32>,
}

impl TryFrom<PageParams> for Page {
    type Error = ServiceError;

    fn try_from(params: PageParams) -> Result<Self, Self::Error> {
        page(params.from, params.size)
    }
}

/// Query parameters of `GET /events`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct PublicEventSearchParams {
    /// Text searched in annotations and descriptions, case-insensitive.
    pub text: Option<String>,
    /// Comma-separated category ids.
    pub categories: Option<String>,
    /// Paid flag.
    pub paid: Option<bool>,
    /// Earliest start, `yyyy-MM-dd HH:mm:ss`. Defaults to now.
    pub range_start: Option<String>,
    /// Latest start, `yyyy-MM-dd HH:mm:ss`.
    pub range_end: Option<String>,
    /// Only events with free seats. Defaults to `false`.
    pub only_available: Option<bool>,
    /// `EVENT_DATE` or `VIEWS`.
    pub sort: Option<String>,
    /// Items to skip. Defaults to `0`.
    pub from: Option<u32>,
    /// Items to return. Defaults to `10`.
    pub size: Option<u32>,
}

impl TryFrom<PublicEventSearchParams> for PublicEventSearch {
    type Error = ServiceError;

    fn try_from(params: PublicEventSearchParams) -> Result<Self, Self::Error> {
        Ok(Self {
            text: params.text,
            categories: split_list(params.categories.as_deref(), |raw| {
                CategoryId::try_from(parse_id(raw)?)
            })?,
            paid: params.paid,
            range_start: parse_optional_date(params.range_start.as_deref())?,
            range_end: parse_optional_date(params.range_end.as_deref())?,
            only_available: params.only_available.unwrap_or(false),
            sort: params.sort.as_deref().map(str::parse).transpose()?,
            page: page(params.from, params.size)?,
        })
    }
}

/// Query parameters of `GET /admin/events`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct AdminEventSearchParams {
    /// Comma-separated initiator ids.
    pub users: Option<String>,
    /// Comma-separated states: `PENDING`, `PUBLISHED`, `CANCELED`.
    pub states: Option<String>,
    /// Comma-separated category ids.
    pub categories: Option<String>,
    /// Earliest start, `yyyy-MM-dd HH:mm:ss`.
    pub range_start: Option<String>,
    /// Latest start, `yyyy-MM-dd HH:mm:ss`.
    pub range_end: Option<String>,
    /// Items to skip. Defaults to `0`.
    pub from: Option<u32>,
    /// Items to return. Defaults to `10`.
    pub size: Option<u32>,
}

impl TryFrom<AdminEventSearchParams> for AdminEventSearch {
    type Error = ServiceError;

    fn try_from(params: AdminEventSearchParams) -> Result<Self, Self::Error> {
        Ok(Self {
            users: split_list(params.users.as_deref(), |raw| {
                UserId::try_from(parse_id(raw)?)
            })?,
            states: split_list(params.states.as_deref(), |raw| {
                raw.parse::<EventState>().map_err(Into::into)
            })?,
            categories: split_list(params.categories.as_deref(), |raw| {
                CategoryId::try_from(parse_id(raw)?)
            })?,
            range_start: parse_optional_date(params.range_start.as_deref())?,
            range_end: parse_optional_date(params.range_end.as_deref())?,
            page: page(params.from, params.size)?,
        })
    }
}

/// Event view used by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventShortDto {
    /// Event identifier.
    pub id: i64,
    /// Short title.
    pub title: String,
    /// Brief summary.
    pub annotation: String,
    /// Category identifier.
    pub category: i64,
    /// Initiator identifier.
    pub initiator: i64,
    /// Paid attendance.
    pub paid: bool,
    /// Start time.
    pub event_date: String,
    /// Requests currently confirmed.
    pub confirmed_requests: u64,
    /// Unique page views.
    pub views: u64,
}

impl From<EventDetails> for EventShortDto {
    fn from(details: EventDetails) -> Self {
        let event = details.event;
        Self {
            id: event.id.get(),
            title: event.title,
            annotation: event.annotation,
            category: event.category_id.get(),
            initiator: event.initiator_id.get(),
            paid: event.paid,
            event_date: format_date_time(event.event_date),
            confirmed_requests: details.confirmed_requests,
            views: event.views,
        }
    }
}

fn page(from: Option<u32>, size: Option<u32>) -> Result<Page, ServiceError> {
    Ok(Page::new(
        from.unwrap_or(0),
        size.unwrap_or(Page::DEFAULT_SIZE),
    )?)
}

fn parse_optional_date(raw: Option<&str>) -> Result<Option<NaiveDateTime>, ServiceError> {
    Ok(raw.map(parse_date_time).transpose()?)
}

fn parse_id(raw: &str) -> Result<i64, ServiceError> {
    raw.parse()
        .map_err(|_| ValidationRule::MalformedId(raw.to_string()).into())
}

/// Parses a comma-separated list, skipping blank items.
fn split_list<T>(
    raw: Option<&str>,
    parse: impl Fn(&str) -> Result<T, ServiceError>,
) -> Result<Vec<T>, ServiceError> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(parse)
        .collect()
}
