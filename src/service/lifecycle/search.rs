//! Event listings: the owner's events, public search, and admin search.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use super::{EventDetails, EventLifecycleManager};
use crate::domain::search::check_range;
use crate::domain::{CategoryId, Event, EventQuery, EventSort, EventState, Page, UserId};
use crate::error::ServiceError;
use crate::persistence::Hit;

/// Public search over published events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicEventSearch {
    /// Case-insensitive fragment of the annotation or description.
    pub text: Option<String>,
    /// Categories to keep. Empty keeps all.
    pub categories: Vec<CategoryId>,
    /// Paid flag to keep.
    pub paid: Option<bool>,
    /// Earliest event date. Defaults to now.
    pub range_start: Option<NaiveDateTime>,
    /// Latest event date.
    pub range_end: Option<NaiveDateTime>,
    /// Keep only events with a free seat.
    pub only_available: bool,
    /// Result order. Id order when absent.
    pub sort: Option<EventSort>,
    /// Window over the filtered, ordered results.
    pub page: Page,
}

/// Admin search over events in any state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminEventSearch {
    /// Initiators to keep. Empty keeps all.
    pub users: Vec<UserId>,
    /// States to keep. Empty keeps all.
    pub states: Vec<EventState>,
    /// Categories to keep. Empty keeps all.
    pub categories: Vec<CategoryId>,
    /// Earliest event date.
    pub range_start: Option<NaiveDateTime>,
    /// Latest event date.
    pub range_end: Option<NaiveDateTime>,
    /// Window over the id-ordered results.
    pub page: Page,
}

impl EventLifecycleManager {
    /// Lists the events initiated by `user_id`, in id order.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] if the user is missing.
    pub async fn list_owner_events(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<EventDetails>, ServiceError> {
        self.require_user(user_id).await?;
        let events = self
            .events
            .find(&EventQuery {
                initiators: vec![user_id],
                page: Some(page),
                ..EventQuery::default()
            })
            .await?;
        tracing::debug!(%user_id, count = events.len(), "listed owner events");
        self.with_counts(events).await
    }

    /// Searches published events and records a hit for `uri` and `ip`.
    ///
    /// Filtering on free seats and ordering happen before the page is cut,
    /// so every page is drawn from the same ordered result. Events without
    /// a participant limit always have a free seat.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] for an inverted date range, or
    /// a persistence error.
    pub async fn search_published(
        &self,
        search: PublicEventSearch,
        uri: &str,
        ip: &str,
    ) -> Result<Vec<EventDetails>, ServiceError> {
        let now = self.clock.now();
        self.telemetry
            .record_hit(Hit {
                app: self.policy.stats_app_name.clone(),
                uri: uri.to_string(),
                ip: ip.to_string(),
                timestamp: now,
            })
            .await?;
        check_range(search.range_start, search.range_end)?;

        let events = self
            .events
            .find(&EventQuery {
                states: vec![EventState::Published],
                categories: search.categories,
                text: search.text.filter(|t| !t.trim().is_empty()),
                paid: search.paid,
                range_start: Some(search.range_start.unwrap_or(now)),
                range_end: search.range_end,
                ..EventQuery::default()
            })
            .await?;

        let mut found = self.with_counts(events).await?;
        if search.only_available {
            found.retain(|d| {
                !d.event.has_limit() || d.confirmed_requests < u64::from(d.event.participant_limit)
            });
        }
        if let Some(sort) = search.sort {
            sort.apply(&mut found, |d| &d.event);
        }
        tracing::debug!(
            count = found.len(),
            only_available = search.only_available,
            sort = ?search.sort,
            "searched published events"
        );
        Ok(search.page.slice(found))
    }

    /// Searches events for administrators, in id order.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] for an inverted date range, or
    /// a persistence error.
    pub async fn search_admin(
        &self,
        search: AdminEventSearch,
    ) -> Result<Vec<EventDetails>, ServiceError> {
        check_range(search.range_start, search.range_end)?;
        let events = self
            .events
            .find(&EventQuery {
                initiators: search.users,
                states: search.states,
                categories: search.categories,
                range_start: search.range_start,
                range_end: search.range_end,
                page: Some(search.page),
                ..EventQuery::default()
            })
            .await?;
        tracing::debug!(count = events.len(), "admin event search");
        self.with_counts(events).await
    }

    async fn with_counts(&self, events: Vec<Event>) -> Result<Vec<EventDetails>, ServiceError> {
        let ids: Vec<_> = events.iter().map(|e| e.id).collect();
        let counts: HashMap<_, _> = self.ledger.confirmed_counts(&ids).await?;
        Ok(events
            .into_iter()
            .map(|event| EventDetails {
                confirmed_requests: counts.get(&event.id).copied().unwrap_or_default(),
                event,
            })
            .collect())
    }
}
