//! Event lifecycle manager: creation, owner and admin edits, publication,
//! and public views.

mod search;

use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};

use crate::domain::{
    AdmissionLocks, CategoryId, Clock, Event, EventChanges, EventDraft, EventId, EventState,
    EventTransition, Location, RequestStatus, StateAdminAction, StateUserAction, UserId,
};
use crate::error::{Entity, ForbiddenReason, ServiceError, ValidationRule};
use crate::persistence::{
    CategoryCatalog, EventStore, Hit, RequestLedger, TelemetrySink, UserDirectory,
};

pub use search::{AdminEventSearch, PublicEventSearch};

/// How far back view statistics are counted.
const VIEW_WINDOW_YEARS: i64 = 100;

/// Timing rules and identity used by the lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Minimum distance between now and a new or changed event date.
    pub event_min_lead: Duration,
    /// The event must start strictly later than this after publication.
    pub publish_min_lead: Duration,
    /// Application name attached to recorded hits.
    pub stats_app_name: String,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            event_min_lead: Duration::hours(2),
            publish_min_lead: Duration::hours(1),
            stats_app_name: "ewm-main-service".to_string(),
        }
    }
}

/// Input for a new event. Optional flags fall back to their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    /// Short title.
    pub title: String,
    /// Brief summary.
    pub annotation: String,
    /// Full description.
    pub description: String,
    /// Category the event is filed under.
    pub category_id: CategoryId,
    /// Venue coordinates.
    pub location: Location,
    /// Whether attendance is paid. Defaults to `false`.
    pub paid: Option<bool>,
    /// Maximum confirmed participants. Defaults to `0` (unlimited).
    pub participant_limit: Option<u32>,
    /// Whether requests need approval. Defaults to `true`.
    pub request_moderation: Option<bool>,
    /// When the event starts.
    pub event_date: NaiveDateTime,
}

/// Owner edit: field changes plus an optional state action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnerEventUpdate {
    /// Field changes.
    pub changes: EventChanges,
    /// Requested state action.
    pub state_action: Option<StateUserAction>,
}

/// Admin edit: field changes plus an optional publish/reject decision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminEventUpdate {
    /// Field changes.
    pub changes: EventChanges,
    /// Requested state action.
    pub state_action: Option<StateAdminAction>,
}

/// An event together with its live confirmed participant count.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDetails {
    /// The stored event.
    pub event: Event,
    /// Requests currently `CONFIRMED`.
    pub confirmed_requests: u64,
}

/// Orchestrates the event lifecycle.
///
/// Edits are computed on a copy of the event and saved only after every
/// check has passed. Owner and admin edits run inside the event's
/// admission lock because they may change the capacity rules that
/// admissions read.
#[derive(Debug)]
pub struct EventLifecycleManager {
    users: Arc<dyn UserDirectory>,
    categories: Arc<dyn CategoryCatalog>,
    events: Arc<dyn EventStore>,
    ledger: Arc<dyn RequestLedger>,
    telemetry: Arc<dyn TelemetrySink>,
    locks: Arc<AdmissionLocks>,
    clock: Arc<dyn Clock>,
    policy: LifecyclePolicy,
}

impl EventLifecycleManager {
    /// Creates a new `EventLifecycleManager`.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<dyn UserDirectory>,
        categories: Arc<dyn CategoryCatalog>,
        events: Arc<dyn EventStore>,
        ledger: Arc<dyn RequestLedger>,
        telemetry: Arc<dyn TelemetrySink>,
        locks: Arc<AdmissionLocks>,
        clock: Arc<dyn Clock>,
        policy: LifecyclePolicy,
    ) -> Self {
        Self {
            users,
            categories,
            events,
            ledger,
            telemetry,
            locks,
            clock,
            policy,
        }
    }

    /// Creates a `PENDING` event initiated by `user_id`.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotFound`] if the user or the category is missing.
    /// - [`ServiceError::Validation`] if a text field is out of bounds or
    ///   the event date is too close to now.
    pub async fn create_event(
        &self,
        user_id: UserId,
        new_event: NewEvent,
    ) -> Result<EventDetails, ServiceError> {
        self.require_user(user_id).await?;
        self.require_category(new_event.category_id).await?;

        let now = self.clock.now();
        let draft = EventDraft {
            title: new_event.title,
            annotation: new_event.annotation,
            description: new_event.description,
            category_id: new_event.category_id,
            initiator_id: user_id,
            location: new_event.location,
            paid: new_event.paid.unwrap_or(false),
            participant_limit: new_event.participant_limit.unwrap_or(0),
            request_moderation: new_event.request_moderation.unwrap_or(true),
            event_date: new_event.event_date,
            created_on: now,
        };
        draft.validate()?;
        self.check_date_floor(draft.event_date, now)?;

        let event = self.events.insert(draft).await?;
        tracing::info!(event_id = %event.id, %user_id, "event created");
        Ok(EventDetails {
            event,
            confirmed_requests: 0,
        })
    }

    /// Returns an event with its confirmed count for its owner's pages.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] if the user or the event is
    /// missing.
    pub async fn get_owner_event(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<EventDetails, ServiceError> {
        self.require_user(user_id).await?;
        let event = self.load_event(event_id).await?;
        tracing::debug!(%user_id, %event_id, "owner event read");
        self.details(event).await
    }

    /// Applies an owner edit.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotFound`] if the user, the event, or a new
    ///   category is missing.
    /// - [`ServiceError::Forbidden`] if the user does not own the event,
    ///   the event is published, or a new participant limit is below the
    ///   confirmed count.
    /// - [`ServiceError::Validation`] if a field is out of bounds or a new
    ///   event date is too close to now.
    /// - [`ServiceError::AdmissionBusy`] if the event lock wait times out.
    pub async fn update_by_owner(
        &self,
        user_id: UserId,
        event_id: EventId,
        update: OwnerEventUpdate,
    ) -> Result<EventDetails, ServiceError> {
        self.require_user(user_id).await?;
        self.load_event(event_id).await?;

        let _guard = self.locks.acquire(event_id).await?;
        let current = self.load_event(event_id).await?;
        if current.initiator_id != user_id {
            return Err(refuse(event_id, ForbiddenReason::NotEventOwner));
        }
        if !current.state.is_owner_editable() {
            return Err(refuse(
                event_id,
                ForbiddenReason::EventNotEditable {
                    state: current.state,
                },
            ));
        }

        let now = self.clock.now();
        let mut next = self.edited_copy(&current, update.changes, now).await?;
        if let Some(action) = update.state_action {
            next.apply_transition(EventTransition::from(action), now)
                .map_err(|reason| refuse(event_id, reason))?;
        }
        self.check_limit_covers_confirmed(&current, &next).await?;

        self.events.save(&next).await?;
        tracing::info!(
            %event_id,
            %user_id,
            from = %current.state,
            to = %next.state,
            "event updated by owner"
        );
        self.details(next).await
    }

    /// Applies an admin edit, optionally publishing or rejecting the event.
    ///
    /// Publication uses the event date after this edit's own changes and
    /// stamps `published_on` with the current instant.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotFound`] if the event or a new category is
    ///   missing.
    /// - [`ServiceError::Forbidden`] if the requested transition is not
    ///   allowed from the current state, or a new participant limit is
    ///   below the confirmed count.
    /// - [`ServiceError::Validation`] if a field is out of bounds, a new
    ///   event date is too close to now, or the event starts too soon
    ///   after publication.
    /// - [`ServiceError::AdmissionBusy`] if the event lock wait times out.
    pub async fn update_by_admin(
        &self,
        event_id: EventId,
        update: AdminEventUpdate,
    ) -> Result<EventDetails, ServiceError> {
        self.load_event(event_id).await?;

        let _guard = self.locks.acquire(event_id).await?;
        let current = self.load_event(event_id).await?;

        let now = self.clock.now();
        let mut next = self.edited_copy(&current, update.changes, now).await?;
        if let Some(action) = update.state_action {
            let transition = EventTransition::from(action);
            // State errors take precedence over the publish lead.
            current
                .state
                .transition(transition)
                .map_err(|reason| refuse(event_id, reason))?;
            if transition == EventTransition::Publish {
                self.check_publish_lead(next.event_date, now)?;
            }
            next.apply_transition(transition, now)
                .map_err(|reason| refuse(event_id, reason))?;
        }
        self.check_limit_covers_confirmed(&current, &next).await?;

        self.events.save(&next).await?;
        tracing::info!(
            %event_id,
            from = %current.state,
            to = %next.state,
            "event updated by admin"
        );
        self.details(next).await
    }

    /// Serves a published event to the public and counts the view.
    ///
    /// The hit is recorded for `uri` and `ip`; `views` grows by one only
    /// when the unique hit count for `uri` grew. The counter is bumped in
    /// a single store write, so edits committed meanwhile are kept.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] if the event is missing or not
    /// published, or a persistence error from the telemetry sink.
    pub async fn view_published_event(
        &self,
        event_id: EventId,
        uri: &str,
        ip: &str,
    ) -> Result<EventDetails, ServiceError> {
        let mut event = self
            .events
            .get(event_id)
            .await?
            .filter(|e| e.state == EventState::Published)
            .ok_or_else(|| ServiceError::not_found(Entity::Event, event_id))?;

        let uris = [uri.to_string()];
        let before = self.unique_hits(&uris).await?;
        self.telemetry
            .record_hit(Hit {
                app: self.policy.stats_app_name.clone(),
                uri: uri.to_string(),
                ip: ip.to_string(),
                timestamp: self.clock.now(),
            })
            .await?;
        let after = self.unique_hits(&uris).await?;

        if after > before {
            event.views = self.events.increment_views(event_id).await?;
            tracing::debug!(%event_id, views = event.views, "new unique view");
        }
        self.details(event).await
    }

    async fn unique_hits(&self, uris: &[String]) -> Result<u64, ServiceError> {
        let now = self.clock.now();
        let from = now - Duration::days(365 * VIEW_WINDOW_YEARS);
        self.telemetry.query_hit_count(uris, from, now, true).await
    }

    /// Validates `changes` and returns `current` with them applied.
    async fn edited_copy(
        &self,
        current: &Event,
        changes: EventChanges,
        now: NaiveDateTime,
    ) -> Result<Event, ServiceError> {
        changes.validate()?;
        if let Some(event_date) = changes.event_date {
            self.check_date_floor(event_date, now)?;
        }
        if let Some(category_id) = changes.category_id {
            self.require_category(category_id).await?;
        }
        let mut next = current.clone();
        next.apply_changes(changes);
        Ok(next)
    }

    /// Refuses a lowered limit that confirmed participants already exceed.
    async fn check_limit_covers_confirmed(
        &self,
        current: &Event,
        next: &Event,
    ) -> Result<(), ServiceError> {
        if next.participant_limit == current.participant_limit || !next.has_limit() {
            return Ok(());
        }
        let confirmed = self
            .ledger
            .count_by_event_and_status(next.id, RequestStatus::Confirmed)
            .await?;
        if confirmed > u64::from(next.participant_limit) {
            return Err(refuse(
                next.id,
                ForbiddenReason::LimitBelowConfirmed {
                    limit: next.participant_limit,
                    confirmed,
                },
            ));
        }
        Ok(())
    }

    fn check_date_floor(
        &self,
        event_date: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<(), ServiceError> {
        if event_date < now + self.policy.event_min_lead {
            tracing::warn!(%event_date, %now, "event date too soon");
            return Err(ValidationRule::EventDateTooSoon {
                event_date,
                min_lead_minutes: self.policy.event_min_lead.num_minutes(),
            }
            .into());
        }
        Ok(())
    }

    fn check_publish_lead(
        &self,
        event_date: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<(), ServiceError> {
        if event_date <= now + self.policy.publish_min_lead {
            tracing::warn!(%event_date, %now, "event starts too soon to publish");
            return Err(ValidationRule::PublishTooLate {
                event_date,
                min_lead_minutes: self.policy.publish_min_lead.num_minutes(),
            }
            .into());
        }
        Ok(())
    }

    async fn details(&self, event: Event) -> Result<EventDetails, ServiceError> {
        let confirmed_requests = self
            .ledger
            .count_by_event_and_status(event.id, RequestStatus::Confirmed)
            .await?;
        Ok(EventDetails {
            event,
            confirmed_requests,
        })
    }

    async fn require_user(&self, id: UserId) -> Result<(), ServiceError> {
        if self.users.exists(id).await? {
            Ok(())
        } else {
            Err(ServiceError::not_found(Entity::User, id))
        }
    }

    async fn require_category(&self, id: CategoryId) -> Result<(), ServiceError> {
        if self.categories.exists(id).await? {
            Ok(())
        } else {
            Err(ServiceError::not_found(Entity::Category, id))
        }
    }

    async fn load_event(&self, id: EventId) -> Result<Event, ServiceError> {
        self.events
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(Entity::Event, id))
    }
}

fn refuse(event_id: EventId, reason: ForbiddenReason) -> ServiceError {
    tracing::warn!(%event_id, rule = reason.token(), "event change refused");
    ServiceError::Forbidden(reason)
}
