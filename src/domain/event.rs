//! Events, their lifecycle states, and the lifecycle transition table.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{CategoryId, EventId, UserId};
use crate::error::{ForbiddenReason, ValidationRule};

/// Lifecycle state of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventState {
    /// Awaiting admin review. Initial state.
    Pending,
    /// Visible and open for participation requests.
    Published,
    /// Withdrawn by the owner or rejected by an admin.
    Canceled,
}

impl EventState {
    /// Every state, in declaration order.
    pub const ALL: [Self; 3] = [Self::Pending, Self::Published, Self::Canceled];

    /// Returns the wire token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Published => "PUBLISHED",
            Self::Canceled => "CANCELED",
        }
    }

    /// Returns `true` while the owner may still edit the event.
    #[must_use]
    pub const fn is_owner_editable(self) -> bool {
        matches!(self, Self::Pending | Self::Canceled)
    }

    /// Applies the lifecycle transition table.
    ///
    /// | transition   | from              | to        |
    /// |--------------|-------------------|-----------|
    /// | SendToReview | PENDING, CANCELED | PENDING   |
    /// | CancelReview | PENDING, CANCELED | CANCELED  |
    /// | Publish      | PENDING           | PUBLISHED |
    /// | Reject       | PENDING, CANCELED | CANCELED  |
    ///
    /// # Errors
    ///
    /// Returns the [`ForbiddenReason`] matching the rejected transition.
    pub const fn transition(self, transition: EventTransition) -> Result<Self, ForbiddenReason> {
        match (transition, self) {
            (EventTransition::SendToReview, Self::Pending | Self::Canceled) => Ok(Self::Pending),
            (EventTransition::CancelReview, Self::Pending | Self::Canceled)
            | (EventTransition::Reject, Self::Pending | Self::Canceled) => Ok(Self::Canceled),
            (EventTransition::Publish, Self::Pending) => Ok(Self::Published),
            (EventTransition::SendToReview | EventTransition::CancelReview, state) => {
                Err(ForbiddenReason::EventNotEditable { state })
            }
            (EventTransition::Publish, state) => Err(ForbiddenReason::EventNotPending { state }),
            (EventTransition::Reject, Self::Published) => {
                Err(ForbiddenReason::PublishedEventRejection)
            }
        }
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventState {
    type Err = ValidationRule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ValidationRule::UnknownStatus(s.to_string()))
    }
}

/// A lifecycle edge of [`EventState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTransition {
    /// Owner resubmits the event for review.
    SendToReview,
    /// Owner withdraws the event.
    CancelReview,
    /// Admin publishes the event.
    Publish,
    /// Admin rejects the event.
    Reject,
}

/// State action available to the event owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateUserAction {
    /// `SEND_TO_REVIEW`
    SendToReview,
    /// `CANCEL_REVIEW`
    CancelReview,
}

impl From<StateUserAction> for EventTransition {
    fn from(action: StateUserAction) -> Self {
        match action {
            StateUserAction::SendToReview => Self::SendToReview,
            StateUserAction::CancelReview => Self::CancelReview,
        }
    }
}

impl FromStr for StateUserAction {
    type Err = ValidationRule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SEND_TO_REVIEW" => Ok(Self::SendToReview),
            "CANCEL_REVIEW" => Ok(Self::CancelReview),
            other => Err(ValidationRule::UnknownStateAction(other.to_string())),
        }
    }
}

/// State action available to administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateAdminAction {
    /// `PUBLISH_EVENT`
    PublishEvent,
    /// `REJECT_EVENT`
    RejectEvent,
}

impl From<StateAdminAction> for EventTransition {
    fn from(action: StateAdminAction) -> Self {
        match action {
            StateAdminAction::PublishEvent => Self::Publish,
            StateAdminAction::RejectEvent => Self::Reject,
        }
    }
}

impl FromStr for StateAdminAction {
    type Err = ValidationRule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PUBLISH_EVENT" => Ok(Self::PublishEvent),
            "REJECT_EVENT" => Ok(Self::RejectEvent),
            other => Err(ValidationRule::UnknownStateAction(other.to_string())),
        }
    }
}

/// Geographic point where the event takes place.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    /// Latitude.
    pub lat: f32,
    /// Longitude.
    pub lon: f32,
}

/// Event aggregate as stored by the event store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier.
    pub id: EventId,
    /// Short title.
    pub title: String,
    /// Brief summary.
    pub annotation: String,
    /// Full description.
    pub description: String,
    /// Category the event is filed under.
    pub category_id: CategoryId,
    /// User who created the event.
    pub initiator_id: UserId,
    /// Venue coordinates.
    pub location: Location,
    /// Whether attendance is paid.
    pub paid: bool,
    /// Maximum confirmed participants, `0` meaning unlimited.
    pub participant_limit: u32,
    /// Whether requests wait for the initiator's decision.
    pub request_moderation: bool,
    /// When the event starts.
    pub event_date: NaiveDateTime,
    /// When the event was created.
    pub created_on: NaiveDateTime,
    /// When the event was published. Set iff `state` is `PUBLISHED`.
    pub published_on: Option<NaiveDateTime>,
    /// Lifecycle state.
    pub state: EventState,
    /// Unique views of the published event page.
    pub views: u64,
}

impl Event {
    /// Returns `true` if the event caps confirmed participants.
    #[must_use]
    pub const fn has_limit(&self) -> bool {
        self.participant_limit > 0
    }

    /// Returns `true` if new requests start out confirmed.
    #[must_use]
    pub const fn auto_confirms(&self) -> bool {
        !self.request_moderation || self.participant_limit == 0
    }

    /// Applies `transition` and keeps `published_on` in step with `state`.
    ///
    /// # Errors
    ///
    /// Returns the [`ForbiddenReason`] from [`EventState::transition`];
    /// the event is left unchanged.
    pub fn apply_transition(
        &mut self,
        transition: EventTransition,
        now: NaiveDateTime,
    ) -> Result<(), ForbiddenReason> {
        let next = self.state.transition(transition)?;
        self.published_on = match next {
            EventState::Published => Some(now),
            EventState::Pending | EventState::Canceled => None,
        };
        self.state = next;
        Ok(())
    }

    /// Copies every present field of `changes` onto the event.
    pub fn apply_changes(&mut self, changes: EventChanges) {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(annotation) = changes.annotation {
            self.annotation = annotation;
        }
        if let Some(description) = changes.description {
            self.description = description;
        }
        if let Some(category_id) = changes.category_id {
            self.category_id = category_id;
        }
        if let Some(event_date) = changes.event_date {
            self.event_date = event_date;
        }
        if let Some(location) = changes.location {
            self.location = location;
        }
        if let Some(paid) = changes.paid {
            self.paid = paid;
        }
        if let Some(participant_limit) = changes.participant_limit {
            self.participant_limit = participant_limit;
        }
        if let Some(request_moderation) = changes.request_moderation {
            self.request_moderation = request_moderation;
        }
    }
}

/// Optional field edits shared by owner and admin updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventChanges {
    /// New title.
    pub title: Option<String>,
    /// New annotation.
    pub annotation: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New category.
    pub category_id: Option<CategoryId>,
    /// New start date.
    pub event_date: Option<NaiveDateTime>,
    /// New venue.
    pub location: Option<Location>,
    /// New paid flag.
    pub paid: Option<bool>,
    /// New participant limit.
    pub participant_limit: Option<u32>,
    /// New moderation flag.
    pub request_moderation: Option<bool>,
}

impl EventChanges {
    /// Checks the length bounds of every present text field and the
    /// participant limit ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationRule::FieldLength`] for the first field out of
    /// bounds, or [`ValidationRule::ParticipantLimitTooLarge`].
    pub fn validate(&self) -> Result<(), ValidationRule> {
        if let Some(limit) = self.participant_limit {
            check_participant_limit(limit)?;
        }
        if let Some(title) = &self.title {
            TITLE_BOUNDS.check(title)?;
        }
        if let Some(annotation) = &self.annotation {
            ANNOTATION_BOUNDS.check(annotation)?;
        }
        if let Some(description) = &self.description {
            DESCRIPTION_BOUNDS.check(description)?;
        }
        Ok(())
    }
}

/// An event that has not been assigned an identifier yet.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    /// Short title.
    pub title: String,
    /// Brief summary.
    pub annotation: String,
    /// Full description.
    pub description: String,
    /// Category the event is filed under.
    pub category_id: CategoryId,
    /// User creating the event.
    pub initiator_id: UserId,
    /// Venue coordinates.
    pub location: Location,
    /// Whether attendance is paid.
    pub paid: bool,
    /// Maximum confirmed participants, `0` meaning unlimited.
    pub participant_limit: u32,
    /// Whether requests wait for the initiator's decision.
    pub request_moderation: bool,
    /// When the event starts.
    pub event_date: NaiveDateTime,
    /// When the event was created.
    pub created_on: NaiveDateTime,
}

impl EventDraft {
    /// Checks the length bounds of the text fields and the participant
    /// limit ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationRule::FieldLength`] for the first field out of
    /// bounds, or [`ValidationRule::ParticipantLimitTooLarge`].
    pub fn validate(&self) -> Result<(), ValidationRule> {
        check_participant_limit(self.participant_limit)?;
        TITLE_BOUNDS.check(&self.title)?;
        ANNOTATION_BOUNDS.check(&self.annotation)?;
        DESCRIPTION_BOUNDS.check(&self.description)
    }

    /// Materializes the draft as a `PENDING` event under `id`.
    #[must_use]
    pub fn into_event(self, id: EventId) -> Event {
        Event {
            id,
            title: self.title,
            annotation: self.annotation,
            description: self.description,
            category_id: self.category_id,
            initiator_id: self.initiator_id,
            location: self.location,
            paid: self.paid,
            participant_limit: self.participant_limit,
            request_moderation: self.request_moderation,
            event_date: self.event_date,
            created_on: self.created_on,
            published_on: None,
            state: EventState::Pending,
            views: 0,
        }
    }
}

/// Largest participant limit the event store accepts (`INTEGER` column).
pub const MAX_PARTICIPANT_LIMIT: u32 = i32::MAX.unsigned_abs();

fn check_participant_limit(value: u32) -> Result<(), ValidationRule> {
    if value > MAX_PARTICIPANT_LIMIT {
        return Err(ValidationRule::ParticipantLimitTooLarge {
            value,
            max: MAX_PARTICIPANT_LIMIT,
        });
    }
    Ok(())
}

struct LengthBounds {
    field: &'static str,
    min: usize,
    max: usize,
}

impl LengthBounds {
    fn check(&self, value: &str) -> Result<(), ValidationRule> {
        let actual = value.trim().chars().count();
        if (self.min..=self.max).contains(&actual) {
            Ok(())
        } else {
            Err(ValidationRule::FieldLength {
                field: self.field,
                min: self.min,
                max: self.max,
                actual,
            })
        }
    }
}

const TITLE_BOUNDS: LengthBounds = LengthBounds {
    field: "title",
    min: 3,
    max: 120,
};

const ANNOTATION_BOUNDS: LengthBounds = LengthBounds {
    field: "annotation",
    min: 20,
    max: 2000,
};

const DESCRIPTION_BOUNDS: LengthBounds = LengthBounds {
    field: "description",
    min: 20,
    max: 7000,
};

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, 1)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap_or_default()
    }

    fn draft() -> EventDraft {
        EventDraft {
            title: "Rust meetup".to_string(),
            annotation: "Monthly gathering of local Rustaceans".to_string(),
            description: "Talks about async, lifetimes and pizza".to_string(),
            category_id: CategoryId::new(1),
            initiator_id: UserId::new(1),
            location: Location { lat: 55.75, lon: 37.61 },
            paid: false,
            participant_limit: 10,
            request_moderation: true,
            event_date: at(20),
            created_on: at(8),
        }
    }

    #[test]
    fn draft_becomes_pending_event() {
        let event = draft().into_event(EventId::new(3));
        assert_eq!(event.state, EventState::Pending);
        assert_eq!(event.published_on, None);
        assert_eq!(event.views, 0);
    }

    #[test]
    fn publish_sets_published_on() {
        let mut event = draft().into_event(EventId::new(1));
        let Ok(()) = event.apply_transition(EventTransition::Publish, at(9)) else {
            panic!("pending event must publish");
        };
        assert_eq!(event.state, EventState::Published);
        assert_eq!(event.published_on, Some(at(9)));
    }

    #[test]
    fn published_event_is_locked_for_everything() {
        for transition in [
            EventTransition::SendToReview,
            EventTransition::CancelReview,
            EventTransition::Publish,
            EventTransition::Reject,
        ] {
            assert!(EventState::Published.transition(transition).is_err());
        }
        assert_eq!(
            EventState::Published.transition(EventTransition::Reject),
            Err(ForbiddenReason::PublishedEventRejection)
        );
    }

    #[test]
    fn canceled_event_can_return_to_review() {
        assert_eq!(
            EventState::Canceled.transition(EventTransition::SendToReview),
            Ok(EventState::Pending)
        );
        assert_eq!(
            EventState::Canceled.transition(EventTransition::Publish),
            Err(ForbiddenReason::EventNotPending {
                state: EventState::Canceled
            })
        );
    }

    #[test]
    fn failed_transition_leaves_event_untouched() {
        let mut event = draft().into_event(EventId::new(1));
        event.state = EventState::Canceled;
        let before = event.clone();
        assert!(event.apply_transition(EventTransition::Publish, at(9)).is_err());
        assert_eq!(event, before);
    }

    #[test]
    fn auto_confirm_rule() {
        let mut event = draft().into_event(EventId::new(1));
        assert!(!event.auto_confirms());
        event.participant_limit = 0;
        assert!(event.auto_confirms());
        event.participant_limit = 5;
        event.request_moderation = false;
        assert!(event.auto_confirms());
    }

    #[test]
    fn changes_apply_only_present_fields() {
        let mut event = draft().into_event(EventId::new(1));
        event.apply_changes(EventChanges {
            participant_limit: Some(3),
            event_date: Some(at(22) + Duration::days(1)),
            ..EventChanges::default()
        });
        assert_eq!(event.participant_limit, 3);
        assert_eq!(event.title, "Rust meetup");
        assert!(event.request_moderation);
    }

    #[test]
    fn text_bounds_are_checked() {
        let mut short = draft();
        short.title = "ab".to_string();
        assert!(matches!(
            short.validate(),
            Err(ValidationRule::FieldLength { field: "title", .. })
        ));

        let changes = EventChanges {
            annotation: Some("too short".to_string()),
            ..EventChanges::default()
        };
        assert!(matches!(
            changes.validate(),
            Err(ValidationRule::FieldLength {
                field: "annotation",
                actual: 9,
                ..
            })
        ));
    }

    #[test]
    fn participant_limit_ceiling_is_checked() {
        let mut huge = draft();
        huge.participant_limit = MAX_PARTICIPANT_LIMIT + 1;
        assert_eq!(
            huge.validate(),
            Err(ValidationRule::ParticipantLimitTooLarge {
                value: MAX_PARTICIPANT_LIMIT + 1,
                max: MAX_PARTICIPANT_LIMIT,
            })
        );

        let mut largest = draft();
        largest.participant_limit = MAX_PARTICIPANT_LIMIT;
        assert_eq!(largest.validate(), Ok(()));

        let changes = EventChanges {
            participant_limit: Some(u32::MAX),
            ..EventChanges::default()
        };
        assert!(matches!(
            changes.validate(),
            Err(ValidationRule::ParticipantLimitTooLarge { .. })
        ));
    }

    #[test]
    fn action_tokens_parse() {
        assert_eq!(
            "CANCEL_REVIEW".parse::<StateUserAction>(),
            Ok(StateUserAction::CancelReview)
        );
        assert_eq!(
            "PUBLISH_EVENT".parse::<StateAdminAction>(),
            Ok(StateAdminAction::PublishEvent)
        );
        assert_eq!(
            "PUBLISH_EVENT".parse::<StateUserAction>(),
            Err(ValidationRule::UnknownStateAction(
                "PUBLISH_EVENT".to_string()
            ))
        );
    }
}
