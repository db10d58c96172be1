//! Event search criteria, paging, and result ordering.

use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;

use super::{CategoryId, Event, EventState, UserId};
use crate::error::ValidationRule;

/// Offset/limit window over an ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    from: u32,
    size: u32,
}

impl Page {
    /// Page size used when the caller gives none.
    pub const DEFAULT_SIZE: u32 = 10;

    /// Creates a window skipping `from` items and keeping at most `size`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationRule::EmptyPage`] if `size` is zero.
    pub const fn new(from: u32, size: u32) -> Result<Self, ValidationRule> {
        if size == 0 {
            return Err(ValidationRule::EmptyPage);
        }
        Ok(Self { from, size })
    }

    /// Number of items skipped.
    #[must_use]
    pub const fn from(self) -> u32 {
        self.from
    }

    /// Maximum number of items kept.
    #[must_use]
    pub const fn size(self) -> u32 {
        self.size
    }

    /// Cuts this window out of `items`.
    #[must_use]
    pub fn slice<T>(self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.from as usize)
            .take(self.size as usize)
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            from: 0,
            size: Self::DEFAULT_SIZE,
        }
    }
}

/// Ordering of public search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSort {
    /// Soonest event first.
    EventDate,
    /// Most viewed event first.
    Views,
}

impl EventSort {
    /// Returns the wire token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EventDate => "EVENT_DATE",
            Self::Views => "VIEWS",
        }
    }

    /// Sorts `items` in place by the event each one carries. Ties keep
    /// their id order.
    pub fn apply<T>(self, items: &mut [T], event: impl Fn(&T) -> &Event) {
        match self {
            Self::EventDate => items.sort_by_key(|item| event(item).event_date),
            Self::Views => items.sort_by_key(|item| Reverse(event(item).views)),
        }
    }
}

impl fmt::Display for EventSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventSort {
    type Err = ValidationRule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EVENT_DATE" => Ok(Self::EventDate),
            "VIEWS" => Ok(Self::Views),
            other => Err(ValidationRule::UnknownSort(other.to_string())),
        }
    }
}

/// Filter handed to the event store. Empty lists and `None` match
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    /// Initiators to keep.
    pub initiators: Vec<UserId>,
    /// States to keep.
    pub states: Vec<EventState>,
    /// Categories to keep.
    pub categories: Vec<CategoryId>,
    /// Case-insensitive fragment of the annotation or description.
    pub text: Option<String>,
    /// Paid flag to keep.
    pub paid: Option<bool>,
    /// Earliest event date, inclusive.
    pub range_start: Option<NaiveDateTime>,
    /// Latest event date, inclusive.
    pub range_end: Option<NaiveDateTime>,
    /// Window over the id-ordered matches. `None` returns every match.
    pub page: Option<Page>,
}

impl EventQuery {
    /// Returns `true` if `event` passes every filter (paging aside).
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        let text_matches = self.text.as_deref().is_none_or(|text| {
            let needle = text.to_lowercase();
            event.annotation.to_lowercase().contains(&needle)
                || event.description.to_lowercase().contains(&needle)
        });
        (self.initiators.is_empty() || self.initiators.contains(&event.initiator_id))
            && (self.states.is_empty() || self.states.contains(&event.state))
            && (self.categories.is_empty() || self.categories.contains(&event.category_id))
            && self.paid.is_none_or(|paid| event.paid == paid)
            && self.range_start.is_none_or(|start| event.event_date >= start)
            && self.range_end.is_none_or(|end| event.event_date <= end)
            && text_matches
    }
}

/// Checks that a search range is not inverted.
///
/// # Errors
///
/// Returns [`ValidationRule::InvalidRange`] if `start` is after `end`.
pub fn check_range(
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
) -> Result<(), ValidationRule> {
    match (start, end) {
        (Some(start), Some(end)) if start > end => Err(ValidationRule::InvalidRange { start, end }),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{EventDraft, EventId, Location};
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 9, day)
            .and_then(|d| d.and_hms_opt(19, 0, 0))
            .unwrap_or_default()
    }

    fn event(id: i64, day: u32, views: u64) -> Event {
        let mut event = EventDraft {
            title: "Film club".to_string(),
            annotation: "Screening of a Kurosawa classic".to_string(),
            description: "Discussion with tea after the film".to_string(),
            category_id: CategoryId::new(2),
            initiator_id: UserId::new(1),
            location: Location::default(),
            paid: true,
            participant_limit: 0,
            request_moderation: true,
            event_date: at(day),
            created_on: at(1),
        }
        .into_event(EventId::new(id));
        event.views = views;
        event
    }

    #[test]
    fn zero_size_page_is_invalid() {
        assert_eq!(Page::new(0, 0), Err(ValidationRule::EmptyPage));
        let Ok(page) = Page::new(2, 2) else {
            panic!("valid page rejected");
        };
        assert_eq!(page.slice(vec![1, 2, 3, 4, 5]), vec![3, 4]);
        assert_eq!(Page::default().slice(vec![1, 2]), vec![1, 2]);
    }

    #[test]
    fn sort_tokens() {
        assert_eq!("VIEWS".parse::<EventSort>(), Ok(EventSort::Views));
        assert_eq!(
            "POPULARITY".parse::<EventSort>(),
            Err(ValidationRule::UnknownSort("POPULARITY".to_string()))
        );
    }

    #[test]
    fn sorting_by_date_and_views() {
        let mut events = vec![event(1, 20, 5), event(2, 10, 9), event(3, 15, 5)];
        EventSort::EventDate.apply(&mut events, |e| e);
        let ids: Vec<i64> = events.iter().map(|e| e.id.get()).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        events.sort_by_key(|e| e.id);
        EventSort::Views.apply(&mut events, |e| e);
        let ids: Vec<i64> = events.iter().map(|e| e.id.get()).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn query_filters_combine() {
        let film = event(1, 20, 0);
        let query = EventQuery {
            text: Some("KUROSAWA".to_string()),
            categories: vec![CategoryId::new(2)],
            paid: Some(true),
            range_start: Some(at(20)),
            range_end: Some(at(20)),
            ..EventQuery::default()
        };
        assert!(query.matches(&film));
        assert!(EventQuery::default().matches(&film));

        let other_state = EventQuery {
            states: vec![EventState::Published],
            ..EventQuery::default()
        };
        assert!(!other_state.matches(&film));

        let later = EventQuery {
            range_start: Some(at(21)),
            ..EventQuery::default()
        };
        assert!(!later.matches(&film));
    }

    #[test]
    fn inverted_range_is_invalid() {
        assert!(check_range(Some(at(2)), Some(at(1))).is_err());
        assert!(check_range(Some(at(1)), Some(at(1))).is_ok());
        assert!(check_range(None, Some(at(1))).is_ok());
    }
}
