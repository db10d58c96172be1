//! Participation requests and their status transition table.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{EventId, RequestId, UserId};
use crate::error::{ForbiddenReason, ValidationRule};

/// Status of a participation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Awaiting the initiator's decision.
    Pending,
    /// Counted against the event's participant limit.
    Confirmed,
    /// Declined by the initiator or by cascade.
    Rejected,
    /// Withdrawn by a user.
    Canceled,
}

impl RequestStatus {
    /// Every status, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::Confirmed,
        Self::Rejected,
        Self::Canceled,
    ];

    /// Returns the wire token (`"PENDING"`, `"CONFIRMED"`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Rejected => "REJECTED",
            Self::Canceled => "CANCELED",
        }
    }

    /// Applies the transition table.
    ///
    /// | from      | to                   |
    /// |-----------|----------------------|
    /// | PENDING   | CONFIRMED, REJECTED  |
    /// | any       | CANCELED             |
    ///
    /// Cancellation carries no status guard: a confirmed or rejected
    /// request may still be canceled by a user.
    ///
    /// # Errors
    ///
    /// Returns [`ForbiddenReason::RequestNotPending`] for any transition
    /// outside the table.
    pub fn transition(
        self,
        request_id: RequestId,
        target: Self,
    ) -> Result<Self, ForbiddenReason> {
        match (self, target) {
            (Self::Pending, Self::Confirmed | Self::Rejected) | (_, Self::Canceled) => Ok(target),
            _ => Err(ForbiddenReason::RequestNotPending {
                request_id,
                status: self,
            }),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = ValidationRule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationRule::UnknownStatus(s.to_string()))
    }
}

/// Target of a bulk status change chosen by the event initiator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkTarget {
    /// Confirm requests up to the participant limit.
    Confirm,
    /// Reject every selected request.
    Reject,
}

impl FromStr for BulkTarget {
    type Err = ValidationRule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONFIRMED" => Ok(Self::Confirm),
            "REJECTED" => Ok(Self::Reject),
            other => Err(ValidationRule::UnknownStatus(other.to_string())),
        }
    }
}

/// A user's request to take part in an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationRequest {
    /// Request identifier.
    pub id: RequestId,
    /// Event the request targets.
    pub event_id: EventId,
    /// User asking to participate.
    pub requester_id: UserId,
    /// Current status.
    pub status: RequestStatus,
    /// Submission instant.
    pub created: NaiveDateTime,
}

impl ParticipationRequest {
    /// Moves the request to `target` through [`RequestStatus::transition`].
    ///
    /// # Errors
    ///
    /// Returns [`ForbiddenReason::RequestNotPending`] if the transition is
    /// not in the table; the request is left unchanged.
    pub fn transition_to(&mut self, target: RequestStatus) -> Result<(), ForbiddenReason> {
        self.status = self.status.transition(self.id, target)?;
        Ok(())
    }
}

/// A request that has not been assigned an identifier yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDraft {
    /// Event the request targets.
    pub event_id: EventId,
    /// User asking to participate.
    pub requester_id: UserId,
    /// Initial status decided by admission.
    pub status: RequestStatus,
    /// Submission instant.
    pub created: NaiveDateTime,
}

impl RequestDraft {
    /// Materializes the draft under the identifier assigned by the ledger.
    #[must_use]
    pub fn into_request(self, id: RequestId) -> ParticipationRequest {
        ParticipationRequest {
            id,
            event_id: self.event_id,
            requester_id: self.requester_id,
            status: self.status,
            created: self.created,
        }
    }
}

/// Outcome of a bulk status change, split for rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusUpdateResult {
    /// Requests confirmed by the call, in caller order.
    pub confirmed: Vec<ParticipationRequest>,
    /// Requests rejected from the caller's batch, in caller order.
    pub rejected: Vec<ParticipationRequest>,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const ID: RequestId = RequestId::new(1);

    #[test]
    fn pending_moves_to_decisions() {
        assert_eq!(
            RequestStatus::Pending.transition(ID, RequestStatus::Confirmed),
            Ok(RequestStatus::Confirmed)
        );
        assert_eq!(
            RequestStatus::Pending.transition(ID, RequestStatus::Rejected),
            Ok(RequestStatus::Rejected)
        );
    }

    #[test]
    fn decisions_require_pending() {
        for from in [
            RequestStatus::Confirmed,
            RequestStatus::Rejected,
            RequestStatus::Canceled,
        ] {
            for to in [RequestStatus::Confirmed, RequestStatus::Rejected] {
                assert_eq!(
                    from.transition(ID, to),
                    Err(ForbiddenReason::RequestNotPending {
                        request_id: ID,
                        status: from,
                    })
                );
            }
        }
    }

    #[test]
    fn nothing_returns_to_pending() {
        for from in RequestStatus::ALL {
            assert!(from.transition(ID, RequestStatus::Pending).is_err());
        }
    }

    #[test]
    fn cancel_is_always_allowed() {
        for from in RequestStatus::ALL {
            assert_eq!(
                from.transition(ID, RequestStatus::Canceled),
                Ok(RequestStatus::Canceled)
            );
        }
    }

    #[test]
    fn bulk_target_accepts_only_decisions() {
        assert_eq!("CONFIRMED".parse::<BulkTarget>(), Ok(BulkTarget::Confirm));
        assert_eq!("REJECTED".parse::<BulkTarget>(), Ok(BulkTarget::Reject));
        assert_eq!(
            "PENDING".parse::<BulkTarget>(),
            Err(ValidationRule::UnknownStatus("PENDING".to_string()))
        );
        assert!("confirmed".parse::<BulkTarget>().is_err());
    }

    #[test]
    fn status_tokens_round_trip() {
        for status in RequestStatus::ALL {
            let Ok(parsed) = status.as_str().parse::<RequestStatus>() else {
                panic!("token {status} did not parse");
            };
            assert_eq!(parsed, status);
        }
        let json = serde_json::to_string(&RequestStatus::Canceled).unwrap_or_default();
        assert_eq!(json, "\"CANCELED\"");
    }
}
