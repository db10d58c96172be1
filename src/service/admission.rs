//! Admission controller: participation requests against event capacity.

use std::sync::Arc;

use crate::domain::{
    AdmissionLocks, BulkTarget, Clock, Event, EventId, EventState, ParticipationRequest,
    RequestDraft, RequestId, RequestStatus, StatusUpdateResult, UserId,
};
use crate::error::{Entity, ForbiddenReason, ServiceError};
use crate::persistence::{EventStore, RequestLedger, StatusBatch, UserDirectory, dedup_ids};

/// Orchestrates participation requests.
///
/// Every capacity decision (submission and bulk status change) runs
/// inside the event's admission lock and recomputes the confirmed count
/// from the ledger, so two concurrent admissions never both observe the
/// last free seat.
#[derive(Debug)]
pub struct AdmissionController {
    users: Arc<dyn UserDirectory>,
    events: Arc<dyn EventStore>,
    ledger: Arc<dyn RequestLedger>,
    locks: Arc<AdmissionLocks>,
    clock: Arc<dyn Clock>,
}

impl AdmissionController {
    /// Creates a new `AdmissionController`.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserDirectory>,
        events: Arc<dyn EventStore>,
        ledger: Arc<dyn RequestLedger>,
        locks: Arc<AdmissionLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            events,
            ledger,
            locks,
            clock,
        }
    }

    /// Submits a participation request from `requester_id` for `event_id`.
    ///
    /// The request starts `CONFIRMED` when the event has no limit or no
    /// moderation, `PENDING` otherwise.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotFound`] if the user or the event is missing.
    /// - [`ServiceError::Forbidden`] for a duplicate request, a request on
    ///   the user's own event, an unpublished event, or a full event.
    /// - [`ServiceError::AdmissionBusy`] if the event lock wait times out.
    pub async fn submit_request(
        &self,
        requester_id: UserId,
        event_id: EventId,
    ) -> Result<ParticipationRequest, ServiceError> {
        self.require_user(requester_id).await?;
        self.load_event(event_id).await?;

        let _guard = self.locks.acquire(event_id).await?;
        let event = self.load_event(event_id).await?;

        let existing = self
            .ledger
            .find_by_requester_and_event(requester_id, event_id)
            .await?;
        if existing.iter().any(|r| r.status != RequestStatus::Canceled) {
            return Err(reject(event_id, ForbiddenReason::DuplicateRequest));
        }
        if event.initiator_id == requester_id {
            return Err(reject(event_id, ForbiddenReason::OwnEvent));
        }
        if event.state != EventState::Published {
            return Err(reject(event_id, ForbiddenReason::EventNotPublished));
        }
        if event.has_limit() {
            let confirmed = self.confirmed_count(event_id).await?;
            if confirmed >= u64::from(event.participant_limit) {
                return Err(reject(event_id, ForbiddenReason::ParticipantLimitReached));
            }
        }

        let status = if event.auto_confirms() {
            RequestStatus::Confirmed
        } else {
            RequestStatus::Pending
        };
        let request = self
            .ledger
            .insert(RequestDraft {
                event_id,
                requester_id,
                status,
                created: self.clock.now(),
            })
            .await?;

        tracing::info!(
            request_id = %request.id,
            %event_id,
            %requester_id,
            %status,
            "participation request submitted"
        );
        Ok(request)
    }

    /// Cancels a participation request.
    ///
    /// Neither ownership nor the current status is checked, and the
    /// admission lock is not taken: capacity is always recomputed from
    /// live statuses.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] if the user or the request is
    /// missing.
    pub async fn cancel_request(
        &self,
        requester_id: UserId,
        request_id: RequestId,
    ) -> Result<ParticipationRequest, ServiceError> {
        self.require_user(requester_id).await?;
        let mut request = self
            .ledger
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(Entity::Request, request_id))?;

        let previous = request.status;
        request.transition_to(RequestStatus::Canceled)?;
        self.ledger.save(&request).await?;

        tracing::info!(
            %request_id,
            %requester_id,
            %previous,
            "participation request canceled"
        );
        Ok(request)
    }

    /// Lists every request submitted by `requester_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] if the user is missing.
    pub async fn list_by_requester(
        &self,
        requester_id: UserId,
    ) -> Result<Vec<ParticipationRequest>, ServiceError> {
        self.require_user(requester_id).await?;
        let requests = self.ledger.find_by_requester(requester_id).await?;
        tracing::debug!(%requester_id, count = requests.len(), "listed requests by requester");
        Ok(requests)
    }

    /// Lists the requests of `event_id` if it belongs to `owner_id`.
    ///
    /// An event that is missing or owned by someone else yields an empty
    /// list rather than an error.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] if the owner is missing.
    pub async fn list_by_event_owner(
        &self,
        owner_id: UserId,
        event_id: EventId,
    ) -> Result<Vec<ParticipationRequest>, ServiceError> {
        self.require_user(owner_id).await?;
        let owned = self
            .events
            .get(event_id)
            .await?
            .is_some_and(|event| event.initiator_id == owner_id);
        if !owned {
            tracing::debug!(%owner_id, %event_id, "event not owned, no requests listed");
            return Ok(Vec::new());
        }
        self.ledger.find_by_event(event_id).await
    }

    /// Confirms or rejects a batch of pending requests for `event_id`.
    ///
    /// `target` must be `"CONFIRMED"` or `"REJECTED"`. Ids are processed
    /// in the given order after collapsing repeats; ids that do not name a
    /// request of this event are skipped. When confirming fills the last
    /// seat, every other pending request of the event is rejected in the
    /// same commit. Requests rejected by that cascade are not part of the
    /// returned result.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Validation`] for an unsupported `target`.
    /// - [`ServiceError::NotFound`] if the owner or the event is missing.
    /// - [`ServiceError::Forbidden`] if confirmation is not applicable to
    ///   the event, the event is already full, or a selected request is
    ///   not pending. Nothing is written in that case.
    /// - [`ServiceError::AdmissionBusy`] if the event lock wait times out.
    pub async fn bulk_update_status(
        &self,
        owner_id: UserId,
        event_id: EventId,
        request_ids: &[RequestId],
        target: &str,
    ) -> Result<StatusUpdateResult, ServiceError> {
        let target: BulkTarget = target.parse()?;
        self.require_user(owner_id).await?;
        self.load_event(event_id).await?;

        let _guard = self.locks.acquire(event_id).await?;
        let event = self.load_event(event_id).await?;

        let selected: Vec<ParticipationRequest> = self
            .ledger
            .find_by_ids(&dedup_ids(request_ids))
            .await?
            .into_iter()
            .filter(|r| r.event_id == event_id)
            .collect();
        if selected.is_empty() {
            tracing::debug!(%event_id, "no requests of this event selected");
            return Ok(StatusUpdateResult::default());
        }

        let (result, batch) = match target {
            BulkTarget::Confirm => {
                let confirmed = self.confirmed_count(event_id).await?;
                plan_confirmation(&event, confirmed, selected)?
            }
            BulkTarget::Reject => plan_rejection(selected)?,
        };

        let cascaded = self.ledger.save_all(batch).await.inspect_err(|err| {
            if let ServiceError::Forbidden(reason) = err {
                tracing::warn!(%event_id, rule = reason.token(), "status batch discarded");
            }
        })?;
        tracing::info!(
            %event_id,
            %owner_id,
            confirmed = result.confirmed.len(),
            rejected = result.rejected.len(),
            cascaded,
            "request statuses updated"
        );
        Ok(result)
    }

    async fn require_user(&self, id: UserId) -> Result<(), ServiceError> {
        if self.users.exists(id).await? {
            Ok(())
        } else {
            Err(ServiceError::not_found(Entity::User, id))
        }
    }

    async fn load_event(&self, id: EventId) -> Result<Event, ServiceError> {
        self.events
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(Entity::Event, id))
    }

    async fn confirmed_count(&self, event_id: EventId) -> Result<u64, ServiceError> {
        self.ledger
            .count_by_event_and_status(event_id, RequestStatus::Confirmed)
            .await
    }
}

fn reject(event_id: EventId, reason: ForbiddenReason) -> ServiceError {
    tracing::warn!(%event_id, rule = reason.token(), "participation request refused");
    ServiceError::Forbidden(reason)
}

/// Decides the outcome of a bulk confirmation without writing anything.
fn plan_confirmation(
    event: &Event,
    mut confirmed: u64,
    selected: Vec<ParticipationRequest>,
) -> Result<(StatusUpdateResult, StatusBatch), ServiceError> {
    if !event.has_limit() || !event.request_moderation {
        return Err(reject(event.id, ForbiddenReason::BulkConfirmNotApplicable));
    }
    let limit = u64::from(event.participant_limit);
    if confirmed >= limit {
        return Err(reject(event.id, ForbiddenReason::ParticipantLimitReached));
    }

    let mut result = StatusUpdateResult::default();
    let mut requests = Vec::with_capacity(selected.len());
    for mut request in selected {
        if confirmed < limit {
            request.transition_to(RequestStatus::Confirmed)?;
            confirmed += 1;
            result.confirmed.push(request.clone());
        } else {
            request.transition_to(RequestStatus::Rejected)?;
            result.rejected.push(request.clone());
        }
        requests.push(request);
    }

    let batch = StatusBatch {
        requests,
        reject_remaining_pending: (confirmed >= limit).then_some(event.id),
    };
    Ok((result, batch))
}

/// Rejects every selected request, failing if any is not pending.
fn plan_rejection(
    selected: Vec<ParticipationRequest>,
) -> Result<(StatusUpdateResult, StatusBatch), ServiceError> {
    let mut requests = Vec::with_capacity(selected.len());
    for mut request in selected {
        request.transition_to(RequestStatus::Rejected)?;
        requests.push(request);
    }
    let result = StatusUpdateResult {
        confirmed: Vec::new(),
        rejected: requests.clone(),
    };
    let batch = StatusBatch {
        requests,
        reject_remaining_pending: None,
    };
    Ok((result, batch))
}
