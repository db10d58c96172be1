//! In-process backend for every collaborator trait.
//!
//! All tables live behind a single [`tokio::sync::RwLock`], so each trait
//! call (including [`RequestLedger::save_all`] with its cascade) is atomic
//! with respect to every other call.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::RwLock;

use super::{
    CategoryCatalog, EventStore, Hit, RequestLedger, StatusBatch, TelemetrySink, UserDirectory,
};
use crate::domain::{
    CategoryId, Event, EventDraft, EventId, EventQuery, ParticipationRequest, RequestDraft,
    RequestId, RequestStatus, UserId,
};
use crate::error::{Entity, ForbiddenReason, ServiceError};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeSet<UserId>,
    categories: BTreeSet<CategoryId>,
    events: BTreeMap<EventId, Event>,
    requests: BTreeMap<RequestId, ParticipationRequest>,
    next_event_id: i64,
    next_request_id: i64,
}

impl Tables {
    fn allocate_event_id(&mut self) -> EventId {
        self.next_event_id += 1;
        EventId::new(self.next_event_id)
    }

    fn allocate_request_id(&mut self) -> RequestId {
        self.next_request_id += 1;
        RequestId::new(self.next_request_id)
    }
}

/// In-memory users, categories, events, and participation requests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user so that directory lookups find it.
    pub async fn add_user(&self, id: UserId) {
        self.tables.write().await.users.insert(id);
    }

    /// Registers a category so that catalog lookups find it.
    pub async fn add_category(&self, id: CategoryId) {
        self.tables.write().await.categories.insert(id);
    }

    /// Returns the number of stored participation requests.
    pub async fn request_count(&self) -> usize {
        self.tables.read().await.requests.len()
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn exists(&self, id: UserId) -> Result<bool, ServiceError> {
        Ok(self.tables.read().await.users.contains(&id))
    }
}

#[async_trait]
impl CategoryCatalog for MemoryStore {
    async fn exists(&self, id: CategoryId) -> Result<bool, ServiceError> {
        Ok(self.tables.read().await.categories.contains(&id))
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn get(&self, id: EventId) -> Result<Option<Event>, ServiceError> {
        Ok(self.tables.read().await.events.get(&id).cloned())
    }

    async fn insert(&self, draft: EventDraft) -> Result<Event, ServiceError> {
        let mut tables = self.tables.write().await;
        let id = tables.allocate_event_id();
        let event = draft.into_event(id);
        tables.events.insert(id, event.clone());
        Ok(event)
    }

    async fn save(&self, event: &Event) -> Result<(), ServiceError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .events
            .get_mut(&event.id)
            .ok_or_else(|| ServiceError::not_found(Entity::Event, event.id))?;
        let views = slot.views;
        *slot = event.clone();
        slot.views = views;
        Ok(())
    }

    async fn increment_views(&self, id: EventId) -> Result<u64, ServiceError> {
        let mut tables = self.tables.write().await;
        let event = tables
            .events
            .get_mut(&id)
            .ok_or_else(|| ServiceError::not_found(Entity::Event, id))?;
        event.views = event.views.saturating_add(1);
        Ok(event.views)
    }

    async fn find(&self, query: &EventQuery) -> Result<Vec<Event>, ServiceError> {
        let tables = self.tables.read().await;
        let matching: Vec<Event> = tables
            .events
            .values()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        Ok(match query.page {
            Some(page) => page.slice(matching),
            None => matching,
        })
    }
}

#[async_trait]
impl RequestLedger for MemoryStore {
    async fn find_by_requester_and_event(
        &self,
        requester_id: UserId,
        event_id: EventId,
    ) -> Result<Vec<ParticipationRequest>, ServiceError> {
        let tables = self.tables.read().await;
        Ok(tables
            .requests
            .values()
            .filter(|r| r.requester_id == requester_id && r.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: RequestId) -> Result<Option<ParticipationRequest>, ServiceError> {
        Ok(self.tables.read().await.requests.get(&id).cloned())
    }

    async fn find_by_ids(
        &self,
        ids: &[RequestId],
    ) -> Result<Vec<ParticipationRequest>, ServiceError> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.requests.get(id).cloned())
            .collect())
    }

    async fn find_by_requester(
        &self,
        requester_id: UserId,
    ) -> Result<Vec<ParticipationRequest>, ServiceError> {
        let tables = self.tables.read().await;
        Ok(tables
            .requests
            .values()
            .filter(|r| r.requester_id == requester_id)
            .cloned()
            .collect())
    }

    async fn find_by_event(
        &self,
        event_id: EventId,
    ) -> Result<Vec<ParticipationRequest>, ServiceError> {
        let tables = self.tables.read().await;
        Ok(tables
            .requests
            .values()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn count_by_event_and_status(
        &self,
        event_id: EventId,
        status: RequestStatus,
    ) -> Result<u64, ServiceError> {
        let tables = self.tables.read().await;
        let count = tables
            .requests
            .values()
            .filter(|r| r.event_id == event_id && r.status == status)
            .count();
        Ok(count as u64)
    }

    async fn insert(&self, draft: RequestDraft) -> Result<ParticipationRequest, ServiceError> {
        let mut tables = self.tables.write().await;
        let id = tables.allocate_request_id();
        let request = draft.into_request(id);
        tables.requests.insert(id, request.clone());
        Ok(request)
    }

    async fn save(&self, request: &ParticipationRequest) -> Result<(), ServiceError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .requests
            .get_mut(&request.id)
            .ok_or_else(|| ServiceError::not_found(Entity::Request, request.id))?;
        *slot = request.clone();
        Ok(())
    }

    async fn confirmed_counts(
        &self,
        event_ids: &[EventId],
    ) -> Result<HashMap<EventId, u64>, ServiceError> {
        let tables = self.tables.read().await;
        let mut counts = HashMap::new();
        for request in tables.requests.values().filter(|r| {
            r.status == RequestStatus::Confirmed && event_ids.contains(&r.event_id)
        }) {
            *counts.entry(request.event_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn save_all(&self, batch: StatusBatch) -> Result<u64, ServiceError> {
        let mut tables = self.tables.write().await;
        for request in &batch.requests {
            let stored = tables
                .requests
                .get(&request.id)
                .ok_or_else(|| ServiceError::not_found(Entity::Request, request.id))?;
            if stored.status != RequestStatus::Pending {
                return Err(ForbiddenReason::RequestNotPending {
                    request_id: request.id,
                    status: stored.status,
                }
                .into());
            }
        }
        for request in batch.requests {
            tables.requests.insert(request.id, request);
        }

        let mut cascaded = 0;
        if let Some(event_id) = batch.reject_remaining_pending {
            for request in tables
                .requests
                .values_mut()
                .filter(|r| r.event_id == event_id && r.status == RequestStatus::Pending)
            {
                request.status = RequestStatus::Rejected;
                cascaded += 1;
            }
        }
        Ok(cascaded)
    }
}

/// In-memory hit log standing in for the statistics service.
#[derive(Debug, Default)]
pub struct InMemoryTelemetry {
    hits: RwLock<Vec<Hit>>,
}

impl InMemoryTelemetry {
    /// Creates an empty hit log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TelemetrySink for InMemoryTelemetry {
    async fn record_hit(&self, hit: Hit) -> Result<(), ServiceError> {
        self.hits.write().await.push(hit);
        Ok(())
    }

    async fn query_hit_count(
        &self,
        uris: &[String],
        from: NaiveDateTime,
        to: NaiveDateTime,
        unique: bool,
    ) -> Result<u64, ServiceError> {
        let hits = self.hits.read().await;
        let matching = hits
            .iter()
            .filter(|h| h.timestamp >= from && h.timestamp <= to)
            .filter(|h| uris.is_empty() || uris.contains(&h.uri));
        let count = if unique {
            matching
                .map(|h| (h.uri.as_str(), h.ip.as_str()))
                .collect::<HashSet<_>>()
                .len()
        } else {
            matching.count()
        };
        Ok(count as u64)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Page;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap_or_default()
    }

    fn draft(event: i64, requester: i64, status: RequestStatus) -> RequestDraft {
        RequestDraft {
            event_id: EventId::new(event),
            requester_id: UserId::new(requester),
            status,
            created: at(10),
        }
    }

    fn event_draft(initiator: i64, limit: u32) -> EventDraft {
        EventDraft {
            title: "Chess simul".to_string(),
            annotation: "One master against twenty boards".to_string(),
            description: "Bring a board if you have one, clocks provided".to_string(),
            category_id: CategoryId::new(1),
            initiator_id: UserId::new(initiator),
            location: crate::domain::Location::default(),
            paid: false,
            participant_limit: limit,
            request_moderation: true,
            event_date: at(20),
            created_on: at(8),
        }
    }

    async fn count(store: &MemoryStore, event: i64, status: RequestStatus) -> u64 {
        store
            .count_by_event_and_status(EventId::new(event), status)
            .await
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let Ok(first) = RequestLedger::insert(&store, draft(1, 2, RequestStatus::Pending)).await
        else {
            panic!("insert failed");
        };
        let Ok(second) = RequestLedger::insert(&store, draft(1, 3, RequestStatus::Pending)).await
        else {
            panic!("insert failed");
        };
        assert_eq!(first.id, RequestId::new(1));
        assert_eq!(second.id, RequestId::new(2));
        assert_eq!(store.request_count().await, 2);
    }

    #[tokio::test]
    async fn find_by_ids_keeps_caller_order_and_skips_unknown() {
        let store = MemoryStore::new();
        for requester in 2..=4 {
            let _ = RequestLedger::insert(&store, draft(1, requester, RequestStatus::Pending)).await;
        }
        let ids = [RequestId::new(3), RequestId::new(99), RequestId::new(1)];
        let Ok(found) = store.find_by_ids(&ids).await else {
            panic!("lookup failed");
        };
        let found_ids: Vec<_> = found.iter().map(|r| r.id).collect();
        assert_eq!(found_ids, vec![RequestId::new(3), RequestId::new(1)]);
    }

    #[tokio::test]
    async fn save_all_cascades_only_pending_of_event() {
        let store = MemoryStore::new();
        let _ = RequestLedger::insert(&store, draft(1, 2, RequestStatus::Pending)).await;
        let _ = RequestLedger::insert(&store, draft(1, 3, RequestStatus::Pending)).await;
        let _ = RequestLedger::insert(&store, draft(1, 4, RequestStatus::Canceled)).await;
        let _ = RequestLedger::insert(&store, draft(2, 5, RequestStatus::Pending)).await;

        let Ok(Some(mut chosen)) = store.find_by_id(RequestId::new(1)).await else {
            panic!("request 1 missing");
        };
        chosen.status = RequestStatus::Confirmed;

        let batch = StatusBatch {
            requests: vec![chosen],
            reject_remaining_pending: Some(EventId::new(1)),
        };
        let Ok(cascaded) = store.save_all(batch).await else {
            panic!("save_all failed");
        };
        assert_eq!(cascaded, 1);

        assert_eq!(count(&store, 1, RequestStatus::Confirmed).await, 1);
        assert_eq!(count(&store, 1, RequestStatus::Rejected).await, 1);
        assert_eq!(count(&store, 1, RequestStatus::Canceled).await, 1);
        assert_eq!(count(&store, 2, RequestStatus::Pending).await, 1);
    }

    #[tokio::test]
    async fn save_all_with_unknown_request_writes_nothing() {
        let store = MemoryStore::new();
        let _ = RequestLedger::insert(&store, draft(1, 2, RequestStatus::Pending)).await;
        let Ok(Some(mut known)) = store.find_by_id(RequestId::new(1)).await else {
            panic!("request 1 missing");
        };
        known.status = RequestStatus::Rejected;
        let mut ghost = known.clone();
        ghost.id = RequestId::new(42);

        let result = store
            .save_all(StatusBatch {
                requests: vec![known, ghost],
                reject_remaining_pending: None,
            })
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound { .. })));
        assert_eq!(count(&store, 1, RequestStatus::Pending).await, 1);
    }

    #[tokio::test]
    async fn save_all_refuses_requests_that_left_pending() {
        let store = MemoryStore::new();
        let _ = RequestLedger::insert(&store, draft(1, 2, RequestStatus::Pending)).await;
        let _ = RequestLedger::insert(&store, draft(1, 3, RequestStatus::Pending)).await;
        let Ok(found) = store.find_by_ids(&[RequestId::new(1), RequestId::new(2)]).await else {
            panic!("lookup failed");
        };

        let Some(mut withdrawn) = found.get(1).cloned() else {
            panic!("request 2 missing");
        };
        withdrawn.status = RequestStatus::Canceled;
        let Ok(()) = RequestLedger::save(&store, &withdrawn).await else {
            panic!("cancel failed");
        };

        let confirmed: Vec<_> = found
            .into_iter()
            .map(|mut r| {
                r.status = RequestStatus::Confirmed;
                r
            })
            .collect();
        let result = store
            .save_all(StatusBatch {
                requests: confirmed,
                reject_remaining_pending: Some(EventId::new(1)),
            })
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::Forbidden(ForbiddenReason::RequestNotPending {
                status: RequestStatus::Canceled,
                ..
            }))
        ));
        assert_eq!(count(&store, 1, RequestStatus::Pending).await, 1);
        assert_eq!(count(&store, 1, RequestStatus::Canceled).await, 1);
        assert_eq!(count(&store, 1, RequestStatus::Confirmed).await, 0);
    }

    #[tokio::test]
    async fn save_keeps_views_and_increment_adds_one() {
        let store = MemoryStore::new();
        let Ok(event) = EventStore::insert(&store, event_draft(1, 5)).await else {
            panic!("event insert failed");
        };
        assert_eq!(store.increment_views(event.id).await.ok(), Some(1));
        assert_eq!(store.increment_views(event.id).await.ok(), Some(2));

        let mut stale = event.clone();
        stale.participant_limit = 9;
        let Ok(()) = EventStore::save(&store, &stale).await else {
            panic!("event save failed");
        };
        let Ok(Some(stored)) = EventStore::get(&store, event.id).await else {
            panic!("event vanished");
        };
        assert_eq!((stored.participant_limit, stored.views), (9, 2));
        assert!(matches!(
            store.increment_views(EventId::new(99)).await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn find_filters_then_pages_by_id() {
        let store = MemoryStore::new();
        for initiator in [1, 2, 1, 1] {
            let _ = EventStore::insert(&store, event_draft(initiator, 0)).await;
        }
        let Ok(page) = Page::new(1, 5) else {
            panic!("valid page rejected");
        };
        let query = EventQuery {
            initiators: vec![UserId::new(1)],
            page: Some(page),
            ..EventQuery::default()
        };
        let Ok(found) = store.find(&query).await else {
            panic!("search failed");
        };
        let ids: Vec<i64> = found.iter().map(|e| e.id.get()).collect();
        assert_eq!(ids, vec![3, 4]);
    }

    #[tokio::test]
    async fn confirmed_counts_per_event() {
        let store = MemoryStore::new();
        let _ = RequestLedger::insert(&store, draft(1, 2, RequestStatus::Confirmed)).await;
        let _ = RequestLedger::insert(&store, draft(1, 3, RequestStatus::Confirmed)).await;
        let _ = RequestLedger::insert(&store, draft(1, 4, RequestStatus::Pending)).await;
        let _ = RequestLedger::insert(&store, draft(2, 4, RequestStatus::Confirmed)).await;
        let _ = RequestLedger::insert(&store, draft(3, 4, RequestStatus::Confirmed)).await;

        let Ok(counts) = store
            .confirmed_counts(&[EventId::new(1), EventId::new(2), EventId::new(7)])
            .await
        else {
            panic!("count failed");
        };
        assert_eq!(counts.get(&EventId::new(1)), Some(&2));
        assert_eq!(counts.get(&EventId::new(2)), Some(&1));
        assert_eq!(counts.get(&EventId::new(3)), None);
        assert_eq!(counts.get(&EventId::new(7)), None);
    }

    #[tokio::test]
    async fn unique_hits_count_distinct_addresses() {
        let telemetry = InMemoryTelemetry::new();
        for ip in ["10.0.0.1", "10.0.0.1", "10.0.0.2"] {
            let _ = telemetry
                .record_hit(Hit {
                    app: "ewm-main-service".to_string(),
                    uri: "/events/1".to_string(),
                    ip: ip.to_string(),
                    timestamp: at(12),
                })
                .await;
        }
        let uris = vec!["/events/1".to_string()];
        let unique = telemetry
            .query_hit_count(&uris, at(0), at(23), true)
            .await
            .unwrap_or_default();
        let total = telemetry
            .query_hit_count(&uris, at(0), at(23), false)
            .await
            .unwrap_or_default();
        let outside = telemetry
            .query_hit_count(&uris, at(13), at(23), false)
            .await
            .unwrap_or_default();
        assert_eq!((unique, total, outside), (2, 3, 0));
    }

    #[tokio::test]
    async fn directory_lookups() {
        let store = MemoryStore::new();
        store.add_user(UserId::new(1)).await;
        store.add_category(CategoryId::new(5)).await;
        assert_eq!(UserDirectory::exists(&store, UserId::new(1)).await.ok(), Some(true));
        assert_eq!(UserDirectory::exists(&store, UserId::new(2)).await.ok(), Some(false));
        assert_eq!(
            CategoryCatalog::exists(&store, CategoryId::new(5)).await.ok(),
            Some(true)
        );
    }
}
