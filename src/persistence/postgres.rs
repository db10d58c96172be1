//! PostgreSQL implementation of the persistence layer.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::models::{
    EVENT_COLUMNS, EventRow, REQUEST_COLUMNS, RequestRow, contains_pattern, limit_column,
    requests_from_rows,
};
use super::{CategoryCatalog, EventStore, RequestLedger, StatusBatch, UserDirectory};
use crate::config::ServiceConfig;
use crate::domain::{
    CategoryId, Event, EventDraft, EventId, EventQuery, ParticipationRequest, RequestDraft,
    RequestId, RequestStatus, UserId,
};
use crate::error::{Entity, ForbiddenReason, ServiceError};

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool from `config` and applies pending
    /// migrations.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Persistence`] if the database is unreachable
    /// or a migration fails.
    pub async fn connect(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| ServiceError::Persistence(e.to_string()))?;

        tracing::info!(
            max_connections = config.database_max_connections,
            "connected to postgres"
        );
        Ok(Self::new(pool))
    }

    async fn select_requests(
        &self,
        filter: &str,
        id: i64,
    ) -> Result<Vec<ParticipationRequest>, ServiceError> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM participation_requests WHERE {filter} = $1 ORDER BY id");
        let rows = sqlx::query_as::<_, RequestRow>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        requests_from_rows(rows)
    }
}

#[async_trait]
impl UserDirectory for PostgresStore {
    async fn exists(&self, id: UserId) -> Result<bool, ServiceError> {
        let found = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id.get())
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }
}

#[async_trait]
impl CategoryCatalog for PostgresStore {
    async fn exists(&self, id: CategoryId) -> Result<bool, ServiceError> {
        let found =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
                .bind(id.get())
                .fetch_one(&self.pool)
                .await?;
        Ok(found)
    }
}

#[async_trait]
impl EventStore for PostgresStore {
    async fn get(&self, id: EventId) -> Result<Option<Event>, ServiceError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        let row = sqlx::query_as::<_, EventRow>(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Event::try_from).transpose()
    }

    async fn insert(&self, draft: EventDraft) -> Result<Event, ServiceError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO events (title, annotation, description, category_id, initiator_id, \
             lat, lon, paid, participant_limit, request_moderation, event_date, created_on, \
             published_on, state, views) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NULL, 'PENDING', 0) \
             RETURNING id",
        )
        .bind(&draft.title)
        .bind(&draft.annotation)
        .bind(&draft.description)
        .bind(draft.category_id.get())
        .bind(draft.initiator_id.get())
        .bind(draft.location.lat)
        .bind(draft.location.lon)
        .bind(draft.paid)
        .bind(limit_column(draft.participant_limit)?)
        .bind(draft.request_moderation)
        .bind(draft.event_date)
        .bind(draft.created_on)
        .fetch_one(&self.pool)
        .await?;

        Ok(draft.into_event(EventId::new(id)))
    }

    async fn save(&self, event: &Event) -> Result<(), ServiceError> {
        let result = sqlx::query(
            "UPDATE events SET title = $2, annotation = $3, description = $4, category_id = $5, \
             lat = $6, lon = $7, paid = $8, participant_limit = $9, request_moderation = $10, \
             event_date = $11, published_on = $12, state = $13 \
             WHERE id = $1",
        )
        .bind(event.id.get())
        .bind(&event.title)
        .bind(&event.annotation)
        .bind(&event.description)
        .bind(event.category_id.get())
        .bind(event.location.lat)
        .bind(event.location.lon)
        .bind(event.paid)
        .bind(limit_column(event.participant_limit)?)
        .bind(event.request_moderation)
        .bind(event.event_date)
        .bind(event.published_on)
        .bind(event.state.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found(Entity::Event, event.id));
        }
        Ok(())
    }

    async fn increment_views(&self, id: EventId) -> Result<u64, ServiceError> {
        let views = sqlx::query_scalar::<_, i64>(
            "UPDATE events SET views = views + 1 WHERE id = $1 RETURNING views",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::not_found(Entity::Event, id))?;
        Ok(u64::try_from(views).unwrap_or_default())
    }

    async fn find(&self, query: &EventQuery) -> Result<Vec<Event>, ServiceError> {
        let mut builder =
            QueryBuilder::<Postgres>::new(format!("SELECT {EVENT_COLUMNS} FROM events WHERE TRUE"));
        if !query.initiators.is_empty() {
            let ids: Vec<i64> = query.initiators.iter().map(|id| id.get()).collect();
            builder.push(" AND initiator_id = ANY(").push_bind(ids).push(")");
        }
        if !query.states.is_empty() {
            let states: Vec<&str> = query.states.iter().map(|s| s.as_str()).collect();
            builder.push(" AND state = ANY(").push_bind(states).push(")");
        }
        if !query.categories.is_empty() {
            let ids: Vec<i64> = query.categories.iter().map(|id| id.get()).collect();
            builder.push(" AND category_id = ANY(").push_bind(ids).push(")");
        }
        if let Some(text) = &query.text {
            let pattern = contains_pattern(text);
            builder
                .push(" AND (annotation ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(paid) = query.paid {
            builder.push(" AND paid = ").push_bind(paid);
        }
        if let Some(start) = query.range_start {
            builder.push(" AND event_date >= ").push_bind(start);
        }
        if let Some(end) = query.range_end {
            builder.push(" AND event_date <= ").push_bind(end);
        }
        builder.push(" ORDER BY id");
        if let Some(page) = query.page {
            builder
                .push(" LIMIT ")
                .push_bind(i64::from(page.size()))
                .push(" OFFSET ")
                .push_bind(i64::from(page.from()));
        }

        let rows = builder
            .build_query_as::<EventRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Event::try_from).collect()
    }
}

#[async_trait]
impl RequestLedger for PostgresStore {
    async fn find_by_requester_and_event(
        &self,
        requester_id: UserId,
        event_id: EventId,
    ) -> Result<Vec<ParticipationRequest>, ServiceError> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM participation_requests \
             WHERE requester_id = $1 AND event_id = $2 ORDER BY id"
        );
        let rows = sqlx::query_as::<_, RequestRow>(&sql)
            .bind(requester_id.get())
            .bind(event_id.get())
            .fetch_all(&self.pool)
            .await?;
        requests_from_rows(rows)
    }

    async fn find_by_id(&self, id: RequestId) -> Result<Option<ParticipationRequest>, ServiceError> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM participation_requests WHERE id = $1");
        let row = sqlx::query_as::<_, RequestRow>(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;
        row.map(ParticipationRequest::try_from).transpose()
    }

    async fn find_by_ids(
        &self,
        ids: &[RequestId],
    ) -> Result<Vec<ParticipationRequest>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM participation_requests WHERE id = ANY($1)");
        let rows = sqlx::query_as::<_, RequestRow>(&sql)
            .bind(&raw)
            .fetch_all(&self.pool)
            .await?;

        let mut by_id: HashMap<RequestId, ParticipationRequest> = requests_from_rows(rows)?
            .into_iter()
            .map(|r| (r.id, r))
            .collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn find_by_requester(
        &self,
        requester_id: UserId,
    ) -> Result<Vec<ParticipationRequest>, ServiceError> {
        self.select_requests("requester_id", requester_id.get()).await
    }

    async fn find_by_event(
        &self,
        event_id: EventId,
    ) -> Result<Vec<ParticipationRequest>, ServiceError> {
        self.select_requests("event_id", event_id.get()).await
    }

    async fn count_by_event_and_status(
        &self,
        event_id: EventId,
        status: RequestStatus,
    ) -> Result<u64, ServiceError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM participation_requests WHERE event_id = $1 AND status = $2",
        )
        .bind(event_id.get())
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn insert(&self, draft: RequestDraft) -> Result<ParticipationRequest, ServiceError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO participation_requests (event_id, requester_id, status, created) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(draft.event_id.get())
        .bind(draft.requester_id.get())
        .bind(draft.status.as_str())
        .bind(draft.created)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ServiceError::Forbidden(ForbiddenReason::DuplicateRequest)
            }
            other => ServiceError::from(other),
        })?;

        Ok(draft.into_request(RequestId::new(id)))
    }

    async fn save(&self, request: &ParticipationRequest) -> Result<(), ServiceError> {
        let result = sqlx::query("UPDATE participation_requests SET status = $2 WHERE id = $1")
            .bind(request.id.get())
            .bind(request.status.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found(Entity::Request, request.id));
        }
        Ok(())
    }

    async fn confirmed_counts(
        &self,
        event_ids: &[EventId],
    ) -> Result<HashMap<EventId, u64>, ServiceError> {
        if event_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let raw: Vec<i64> = event_ids.iter().map(|id| id.get()).collect();
        let rows = sqlx::query_as::<_, (i64, i64)>(
            "SELECT event_id, COUNT(*) FROM participation_requests \
             WHERE event_id = ANY($1) AND status = $2 GROUP BY event_id",
        )
        .bind(&raw)
        .bind(RequestStatus::Confirmed.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(event_id, count)| {
                (EventId::new(event_id), u64::try_from(count).unwrap_or_default())
            })
            .collect())
    }

    async fn save_all(&self, batch: StatusBatch) -> Result<u64, ServiceError> {
        let mut tx = self.pool.begin().await?;

        for request in &batch.requests {
            let result = sqlx::query(
                "UPDATE participation_requests SET status = $2 WHERE id = $1 AND status = $3",
            )
            .bind(request.id.get())
            .bind(request.status.as_str())
            .bind(RequestStatus::Pending.as_str())
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                let sql =
                    format!("SELECT {REQUEST_COLUMNS} FROM participation_requests WHERE id = $1");
                let current = sqlx::query_as::<_, RequestRow>(&sql)
                    .bind(request.id.get())
                    .fetch_optional(&mut *tx)
                    .await?;
                tx.rollback().await?;
                return Err(match current {
                    None => ServiceError::not_found(Entity::Request, request.id),
                    Some(row) => ForbiddenReason::RequestNotPending {
                        request_id: request.id,
                        status: ParticipationRequest::try_from(row)?.status,
                    }
                    .into(),
                });
            }
        }

        let mut cascaded = 0;
        if let Some(event_id) = batch.reject_remaining_pending {
            cascaded = sqlx::query(
                "UPDATE participation_requests SET status = $2 WHERE event_id = $1 AND status = $3",
            )
            .bind(event_id.get())
            .bind(RequestStatus::Rejected.as_str())
            .bind(RequestStatus::Pending.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        Ok(cascaded)
    }
}
