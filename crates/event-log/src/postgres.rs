use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    EventId, EventLogError, EventQuery, NewEvent, ProvisioningEvent, Result, SubjectId,
    store::{EventLog, validate_event},
};

/// Name of the partial unique index that backs [`EventLog::append_unique`].
pub const CLAIM_CONSTRAINT: &str = "uq_provisioning_events_claim";

const SELECT_COLUMNS: &str =
    "SELECT id, subject_id, event_type, message, payload, created_at FROM provisioning_events";

/// PostgreSQL-backed event log implementation.
///
/// Claims rely on the `uq_provisioning_events_claim` partial unique index over
/// `(subject_id, event_type) WHERE claimed`, so concurrent claimers are
/// serialised by the database rather than by a read-then-write check.
#[derive(Clone)]
pub struct PostgresEventLog {
    pool: PgPool,
}

impl PostgresEventLog {
    /// Creates a new PostgreSQL event log.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations (subjects and events tables).
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<ProvisioningEvent> {
        Ok(ProvisioningEvent {
            id: EventId::new(row.try_get("id")?),
            subject_id: SubjectId::new(row.try_get("subject_id")?),
            event_type: row.try_get("event_type")?,
            message: row.try_get("message")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn insert(&self, event: NewEvent, claimed: bool) -> Result<EventId> {
        validate_event(&event)?;

        let subject_id = event.subject_id;
        let event_type = event.event_type.clone();

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO provisioning_events (subject_id, event_type, message, payload, claimed)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(subject_id.as_i64())
        .bind(&event.event_type)
        .bind(&event.message)
        .bind(&event.payload)
        .bind(claimed)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(CLAIM_CONSTRAINT)
            {
                return EventLogError::DuplicateEvent {
                    subject_id,
                    event_type: event_type.clone(),
                };
            }
            EventLogError::Database(e)
        })?;

        metrics::counter!("event_log_appends_total").increment(1);
        tracing::debug!(%subject_id, event_type, event_id = id, claimed, "event appended");
        Ok(EventId::new(id))
    }
}

#[async_trait]
impl EventLog for PostgresEventLog {
    async fn append(&self, event: NewEvent) -> Result<EventId> {
        self.insert(event, false).await
    }

    async fn append_unique(&self, event: NewEvent) -> Result<EventId> {
        self.insert(event, true).await
    }

    async fn has_occurred(&self, subject_id: SubjectId, event_type: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM provisioning_events WHERE subject_id = $1 AND event_type = $2)",
        )
        .bind(subject_id.as_i64())
        .bind(event_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn events_for_subject(&self, subject_id: SubjectId) -> Result<Vec<ProvisioningEvent>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE subject_id = $1 ORDER BY id ASC"
        ))
        .bind(subject_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<ProvisioningEvent>> {
        let mut sql = format!("{SELECT_COLUMNS} WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.subject_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND subject_id = ${param_count}"));
        }
        if query.event_types.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND event_type = ANY(${param_count})"));
        }
        if query.after_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND id > ${param_count}"));
        }
        if query.from_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at >= ${param_count}"));
        }
        if query.to_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at <= ${param_count}"));
        }

        sql.push_str(" ORDER BY id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(id) = query.subject_id {
            sqlx_query = sqlx_query.bind(id.as_i64());
        }
        if let Some(event_types) = query.event_types {
            sqlx_query = sqlx_query.bind(event_types);
        }
        if let Some(after) = query.after_id {
            sqlx_query = sqlx_query.bind(after.as_i64());
        }
        if let Some(from_ts) = query.from_timestamp {
            sqlx_query = sqlx_query.bind(from_ts);
        }
        if let Some(to_ts) = query.to_timestamp {
            sqlx_query = sqlx_query.bind(to_ts);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_event).collect()
    }
}
