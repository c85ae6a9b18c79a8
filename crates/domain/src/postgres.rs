use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    ClientId, NewSubject, OperationType, ProvisioningSubject, Result, ServiceId, SubjectError,
    SubjectId, SubjectStatus, store::SubjectStore,
};

const SUBJECT_COLUMNS: &str = "id, client_id, service_id, name, operation_type, status, \
     provider_name, provider_order_id, auth_code, retry_of, created_at, updated_at";

/// PostgreSQL-backed subject store.
///
/// Uses the `provisioning_subjects` table created by the workspace migrations.
#[derive(Clone)]
pub struct PostgresSubjectStore {
    pool: PgPool,
}

impl PostgresSubjectStore {
    /// Creates a new PostgreSQL subject store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_subject(row: PgRow) -> Result<ProvisioningSubject> {
        let operation_type: String = row.try_get("operation_type")?;
        let status: String = row.try_get("status")?;

        Ok(ProvisioningSubject {
            id: SubjectId::new(row.try_get("id")?),
            client_id: ClientId::new(row.try_get("client_id")?),
            service_id: ServiceId::new(row.try_get("service_id")?),
            name: row.try_get("name")?,
            operation_type: operation_type
                .parse::<OperationType>()
                .map_err(SubjectError::Corrupt)?,
            status: status.parse::<SubjectStatus>().map_err(SubjectError::Corrupt)?,
            provider_name: row.try_get("provider_name")?,
            provider_order_id: row.try_get("provider_order_id")?,
            auth_code: row.try_get("auth_code")?,
            retry_of: row.try_get::<Option<i64>, _>("retry_of")?.map(SubjectId::new),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl SubjectStore for PostgresSubjectStore {
    async fn create(&self, subject: NewSubject) -> Result<ProvisioningSubject> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO provisioning_subjects
                (client_id, service_id, name, operation_type, status, auth_code, retry_of)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {SUBJECT_COLUMNS}
            "#
        ))
        .bind(subject.client_id.as_i64())
        .bind(subject.service_id.as_i64())
        .bind(&subject.name)
        .bind(subject.operation_type.as_str())
        .bind(subject.status.as_str())
        .bind(&subject.auth_code)
        .bind(subject.retry_of.map(|id| id.as_i64()))
        .fetch_one(&self.pool)
        .await?;

        let created = Self::row_to_subject(row)?;
        tracing::debug!(subject_id = %created.id, name = %created.name, "subject created");
        Ok(created)
    }

    async fn get(&self, id: SubjectId) -> Result<ProvisioningSubject> {
        let row = sqlx::query(&format!(
            "SELECT {SUBJECT_COLUMNS} FROM provisioning_subjects WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_subject(row),
            None => Err(SubjectError::NotFound(id)),
        }
    }

    async fn update_status(
        &self,
        id: SubjectId,
        status: SubjectStatus,
    ) -> Result<ProvisioningSubject> {
        let allowed: Vec<&str> = status
            .predecessors()
            .iter()
            .map(SubjectStatus::as_str)
            .collect();

        // Conditional write: the row only changes if its current status may
        // still move to `status`.
        let row = sqlx::query(&format!(
            r#"
            UPDATE provisioning_subjects
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = ANY($3)
            RETURNING {SUBJECT_COLUMNS}
            "#
        ))
        .bind(id.as_i64())
        .bind(status.as_str())
        .bind(&allowed)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Self::row_to_subject(row);
        }

        let current = self.get(id).await?;
        Err(SubjectError::InvalidTransition {
            subject_id: id,
            from: current.status,
            to: status,
        })
    }

    async fn set_provider_order(
        &self,
        id: SubjectId,
        provider_name: &str,
        provider_order_id: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE provisioning_subjects
            SET provider_name = $2, provider_order_id = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .bind(provider_name)
        .bind(provider_order_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SubjectError::NotFound(id));
        }
        Ok(())
    }

    async fn list_by_status(
        &self,
        status: SubjectStatus,
        after: Option<SubjectId>,
        limit: usize,
    ) -> Result<Vec<ProvisioningSubject>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBJECT_COLUMNS} FROM provisioning_subjects \
             WHERE status = $1 AND id > $2 ORDER BY id ASC LIMIT $3"
        ))
        .bind(status.as_str())
        .bind(after.map_or(0, |id| id.as_i64()))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_subject).collect()
    }

    async fn lineage(&self, root: SubjectId) -> Result<Vec<ProvisioningSubject>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBJECT_COLUMNS} FROM provisioning_subjects \
             WHERE id = $1 OR retry_of = $1 ORDER BY id ASC"
        ))
        .bind(root.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_subject).collect()
    }
}
