//! Feature toggle cache repository.

use domain::models::{AuditLogEntry, FeatureFlag, FeatureToggle, NewAuditLogEntry};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::entities::FeatureToggleEntity;
use crate::metrics::QueryTimer;
use crate::repositories::audit_log::insert_entry;

const TOGGLE_COLUMNS: &str = "id, resource_id, key, label, name, description, enabled, \
     last_modified_by, last_modified_at, created_at, updated_at";

async fn upsert_flag<'e, E>(
    executor: E,
    resource_id: Uuid,
    flag: &FeatureFlag,
) -> Result<FeatureToggleEntity, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, FeatureToggleEntity>(&format!(
        r#"
        INSERT INTO feature_toggles (resource_id, key, label, name, description, enabled)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (resource_id, key, label) DO UPDATE SET
            name = EXCLUDED.name,
            description = EXCLUDED.description,
            enabled = EXCLUDED.enabled
        RETURNING {}
        "#,
        TOGGLE_COLUMNS
    ))
    .bind(resource_id)
    .bind(&flag.key)
    .bind(&flag.label)
    .bind(&flag.name)
    .bind(&flag.description)
    .bind(flag.enabled)
    .fetch_one(executor)
    .await
}

/// Repository for the local toggle cache.
#[derive(Clone)]
pub struct FeatureToggleRepository {
    pool: PgPool,
}

impl FeatureToggleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert every flag read from the remote store and return the cached
    /// rows, sorted by name then label.
    pub async fn sync_flags(
        &self,
        resource_id: Uuid,
        flags: &[FeatureFlag],
    ) -> Result<Vec<FeatureToggle>, sqlx::Error> {
        let timer = QueryTimer::new("sync_feature_toggles");
        let mut tx = self.pool.begin().await?;

        let mut toggles = Vec::with_capacity(flags.len());
        for flag in flags {
            let entity = upsert_flag(&mut *tx, resource_id, flag).await?;
            toggles.push(FeatureToggle::from(entity));
        }

        tx.commit().await?;
        timer.record();

        toggles.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.label.cmp(&b.label))
        });
        Ok(toggles)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<FeatureToggle>, sqlx::Error> {
        let timer = QueryTimer::new("find_feature_toggle_by_id");
        let result = sqlx::query_as::<_, FeatureToggleEntity>(&format!(
            "SELECT {} FROM feature_toggles WHERE id = $1",
            TOGGLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        result.map(|row| row.map(Into::into))
    }

    /// Stores the outcome of a successful remote write: updates the cached
    /// toggle and appends the audit row in one transaction.
    pub async fn record_mutation(
        &self,
        toggle_id: Uuid,
        enabled: bool,
        modified_by: &str,
        audit: &NewAuditLogEntry,
    ) -> Result<(FeatureToggle, AuditLogEntry), sqlx::Error> {
        let timer = QueryTimer::new("record_feature_toggle_mutation");
        let mut tx = self.pool.begin().await?;

        let toggle = sqlx::query_as::<_, FeatureToggleEntity>(&format!(
            r#"
            UPDATE feature_toggles
            SET enabled = $2, last_modified_by = $3, last_modified_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TOGGLE_COLUMNS
        ))
        .bind(toggle_id)
        .bind(enabled)
        .bind(modified_by)
        .fetch_one(&mut *tx)
        .await?;

        let entry = insert_entry(&mut *tx, audit).await?;

        tx.commit().await?;
        timer.record();
        Ok((toggle.into(), entry))
    }
}
