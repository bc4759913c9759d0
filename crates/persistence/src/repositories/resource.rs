//! App Configuration resource repository.

use chrono::{DateTime, Utc};
use domain::models::{
    AppConfigResource, ConnectionStatus, CreateResourceRequest, UpdateResourceRequest,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::ResourceEntity;
use crate::metrics::QueryTimer;

const RESOURCE_COLUMNS: &str = "id, display_name, environment_type, resource_name, resource_group, \
     connection_string, endpoint, subscription_id, connection_status, last_tested, \
     created_at, updated_at";

/// Repository for registered App Configuration stores.
#[derive(Clone)]
pub struct ResourceRepository {
    pool: PgPool,
}

impl ResourceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All resources, newest first.
    pub async fn list(&self) -> Result<Vec<AppConfigResource>, sqlx::Error> {
        let timer = QueryTimer::new("list_resources");
        let result = sqlx::query_as::<_, ResourceEntity>(&format!(
            "SELECT {} FROM app_config_resources ORDER BY created_at DESC",
            RESOURCE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await;
        timer.finish(&result);
        result.map(|rows| rows.into_iter().map(Into::into).collect())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<AppConfigResource>, sqlx::Error> {
        let timer = QueryTimer::new("find_resource_by_id");
        let result = sqlx::query_as::<_, ResourceEntity>(&format!(
            "SELECT {} FROM app_config_resources WHERE id = $1",
            RESOURCE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        result.map(|row| row.map(Into::into))
    }

    /// Insert a resource. `endpoint` is derived from the connection string
    /// by the caller.
    pub async fn create(
        &self,
        request: &CreateResourceRequest,
        endpoint: Option<&str>,
    ) -> Result<AppConfigResource, sqlx::Error> {
        let timer = QueryTimer::new("create_resource");
        let result = sqlx::query_as::<_, ResourceEntity>(&format!(
            r#"
            INSERT INTO app_config_resources (
                display_name, environment_type, resource_name, resource_group,
                connection_string, endpoint, subscription_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            RESOURCE_COLUMNS
        ))
        .bind(request.display_name.trim())
        .bind(request.environment_type.as_str())
        .bind(request.resource_name.trim())
        .bind(request.resource_group.trim())
        .bind(request.connection_string.trim())
        .bind(endpoint)
        .bind(request.subscription_id.as_deref().map(str::trim).unwrap_or(""))
        .fetch_one(&self.pool)
        .await;
        timer.finish(&result);
        result.map(Into::into)
    }

    /// Partial update. Fields the request leaves out keep their value; a
    /// masked or empty connection string keeps the stored one.
    ///
    /// Returns `None` if the resource does not exist.
    pub async fn update(
        &self,
        id: Uuid,
        request: &UpdateResourceRequest,
        endpoint: Option<&str>,
    ) -> Result<Option<AppConfigResource>, sqlx::Error> {
        let timer = QueryTimer::new("update_resource");
        let connection_string = request.replacement_connection_string();
        let result = sqlx::query_as::<_, ResourceEntity>(&format!(
            r#"
            UPDATE app_config_resources SET
                display_name = COALESCE($2, display_name),
                environment_type = COALESCE($3, environment_type),
                resource_name = COALESCE($4, resource_name),
                resource_group = COALESCE($5, resource_group),
                connection_string = COALESCE($6, connection_string),
                endpoint = CASE WHEN $6 IS NULL THEN endpoint ELSE $7 END,
                connection_status = CASE WHEN $6 IS NULL THEN connection_status ELSE 'unknown' END,
                subscription_id = COALESCE($8, subscription_id)
            WHERE id = $1
            RETURNING {}
            "#,
            RESOURCE_COLUMNS
        ))
        .bind(id)
        .bind(request.display_name.as_deref().map(str::trim))
        .bind(request.environment_type.map(|e| e.as_str()))
        .bind(request.resource_name.as_deref().map(str::trim))
        .bind(request.resource_group.as_deref().map(str::trim))
        .bind(connection_string)
        .bind(endpoint)
        .bind(request.replacement_subscription_id())
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        result.map(|row| row.map(Into::into))
    }

    /// Delete a resource and, by cascade, its toggles. Audit rows keep their
    /// snapshots. Returns whether a row was deleted.
    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_resource");
        let result = sqlx::query("DELETE FROM app_config_resources WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;
        timer.finish(&result);
        result.map(|r| r.rows_affected() > 0)
    }

    /// Record the outcome of a connection test.
    pub async fn update_connection_status(
        &self,
        id: Uuid,
        status: ConnectionStatus,
        tested_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("update_resource_connection_status");
        let result = sqlx::query(
            r#"
            UPDATE app_config_resources
            SET connection_status = $2, last_tested = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(tested_at)
        .execute(&self.pool)
        .await;
        timer.finish(&result);
        result.map(|r| r.rows_affected() > 0)
    }
}
