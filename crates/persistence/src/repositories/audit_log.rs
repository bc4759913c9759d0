//! Audit log repository for database operations.

use domain::models::{AuditLogEntry, AuditLogFilter, NewAuditLogEntry};
use sqlx::{PgExecutor, PgPool};

use crate::entities::AuditLogEntity;
use crate::metrics::QueryTimer;

const AUDIT_COLUMNS: &str = "id, timestamp, user_id, user_name, user_email, action, toggle_id, \
     toggle_name, resource_id, resource_name, environment_type, previous_state, new_state";

/// Helper struct for building dynamic WHERE clauses from audit log filters.
/// Tracks conditions and parameter positions so count and list queries stay
/// in step.
struct AuditLogFilterBuilder {
    conditions: Vec<String>,
    param_count: i32,
}

impl AuditLogFilterBuilder {
    fn build(filter: &AuditLogFilter) -> Self {
        let mut conditions = vec!["timestamp >= $1".to_string()];
        let mut param_count = 1;

        if filter.resource_id.is_some() {
            param_count += 1;
            conditions.push(format!("resource_id = ${}", param_count));
        }

        if filter.user_id.is_some() {
            param_count += 1;
            conditions.push(format!("user_id = ${}", param_count));
        }

        if filter.environment_type.is_some() {
            param_count += 1;
            conditions.push(format!("environment_type = ${}", param_count));
        }

        if filter.action.is_some() {
            param_count += 1;
            conditions.push(format!("action = ${}", param_count));
        }

        if filter.toggle_name.is_some() {
            param_count += 1;
            conditions.push(format!("toggle_name ILIKE ${}", param_count));
        }

        Self {
            conditions,
            param_count,
        }
    }

    fn where_clause(&self) -> String {
        self.conditions.join(" AND ")
    }

    fn param_count(&self) -> i32 {
        self.param_count
    }
}

/// `ILIKE` pattern matching `needle` anywhere, with wildcards escaped.
fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Binds filter parameters in the order [`AuditLogFilterBuilder`] numbers them.
macro_rules! bind_query_filters {
    ($builder:expr, $filter:expr) => {{
        let mut b = $builder.bind($filter.since);
        if let Some(resource_id) = $filter.resource_id {
            b = b.bind(resource_id);
        }
        if let Some(user_id) = $filter.user_id {
            b = b.bind(user_id);
        }
        if let Some(environment_type) = $filter.environment_type {
            b = b.bind(environment_type.as_str());
        }
        if let Some(action) = $filter.action {
            b = b.bind(action.as_str());
        }
        if let Some(ref toggle_name) = $filter.toggle_name {
            b = b.bind(contains_pattern(toggle_name));
        }
        b
    }};
}

/// Insert one audit row on any executor, so it can join a caller's
/// transaction.
pub(crate) async fn insert_entry<'e, E>(
    executor: E,
    entry: &NewAuditLogEntry,
) -> Result<AuditLogEntry, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, AuditLogEntity>(&format!(
        r#"
        INSERT INTO audit_logs (
            user_id, user_name, user_email, action, toggle_id, toggle_name,
            resource_id, resource_name, environment_type, previous_state, new_state
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {}
        "#,
        AUDIT_COLUMNS
    ))
    .bind(entry.user_id)
    .bind(&entry.user_name)
    .bind(&entry.user_email)
    .bind(entry.action.as_str())
    .bind(entry.toggle_id)
    .bind(&entry.toggle_name)
    .bind(entry.resource_id)
    .bind(&entry.resource_name)
    .bind(entry.environment_type.as_str())
    .bind(entry.previous_state)
    .bind(entry.new_state)
    .fetch_one(executor)
    .await
    .map(Into::into)
}

/// Repository for audit log database operations.
#[derive(Clone)]
pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One page of matching rows, newest first, plus the total match count.
    pub async fn list(
        &self,
        filter: &AuditLogFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<AuditLogEntry>, i64), sqlx::Error> {
        let total = self.count(filter).await?;

        let builder = AuditLogFilterBuilder::build(filter);
        let list_query = format!(
            r#"
            SELECT {}
            FROM audit_logs
            WHERE {}
            ORDER BY timestamp DESC, id DESC
            LIMIT ${} OFFSET ${}
            "#,
            AUDIT_COLUMNS,
            builder.where_clause(),
            builder.param_count() + 1,
            builder.param_count() + 2
        );

        let timer = QueryTimer::new("list_audit_logs");
        let query = bind_query_filters!(sqlx::query_as::<_, AuditLogEntity>(&list_query), filter);
        let result = query.bind(limit).bind(offset).fetch_all(&self.pool).await;
        timer.finish(&result);

        let logs = result?.into_iter().map(Into::into).collect();
        Ok((logs, total))
    }

    /// Number of rows matching the filter.
    pub async fn count(&self, filter: &AuditLogFilter) -> Result<i64, sqlx::Error> {
        let builder = AuditLogFilterBuilder::build(filter);
        let count_query = format!(
            "SELECT COUNT(*) FROM audit_logs WHERE {}",
            builder.where_clause()
        );

        let timer = QueryTimer::new("count_audit_logs");
        let query = bind_query_filters!(sqlx::query_scalar::<_, i64>(&count_query), filter);
        let result = query.fetch_one(&self.pool).await;
        timer.finish(&result);
        result
    }

    /// Matching rows for export, newest first, at most `max_records`.
    pub async fn list_for_export(
        &self,
        filter: &AuditLogFilter,
        max_records: i64,
    ) -> Result<Vec<AuditLogEntry>, sqlx::Error> {
        let builder = AuditLogFilterBuilder::build(filter);
        let list_query = format!(
            r#"
            SELECT {}
            FROM audit_logs
            WHERE {}
            ORDER BY timestamp DESC, id DESC
            LIMIT ${}
            "#,
            AUDIT_COLUMNS,
            builder.where_clause(),
            builder.param_count() + 1
        );

        let timer = QueryTimer::new("export_audit_logs");
        let query = bind_query_filters!(sqlx::query_as::<_, AuditLogEntity>(&list_query), filter);
        let result = query.bind(max_records).fetch_all(&self.pool).await;
        timer.finish(&result);

        Ok(result?.into_iter().map(Into::into).collect())
    }
}
