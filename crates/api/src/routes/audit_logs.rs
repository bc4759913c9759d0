//! Audit log routes.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use domain::models::audit_log::{state_label, MAX_EXPORT_RECORDS};
use domain::models::{
    AuditExportRecord, AuditLogEntry, AuditLogQueryParams, ExportAuditLogsRequest, ExportFormat,
    ListAuditLogsResponse,
};
use persistence::repositories::AuditLogRepository;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::ApiQuery;

const CSV_HEADER: [&str; 9] = [
    "Timestamp",
    "User",
    "Email",
    "Action",
    "Toggle Name",
    "Resource",
    "Environment",
    "Previous State",
    "New State",
];

/// Filtered page of audit rows, newest first.
pub async fn list_audit_logs(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<AuditLogQueryParams>,
) -> Result<Json<ListAuditLogsResponse>, ApiError> {
    let filter = params.to_filter(Utc::now());
    let (limit, offset) = (params.limit(), params.offset());

    let (logs, total) = AuditLogRepository::new(state.pool.clone())
        .list(&filter, limit, offset)
        .await?;

    Ok(Json(ListAuditLogsResponse::new(logs, total, limit, offset)))
}

/// Every matching row as a CSV or JSON download.
pub async fn export_audit_logs(
    State(state): State<AppState>,
    Json(request): Json<ExportAuditLogsRequest>,
) -> Result<Response, ApiError> {
    let now = Utc::now();
    let filter = request.filters.to_filter(now);
    let repo = AuditLogRepository::new(state.pool.clone());

    let total = repo.count(&filter).await?;
    if total > MAX_EXPORT_RECORDS {
        return Err(ApiError::Validation(format!(
            "Export limited to {} records. Use filters to reduce result set.",
            MAX_EXPORT_RECORDS
        )));
    }

    let logs = repo.list_for_export(&filter, MAX_EXPORT_RECORDS).await?;
    tracing::info!(
        format = ?request.format,
        records = logs.len(),
        "Audit log exported"
    );

    match request.format {
        ExportFormat::Csv => Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (header::CONTENT_DISPOSITION, attachment(now, "csv")),
            ],
            generate_csv(&logs),
        )
            .into_response()),
        ExportFormat::Json => {
            let records: Vec<AuditExportRecord> = logs.into_iter().map(Into::into).collect();
            Ok((
                StatusCode::OK,
                [(header::CONTENT_DISPOSITION, attachment(now, "json"))],
                Json(records),
            )
                .into_response())
        }
    }
}

fn attachment(now: DateTime<Utc>, extension: &str) -> String {
    format!(
        "attachment; filename=\"audit-log-{}.{}\"",
        now.format("%Y-%m-%d"),
        extension
    )
}

/// Every cell quoted, embedded quotes doubled, one row per line.
fn generate_csv(logs: &[AuditLogEntry]) -> String {
    let mut csv = csv_row(CSV_HEADER.iter().copied());
    for log in logs {
        let timestamp = log.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
        csv.push_str(&csv_row([
            timestamp.as_str(),
            log.user_name.as_str(),
            log.user_email.as_str(),
            log.action.as_str(),
            log.toggle_name.as_str(),
            log.resource_name.as_str(),
            log.environment_type.as_str(),
            state_label(log.previous_state),
            state_label(log.new_state),
        ]));
    }
    csv
}

fn csv_row<'a>(cells: impl IntoIterator<Item = &'a str>) -> String {
    let mut row = cells
        .into_iter()
        .map(|cell| format!("\"{}\"", cell.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",");
    row.push('\n');
    row
}
