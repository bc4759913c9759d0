//! Audit log domain models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::resource::EnvironmentType;

/// Default page size for audit log listing.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: i64 = 500;

/// Maximum number of rows a single export may contain.
pub const MAX_EXPORT_RECORDS: i64 = 10_000;

/// What happened to a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Enabled,
    Disabled,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Enabled => "enabled",
            AuditAction::Disabled => "disabled",
        }
    }

    /// Action that results in the given state.
    pub fn for_new_state(enabled: bool) -> Self {
        if enabled {
            AuditAction::Enabled
        } else {
            AuditAction::Disabled
        }
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "enabled" => Ok(AuditAction::Enabled),
            "disabled" => Ok(AuditAction::Disabled),
            _ => Err(format!("Invalid audit action: {}", s)),
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Look-back window for audit queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateRange {
    #[default]
    #[serde(rename = "last7days")]
    Last7Days,
    #[serde(rename = "last30days")]
    Last30Days,
    #[serde(rename = "last90days")]
    Last90Days,
}

impl DateRange {
    pub fn days(&self) -> i64 {
        match self {
            DateRange::Last7Days => 7,
            DateRange::Last30Days => 30,
            DateRange::Last90Days => 90,
        }
    }

    /// Earliest timestamp included in the window ending at `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.days())
    }

    /// Parses a query value; anything unrecognised is the 7-day window.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("last30days") => DateRange::Last30Days,
            Some("last90days") => DateRange::Last90Days,
            _ => DateRange::Last7Days,
        }
    }
}

/// A stored audit log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub user_name: String,
    pub user_email: String,
    pub action: AuditAction,
    pub toggle_id: Option<Uuid>,
    pub toggle_name: String,
    pub resource_id: Option<Uuid>,
    pub resource_name: String,
    pub environment_type: EnvironmentType,
    pub previous_state: bool,
    pub new_state: bool,
}

/// Audit row to be inserted. Built with
/// [`AuditLogBuilder`](crate::services::AuditLogBuilder).
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditLogEntry {
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub action: AuditAction,
    pub toggle_id: Uuid,
    pub toggle_name: String,
    pub resource_id: Uuid,
    pub resource_name: String,
    pub environment_type: EnvironmentType,
    pub previous_state: bool,
    pub new_state: bool,
}

/// Raw filter parameters as they arrive in a query string or export body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogQueryParams {
    pub resource_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub environment_type: Option<String>,
    pub action: Option<String>,
    pub toggle_name: Option<String>,
    pub date_range: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Validated audit log filter.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditLogFilter {
    pub resource_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub environment_type: Option<EnvironmentType>,
    pub action: Option<AuditAction>,
    /// Case-insensitive substring of the toggle name.
    pub toggle_name: Option<String>,
    /// Only rows with `timestamp >= since` match.
    pub since: DateTime<Utc>,
}

impl AuditLogQueryParams {
    /// Builds the filter. Invalid environment or action values are dropped
    /// rather than rejected.
    pub fn to_filter(&self, now: DateTime<Utc>) -> AuditLogFilter {
        AuditLogFilter {
            resource_id: self.resource_id,
            user_id: self.user_id,
            environment_type: self
                .environment_type
                .as_deref()
                .and_then(|v| v.parse().ok()),
            action: self.action.as_deref().and_then(|v| v.parse().ok()),
            toggle_name: self
                .toggle_name
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            since: DateRange::parse_lenient(self.date_range.as_deref()).cutoff(now),
        }
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Page of audit log rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAuditLogsResponse {
    pub logs: Vec<AuditLogEntry>,
    pub total_count: i64,
    pub has_more: bool,
    pub limit: i64,
    pub offset: i64,
}

impl ListAuditLogsResponse {
    pub fn new(logs: Vec<AuditLogEntry>, total_count: i64, limit: i64, offset: i64) -> Self {
        let has_more = offset + (logs.len() as i64) < total_count;
        Self {
            logs,
            total_count,
            has_more,
            limit,
            offset,
        }
    }
}

/// Export file format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

/// Body of `POST /audit-logs/export`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportAuditLogsRequest {
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default)]
    pub filters: AuditLogQueryParams,
}

/// One row of a JSON export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditExportRecord {
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub email: String,
    pub action: AuditAction,
    pub toggle_name: String,
    pub resource_name: String,
    pub environment: EnvironmentType,
    pub previous_state: String,
    pub new_state: String,
}

/// Renders a toggle state the way exports show it.
pub fn state_label(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}

impl From<AuditLogEntry> for AuditExportRecord {
    fn from(entry: AuditLogEntry) -> Self {
        Self {
            timestamp: entry.timestamp,
            user: entry.user_name,
            email: entry.user_email,
            action: entry.action,
            toggle_name: entry.toggle_name,
            resource_name: entry.resource_name,
            environment: entry.environment_type,
            previous_state: state_label(entry.previous_state).to_string(),
            new_state: state_label(entry.new_state).to_string(),
        }
    }
}
