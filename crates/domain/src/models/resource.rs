//! App Configuration resource domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use shared::connection_string::mask_connection_string;

/// Deployment environment a store belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentType {
    #[default]
    Development,
    Staging,
    Production,
}

impl EnvironmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentType::Development => "development",
            EnvironmentType::Staging => "staging",
            EnvironmentType::Production => "production",
        }
    }

    /// Production changes need an explicit acknowledgement in the UI.
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, EnvironmentType::Production)
    }

    /// Guesses the environment of a discovered store.
    ///
    /// An `environment` tag wins; otherwise the store name is searched for
    /// `prod`, `stag`, `dev` and `test`, in that order.
    pub fn infer(name: &str, tags: &HashMap<String, String>) -> Self {
        let tagged = tags
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("environment"))
            .find_map(|(_, v)| Self::match_fragment(&v.to_lowercase()));
        if let Some(env) = tagged {
            return env;
        }

        // "dev", "test" and anything unrecognised
        Self::match_fragment(&name.to_lowercase()).unwrap_or(EnvironmentType::Development)
    }

    fn match_fragment(lower: &str) -> Option<Self> {
        if lower.contains("prod") {
            Some(EnvironmentType::Production)
        } else if lower.contains("stag") {
            Some(EnvironmentType::Staging)
        } else if lower.contains("dev") {
            Some(EnvironmentType::Development)
        } else {
            None
        }
    }
}

impl FromStr for EnvironmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(EnvironmentType::Development),
            "staging" | "stage" => Ok(EnvironmentType::Staging),
            "production" | "prod" => Ok(EnvironmentType::Production),
            _ => Err(format!("Invalid environment type: {}", s)),
        }
    }
}

impl fmt::Display for EnvironmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of the most recent connection test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Unknown,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Unknown => "unknown",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        }
    }
}

impl FromStr for ConnectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unknown" => Ok(ConnectionStatus::Unknown),
            "connected" => Ok(ConnectionStatus::Connected),
            "error" => Ok(ConnectionStatus::Error),
            _ => Err(format!("Invalid connection status: {}", s)),
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered App Configuration store.
///
/// Holds the raw connection string; convert to [`ResourceResponse`] before
/// returning it to a caller.
#[derive(Clone)]
pub struct AppConfigResource {
    pub id: Uuid,
    pub display_name: String,
    pub environment_type: EnvironmentType,
    pub resource_name: String,
    pub resource_group: String,
    pub connection_string: String,
    pub endpoint: Option<String>,
    pub subscription_id: String,
    pub connection_status: ConnectionStatus,
    pub last_tested: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for AppConfigResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfigResource")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("environment_type", &self.environment_type)
            .field("resource_name", &self.resource_name)
            .field("connection_string", &"[REDACTED]")
            .field("connection_status", &self.connection_status)
            .finish_non_exhaustive()
    }
}

/// Resource as returned by the API, with the connection string masked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceResponse {
    pub id: Uuid,
    pub display_name: String,
    pub environment_type: EnvironmentType,
    pub resource_name: String,
    pub resource_group: String,
    pub connection_string: String,
    pub endpoint: Option<String>,
    pub subscription_id: String,
    pub connection_status: ConnectionStatus,
    pub last_tested: Option<DateTime<Utc>>,
    pub requires_confirmation: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AppConfigResource> for ResourceResponse {
    fn from(resource: AppConfigResource) -> Self {
        Self {
            id: resource.id,
            display_name: resource.display_name,
            requires_confirmation: resource.environment_type.requires_confirmation(),
            environment_type: resource.environment_type,
            resource_name: resource.resource_name,
            resource_group: resource.resource_group,
            connection_string: mask_connection_string(&resource.connection_string),
            endpoint: resource.endpoint,
            subscription_id: resource.subscription_id,
            connection_status: resource.connection_status,
            last_tested: resource.last_tested,
            created_at: resource.created_at,
            updated_at: resource.updated_at,
        }
    }
}

/// Request to register a store.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateResourceRequest {
    #[validate(
        length(min = 1, max = 100, message = "Display name must be 1-100 characters"),
        custom(function = "shared::validation::validate_not_blank")
    )]
    pub display_name: String,

    pub environment_type: EnvironmentType,

    #[validate(length(min = 1, max = 100, message = "Resource name must be 1-100 characters"))]
    pub resource_name: String,

    #[validate(length(min = 1, max = 100, message = "Resource group must be 1-100 characters"))]
    pub resource_group: String,

    #[validate(custom(function = "shared::validation::validate_connection_string"))]
    pub connection_string: String,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub subscription_id: Option<String>,
}

/// Partial update of a store. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResourceRequest {
    #[validate(length(min = 1, max = 100, message = "Display name must be 1-100 characters"))]
    pub display_name: Option<String>,

    pub environment_type: Option<EnvironmentType>,

    #[validate(length(min = 1, max = 100, message = "Resource name must be 1-100 characters"))]
    pub resource_name: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Resource group must be 1-100 characters"))]
    pub resource_group: Option<String>,

    /// Ignored when empty or still masked.
    #[validate(custom(function = "shared::validation::validate_connection_string_update"))]
    pub connection_string: Option<String>,

    /// Ignored when empty.
    #[validate(length(max = 100))]
    pub subscription_id: Option<String>,
}

impl UpdateResourceRequest {
    /// The new connection string, if the caller really supplied one.
    pub fn replacement_connection_string(&self) -> Option<&str> {
        self.connection_string
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty() && !shared::connection_string::is_masked(v))
    }

    /// The new subscription id, if non-empty.
    pub fn replacement_subscription_id(&self) -> Option<&str> {
        self.subscription_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Body of `POST /resources/test-connection`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionRequest {
    pub connection_string: Option<String>,
    pub resource_id: Option<Uuid>,
}

/// Outcome of a connection test. Failures are reported here, never as an
/// HTTP error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Response to a delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResourceResponse {
    pub success: bool,
    pub message: String,
}

/// Azure subscription visible to the signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub subscription_id: String,
    pub name: String,
    pub state: String,
}

/// App Configuration store found through Azure Resource Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredResource {
    pub display_name: String,
    pub resource_name: String,
    pub resource_group: String,
    pub subscription_id: String,
    pub endpoint: Option<String>,
    pub location: String,
    pub environment_type: EnvironmentType,
    pub tags: HashMap<String, String>,
}

/// Resource group segment of an ARM resource id
/// (`/subscriptions/{s}/resourceGroups/{rg}/providers/...`).
pub fn resource_group_from_id(resource_id: &str) -> Option<String> {
    let mut segments = resource_id.split('/');
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case("resourcegroups") {
            return segments
                .next()
                .filter(|rg| !rg.is_empty())
                .map(str::to_string);
        }
    }
    None
}
