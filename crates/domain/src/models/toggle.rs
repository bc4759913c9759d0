//! Feature toggle domain models.
//!
//! A toggle is the local cache of one App Configuration feature flag. The
//! remote store is authoritative; the cache is refreshed on every list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use super::resource::EnvironmentType;

/// Key prefix App Configuration uses for feature flags.
pub const FEATURE_FLAG_PREFIX: &str = ".appconfig.featureflag/";

/// Content type App Configuration assigns to feature flag values.
pub const FEATURE_FLAG_CONTENT_TYPE: &str =
    "application/vnd.microsoft.appconfig.ff+json;charset=utf-8";

/// Cached feature toggle row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureToggle {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub key: String,
    pub label: String,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub last_modified_by: Option<String>,
    pub last_modified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Toggles of one resource, with the confirmation hint for the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleListResponse {
    pub resource_id: Uuid,
    pub environment_type: EnvironmentType,
    pub requires_confirmation: bool,
    pub toggles: Vec<FeatureToggle>,
}

/// Body of the mutate-toggle request.
///
/// `enabled` is kept as raw JSON so that a non-boolean value can be rejected
/// with a specific message after the role check.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateToggleRequest {
    #[serde(default)]
    pub enabled: JsonValue,
}

impl UpdateToggleRequest {
    pub fn requested_state(&self) -> Option<bool> {
        self.enabled.as_bool()
    }
}

/// One key-value as returned by the App Configuration REST API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub locked: Option<bool>,
}

/// Error raised when a flag document cannot be rewritten.
#[derive(Debug, Error)]
#[error("Feature flag value is not a JSON object: {0}")]
pub struct FlagValueError(String);

/// A feature flag read from the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFlag {
    /// Full remote key, including the prefix.
    pub key: String,
    /// Empty string stands for the null label.
    pub label: String,
    /// Flag id (key without the prefix).
    pub name: String,
    pub enabled: bool,
    pub description: Option<String>,
    /// Raw JSON document stored as the key-value's value.
    pub value: String,
    pub etag: Option<String>,
}

impl FeatureFlag {
    /// Builds a flag from a key-value, or `None` if the key is not a
    /// feature flag.
    pub fn from_key_value(kv: KeyValue) -> Option<Self> {
        let name = kv.key.strip_prefix(FEATURE_FLAG_PREFIX)?.to_string();
        let value = kv.value.unwrap_or_default();
        let (enabled, description) = parse_flag_value(&value);
        Some(Self {
            key: kv.key,
            label: kv.label.unwrap_or_default(),
            name,
            enabled,
            description,
            value,
            etag: kv.etag,
        })
    }

    /// Full key for a flag id.
    pub fn key_for(name: &str) -> String {
        format!("{}{}", FEATURE_FLAG_PREFIX, name)
    }

    /// Copy of this flag with `enabled` set, every other field of the
    /// document left as it was.
    pub fn with_enabled(&self, enabled: bool) -> Result<Self, FlagValueError> {
        let value = set_enabled_in_value(&self.value, enabled)?;
        Ok(Self {
            enabled,
            value,
            ..self.clone()
        })
    }
}

/// Reads `enabled` and `description` out of a flag document.
///
/// A missing or unparsable `enabled` reads as false.
pub fn parse_flag_value(value: &str) -> (bool, Option<String>) {
    match serde_json::from_str::<JsonValue>(value) {
        Ok(doc) => {
            let enabled = doc.get("enabled").and_then(JsonValue::as_bool).unwrap_or(false);
            let description = doc
                .get("description")
                .and_then(JsonValue::as_str)
                .filter(|d| !d.is_empty())
                .map(str::to_string);
            (enabled, description)
        }
        Err(_) => (false, None),
    }
}

/// Rewrites the `enabled` field of a flag document.
pub fn set_enabled_in_value(value: &str, enabled: bool) -> Result<String, FlagValueError> {
    let mut doc: JsonValue =
        serde_json::from_str(value).map_err(|e| FlagValueError(e.to_string()))?;
    let object = doc
        .as_object_mut()
        .ok_or_else(|| FlagValueError("expected an object".to_string()))?;
    object.insert("enabled".to_string(), JsonValue::Bool(enabled));
    serde_json::to_string(&doc).map_err(|e| FlagValueError(e.to_string()))
}
