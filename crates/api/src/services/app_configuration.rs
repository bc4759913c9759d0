//! App Configuration data-plane client.
//!
//! Implements [`FeatureFlagStore`] over the REST API, signing every request
//! with the access key from the resource's connection string.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use domain::models::toggle::{FEATURE_FLAG_CONTENT_TYPE, FEATURE_FLAG_PREFIX};
use domain::models::{FeatureFlag, KeyValue};
use domain::services::{FeatureFlagStore, FlagStoreError};
use metrics::histogram;
use reqwest::{header, Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use shared::connection_string::ConnectionString;
use shared::hmac_auth::sign_request;
use tracing::{debug, info_span, Instrument};

use crate::config::AppConfigurationConfig;

const KV_SET_ACCEPT: &str =
    "application/vnd.microsoft.appconfig.kvset+json, application/problem+json";
const KV_ACCEPT: &str = "application/vnd.microsoft.appconfig.kv+json, application/problem+json";
const KV_CONTENT_TYPE: &str = "application/vnd.microsoft.appconfig.kv+json";

/// Upper bound on `@nextLink` pages followed for one listing.
const MAX_PAGES: usize = 100;

#[derive(Debug, Deserialize)]
struct KeyValuePage {
    #[serde(default)]
    items: Vec<KeyValue>,
    #[serde(rename = "@nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutKeyValueBody<'a> {
    value: &'a str,
    content_type: &'a str,
}

/// HMAC-signed HTTP client for App Configuration stores.
#[derive(Clone)]
pub struct AppConfigurationClient {
    http: Client,
    api_version: String,
}

impl AppConfigurationClient {
    pub fn new(config: &AppConfigurationConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            api_version: config.api_version.clone(),
        })
    }

    fn list_path(&self) -> String {
        format!(
            "/kv?key={}&label=*&api-version={}",
            urlencoding::encode(&format!("{}*", FEATURE_FLAG_PREFIX)),
            self.api_version
        )
    }

    fn key_path(&self, key: &str, label: &str) -> String {
        let mut path = format!("/kv/{}?", urlencoding::encode(key));
        if !label.is_empty() {
            path.push_str(&format!("label={}&", urlencoding::encode(label)));
        }
        path.push_str(&format!("api-version={}", self.api_version));
        path
    }

    /// Signs and sends one request. Non-success statuses become errors.
    async fn send(
        &self,
        credentials: &ConnectionString,
        method: Method,
        path_and_query: &str,
        accept: &str,
        body: Option<Vec<u8>>,
        if_match: Option<&str>,
    ) -> Result<reqwest::Response, FlagStoreError> {
        let payload = body.unwrap_or_default();
        let signed = sign_request(
            credentials,
            method.as_str(),
            path_and_query,
            &payload,
            Utc::now(),
        )
        .map_err(|e| FlagStoreError::InvalidConnectionString(e.to_string()))?;

        let url = format!("{}{}", credentials.endpoint, path_and_query);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .header("x-ms-date", &signed.date)
            .header("x-ms-content-sha256", &signed.content_hash)
            .header(header::AUTHORIZATION, &signed.authorization)
            .header(header::ACCEPT, accept);
        if let Some(etag) = if_match {
            request = request.header(header::IF_MATCH, format!("\"{}\"", etag.trim_matches('"')));
        }
        if !payload.is_empty() {
            request = request
                .header(header::CONTENT_TYPE, KV_CONTENT_TYPE)
                .body(payload);
        }

        let start = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| FlagStoreError::Network(e.to_string()))?;
        histogram!(
            "app_configuration_request_duration_seconds",
            "method" => method.as_str().to_string()
        )
        .record(start.elapsed().as_secs_f64());

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), body = %message, "App Configuration request failed");
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FlagStoreError::Unauthorized,
            StatusCode::PRECONDITION_FAILED => FlagStoreError::PreconditionFailed,
            StatusCode::NOT_FOUND => FlagStoreError::NotFound(path_and_query.to_string()),
            _ => FlagStoreError::Remote {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn read_key_value(response: reqwest::Response) -> Result<KeyValue, FlagStoreError> {
        let etag_header = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string());
        let mut kv: KeyValue = response
            .json()
            .await
            .map_err(|e| FlagStoreError::Network(format!("Invalid response body: {}", e)))?;
        if kv.etag.is_none() {
            kv.etag = etag_header;
        }
        Ok(kv)
    }
}

#[async_trait]
impl FeatureFlagStore for AppConfigurationClient {
    async fn list_flags(
        &self,
        credentials: &ConnectionString,
    ) -> Result<Vec<FeatureFlag>, FlagStoreError> {
        let span = info_span!("app_configuration.list_flags", host = credentials.host());
        async move {
            let mut flags = Vec::new();
            let mut next = Some(self.list_path());
            let mut pages = 0;

            while let Some(path) = next.take() {
                pages += 1;
                if pages > MAX_PAGES {
                    tracing::warn!("Stopped following nextLink after {} pages", MAX_PAGES);
                    break;
                }
                let response = self
                    .send(credentials, Method::GET, &path, KV_SET_ACCEPT, None, None)
                    .await?;
                let page: KeyValuePage = response
                    .json()
                    .await
                    .map_err(|e| FlagStoreError::Network(format!("Invalid response body: {}", e)))?;
                flags.extend(page.items.into_iter().filter_map(FeatureFlag::from_key_value));
                next = page.next_link.filter(|link| !link.is_empty());
            }

            debug!(count = flags.len(), "Listed feature flags");
            Ok(flags)
        }
        .instrument(span)
        .await
    }

    async fn get_flag(
        &self,
        credentials: &ConnectionString,
        key: &str,
        label: &str,
    ) -> Result<FeatureFlag, FlagStoreError> {
        let path = self.key_path(key, label);
        let response = self
            .send(credentials, Method::GET, &path, KV_ACCEPT, None, None)
            .await
            .map_err(|e| match e {
                FlagStoreError::NotFound(_) => FlagStoreError::NotFound(key.to_string()),
                other => other,
            })?;
        let kv = Self::read_key_value(response).await?;
        FeatureFlag::from_key_value(kv).ok_or_else(|| FlagStoreError::NotFound(key.to_string()))
    }

    async fn put_flag(
        &self,
        credentials: &ConnectionString,
        flag: &FeatureFlag,
    ) -> Result<FeatureFlag, FlagStoreError> {
        let span = info_span!("app_configuration.put_flag", key = %flag.key, label = %flag.label);
        async move {
            let body = serde_json::to_vec(&PutKeyValueBody {
                value: &flag.value,
                content_type: FEATURE_FLAG_CONTENT_TYPE,
            })
            .map_err(|e| FlagStoreError::Network(e.to_string()))?;

            let path = self.key_path(&flag.key, &flag.label);
            let response = self
                .send(
                    credentials,
                    Method::PUT,
                    &path,
                    KV_ACCEPT,
                    Some(body),
                    flag.etag.as_deref(),
                )
                .await?;
            let kv = Self::read_key_value(response).await?;
            FeatureFlag::from_key_value(kv).ok_or_else(|| FlagStoreError::Remote {
                status: 200,
                message: "Store returned a key that is not a feature flag".to_string(),
            })
        }
        .instrument(span)
        .await
    }

    async fn test_connection(&self, credentials: &ConnectionString) -> Result<(), FlagStoreError> {
        let path = format!("/kv?api-version={}", self.api_version);
        self.send(credentials, Method::GET, &path, KV_SET_ACCEPT, None, None)
            .await
            .map(|_| ())
    }
}
