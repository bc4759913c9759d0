//! Access to the feature flags held by an App Configuration store.
//!
//! [`FeatureFlagStore`] abstracts the data plane so handlers can be tested
//! without network access. The HTTP implementation lives in the api crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use shared::connection_string::ConnectionString;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{FeatureFlag, FlagValueError};

/// Errors raised while talking to a store.
#[derive(Debug, Error)]
pub enum FlagStoreError {
    #[error("Credentials were rejected by the configuration store")]
    Unauthorized,

    #[error("Feature flag not found: {0}")]
    NotFound(String),

    #[error("Feature flag was modified by someone else")]
    PreconditionFailed,

    #[error("Could not reach the configuration store: {0}")]
    Network(String),

    #[error("Configuration store returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error(transparent)]
    InvalidFlagValue(#[from] FlagValueError),
}

/// Read and write feature flags in one store.
#[async_trait::async_trait]
pub trait FeatureFlagStore: Send + Sync {
    /// Every feature flag in the store, across all labels.
    async fn list_flags(
        &self,
        credentials: &ConnectionString,
    ) -> Result<Vec<FeatureFlag>, FlagStoreError>;

    /// One flag by full key and label. An empty label is the null label.
    async fn get_flag(
        &self,
        credentials: &ConnectionString,
        key: &str,
        label: &str,
    ) -> Result<FeatureFlag, FlagStoreError>;

    /// Writes `flag.value`. When `flag.etag` is set the write is conditional
    /// on it. Returns the flag as stored, with its new etag.
    async fn put_flag(
        &self,
        credentials: &ConnectionString,
        flag: &FeatureFlag,
    ) -> Result<FeatureFlag, FlagStoreError>;

    /// Cheapest authenticated call that proves the credentials work.
    async fn test_connection(&self, credentials: &ConnectionString) -> Result<(), FlagStoreError>;
}

type FlagKey = (String, String, String);

/// In-memory store for tests and local development.
///
/// Flags are keyed by endpoint, key and label. Every write bumps the etag.
#[derive(Debug, Default)]
pub struct InMemoryFeatureFlagStore {
    flags: RwLock<HashMap<FlagKey, FeatureFlag>>,
    /// Fail every call with a network error.
    pub simulate_failure: bool,
    /// Fail writes only.
    pub simulate_write_failure: bool,
    reads: AtomicUsize,
    writes: AtomicUsize,
    etag_counter: AtomicUsize,
}

impl InMemoryFeatureFlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    pub fn failing_writes() -> Self {
        Self {
            simulate_write_failure: true,
            ..Self::default()
        }
    }

    /// Seeds a flag for the store at `endpoint`.
    pub async fn insert(&self, endpoint: &str, mut flag: FeatureFlag) {
        flag.etag = Some(self.next_etag());
        self.flags.write().await.insert(
            (endpoint.to_string(), flag.key.clone(), flag.label.clone()),
            flag,
        );
    }

    /// Current state of a flag, bypassing the call counters.
    pub async fn snapshot(&self, endpoint: &str, key: &str, label: &str) -> Option<FeatureFlag> {
        self.flags
            .read()
            .await
            .get(&(endpoint.to_string(), key.to_string(), label.to_string()))
            .cloned()
    }

    /// Number of read calls made so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of write calls made so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn next_etag(&self) -> String {
        format!("etag-{}", self.etag_counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn check_failure(&self) -> Result<(), FlagStoreError> {
        if self.simulate_failure {
            return Err(FlagStoreError::Network(
                "in-memory store simulating failure".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl FeatureFlagStore for InMemoryFeatureFlagStore {
    async fn list_flags(
        &self,
        credentials: &ConnectionString,
    ) -> Result<Vec<FeatureFlag>, FlagStoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let mut flags: Vec<FeatureFlag> = self
            .flags
            .read()
            .await
            .iter()
            .filter(|((endpoint, _, _), _)| endpoint == &credentials.endpoint)
            .map(|(_, flag)| flag.clone())
            .collect();
        flags.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.label.cmp(&b.label)));
        Ok(flags)
    }

    async fn get_flag(
        &self,
        credentials: &ConnectionString,
        key: &str,
        label: &str,
    ) -> Result<FeatureFlag, FlagStoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        self.flags
            .read()
            .await
            .get(&(
                credentials.endpoint.clone(),
                key.to_string(),
                label.to_string(),
            ))
            .cloned()
            .ok_or_else(|| FlagStoreError::NotFound(key.to_string()))
    }

    async fn put_flag(
        &self,
        credentials: &ConnectionString,
        flag: &FeatureFlag,
    ) -> Result<FeatureFlag, FlagStoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        if self.simulate_write_failure {
            return Err(FlagStoreError::Remote {
                status: 500,
                message: "in-memory store simulating write failure".to_string(),
            });
        }

        let map_key = (
            credentials.endpoint.clone(),
            flag.key.clone(),
            flag.label.clone(),
        );
        let mut flags = self.flags.write().await;
        if let (Some(expected), Some(current)) = (flag.etag.as_ref(), flags.get(&map_key)) {
            if current.etag.as_ref() != Some(expected) {
                return Err(FlagStoreError::PreconditionFailed);
            }
        }

        let mut stored = flag.clone();
        stored.etag = Some(self.next_etag());
        flags.insert(map_key, stored.clone());
        Ok(stored)
    }

    async fn test_connection(&self, _credentials: &ConnectionString) -> Result<(), FlagStoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check_failure()
    }
}
