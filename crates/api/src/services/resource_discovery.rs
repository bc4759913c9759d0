//! App Configuration store discovery through Azure Resource Manager.

use std::collections::HashMap;
use std::time::Duration;

use domain::models::resource::resource_group_from_id;
use domain::models::{DiscoveredResource, EnvironmentType, SubscriptionInfo};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{info, info_span, warn, Instrument};

use crate::config::AzureManagementConfig;
use crate::services::token_exchange::{OnBehalfOfClient, TokenExchangeError};

const MAX_PAGES: usize = 50;
const UNKNOWN_RESOURCE_GROUP: &str = "Unknown";

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    TokenExchange(#[from] TokenExchangeError),

    #[error("Azure Resource Manager returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct ArmPage<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArmSubscription {
    subscription_id: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    state: String,
}

#[derive(Debug, Deserialize)]
struct ArmConfigurationStore {
    #[serde(default)]
    id: String,
    name: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    tags: Option<HashMap<String, String>>,
    #[serde(default)]
    properties: Option<ArmStoreProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArmStoreProperties {
    #[serde(default)]
    endpoint: Option<String>,
}

impl ArmConfigurationStore {
    fn into_discovered(self, subscription_id: &str) -> DiscoveredResource {
        let tags = self.tags.unwrap_or_default();
        DiscoveredResource {
            display_name: self.name.clone(),
            environment_type: EnvironmentType::infer(&self.name, &tags),
            resource_group: resource_group_from_id(&self.id)
                .unwrap_or_else(|| UNKNOWN_RESOURCE_GROUP.to_string()),
            resource_name: self.name,
            subscription_id: subscription_id.to_string(),
            endpoint: self.properties.and_then(|p| p.endpoint),
            location: self.location,
            tags,
        }
    }
}

/// Lists subscriptions and App Configuration stores visible to the caller.
#[derive(Clone)]
pub struct ResourceDiscoveryClient {
    http: Client,
    config: AzureManagementConfig,
}

impl ResourceDiscoveryClient {
    pub fn new(config: &AzureManagementConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    fn subscriptions_url(&self) -> String {
        format!(
            "{}/subscriptions?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.subscriptions_api_version
        )
    }

    fn stores_url(&self, subscription_id: &str) -> String {
        format!(
            "{}/subscriptions/{}/providers/Microsoft.AppConfiguration/configurationStores?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            urlencoding::encode(subscription_id),
            self.config.stores_api_version
        )
    }

    /// GETs `url` and every page after it.
    async fn get_all<T: DeserializeOwned>(
        &self,
        token: &str,
        url: String,
    ) -> Result<Vec<T>, DiscoveryError> {
        let mut items = Vec::new();
        let mut next = Some(url);
        let mut pages = 0;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                warn!("Stopped following nextLink after {} pages", MAX_PAGES);
                break;
            }
            let response = self.http.get(&url).bearer_auth(token).send().await?;
            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(DiscoveryError::Remote {
                    status: status.as_u16(),
                    message,
                });
            }
            let page: ArmPage<T> = response.json().await?;
            items.extend(page.value);
            next = page.next_link.filter(|link| !link.is_empty());
        }

        Ok(items)
    }

    pub async fn list_subscriptions(
        &self,
        obo: &OnBehalfOfClient,
        user_token: &str,
    ) -> Result<Vec<SubscriptionInfo>, DiscoveryError> {
        let token = obo.management_token(user_token).await?;
        self.subscriptions_with_token(&token).await
    }

    async fn subscriptions_with_token(
        &self,
        token: &str,
    ) -> Result<Vec<SubscriptionInfo>, DiscoveryError> {
        let span = info_span!("arm.list_subscriptions");
        let subscriptions: Vec<ArmSubscription> = self
            .get_all(token, self.subscriptions_url())
            .instrument(span)
            .await?;
        Ok(subscriptions
            .into_iter()
            .map(|s| SubscriptionInfo {
                subscription_id: s.subscription_id,
                name: s.display_name,
                state: s.state,
            })
            .collect())
    }

    /// Every App Configuration store across the caller's subscriptions.
    /// Subscriptions that fail are logged and skipped.
    pub async fn discover(
        &self,
        obo: &OnBehalfOfClient,
        user_token: &str,
    ) -> Result<Vec<DiscoveredResource>, DiscoveryError> {
        let token = obo.management_token(user_token).await?;
        let subscriptions = self.subscriptions_with_token(&token).await?;

        let mut resources = Vec::new();
        for subscription in &subscriptions {
            let span = info_span!(
                "arm.list_configuration_stores",
                subscription_id = %subscription.subscription_id
            );
            let result: Result<Vec<ArmConfigurationStore>, _> = self
                .get_all(&token, self.stores_url(&subscription.subscription_id))
                .instrument(span)
                .await;
            match result {
                Ok(stores) => resources.extend(
                    stores
                        .into_iter()
                        .map(|store| store.into_discovered(&subscription.subscription_id)),
                ),
                Err(e) => warn!(
                    subscription_id = %subscription.subscription_id,
                    error = %e,
                    "Skipping subscription during discovery"
                ),
            }
        }

        info!(
            subscriptions = subscriptions.len(),
            stores = resources.len(),
            "Discovered App Configuration stores"
        );
        Ok(resources)
    }
}
