//! OAuth2 On-Behalf-Of token exchange against Azure AD.
//!
//! Trades the caller's API access token for a token scoped to a downstream
//! resource (Azure Resource Manager). Tokens are not cached; each request
//! performs its own exchange.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info_span, warn, Instrument};

use crate::config::{AzureAdConfig, AzureManagementConfig};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Display name of the downstream resource, used in error messages.
pub const MANAGEMENT_RESOURCE_NAME: &str = "Azure Management API";

/// Identity-service error codes that mean the user must sign in again.
const CONSENT_ERRORS: [&str; 3] = ["interaction_required", "consent_required", "invalid_grant"];

/// Error type for On-Behalf-Of exchanges.
#[derive(Debug, thiserror::Error)]
pub enum TokenExchangeError {
    #[error("Additional consent required for {resource}. Please sign in again.")]
    ConsentRequired { resource: String },

    #[error("Failed to acquire token for {resource}: {description}")]
    Rejected {
        resource: String,
        description: String,
    },

    #[error("Azure AD client secret is not configured")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected token endpoint response: {0}")]
    UnexpectedResponse(String),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[allow(dead_code)]
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenErrorResponse {
    fn into_error(self, resource: &str) -> TokenExchangeError {
        if CONSENT_ERRORS.contains(&self.error.as_str()) {
            return TokenExchangeError::ConsentRequired {
                resource: resource.to_string(),
            };
        }
        let description = self
            .error_description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(self.error);
        TokenExchangeError::Rejected {
            resource: resource.to_string(),
            description,
        }
    }
}

/// Confidential client performing On-Behalf-Of exchanges.
pub struct OnBehalfOfClient {
    http: Client,
    token_endpoint: String,
    client_id: String,
    client_secret: String,
    management_scope: String,
}

impl OnBehalfOfClient {
    /// Returns `None` when no client secret is configured.
    pub fn from_config(
        azure_ad: &AzureAdConfig,
        management: &AzureManagementConfig,
    ) -> Result<Option<Self>, TokenExchangeError> {
        let Some(secret) = azure_ad.client_secret() else {
            return Ok(None);
        };
        let http = Client::builder()
            .timeout(Duration::from_millis(management.timeout_ms))
            .build()?;
        Ok(Some(Self {
            http,
            token_endpoint: azure_ad.token_endpoint(),
            client_id: azure_ad.client_id.clone(),
            client_secret: secret.to_string(),
            management_scope: management.scope(),
        }))
    }

    /// Token for Azure Resource Manager on behalf of the caller.
    pub async fn management_token(&self, user_token: &str) -> Result<String, TokenExchangeError> {
        self.exchange(user_token, &self.management_scope, MANAGEMENT_RESOURCE_NAME)
            .await
    }

    pub async fn exchange(
        &self,
        user_token: &str,
        scope: &str,
        resource: &str,
    ) -> Result<String, TokenExchangeError> {
        let span = info_span!("obo.exchange", scope = %scope);
        async move {
            let form = [
                ("grant_type", JWT_BEARER_GRANT),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("assertion", user_token),
                ("scope", scope),
                ("requested_token_use", "on_behalf_of"),
            ];

            let response = self
                .http
                .post(&self.token_endpoint)
                .form(&form)
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                let token: TokenResponse = response
                    .json()
                    .await
                    .map_err(|e| TokenExchangeError::UnexpectedResponse(e.to_string()))?;
                debug!("On-Behalf-Of exchange succeeded");
                return Ok(token.access_token);
            }

            let body = response.text().await.unwrap_or_default();
            match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(error) if !error.error.is_empty() => {
                    warn!(status = status.as_u16(), code = %error.error, "On-Behalf-Of exchange rejected");
                    Err(error.into_error(resource))
                }
                _ => Err(TokenExchangeError::UnexpectedResponse(format!(
                    "status {}",
                    status.as_u16()
                ))),
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(code: &str, description: Option<&str>) -> TokenErrorResponse {
        TokenErrorResponse {
            error: code.to_string(),
            error_description: description.map(str::to_string),
        }
    }

    #[test]
    fn test_consent_errors_map_to_consent_required() {
        for code in CONSENT_ERRORS {
            let err = error(code, Some("AADSTS65001")).into_error(MANAGEMENT_RESOURCE_NAME);
            assert_eq!(
                err.to_string(),
                "Additional consent required for Azure Management API. Please sign in again."
            );
        }
    }

    #[test]
    fn test_other_errors_carry_description() {
        let err = error("invalid_client", Some("AADSTS7000215: bad secret"))
            .into_error(MANAGEMENT_RESOURCE_NAME);
        assert_eq!(
            err.to_string(),
            "Failed to acquire token for Azure Management API: AADSTS7000215: bad secret"
        );
    }

    #[test]
    fn test_missing_description_falls_back_to_code() {
        let err = error("unauthorized_client", None).into_error("X");
        assert!(matches!(
            err,
            TokenExchangeError::Rejected { ref description, .. } if description == "unauthorized_client"
        ));
    }

    #[test]
    fn test_error_response_parses() {
        let parsed: TokenErrorResponse = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"expired","error_codes":[50173]}"#,
        )
        .unwrap();
        assert_eq!(parsed.error, "invalid_grant");
    }

    #[test]
    fn test_from_config_without_secret_is_none() {
        let azure_ad: AzureAdConfig = serde_json::from_value(serde_json::json!({
            "tenant_id": "t",
            "client_id": "c",
            "client_secret": "   "
        }))
        .unwrap();
        let client = OnBehalfOfClient::from_config(&azure_ad, &AzureManagementConfig::default())
            .unwrap();
        assert!(client.is_none());
    }
}
