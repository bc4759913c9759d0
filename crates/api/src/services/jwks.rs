//! Access-token validation against Azure AD signing keys.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use reqwest::Client;
use shared::jwt::{key_id, validate_token, AzureAdClaims, JwtError, KeySet, TokenRules};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::AzureAdConfig;

/// Keys are refetched at least this often.
const KEY_TTL: Duration = Duration::from_secs(3600);

/// Minimum gap between refreshes triggered by an unknown `kid`.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum TokenValidatorError {
    #[error(transparent)]
    Jwt(#[from] JwtError),

    #[error("Failed to fetch signing keys: {0}")]
    KeyFetch(String),
}

enum KeySource {
    Static(Arc<KeySet>),
    Remote {
        url: String,
        http: Client,
        cache: RwLock<Option<CachedKeys>>,
    },
}

struct CachedKeys {
    keys: Arc<KeySet>,
    fetched_at: Instant,
}

/// Validates bearer tokens, fetching and caching the tenant's JWKS.
pub struct TokenValidator {
    source: KeySource,
    rules: TokenRules,
}

impl TokenValidator {
    /// Uses the configured PEM key when present, else the JWKS endpoint.
    pub fn from_config(config: &AzureAdConfig) -> Result<Self, TokenValidatorError> {
        let rules = config.token_rules();
        if let Some(pem) = config
            .public_key_pem
            .as_deref()
            .filter(|pem| !pem.trim().is_empty())
        {
            info!("Validating tokens with the configured public key");
            return Ok(Self::with_key_set(KeySet::from_rsa_pem(pem)?, rules));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TokenValidatorError::KeyFetch(e.to_string()))?;
        let url = config.jwks_endpoint();
        info!(jwks_url = %url, "Validating tokens with remote signing keys");
        Ok(Self {
            source: KeySource::Remote {
                url,
                http,
                cache: RwLock::new(None),
            },
            rules,
        })
    }

    pub fn with_key_set(keys: KeySet, rules: TokenRules) -> Self {
        Self {
            source: KeySource::Static(Arc::new(keys)),
            rules,
        }
    }

    pub async fn validate(&self, token: &str) -> Result<AzureAdClaims, TokenValidatorError> {
        let kid = key_id(token)?;
        let keys = self.keys_for(kid.as_deref()).await?;
        Ok(validate_token(token, &keys, &self.rules)?)
    }

    async fn keys_for(&self, kid: Option<&str>) -> Result<Arc<KeySet>, TokenValidatorError> {
        let (url, http, cache) = match &self.source {
            KeySource::Static(keys) => return Ok(keys.clone()),
            KeySource::Remote { url, http, cache } => (url, http, cache),
        };

        {
            let guard = cache.read().await;
            if let Some(cached) = guard.as_ref() {
                let fresh = cached.fetched_at.elapsed() < KEY_TTL;
                let known = kid.map_or(true, |kid| cached.keys.contains(kid));
                let throttled = cached.fetched_at.elapsed() < MIN_REFRESH_INTERVAL;
                if fresh && (known || throttled) {
                    return Ok(cached.keys.clone());
                }
            }
        }

        let mut guard = cache.write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(cached) = guard.as_ref() {
            let known = kid.map_or(true, |kid| cached.keys.contains(kid));
            if cached.fetched_at.elapsed() < MIN_REFRESH_INTERVAL && known {
                return Ok(cached.keys.clone());
            }
        }

        match fetch_key_set(http, url).await {
            Ok(keys) => {
                debug!(count = keys.len(), "Refreshed signing keys");
                let keys = Arc::new(keys);
                *guard = Some(CachedKeys {
                    keys: keys.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(keys)
            }
            Err(e) => match guard.as_ref() {
                Some(cached) => {
                    warn!(error = %e, "Signing key refresh failed, using cached keys");
                    Ok(cached.keys.clone())
                }
                None => Err(e),
            },
        }
    }
}

async fn fetch_key_set(http: &Client, url: &str) -> Result<KeySet, TokenValidatorError> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| TokenValidatorError::KeyFetch(e.to_string()))?;
    if !response.status().is_success() {
        return Err(TokenValidatorError::KeyFetch(format!(
            "JWKS endpoint returned {}",
            response.status()
        )));
    }
    let jwks: JwkSet = response
        .json()
        .await
        .map_err(|e| TokenValidatorError::KeyFetch(e.to_string()))?;
    Ok(KeySet::from_jwks(&jwks)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &[u8] = b"validator-test-secret";

    fn rules() -> TokenRules {
        let mut rules = TokenRules::for_tenant("tenant", "client", 0);
        rules.algorithm = Algorithm::HS256;
        rules
    }

    fn token(exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        encode(
            &Header::new(Algorithm::HS256),
            &json!({
                "sub": "s",
                "aud": "client",
                "iss": "https://login.microsoftonline.com/tenant/v2.0",
                "email": "dev@example.com",
                "exp": now + exp_offset,
            }),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_static_key_set_validates() {
        let validator = TokenValidator::with_key_set(KeySet::from_secret(SECRET), rules());
        let claims = validator.validate(&token(300)).await.unwrap();
        assert_eq!(claims.email(), Some("dev@example.com"));
    }

    #[tokio::test]
    async fn test_static_key_set_rejects_expired() {
        let validator = TokenValidator::with_key_set(KeySet::from_secret(SECRET), rules());
        let result = validator.validate(&token(-3600)).await;
        assert!(matches!(
            result,
            Err(TokenValidatorError::Jwt(JwtError::TokenExpired))
        ));
    }

    #[tokio::test]
    async fn test_garbage_token_is_a_jwt_error() {
        let validator = TokenValidator::with_key_set(KeySet::from_secret(SECRET), rules());
        assert!(matches!(
            validator.validate("garbage").await,
            Err(TokenValidatorError::Jwt(_))
        ));
    }
}
