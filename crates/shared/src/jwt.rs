//! Azure AD access-token validation.
//!
//! Tokens are RS256-signed by Microsoft identity platform keys. The key is
//! picked by the `kid` header from a [`KeySet`], which is built either from a
//! JWKS document or from a single PEM public key.

use std::collections::HashMap;

use jsonwebtoken::{
    decode, decode_header,
    jwk::{AlgorithmParameters, JwkSet},
    Algorithm, DecodingKey, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for JWT operations.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to decode token: {0}")]
    DecodingError(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token audience is not accepted")]
    InvalidAudience,

    #[error("Token issuer is not accepted")]
    InvalidIssuer,

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("No signing key found for kid {0}")]
    UnknownKeyId(String),
}

/// Claims read from an Azure AD access token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AzureAdClaims {
    /// Subject, pairwise per application.
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Object id of the user in the tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,
    /// Tenant id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upn: Option<String>,
}

impl AzureAdClaims {
    /// Best available email-like identifier: `email`, then
    /// `preferred_username`, then `upn`.
    pub fn email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .or(self.preferred_username.as_deref())
            .or(self.upn.as_deref())
            .filter(|v| !v.is_empty())
    }

    /// Display name, falling back to the email.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .filter(|v| !v.is_empty())
            .or_else(|| self.email())
    }

    /// Stable external identifier (`oid`, else `sub`).
    pub fn external_id(&self) -> &str {
        self.oid.as_deref().unwrap_or(&self.sub)
    }
}

/// Audience, issuer and clock-skew rules applied to every token.
#[derive(Debug, Clone)]
pub struct TokenRules {
    pub audiences: Vec<String>,
    pub issuers: Vec<String>,
    pub leeway_secs: u64,
    pub algorithm: Algorithm,
}

impl TokenRules {
    /// Rules for a single-tenant Azure AD application.
    ///
    /// Accepts the client id and `api://<client id>` as audience, and both
    /// the v1 (`sts.windows.net`) and v2 (`login.microsoftonline.com`)
    /// issuers of the tenant.
    pub fn for_tenant(tenant_id: &str, client_id: &str, leeway_secs: u64) -> Self {
        Self {
            audiences: vec![client_id.to_string(), format!("api://{}", client_id)],
            issuers: vec![
                format!("https://login.microsoftonline.com/{}/v2.0", tenant_id),
                format!("https://sts.windows.net/{}/", tenant_id),
            ],
            leeway_secs,
            algorithm: Algorithm::RS256,
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.leeway = self.leeway_secs;
        if self.audiences.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&self.audiences);
        }
        if !self.issuers.is_empty() {
            validation.set_issuer(&self.issuers);
        }
        validation
    }
}

/// Signing keys indexed by key id.
#[derive(Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, DecodingKey>,
    fallback: Option<DecodingKey>,
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySet")
            .field("kids", &self.keys.keys().collect::<Vec<_>>())
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}

impl KeySet {
    /// Single RSA public key used for every token regardless of `kid`.
    pub fn from_rsa_pem(pem: &str) -> Result<Self, JwtError> {
        let key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(format!("Invalid public key: {}", e)))?;
        Ok(Self {
            keys: HashMap::new(),
            fallback: Some(key),
        })
    }

    /// Symmetric key, only meaningful together with an HS* algorithm.
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            keys: HashMap::new(),
            fallback: Some(DecodingKey::from_secret(secret)),
        }
    }

    /// Builds the set from a JWKS document. Non-RSA keys and keys without a
    /// `kid` are skipped.
    pub fn from_jwks(jwks: &JwkSet) -> Result<Self, JwtError> {
        let mut keys = HashMap::new();
        for jwk in &jwks.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                continue;
            };
            if !matches!(jwk.algorithm, AlgorithmParameters::RSA(_)) {
                continue;
            }
            let key = DecodingKey::from_jwk(jwk)
                .map_err(|e| JwtError::InvalidKey(format!("Invalid JWK {}: {}", kid, e)))?;
            keys.insert(kid, key);
        }
        Ok(Self {
            keys,
            fallback: None,
        })
    }

    pub fn len(&self) -> usize {
        self.keys.len() + usize::from(self.fallback.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    fn select(&self, kid: Option<&str>) -> Result<&DecodingKey, JwtError> {
        if let Some(kid) = kid {
            if let Some(key) = self.keys.get(kid) {
                return Ok(key);
            }
        }
        self.fallback
            .as_ref()
            .ok_or_else(|| JwtError::UnknownKeyId(kid.unwrap_or("<none>").to_string()))
    }
}

/// Reads the `kid` header without verifying the token.
pub fn key_id(token: &str) -> Result<Option<String>, JwtError> {
    decode_header(token)
        .map(|header| header.kid)
        .map_err(|e| JwtError::DecodingError(e.to_string()))
}

/// Verifies signature, expiry, audience and issuer and returns the claims.
pub fn validate_token(
    token: &str,
    keys: &KeySet,
    rules: &TokenRules,
) -> Result<AzureAdClaims, JwtError> {
    let kid = key_id(token)?;
    let key = keys.select(kid.as_deref())?;

    let token_data =
        decode::<AzureAdClaims>(token, key, &rules.validation()).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            jsonwebtoken::errors::ErrorKind::InvalidAudience => JwtError::InvalidAudience,
            jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
            jsonwebtoken::errors::ErrorKind::InvalidToken
            | jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidToken,
            _ => JwtError::DecodingError(e.to_string()),
        })?;

    Ok(token_data.claims)
}
