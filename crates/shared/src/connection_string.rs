//! App Configuration connection-string parsing and masking.
//!
//! A connection string has the form
//! `Endpoint=https://<store>.azconfig.io;Id=<credential id>;Secret=<base64 secret>`.

use thiserror::Error;

/// Placeholder written in place of secret values.
pub const MASK: &str = "***";

/// Error type for connection-string parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionStringError {
    #[error("Connection string is missing the {0} segment")]
    MissingSegment(&'static str),

    #[error("Connection string is masked and cannot be used")]
    Masked,

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Parsed App Configuration credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub endpoint: String,
    pub id: String,
    pub secret: String,
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("endpoint", &self.endpoint)
            .field("id", &self.id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl ConnectionString {
    /// Parses `Endpoint`, `Id` and `Secret` out of a `;`-separated string.
    ///
    /// Segment names are matched case-insensitively. Only the first `=` of a
    /// segment separates name from value, so base64 padding in the secret is
    /// preserved.
    pub fn parse(raw: &str) -> Result<Self, ConnectionStringError> {
        if is_masked(raw) {
            return Err(ConnectionStringError::Masked);
        }

        let mut endpoint = None;
        let mut id = None;
        let mut secret = None;

        for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let Some((name, value)) = segment.split_once('=') else {
                continue;
            };
            match name.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value.trim().to_string()),
                "id" => id = Some(value.trim().to_string()),
                "secret" => secret = Some(value.trim().to_string()),
                _ => {}
            }
        }

        let endpoint = endpoint
            .filter(|v| !v.is_empty())
            .ok_or(ConnectionStringError::MissingSegment("Endpoint"))?;
        let id = id
            .filter(|v| !v.is_empty())
            .ok_or(ConnectionStringError::MissingSegment("Id"))?;
        let secret = secret
            .filter(|v| !v.is_empty())
            .ok_or(ConnectionStringError::MissingSegment("Secret"))?;

        if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
            return Err(ConnectionStringError::InvalidEndpoint(endpoint));
        }

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            id,
            secret,
        })
    }

    /// Host part of the endpoint, used in the signed `host` header.
    pub fn host(&self) -> &str {
        let without_scheme = self
            .endpoint
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.endpoint);
        without_scheme.split('/').next().unwrap_or(without_scheme)
    }
}

/// Replaces the value of every segment whose text mentions `secret` or `key`
/// with `***`.
///
/// Segments are split on `;` and re-joined with `;`. Non-sensitive segments
/// are returned unchanged.
pub fn mask_connection_string(raw: &str) -> String {
    raw.split(';')
        .map(|segment| {
            let lower = segment.to_lowercase();
            if lower.contains("secret") || lower.contains("key") {
                let name = segment.split('=').next().unwrap_or(segment);
                format!("{}={}", name, MASK)
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Returns true if the string carries the mask placeholder.
pub fn is_masked(raw: &str) -> bool {
    raw.contains(MASK)
}

/// Extracts the endpoint without validating the rest of the string.
pub fn endpoint_of(raw: &str) -> Option<String> {
    raw.split(';').find_map(|segment| {
        let (name, value) = segment.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("endpoint")
            .then(|| value.trim().trim_end_matches('/').to_string())
    })
}
