//! HMAC-SHA256 request signing for the App Configuration data plane.
//!
//! Every request carries `x-ms-date`, `x-ms-content-sha256` and an
//! `Authorization` header computed over
//! `VERB\npath_and_query\ndate;host;content_hash` with the base64-decoded
//! access-key secret.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::connection_string::ConnectionString;
use crate::crypto::{hmac_sha256_base64, sha256_base64};

/// Headers covered by the signature, in signing order.
pub const SIGNED_HEADERS: &str = "x-ms-date;host;x-ms-content-sha256";

/// Error type for request signing.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Access key secret is not valid base64")]
    InvalidSecret,
}

/// Header values to attach to a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub date: String,
    pub content_hash: String,
    pub authorization: String,
}

/// Formats a timestamp the way `x-ms-date` expects (RFC 1123, GMT).
pub fn format_http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Signs one request.
///
/// `path_and_query` must be exactly what goes on the wire, including the
/// leading `/` and any query string.
pub fn sign_request(
    credentials: &ConnectionString,
    method: &str,
    path_and_query: &str,
    body: &[u8],
    at: DateTime<Utc>,
) -> Result<SignedRequest, SigningError> {
    let date = format_http_date(at);
    let content_hash = sha256_base64(body);

    let string_to_sign = format!(
        "{}\n{}\n{};{};{}",
        method.to_ascii_uppercase(),
        path_and_query,
        date,
        credentials.host(),
        content_hash
    );

    let key = STANDARD
        .decode(credentials.secret.as_bytes())
        .map_err(|_| SigningError::InvalidSecret)?;
    let signature = hmac_sha256_base64(&key, string_to_sign.as_bytes())
        .map_err(|_| SigningError::InvalidSecret)?;

    Ok(SignedRequest {
        authorization: format!(
            "HMAC-SHA256 Credential={}&SignedHeaders={}&Signature={}",
            credentials.id, SIGNED_HEADERS, signature
        ),
        date,
        content_hash,
    })
}
