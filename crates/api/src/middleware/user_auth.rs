//! Bearer-token authentication.
//!
//! Validates the Azure AD access token, resolves the caller to a local user
//! (creating it on first sign-in) and stores [`CurrentUser`] in the request
//! extensions for handlers.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use domain::models::{SignInIdentity, User};
use persistence::repositories::UserRepository;
use serde_json::json;
use shared::jwt::AzureAdClaims;

use crate::app::AppState;
use crate::services::TokenValidatorError;

/// The signed-in caller.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    /// Raw bearer token, kept for On-Behalf-Of exchanges.
    pub access_token: String,
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Identity used to find or create the local user. `None` when the token
/// carries no email-like claim.
pub fn identity_from_claims(claims: &AzureAdClaims) -> Option<SignInIdentity> {
    let email = claims.email()?.trim().to_string();
    Some(SignInIdentity {
        external_id: claims.external_id().to_string(),
        name: claims.display_name().unwrap_or(&email).to_string(),
        email,
    })
}

pub async fn require_user(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&req).map(str::to_string) else {
        return unauthorized_response("Missing or invalid Authorization header");
    };

    let claims = match state.token_validator.validate(&token).await {
        Ok(claims) => claims,
        Err(TokenValidatorError::Jwt(e)) => {
            tracing::debug!("Token validation failed: {}", e);
            return unauthorized_response("Invalid or expired token");
        }
        Err(e @ TokenValidatorError::KeyFetch(_)) => {
            tracing::error!("Token validation unavailable: {}", e);
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                "Authentication service unavailable",
            );
        }
    };

    let Some(identity) = identity_from_claims(&claims) else {
        return unauthorized_response("Token does not identify a user");
    };

    let grant_admin = state.config.auth.is_admin_email(&identity.email);
    let user = match UserRepository::new(state.pool.clone())
        .find_or_create_from_sign_in(&identity, grant_admin)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("Failed to resolve signed-in user: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred",
            );
        }
    };

    tracing::Span::current().record("user_id", tracing::field::display(user.id));
    req.extensions_mut().insert(CurrentUser {
        user,
        access_token: token,
    });
    next.run(req).await
}

pub(crate) fn unauthorized_response(message: &str) -> Response {
    error_response(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

pub(crate) fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(json!({ "error": code, "message": message }))).into_response()
}
