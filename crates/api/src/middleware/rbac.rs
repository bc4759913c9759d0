//! Role gate for admin-only routes.
//!
//! Runs after [`require_user`](super::user_auth::require_user).

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use domain::services::authorize_user_management;

use crate::middleware::user_auth::{error_response, unauthorized_response, CurrentUser};

pub async fn require_admin(req: Request<Body>, next: Next) -> Response {
    let Some(current) = req.extensions().get::<CurrentUser>() else {
        return unauthorized_response("Authentication required");
    };

    if let Err(e) = authorize_user_management(current.user.role) {
        tracing::debug!(user_id = %current.user.id, "Admin route refused");
        return error_response(StatusCode::FORBIDDEN, "forbidden", &e.to_string());
    }

    next.run(req).await
}
