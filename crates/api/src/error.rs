use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::services::{FlagStoreError, PermissionError};
use serde::Serialize;
use thiserror::Error;

use crate::services::resource_discovery::DiscoveryError;
use crate::services::token_exchange::TokenExchangeError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation error: {message}")]
    InvalidFields {
        message: String,
        details: Vec<ValidationDetail>,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationDetail>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg, None)
            }
            ApiError::InvalidFields { message, details } => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                message,
                Some(details),
            ),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg,
                None,
            ),
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".into()),
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => ApiError::Conflict("Resource already exists".into()),
                        "23503" => ApiError::NotFound("Referenced resource not found".into()),
                        _ => ApiError::Internal(format!("Database error: {}", db_err)),
                    }
                } else {
                    ApiError::Internal(format!("Database error: {}", db_err))
                }
            }
            _ => ApiError::Internal(format!("Database error: {}", err)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value for {}", field)),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        let message = if details.len() == 1 {
            details[0].message.clone()
        } else {
            format!("{} validation errors", details.len())
        };

        ApiError::InvalidFields { message, details }
    }
}

impl From<PermissionError> for ApiError {
    fn from(err: PermissionError) -> Self {
        match err {
            PermissionError::SelfRoleChange => ApiError::Validation(err.to_string()),
            _ => ApiError::Forbidden(err.to_string()),
        }
    }
}

impl From<FlagStoreError> for ApiError {
    fn from(err: FlagStoreError) -> Self {
        match err {
            FlagStoreError::NotFound(key) => {
                ApiError::NotFound(format!("Feature flag not found in store: {}", key))
            }
            FlagStoreError::Unauthorized => ApiError::Forbidden(err.to_string()),
            FlagStoreError::Remote { status, .. } if status == 401 || status == 403 => {
                ApiError::Forbidden(
                    "Credentials were rejected by the configuration store".to_string(),
                )
            }
            FlagStoreError::Remote { status: 404, .. } => {
                ApiError::NotFound("Feature flag not found in store".to_string())
            }
            FlagStoreError::PreconditionFailed => ApiError::Conflict(
                "Feature flag was changed by someone else. Refresh and try again.".to_string(),
            ),
            FlagStoreError::InvalidConnectionString(msg) => {
                ApiError::Validation(format!("Invalid connection string: {}", msg))
            }
            FlagStoreError::Network(_)
            | FlagStoreError::Remote { .. }
            | FlagStoreError::InvalidFlagValue(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<TokenExchangeError> for ApiError {
    fn from(err: TokenExchangeError) -> Self {
        match err {
            TokenExchangeError::ConsentRequired { .. } | TokenExchangeError::Rejected { .. } => {
                ApiError::Unauthorized(err.to_string())
            }
            TokenExchangeError::NotConfigured => ApiError::ServiceUnavailable(err.to_string()),
            TokenExchangeError::Http(_) | TokenExchangeError::UnexpectedResponse(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<DiscoveryError> for ApiError {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::TokenExchange(inner) => inner.into(),
            DiscoveryError::Remote { status, .. } if status == 401 || status == 403 => {
                ApiError::Forbidden(
                    "Azure Resource Manager denied access for the signed-in user".to_string(),
                )
            }
            DiscoveryError::Remote { .. } | DiscoveryError::Http(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use validator::Validate;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_api_error_statuses() {
        let cases = [
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::Conflict("x".into()), StatusCode::CONFLICT),
            (ApiError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                ApiError::ServiceUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let response = ApiError::Internal("database password leaked".into()).into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::Forbidden("Admin access required to modify toggles".into())
            .into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"], "forbidden");
        assert_eq!(body["message"], "Admin access required to modify toggles");
        assert!(body.get("details").is_none());
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(
            format!("{}", ApiError::Unauthorized("test".to_string())),
            "Unauthorized: test"
        );
        assert_eq!(
            format!("{}", ApiError::NotFound("test".to_string())),
            "Not found: test"
        );
        assert_eq!(
            format!("{}", ApiError::ServiceUnavailable("test".to_string())),
            "Service unavailable: test"
        );
    }

    #[test]
    fn test_from_sqlx_row_not_found() {
        let error: ApiError = sqlx::Error::RowNotFound.into();
        match error {
            ApiError::NotFound(msg) => assert_eq!(msg, "Resource not found"),
            _ => panic!("Expected NotFound error"),
        }
    }

    #[tokio::test]
    async fn test_from_validation_errors_lists_fields() {
        let request = domain::models::CreateResourceRequest {
            display_name: String::new(),
            environment_type: domain::models::EnvironmentType::Production,
            resource_name: "store".into(),
            resource_group: "rg".into(),
            connection_string: "Endpoint=https://x.azconfig.io;Id=a;Secret=b".into(),
            subscription_id: None,
        };
        let error: ApiError = request.validate().unwrap_err().into();
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["details"][0]["field"], "display_name");
    }

    #[test]
    fn test_from_permission_error() {
        let forbidden: ApiError = PermissionError::ToggleMutation.into();
        assert!(matches!(forbidden, ApiError::Forbidden(ref m) if m == "Admin access required to modify toggles"));

        let self_change: ApiError = PermissionError::SelfRoleChange.into();
        assert!(matches!(self_change, ApiError::Validation(_)));
    }

    #[test]
    fn test_from_flag_store_error() {
        assert!(matches!(
            ApiError::from(FlagStoreError::NotFound("k".into())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(FlagStoreError::PreconditionFailed),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(FlagStoreError::Remote {
                status: 403,
                message: "denied".into()
            }),
            ApiError::Forbidden(_)
        ));
        assert!(matches!(
            ApiError::from(FlagStoreError::Remote {
                status: 503,
                message: "busy".into()
            }),
            ApiError::Internal(_)
        ));
        assert!(matches!(
            ApiError::from(FlagStoreError::Network("timeout".into())),
            ApiError::Internal(_)
        ));
        assert!(matches!(
            ApiError::from(FlagStoreError::InvalidConnectionString("x".into())),
            ApiError::Validation(_)
        ));
    }

    #[test]
    fn test_from_token_exchange_error() {
        let consent: ApiError = TokenExchangeError::ConsentRequired {
            resource: "Azure Resource Manager".into(),
        }
        .into();
        assert!(matches!(
            consent,
            ApiError::Unauthorized(ref m)
                if m == "Additional consent required for Azure Resource Manager. Please sign in again."
        ));

        let unconfigured: ApiError = TokenExchangeError::NotConfigured.into();
        assert!(matches!(unconfigured, ApiError::ServiceUnavailable(_)));
    }
}
