use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use domain::services::FeatureFlagStore;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, require_admin, require_user,
    security_headers_middleware, trace_id,
};
use crate::routes::{audit_logs, azure, health, public_config, resources, toggles, users};
use crate::services::jwks::TokenValidatorError;
use crate::services::token_exchange::TokenExchangeError;
use crate::services::{
    AppConfigurationClient, OnBehalfOfClient, ResourceDiscoveryClient, TokenValidator,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub flag_store: Arc<dyn FeatureFlagStore>,
    pub token_validator: Arc<TokenValidator>,
    /// `None` when no client secret is configured.
    pub obo: Option<Arc<OnBehalfOfClient>>,
    pub discovery: ResourceDiscoveryClient,
}

/// Failure to build the outbound clients at startup.
#[derive(Debug, thiserror::Error)]
pub enum AppInitError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    TokenValidator(#[from] TokenValidatorError),

    #[error(transparent)]
    TokenExchange(#[from] TokenExchangeError),
}

impl AppState {
    /// State wired to the real Azure endpoints.
    pub fn from_config(config: Config, pool: PgPool) -> Result<Self, AppInitError> {
        let flag_store = Arc::new(AppConfigurationClient::new(&config.app_configuration)?);
        let token_validator = Arc::new(TokenValidator::from_config(&config.azure_ad)?);
        Self::with_services(config, pool, flag_store, token_validator)
    }

    /// State with a caller-supplied flag store and token validator; the
    /// Azure Resource Manager clients still follow the configuration.
    pub fn with_services(
        config: Config,
        pool: PgPool,
        flag_store: Arc<dyn FeatureFlagStore>,
        token_validator: Arc<TokenValidator>,
    ) -> Result<Self, AppInitError> {
        let obo = OnBehalfOfClient::from_config(&config.azure_ad, &config.azure_management)?
            .map(Arc::new);
        let discovery = ResourceDiscoveryClient::new(&config.azure_management)?;
        Ok(Self {
            pool,
            config: Arc::new(config),
            flag_store,
            token_validator,
            obo,
            discovery,
        })
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Signed-in users
    let protected_routes = Router::new()
        .route("/api/v1/me", get(users::me))
        .route(
            "/api/v1/resources",
            get(resources::list_resources).post(resources::create_resource),
        )
        .route(
            "/api/v1/resources/test-connection",
            post(resources::test_connection),
        )
        .route(
            "/api/v1/resources/:resource_id",
            get(resources::get_resource)
                .put(resources::update_resource)
                .delete(resources::delete_resource),
        )
        .route(
            "/api/v1/resources/:resource_id/toggles",
            get(toggles::list_toggles),
        )
        .route(
            "/api/v1/resources/:resource_id/toggles/:toggle_id",
            put(toggles::update_toggle),
        )
        .route(
            "/api/v1/azure/subscriptions",
            get(azure::list_subscriptions),
        )
        .route("/api/v1/azure/discover", get(azure::discover_resources))
        .route("/api/v1/audit-logs", get(audit_logs::list_audit_logs))
        .route(
            "/api/v1/audit-logs/export",
            post(audit_logs::export_audit_logs),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user));

    // Admins only (role gate runs after authentication)
    let admin_routes = Router::new()
        .route("/api/v1/users", get(users::list_users))
        .route("/api/v1/users/:user_id/role", put(users::update_user_role))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user));

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::readiness))
        .route("/api/health/live", get(health::liveness))
        .route("/api/config", get(public_config::public_config))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors_layer(&config))
        .with_state(state)
}
