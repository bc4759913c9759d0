use serde::Deserialize;
use shared::jwt::TokenRules;
use std::net::{AddrParseError, SocketAddr};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    pub azure_ad: AzureAdConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub app_configuration: AppConfigurationConfig,
    #[serde(default)]
    pub azure_management: AzureManagementConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn pool_config(&self) -> persistence::db::DatabaseConfig {
        persistence::db::DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            connect_timeout_secs: self.connect_timeout_secs,
            idle_timeout_secs: self.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    /// Allowed browser origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Azure AD application registration used to validate tokens and to
/// perform the On-Behalf-Of exchange.
#[derive(Clone, Deserialize)]
pub struct AzureAdConfig {
    #[serde(default = "default_azure_ad_instance")]
    pub instance: String,

    #[serde(default)]
    pub tenant_id: String,

    #[serde(default)]
    pub client_id: String,

    /// Needed only for subscription listing and discovery.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Extra accepted audiences on top of the client id and `api://<client id>`.
    #[serde(default)]
    pub audiences: Vec<String>,

    /// Extra accepted issuers on top of the tenant's v1 and v2 issuers.
    #[serde(default)]
    pub issuers: Vec<String>,

    /// Overrides the tenant's discovery keys endpoint.
    #[serde(default)]
    pub jwks_url: Option<String>,

    /// Static RSA public key. When set, the JWKS endpoint is never called.
    #[serde(default)]
    pub public_key_pem: Option<String>,

    #[serde(default = "default_jwt_leeway")]
    pub leeway_secs: u64,
}

impl std::fmt::Debug for AzureAdConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureAdConfig")
            .field("instance", &self.instance)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("jwks_url", &self.jwks_url)
            .field("leeway_secs", &self.leeway_secs)
            .finish_non_exhaustive()
    }
}

impl AzureAdConfig {
    /// `https://login.microsoftonline.com/<tenant>`
    pub fn authority(&self) -> String {
        format!("{}/{}", self.instance.trim_end_matches('/'), self.tenant_id)
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.authority())
    }

    pub fn jwks_endpoint(&self) -> String {
        self.jwks_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| format!("{}/discovery/v2.0/keys", self.authority()))
    }

    /// The configured client secret, if it is non-empty.
    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret
            .as_deref()
            .map(str::trim)
            .filter(|secret| !secret.is_empty())
    }

    pub fn token_rules(&self) -> TokenRules {
        let mut rules = TokenRules::for_tenant(&self.tenant_id, &self.client_id, self.leeway_secs);
        rules.audiences.extend(self.audiences.iter().cloned());
        rules.issuers.extend(self.issuers.iter().cloned());
        rules
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Users with these emails become admins on sign-in and at startup.
    #[serde(default)]
    pub admin_emails: Vec<String>,

    /// When false any signed-in user may create, update and delete resources.
    #[serde(default = "default_true")]
    pub admin_only_resource_management: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_emails: Vec::new(),
            admin_only_resource_management: true,
        }
    }
}

impl AuthConfig {
    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim();
        self.admin_emails
            .iter()
            .any(|admin| admin.trim().eq_ignore_ascii_case(email))
    }
}

/// App Configuration data-plane settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfigurationConfig {
    #[serde(default = "default_app_configuration_api_version")]
    pub api_version: String,

    #[serde(default = "default_outbound_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for AppConfigurationConfig {
    fn default() -> Self {
        Self {
            api_version: default_app_configuration_api_version(),
            timeout_ms: default_outbound_timeout_ms(),
        }
    }
}

/// Azure Resource Manager settings used by discovery.
#[derive(Debug, Clone, Deserialize)]
pub struct AzureManagementConfig {
    #[serde(default = "default_management_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_subscriptions_api_version")]
    pub subscriptions_api_version: String,

    #[serde(default = "default_stores_api_version")]
    pub stores_api_version: String,

    #[serde(default = "default_outbound_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for AzureManagementConfig {
    fn default() -> Self {
        Self {
            endpoint: default_management_endpoint(),
            subscriptions_api_version: default_subscriptions_api_version(),
            stores_api_version: default_stores_api_version(),
            timeout_ms: default_outbound_timeout_ms(),
        }
    }
}

impl AzureManagementConfig {
    /// OBO scope for the management endpoint.
    pub fn scope(&self) -> String {
        format!("{}/user_impersonation", self.endpoint.trim_end_matches('/'))
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    10
}
fn default_min_connections() -> u32 {
    1
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_azure_ad_instance() -> String {
    "https://login.microsoftonline.com".to_string()
}
fn default_jwt_leeway() -> u64 {
    60
}
fn default_true() -> bool {
    true
}
fn default_app_configuration_api_version() -> String {
    "1.0".to_string()
}
fn default_outbound_timeout_ms() -> u64 {
    15_000
}
fn default_management_endpoint() -> String {
    "https://management.azure.com".to_string()
}
fn default_subscriptions_api_version() -> String {
    "2022-12-01".to_string()
}
fn default_stores_api_version() -> String {
    "2023-03-01".to_string()
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with FTM__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("FTM")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("security.cors_origins")
                    .with_list_parse_key("auth.admin_emails")
                    .with_list_parse_key("azure_ad.audiences")
                    .with_list_parse_key("azure_ad.issuers"),
            )
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Defaults are embedded so tests do not depend on the config directory.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30

            [database]
            url = ""
            max_connections = 10
            min_connections = 1
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [security]
            cors_origins = []

            [azure_ad]
            instance = "https://login.microsoftonline.com"
            tenant_id = "11111111-2222-3333-4444-555555555555"
            client_id = "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee"
            leeway_secs = 60

            [auth]
            admin_emails = []
            admin_only_resource_management = true
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        // Skip validation in tests to allow partial configs
        Ok(cfg)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "FTM__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.azure_ad.tenant_id.trim().is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "FTM__AZURE_AD__TENANT_ID environment variable must be set".to_string(),
            ));
        }

        if self.azure_ad.client_id.trim().is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "FTM__AZURE_AD__CLIENT_ID environment variable must be set".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}
