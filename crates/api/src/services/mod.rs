//! External service integrations and request workflows.

pub mod admin_bootstrap;
pub mod app_configuration;
pub mod jwks;
pub mod resource_discovery;
pub mod token_exchange;
pub mod toggles;

pub use app_configuration::AppConfigurationClient;
pub use jwks::{TokenValidator, TokenValidatorError};
pub use resource_discovery::ResourceDiscoveryClient;
pub use token_exchange::OnBehalfOfClient;
pub use toggles::ToggleService;
