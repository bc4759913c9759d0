//! HTTP route handlers.

pub mod audit_logs;
pub mod azure;
pub mod health;
pub mod public_config;
pub mod resources;
pub mod toggles;
pub mod users;
