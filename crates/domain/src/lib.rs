//! Domain layer for the feature toggle manager.
//!
//! This crate contains:
//! - Domain models (users, App Configuration resources, toggles, audit entries)
//! - Permission rules and the audit entry builder
//! - The `FeatureFlagStore` abstraction over App Configuration

pub mod models;
pub mod services;
