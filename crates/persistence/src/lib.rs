//! Persistence layer for the feature toggle manager.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations
//! - Query and pool metrics

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
