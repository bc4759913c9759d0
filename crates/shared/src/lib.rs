//! Shared utilities for the feature toggle manager.
//!
//! This crate provides common functionality used across all other crates:
//! - App Configuration connection-string parsing and masking
//! - HMAC request signing for the App Configuration data plane
//! - Azure AD access-token validation
//! - Common validation logic

pub mod connection_string;
pub mod crypto;
pub mod hmac_auth;
pub mod jwt;
pub mod validation;
