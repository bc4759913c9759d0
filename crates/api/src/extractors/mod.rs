//! Custom extractors.

pub mod current_user;
pub mod query;

pub use query::ApiQuery;
