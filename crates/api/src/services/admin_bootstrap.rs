//! Admin bootstrap on startup.
//!
//! Promotes existing users listed in `auth.admin_emails`. Users who have not
//! signed in yet are promoted on their first request instead. Safe to run
//! on every start.

use persistence::repositories::UserRepository;
use sqlx::PgPool;
use tracing::info;

use crate::config::AuthConfig;

/// Promote configured admin emails. Returns the number of users changed.
pub async fn bootstrap_admins(pool: &PgPool, config: &AuthConfig) -> Result<u64, sqlx::Error> {
    let emails: Vec<String> = config
        .admin_emails
        .iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect();
    if emails.is_empty() {
        return Ok(0);
    }

    let promoted = UserRepository::new(pool.clone())
        .promote_emails(&emails)
        .await?;
    if promoted > 0 {
        info!(promoted, "Promoted configured admin users");
    }
    Ok(promoted)
}
