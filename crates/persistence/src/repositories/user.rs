//! User repository for database operations.

use domain::models::{SignInIdentity, User, UserRole};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::UserEntity;
use crate::metrics::QueryTimer;

const USER_COLUMNS: &str =
    "id, external_id, name, email, role, created_at, updated_at, last_seen_at";

/// Repository for user-related database operations.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Creates a new UserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Resolves a signed-in identity to a local user, creating it on first
    /// sight.
    ///
    /// Users are matched by email, case-insensitively. `grant_admin` makes a
    /// new user an admin and promotes an existing one; it never demotes.
    pub async fn find_or_create_from_sign_in(
        &self,
        identity: &SignInIdentity,
        grant_admin: bool,
    ) -> Result<User, sqlx::Error> {
        let timer = QueryTimer::new("find_or_create_user_from_sign_in");
        let role = if grant_admin {
            UserRole::Admin
        } else {
            UserRole::ReadOnly
        };
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            INSERT INTO users (external_id, name, email, role, last_seen_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT ((LOWER(email))) DO UPDATE SET
                external_id = COALESCE(EXCLUDED.external_id, users.external_id),
                name = CASE WHEN EXCLUDED.name <> '' THEN EXCLUDED.name ELSE users.name END,
                role = CASE WHEN EXCLUDED.role = 'admin' THEN 'admin' ELSE users.role END,
                last_seen_at = NOW()
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&identity.external_id)
        .bind(&identity.name)
        .bind(&identity.email)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await;
        timer.finish(&result);
        result.map(Into::into)
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_id");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        result.map(|user| user.map(Into::into))
    }

    /// List all users, ordered by name then email.
    pub async fn list(&self) -> Result<Vec<User>, sqlx::Error> {
        let timer = QueryTimer::new("list_users");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {} FROM users ORDER BY LOWER(name), LOWER(email)",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await;
        timer.finish(&result);
        result.map(|users| users.into_iter().map(Into::into).collect())
    }

    /// Set a user's role. Returns `None` if the user does not exist.
    pub async fn update_role(&self, id: Uuid, role: UserRole) -> Result<Option<User>, sqlx::Error> {
        let timer = QueryTimer::new("update_user_role");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "UPDATE users SET role = $2 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        result.map(|user| user.map(Into::into))
    }

    /// Promote every existing user whose email is in `emails` to admin.
    /// Returns the number of users changed.
    pub async fn promote_emails(&self, emails: &[String]) -> Result<u64, sqlx::Error> {
        let lowered: Vec<String> = emails.iter().map(|e| e.trim().to_lowercase()).collect();
        if lowered.is_empty() {
            return Ok(0);
        }

        let timer = QueryTimer::new("promote_admin_emails");
        let result = sqlx::query(
            r#"
            UPDATE users SET role = 'admin'
            WHERE LOWER(email) = ANY($1) AND role <> 'admin'
            "#,
        )
        .bind(&lowered)
        .execute(&self.pool)
        .await;
        timer.finish(&result);
        result.map(|r| r.rows_affected())
    }
}
