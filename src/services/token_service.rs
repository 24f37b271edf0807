//! Opaque single-purpose tokens mailed to users.
//!
//! Confirmation tokens are get-or-create per user and never expire; redeeming
//! one activates the account and leaves the token in place, so a second
//! redemption is a no-op success. Password-reset tokens expire after the
//! configured TTL and are deleted when used.

use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::{AppError, AppResult},
    models::User,
};

const KEY_BYTES: usize = 32;

#[derive(Debug, Clone, FromRow)]
pub struct ConfirmToken {
    pub user_id: Uuid,
    pub key: String,
    pub created_at: DateTime<Utc>,
}

/// 256 bits from the thread-local CSPRNG, hex encoded.
pub fn generate_key() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

pub async fn issue(pool: &DbPool, user_id: Uuid) -> AppResult<ConfirmToken> {
    sqlx::query(
        r#"
        INSERT INTO confirm_email_tokens (user_id, key)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(generate_key())
    .execute(pool)
    .await?;

    let token: Option<ConfirmToken> = sqlx::query_as(
        "SELECT user_id, key, created_at FROM confirm_email_tokens WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    token.ok_or(AppError::NotFound)
}

pub async fn redeem(pool: &DbPool, key: &str) -> AppResult<User> {
    let user: Option<User> = sqlx::query_as(
        r#"
        UPDATE users SET is_active = TRUE
        FROM confirm_email_tokens t
        WHERE t.key = $1 AND users.id = t.user_id
        RETURNING users.*
        "#,
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    user.ok_or(AppError::NotFound)
}

pub async fn issue_password_reset(pool: &DbPool, user_id: Uuid) -> AppResult<String> {
    let key = generate_key();
    sqlx::query("INSERT INTO password_reset_tokens (user_id, key) VALUES ($1, $2)")
        .bind(user_id)
        .bind(&key)
        .execute(pool)
        .await?;
    Ok(key)
}

/// Consume a reset key issued after `not_before`, dropping every other reset
/// key of the same user.
pub async fn consume_password_reset(
    conn: &mut PgConnection,
    key: &str,
    not_before: DateTime<Utc>,
) -> AppResult<Uuid> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        "DELETE FROM password_reset_tokens WHERE key = $1 AND created_at > $2 RETURNING user_id",
    )
    .bind(key)
    .bind(not_before)
    .fetch_optional(&mut *conn)
    .await?;

    let (user_id,) = row.ok_or(AppError::NotFound)?;

    sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    Ok(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_are_long_hex_strings() {
        let key = generate_key();
        assert_eq!(key.len(), KEY_BYTES * 2);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn keys_do_not_repeat() {
        let keys: HashSet<String> = (0..1000).map(|_| generate_key()).collect();
        assert_eq!(keys.len(), 1000);
    }
}
