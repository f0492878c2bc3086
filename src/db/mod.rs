pub mod seed;
pub mod settings;
pub mod training;

#[cfg(test)]
pub mod memory;

use crate::domain::models::UserRole;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub email: String,
    pub hash: String,
    pub role: UserRole,
    pub enc_full_name: String,
    pub enc_phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewUser<'a> {
    pub id: Uuid,
    pub email: &'a str,
    pub hash: &'a str,
    pub role: UserRole,
    pub enc_full_name: &'a str,
    pub enc_phone: Option<&'a str>,
}

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(
        r#"
        SELECT id, email, hash, role, enc_full_name, enc_phone, is_active, created_at, updated_at
        FROM users
        WHERE email = $1
          AND is_active = true
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(
        r#"
        SELECT id, email, hash, role, enc_full_name, enc_phone, is_active, created_at, updated_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn get_all_users(pool: &PgPool) -> Result<Vec<DbUser>> {
    let users = sqlx::query_as::<_, DbUser>(
        r#"
        SELECT id, email, hash, role, enc_full_name, enc_phone, is_active, created_at, updated_at
        FROM users
        ORDER BY created_at ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(users)
}

/// Inserts a user; returns `false` when the email is already taken.
pub async fn insert_user(pool: &PgPool, user: NewUser<'_>) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (id, email, hash, role, enc_full_name, enc_phone)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(user.id)
    .bind(user.email)
    .bind(user.hash)
    .bind(user.role)
    .bind(user.enc_full_name)
    .bind(user.enc_phone)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn update_profile(
    pool: &PgPool,
    user_id: Uuid,
    enc_full_name: &str,
    enc_phone: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET enc_full_name = $2, enc_phone = $3, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(enc_full_name)
    .bind(enc_phone)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns `false` when no user has that id.
pub async fn update_user_role(pool: &PgPool, user_id: Uuid, role: UserRole) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET role = $2, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(role)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}
