use crate::crypto::FieldCipher;
use crate::db::{self, settings::SettingsStore, NewUser};
use crate::domain::access::DEFAULT_PAGE_ROLES;
use crate::domain::models::UserRole;
use crate::domain::widgets::DEFAULT_WIDGETS;
use anyhow::Result;
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use sqlx::PgPool;
use uuid::Uuid;

/// Creates any missing default access rules and widget rows. Rows an admin
/// already edited are left alone.
pub async fn seed_defaults(store: &dyn SettingsStore) -> Result<()> {
    for (page_path, roles) in DEFAULT_PAGE_ROLES.iter() {
        store.insert_default_page_rule(page_path, roles).await?;
    }
    for (order, (key, title, roles)) in DEFAULT_WIDGETS.iter().enumerate() {
        store
            .insert_default_widget(key, title, roles, (order as i32 + 1) * 10)
            .await?;
    }
    tracing::info!(
        "Default settings ensured: {} page rules, {} widgets",
        DEFAULT_PAGE_ROLES.len(),
        DEFAULT_WIDGETS.len()
    );
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(rand_core::OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();
    Ok(hash)
}

/// Creates the first admin account when configured and not yet present.
pub async fn seed_admin(pool: &PgPool, cipher: &FieldCipher, email: &str, password: &str) -> Result<()> {
    let email = email.trim().to_lowercase();
    let id = Uuid::new_v4();
    let hash = hash_password(password)?;
    let enc_full_name = cipher.seal(id, "Administrator")?;

    let created = db::insert_user(
        pool,
        NewUser {
            id,
            email: &email,
            hash: &hash,
            role: UserRole::Admin,
            enc_full_name: &enc_full_name,
            enc_phone: None,
        },
    )
    .await?;

    if created {
        tracing::info!("Bootstrap admin {} created", email);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use argon2::{password_hash::PasswordHash, PasswordVerifier};

    #[tokio::test]
    async fn seeding_is_idempotent_and_keeps_edits() {
        let store = MemoryStore::default();
        seed_defaults(&store).await.unwrap();
        let first = store.page_rules.lock().await.len();
        assert_eq!(first, DEFAULT_PAGE_ROLES.len());
        assert_eq!(store.widgets.lock().await.len(), DEFAULT_WIDGETS.len());

        store.save_page_rule("/jobs", false, &[]).await.unwrap();
        seed_defaults(&store).await.unwrap();

        let rules = store.page_rules.lock().await;
        assert_eq!(rules.len(), first);
        assert!(!rules["/jobs"].is_enabled);
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default()
            .verify_password(b"correct horse", &parsed)
            .is_ok());
        assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
    }
}
