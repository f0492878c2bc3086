use crate::db::settings::SettingsStore;
use crate::domain::access::{self, AccessDecision, Viewer};
use crate::domain::models::{PageAccessRule, UserRole};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("not found")]
    NotFound,
    #[error("invalid input: {0}")]
    Invalid(&'static str),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// In-memory copy of `page_access_rules`, loaded at startup and reloaded on
/// demand. Until the first successful load the compiled-in defaults decide.
#[derive(Clone)]
pub struct AccessRulesService {
    store: Arc<dyn SettingsStore>,
    rules: Arc<RwLock<HashMap<String, PageAccessRule>>>,
}

impl AccessRulesService {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            rules: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn refresh(&self) -> anyhow::Result<usize> {
        let loaded = self.store.load_page_rules().await?;
        let fresh: HashMap<String, PageAccessRule> = loaded
            .into_iter()
            .map(|rule| (access::normalize_path(&rule.page_path), rule))
            .collect();
        let count = fresh.len();
        *self.rules.write().await = fresh;
        tracing::debug!("Access rules refreshed: {} rules", count);
        Ok(count)
    }

    pub async fn decide(&self, path: &str, viewer: Viewer) -> AccessDecision {
        let rules = self.rules.read().await;
        access::decide(path, viewer, &rules)
    }

    pub async fn list(&self) -> Vec<PageAccessRule> {
        let mut rules: Vec<PageAccessRule> = self.rules.read().await.values().cloned().collect();
        rules.sort_by(|a, b| a.page_path.cmp(&b.page_path));
        rules
    }

    /// Persists one rule and patches the cached copy in place.
    pub async fn update(
        &self,
        page_path: &str,
        is_enabled: bool,
        allowed_roles: Vec<UserRole>,
    ) -> Result<PageAccessRule, SettingsError> {
        let path = access::normalize_path(page_path);
        if path == "/" || access::is_public(&path) {
            return Err(SettingsError::Invalid("public pages cannot be restricted"));
        }
        if access::is_universal(&path) {
            return Err(SettingsError::Invalid("pages open to every signed-in user cannot be restricted"));
        }
        let mut roles = allowed_roles;
        roles.sort();
        roles.dedup();

        let saved = self.store.save_page_rule(&path, is_enabled, &roles).await?;
        self.rules.write().await.insert(path.clone(), saved.clone());
        tracing::info!(
            "Page access rule updated: path={}, enabled={}, roles={:?}",
            path,
            is_enabled,
            roles
        );
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::seed;
    use crate::domain::access::DenyReason;
    use std::sync::atomic::Ordering;

    async fn service() -> (Arc<MemoryStore>, AccessRulesService) {
        let store = Arc::new(MemoryStore::default());
        seed::seed_defaults(store.as_ref()).await.unwrap();
        let service = AccessRulesService::new(store.clone());
        (store, service)
    }

    #[tokio::test]
    async fn defaults_decide_before_first_load() {
        let (_, service) = service().await;
        let manager = Viewer::Authenticated(UserRole::Manager);
        assert!(service.decide("/jobs", manager).await.is_allowed());
        assert!(service.list().await.is_empty());
    }

    #[tokio::test]
    async fn update_disables_page_without_refetch() {
        let (store, service) = service().await;
        service.refresh().await.unwrap();
        let loads = store.load_calls.load(Ordering::SeqCst);

        service
            .update("/jobs/", false, vec![UserRole::Manager])
            .await
            .unwrap();

        assert_eq!(
            service.decide("/jobs", Viewer::Authenticated(UserRole::Manager)).await,
            AccessDecision::Deny {
                reason: DenyReason::PageDisabled
            }
        );
        assert!(service.decide("/jobs", Viewer::Authenticated(UserRole::Admin)).await.is_allowed());
        assert_eq!(store.load_calls.load(Ordering::SeqCst), loads);
        assert!(!store.page_rules.lock().await["/jobs"].is_enabled);
    }

    #[tokio::test]
    async fn rejects_rules_for_pages_every_user_keeps() {
        let (store, service) = service().await;
        service.refresh().await.unwrap();
        for path in ["/settings", "/dashboard/", "/profile/security"] {
            assert!(
                matches!(service.update(path, false, vec![]).await, Err(SettingsError::Invalid(_))),
                "{path}"
            );
        }
        assert!(!store.page_rules.lock().await.contains_key("/settings"));
        assert!(service
            .decide("/settings", Viewer::Authenticated(UserRole::Candidate))
            .await
            .is_allowed());
    }

    #[tokio::test]
    async fn refresh_picks_up_remote_edits() {
        let (store, service) = service().await;
        service.refresh().await.unwrap();
        store
            .save_page_rule("/training", true, &[UserRole::Manager])
            .await
            .unwrap();

        let sales = Viewer::Authenticated(UserRole::Salesperson);
        assert!(service.decide("/training", sales).await.is_allowed());
        service.refresh().await.unwrap();
        assert!(!service.decide("/training", sales).await.is_allowed());
    }

    #[tokio::test]
    async fn rejects_public_paths_and_keeps_cache_on_store_error() {
        let (store, service) = service().await;
        service.refresh().await.unwrap();
        assert!(matches!(
            service.update("/login", false, vec![]).await,
            Err(SettingsError::Invalid(_))
        ));

        store.fail_writes.store(true, Ordering::SeqCst);
        assert!(matches!(
            service.update("/visits", false, vec![]).await,
            Err(SettingsError::Store(_))
        ));
        assert!(service
            .decide("/visits", Viewer::Authenticated(UserRole::Salesperson))
            .await
            .is_allowed());
    }
}
