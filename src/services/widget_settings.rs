use crate::db::settings::SettingsStore;
use crate::domain::models::{DashboardWidgetSetting, UserRole};
use crate::domain::widgets::{self, WidgetSettingPatch};
use crate::services::access_rules::SettingsError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct WidgetSettingsService {
    store: Arc<dyn SettingsStore>,
    widgets: Arc<RwLock<HashMap<String, DashboardWidgetSetting>>>,
}

impl WidgetSettingsService {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            widgets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn refresh(&self) -> anyhow::Result<usize> {
        let fresh: HashMap<String, DashboardWidgetSetting> = self
            .store
            .load_widgets()
            .await?
            .into_iter()
            .map(|w| (w.widget_key.clone(), w))
            .collect();
        let count = fresh.len();
        *self.widgets.write().await = fresh;
        tracing::debug!("Widget settings refreshed: {} widgets", count);
        Ok(count)
    }

    pub async fn is_visible(&self, widget_key: &str, role: UserRole) -> bool {
        widgets::is_visible(&*self.widgets.read().await, widget_key, role)
    }

    pub async fn visible_for(&self, role: UserRole) -> Vec<DashboardWidgetSetting> {
        widgets::visible_widgets(&*self.widgets.read().await, role)
    }

    pub async fn list(&self) -> Vec<DashboardWidgetSetting> {
        let mut all: Vec<DashboardWidgetSetting> = self.widgets.read().await.values().cloned().collect();
        all.sort_by(|a, b| {
            a.order_number
                .cmp(&b.order_number)
                .then_with(|| a.widget_key.cmp(&b.widget_key))
        });
        all
    }

    /// Applies an admin edit to a known widget, persists it, and replaces
    /// the cached entry with the stored row.
    pub async fn update(&self, widget_key: &str, patch: WidgetSettingPatch) -> Result<DashboardWidgetSetting, SettingsError> {
        if patch.is_empty() {
            return Err(SettingsError::Invalid("nothing to update"));
        }
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(SettingsError::Invalid("title must not be empty"));
        }

        let mut setting = self
            .widgets
            .read()
            .await
            .get(widget_key)
            .cloned()
            .ok_or(SettingsError::NotFound)?;
        patch.apply(&mut setting);

        let saved = self.store.save_widget(&setting).await?;
        self.widgets
            .write()
            .await
            .insert(saved.widget_key.clone(), saved.clone());
        tracing::info!(
            "Widget setting updated: key={}, visible={}, roles={:?}",
            saved.widget_key,
            saved.is_visible,
            saved.allowed_roles
        );
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::seed;
    use std::sync::atomic::Ordering;

    async fn loaded() -> (Arc<MemoryStore>, WidgetSettingsService) {
        let store = Arc::new(MemoryStore::default());
        seed::seed_defaults(store.as_ref()).await.unwrap();
        let service = WidgetSettingsService::new(store.clone());
        service.refresh().await.unwrap();
        (store, service)
    }

    #[tokio::test]
    async fn nothing_visible_before_load() {
        let store = Arc::new(MemoryStore::default());
        seed::seed_defaults(store.as_ref()).await.unwrap();
        let service = WidgetSettingsService::new(store);
        for role in UserRole::ALL {
            assert!(!service.is_visible("team_overview", role).await);
            assert!(service.visible_for(role).await.is_empty());
        }
    }

    #[tokio::test]
    async fn defaults_follow_roles() {
        let (_, service) = loaded().await;
        assert!(service.is_visible("team_overview", UserRole::Manager).await);
        assert!(!service.is_visible("team_overview", UserRole::Candidate).await);
        assert!(service.is_visible("my_applications", UserRole::Candidate).await);
        assert!(!service.is_visible("no_such_widget", UserRole::Admin).await);

        let keys: Vec<String> = service
            .visible_for(UserRole::Salesperson)
            .await
            .into_iter()
            .map(|w| w.widget_key)
            .collect();
        assert_eq!(keys, vec!["training_progress", "visit_summary"]);
    }

    #[tokio::test]
    async fn toggle_updates_cache_and_store_without_refetch() {
        let (store, service) = loaded().await;
        let loads = store.load_calls.load(Ordering::SeqCst);

        let patch = WidgetSettingPatch {
            is_visible: Some(false),
            ..Default::default()
        };
        let saved = service.update("visit_summary", patch).await.unwrap();
        assert!(!saved.is_visible);
        assert!(!service.is_visible("visit_summary", UserRole::Salesperson).await);
        assert!(!store.widgets.lock().await["visit_summary"].is_visible);
        assert_eq!(store.load_calls.load(Ordering::SeqCst), loads);
    }

    #[tokio::test]
    async fn update_rejects_unknown_and_empty() {
        let (_, service) = loaded().await;
        let patch = WidgetSettingPatch {
            order_number: Some(1),
            ..Default::default()
        };
        assert!(matches!(
            service.update("payroll", patch).await,
            Err(SettingsError::NotFound)
        ));
        assert!(matches!(
            service.update("team_overview", WidgetSettingPatch::default()).await,
            Err(SettingsError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn failed_save_leaves_cache_alone() {
        let (store, service) = loaded().await;
        store.fail_writes.store(true, Ordering::SeqCst);
        let patch = WidgetSettingPatch {
            allowed_roles: Some(vec![]),
            ..Default::default()
        };
        assert!(service.update("team_overview", patch).await.is_err());
        assert!(service.is_visible("team_overview", UserRole::Manager).await);
    }
}
