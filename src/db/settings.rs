use crate::domain::models::{DashboardWidgetSetting, PageAccessRule, UserRole};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

/// Remote rows behind the access-rule and widget caches.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load_page_rules(&self) -> Result<Vec<PageAccessRule>>;
    async fn save_page_rule(&self, page_path: &str, is_enabled: bool, allowed_roles: &[UserRole]) -> Result<PageAccessRule>;
    /// Creates the row only when absent; existing admin edits are kept.
    async fn insert_default_page_rule(&self, page_path: &str, allowed_roles: &[UserRole]) -> Result<()>;

    async fn load_widgets(&self) -> Result<Vec<DashboardWidgetSetting>>;
    async fn save_widget(&self, setting: &DashboardWidgetSetting) -> Result<DashboardWidgetSetting>;
    async fn insert_default_widget(&self, widget_key: &str, title: &str, allowed_roles: &[UserRole], order_number: i32) -> Result<()>;
}

#[derive(Clone)]
pub struct PgSettingsStore {
    pool: PgPool,
}

impl PgSettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn load_page_rules(&self) -> Result<Vec<PageAccessRule>> {
        let rules = sqlx::query_as::<_, PageAccessRule>(
            r#"
            SELECT page_path, is_enabled, allowed_roles, updated_at
            FROM page_access_rules
            ORDER BY page_path ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rules)
    }

    async fn save_page_rule(&self, page_path: &str, is_enabled: bool, allowed_roles: &[UserRole]) -> Result<PageAccessRule> {
        let rule = sqlx::query_as::<_, PageAccessRule>(
            r#"
            INSERT INTO page_access_rules (page_path, is_enabled, allowed_roles)
            VALUES ($1, $2, $3)
            ON CONFLICT (page_path) DO UPDATE
            SET is_enabled = EXCLUDED.is_enabled,
                allowed_roles = EXCLUDED.allowed_roles,
                updated_at = now()
            RETURNING page_path, is_enabled, allowed_roles, updated_at
            "#,
        )
        .bind(page_path)
        .bind(is_enabled)
        .bind(allowed_roles)
        .fetch_one(&self.pool)
        .await?;
        Ok(rule)
    }

    async fn insert_default_page_rule(&self, page_path: &str, allowed_roles: &[UserRole]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO page_access_rules (page_path, is_enabled, allowed_roles)
            VALUES ($1, true, $2)
            ON CONFLICT (page_path) DO NOTHING
            "#,
        )
        .bind(page_path)
        .bind(allowed_roles)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_widgets(&self) -> Result<Vec<DashboardWidgetSetting>> {
        let widgets = sqlx::query_as::<_, DashboardWidgetSetting>(
            r#"
            SELECT widget_key, title, allowed_roles, is_visible, order_number, updated_at
            FROM dashboard_widget_settings
            ORDER BY order_number ASC, widget_key ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(widgets)
    }

    async fn save_widget(&self, setting: &DashboardWidgetSetting) -> Result<DashboardWidgetSetting> {
        let saved = sqlx::query_as::<_, DashboardWidgetSetting>(
            r#"
            INSERT INTO dashboard_widget_settings (widget_key, title, allowed_roles, is_visible, order_number)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (widget_key) DO UPDATE
            SET title = EXCLUDED.title,
                allowed_roles = EXCLUDED.allowed_roles,
                is_visible = EXCLUDED.is_visible,
                order_number = EXCLUDED.order_number,
                updated_at = now()
            RETURNING widget_key, title, allowed_roles, is_visible, order_number, updated_at
            "#,
        )
        .bind(&setting.widget_key)
        .bind(&setting.title)
        .bind(&setting.allowed_roles)
        .bind(setting.is_visible)
        .bind(setting.order_number)
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }

    async fn insert_default_widget(&self, widget_key: &str, title: &str, allowed_roles: &[UserRole], order_number: i32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dashboard_widget_settings (widget_key, title, allowed_roles, is_visible, order_number)
            VALUES ($1, $2, $3, true, $4)
            ON CONFLICT (widget_key) DO NOTHING
            "#,
        )
        .bind(widget_key)
        .bind(title)
        .bind(allowed_roles)
        .bind(order_number)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
