use crate::domain::models::{DashboardWidgetSetting, UserRole};
use serde::Deserialize;
use std::collections::HashMap;

/// Widgets created on first start when the settings table has no row for them.
pub const DEFAULT_WIDGETS: &[(&str, &str, &[UserRole])] = &[
    ("my_applications", "My applications", &[UserRole::Candidate]),
    ("recommended_jobs", "Recommended jobs", &[UserRole::Candidate]),
    ("training_progress", "Training progress", &[UserRole::Salesperson, UserRole::Manager]),
    ("visit_summary", "Field visits", &[UserRole::Salesperson, UserRole::Manager]),
    ("open_positions", "Open positions", &[UserRole::Manager]),
    ("application_pipeline", "Application pipeline", &[UserRole::Manager]),
    ("team_overview", "Team overview", &[UserRole::Manager]),
    ("system_overview", "System overview", &[UserRole::Admin]),
];

/// Closed by default: an unknown key is hidden from every role.
pub fn is_visible(settings: &HashMap<String, DashboardWidgetSetting>, widget_key: &str, role: UserRole) -> bool {
    let Some(setting) = settings.get(widget_key) else {
        return false;
    };
    match role {
        UserRole::Admin => true,
        UserRole::Candidate | UserRole::Salesperson | UserRole::Manager => {
            setting.is_visible && setting.allowed_roles.contains(&role)
        }
    }
}

pub fn visible_widgets(settings: &HashMap<String, DashboardWidgetSetting>, role: UserRole) -> Vec<DashboardWidgetSetting> {
    let mut out: Vec<DashboardWidgetSetting> = settings
        .values()
        .filter(|setting| is_visible(settings, &setting.widget_key, role))
        .cloned()
        .collect();
    out.sort_by(|a, b| {
        a.order_number
            .cmp(&b.order_number)
            .then_with(|| a.widget_key.cmp(&b.widget_key))
    });
    out
}

/// Partial admin edit; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WidgetSettingPatch {
    pub title: Option<String>,
    pub allowed_roles: Option<Vec<UserRole>>,
    pub is_visible: Option<bool>,
    pub order_number: Option<i32>,
}

impl WidgetSettingPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.allowed_roles.is_none()
            && self.is_visible.is_none()
            && self.order_number.is_none()
    }

    pub fn apply(&self, setting: &mut DashboardWidgetSetting) {
        if let Some(title) = &self.title {
            setting.title = title.trim().to_string();
        }
        if let Some(roles) = &self.allowed_roles {
            let mut roles = roles.clone();
            roles.sort();
            roles.dedup();
            setting.allowed_roles = roles;
        }
        if let Some(visible) = self.is_visible {
            setting.is_visible = visible;
        }
        if let Some(order) = self.order_number {
            setting.order_number = order;
        }
    }
}
