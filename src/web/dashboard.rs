use crate::db;
use crate::domain::models::{DashboardWidgetSetting, UserRole};
use crate::state::SharedState;
use crate::web::session::CurrentUser;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize)]
pub struct DashboardMe {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

#[derive(Serialize)]
pub struct WidgetView {
    pub key: String,
    pub title: String,
    pub order: i32,
}

impl From<DashboardWidgetSetting> for WidgetView {
    fn from(setting: DashboardWidgetSetting) -> Self {
        Self {
            key: setting.widget_key,
            title: setting.title,
            order: setting.order_number,
        }
    }
}

#[derive(Serialize)]
pub struct WidgetVisibility {
    pub key: String,
    pub visible: bool,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/me", get(get_current_user))
        .route("/widgets", get(visible_widgets))
        .route("/widgets/:key", get(widget_visibility))
        .with_state(state)
}

async fn get_current_user(
    current: CurrentUser,
    State(state): State<SharedState>,
) -> Result<Json<DashboardMe>, StatusCode> {
    let user = db::find_user_by_id(&state.pool, current.user_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load user {}: {}", current.user_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let name = state
        .cipher
        .open_lossy(user.id, Some(user.enc_full_name.as_str()))
        .unwrap_or_else(|| "User".to_string());

    Ok(Json(DashboardMe {
        user_id: user.id,
        name,
        email: user.email,
        role: user.role,
    }))
}

async fn visible_widgets(current: CurrentUser, State(state): State<SharedState>) -> Json<Vec<WidgetView>> {
    let widgets = state.widgets.visible_for(current.role).await;
    Json(widgets.into_iter().map(WidgetView::from).collect())
}

async fn widget_visibility(
    current: CurrentUser,
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Json<WidgetVisibility> {
    let visible = state.widgets.is_visible(&key, current.role).await;
    Json(WidgetVisibility { key, visible })
}
