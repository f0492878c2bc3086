use crate::db::{self, training::NewVideo};
use crate::domain::models::{DashboardWidgetSetting, PageAccessRule, QuizQuestion, TrainingQuiz, TrainingVideo, UserRole};
use crate::domain::widgets::WidgetSettingPatch;
use crate::services::access_rules::SettingsError;
use crate::state::SharedState;
use crate::web::session::CurrentUser;
use crate::web::training::training_status;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct PageAccessPayload {
    pub is_enabled: bool,
    pub allowed_roles: Vec<UserRole>,
}

#[derive(Debug, Deserialize)]
pub struct RolePayload {
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct NewVideoPayload {
    pub title: String,
    pub description: Option<String>,
    pub video_url: String,
    pub duration_seconds: i32,
    #[serde(default)]
    pub order_number: i32,
}

#[derive(Debug, Deserialize)]
pub struct QuizPayload {
    pub passing_score: Option<u8>,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Serialize)]
pub struct RefreshSummary {
    pub page_rules: usize,
    pub widgets: usize,
}

#[derive(Debug, Serialize)]
pub struct AdminUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/page-access", get(list_page_access))
        .route("/page-access/*path", put(update_page_access))
        .route("/widgets", get(list_widgets))
        .route("/widgets/:key", put(update_widget))
        .route("/settings/refresh", post(refresh_settings))
        .route("/users", get(list_users))
        .route("/users/:id/role", put(change_role))
        .route("/training/videos", post(create_video))
        .route("/training/videos/:id/quiz", put(save_quiz))
        .with_state(state)
}

fn require_admin(current: &CurrentUser) -> Result<(), StatusCode> {
    match current.role {
        UserRole::Admin => Ok(()),
        UserRole::Candidate | UserRole::Salesperson | UserRole::Manager => {
            tracing::warn!("Non-admin {} attempted an admin action", current.user_id);
            Err(StatusCode::FORBIDDEN)
        }
    }
}

fn settings_status(e: SettingsError) -> StatusCode {
    match e {
        SettingsError::NotFound => StatusCode::NOT_FOUND,
        SettingsError::Invalid(reason) => {
            tracing::debug!("Rejected settings edit: {}", reason);
            StatusCode::BAD_REQUEST
        }
        SettingsError::Store(e) => {
            tracing::error!("Failed to persist settings: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn list_page_access(current: CurrentUser, State(state): State<SharedState>) -> Result<Json<Vec<PageAccessRule>>, StatusCode> {
    require_admin(&current)?;
    Ok(Json(state.access_rules.list().await))
}

async fn update_page_access(
    current: CurrentUser,
    State(state): State<SharedState>,
    Path(path): Path<String>,
    Json(payload): Json<PageAccessPayload>,
) -> Result<Json<PageAccessRule>, StatusCode> {
    require_admin(&current)?;
    let rule = state
        .access_rules
        .update(&path, payload.is_enabled, payload.allowed_roles)
        .await
        .map_err(settings_status)?;
    Ok(Json(rule))
}

async fn list_widgets(current: CurrentUser, State(state): State<SharedState>) -> Result<Json<Vec<DashboardWidgetSetting>>, StatusCode> {
    require_admin(&current)?;
    Ok(Json(state.widgets.list().await))
}

async fn update_widget(
    current: CurrentUser,
    State(state): State<SharedState>,
    Path(key): Path<String>,
    Json(patch): Json<WidgetSettingPatch>,
) -> Result<Json<DashboardWidgetSetting>, StatusCode> {
    require_admin(&current)?;
    let saved = state
        .widgets
        .update(&key, patch)
        .await
        .map_err(settings_status)?;
    Ok(Json(saved))
}

/// Reloads both caches from the database, for edits made outside this process.
async fn refresh_settings(current: CurrentUser, State(state): State<SharedState>) -> Result<Json<RefreshSummary>, StatusCode> {
    require_admin(&current)?;
    let page_rules = state.access_rules.refresh().await.map_err(|e| {
        tracing::error!("Failed to reload page access rules: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let widgets = state.widgets.refresh().await.map_err(|e| {
        tracing::error!("Failed to reload widget settings: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    tracing::info!("Settings reloaded by {}", current.user_id);
    Ok(Json(RefreshSummary { page_rules, widgets }))
}

async fn list_users(current: CurrentUser, State(state): State<SharedState>) -> Result<Json<Vec<AdminUser>>, StatusCode> {
    require_admin(&current)?;
    let users = db::get_all_users(&state.pool).await.map_err(|e| {
        tracing::error!("Failed to list users: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(
        users
            .into_iter()
            .map(|u| AdminUser {
                name: state
                    .cipher
                    .open_lossy(u.id, Some(u.enc_full_name.as_str()))
                    .unwrap_or_else(|| "User".to_string()),
                id: u.id,
                email: u.email,
                role: u.role,
                is_active: u.is_active,
                created_at: u.created_at,
            })
            .collect(),
    ))
}

async fn change_role(
    current: CurrentUser,
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<RolePayload>,
) -> Result<StatusCode, StatusCode> {
    require_admin(&current)?;
    // An admin demoting themselves could leave nobody able to undo it.
    if user_id == current.user_id && payload.role != UserRole::Admin {
        return Err(StatusCode::BAD_REQUEST);
    }

    let updated = db::update_user_role(&state.pool, user_id, payload.role)
        .await
        .map_err(|e| {
            tracing::error!("Failed to change role of {}: {}", user_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    if !updated {
        return Err(StatusCode::NOT_FOUND);
    }

    tracing::info!(
        "Role of {} changed to {} by {}",
        user_id,
        payload.role.as_str(),
        current.user_id
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn create_video(
    current: CurrentUser,
    State(state): State<SharedState>,
    Json(payload): Json<NewVideoPayload>,
) -> Result<(StatusCode, Json<TrainingVideo>), StatusCode> {
    require_admin(&current)?;
    if payload.title.trim().is_empty() || payload.video_url.trim().is_empty() || payload.duration_seconds <= 0 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let video = state
        .training
        .create_video(NewVideo {
            title: payload.title.trim().to_string(),
            description: payload.description,
            video_url: payload.video_url.trim().to_string(),
            duration_seconds: payload.duration_seconds,
            order_number: payload.order_number,
        })
        .await
        .map_err(training_status)?;
    tracing::info!("Training video {} created", video.id);
    Ok((StatusCode::CREATED, Json(video)))
}

async fn save_quiz(
    current: CurrentUser,
    State(state): State<SharedState>,
    Path(video_id): Path<Uuid>,
    Json(payload): Json<QuizPayload>,
) -> Result<Json<TrainingQuiz>, StatusCode> {
    require_admin(&current)?;
    let quiz = state
        .training
        .save_quiz(video_id, payload.passing_score, payload.questions)
        .await
        .map_err(training_status)?;
    Ok(Json(quiz))
}
