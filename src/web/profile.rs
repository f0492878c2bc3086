use crate::db;
use crate::domain::models::UserRole;
use crate::state::SharedState;
use crate::web::session::CurrentUser;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize)]
pub struct ProfileView {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    /// `Some("")` clears the phone number.
    pub phone: Option<String>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/me", get(get_profile).put(update_profile))
        .with_state(state)
}

async fn load_view(state: &SharedState, user_id: Uuid) -> Result<ProfileView, StatusCode> {
    let user = db::find_user_by_id(&state.pool, user_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load profile {}: {}", user_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(ProfileView {
        user_id: user.id,
        full_name: state.cipher.open_lossy(user.id, Some(user.enc_full_name.as_str())),
        phone: state.cipher.open_lossy(user.id, user.enc_phone.as_deref()),
        email: user.email,
        role: user.role,
        created_at: user.created_at,
        updated_at: user.updated_at,
    })
}

async fn get_profile(current: CurrentUser, State(state): State<SharedState>) -> Result<Json<ProfileView>, StatusCode> {
    Ok(Json(load_view(&state, current.user_id).await?))
}

async fn update_profile(
    current: CurrentUser,
    State(state): State<SharedState>,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Json<ProfileView>, StatusCode> {
    let existing = load_view(&state, current.user_id).await?;

    let full_name = match payload.full_name.as_deref().map(str::trim) {
        Some("") => return Err(StatusCode::BAD_REQUEST),
        Some(name) => name.to_string(),
        None => existing.full_name.unwrap_or_default(),
    };
    let phone = match payload.phone.as_deref().map(str::trim) {
        Some("") => None,
        Some(phone) => Some(phone.to_string()),
        None => existing.phone,
    };

    let enc_full_name = state.cipher.seal(current.user_id, &full_name).map_err(|e| {
        tracing::error!("Failed to encrypt name: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let enc_phone = state
        .cipher
        .seal_opt(current.user_id, phone.as_deref())
        .map_err(|e| {
            tracing::error!("Failed to encrypt phone: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    db::update_profile(&state.pool, current.user_id, &enc_full_name, enc_phone.as_deref())
        .await
        .map_err(|e| {
            tracing::error!("Failed to update profile {}: {}", current.user_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    tracing::info!("Profile updated for {}", current.user_id);

    Ok(Json(load_view(&state, current.user_id).await?))
}
