use crate::db::{self, seed::hash_password, NewUser};
use crate::domain::models::UserRole;
use crate::middleware::rate_limit::rate_limit_middleware;
use crate::state::SharedState;
use crate::web::session;
use argon2::{password_hash::PasswordHash, Argon2, PasswordVerifier};
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub role: UserRole,
    pub name: String,
}

pub fn router(state: SharedState) -> Router {
    let limited = Router::new()
        .route("/login", post(login))
        .route("/signup", post(signup))
        .route_layer(middleware::from_fn_with_state(
            state.login_limiter.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .merge(limited)
        .route("/logout", post(logout))
        .with_state(state)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

fn with_session_cookie(state: &SharedState, user_id: Uuid, role: UserRole) -> Result<HeaderMap, StatusCode> {
    let token = session::sign_session(user_id, role, &state.session_key).map_err(|e| {
        tracing::error!("Failed to sign session for {}: {}", user_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let cookie = HeaderValue::from_str(&session::session_cookie(&token, state.secure_cookies))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, cookie);
    Ok(headers)
}

async fn login(
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let email = normalize_email(&payload.email);
    let user = db::find_user_by_email(&state.pool, &email)
        .await
        .map_err(|e| {
            tracing::error!("Login lookup failed for {}: {}", email, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let parsed_hash = PasswordHash::new(&user.hash).map_err(|_| StatusCode::UNAUTHORIZED)?;
    Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let name = state
        .cipher
        .open_lossy(user.id, Some(user.enc_full_name.as_str()))
        .unwrap_or_else(|| "User".to_string());

    let headers = with_session_cookie(&state, user.id, user.role)?;
    tracing::info!("User {} logged in as {}", user.id, user.role.as_str());

    Ok((
        headers,
        Json(LoginResponse {
            user_id: user.id,
            role: user.role,
            name,
        }),
    ))
}

/// Self-service sign-up always creates a candidate; other roles are granted by an admin.
async fn signup(
    State(state): State<SharedState>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let email = normalize_email(&payload.email);
    let full_name = payload.full_name.trim();
    if !is_plausible_email(&email) || full_name.is_empty() || payload.password.len() < MIN_PASSWORD_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }
    let phone = payload
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    let id = Uuid::new_v4();
    let hash = hash_password(&payload.password).map_err(|e| {
        tracing::error!("{}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let enc_full_name = state.cipher.seal(id, full_name).map_err(|e| {
        tracing::error!("Failed to encrypt name: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let enc_phone = state.cipher.seal_opt(id, phone).map_err(|e| {
        tracing::error!("Failed to encrypt phone: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let created = db::insert_user(
        &state.pool,
        NewUser {
            id,
            email: &email,
            hash: &hash,
            role: UserRole::Candidate,
            enc_full_name: &enc_full_name,
            enc_phone: enc_phone.as_deref(),
        },
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to create user {}: {}", email, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if !created {
        return Err(StatusCode::CONFLICT);
    }

    let headers = with_session_cookie(&state, id, UserRole::Candidate)?;
    tracing::info!("Candidate account {} created", id);

    Ok((
        StatusCode::CREATED,
        headers,
        Json(LoginResponse {
            user_id: id,
            role: UserRole::Candidate,
            name: full_name.to_string(),
        }),
    ))
}

async fn logout(State(state): State<SharedState>) -> impl IntoResponse {
    [(header::SET_COOKIE, session::clear_session_cookie(state.secure_cookies))]
}
