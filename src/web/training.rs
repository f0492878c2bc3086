use crate::domain::access::{AccessDecision, Viewer};
use crate::domain::progress::ProgressTransition;
use crate::services::training::{CatalogEntry, ProgressView, QuizResult, QuizView, TrainingError};
use crate::state::SharedState;
use crate::web::session::CurrentUser;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct TimeUpdate {
    pub percentage: f64,
    #[serde(default)]
    pub position_seconds: f64,
}

#[derive(Deserialize)]
pub struct QuizSubmission {
    pub answers: Vec<usize>,
}

#[derive(Serialize)]
pub struct TimeUpdateResponse {
    pub progress: ProgressView,
    /// Set only on the update that crossed the unlock threshold.
    pub quiz_unlocked: bool,
    pub completed_now: bool,
    pub persisted: bool,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/videos", get(catalog))
        .route("/videos/:id/progress", get(open_progress).post(time_update))
        .route("/videos/:id/progress/flush", post(flush_progress))
        .route("/videos/:id/quiz", get(quiz_view).post(submit_quiz))
        .with_state(state)
}

pub(crate) fn training_status(e: TrainingError) -> StatusCode {
    match e {
        TrainingError::VideoNotFound | TrainingError::NoQuiz => StatusCode::NOT_FOUND,
        TrainingError::QuizLocked => StatusCode::FORBIDDEN,
        TrainingError::Quiz(e) => {
            tracing::debug!("Rejected quiz input: {}", e);
            StatusCode::UNPROCESSABLE_ENTITY
        }
        TrainingError::Store(e) => {
            tracing::error!("Training storage error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Training endpoints follow the same rules as the `/training` pages.
async fn require_training(state: &SharedState, current: &CurrentUser) -> Result<(), StatusCode> {
    match state
        .access_rules
        .decide("/training", Viewer::Authenticated(current.role))
        .await
    {
        AccessDecision::Allow => Ok(()),
        _ => Err(StatusCode::FORBIDDEN),
    }
}

async fn catalog(current: CurrentUser, State(state): State<SharedState>) -> Result<Json<Vec<CatalogEntry>>, StatusCode> {
    require_training(&state, &current).await?;
    let entries = state
        .training
        .catalog(current.user_id)
        .await
        .map_err(training_status)?;
    Ok(Json(entries))
}

async fn open_progress(
    current: CurrentUser,
    State(state): State<SharedState>,
    Path(video_id): Path<Uuid>,
) -> Result<Json<ProgressView>, StatusCode> {
    require_training(&state, &current).await?;
    let view = state
        .training
        .open(current.user_id, video_id)
        .await
        .map_err(training_status)?;
    Ok(Json(view))
}

async fn time_update(
    current: CurrentUser,
    State(state): State<SharedState>,
    Path(video_id): Path<Uuid>,
    Json(payload): Json<TimeUpdate>,
) -> Result<Json<TimeUpdateResponse>, StatusCode> {
    require_training(&state, &current).await?;
    let update = state
        .training
        .record(current.user_id, video_id, payload.percentage, payload.position_seconds)
        .await
        .map_err(training_status)?;

    Ok(Json(TimeUpdateResponse {
        quiz_unlocked: update.transitions.contains(&ProgressTransition::QuizUnlocked),
        completed_now: update.transitions.contains(&ProgressTransition::Completed),
        progress: update.progress,
        persisted: update.persisted,
    }))
}

/// Player teardown. Always answers 204; a failed write is only logged.
async fn flush_progress(
    current: CurrentUser,
    State(state): State<SharedState>,
    Path(video_id): Path<Uuid>,
) -> StatusCode {
    state.training.flush(current.user_id, video_id).await;
    StatusCode::NO_CONTENT
}

async fn quiz_view(
    current: CurrentUser,
    State(state): State<SharedState>,
    Path(video_id): Path<Uuid>,
) -> Result<Json<QuizView>, StatusCode> {
    require_training(&state, &current).await?;
    let view = state
        .training
        .quiz_view(current.user_id, video_id)
        .await
        .map_err(training_status)?;
    Ok(Json(view))
}

async fn submit_quiz(
    current: CurrentUser,
    State(state): State<SharedState>,
    Path(video_id): Path<Uuid>,
    Json(payload): Json<QuizSubmission>,
) -> Result<Json<QuizResult>, StatusCode> {
    require_training(&state, &current).await?;
    let result = state
        .training
        .submit_quiz(current.user_id, video_id, &payload.answers)
        .await
        .map_err(training_status)?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::quiz::QuizError;

    #[test]
    fn errors_map_to_statuses() {
        assert_eq!(training_status(TrainingError::VideoNotFound), StatusCode::NOT_FOUND);
        assert_eq!(training_status(TrainingError::QuizLocked), StatusCode::FORBIDDEN);
        assert_eq!(
            training_status(TrainingError::Quiz(QuizError::Empty)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            training_status(TrainingError::Store(anyhow::anyhow!("down"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
