use crate::domain::models::{QuizQuestion, TrainingProgress, TrainingQuiz, TrainingVideo};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

/// Snapshot of a watch session written back to `training_progress`.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchWrite {
    pub user_id: Uuid,
    pub video_id: Uuid,
    pub watched_percentage: i16,
    pub last_position_seconds: f64,
    pub completed: bool,
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub title: String,
    pub description: Option<String>,
    pub video_url: String,
    pub duration_seconds: i32,
    pub order_number: i32,
}

/// Storage for videos, quizzes and per-user progress.
///
/// Progress writes merge monotonically: the stored percentage never goes
/// down, `completed` never flips back, and `completed_at` is set once.
/// Concurrent final writes from two tabs therefore cannot regress a row.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn list_videos(&self) -> Result<Vec<TrainingVideo>>;
    async fn find_video(&self, video_id: Uuid) -> Result<Option<TrainingVideo>>;
    async fn insert_video(&self, video: NewVideo) -> Result<TrainingVideo>;

    async fn find_quiz(&self, video_id: Uuid) -> Result<Option<TrainingQuiz>>;
    /// Ids of every video that has a quiz attached.
    async fn quiz_video_ids(&self) -> Result<Vec<Uuid>>;
    async fn save_quiz(&self, video_id: Uuid, passing_score: i16, questions: Vec<QuizQuestion>) -> Result<TrainingQuiz>;

    async fn list_progress(&self, user_id: Uuid) -> Result<Vec<TrainingProgress>>;
    /// Returns the existing row, creating one at 0% when absent.
    async fn get_or_create_progress(&self, user_id: Uuid, video_id: Uuid) -> Result<TrainingProgress>;
    async fn save_watch(&self, write: &WatchWrite) -> Result<TrainingProgress>;
    async fn save_quiz_result(&self, user_id: Uuid, video_id: Uuid, score: i16, passed: bool) -> Result<TrainingProgress>;
}

#[derive(Clone)]
pub struct PgProgressStore {
    pool: PgPool,
}

impl PgProgressStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PROGRESS_COLUMNS: &str = "user_id, video_id, watched_percentage, last_position_seconds, completed, completed_at, quiz_completed, quiz_score, updated_at";

#[async_trait]
impl ProgressStore for PgProgressStore {
    async fn list_videos(&self) -> Result<Vec<TrainingVideo>> {
        let videos = sqlx::query_as::<_, TrainingVideo>(
            r#"
            SELECT id, title, description, video_url, duration_seconds, order_number, created_at
            FROM training_videos
            ORDER BY order_number ASC, created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(videos)
    }

    async fn find_video(&self, video_id: Uuid) -> Result<Option<TrainingVideo>> {
        let video = sqlx::query_as::<_, TrainingVideo>(
            r#"
            SELECT id, title, description, video_url, duration_seconds, order_number, created_at
            FROM training_videos
            WHERE id = $1
            "#,
        )
        .bind(video_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(video)
    }

    async fn insert_video(&self, video: NewVideo) -> Result<TrainingVideo> {
        let created = sqlx::query_as::<_, TrainingVideo>(
            r#"
            INSERT INTO training_videos (id, title, description, video_url, duration_seconds, order_number)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, title, description, video_url, duration_seconds, order_number, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(video.title)
        .bind(video.description)
        .bind(video.video_url)
        .bind(video.duration_seconds)
        .bind(video.order_number)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn find_quiz(&self, video_id: Uuid) -> Result<Option<TrainingQuiz>> {
        let quiz = sqlx::query_as::<_, TrainingQuiz>(
            r#"
            SELECT video_id, passing_score, questions, updated_at
            FROM training_quizzes
            WHERE video_id = $1
            "#,
        )
        .bind(video_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(quiz)
    }

    async fn quiz_video_ids(&self) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT video_id FROM training_quizzes")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn save_quiz(&self, video_id: Uuid, passing_score: i16, questions: Vec<QuizQuestion>) -> Result<TrainingQuiz> {
        let quiz = sqlx::query_as::<_, TrainingQuiz>(
            r#"
            INSERT INTO training_quizzes (video_id, passing_score, questions)
            VALUES ($1, $2, $3)
            ON CONFLICT (video_id) DO UPDATE
            SET passing_score = EXCLUDED.passing_score,
                questions = EXCLUDED.questions,
                updated_at = now()
            RETURNING video_id, passing_score, questions, updated_at
            "#,
        )
        .bind(video_id)
        .bind(passing_score)
        .bind(Json(questions))
        .fetch_one(&self.pool)
        .await?;
        Ok(quiz)
    }

    async fn list_progress(&self, user_id: Uuid) -> Result<Vec<TrainingProgress>> {
        let rows = sqlx::query_as::<_, TrainingProgress>(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM training_progress WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_or_create_progress(&self, user_id: Uuid, video_id: Uuid) -> Result<TrainingProgress> {
        sqlx::query(
            r#"
            INSERT INTO training_progress (user_id, video_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, video_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(video_id)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, TrainingProgress>(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM training_progress WHERE user_id = $1 AND video_id = $2"
        ))
        .bind(user_id)
        .bind(video_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn save_watch(&self, write: &WatchWrite) -> Result<TrainingProgress> {
        let completed_at: Option<DateTime<Utc>> = write.completed.then(Utc::now);
        let row = sqlx::query_as::<_, TrainingProgress>(&format!(
            r#"
            INSERT INTO training_progress
                (user_id, video_id, watched_percentage, last_position_seconds, completed, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, video_id) DO UPDATE
            SET watched_percentage = GREATEST(training_progress.watched_percentage, EXCLUDED.watched_percentage),
                last_position_seconds = EXCLUDED.last_position_seconds,
                completed = training_progress.completed OR EXCLUDED.completed,
                completed_at = COALESCE(training_progress.completed_at, EXCLUDED.completed_at),
                updated_at = now()
            RETURNING {PROGRESS_COLUMNS}
            "#
        ))
        .bind(write.user_id)
        .bind(write.video_id)
        .bind(write.watched_percentage)
        .bind(write.last_position_seconds)
        .bind(write.completed)
        .bind(completed_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn save_quiz_result(&self, user_id: Uuid, video_id: Uuid, score: i16, passed: bool) -> Result<TrainingProgress> {
        let completed_at: Option<DateTime<Utc>> = passed.then(Utc::now);
        let row = sqlx::query_as::<_, TrainingProgress>(&format!(
            r#"
            UPDATE training_progress
            SET quiz_score = $3,
                quiz_completed = quiz_completed OR $4,
                completed = completed OR $4,
                completed_at = COALESCE(completed_at, $5),
                updated_at = now()
            WHERE user_id = $1 AND video_id = $2
            RETURNING {PROGRESS_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(video_id)
        .bind(score)
        .bind(passed)
        .bind(completed_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
