use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgHasArrayType, PgTypeInfo};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Candidate,
    Salesperson,
    Manager,
    Admin,
}

impl UserRole {
    pub const ALL: [UserRole; 4] = [
        UserRole::Candidate,
        UserRole::Salesperson,
        UserRole::Manager,
        UserRole::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Candidate => "candidate",
            UserRole::Salesperson => "salesperson",
            UserRole::Manager => "manager",
            UserRole::Admin => "admin",
        }
    }
}

// Lets `Vec<UserRole>` bind to and decode from `user_role[]` columns.
impl PgHasArrayType for UserRole {
    fn array_type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("_user_role")
    }
}

impl TryFrom<&str> for UserRole {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "candidate" => Ok(UserRole::Candidate),
            "salesperson" => Ok(UserRole::Salesperson),
            "manager" => Ok(UserRole::Manager),
            "admin" => Ok(UserRole::Admin),
            _ => Err(()),
        }
    }
}

/// Admin-editable override for one page path.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct PageAccessRule {
    pub page_path: String,
    pub is_enabled: bool,
    pub allowed_roles: Vec<UserRole>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct DashboardWidgetSetting {
    pub widget_key: String,
    pub title: String,
    pub allowed_roles: Vec<UserRole>,
    pub is_visible: bool,
    pub order_number: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainingVideo {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub video_url: String,
    pub duration_seconds: i32,
    pub order_number: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainingQuiz {
    pub video_id: Uuid,
    pub passing_score: i16,
    pub questions: Json<Vec<QuizQuestion>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct TrainingProgress {
    pub user_id: Uuid,
    pub video_id: Uuid,
    pub watched_percentage: i16,
    pub last_position_seconds: f64,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub quiz_completed: bool,
    pub quiz_score: Option<i16>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
impl TrainingProgress {
    /// Fresh row with the column defaults from the migration.
    pub fn new(user_id: Uuid, video_id: Uuid) -> Self {
        Self {
            user_id,
            video_id,
            watched_percentage: 0,
            last_position_seconds: 0.0,
            completed: false,
            completed_at: None,
            quiz_completed: false,
            quiz_score: None,
            updated_at: Utc::now(),
        }
    }
}
