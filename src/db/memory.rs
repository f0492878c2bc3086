use crate::db::settings::SettingsStore;
use crate::db::training::{NewVideo, ProgressStore, WatchWrite};
use crate::domain::models::{
    DashboardWidgetSetting, PageAccessRule, QuizQuestion, TrainingProgress, TrainingQuiz, TrainingVideo, UserRole,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

/// In-memory stand-in for both stores, mirroring the SQL merge rules.
#[derive(Default)]
pub struct MemoryStore {
    pub page_rules: Mutex<BTreeMap<String, PageAccessRule>>,
    pub widgets: Mutex<BTreeMap<String, DashboardWidgetSetting>>,
    pub videos: Mutex<Vec<TrainingVideo>>,
    pub quizzes: Mutex<HashMap<Uuid, TrainingQuiz>>,
    pub progress: Mutex<HashMap<(Uuid, Uuid), TrainingProgress>>,
    pub load_calls: AtomicUsize,
    pub quiz_lookups: AtomicUsize,
    pub watch_writes: AtomicUsize,
    pub fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn writes(&self) -> usize {
        self.watch_writes.load(Ordering::SeqCst)
    }

    pub async fn add_video(&self, title: &str) -> Uuid {
        self.insert_video(NewVideo {
            title: title.to_string(),
            description: None,
            video_url: format!("https://cdn.example.com/{title}.mp4"),
            duration_seconds: 600,
            order_number: 0,
        })
        .await
        .map(|v| v.id)
        .unwrap_or_default()
    }

    pub async fn row(&self, user_id: Uuid, video_id: Uuid) -> Option<TrainingProgress> {
        self.progress.lock().await.get(&(user_id, video_id)).cloned()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load_page_rules(&self) -> Result<Vec<PageAccessRule>> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.page_rules.lock().await.values().cloned().collect())
    }

    async fn save_page_rule(&self, page_path: &str, is_enabled: bool, allowed_roles: &[UserRole]) -> Result<PageAccessRule> {
        self.check_writable()?;
        let rule = PageAccessRule {
            page_path: page_path.to_string(),
            is_enabled,
            allowed_roles: allowed_roles.to_vec(),
            updated_at: Utc::now(),
        };
        self.page_rules
            .lock()
            .await
            .insert(page_path.to_string(), rule.clone());
        Ok(rule)
    }

    async fn insert_default_page_rule(&self, page_path: &str, allowed_roles: &[UserRole]) -> Result<()> {
        self.page_rules
            .lock()
            .await
            .entry(page_path.to_string())
            .or_insert_with(|| PageAccessRule {
                page_path: page_path.to_string(),
                is_enabled: true,
                allowed_roles: allowed_roles.to_vec(),
                updated_at: Utc::now(),
            });
        Ok(())
    }

    async fn load_widgets(&self) -> Result<Vec<DashboardWidgetSetting>> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.widgets.lock().await.values().cloned().collect())
    }

    async fn save_widget(&self, setting: &DashboardWidgetSetting) -> Result<DashboardWidgetSetting> {
        self.check_writable()?;
        let mut saved = setting.clone();
        saved.updated_at = Utc::now();
        self.widgets
            .lock()
            .await
            .insert(saved.widget_key.clone(), saved.clone());
        Ok(saved)
    }

    async fn insert_default_widget(&self, widget_key: &str, title: &str, allowed_roles: &[UserRole], order_number: i32) -> Result<()> {
        self.widgets
            .lock()
            .await
            .entry(widget_key.to_string())
            .or_insert_with(|| DashboardWidgetSetting {
                widget_key: widget_key.to_string(),
                title: title.to_string(),
                allowed_roles: allowed_roles.to_vec(),
                is_visible: true,
                order_number,
                updated_at: Utc::now(),
            });
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn list_videos(&self) -> Result<Vec<TrainingVideo>> {
        Ok(self.videos.lock().await.clone())
    }

    async fn find_video(&self, video_id: Uuid) -> Result<Option<TrainingVideo>> {
        Ok(self
            .videos
            .lock()
            .await
            .iter()
            .find(|v| v.id == video_id)
            .cloned())
    }

    async fn insert_video(&self, video: NewVideo) -> Result<TrainingVideo> {
        let created = TrainingVideo {
            id: Uuid::new_v4(),
            title: video.title,
            description: video.description,
            video_url: video.video_url,
            duration_seconds: video.duration_seconds,
            order_number: video.order_number,
            created_at: Utc::now(),
        };
        self.videos.lock().await.push(created.clone());
        Ok(created)
    }

    async fn find_quiz(&self, video_id: Uuid) -> Result<Option<TrainingQuiz>> {
        self.quiz_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.quizzes.lock().await.get(&video_id).cloned())
    }

    async fn quiz_video_ids(&self) -> Result<Vec<Uuid>> {
        Ok(self.quizzes.lock().await.keys().copied().collect())
    }

    async fn save_quiz(&self, video_id: Uuid, passing_score: i16, questions: Vec<QuizQuestion>) -> Result<TrainingQuiz> {
        let quiz = TrainingQuiz {
            video_id,
            passing_score,
            questions: Json(questions),
            updated_at: Utc::now(),
        };
        self.quizzes.lock().await.insert(video_id, quiz.clone());
        Ok(quiz)
    }

    async fn list_progress(&self, user_id: Uuid) -> Result<Vec<TrainingProgress>> {
        Ok(self
            .progress
            .lock()
            .await
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_or_create_progress(&self, user_id: Uuid, video_id: Uuid) -> Result<TrainingProgress> {
        self.check_writable()?;
        Ok(self
            .progress
            .lock()
            .await
            .entry((user_id, video_id))
            .or_insert_with(|| TrainingProgress::new(user_id, video_id))
            .clone())
    }

    async fn save_watch(&self, write: &WatchWrite) -> Result<TrainingProgress> {
        self.check_writable()?;
        self.watch_writes.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.progress.lock().await;
        let row = rows
            .entry((write.user_id, write.video_id))
            .or_insert_with(|| TrainingProgress::new(write.user_id, write.video_id));
        row.watched_percentage = row.watched_percentage.max(write.watched_percentage);
        row.last_position_seconds = write.last_position_seconds;
        if write.completed && !row.completed {
            row.completed = true;
        }
        if row.completed && row.completed_at.is_none() {
            row.completed_at = Some(Utc::now());
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn save_quiz_result(&self, user_id: Uuid, video_id: Uuid, score: i16, passed: bool) -> Result<TrainingProgress> {
        self.check_writable()?;
        let mut rows = self.progress.lock().await;
        let row = rows
            .get_mut(&(user_id, video_id))
            .ok_or_else(|| anyhow!("no progress row"))?;
        row.quiz_score = Some(score);
        if passed {
            row.quiz_completed = true;
            row.completed = true;
            if row.completed_at.is_none() {
                row.completed_at = Some(Utc::now());
            }
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }
}
