use crate::config::TrainingConfig;
use crate::db::training::{NewVideo, ProgressStore, WatchWrite};
use crate::domain::models::{QuizQuestion, TrainingProgress, TrainingQuiz, TrainingVideo};
use crate::domain::progress::{clamp_percentage, ProgressStage, ProgressTracker, ProgressTransition, QuizOutcome};
use crate::domain::quiz::{self, QuizError, QuizQuestionView};
use crate::domain::throttle::WriteThrottle;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("video not found")]
    VideoNotFound,
    #[error("video has no quiz")]
    NoQuiz,
    #[error("quiz is locked until more of the video is watched")]
    QuizLocked,
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressView {
    pub video_id: Uuid,
    pub stage: ProgressStage,
    pub watched_percentage: u8,
    pub last_position_seconds: f64,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub quiz_available: bool,
    pub quiz_unlocked: bool,
    pub quiz_score: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate {
    pub progress: ProgressView,
    pub transitions: Vec<ProgressTransition>,
    /// False when the write was throttled or the store rejected it.
    pub persisted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub video: TrainingVideo,
    pub progress: ProgressView,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizView {
    pub video_id: Uuid,
    pub passing_score: u8,
    pub unlocked: bool,
    pub last_score: Option<u8>,
    pub questions: Vec<QuizQuestionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizResult {
    pub score: u8,
    pub passed: bool,
    pub passing_score: u8,
    pub completed: bool,
    pub transitions: Vec<ProgressTransition>,
}

struct WatchSession {
    tracker: ProgressTracker,
    throttle: WriteThrottle,
    completed_at: Option<DateTime<Utc>>,
    last_seen: Instant,
}

type SessionKey = (Uuid, Uuid);

/// Tracks playback for every open (user, video) pair and decides when to
/// write progress back to storage.
#[derive(Clone)]
pub struct TrainingService {
    store: Arc<dyn ProgressStore>,
    config: TrainingConfig,
    sessions: Arc<RwLock<HashMap<SessionKey, Arc<Mutex<WatchSession>>>>>,
}

impl TrainingService {
    pub fn new(store: Arc<dyn ProgressStore>, config: TrainingConfig) -> Self {
        Self {
            store,
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn open_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn catalog(&self, user_id: Uuid) -> Result<Vec<CatalogEntry>, TrainingError> {
        let videos = self.store.list_videos().await?;
        let quizzes: HashSet<Uuid> = self.store.quiz_video_ids().await?.into_iter().collect();
        let progress: HashMap<Uuid, TrainingProgress> = self
            .store
            .list_progress(user_id)
            .await?
            .into_iter()
            .map(|p| (p.video_id, p))
            .collect();

        let mut out = Vec::with_capacity(videos.len());
        for video in videos {
            let has_quiz = quizzes.contains(&video.id);
            let view = match progress.get(&video.id) {
                Some(row) => {
                    let tracker = ProgressTracker::resume(self.config.thresholds, has_quiz, row);
                    view_of(video.id, &tracker, row.completed_at)
                }
                None => not_started(video.id, has_quiz),
            };
            out.push(CatalogEntry { video, progress: view });
        }
        Ok(out)
    }

    /// First view of a video: creates the progress row if absent and opens
    /// a watch session.
    pub async fn open(&self, user_id: Uuid, video_id: Uuid) -> Result<ProgressView, TrainingError> {
        self.open_at(user_id, video_id, Instant::now()).await
    }

    pub async fn open_at(&self, user_id: Uuid, video_id: Uuid, now: Instant) -> Result<ProgressView, TrainingError> {
        let session = self.session_for(user_id, video_id, now).await?;
        let mut session = session.lock().await;
        session.last_seen = now;
        Ok(view_of(video_id, &session.tracker, session.completed_at))
    }

    pub async fn record(
        &self,
        user_id: Uuid,
        video_id: Uuid,
        percentage: f64,
        position_seconds: f64,
    ) -> Result<ProgressUpdate, TrainingError> {
        self.record_at(user_id, video_id, percentage, position_seconds, Instant::now())
            .await
    }

    /// Feeds one time-update event. Transitions always write; otherwise the
    /// throttle decides. A failed write is logged and reported through
    /// `persisted`, never retried.
    pub async fn record_at(
        &self,
        user_id: Uuid,
        video_id: Uuid,
        percentage: f64,
        position_seconds: f64,
        now: Instant,
    ) -> Result<ProgressUpdate, TrainingError> {
        let session = self.session_for(user_id, video_id, now).await?;
        let mut session = session.lock().await;
        session.last_seen = now;

        let transitions = session
            .tracker
            .observe(clamp_percentage(percentage), position_seconds);
        let watched = session.tracker.watched();
        let should_write = !transitions.is_empty() || session.throttle.should_write(watched, now);

        let mut persisted = false;
        if should_write {
            match self.store.save_watch(&watch_write(user_id, video_id, &session.tracker)).await {
                Ok(row) => {
                    session.throttle.record(watched, now);
                    session.completed_at = row.completed_at;
                    persisted = true;
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to save progress for user {} video {}: {}",
                        user_id,
                        video_id,
                        e
                    );
                }
            }
        }

        for transition in &transitions {
            tracing::info!(
                "Training transition {:?} for user {} video {} at {}%",
                transition,
                user_id,
                video_id,
                watched
            );
        }

        Ok(ProgressUpdate {
            progress: view_of(video_id, &session.tracker, session.completed_at),
            transitions,
            persisted,
        })
    }

    /// Teardown write: persists the last known state regardless of the
    /// throttle and closes the session. Best-effort.
    pub async fn flush(&self, user_id: Uuid, video_id: Uuid) -> Option<TrainingProgress> {
        let session = self.sessions.write().await.remove(&(user_id, video_id))?;
        let session = session.lock().await;
        match self
            .store
            .save_watch(&watch_write(user_id, video_id, &session.tracker))
            .await
        {
            Ok(row) => Some(row),
            Err(e) => {
                tracing::error!(
                    "Final progress write failed for user {} video {}: {}",
                    user_id,
                    video_id,
                    e
                );
                None
            }
        }
    }

    /// Flushes sessions nobody has touched for `idle_flush_after`.
    pub async fn flush_idle(&self, now: Instant) -> usize {
        let keys: Vec<SessionKey> = {
            let sessions = self.sessions.read().await;
            let mut idle = Vec::new();
            for (key, session) in sessions.iter() {
                let last_seen = session.lock().await.last_seen;
                if now.saturating_duration_since(last_seen) >= self.config.idle_flush_after {
                    idle.push(*key);
                }
            }
            idle
        };

        let mut flushed = 0;
        for (user_id, video_id) in keys {
            if self.flush(user_id, video_id).await.is_some() {
                flushed += 1;
            }
        }
        flushed
    }

    pub async fn quiz_view(&self, user_id: Uuid, video_id: Uuid) -> Result<QuizView, TrainingError> {
        let quiz = self.store.find_quiz(video_id).await?.ok_or(TrainingError::NoQuiz)?;
        let tracker = self.current_tracker(user_id, video_id, true).await?;
        Ok(QuizView {
            video_id,
            passing_score: quiz.passing_score.clamp(0, 100) as u8,
            unlocked: tracker.is_quiz_unlocked(),
            last_score: tracker.quiz_score(),
            questions: quiz::public_view(&quiz.questions.0),
        })
    }

    pub async fn submit_quiz(&self, user_id: Uuid, video_id: Uuid, answers: &[usize]) -> Result<QuizResult, TrainingError> {
        let quiz = self.store.find_quiz(video_id).await?.ok_or(TrainingError::NoQuiz)?;
        let passing_score = quiz.passing_score.clamp(0, 100) as u8;

        // Grade a copy; the session only takes the result once the store has it.
        let open = self.sessions.read().await.get(&(user_id, video_id)).cloned();
        let (outcome, completed) = match open {
            Some(session) => {
                let mut session = session.lock().await;
                let mut graded = session.tracker.clone();
                let outcome = grade(&mut graded, &quiz, answers, passing_score)?;
                let row = self
                    .store
                    .save_quiz_result(user_id, video_id, outcome.score as i16, outcome.passed)
                    .await?;
                session.tracker = graded;
                session.completed_at = row.completed_at;
                (outcome, session.tracker.is_completed())
            }
            None => {
                let mut tracker = self.current_tracker(user_id, video_id, true).await?;
                let outcome = grade(&mut tracker, &quiz, answers, passing_score)?;
                self.store
                    .save_quiz_result(user_id, video_id, outcome.score as i16, outcome.passed)
                    .await?;
                (outcome, tracker.is_completed())
            }
        };

        tracing::info!(
            "Quiz submitted: user={}, video={}, score={}, passed={}",
            user_id,
            video_id,
            outcome.score,
            outcome.passed
        );

        Ok(QuizResult {
            score: outcome.score,
            passed: outcome.passed,
            passing_score,
            completed,
            transitions: outcome.transitions,
        })
    }

    pub async fn create_video(&self, video: NewVideo) -> Result<TrainingVideo, TrainingError> {
        Ok(self.store.insert_video(video).await?)
    }

    pub async fn save_quiz(
        &self,
        video_id: Uuid,
        passing_score: Option<u8>,
        questions: Vec<QuizQuestion>,
    ) -> Result<TrainingQuiz, TrainingError> {
        self.store
            .find_video(video_id)
            .await?
            .ok_or(TrainingError::VideoNotFound)?;
        quiz::validate_questions(&questions)?;
        let passing_score = passing_score
            .unwrap_or(self.config.thresholds.passing_score)
            .min(100);

        let saved = self
            .store
            .save_quiz(video_id, passing_score as i16, questions)
            .await?;

        let sessions = self.sessions.read().await;
        for ((_, session_video), session) in sessions.iter() {
            if *session_video == video_id {
                session.lock().await.tracker.set_has_quiz(true);
            }
        }
        Ok(saved)
    }

    async fn session_for(&self, user_id: Uuid, video_id: Uuid, now: Instant) -> Result<Arc<Mutex<WatchSession>>, TrainingError> {
        if let Some(existing) = self.sessions.read().await.get(&(user_id, video_id)) {
            return Ok(existing.clone());
        }

        self.store
            .find_video(video_id)
            .await?
            .ok_or(TrainingError::VideoNotFound)?;
        let has_quiz = self.store.find_quiz(video_id).await?.is_some();
        let row = self.store.get_or_create_progress(user_id, video_id).await?;

        let tracker = ProgressTracker::resume(self.config.thresholds, has_quiz, &row);
        let throttle = WriteThrottle::primed(
            self.config.write_delta,
            self.config.write_interval,
            tracker.watched(),
            now,
        );
        let fresh = Arc::new(Mutex::new(WatchSession {
            tracker,
            throttle,
            completed_at: row.completed_at,
            last_seen: now,
        }));

        let mut sessions = self.sessions.write().await;
        Ok(sessions
            .entry((user_id, video_id))
            .or_insert(fresh)
            .clone())
    }

    /// Tracker from the open session when there is one, otherwise from the stored row.
    async fn current_tracker(&self, user_id: Uuid, video_id: Uuid, has_quiz: bool) -> Result<ProgressTracker, TrainingError> {
        if let Some(session) = self.sessions.read().await.get(&(user_id, video_id)) {
            return Ok(session.lock().await.tracker.clone());
        }
        self.store
            .find_video(video_id)
            .await?
            .ok_or(TrainingError::VideoNotFound)?;
        let row = self.store.get_or_create_progress(user_id, video_id).await?;
        Ok(ProgressTracker::resume(self.config.thresholds, has_quiz, &row))
    }
}

fn grade(
    tracker: &mut ProgressTracker,
    quiz: &TrainingQuiz,
    answers: &[usize],
    passing_score: u8,
) -> Result<QuizOutcome, TrainingError> {
    if !tracker.is_quiz_unlocked() {
        return Err(TrainingError::QuizLocked);
    }
    let score = quiz::score_answers(&quiz.questions.0, answers)?;
    Ok(tracker.record_quiz(score, passing_score))
}

fn watch_write(user_id: Uuid, video_id: Uuid, tracker: &ProgressTracker) -> WatchWrite {
    WatchWrite {
        user_id,
        video_id,
        watched_percentage: tracker.watched() as i16,
        last_position_seconds: tracker.position_seconds(),
        completed: tracker.is_completed(),
    }
}

fn view_of(video_id: Uuid, tracker: &ProgressTracker, completed_at: Option<DateTime<Utc>>) -> ProgressView {
    ProgressView {
        video_id,
        stage: tracker.stage(),
        watched_percentage: tracker.watched(),
        last_position_seconds: tracker.position_seconds(),
        completed: tracker.is_completed(),
        completed_at,
        quiz_available: tracker.has_quiz(),
        quiz_unlocked: tracker.is_quiz_unlocked(),
        quiz_score: tracker.quiz_score(),
    }
}

fn not_started(video_id: Uuid, has_quiz: bool) -> ProgressView {
    ProgressView {
        video_id,
        stage: ProgressStage::NotStarted,
        watched_percentage: 0,
        last_position_seconds: 0.0,
        completed: false,
        completed_at: None,
        quiz_available: has_quiz,
        quiz_unlocked: false,
        quiz_score: None,
    }
}
