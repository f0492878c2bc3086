use crate::domain::models::TrainingProgress;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub unlock_percent: u8,
    pub complete_percent: u8,
    pub passing_score: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            unlock_percent: 50,
            complete_percent: 95,
            passing_score: 70,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    NotStarted,
    Watching,
    QuizUnlockable,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressTransition {
    QuizUnlocked,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOutcome {
    pub score: u8,
    pub passed: bool,
    pub transitions: Vec<ProgressTransition>,
}

/// Clamps a player-reported percentage into 0..=100, flooring fractions.
pub fn clamp_percentage(raw: f64) -> u8 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    raw.min(100.0).floor() as u8
}

/// Watch state for one (user, video) pair.
///
/// `watched` is a high-water mark: seeking backwards moves the position but
/// never lowers the percentage. Each transition fires at most once per
/// tracker, and a tracker resumed from a stored row does not re-fire
/// transitions the row already reflects.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    thresholds: Thresholds,
    has_quiz: bool,
    watched: u8,
    position_seconds: f64,
    quiz_unlocked: bool,
    completed: bool,
    quiz_score: Option<u8>,
}

impl ProgressTracker {
    pub fn new(thresholds: Thresholds, has_quiz: bool) -> Self {
        Self {
            thresholds,
            has_quiz,
            watched: 0,
            position_seconds: 0.0,
            quiz_unlocked: false,
            completed: false,
            quiz_score: None,
        }
    }

    pub fn resume(thresholds: Thresholds, has_quiz: bool, row: &TrainingProgress) -> Self {
        let mut tracker = Self::new(thresholds, has_quiz);
        tracker.watched = row.watched_percentage.clamp(0, 100) as u8;
        tracker.position_seconds = row.last_position_seconds.max(0.0);
        tracker.quiz_unlocked =
            tracker.watched >= thresholds.unlock_percent || row.quiz_completed || row.completed;
        tracker.completed = row.completed;
        tracker.quiz_score = row.quiz_score.map(|s| s.clamp(0, 100) as u8);
        tracker
    }

    pub fn watched(&self) -> u8 {
        self.watched
    }

    pub fn position_seconds(&self) -> f64 {
        self.position_seconds
    }

    pub fn is_quiz_unlocked(&self) -> bool {
        self.quiz_unlocked
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn has_quiz(&self) -> bool {
        self.has_quiz
    }

    /// A quiz added mid-session stops plain watching from completing the video.
    pub fn set_has_quiz(&mut self, has_quiz: bool) {
        self.has_quiz = has_quiz;
    }

    pub fn quiz_score(&self) -> Option<u8> {
        self.quiz_score
    }

    pub fn stage(&self) -> ProgressStage {
        if self.completed {
            ProgressStage::Completed
        } else if self.quiz_unlocked {
            ProgressStage::QuizUnlockable
        } else {
            ProgressStage::Watching
        }
    }

    /// Feeds one player time-update. Unlock is reported before completion
    /// when both fire in the same update.
    pub fn observe(&mut self, percentage: u8, position_seconds: f64) -> Vec<ProgressTransition> {
        let mut fired = Vec::new();
        self.watched = self.watched.max(percentage.min(100));
        if position_seconds.is_finite() && position_seconds >= 0.0 {
            self.position_seconds = position_seconds;
        }

        if !self.quiz_unlocked && self.watched >= self.thresholds.unlock_percent {
            self.quiz_unlocked = true;
            fired.push(ProgressTransition::QuizUnlocked);
        }
        if !self.completed && !self.has_quiz && self.watched >= self.thresholds.complete_percent {
            self.completed = true;
            fired.push(ProgressTransition::Completed);
        }
        fired
    }

    /// Records a graded attempt. Completion fires on the first passing attempt.
    pub fn record_quiz(&mut self, score: u8, passing_score: u8) -> QuizOutcome {
        let passed = score >= passing_score;
        self.quiz_score = Some(score);
        let mut transitions = Vec::new();
        if passed && !self.completed {
            self.completed = true;
            transitions.push(ProgressTransition::Completed);
        }
        QuizOutcome {
            score,
            passed,
            transitions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn count(events: &[Vec<ProgressTransition>], wanted: ProgressTransition) -> usize {
        events.iter().flatten().filter(|t| **t == wanted).count()
    }

    #[test]
    fn clamps_player_percentages() {
        assert_eq!(clamp_percentage(-3.0), 0);
        assert_eq!(clamp_percentage(f64::NAN), 0);
        assert_eq!(clamp_percentage(94.9), 94);
        assert_eq!(clamp_percentage(250.0), 100);
    }

    #[test]
    fn unlock_and_completion_fire_once_each() {
        let mut tracker = ProgressTracker::new(Thresholds::default(), false);
        let events: Vec<Vec<ProgressTransition>> = [10, 30, 52, 96]
            .into_iter()
            .map(|p| tracker.observe(p, p as f64))
            .collect();

        assert!(events[0].is_empty());
        assert!(events[1].is_empty());
        assert_eq!(events[2], vec![ProgressTransition::QuizUnlocked]);
        assert_eq!(events[3], vec![ProgressTransition::Completed]);
        assert_eq!(count(&events, ProgressTransition::QuizUnlocked), 1);
        assert_eq!(count(&events, ProgressTransition::Completed), 1);

        assert!(tracker.observe(100, 100.0).is_empty());
        assert_eq!(tracker.stage(), ProgressStage::Completed);
    }

    #[test]
    fn jump_to_end_fires_both_in_order() {
        let mut tracker = ProgressTracker::new(Thresholds::default(), false);
        assert_eq!(
            tracker.observe(100, 600.0),
            vec![ProgressTransition::QuizUnlocked, ProgressTransition::Completed]
        );
    }

    #[test]
    fn quiz_videos_complete_only_on_pass() {
        let mut tracker = ProgressTracker::new(Thresholds::default(), true);
        assert_eq!(tracker.observe(100, 600.0), vec![ProgressTransition::QuizUnlocked]);
        assert_eq!(tracker.stage(), ProgressStage::QuizUnlockable);

        let failed = tracker.record_quiz(60, 70);
        assert!(!failed.passed);
        assert!(failed.transitions.is_empty());
        assert!(!tracker.is_completed());

        let passed = tracker.record_quiz(80, 70);
        assert!(passed.passed);
        assert_eq!(passed.transitions, vec![ProgressTransition::Completed]);

        let again = tracker.record_quiz(100, 70);
        assert!(again.transitions.is_empty());
        assert_eq!(tracker.quiz_score(), Some(100));
    }

    #[test]
    fn watched_is_a_high_water_mark() {
        let mut tracker = ProgressTracker::new(Thresholds::default(), true);
        tracker.observe(40, 240.0);
        tracker.observe(10, 60.0);
        assert_eq!(tracker.watched(), 40);
        assert_eq!(tracker.position_seconds(), 60.0);
    }

    #[test]
    fn resumed_tracker_does_not_refire() {
        let mut row = TrainingProgress::new(Uuid::new_v4(), Uuid::new_v4());
        row.watched_percentage = 70;
        let mut tracker = ProgressTracker::resume(Thresholds::default(), true, &row);
        assert!(tracker.is_quiz_unlocked());
        assert!(tracker.observe(75, 10.0).is_empty());

        row.completed = true;
        row.watched_percentage = 96;
        let mut done = ProgressTracker::resume(Thresholds::default(), false, &row);
        assert!(done.observe(100, 10.0).is_empty());
    }
}
