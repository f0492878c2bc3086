use crate::domain::models::QuizQuestion;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("quiz has no questions")]
    Empty,
    #[error("expected {expected} answers, got {got}")]
    AnswerCount { expected: usize, got: usize },
    #[error("question {index} has no option {option}")]
    InvalidOption { index: usize, option: usize },
    #[error("question {index} has a correct option outside its options")]
    MalformedQuestion { index: usize },
}

/// Question as shown to the learner, without the answer key.
#[derive(Debug, Clone, Serialize)]
pub struct QuizQuestionView {
    pub index: usize,
    pub prompt: String,
    pub options: Vec<String>,
}

pub fn public_view(questions: &[QuizQuestion]) -> Vec<QuizQuestionView> {
    questions
        .iter()
        .enumerate()
        .map(|(index, q)| QuizQuestionView {
            index,
            prompt: q.prompt.clone(),
            options: q.options.clone(),
        })
        .collect()
}

/// Rejects quizzes an admin could save but no learner could pass.
pub fn validate_questions(questions: &[QuizQuestion]) -> Result<(), QuizError> {
    if questions.is_empty() {
        return Err(QuizError::Empty);
    }
    for (index, q) in questions.iter().enumerate() {
        if q.options.len() < 2 || q.correct_option >= q.options.len() {
            return Err(QuizError::MalformedQuestion { index });
        }
    }
    Ok(())
}

/// Percentage of correct answers, rounded to the nearest integer.
pub fn score_answers(questions: &[QuizQuestion], answers: &[usize]) -> Result<u8, QuizError> {
    if questions.is_empty() {
        return Err(QuizError::Empty);
    }
    if answers.len() != questions.len() {
        return Err(QuizError::AnswerCount {
            expected: questions.len(),
            got: answers.len(),
        });
    }

    let mut correct = 0usize;
    for (index, (question, &answer)) in questions.iter().zip(answers).enumerate() {
        if answer >= question.options.len() {
            return Err(QuizError::InvalidOption { index, option: answer });
        }
        if answer == question.correct_option {
            correct += 1;
        }
    }

    let score = (correct as f64 * 100.0 / questions.len() as f64).round();
    Ok(score as u8)
}
