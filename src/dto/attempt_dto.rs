use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::attempt::AttemptStatus;
use crate::models::question::QuestionType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_choice_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_text: Option<String>,
}

/// On adaptive exams the service may pick the question the student should
/// see next; absent otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerResponse {
    #[serde(default)]
    pub next_question_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ViolationOutcome {
    pub count: u32,
    pub terminated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptReview {
    pub id: Uuid,
    pub exam: Uuid,
    pub exam_title: String,
    pub start_time: DateTime<Utc>,
    pub finish_time: Option<DateTime<Utc>>,
    pub status: AttemptStatus,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub violation_count: u32,
    #[serde(default)]
    pub answers: Vec<ReviewAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewAnswer {
    pub question: ReviewQuestion,
    #[serde(default)]
    pub selected_choice_id: Option<Uuid>,
    #[serde(default)]
    pub answer_text: Option<String>,
    #[serde(default)]
    pub feedback: Option<String>,
    pub is_correct: bool,
    pub marks_awarded: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewQuestion {
    pub id: Uuid,
    pub title: String,
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub choices: Vec<ReviewChoice>,
}

/// Unlike the session view, the review projection does expose correctness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewChoice {
    pub id: Uuid,
    pub text: String,
    pub is_correct: bool,
}
