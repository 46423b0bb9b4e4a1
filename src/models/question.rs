use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "MCQ")]
    MultipleChoice,
    #[serde(rename = "TF")]
    TrueFalse,
    #[serde(rename = "DESCRIPTIVE")]
    Descriptive,
}

impl QuestionType {
    pub fn has_choices(&self) -> bool {
        !matches!(self, QuestionType::Descriptive)
    }
}

/// Student-facing projection of a question during an attempt. Correctness
/// never crosses the wire in this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionQuestion {
    pub id: Uuid,
    pub title: String,
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub id: Uuid,
    pub text: String,
}
