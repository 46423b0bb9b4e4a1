use serde::Serialize;
use uuid::Uuid;

/// A locally buffered answer: the selected choice for MCQ/TF questions, free
/// text for descriptive ones. The buffer is the single source of truth for
/// what the student sees, independent of in-flight network calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Choice(Uuid),
    Text(String),
}

impl AnswerValue {
    pub fn choice_id(&self) -> Option<Uuid> {
        match self {
            AnswerValue::Choice(id) => Some(*id),
            AnswerValue::Text(_) => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(text) => Some(text),
            AnswerValue::Choice(_) => None,
        }
    }
}
