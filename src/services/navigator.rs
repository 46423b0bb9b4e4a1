use std::collections::HashMap;

use uuid::Uuid;

use crate::models::answer::AnswerValue;
use crate::models::question::SessionQuestion;

/// Local answer buffer plus a cursor over the issued question sequence.
/// Writes are synchronous and last-write-wins per question; the remote
/// forward happens upstream and never rolls the buffer back.
#[derive(Debug, Default)]
pub struct AnswerNavigator {
    questions: Vec<SessionQuestion>,
    answers: HashMap<Uuid, AnswerValue>,
    cursor: usize,
}

impl AnswerNavigator {
    pub fn new(questions: Vec<SessionQuestion>) -> Self {
        Self {
            questions,
            answers: HashMap::new(),
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&SessionQuestion> {
        self.questions.get(self.cursor)
    }

    pub fn answer_for(&self, question_id: Uuid) -> Option<&AnswerValue> {
        self.answers.get(&question_id)
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub fn record(&mut self, question_id: Uuid, value: AnswerValue) {
        self.answers.insert(question_id, value);
    }

    /// Move the cursor to the question the server picked next. Ids outside
    /// the issued sequence are ignored; the client cannot render a question
    /// it was never given.
    pub fn apply_adaptive_jump(&mut self, next_question_id: Uuid) -> bool {
        match self.questions.iter().position(|q| q.id == next_question_id) {
            Some(idx) if idx != self.cursor => {
                self.cursor = idx;
                true
            }
            _ => false,
        }
    }

    /// Safe at the upper boundary; the move is simply refused.
    pub fn next(&mut self) -> bool {
        if self.cursor + 1 < self.questions.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    pub fn previous(&mut self) -> bool {
        if self.cursor > 0 {
            self.cursor -= 1;
            true
        } else {
            false
        }
    }
}
