use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::question::SessionQuestion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    Started,
    Completed,
    Timeout,
}

/// One student's run at one exam, as served by the attempt service. While the
/// status is STARTED the service keeps rewriting `seconds_remaining` and
/// `violation_count`; after finalization the record is immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub exam: Uuid,
    pub exam_title: String,
    pub start_time: DateTime<Utc>,
    pub finish_time: Option<DateTime<Utc>>,
    pub status: AttemptStatus,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub questions: Option<Vec<SessionQuestion>>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub seconds_remaining: Option<u64>,
    #[serde(default)]
    pub violation_count: u32,
}

impl Attempt {
    pub fn is_started(&self) -> bool {
        self.status == AttemptStatus::Started
    }
}
