// src/models/exam.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'exams' table in the database.
/// Owned by the administration side; this service only reads it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,

    /// Class whose members may sit the exam.
    pub class_id: i64,

    pub title: String,

    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,

    /// Whether the exam must be taken inside the locked exam browser.
    pub restricted: bool,

    /// Browser exam key, hashed with the request URL by the locked browser.
    #[serde(skip_serializing)]
    pub browser_key: Option<String>,

    /// Config key, hashed the same way but sent in a separate header.
    #[serde(skip_serializing)]
    pub config_key: Option<String>,

    /// URL the locked browser opens to quit once the exam is over.
    pub quit_url: Option<String>,
}

impl Exam {
    /// `None` when the duration does not fit the calendar; such an exam is
    /// never active.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        Duration::try_minutes(self.duration_minutes)
            .and_then(|d| self.start_time.checked_add_signed(d))
    }

    /// Inclusive on both ends of the window.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match self.end_time() {
            Some(end) => now >= self.start_time && now <= end,
            None => false,
        }
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        self.end_time()
            .map(|end| (end - now).num_seconds().max(0))
            .unwrap_or(0)
    }
}
