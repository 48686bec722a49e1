// src/models/exam_session.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle state of an exam session. Stored as INTEGER.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i32)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active = 0,
    Finished = 1,
}

/// Represents the 'exam_sessions' table in the database.
/// At most one row exists per (user_id, exam_id).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamSession {
    pub id: i64,
    pub user_id: i64,
    pub exam_id: i64,

    /// Possession-based capability. Re-validated against storage on every access.
    #[serde(skip_serializing)]
    pub session_token: String,

    pub ip: String,
    pub user_agent: String,

    /// Device category derived from the user-agent.
    pub device: String,

    pub status: SessionStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExamSession {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// Insert payload for a fresh session row.
#[derive(Debug, Clone)]
pub struct NewExamSession {
    pub user_id: i64,
    pub exam_id: i64,
    pub session_token: String,
    pub ip: String,
    pub user_agent: String,
    pub device: String,
}

/// Fields rewritten when a new client instance takes over an active session.
#[derive(Debug, Clone)]
pub struct SessionRotation {
    pub session_token: String,
    pub ip: String,
    pub user_agent: String,
    pub device: String,
}

/// Public view of a session, safe to return to the student.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: i64,
    pub exam_id: i64,
    pub device: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&ExamSession> for SessionView {
    fn from(s: &ExamSession) -> Self {
        Self {
            id: s.id,
            exam_id: s.exam_id,
            device: s.device.clone(),
            status: s.status,
            created_at: s.created_at,
            updated_at: s.updated_at,
            finished_at: s.finished_at,
        }
    }
}

/// DTO returned by the start-session endpoint.
#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session: SessionView,
    pub session_token: String,
    pub remaining_seconds: i64,
    pub quit_url: Option<String>,
}

/// DTO returned by the exam access check endpoint.
#[derive(Debug, Serialize)]
pub struct ExamAccessResponse {
    pub exam_id: i64,
    pub remaining_seconds: i64,
}

/// DTO returned by the problem access check endpoint.
#[derive(Debug, Serialize)]
pub struct ProblemAccessResponse {
    pub exam_id: i64,
    pub session_id: i64,
    pub remaining_seconds: i64,
}
