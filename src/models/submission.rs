// src/models/submission.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::AppError;

/// Grading status of a submission. Stored as INTEGER with these exact codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[repr(i32)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending = 1,
    Accepted = 2,
    WrongAnswer = 3,
    CompileError = 4,
    RuntimeError = 5,
    TimeLimitExceeded = 6,
    InternalError = 8,
}

impl SubmissionStatus {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_terminal(self) -> bool {
        self != SubmissionStatus::Pending
    }
}

/// Ordered list of opaque judge tokens, one per test case.
///
/// Persisted as a single column with tokens joined by [`BatchTokens::SEPARATOR`].
/// Tokens are never empty and never contain the separator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchTokens(Vec<String>);

impl BatchTokens {
    pub const SEPARATOR: char = ',';

    pub fn new(tokens: Vec<String>) -> Result<Self, AppError> {
        if let Some(bad) = tokens
            .iter()
            .find(|t| t.is_empty() || t.contains(Self::SEPARATOR))
        {
            return Err(AppError::UpstreamJudgeError(format!(
                "Judge returned an unusable token: {:?}",
                bad
            )));
        }
        Ok(Self(tokens))
    }

    pub fn parse(joined: &str) -> Result<Self, AppError> {
        if joined.is_empty() {
            return Ok(Self(Vec::new()));
        }
        let tokens = joined
            .split(Self::SEPARATOR)
            .map(str::to_string)
            .collect::<Vec<_>>();
        Self::new(tokens).map_err(|_| {
            AppError::InternalServerError(format!("Malformed stored batch tokens: {:?}", joined))
        })
    }

    pub fn join(&self) -> String {
        self.0.join(&Self::SEPARATOR.to_string())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Represents the 'submissions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub user_id: i64,
    pub exam_id: i64,
    pub problem_id: i64,
    pub language_id: i64,

    /// Source code, base64-encoded exactly as sent to the judge.
    pub source_code: String,

    pub submitted_at: DateTime<Utc>,

    /// Judge tokens joined by [`BatchTokens::SEPARATOR`], exactly as stored.
    /// Parsed per submission through [`Submission::tokens`].
    pub batch_tokens: String,

    pub status: SubmissionStatus,

    /// Maximum elapsed time across test cases, two decimals. Set once terminal.
    pub time: Option<String>,

    /// Maximum memory (KiB) across test cases. Set once terminal.
    pub memory: Option<i64>,
}

impl Submission {
    pub fn tokens(&self) -> Result<BatchTokens, AppError> {
        BatchTokens::parse(&self.batch_tokens)
    }
}

/// Insert payload for a new submission. Always starts pending.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub user_id: i64,
    pub exam_id: i64,
    pub problem_id: i64,
    pub language_id: i64,
    pub source_code: String,
    pub batch_tokens: BatchTokens,
}

/// Terminal grading outcome written back by the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub struct GradingResult {
    pub status: SubmissionStatus,
    pub time: String,
    pub memory: i64,
}

/// DTO for submitting code against a problem.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitCodeRequest {
    pub problem_id: i64,
    pub language_id: i64,
    #[validate(length(min = 1, max = 65536, message = "Source code must be between 1 and 65536 bytes."))]
    pub source_code: String,
}

/// DTO for a scratch run. Nothing is persisted.
#[derive(Debug, Deserialize, Validate)]
pub struct RunCodeRequest {
    pub language_id: i64,
    #[validate(length(min = 1, max = 65536, message = "Source code must be between 1 and 65536 bytes."))]
    pub source_code: String,
    #[validate(length(max = 65536))]
    #[serde(default)]
    pub stdin: String,
}

/// DTO returned right after dispatch.
#[derive(Debug, Serialize)]
pub struct SubmissionCreated {
    pub id: i64,
    pub status: SubmissionStatus,
    pub status_code: i32,
    pub test_cases: usize,
}

/// Read view of a submission, without the source code.
#[derive(Debug, Serialize)]
pub struct SubmissionView {
    pub id: i64,
    pub user_id: i64,
    pub exam_id: i64,
    pub problem_id: i64,
    pub language_id: i64,
    pub submitted_at: DateTime<Utc>,
    pub status: SubmissionStatus,
    pub status_code: i32,
    pub time: Option<String>,
    pub memory: Option<i64>,
}

impl From<Submission> for SubmissionView {
    fn from(s: Submission) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            exam_id: s.exam_id,
            problem_id: s.problem_id,
            language_id: s.language_id,
            submitted_at: s.submitted_at,
            status: s.status,
            status_code: s.status.code(),
            time: s.time,
            memory: s.memory,
        }
    }
}

/// Correctness figures for one student in one exam.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamUserStats {
    pub user_id: i64,
    pub solved: i64,
    pub total: i64,
}

/// DTO returned by the exam results endpoint.
#[derive(Debug, Serialize)]
pub struct ExamResultsResponse {
    pub exam_id: i64,
    pub submissions: Vec<SubmissionView>,
    pub statistics: Vec<ExamUserStats>,
}
