// src/judge/mod.rs

//! Client side of the remote code-execution judge.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use serde::Serialize;

use crate::error::AppError;

pub mod judge0;
pub mod status;

pub use status::{JudgeStatus, Verdict};

/// One graded run: a test case with limits.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub language_id: i32,
    pub source_code: String,
    pub stdin: String,
    pub expected_output: String,
    pub cpu_time_limit: f64,
    pub cpu_extra_time: f64,
    pub wall_time_limit: f64,
    /// KiB
    pub memory_limit: i64,
}

/// A scratch run with no expected output.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub language_id: i32,
    pub source_code: String,
    pub stdin: String,
}

/// Result of a single run, as fetched from the judge.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseResult {
    pub token: String,
    pub status_id: i32,
    pub status_description: String,
    /// Elapsed seconds as reported by the judge, unparsed.
    pub time: Option<String>,
    /// KiB
    pub memory: Option<i64>,
}

impl CaseResult {
    pub fn status(&self) -> JudgeStatus {
        JudgeStatus::from_id(self.status_id)
    }
}

/// Immediate outcome of a scratch run, decoded.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub token: String,
    pub status_id: i32,
    pub status_description: String,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub compile_output: Option<String>,
    pub time: Option<String>,
    pub memory: Option<i64>,
}

#[async_trait]
pub trait JudgeClient: Send + Sync {
    /// Runs one program and waits for its result.
    async fn submit_one(&self, request: RunRequest) -> Result<RunOutcome, AppError>;

    /// Queues every item; returns one token per item, in order.
    async fn submit_batch(&self, items: Vec<BatchItem>) -> Result<Vec<String>, AppError>;

    /// Fetches the current result of every token, in order.
    async fn fetch_batch(&self, tokens: &[String]) -> Result<Vec<CaseResult>, AppError>;
}

/// Base64 transport encoding used for every text field on the wire.
pub fn encode_text(text: &str) -> String {
    general_purpose::STANDARD.encode(text.as_bytes())
}

/// Inverse of [`encode_text`]. Judge output may contain MIME line breaks.
pub fn decode_text(encoded: &str) -> Result<String, AppError> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| AppError::UpstreamJudgeError(format!("Invalid base64 from judge: {}", e)))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_text() {
        assert_eq!(encode_text("1 2\n"), "MSAyCg==");
    }

    #[test]
    fn test_decode_tolerates_line_breaks() {
        let decoded = decode_text("aGVsbG8g\nd29ybGQ=\n").unwrap();
        assert_eq!(decoded, "hello world");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_text("!!not base64!!"),
            Err(AppError::UpstreamJudgeError(_))
        ));
    }
}
