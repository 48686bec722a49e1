// src/repository/mod.rs

//! Entity repositories consumed by the exam services.
//!
//! Every method is a single-row or single-statement operation; callers never
//! hold a transaction across calls. Two implementations exist: [`postgres::PgStore`]
//! for deployments and [`memory::MemoryStore`] for tests and local runs.

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        exam::Exam,
        exam_session::{ExamSession, NewExamSession, SessionRotation},
        problem::{Language, Problem, TestCase},
        submission::{GradingResult, NewSubmission, Submission},
    },
};

pub mod memory;
pub mod postgres;

#[async_trait]
pub trait ExamRepository: Send + Sync {
    async fn find_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError>;
}

#[async_trait]
pub trait ClassRepository: Send + Sync {
    async fn is_member(&self, class_id: i64, user_id: i64) -> Result<bool, AppError>;
}

/// Persistence gateway for exam session rows.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Inserts a new session unless one already exists for (user, exam).
    /// Returns `None` when another row won the race.
    async fn insert_session_if_absent(
        &self,
        new: NewExamSession,
    ) -> Result<Option<ExamSession>, AppError>;

    async fn find_session(
        &self,
        user_id: i64,
        exam_id: i64,
    ) -> Result<Option<ExamSession>, AppError>;

    async fn find_session_by_token(&self, token: &str) -> Result<Option<ExamSession>, AppError>;

    /// Rewrites token and client metadata in place, keeping the row id.
    /// Only applies while the session is still active.
    async fn rotate_session(
        &self,
        id: i64,
        rotation: SessionRotation,
    ) -> Result<Option<ExamSession>, AppError>;

    /// Marks an active session finished. No-op on a finished one.
    async fn finish_session(&self, id: i64) -> Result<(), AppError>;

    async fn list_sessions_by_exam(&self, exam_id: i64) -> Result<Vec<ExamSession>, AppError>;

    async fn delete_session(&self, id: i64) -> Result<bool, AppError>;
}

#[async_trait]
pub trait ProblemRepository: Send + Sync {
    async fn find_problem(&self, problem_id: i64) -> Result<Option<Problem>, AppError>;

    async fn list_test_cases(&self, problem_id: i64) -> Result<Vec<TestCase>, AppError>;

    async fn count_problems_in_exam(&self, exam_id: i64) -> Result<i64, AppError>;
}

#[async_trait]
pub trait LanguageRepository: Send + Sync {
    async fn find_language(&self, language_id: i64) -> Result<Option<Language>, AppError>;
}

#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    async fn create_submission(&self, new: NewSubmission) -> Result<Submission, AppError>;

    async fn find_submission(&self, id: i64) -> Result<Option<Submission>, AppError>;

    async fn list_submissions_by_exam(&self, exam_id: i64) -> Result<Vec<Submission>, AppError>;

    async fn list_submissions_by_exam_and_user(
        &self,
        exam_id: i64,
        user_id: i64,
    ) -> Result<Vec<Submission>, AppError>;

    async fn list_submissions_by_problem(
        &self,
        problem_id: i64,
    ) -> Result<Vec<Submission>, AppError>;

    async fn list_submissions_by_user(&self, user_id: i64) -> Result<Vec<Submission>, AppError>;

    async fn list_pending_submissions(&self) -> Result<Vec<Submission>, AppError>;

    /// Writes a terminal result. Only a pending row is updated, so a status
    /// can never change once terminal. Returns whether a row was written.
    async fn record_result(&self, id: i64, result: &GradingResult) -> Result<bool, AppError>;
}

/// Everything the services need from storage.
pub trait Store:
    ExamRepository
    + ClassRepository
    + SessionRepository
    + ProblemRepository
    + LanguageRepository
    + SubmissionRepository
{
}

impl<T> Store for T where
    T: ExamRepository
        + ClassRepository
        + SessionRepository
        + ProblemRepository
        + LanguageRepository
        + SubmissionRepository
{
}
