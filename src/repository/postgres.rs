// src/repository/postgres.rs

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        exam::Exam,
        exam_session::{ExamSession, NewExamSession, SessionRotation},
        problem::{Language, Problem, TestCase},
        submission::{GradingResult, NewSubmission, Submission, SubmissionStatus},
    },
};

use super::{
    ClassRepository, ExamRepository, LanguageRepository, ProblemRepository, SessionRepository,
    SubmissionRepository,
};

const SESSION_COLUMNS: &str = "id, user_id, exam_id, session_token, ip, user_agent, device, \
     status, created_at, updated_at, finished_at";

const SUBMISSION_COLUMNS: &str = "id, user_id, exam_id, problem_id, language_id, source_code, \
     submitted_at, batch_tokens, status, time, memory";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn list_submissions_where(
        &self,
        filter: &str,
        binds: &[i64],
    ) -> Result<Vec<Submission>, AppError> {
        let sql = format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE {filter} ORDER BY submitted_at DESC, id DESC"
        );
        let mut query = sqlx::query_as::<_, Submission>(&sql);
        for value in binds {
            query = query.bind(*value);
        }
        query.fetch_all(&self.pool).await.map_err(|e| {
            tracing::error!("Failed to list submissions ({}): {:?}", filter, e);
            AppError::from(e)
        })
    }
}

#[async_trait]
impl ExamRepository for PgStore {
    async fn find_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError> {
        let exam = sqlx::query_as::<_, Exam>(
            r#"
            SELECT id, class_id, title, start_time, duration_minutes,
                   restricted, browser_key, config_key, quit_url
            FROM exams
            WHERE id = $1
            "#,
        )
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(exam)
    }
}

#[async_trait]
impl ClassRepository for PgStore {
    async fn is_member(&self, class_id: i64, user_id: i64) -> Result<bool, AppError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT user_id FROM class_members WHERE class_id = $1 AND user_id = $2",
        )
        .bind(class_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn insert_session_if_absent(
        &self,
        new: NewExamSession,
    ) -> Result<Option<ExamSession>, AppError> {
        // The (user_id, exam_id) unique index settles concurrent first admissions.
        let sql = format!(
            r#"
            INSERT INTO exam_sessions (user_id, exam_id, session_token, ip, user_agent, device, status)
            VALUES ($1, $2, $3, $4, $5, $6, 0)
            ON CONFLICT (user_id, exam_id) DO NOTHING
            RETURNING {SESSION_COLUMNS}
            "#
        );
        let session = sqlx::query_as::<_, ExamSession>(&sql)
            .bind(new.user_id)
            .bind(new.exam_id)
            .bind(&new.session_token)
            .bind(&new.ip)
            .bind(&new.user_agent)
            .bind(&new.device)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert exam session: {:?}", e);
                AppError::from(e)
            })?;

        Ok(session)
    }

    async fn find_session(
        &self,
        user_id: i64,
        exam_id: i64,
    ) -> Result<Option<ExamSession>, AppError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM exam_sessions WHERE user_id = $1 AND exam_id = $2"
        );
        let session = sqlx::query_as::<_, ExamSession>(&sql)
            .bind(user_id)
            .bind(exam_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }

    async fn find_session_by_token(&self, token: &str) -> Result<Option<ExamSession>, AppError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM exam_sessions WHERE session_token = $1");
        let session = sqlx::query_as::<_, ExamSession>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }

    async fn rotate_session(
        &self,
        id: i64,
        rotation: SessionRotation,
    ) -> Result<Option<ExamSession>, AppError> {
        let sql = format!(
            r#"
            UPDATE exam_sessions
            SET session_token = $1, ip = $2, user_agent = $3, device = $4, updated_at = NOW()
            WHERE id = $5 AND status = 0
            RETURNING {SESSION_COLUMNS}
            "#
        );
        let session = sqlx::query_as::<_, ExamSession>(&sql)
            .bind(&rotation.session_token)
            .bind(&rotation.ip)
            .bind(&rotation.user_agent)
            .bind(&rotation.device)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to rotate exam session {}: {:?}", id, e);
                AppError::from(e)
            })?;

        Ok(session)
    }

    async fn finish_session(&self, id: i64) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE exam_sessions
            SET status = 1, finished_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 0
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_sessions_by_exam(&self, exam_id: i64) -> Result<Vec<ExamSession>, AppError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM exam_sessions WHERE exam_id = $1 ORDER BY created_at"
        );
        let sessions = sqlx::query_as::<_, ExamSession>(&sql)
            .bind(exam_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(sessions)
    }

    async fn delete_session(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM exam_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ProblemRepository for PgStore {
    async fn find_problem(&self, problem_id: i64) -> Result<Option<Problem>, AppError> {
        let problem = sqlx::query_as::<_, Problem>(
            "SELECT id, exam_id, title, cpu_time_limit, memory_limit FROM problems WHERE id = $1",
        )
        .bind(problem_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(problem)
    }

    async fn list_test_cases(&self, problem_id: i64) -> Result<Vec<TestCase>, AppError> {
        let cases = sqlx::query_as::<_, TestCase>(
            "SELECT id, problem_id, input, output FROM test_cases WHERE problem_id = $1 ORDER BY id",
        )
        .bind(problem_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(cases)
    }

    async fn count_problems_in_exam(&self, exam_id: i64) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM problems WHERE exam_id = $1")
            .bind(exam_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl LanguageRepository for PgStore {
    async fn find_language(&self, language_id: i64) -> Result<Option<Language>, AppError> {
        let language = sqlx::query_as::<_, Language>(
            "SELECT id, name, judge_language_id FROM languages WHERE id = $1",
        )
        .bind(language_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(language)
    }
}

#[async_trait]
impl SubmissionRepository for PgStore {
    async fn create_submission(&self, new: NewSubmission) -> Result<Submission, AppError> {
        let sql = format!(
            r#"
            INSERT INTO submissions
                (user_id, exam_id, problem_id, language_id, source_code, batch_tokens, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {SUBMISSION_COLUMNS}
            "#
        );
        let submission = sqlx::query_as::<_, Submission>(&sql)
            .bind(new.user_id)
            .bind(new.exam_id)
            .bind(new.problem_id)
            .bind(new.language_id)
            .bind(&new.source_code)
            .bind(new.batch_tokens.join())
            .bind(SubmissionStatus::Pending)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert submission: {:?}", e);
                AppError::from(e)
            })?;

        Ok(submission)
    }

    async fn find_submission(&self, id: i64) -> Result<Option<Submission>, AppError> {
        let sql = format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = $1");
        let submission = sqlx::query_as::<_, Submission>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(submission)
    }

    async fn list_submissions_by_exam(&self, exam_id: i64) -> Result<Vec<Submission>, AppError> {
        self.list_submissions_where("exam_id = $1", &[exam_id]).await
    }

    async fn list_submissions_by_exam_and_user(
        &self,
        exam_id: i64,
        user_id: i64,
    ) -> Result<Vec<Submission>, AppError> {
        self.list_submissions_where("exam_id = $1 AND user_id = $2", &[exam_id, user_id])
            .await
    }

    async fn list_submissions_by_problem(
        &self,
        problem_id: i64,
    ) -> Result<Vec<Submission>, AppError> {
        self.list_submissions_where("problem_id = $1", &[problem_id]).await
    }

    async fn list_submissions_by_user(&self, user_id: i64) -> Result<Vec<Submission>, AppError> {
        self.list_submissions_where("user_id = $1", &[user_id]).await
    }

    async fn list_pending_submissions(&self) -> Result<Vec<Submission>, AppError> {
        let sql = format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE status = $1 ORDER BY id"
        );
        let submissions = sqlx::query_as::<_, Submission>(&sql)
            .bind(SubmissionStatus::Pending)
            .fetch_all(&self.pool)
            .await?;

        Ok(submissions)
    }

    async fn record_result(&self, id: i64, result: &GradingResult) -> Result<bool, AppError> {
        let outcome = sqlx::query(
            r#"
            UPDATE submissions
            SET status = $1, time = $2, memory = $3
            WHERE id = $4 AND status = $5
            "#,
        )
        .bind(result.status)
        .bind(&result.time)
        .bind(result.memory)
        .bind(id)
        .bind(SubmissionStatus::Pending)
        .execute(&self.pool)
        .await?;

        Ok(outcome.rows_affected() > 0)
    }
}
