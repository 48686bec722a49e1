// src/repository/memory.rs

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    error::AppError,
    models::{
        exam::Exam,
        exam_session::{ExamSession, NewExamSession, SessionRotation, SessionStatus},
        problem::{Language, Problem, TestCase},
        submission::{GradingResult, NewSubmission, Submission, SubmissionStatus},
    },
};

use super::{
    ClassRepository, ExamRepository, LanguageRepository, ProblemRepository, SessionRepository,
    SubmissionRepository,
};

#[derive(Default)]
struct Inner {
    exams: HashMap<i64, Exam>,
    members: HashSet<(i64, i64)>,
    problems: HashMap<i64, Problem>,
    test_cases: Vec<TestCase>,
    languages: HashMap<i64, Language>,
    sessions: Vec<ExamSession>,
    submissions: Vec<Submission>,
    next_session_id: i64,
    next_submission_id: i64,
}

/// In-process store with the same semantics as the PostgreSQL one,
/// including the (user, exam) uniqueness of sessions.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_exam(&self, exam: Exam) {
        self.lock().exams.insert(exam.id, exam);
    }

    pub fn add_member(&self, class_id: i64, user_id: i64) {
        self.lock().members.insert((class_id, user_id));
    }

    pub fn insert_problem(&self, problem: Problem) {
        self.lock().problems.insert(problem.id, problem);
    }

    pub fn insert_test_case(&self, test_case: TestCase) {
        self.lock().test_cases.push(test_case);
    }

    pub fn insert_language(&self, language: Language) {
        self.lock().languages.insert(language.id, language);
    }

    /// Stores a submission row as given, bypassing token validation.
    pub fn insert_submission(&self, submission: Submission) {
        let mut inner = self.lock();
        inner.next_submission_id = inner.next_submission_id.max(submission.id);
        inner.submissions.push(submission);
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    fn filter_submissions<F>(&self, predicate: F) -> Vec<Submission>
    where
        F: Fn(&Submission) -> bool,
    {
        let mut list: Vec<Submission> = self
            .lock()
            .submissions
            .iter()
            .filter(|s| predicate(s))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at).then(b.id.cmp(&a.id)));
        list
    }
}

#[async_trait]
impl ExamRepository for MemoryStore {
    async fn find_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError> {
        Ok(self.lock().exams.get(&exam_id).cloned())
    }
}

#[async_trait]
impl ClassRepository for MemoryStore {
    async fn is_member(&self, class_id: i64, user_id: i64) -> Result<bool, AppError> {
        Ok(self.lock().members.contains(&(class_id, user_id)))
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn insert_session_if_absent(
        &self,
        new: NewExamSession,
    ) -> Result<Option<ExamSession>, AppError> {
        let mut inner = self.lock();
        if inner
            .sessions
            .iter()
            .any(|s| s.user_id == new.user_id && s.exam_id == new.exam_id)
        {
            return Ok(None);
        }

        inner.next_session_id += 1;
        let now = Utc::now();
        let session = ExamSession {
            id: inner.next_session_id,
            user_id: new.user_id,
            exam_id: new.exam_id,
            session_token: new.session_token,
            ip: new.ip,
            user_agent: new.user_agent,
            device: new.device,
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
            finished_at: None,
        };
        inner.sessions.push(session.clone());
        Ok(Some(session))
    }

    async fn find_session(
        &self,
        user_id: i64,
        exam_id: i64,
    ) -> Result<Option<ExamSession>, AppError> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .find(|s| s.user_id == user_id && s.exam_id == exam_id)
            .cloned())
    }

    async fn find_session_by_token(&self, token: &str) -> Result<Option<ExamSession>, AppError> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .find(|s| s.session_token == token)
            .cloned())
    }

    async fn rotate_session(
        &self,
        id: i64,
        rotation: SessionRotation,
    ) -> Result<Option<ExamSession>, AppError> {
        let mut inner = self.lock();
        let Some(session) = inner
            .sessions
            .iter_mut()
            .find(|s| s.id == id && s.status == SessionStatus::Active)
        else {
            return Ok(None);
        };

        session.session_token = rotation.session_token;
        session.ip = rotation.ip;
        session.user_agent = rotation.user_agent;
        session.device = rotation.device;
        session.updated_at = Utc::now();
        Ok(Some(session.clone()))
    }

    async fn finish_session(&self, id: i64) -> Result<(), AppError> {
        let mut inner = self.lock();
        if let Some(session) = inner
            .sessions
            .iter_mut()
            .find(|s| s.id == id && s.status == SessionStatus::Active)
        {
            let now = Utc::now();
            session.status = SessionStatus::Finished;
            session.finished_at = Some(now);
            session.updated_at = now;
        }
        Ok(())
    }

    async fn list_sessions_by_exam(&self, exam_id: i64) -> Result<Vec<ExamSession>, AppError> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .filter(|s| s.exam_id == exam_id)
            .cloned()
            .collect())
    }

    async fn delete_session(&self, id: i64) -> Result<bool, AppError> {
        let mut inner = self.lock();
        let before = inner.sessions.len();
        inner.sessions.retain(|s| s.id != id);
        Ok(inner.sessions.len() != before)
    }
}

#[async_trait]
impl ProblemRepository for MemoryStore {
    async fn find_problem(&self, problem_id: i64) -> Result<Option<Problem>, AppError> {
        Ok(self.lock().problems.get(&problem_id).cloned())
    }

    async fn list_test_cases(&self, problem_id: i64) -> Result<Vec<TestCase>, AppError> {
        let mut cases: Vec<TestCase> = self
            .lock()
            .test_cases
            .iter()
            .filter(|t| t.problem_id == problem_id)
            .cloned()
            .collect();
        cases.sort_by_key(|t| t.id);
        Ok(cases)
    }

    async fn count_problems_in_exam(&self, exam_id: i64) -> Result<i64, AppError> {
        Ok(self
            .lock()
            .problems
            .values()
            .filter(|p| p.exam_id == exam_id)
            .count() as i64)
    }
}

#[async_trait]
impl LanguageRepository for MemoryStore {
    async fn find_language(&self, language_id: i64) -> Result<Option<Language>, AppError> {
        Ok(self.lock().languages.get(&language_id).cloned())
    }
}

#[async_trait]
impl SubmissionRepository for MemoryStore {
    async fn create_submission(&self, new: NewSubmission) -> Result<Submission, AppError> {
        let mut inner = self.lock();
        inner.next_submission_id += 1;
        let submission = Submission {
            id: inner.next_submission_id,
            user_id: new.user_id,
            exam_id: new.exam_id,
            problem_id: new.problem_id,
            language_id: new.language_id,
            source_code: new.source_code,
            submitted_at: Utc::now(),
            batch_tokens: new.batch_tokens.join(),
            status: SubmissionStatus::Pending,
            time: None,
            memory: None,
        };
        inner.submissions.push(submission.clone());
        Ok(submission)
    }

    async fn find_submission(&self, id: i64) -> Result<Option<Submission>, AppError> {
        Ok(self.lock().submissions.iter().find(|s| s.id == id).cloned())
    }

    async fn list_submissions_by_exam(&self, exam_id: i64) -> Result<Vec<Submission>, AppError> {
        Ok(self.filter_submissions(|s| s.exam_id == exam_id))
    }

    async fn list_submissions_by_exam_and_user(
        &self,
        exam_id: i64,
        user_id: i64,
    ) -> Result<Vec<Submission>, AppError> {
        Ok(self.filter_submissions(|s| s.exam_id == exam_id && s.user_id == user_id))
    }

    async fn list_submissions_by_problem(
        &self,
        problem_id: i64,
    ) -> Result<Vec<Submission>, AppError> {
        Ok(self.filter_submissions(|s| s.problem_id == problem_id))
    }

    async fn list_submissions_by_user(&self, user_id: i64) -> Result<Vec<Submission>, AppError> {
        Ok(self.filter_submissions(|s| s.user_id == user_id))
    }

    async fn list_pending_submissions(&self) -> Result<Vec<Submission>, AppError> {
        let mut pending = self.filter_submissions(|s| s.status == SubmissionStatus::Pending);
        pending.sort_by_key(|s| s.id);
        Ok(pending)
    }

    async fn record_result(&self, id: i64, result: &GradingResult) -> Result<bool, AppError> {
        let mut inner = self.lock();
        let Some(submission) = inner
            .submissions
            .iter_mut()
            .find(|s| s.id == id && s.status == SubmissionStatus::Pending)
        else {
            return Ok(false);
        };

        submission.status = result.status;
        submission.time = Some(result.time.clone());
        submission.memory = Some(result.memory);
        Ok(true)
    }
}
