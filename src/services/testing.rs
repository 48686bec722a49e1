// src/services/testing.rs

//! Shared fixtures for service tests.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::{
    judge::fake::FakeJudge,
    models::{
        exam::Exam,
        exam_session::NewExamSession,
        problem::{Language, Problem, TestCase},
    },
    repository::{SessionRepository, memory::MemoryStore},
    utils::{evidence::RequestEvidence, jwt::Identity, token::generate_session_token},
};

pub const EXAM: i64 = 1;
pub const CLASS: i64 = 1;
pub const PROBLEM: i64 = 10;
pub const EMPTY_PROBLEM: i64 = 11;
pub const LANGUAGE: i64 = 1;
pub const JUDGE_LANGUAGE: i32 = 71;
pub const STUDENT_ID: i64 = 7;

pub fn student() -> Identity {
    Identity::new(STUDENT_ID, "student")
}

pub fn second_student() -> Identity {
    Identity::new(8, "student")
}

pub fn admin() -> Identity {
    Identity::new(1, "admin")
}

pub fn outsider() -> Identity {
    Identity::new(99, "student")
}

pub fn evidence_with_ua(user_agent: &str) -> RequestEvidence {
    RequestEvidence {
        user_agent: user_agent.to_string(),
        url: "http://exam.local/api/exams/1/session".to_string(),
        ip: "127.0.0.1".to_string(),
        ..Default::default()
    }
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub judge: Arc<FakeJudge>,
    exam: Exam,
}

impl Fixture {
    /// Exam 1 running from ten minutes ago for an hour, students 7 and 8 and
    /// admin 1 enrolled, problem 10 with three test cases, problem 11 with none.
    pub fn new() -> Self {
        let store = MemoryStore::new();

        let exam = Exam {
            id: EXAM,
            class_id: CLASS,
            title: "Algorithms final".to_string(),
            start_time: Utc::now() - Duration::minutes(10),
            duration_minutes: 60,
            restricted: false,
            browser_key: None,
            config_key: None,
            quit_url: Some("https://exam.local/quit".to_string()),
        };
        store.insert_exam(exam.clone());
        for user in [STUDENT_ID, 8, 1] {
            store.add_member(CLASS, user);
        }

        store.insert_problem(Problem {
            id: PROBLEM,
            exam_id: EXAM,
            title: "Sum".to_string(),
            cpu_time_limit: None,
            memory_limit: None,
        });
        store.insert_problem(Problem {
            id: EMPTY_PROBLEM,
            exam_id: EXAM,
            title: "Empty".to_string(),
            cpu_time_limit: Some(1.0),
            memory_limit: Some(65536),
        });
        for (i, (input, output)) in [("1 2", "3"), ("2 2", "4"), ("5 5", "10")].iter().enumerate() {
            store.insert_test_case(TestCase {
                id: 100 + i as i64,
                problem_id: PROBLEM,
                input: input.to_string(),
                output: output.to_string(),
            });
        }

        store.insert_language(Language {
            id: LANGUAGE,
            name: "Python 3".to_string(),
            judge_language_id: JUDGE_LANGUAGE,
        });

        Self {
            store: Arc::new(store),
            judge: Arc::new(FakeJudge::new()),
            exam,
        }
    }

    pub fn evidence(&self) -> RequestEvidence {
        evidence_with_ua("Mozilla/5.0 (X11; Linux x86_64) Firefox/120.0")
    }

    pub fn exam(&self) -> Exam {
        self.exam.clone()
    }

    pub fn restrict_exam(&self, browser_key: Option<&str>, config_key: Option<&str>) {
        let mut exam = self.exam();
        exam.restricted = true;
        exam.browser_key = browser_key.map(str::to_string);
        exam.config_key = config_key.map(str::to_string);
        self.store.insert_exam(exam);
    }

    /// Inserts an active session directly and returns its token.
    pub async fn open_session(&self, identity: &Identity) -> String {
        let token = generate_session_token();
        self.store
            .insert_session_if_absent(NewExamSession {
                user_id: identity.user_id,
                exam_id: EXAM,
                session_token: token.clone(),
                ip: "127.0.0.1".to_string(),
                user_agent: "test".to_string(),
                device: "desktop".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        token
    }
}
