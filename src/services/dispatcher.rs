// src/services/dispatcher.rs

//! Turns a student's code into one judge batch and a pending submission.

use chrono::{DateTime, Utc};

use crate::{
    config::{CPU_EXTRA_TIME, WALL_TIME_SLACK},
    error::AppError,
    judge::{BatchItem, JudgeClient, RunOutcome, RunRequest, encode_text},
    models::{
        problem::{Language, Problem, TestCase},
        submission::{BatchTokens, NewSubmission, Submission},
    },
    repository::Store,
    services::access,
    utils::{evidence::RequestEvidence, jwt::Identity},
};

/// Everything a submission needs besides the caller.
#[derive(Debug, Clone)]
pub struct CodeSubmission {
    pub exam_id: i64,
    pub problem_id: i64,
    pub language_id: i64,
    pub source_code: String,
}

async fn resolve_language(store: &dyn Store, language_id: i64) -> Result<Language, AppError> {
    store
        .find_language(language_id)
        .await?
        .ok_or(AppError::NotFound(format!("Unknown language {}", language_id)))
}

/// One batch item per test case, in test case order.
pub fn build_batch(
    problem: &Problem,
    test_cases: &[TestCase],
    language: &Language,
    source_code: &str,
) -> Vec<BatchItem> {
    let (cpu_time_limit, memory_limit) = problem.limits();

    test_cases
        .iter()
        .map(|case| BatchItem {
            language_id: language.judge_language_id,
            source_code: source_code.to_string(),
            stdin: format!("{}\n", case.input),
            expected_output: format!("{}\n", case.output),
            cpu_time_limit,
            cpu_extra_time: CPU_EXTRA_TIME,
            wall_time_limit: cpu_time_limit + WALL_TIME_SLACK,
            memory_limit,
        })
        .collect()
}

/// Checks access, queues every test case on the judge and records a pending
/// submission keyed by the returned tokens.
pub async fn submit(
    store: &dyn Store,
    judge: &dyn JudgeClient,
    identity: &Identity,
    evidence: &RequestEvidence,
    request: CodeSubmission,
    now: DateTime<Utc>,
) -> Result<Submission, AppError> {
    access::can_access_exam(
        store,
        identity,
        request.exam_id,
        evidence.session_token.as_deref(),
        evidence,
        now,
    )
    .await?;

    let problem = store
        .find_problem(request.problem_id)
        .await?
        .filter(|p| p.exam_id == request.exam_id)
        .ok_or(AppError::NotFound("Problem not found in this exam".to_string()))?;

    let test_cases = store
        .list_test_cases(problem.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load test cases for problem {}: {}", problem.id, e);
            AppError::NoTestCases(format!("Test cases for problem {} unavailable", problem.id))
        })?;
    if test_cases.is_empty() {
        return Err(AppError::NoTestCases(format!(
            "Problem {} has no test cases",
            problem.id
        )));
    }

    let language = resolve_language(store, request.language_id).await?;
    let items = build_batch(&problem, &test_cases, &language, &request.source_code);

    let tokens = judge.submit_batch(items).await?;
    let tokens = BatchTokens::new(tokens)?;
    if tokens.len() != test_cases.len() {
        return Err(AppError::UpstreamJudgeError(format!(
            "Judge returned {} tokens for {} test cases",
            tokens.len(),
            test_cases.len()
        )));
    }

    let submission = store
        .create_submission(NewSubmission {
            user_id: identity.user_id,
            exam_id: request.exam_id,
            problem_id: problem.id,
            language_id: language.id,
            source_code: encode_text(&request.source_code),
            batch_tokens: tokens,
        })
        .await?;

    tracing::info!(
        "Submission {} queued: user {} problem {} ({} test cases)",
        submission.id,
        identity.user_id,
        problem.id,
        test_cases.len()
    );

    Ok(submission)
}

/// Scratch run: same access check and language mapping, one unbatched run,
/// nothing persisted.
pub async fn run_code(
    store: &dyn Store,
    judge: &dyn JudgeClient,
    identity: &Identity,
    evidence: &RequestEvidence,
    exam_id: i64,
    language_id: i64,
    source_code: &str,
    stdin: &str,
    now: DateTime<Utc>,
) -> Result<RunOutcome, AppError> {
    access::can_access_exam(
        store,
        identity,
        exam_id,
        evidence.session_token.as_deref(),
        evidence,
        now,
    )
    .await?;

    let language = resolve_language(store, language_id).await?;

    judge
        .submit_one(RunRequest {
            language_id: language.judge_language_id,
            source_code: source_code.to_string(),
            stdin: stdin.to_string(),
        })
        .await
}
