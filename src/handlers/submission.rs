// src/handlers/submission.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    judge::JudgeClient,
    models::submission::{RunCodeRequest, SubmissionCreated, SubmissionView, SubmitCodeRequest},
    repository::Store,
    services::dispatcher::{self, CodeSubmission},
    utils::{evidence::RequestEvidence, jwt::Identity},
};

/// Submit code for grading.
///
/// Returns 202 with the pending submission; poll `GET /api/submissions/{id}`
/// for the verdict.
pub async fn submit_code(
    State(store): State<Arc<dyn Store>>,
    State(judge): State<Arc<dyn JudgeClient>>,
    Path(exam_id): Path<i64>,
    identity: Identity,
    evidence: RequestEvidence,
    Json(payload): Json<SubmitCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let submission = dispatcher::submit(
        store.as_ref(),
        judge.as_ref(),
        &identity,
        &evidence,
        CodeSubmission {
            exam_id,
            problem_id: payload.problem_id,
            language_id: payload.language_id,
            source_code: payload.source_code,
        },
        Utc::now(),
    )
    .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmissionCreated {
            id: submission.id,
            status: submission.status,
            status_code: submission.status.code(),
            test_cases: submission.tokens()?.len(),
        }),
    ))
}

/// Scratch run. Nothing is stored; the judge's answer comes straight back.
pub async fn run_code(
    State(store): State<Arc<dyn Store>>,
    State(judge): State<Arc<dyn JudgeClient>>,
    Path(exam_id): Path<i64>,
    identity: Identity,
    evidence: RequestEvidence,
    Json(payload): Json<RunCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let outcome = dispatcher::run_code(
        store.as_ref(),
        judge.as_ref(),
        &identity,
        &evidence,
        exam_id,
        payload.language_id,
        &payload.source_code,
        &payload.stdin,
        Utc::now(),
    )
    .await?;

    Ok(Json(outcome))
}

/// One submission. Students only see their own.
pub async fn get_submission(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<i64>,
    identity: Identity,
) -> Result<impl IntoResponse, AppError> {
    let submission = store
        .find_submission(id)
        .await?
        .filter(|s| identity.is_privileged() || s.user_id == identity.user_id)
        .ok_or(AppError::NotFound("Submission not found".to_string()))?;

    Ok(Json(SubmissionView::from(submission)))
}

/// Submissions of an exam: all of them for the privileged role, otherwise the caller's.
pub async fn list_exam_submissions(
    State(store): State<Arc<dyn Store>>,
    Path(exam_id): Path<i64>,
    identity: Identity,
) -> Result<impl IntoResponse, AppError> {
    let submissions = if identity.is_privileged() {
        store.list_submissions_by_exam(exam_id).await?
    } else {
        store
            .list_submissions_by_exam_and_user(exam_id, identity.user_id)
            .await?
    };

    Ok(Json(
        submissions
            .into_iter()
            .map(SubmissionView::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn list_my_submissions(
    State(store): State<Arc<dyn Store>>,
    identity: Identity,
) -> Result<impl IntoResponse, AppError> {
    let submissions = store.list_submissions_by_user(identity.user_id).await?;

    Ok(Json(
        submissions
            .into_iter()
            .map(SubmissionView::from)
            .collect::<Vec<_>>(),
    ))
}
