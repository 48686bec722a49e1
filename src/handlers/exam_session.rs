// src/handlers/exam_session.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    config::SESSION_COOKIE,
    error::AppError,
    models::exam_session::{
        ExamAccessResponse, ProblemAccessResponse, SessionView, StartSessionResponse,
    },
    repository::Store,
    services::{access, session},
    utils::{evidence::RequestEvidence, jwt::Identity},
};

fn session_cookie(token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict",
        SESSION_COOKIE, token
    )
}

/// Start or resume the caller's exam session.
///
/// * Creates the session on first call.
/// * Returns the same token when the client presents it.
/// * Rotates the token when another client takes over.
///
/// The token is returned in the body and set as the session cookie.
pub async fn start_session(
    State(store): State<Arc<dyn Store>>,
    Path(exam_id): Path<i64>,
    identity: Identity,
    evidence: RequestEvidence,
) -> Result<impl IntoResponse, AppError> {
    let started =
        session::start_or_refresh(store.as_ref(), &identity, exam_id, &evidence, Utc::now()).await?;

    let cookie = session_cookie(&started.session_token);
    let body = StartSessionResponse {
        session: SessionView::from(&started.session),
        session_token: started.session_token,
        remaining_seconds: started.remaining_seconds,
        quit_url: started.quit_url,
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(body)))
}

/// Finish the caller's exam session. Calling it again is harmless.
pub async fn finish_session(
    State(store): State<Arc<dyn Store>>,
    Path(exam_id): Path<i64>,
    identity: Identity,
) -> Result<impl IntoResponse, AppError> {
    let finished = session::finish(store.as_ref(), &identity, exam_id).await?;
    Ok(Json(SessionView::from(&finished)))
}

/// Dry run: would an exam content request succeed right now?
pub async fn check_exam_access(
    State(store): State<Arc<dyn Store>>,
    Path(exam_id): Path<i64>,
    identity: Identity,
    evidence: RequestEvidence,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let exam = access::can_access_exam(
        store.as_ref(),
        &identity,
        exam_id,
        evidence.session_token.as_deref(),
        &evidence,
        now,
    )
    .await?;

    Ok(Json(ExamAccessResponse {
        exam_id: exam.id,
        remaining_seconds: exam.remaining_seconds(now),
    }))
}

/// Dry run: may the session holder browse the exam's problems?
pub async fn check_problem_access(
    State(store): State<Arc<dyn Store>>,
    identity: Identity,
    evidence: RequestEvidence,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let (exam, session) = access::can_access_problem(
        store.as_ref(),
        &identity,
        evidence.session_token.as_deref(),
        &evidence,
        now,
    )
    .await?;

    Ok(Json(ProblemAccessResponse {
        exam_id: exam.id,
        session_id: session.id,
        remaining_seconds: exam.remaining_seconds(now),
    }))
}

/// The session the presented token belongs to, if it belongs to the caller.
pub async fn current_session(
    State(store): State<Arc<dyn Store>>,
    identity: Identity,
    evidence: RequestEvidence,
) -> Result<impl IntoResponse, AppError> {
    let token = evidence.session_token.ok_or(AppError::SessionInvalid)?;
    let found = session::get_by_token(store.as_ref(), &token).await?;

    if found.user_id != identity.user_id {
        return Err(AppError::SessionInvalid);
    }

    Ok(Json(SessionView::from(&found)))
}
