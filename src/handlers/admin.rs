// src/handlers/admin.rs

//! Proctoring dashboard endpoints. Mounted behind `admin_middleware`.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{exam_session::SessionView, submission::SubmissionView},
    repository::Store,
    services::session,
};

/// Every session opened for an exam.
pub async fn list_exam_sessions(
    State(store): State<Arc<dyn Store>>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = session::list_by_exam(store.as_ref(), exam_id).await?;
    Ok(Json(
        sessions.iter().map(SessionView::from).collect::<Vec<_>>(),
    ))
}

/// Remove a session so the student can be admitted afresh.
pub async fn delete_session(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    session::delete_by_id(store.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_problem_submissions(
    State(store): State<Arc<dyn Store>>,
    Path(problem_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let submissions = store.list_submissions_by_problem(problem_id).await?;
    Ok(Json(
        submissions
            .into_iter()
            .map(SubmissionView::from)
            .collect::<Vec<_>>(),
    ))
}
