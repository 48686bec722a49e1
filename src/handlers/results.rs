// src/handlers/results.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::submission::{ExamResultsResponse, SubmissionView},
    repository::Store,
    services::stats,
    utils::jwt::Identity,
};

/// Exam results and per-student correctness figures.
/// Students get theirs once their session is finished.
pub async fn get_exam_results(
    State(store): State<Arc<dyn Store>>,
    Path(exam_id): Path<i64>,
    identity: Identity,
) -> Result<impl IntoResponse, AppError> {
    let results = stats::exam_results(store.as_ref(), &identity, exam_id).await?;

    Ok(Json(ExamResultsResponse {
        exam_id: results.exam_id,
        submissions: results
            .submissions
            .into_iter()
            .map(SubmissionView::from)
            .collect(),
        statistics: results.statistics,
    }))
}
