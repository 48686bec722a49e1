// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Carries the exam access taxonomy alongside the generic transport errors.
#[derive(Debug)]
pub enum AppError {
    /// Caller is not a member of the exam's class.
    NotInClass,

    /// Exam is outside its [start, start + duration] window.
    ExamNotActive,

    /// No stored session matches the presented session token.
    SessionInvalid,

    /// Locked-browser check failed. The message names the failing check.
    IntegrityMismatch(String),

    /// Session (and so the exam attempt) is already concluded.
    AlreadyFinished,

    // 403 for role-based denials outside the taxonomy above
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    /// Problem has no test cases to grade against.
    NoTestCases(String),

    /// Network or decode failure talking to the judging service.
    UpstreamJudgeError(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),
}

impl AppError {
    /// Stable machine-readable code, sent next to the human message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotInClass => "not_in_class",
            AppError::ExamNotActive => "exam_not_active",
            AppError::SessionInvalid => "session_invalid",
            AppError::IntegrityMismatch(_) => "integrity_mismatch",
            AppError::AlreadyFinished => "already_finished",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::NoTestCases(_) => "no_test_cases",
            AppError::UpstreamJudgeError(_) => "upstream_judge_error",
            AppError::InternalServerError(_) => "internal_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::AuthError(_) => "unauthorized",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotInClass => write!(f, "You are not a member of this exam's class"),
            AppError::ExamNotActive => write!(f, "Exam is not currently active"),
            AppError::SessionInvalid => write!(f, "Exam session is missing or invalid"),
            AppError::IntegrityMismatch(check) => {
                write!(f, "Browser integrity check failed: {}", check)
            }
            AppError::AlreadyFinished => write!(f, "Exam session is already finished"),
            other => write!(f, "{:?}", other),
        }
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::UpstreamJudgeError(msg) => {
                tracing::error!("Judge error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Judging service unavailable".to_string(),
                )
            }
            e @ (AppError::NotInClass
            | AppError::ExamNotActive
            | AppError::IntegrityMismatch(_)) => (StatusCode::FORBIDDEN, e.to_string()),
            e @ AppError::SessionInvalid => (StatusCode::UNAUTHORIZED, e.to_string()),
            e @ AppError::AlreadyFinished => (StatusCode::CONFLICT, e.to_string()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::NoTestCases(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
        };
        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::UpstreamJudgeError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_errors_map_to_forbidden() {
        let resp = AppError::NotInClass.into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = AppError::IntegrityMismatch("request hash".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_session_errors() {
        assert_eq!(
            AppError::SessionInvalid.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::AlreadyFinished.into_response().status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_integrity_message_names_check() {
        let err = AppError::IntegrityMismatch("config key hash".to_string());
        assert!(err.to_string().contains("config key hash"));
        assert_eq!(err.code(), "integrity_mismatch");
    }

    #[test]
    fn test_every_variant_has_code_and_status() {
        let cases = [
            (AppError::NotInClass, "not_in_class", StatusCode::FORBIDDEN),
            (AppError::ExamNotActive, "exam_not_active", StatusCode::FORBIDDEN),
            (AppError::SessionInvalid, "session_invalid", StatusCode::UNAUTHORIZED),
            (
                AppError::IntegrityMismatch("x".to_string()),
                "integrity_mismatch",
                StatusCode::FORBIDDEN,
            ),
            (AppError::AlreadyFinished, "already_finished", StatusCode::CONFLICT),
            (AppError::Forbidden("x".to_string()), "forbidden", StatusCode::FORBIDDEN),
            (AppError::NotFound("x".to_string()), "not_found", StatusCode::NOT_FOUND),
            (
                AppError::NoTestCases("x".to_string()),
                "no_test_cases",
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::UpstreamJudgeError("x".to_string()),
                "upstream_judge_error",
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::InternalServerError("x".to_string()),
                "internal_error",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AppError::BadRequest("x".to_string()), "bad_request", StatusCode::BAD_REQUEST),
            (AppError::AuthError("x".to_string()), "unauthorized", StatusCode::UNAUTHORIZED),
        ];

        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_database_errors_are_internal() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.code(), "internal_error");
    }

    #[test]
    fn test_upstream_is_bad_gateway() {
        let resp = AppError::UpstreamJudgeError("timeout".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
