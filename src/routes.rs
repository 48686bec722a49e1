// src/routes.rs

use axum::{
    Router,
    http::{HeaderName, Method, header},
    middleware,
    routing::{delete, get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::{CONFIG_KEY_HASH_HEADER, REQUEST_HASH_HEADER, SESSION_HEADER},
    handlers::{admin, exam_session, results, submission},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Exam routes authenticate through the `Identity` extractor.
/// * Admin routes sit behind auth + admin middleware.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            "http://localhost:3000".parse().expect("static origin"),
            "http://127.0.0.1:3000".parse().expect("static origin"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(SESSION_HEADER),
            HeaderName::from_static(REQUEST_HASH_HEADER),
            HeaderName::from_static(CONFIG_KEY_HASH_HEADER),
        ])
        .allow_credentials(true);

    let exam_routes = Router::new()
        .route("/{id}/session", post(exam_session::start_session))
        .route("/{id}/finish", post(exam_session::finish_session))
        .route("/{id}/access", get(exam_session::check_exam_access))
        .route(
            "/{id}/submissions",
            post(submission::submit_code).get(submission::list_exam_submissions),
        )
        .route("/{id}/run", post(submission::run_code))
        .route("/{id}/results", get(results::get_exam_results));

    let problem_routes = Router::new()
        .route("/access", get(exam_session::check_problem_access))
        .merge(
            Router::new()
                .route("/{id}/submissions", get(admin::list_problem_submissions))
                .layer(middleware::from_fn(admin_middleware))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let admin_routes = Router::new()
        .route("/exams/{id}/sessions", get(admin::list_exam_sessions))
        .route("/sessions/{id}", delete(admin::delete_session))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/exams", exam_routes)
        .nest("/api/problems", problem_routes)
        .route("/api/sessions/current", get(exam_session::current_session))
        .route("/api/submissions/{id}", get(submission::get_submission))
        .route("/api/users/me/submissions", get(submission::list_my_submissions))
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
