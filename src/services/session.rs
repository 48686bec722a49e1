// src/services/session.rs

//! Exam session lifecycle: admission, token rotation and finishing.

use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::exam_session::{ExamSession, NewExamSession, SessionRotation},
    repository::Store,
    services::access,
    utils::{
        device::classify_user_agent, evidence::RequestEvidence, jwt::Identity,
        token::generate_session_token,
    },
};

/// Result of a successful admission.
#[derive(Debug, Clone)]
pub struct StartedSession {
    pub session: ExamSession,
    /// Token the client must present from now on.
    pub session_token: String,
    pub remaining_seconds: i64,
    pub quit_url: Option<String>,
}

/// Admits the caller to the exam, creating, reusing or taking over their
/// single session row.
///
/// * No row: a new active session with a fresh token.
/// * Finished row: `AlreadyFinished`.
/// * Active row, same token presented: returned untouched.
/// * Active row, other or no token: token rotated in place; the latest client wins.
pub async fn start_or_refresh(
    store: &dyn Store,
    identity: &Identity,
    exam_id: i64,
    evidence: &RequestEvidence,
    now: DateTime<Utc>,
) -> Result<StartedSession, AppError> {
    let (exam, remaining_seconds) =
        access::can_start_exam(store, identity, exam_id, evidence, now).await?;

    let started = |session: ExamSession| StartedSession {
        session_token: session.session_token.clone(),
        session,
        remaining_seconds,
        quit_url: exam.quit_url.clone(),
    };

    // A lost insert race sends us around once more, into the update branch.
    for _ in 0..2 {
        let existing = store.find_session(identity.user_id, exam_id).await?;

        let Some(session) = existing else {
            let new = NewExamSession {
                user_id: identity.user_id,
                exam_id,
                session_token: generate_session_token(),
                ip: evidence.ip.clone(),
                user_agent: evidence.user_agent.clone(),
                device: classify_user_agent(&evidence.user_agent).as_str().to_string(),
            };
            match store.insert_session_if_absent(new).await? {
                Some(created) => {
                    tracing::info!(
                        "Exam session {} opened for user {} in exam {} ({})",
                        created.id,
                        identity.user_id,
                        exam_id,
                        created.device
                    );
                    return Ok(started(created));
                }
                None => continue,
            }
        };

        if !session.is_active() {
            return Err(AppError::AlreadyFinished);
        }

        if evidence.session_token.as_deref() == Some(session.session_token.as_str()) {
            return Ok(started(session));
        }

        let rotation = SessionRotation {
            session_token: generate_session_token(),
            ip: evidence.ip.clone(),
            user_agent: evidence.user_agent.clone(),
            device: classify_user_agent(&evidence.user_agent).as_str().to_string(),
        };
        let rotated = store
            .rotate_session(session.id, rotation)
            .await?
            .ok_or(AppError::AlreadyFinished)?;

        tracing::info!(
            "Exam session {} taken over by a new client for user {} ({} from {})",
            rotated.id,
            identity.user_id,
            rotated.device,
            rotated.ip
        );
        return Ok(started(rotated));
    }

    Err(AppError::InternalServerError(format!(
        "Could not settle exam session for user {} in exam {}",
        identity.user_id, exam_id
    )))
}

/// Marks the caller's session finished. Finishing twice is not an error.
pub async fn finish(
    store: &dyn Store,
    identity: &Identity,
    exam_id: i64,
) -> Result<ExamSession, AppError> {
    let session = store
        .find_session(identity.user_id, exam_id)
        .await?
        .ok_or(AppError::NotFound("Exam session not found".to_string()))?;

    if !session.is_active() {
        return Ok(session);
    }

    store.finish_session(session.id).await?;
    tracing::info!(
        "Exam session {} finished for user {} in exam {}",
        session.id,
        identity.user_id,
        exam_id
    );

    store
        .find_session(identity.user_id, exam_id)
        .await?
        .ok_or(AppError::NotFound("Exam session not found".to_string()))
}

pub async fn get_by_token(store: &dyn Store, token: &str) -> Result<ExamSession, AppError> {
    store
        .find_session_by_token(token)
        .await?
        .ok_or(AppError::SessionInvalid)
}

pub async fn list_by_exam(store: &dyn Store, exam_id: i64) -> Result<Vec<ExamSession>, AppError> {
    store.list_sessions_by_exam(exam_id).await
}

/// Administrative purge.
pub async fn delete_by_id(store: &dyn Store, id: i64) -> Result<(), AppError> {
    if store.delete_session(id).await? {
        tracing::warn!("Exam session {} purged", id);
        Ok(())
    } else {
        Err(AppError::NotFound("Exam session not found".to_string()))
    }
}
