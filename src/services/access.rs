// src/services/access.rs

//! Decides whether a caller may act on an exam or problem right now.
//!
//! Checks run in a fixed order and stop at the first failure, whose error
//! names the check that failed.

use chrono::{DateTime, Utc};

use crate::{
    config::BROWSER_VENDOR_MARKER,
    error::AppError,
    models::{exam::Exam, exam_session::ExamSession},
    repository::Store,
    utils::{evidence::RequestEvidence, integrity::hash_matches, jwt::Identity},
};

async fn load_exam(store: &dyn Store, exam_id: i64) -> Result<Exam, AppError> {
    store
        .find_exam(exam_id)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))
}

async fn ensure_member(store: &dyn Store, identity: &Identity, exam: &Exam) -> Result<(), AppError> {
    if store.is_member(exam.class_id, identity.user_id).await? {
        Ok(())
    } else {
        tracing::debug!(
            "User {} is not in class {} of exam {}",
            identity.user_id,
            exam.class_id,
            exam.id
        );
        Err(AppError::NotInClass)
    }
}

fn ensure_active(exam: &Exam, now: DateTime<Utc>) -> Result<(), AppError> {
    if exam.is_active_at(now) {
        Ok(())
    } else {
        Err(AppError::ExamNotActive)
    }
}

fn configured(key: &Option<String>) -> Option<&str> {
    key.as_deref().filter(|k| !k.is_empty())
}

/// Locked-browser check, applied only to restricted exams.
///
/// Each configured key must match its own header; with no key configured the
/// user-agent must carry the vendor marker instead.
pub fn check_browser_integrity(exam: &Exam, evidence: &RequestEvidence) -> Result<(), AppError> {
    if !exam.restricted {
        return Ok(());
    }

    let browser_key = configured(&exam.browser_key);
    let config_key = configured(&exam.config_key);

    if let Some(key) = browser_key {
        if !hash_matches(&evidence.url, key, evidence.request_hash.as_deref()) {
            return Err(AppError::IntegrityMismatch("browser exam key hash".to_string()));
        }
    }

    if let Some(key) = config_key {
        if !hash_matches(&evidence.url, key, evidence.config_key_hash.as_deref()) {
            return Err(AppError::IntegrityMismatch("config key hash".to_string()));
        }
    }

    if browser_key.is_none()
        && config_key.is_none()
        && !evidence.user_agent.contains(BROWSER_VENDOR_MARKER)
    {
        return Err(AppError::IntegrityMismatch("user agent".to_string()));
    }

    Ok(())
}

/// The session must belong to the caller and this exam, and still be active.
fn ensure_session_owner(
    session: &ExamSession,
    identity: &Identity,
    exam_id: i64,
) -> Result<(), AppError> {
    if session.exam_id != exam_id || session.user_id != identity.user_id {
        return Err(AppError::SessionInvalid);
    }
    if !session.is_active() {
        return Err(AppError::AlreadyFinished);
    }
    Ok(())
}

/// May the caller open a session for this exam? Returns seconds until the exam ends.
pub async fn can_start_exam(
    store: &dyn Store,
    identity: &Identity,
    exam_id: i64,
    evidence: &RequestEvidence,
    now: DateTime<Utc>,
) -> Result<(Exam, i64), AppError> {
    let exam = load_exam(store, exam_id).await?;
    ensure_member(store, identity, &exam).await?;
    ensure_active(&exam, now)?;
    check_browser_integrity(&exam, evidence)?;

    let remaining = exam.remaining_seconds(now);
    Ok((exam, remaining))
}

/// May the caller act on exam content with this session token?
pub async fn can_access_exam(
    store: &dyn Store,
    identity: &Identity,
    exam_id: i64,
    session_token: Option<&str>,
    evidence: &RequestEvidence,
    now: DateTime<Utc>,
) -> Result<Exam, AppError> {
    let exam = load_exam(store, exam_id).await?;
    ensure_member(store, identity, &exam).await?;

    if identity.is_privileged() {
        return Ok(exam);
    }

    ensure_active(&exam, now)?;

    let token = session_token.ok_or(AppError::SessionInvalid)?;
    let session = store
        .find_session_by_token(token)
        .await?
        .ok_or(AppError::SessionInvalid)?;
    ensure_session_owner(&session, identity, exam.id)?;

    check_browser_integrity(&exam, evidence)?;
    Ok(exam)
}

/// May the caller browse problems? The exam is resolved from the session token.
///
/// The privileged role is denied here even though it bypasses
/// [`can_access_exam`]; administrators read problems through other paths.
pub async fn can_access_problem(
    store: &dyn Store,
    identity: &Identity,
    session_token: Option<&str>,
    evidence: &RequestEvidence,
    now: DateTime<Utc>,
) -> Result<(Exam, ExamSession), AppError> {
    let token = session_token.ok_or(AppError::SessionInvalid)?;
    let session = store
        .find_session_by_token(token)
        .await?
        .ok_or(AppError::SessionInvalid)?;
    let exam = load_exam(store, session.exam_id).await?;

    ensure_member(store, identity, &exam).await?;

    if identity.is_privileged() {
        return Err(AppError::Forbidden(
            "Problems are not browsable through an exam session by administrators".to_string(),
        ));
    }

    ensure_active(&exam, now)?;
    ensure_session_owner(&session, identity, exam.id)?;
    check_browser_integrity(&exam, evidence)?;

    Ok((exam, session))
}

/// May the caller see results for this exam?
pub async fn can_see_exam_result(
    store: &dyn Store,
    identity: &Identity,
    exam_id: i64,
) -> Result<Exam, AppError> {
    let exam = load_exam(store, exam_id).await?;
    ensure_member(store, identity, &exam).await?;

    if identity.is_privileged() {
        return Ok(exam);
    }

    match store.find_session(identity.user_id, exam_id).await? {
        Some(session) if !session.is_active() => Ok(exam),
        _ => Err(AppError::Forbidden(
            "Results are available once you finish the exam".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        repository::SessionRepository,
        services::testing::{EXAM, Fixture, STUDENT_ID, admin, evidence_with_ua, outsider, student},
        utils::integrity::request_hash,
    };
    use chrono::Duration;

    #[tokio::test]
    async fn test_start_requires_membership() {
        let fx = Fixture::new();
        let err = can_start_exam(&*fx.store, &outsider(), EXAM, &fx.evidence(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotInClass));
    }

    #[tokio::test]
    async fn test_start_returns_remaining_time() {
        let fx = Fixture::new();
        let now = Utc::now();
        let (_, remaining) = can_start_exam(&*fx.store, &student(), EXAM, &fx.evidence(), now)
            .await
            .unwrap();
        assert!(remaining > 49 * 60 && remaining <= 50 * 60);
    }

    #[tokio::test]
    async fn test_start_outside_window() {
        let fx = Fixture::new();
        let later = Utc::now() + Duration::hours(2);
        let err = can_start_exam(&*fx.store, &student(), EXAM, &fx.evidence(), later)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ExamNotActive));
    }

    #[tokio::test]
    async fn test_overflowing_duration_denies_instead_of_panicking() {
        let fx = Fixture::new();
        let mut exam = fx.exam();
        exam.duration_minutes = 1_000_000_000_000;
        fx.store.insert_exam(exam);

        let err = can_start_exam(&*fx.store, &student(), EXAM, &fx.evidence(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ExamNotActive));
    }

    #[tokio::test]
    async fn test_start_unknown_exam() {
        let fx = Fixture::new();
        let err = can_start_exam(&*fx.store, &student(), 999, &fx.evidence(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_access_needs_session_token() {
        let fx = Fixture::new();
        let err = can_access_exam(&*fx.store, &student(), EXAM, None, &fx.evidence(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SessionInvalid));

        let err = can_access_exam(
            &*fx.store,
            &student(),
            EXAM,
            Some("forged"),
            &fx.evidence(),
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::SessionInvalid));
    }

    #[tokio::test]
    async fn test_access_with_valid_session() {
        let fx = Fixture::new();
        let token = fx.open_session(&student()).await;
        let exam = can_access_exam(
            &*fx.store,
            &student(),
            EXAM,
            Some(&token),
            &fx.evidence(),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(exam.id, EXAM);
    }

    #[tokio::test]
    async fn test_access_rejects_finished_session() {
        let fx = Fixture::new();
        let token = fx.open_session(&student()).await;
        let session = fx.store.find_session_by_token(&token).await.unwrap().unwrap();
        fx.store.finish_session(session.id).await.unwrap();

        let err = can_access_exam(
            &*fx.store,
            &student(),
            EXAM,
            Some(&token),
            &fx.evidence(),
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::AlreadyFinished));
    }

    #[tokio::test]
    async fn test_admin_bypasses_exam_checks() {
        let fx = Fixture::new();
        let later = Utc::now() + Duration::hours(5);
        let exam = can_access_exam(&*fx.store, &admin(), EXAM, None, &fx.evidence(), later)
            .await
            .unwrap();
        assert_eq!(exam.id, EXAM);
    }

    #[tokio::test]
    async fn test_admin_denied_problem_access() {
        let fx = Fixture::new();
        let token = fx.open_session(&student()).await;
        let err = can_access_problem(&*fx.store, &admin(), Some(&token), &fx.evidence(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_problem_access_resolves_exam() {
        let fx = Fixture::new();
        let token = fx.open_session(&student()).await;
        let (exam, session) =
            can_access_problem(&*fx.store, &student(), Some(&token), &fx.evidence(), Utc::now())
                .await
                .unwrap();
        assert_eq!(exam.id, EXAM);
        assert_eq!(session.user_id, STUDENT_ID);
    }

    #[tokio::test]
    async fn test_results_need_finished_session() {
        let fx = Fixture::new();
        let token = fx.open_session(&student()).await;
        let err = can_see_exam_result(&*fx.store, &student(), EXAM).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let session = fx.store.find_session_by_token(&token).await.unwrap().unwrap();
        fx.store.finish_session(session.id).await.unwrap();
        assert!(can_see_exam_result(&*fx.store, &student(), EXAM).await.is_ok());
        assert!(can_see_exam_result(&*fx.store, &admin(), EXAM).await.is_ok());
    }

    #[test]
    fn test_integrity_skipped_when_unrestricted() {
        let fx = Fixture::new();
        let exam = fx.exam();
        assert!(check_browser_integrity(&exam, &evidence_with_ua("Firefox")).is_ok());
    }

    #[test]
    fn test_integrity_falls_back_to_user_agent() {
        let fx = Fixture::new();
        let mut exam = fx.exam();
        exam.restricted = true;

        assert!(check_browser_integrity(&exam, &evidence_with_ua("Mozilla SEB/3.5")).is_ok());
        let err = check_browser_integrity(&exam, &evidence_with_ua("Firefox")).unwrap_err();
        assert!(matches!(err, AppError::IntegrityMismatch(ref c) if c == "user agent"));
    }

    #[test]
    fn test_integrity_checks_both_keys() {
        let fx = Fixture::new();
        let mut exam = fx.exam();
        exam.restricted = true;
        exam.browser_key = Some("bek".to_string());
        exam.config_key = Some("ck".to_string());

        let mut evidence = evidence_with_ua("Firefox");
        evidence.request_hash = Some(request_hash(&evidence.url, "bek"));
        evidence.config_key_hash = Some(request_hash(&evidence.url, "ck"));
        assert!(check_browser_integrity(&exam, &evidence).is_ok());

        let mut wrong_config = evidence.clone();
        wrong_config.config_key_hash = Some(request_hash(&evidence.url, "bek"));
        let err = check_browser_integrity(&exam, &wrong_config).unwrap_err();
        assert!(matches!(err, AppError::IntegrityMismatch(ref c) if c == "config key hash"));

        let mut other_url = evidence.clone();
        other_url.url.push('?');
        let err = check_browser_integrity(&exam, &other_url).unwrap_err();
        assert!(matches!(err, AppError::IntegrityMismatch(ref c) if c == "browser exam key hash"));
    }

    #[tokio::test]
    async fn test_integrity_failure_blocks_start() {
        let fx = Fixture::new();
        fx.restrict_exam(Some("bek"), None);
        let err = can_start_exam(&*fx.store, &student(), EXAM, &fx.evidence(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IntegrityMismatch(_)));
    }
}
