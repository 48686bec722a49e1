// src/services/stats.rs

//! Per-exam correctness figures and the results read model.

use std::collections::{BTreeMap, HashSet};

use crate::{
    error::AppError,
    models::submission::{ExamUserStats, Submission, SubmissionStatus},
    repository::Store,
    services::access,
    utils::jwt::Identity,
};

/// Solved problem counts for every user holding a session in the exam.
///
/// A problem counts once per user no matter how many accepted submissions
/// it has. Users are returned in id order.
pub async fn exam_statistics(
    store: &dyn Store,
    exam_id: i64,
) -> Result<Vec<ExamUserStats>, AppError> {
    let total = store.count_problems_in_exam(exam_id).await?;
    let sessions = store.list_sessions_by_exam(exam_id).await?;
    let submissions = store.list_submissions_by_exam(exam_id).await?;

    let mut solved: BTreeMap<i64, HashSet<i64>> = sessions
        .iter()
        .map(|s| (s.user_id, HashSet::new()))
        .collect();

    for submission in submissions
        .iter()
        .filter(|s| s.status == SubmissionStatus::Accepted)
    {
        if let Some(problems) = solved.get_mut(&submission.user_id) {
            problems.insert(submission.problem_id);
        }
    }

    Ok(solved
        .into_iter()
        .map(|(user_id, problems)| ExamUserStats {
            user_id,
            solved: problems.len() as i64,
            total,
        })
        .collect())
}

#[derive(Debug)]
pub struct ExamResults {
    pub exam_id: i64,
    pub submissions: Vec<Submission>,
    pub statistics: Vec<ExamUserStats>,
}

/// Results page: the privileged role sees every row, anyone else only their own.
pub async fn exam_results(
    store: &dyn Store,
    identity: &Identity,
    exam_id: i64,
) -> Result<ExamResults, AppError> {
    access::can_see_exam_result(store, identity, exam_id).await?;

    let mut statistics = exam_statistics(store, exam_id).await?;
    let submissions = if identity.is_privileged() {
        store.list_submissions_by_exam(exam_id).await?
    } else {
        statistics.retain(|row| row.user_id == identity.user_id);
        store
            .list_submissions_by_exam_and_user(exam_id, identity.user_id)
            .await?
    };

    Ok(ExamResults {
        exam_id,
        submissions,
        statistics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            problem::Problem,
            submission::{BatchTokens, GradingResult, NewSubmission},
        },
        repository::{SessionRepository, SubmissionRepository},
        services::testing::{EXAM, Fixture, LANGUAGE, PROBLEM, STUDENT_ID, admin, second_student, student},
    };

    async fn graded(fx: &Fixture, user_id: i64, problem_id: i64, status: SubmissionStatus) {
        let submission = fx
            .store
            .create_submission(NewSubmission {
                user_id,
                exam_id: EXAM,
                problem_id,
                language_id: LANGUAGE,
                source_code: String::new(),
                batch_tokens: BatchTokens::new(vec!["t".to_string()]).unwrap(),
            })
            .await
            .unwrap();
        if status.is_terminal() {
            fx.store
                .record_result(
                    submission.id,
                    &GradingResult {
                        status,
                        time: "0.10".to_string(),
                        memory: 1,
                    },
                )
                .await
                .unwrap();
        }
    }

    fn with_third_problem(fx: &Fixture) -> i64 {
        fx.store.insert_problem(Problem {
            id: 12,
            exam_id: EXAM,
            title: "Max".to_string(),
            cpu_time_limit: None,
            memory_limit: None,
        });
        12
    }

    #[tokio::test]
    async fn test_counts_distinct_accepted_problems() {
        let fx = Fixture::new();
        let third = with_third_problem(&fx);
        fx.open_session(&student()).await;
        fx.open_session(&second_student()).await;

        graded(&fx, STUDENT_ID, PROBLEM, SubmissionStatus::Accepted).await;
        graded(&fx, STUDENT_ID, PROBLEM, SubmissionStatus::Accepted).await;
        graded(&fx, STUDENT_ID, third, SubmissionStatus::WrongAnswer).await;
        graded(&fx, 8, third, SubmissionStatus::Pending).await;

        let stats = exam_statistics(&*fx.store, EXAM).await.unwrap();
        assert_eq!(
            stats,
            vec![
                ExamUserStats {
                    user_id: STUDENT_ID,
                    solved: 1,
                    total: 3
                },
                ExamUserStats {
                    user_id: 8,
                    solved: 0,
                    total: 3
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_users_without_session_are_ignored() {
        let fx = Fixture::new();
        graded(&fx, STUDENT_ID, PROBLEM, SubmissionStatus::Accepted).await;
        assert!(exam_statistics(&*fx.store, EXAM).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_student_results_only_show_own_rows() {
        let fx = Fixture::new();
        let token = fx.open_session(&student()).await;
        fx.open_session(&second_student()).await;
        graded(&fx, STUDENT_ID, PROBLEM, SubmissionStatus::Accepted).await;
        graded(&fx, 8, PROBLEM, SubmissionStatus::Accepted).await;

        let session = fx.store.find_session_by_token(&token).await.unwrap().unwrap();
        fx.store.finish_session(session.id).await.unwrap();

        let mine = exam_results(&*fx.store, &student(), EXAM).await.unwrap();
        assert_eq!(mine.submissions.len(), 1);
        assert_eq!(mine.statistics.len(), 1);
        assert_eq!(mine.statistics[0].user_id, STUDENT_ID);

        let all = exam_results(&*fx.store, &admin(), EXAM).await.unwrap();
        assert_eq!(all.submissions.len(), 2);
        assert_eq!(all.statistics.len(), 2);
    }

    #[tokio::test]
    async fn test_results_hidden_while_session_active() {
        let fx = Fixture::new();
        fx.open_session(&student()).await;
        let err = exam_results(&*fx.store, &student(), EXAM).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
