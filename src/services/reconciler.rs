// src/services/reconciler.rs

//! Background grading: merges per-test-case judge results into one final
//! submission status.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::AppError,
    judge::{CaseResult, JudgeClient, Verdict},
    models::submission::{GradingResult, Submission, SubmissionStatus},
    repository::Store,
    scheduler::PeriodicTask,
};

/// What one fetch of a batch says about its submission.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// At least one case is still queued or running.
    Pending,
    Final(GradingResult),
}

/// Folds a batch into one result.
///
/// The smallest [`Verdict`] across cases decides the status. Time and memory
/// are maxima over all cases, regardless of which case decided.
pub fn merge_results(results: &[CaseResult]) -> MergeOutcome {
    if results.iter().any(|r| r.status().is_live()) {
        return MergeOutcome::Pending;
    }

    let verdict = results
        .iter()
        .filter_map(|r| r.status().verdict())
        .min()
        .unwrap_or(Verdict::InternalError);

    let mut max_time: Option<f64> = None;
    for result in results {
        let Some(raw) = result.time.as_deref() else {
            continue;
        };
        match raw.trim().parse::<f64>() {
            Ok(t) if t.is_finite() => {
                max_time = Some(max_time.map_or(t, |m| m.max(t)));
            }
            _ => tracing::warn!(
                "Ignoring unparseable time {:?} for judge token {}",
                raw,
                result.token
            ),
        }
    }

    let memory = results.iter().filter_map(|r| r.memory).max().unwrap_or(0);

    MergeOutcome::Final(GradingResult {
        status: SubmissionStatus::from(verdict),
        time: format!("{:.2}", max_time.unwrap_or(0.0)),
        memory,
    })
}

/// Counters for one pass over the pending submissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub examined: usize,
    pub finalized: usize,
    pub still_pending: usize,
    pub failed: usize,
}

enum Step {
    Finalized,
    StillPending,
}

pub struct Reconciler {
    store: Arc<dyn Store>,
    judge: Arc<dyn JudgeClient>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn Store>, judge: Arc<dyn JudgeClient>) -> Self {
        Self { store, judge }
    }

    /// One full pass. Never fails as a whole: a submission that errors is
    /// counted and left pending for the next pass.
    pub async fn run_tick(&self) -> TickReport {
        let mut report = TickReport::default();

        let pending = match self.store.list_pending_submissions().await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!("Reconciler could not list pending submissions: {}", e);
                report.failed += 1;
                return report;
            }
        };

        for submission in &pending {
            report.examined += 1;
            match self.reconcile(submission).await {
                Ok(Step::Finalized) => report.finalized += 1,
                Ok(Step::StillPending) => report.still_pending += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!("Submission {} left pending: {}", submission.id, e);
                }
            }
        }

        if report.examined > 0 {
            tracing::info!(
                "Reconcile tick: {} pending, {} finalized, {} still pending, {} failed",
                report.examined,
                report.finalized,
                report.still_pending,
                report.failed
            );
        }
        report
    }

    async fn reconcile(&self, submission: &Submission) -> Result<Step, AppError> {
        let tokens = submission.tokens()?;
        let tokens = tokens.as_slice();
        if tokens.is_empty() {
            return Err(AppError::InternalServerError(format!(
                "Submission {} has no judge tokens",
                submission.id
            )));
        }

        let results = self.judge.fetch_batch(tokens).await?;
        if results.len() != tokens.len() {
            return Err(AppError::UpstreamJudgeError(format!(
                "Judge returned {} results for {} tokens",
                results.len(),
                tokens.len()
            )));
        }

        let result = match merge_results(&results) {
            MergeOutcome::Pending => return Ok(Step::StillPending),
            MergeOutcome::Final(result) => result,
        };

        if self.store.record_result(submission.id, &result).await? {
            tracing::info!(
                "Submission {} graded {:?} (time {}, memory {})",
                submission.id,
                result.status,
                result.time,
                result.memory
            );
        } else {
            tracing::debug!("Submission {} was already terminal", submission.id);
        }
        Ok(Step::Finalized)
    }
}

#[async_trait]
impl PeriodicTask for Reconciler {
    fn name(&self) -> &'static str {
        "grading-reconciler"
    }

    async fn tick(&self) {
        self.run_tick().await;
    }
}
