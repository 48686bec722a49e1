// src/judge/status.rs

//! Judge-native status ids and the verdict precedence used to grade a batch.

use serde::Serialize;

use crate::models::submission::SubmissionStatus;

/// Which runtime failure the judge reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeFault {
    Segfault,
    FileSizeExceeded,
    FloatingPoint,
    Abort,
    NonZeroExit,
    Other,
}

/// Status as reported by the judge for a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudgeStatus {
    InQueue,
    Processing,
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    CompilationError,
    Runtime(RuntimeFault),
    InternalError,
    ExecFormatError,
    Unknown(i32),
}

impl JudgeStatus {
    pub fn from_id(id: i32) -> Self {
        match id {
            1 => JudgeStatus::InQueue,
            2 => JudgeStatus::Processing,
            3 => JudgeStatus::Accepted,
            4 => JudgeStatus::WrongAnswer,
            5 => JudgeStatus::TimeLimitExceeded,
            6 => JudgeStatus::CompilationError,
            7 => JudgeStatus::Runtime(RuntimeFault::Segfault),
            8 => JudgeStatus::Runtime(RuntimeFault::FileSizeExceeded),
            9 => JudgeStatus::Runtime(RuntimeFault::FloatingPoint),
            10 => JudgeStatus::Runtime(RuntimeFault::Abort),
            11 => JudgeStatus::Runtime(RuntimeFault::NonZeroExit),
            12 => JudgeStatus::Runtime(RuntimeFault::Other),
            13 => JudgeStatus::InternalError,
            14 => JudgeStatus::ExecFormatError,
            other => JudgeStatus::Unknown(other),
        }
    }

    /// Still queued or running. Any id at or below 2 counts as live.
    pub fn is_live(self) -> bool {
        match self {
            JudgeStatus::InQueue | JudgeStatus::Processing => true,
            JudgeStatus::Unknown(id) => id <= 2,
            _ => false,
        }
    }

    /// Verdict this run contributes, if the status is a known outcome.
    pub fn verdict(self) -> Option<Verdict> {
        match self {
            JudgeStatus::InternalError | JudgeStatus::ExecFormatError => Some(Verdict::InternalError),
            JudgeStatus::CompilationError => Some(Verdict::CompileError),
            JudgeStatus::Runtime(_) => Some(Verdict::RuntimeError),
            JudgeStatus::TimeLimitExceeded => Some(Verdict::TimeLimitExceeded),
            JudgeStatus::WrongAnswer => Some(Verdict::WrongAnswer),
            JudgeStatus::Accepted => Some(Verdict::Accepted),
            JudgeStatus::InQueue | JudgeStatus::Processing | JudgeStatus::Unknown(_) => None,
        }
    }
}

/// Terminal grading outcome of one test case.
///
/// Variants are declared in precedence order: the smallest verdict across a
/// batch decides the submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    InternalError,
    CompileError,
    RuntimeError,
    TimeLimitExceeded,
    WrongAnswer,
    Accepted,
}

impl Verdict {
    /// 0 is the highest precedence.
    pub fn priority(self) -> u8 {
        self as u8
    }
}

impl From<Verdict> for SubmissionStatus {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::InternalError => SubmissionStatus::InternalError,
            Verdict::CompileError => SubmissionStatus::CompileError,
            Verdict::RuntimeError => SubmissionStatus::RuntimeError,
            Verdict::TimeLimitExceeded => SubmissionStatus::TimeLimitExceeded,
            Verdict::WrongAnswer => SubmissionStatus::WrongAnswer,
            Verdict::Accepted => SubmissionStatus::Accepted,
        }
    }
}
