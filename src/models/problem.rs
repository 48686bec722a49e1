// src/models/problem.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::config::{DEFAULT_CPU_TIME_LIMIT, DEFAULT_MEMORY_LIMIT_KB};

/// Represents the 'problems' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Problem {
    pub id: i64,
    pub exam_id: i64,
    pub title: String,

    /// CPU time limit in seconds. Unset means the platform default.
    pub cpu_time_limit: Option<f64>,

    /// Memory limit in KiB. Unset means the platform default.
    pub memory_limit: Option<i64>,
}

impl Problem {
    /// Effective (cpu seconds, memory KiB), falling back to defaults
    /// for unset or non-positive values.
    pub fn limits(&self) -> (f64, i64) {
        let cpu = self
            .cpu_time_limit
            .filter(|v| *v > 0.0)
            .unwrap_or(DEFAULT_CPU_TIME_LIMIT);
        let memory = self
            .memory_limit
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MEMORY_LIMIT_KB);
        (cpu, memory)
    }
}

/// Represents the 'test_cases' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TestCase {
    pub id: i64,
    pub problem_id: i64,
    pub input: String,
    pub output: String,
}

/// Represents the 'languages' table.
/// `judge_language_id` is the judge's own identifier for the language.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Language {
    pub id: i64,
    pub name: String,
    pub judge_language_id: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let problem = Problem {
            id: 1,
            exam_id: 1,
            title: "A".to_string(),
            cpu_time_limit: None,
            memory_limit: None,
        };
        assert_eq!(problem.limits(), (2.0, 131072));
    }

    #[test]
    fn test_configured_limits() {
        let problem = Problem {
            id: 1,
            exam_id: 1,
            title: "A".to_string(),
            cpu_time_limit: Some(1.5),
            memory_limit: Some(65536),
        };
        assert_eq!(problem.limits(), (1.5, 65536));
    }
}
