// src/config.rs

use std::env;
use dotenvy::dotenv;

/// Default CPU time limit (seconds) when a problem leaves it unset.
pub const DEFAULT_CPU_TIME_LIMIT: f64 = 2.0;

/// Default memory limit (KiB) when a problem leaves it unset. 128 MiB.
pub const DEFAULT_MEMORY_LIMIT_KB: i64 = 128 * 1024;

/// Extra CPU time granted by the judge before killing a run.
pub const CPU_EXTRA_TIME: f64 = 0.5;

/// Wall-time limit is the CPU limit plus this slack.
pub const WALL_TIME_SLACK: f64 = 2.0;

/// Number of random bytes in an exam session token.
pub const SESSION_TOKEN_BYTES: usize = 32;

/// Role value treated as privileged by the access checks.
pub const PRIVILEGED_ROLE: &str = "admin";

/// Marker the locked exam browser puts in its user-agent.
pub const BROWSER_VENDOR_MARKER: &str = "SEB";

pub const REQUEST_HASH_HEADER: &str = "x-safeexambrowser-requesthash";
pub const CONFIG_KEY_HASH_HEADER: &str = "x-safeexambrowser-configkeyhash";
pub const SESSION_HEADER: &str = "x-exam-session";
pub const SESSION_COOKIE: &str = "exam_session";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: String,
    pub judge_url: String,
    pub judge_auth_token: Option<String>,
    pub judge_timeout_secs: u64,
    pub reconcile_interval_secs: u64,
    /// When set, integrity hashes are computed over this base instead of the Host header.
    pub public_base_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let judge_url = env::var("JUDGE_URL")
            .unwrap_or_else(|_| "http://localhost:2358".to_string());

        let judge_auth_token = env::var("JUDGE_AUTH_TOKEN").ok().filter(|t| !t.is_empty());

        let judge_timeout_secs = env::var("JUDGE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let reconcile_interval_secs = env::var("RECONCILE_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        let public_base_url = env::var("PUBLIC_BASE_URL").ok().filter(|u| !u.is_empty());

        Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            judge_url,
            judge_auth_token,
            judge_timeout_secs,
            reconcile_interval_secs,
            public_base_url,
        }
    }

    /// Configuration for tests and local tooling that never touches the environment.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            database_url: String::new(),
            jwt_secret: jwt_secret.to_string(),
            rust_log: "error".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            judge_url: "http://127.0.0.1:2358".to_string(),
            judge_auth_token: None,
            judge_timeout_secs: 5,
            reconcile_interval_secs: 60,
            public_base_url: None,
        }
    }
}
