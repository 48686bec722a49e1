// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{config::Config, judge::JudgeClient, repository::Store};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub judge: Arc<dyn JudgeClient>,
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn Store> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Arc<dyn JudgeClient> {
    fn from_ref(state: &AppState) -> Self {
        state.judge.clone()
    }
}
