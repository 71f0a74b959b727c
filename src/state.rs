use std::sync::Arc;

use crate::{config::Config, sanitizer::Policy};
use axum::extract::FromRef;

/// Shared by every handler. The policy is immutable, so handlers read it
/// concurrently without locking.
#[derive(Clone)]
pub struct AppState {
    pub policy: Arc<Policy>,
    pub config: Config,
}

impl FromRef<AppState> for Arc<Policy> {
    fn from_ref(state: &AppState) -> Self {
        state.policy.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
