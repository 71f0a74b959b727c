// src/config.rs

use std::{env, net::SocketAddr, path::PathBuf};

use dotenvy::dotenv;

use crate::{
    error::AppError,
    sanitizer::{Policy, Preset, policy::config::PolicyConfig},
};

/// Default cap on request bodies for the HTTP service (1 MiB).
pub const DEFAULT_MAX_INPUT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    /// JSON policy file; overrides the preset when set.
    pub policy_file: Option<PathBuf>,
    pub max_input_bytes: usize,
    /// Directory for daily-rolling log files. Stdout only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rust_log: "info".to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            policy_file: None,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            log_dir: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let defaults = Self::default();

        let rust_log = env::var("RUST_LOG").unwrap_or(defaults.rust_log);

        let bind_addr = match env::var("HTMLGUARD_BIND") {
            Ok(addr) => addr.parse().map_err(|e| {
                AppError::BadRequest(format!("HTMLGUARD_BIND '{addr}' is not a socket address: {e}"))
            })?,
            Err(_) => defaults.bind_addr,
        };

        let max_input_bytes = match env::var("HTMLGUARD_MAX_INPUT_BYTES") {
            Ok(raw) => raw.parse().map_err(|e| {
                AppError::BadRequest(format!("HTMLGUARD_MAX_INPUT_BYTES '{raw}' is invalid: {e}"))
            })?,
            Err(_) => defaults.max_input_bytes,
        };

        let policy_file = env::var_os("HTMLGUARD_POLICY_FILE").map(PathBuf::from);
        let log_dir = env::var_os("HTMLGUARD_LOG_DIR").map(PathBuf::from);

        Ok(Self {
            rust_log,
            bind_addr,
            policy_file,
            max_input_bytes,
            log_dir,
        })
    }

    /// Builds the policy to serve: the policy file when configured,
    /// otherwise `preset`.
    pub fn load_policy(&self, preset: Preset) -> Result<Policy, AppError> {
        match &self.policy_file {
            Some(path) => Policy::try_from(PolicyConfig::load(path)?),
            None => {
                tracing::debug!("Using built-in {} policy", preset);
                Ok(preset.policy())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_policy_falls_back_to_preset() {
        let config = Config::default();
        let policy = config.load_policy(Preset::Strict).unwrap();
        assert_eq!(policy.clean(r#"<a href="/x">t</a>"#), "t");
    }

    #[test]
    fn missing_policy_file_is_an_error() {
        let config = Config {
            policy_file: Some(PathBuf::from("/nonexistent/htmlguard-policy.json")),
            ..Config::default()
        };
        assert!(config.load_policy(Preset::Ugc).is_err());
    }
}
