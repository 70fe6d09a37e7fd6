//! ChatTrace configuration
//!
//! Global (~/.config/chattrace/) and project-local (.chattrace/) JSON config,
//! project values overriding global ones.

use crate::storage::JsonStore;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Config file name
pub const TRACE_CONFIG_FILE: &str = "config.json";

/// ChatTrace configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceConfig {
    /// Bound on every git subprocess call, in seconds
    #[serde(default = "default_git_timeout_secs")]
    pub git_timeout_secs: u64,

    /// Persisted history entries kept per conversation
    #[serde(default = "default_history_cache_limit")]
    pub history_cache_limit: usize,

    /// Affected-file count above which a revert preview warns
    #[serde(default = "default_revert_file_warning_threshold")]
    pub revert_file_warning_threshold: usize,

    /// Maximum length of the AI-response text embedded in commit trailers
    #[serde(default = "default_response_trailer_max_len")]
    pub response_trailer_max_len: usize,
}

fn default_git_timeout_secs() -> u64 {
    30
}

fn default_history_cache_limit() -> usize {
    10
}

fn default_revert_file_warning_threshold() -> usize {
    10
}

fn default_response_trailer_max_len() -> usize {
    200
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            git_timeout_secs: default_git_timeout_secs(),
            history_cache_limit: default_history_cache_limit(),
            revert_file_warning_threshold: default_revert_file_warning_threshold(),
            response_trailer_max_len: default_response_trailer_max_len(),
        }
    }
}

impl TraceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merged load: global first, then project overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        if let Ok(global) = JsonStore::global() {
            if let Some(global_config) = global.load_optional::<TraceConfig>(TRACE_CONFIG_FILE)? {
                config = global_config;
            }
        }

        if let Ok(project) = JsonStore::current_project() {
            if let Some(project_config) =
                project.load_optional::<TraceConfig>(TRACE_CONFIG_FILE)?
            {
                config = project_config;
            }
        }

        Ok(config)
    }

    /// Save as project-local config
    pub fn save_project(&self) -> Result<()> {
        let store = JsonStore::current_project()?;
        store.save(TRACE_CONFIG_FILE, self)
    }

    /// Save as global config
    pub fn save_global(&self) -> Result<()> {
        let store = JsonStore::global()?;
        store.save(TRACE_CONFIG_FILE, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TraceConfig::default();
        assert_eq!(config.git_timeout_secs, 30);
        assert_eq!(config.history_cache_limit, 10);
        assert_eq!(config.revert_file_warning_threshold, 10);
        assert_eq!(config.response_trailer_max_len, 200);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TraceConfig = serde_json::from_str(r#"{"gitTimeoutSecs": 5}"#).expect("parse");
        assert_eq!(config.git_timeout_secs, 5);
        assert_eq!(config.history_cache_limit, 10);
    }
}
