//! Protocol adapter configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const TEST_ENVIRONMENT: &str = "test";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Application environment name; "test" disables process exit after CLI queries.
    pub environment: String,
    /// When set, replaces every error message shown to clients by `exception`.
    pub exception_message: Option<String>,
    /// View rendered for HTML exception pages.
    pub error_view: String,
    pub inflection_cache_capacity: usize,
    /// Explicit CLI exit policy. None: exit unless environment is "test".
    pub exit_on_cli_complete: Option<bool>,
    /// When set, create/update redirects go to `{prefix}/{model}/` instead of the referer-relative path.
    pub redirect_prefix: Option<String>,
    /// Default template extension (with leading dot).
    pub template_ext: String,
    /// Directories searched for view templates, in order.
    pub view_dirs: Vec<PathBuf>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            environment: "development".into(),
            exception_message: None,
            error_view: "home/error500".into(),
            inflection_cache_capacity: crate::inflect::DEFAULT_INFLECTION_CAPACITY,
            exit_on_cli_complete: None,
            redirect_prefix: None,
            template_ext: ".html".into(),
            view_dirs: Vec::new(),
        }
    }
}

impl ProtocolConfig {
    pub fn is_test(&self) -> bool {
        self.environment == TEST_ENVIRONMENT
    }

    pub fn cli_should_exit(&self) -> bool {
        self.exit_on_cli_complete.unwrap_or(!self.is_test())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_exit_follows_environment_unless_explicit() {
        let mut config = ProtocolConfig::default();
        assert!(config.cli_should_exit());
        config.environment = "test".into();
        assert!(!config.cli_should_exit());
        config.exit_on_cli_complete = Some(true);
        assert!(config.cli_should_exit());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: ProtocolConfig =
            serde_json::from_str(r#"{ "exception_message": "Hello World" }"#).unwrap();
        assert_eq!(config.exception_message.as_deref(), Some("Hello World"));
        assert_eq!(config.error_view, "home/error500");
        assert_eq!(config.template_ext, ".html");
    }
}
