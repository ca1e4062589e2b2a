//! Load protocol config from environment variables (after `dotenvy::dotenv()` in binaries) or a JSON file.

use crate::config::ProtocolConfig;
use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Read `PROTOCOLS_*` variables over the defaults. Unset variables keep their default.
pub fn from_env() -> Result<ProtocolConfig, ConfigError> {
    from_lookup(|key| std::env::var(key).ok())
}

/// Same as [`from_env`] with an injectable lookup (used by tests).
pub fn from_lookup<F>(lookup: F) -> Result<ProtocolConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ProtocolConfig::default();
    if let Some(env) = lookup("PROTOCOLS_ENVIRONMENT") {
        config.environment = env;
    }
    if let Some(msg) = lookup("PROTOCOLS_EXCEPTION_MESSAGE").filter(|s| !s.is_empty()) {
        config.exception_message = Some(msg);
    }
    if let Some(view) = lookup("PROTOCOLS_ERROR_VIEW") {
        config.error_view = view;
    }
    if let Some(cap) = lookup("PROTOCOLS_INFLECTION_CACHE") {
        config.inflection_cache_capacity = cap
            .parse()
            .map_err(|_| ConfigError::Load(format!("PROTOCOLS_INFLECTION_CACHE: invalid number '{}'", cap)))?;
    }
    if let Some(prefix) = lookup("PROTOCOLS_REDIRECT_PREFIX").filter(|s| !s.is_empty()) {
        config.redirect_prefix = Some(prefix);
    }
    if let Some(ext) = lookup("PROTOCOLS_TEMPLATE_EXT") {
        config.template_ext = ext;
    }
    if let Some(dirs) = lookup("PROTOCOLS_VIEW_DIRS") {
        config.view_dirs = dirs
            .split(':')
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();
    }
    if let Some(exit) = lookup("PROTOCOLS_CLI_EXIT") {
        config.exit_on_cli_complete = Some(parse_bool("PROTOCOLS_CLI_EXIT", &exit)?);
    }
    Ok(config)
}

/// Load from a JSON file; missing keys take defaults.
pub async fn from_json_file(path: &Path) -> Result<ProtocolConfig, ConfigError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

fn parse_bool(key: &str, s: &str) -> Result<bool, ConfigError> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::Load(format!("{}: expected boolean, got '{}'", key, s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn reads_overrides() {
        let config = from_lookup(lookup_from(&[
            ("PROTOCOLS_ENVIRONMENT", "test"),
            ("PROTOCOLS_INFLECTION_CACHE", "4"),
            ("PROTOCOLS_VIEW_DIRS", "views:themes/default/views"),
            ("PROTOCOLS_CLI_EXIT", "no"),
        ]))
        .unwrap();
        assert!(config.is_test());
        assert_eq!(config.inflection_cache_capacity, 4);
        assert_eq!(config.view_dirs.len(), 2);
        assert_eq!(config.exit_on_cli_complete, Some(false));
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = from_lookup(lookup_from(&[("PROTOCOLS_INFLECTION_CACHE", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[tokio::test]
    async fn json_file_fills_missing_keys_with_defaults() {
        let path = std::env::temp_dir().join(format!("protocols-config-{}.json", std::process::id()));
        tokio::fs::write(&path, r#"{ "environment": "production", "exception_message": "oops" }"#)
            .await
            .unwrap();
        let config = from_json_file(&path).await.unwrap();
        tokio::fs::remove_file(&path).await.ok();
        assert_eq!(config.environment, "production");
        assert_eq!(config.exception_message.as_deref(), Some("oops"));
        assert_eq!(config.error_view, "home/error500");
        assert!(config.cli_should_exit());

        let missing = from_json_file(Path::new("/nonexistent/protocols.json")).await.unwrap_err();
        assert!(matches!(missing, ConfigError::Load(_)));
    }
}
