//! Environment Configuration Loader
//!
//! Loads plugin-wide settings from the process environment, optionally
//! seeded from an env file. Per-node configuration is not handled here: the
//! host resolves it and hands each node a JSON value.
//!
//! ## Usage
//!
//! ```rust
//! use flow_core::config::FlowSettings;
//!
//! let settings = FlowSettings::from_env();
//! assert!(settings.service_timeout.as_millis() > 0);
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Env files to check, in order of priority
pub const ENV_FILE_PATHS: &[&str] = &[".env"];

/// Default expiry for pending service requests
pub const DEFAULT_SERVICE_TIMEOUT_MS: i64 = 30_000;

/// Default tracing filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "flow_core=info,flow_nodes=info";

/// Load environment variables from the configured env file.
///
/// This function:
/// 1. Checks `FLOW_ENV_FILE` first
/// 2. Falls back to `.env` in the current directory
/// 3. Does NOT override existing environment variables
///
/// Returns the path that was loaded, or None if no file was found.
pub fn load_environment() -> Option<String> {
    if let Ok(custom_path) = std::env::var("FLOW_ENV_FILE") {
        if let Some(path) = try_load_env_file(&custom_path) {
            return Some(path);
        }
    }

    for path in ENV_FILE_PATHS {
        if let Some(loaded_path) = try_load_env_file(path) {
            return Some(loaded_path);
        }
    }

    debug!("No environment file found, using existing environment");
    None
}

fn try_load_env_file(path: &str) -> Option<String> {
    let path_obj = Path::new(path);

    if !path_obj.exists() {
        return None;
    }

    match fs::read_to_string(path_obj) {
        Ok(content) => {
            let mut loaded_count = 0;
            let mut skipped_count = 0;

            for line in content.lines() {
                let line = line.trim();

                if line.is_empty() || line.starts_with('#') {
                    continue;
                }

                if let Some((key, value)) = parse_env_line(line) {
                    if std::env::var(&key).is_err() {
                        std::env::set_var(&key, &value);
                        loaded_count += 1;
                        debug!("Loaded: {}", key);
                    } else {
                        skipped_count += 1;
                        debug!("Skipped (already set): {}", key);
                    }
                }
            }

            info!(
                "Loaded {} environment variables from {} ({} skipped - already set)",
                loaded_count, path, skipped_count
            );

            Some(path.to_string())
        }
        Err(e) => {
            warn!("Failed to read environment file {}: {}", path, e);
            None
        }
    }
}

/// Parse a single environment line into key-value pair.
fn parse_env_line(line: &str) -> Option<(String, String)> {
    // KEY=VALUE, KEY="VALUE", KEY='VALUE'
    let mut parts = line.splitn(2, '=');
    let key = parts.next()?.trim();
    let value = parts.next()?.trim();

    if key.is_empty() {
        return None;
    }

    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);

    Some((key.to_string(), value.to_string()))
}

/// Get a configuration value with a default.
pub fn get_config(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an integer configuration value.
pub fn get_config_int(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Plugin-wide settings
#[derive(Debug, Clone)]
pub struct FlowSettings {
    /// Expiry applied to every pending service request
    pub service_timeout: Duration,
    /// Log output format
    pub log_format: LogFormat,
    /// Filter directives used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            service_timeout: Duration::from_millis(DEFAULT_SERVICE_TIMEOUT_MS as u64),
            log_format: LogFormat::Text,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl FlowSettings {
    /// Read settings from `FLOW_*` environment variables, after seeding
    /// unset ones from the env file.
    pub fn from_env() -> Self {
        load_environment();

        let timeout_ms = get_config_int("FLOW_SERVICE_TIMEOUT_MS", DEFAULT_SERVICE_TIMEOUT_MS);
        // Non-positive values fall back to the default expiry
        let timeout_ms = if timeout_ms > 0 {
            timeout_ms as u64
        } else {
            DEFAULT_SERVICE_TIMEOUT_MS as u64
        };

        let log_format = match get_config("FLOW_LOG_FORMAT", "text").to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            service_timeout: Duration::from_millis(timeout_ms),
            log_format,
            log_filter: get_config("FLOW_LOG_FILTER", DEFAULT_LOG_FILTER),
        }
    }

    /// Override the service timeout
    pub fn with_service_timeout(mut self, timeout: Duration) -> Self {
        self.service_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_line_simple() {
        let (k, v) = parse_env_line("FOO=bar").unwrap();
        assert_eq!(k, "FOO");
        assert_eq!(v, "bar");
    }

    #[test]
    fn test_parse_env_line_quoted() {
        let (k, v) = parse_env_line("FOO=\"bar baz\"").unwrap();
        assert_eq!(k, "FOO");
        assert_eq!(v, "bar baz");
    }

    #[test]
    fn test_parse_env_line_single_quoted() {
        let (_, v) = parse_env_line("FOO='bar'").unwrap();
        assert_eq!(v, "bar");
    }

    #[test]
    fn test_parse_env_line_empty() {
        assert!(parse_env_line("").is_none());
        assert!(parse_env_line("=value").is_none());
    }

    #[test]
    fn test_env_file_does_not_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.env");
        fs::write(
            &path,
            "# comment\nFLOW_TEST_LOADED=yes\nFLOW_TEST_PRESET=from_file\n",
        )
        .unwrap();
        std::env::set_var("FLOW_TEST_PRESET", "from_env");

        let loaded = try_load_env_file(path.to_str().unwrap());
        assert!(loaded.is_some());
        assert_eq!(get_config("FLOW_TEST_LOADED", "no"), "yes");
        assert_eq!(get_config("FLOW_TEST_PRESET", ""), "from_env");
    }

    #[test]
    fn test_default_settings() {
        let settings = FlowSettings::default();
        assert_eq!(settings.service_timeout, Duration::from_secs(30));
        assert_eq!(settings.log_format, LogFormat::Text);
        assert_eq!(settings.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_config_helpers() {
        std::env::set_var("FLOW_TEST_INT", "42");
        assert_eq!(get_config_int("FLOW_TEST_INT", 0), 42);
        assert_eq!(get_config_int("FLOW_TEST_MISSING_INT", 7), 7);
        assert_eq!(get_config("FLOW_TEST_MISSING", "fallback"), "fallback");
    }

    #[test]
    fn test_settings_from_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.env");
        fs::write(
            &path,
            "FLOW_SERVICE_TIMEOUT_MS=1500\nFLOW_LOG_FORMAT=JSON\nFLOW_LOG_FILTER=flow_nodes=debug\n",
        )
        .unwrap();
        std::env::set_var("FLOW_ENV_FILE", &path);

        let settings = FlowSettings::from_env();
        assert_eq!(settings.service_timeout, Duration::from_millis(1500));
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.log_filter, "flow_nodes=debug");
    }
}
