//! Configuration loader
//!
//! Loads client configuration from a file, then layers environment
//! variables on top.
//!
//! ## Loading Strategy
//! 1. If `REBOUND_CONFIG` names a file, load it (it must exist)
//! 2. Otherwise probe the standard locations for a config file
//! 3. If none is found, start from built-in defaults
//! 4. Apply `REBOUND_*` environment overrides
//! 5. Validate the resulting retry policy and transport timeouts
//!
//! ## Environment Variables
//! - `REBOUND_CONFIG`: Explicit config file path
//! - `REBOUND_MAX_ATTEMPTS`: Total attempts per call, first try included
//! - `REBOUND_BASE_DELAY_SECONDS`: Backoff delay before the first retry
//! - `REBOUND_MAX_DELAY_SECONDS`: Backoff delay cap
//! - `REBOUND_BACKOFF_FACTOR`: Backoff growth factor
//! - `REBOUND_RETRYABLE_STATUS_CODES`: Comma-separated status codes
//! - `REBOUND_RETRYABLE_ERROR_KINDS`: Comma-separated error kind tags
//! - `REBOUND_ATTEMPT_TIMEOUT_SECONDS`: Per-attempt timeout override
//! - `REBOUND_JITTER`: `equal`, `full` or `none`
//! - `REBOUND_REQUEST_TIMEOUT_SECONDS`: Transport-wide request timeout
//! - `REBOUND_CONNECT_TIMEOUT_SECONDS`: Transport connect timeout
//! - `REBOUND_USER_AGENT`: User-Agent header value
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./rebound.toml` or `./rebound.json` (current working directory)
//! 2. `./config/rebound.toml` or `./config/rebound.json`
//! 3. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use rebound_domain::{ClientConfig, ErrorKind, JitterMode, ReboundError, Result};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_VAR: &str = "REBOUND_CONFIG";

const CONFIG_FILE_NAMES: [&str; 4] =
    ["rebound.toml", "rebound.json", "config/rebound.toml", "config/rebound.json"];

/// Load configuration from the first available file and the process
/// environment
///
/// # Errors
/// Returns `ReboundError::Config` if:
/// - `REBOUND_CONFIG` points at a missing file
/// - The file format is invalid
/// - An environment override cannot be parsed
/// - The merged settings do not form a valid policy
pub fn load() -> Result<ClientConfig> {
    let explicit = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);

    let config = match explicit.or_else(probe_config_paths) {
        Some(path) => load_from_file(Some(path))?,
        None => {
            tracing::debug!("No config file found, using defaults");
            ClientConfig::default()
        }
    };

    let config = apply_env_overrides(config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Load configuration from built-in defaults and environment variables only
///
/// # Errors
/// Returns `ReboundError::Config` if a variable has an invalid value.
pub fn load_from_env() -> Result<ClientConfig> {
    let config = apply_env_overrides(ClientConfig::default(), |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `ReboundError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ReboundError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ReboundError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ReboundError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `ReboundError::Config` if format is invalid or parsing fails.
pub fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ReboundError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ReboundError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(ReboundError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches the current working directory first, then the directory of
/// the running executable.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Layer `REBOUND_*` variables over `config`
///
/// `lookup` resolves a variable name to its value; pass
/// `|key| std::env::var(key).ok()` for the process environment.
///
/// # Errors
/// Returns `ReboundError::Config` naming the first variable that fails to
/// parse.
pub fn apply_env_overrides<F>(mut config: ClientConfig, lookup: F) -> Result<ClientConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let retry = &mut config.retry;
    if let Some(value) = parse_var(&lookup, "REBOUND_MAX_ATTEMPTS")? {
        retry.max_attempts = value;
    }
    if let Some(value) = parse_var(&lookup, "REBOUND_BASE_DELAY_SECONDS")? {
        retry.base_delay_seconds = value;
    }
    if let Some(value) = parse_var(&lookup, "REBOUND_MAX_DELAY_SECONDS")? {
        retry.max_delay_seconds = value;
    }
    if let Some(value) = parse_var(&lookup, "REBOUND_BACKOFF_FACTOR")? {
        retry.backoff_factor = value;
    }
    if let Some(codes) = list_var(&lookup, "REBOUND_RETRYABLE_STATUS_CODES") {
        retry.retryable_status_codes = codes
            .iter()
            .map(|code| parse_value("REBOUND_RETRYABLE_STATUS_CODES", code))
            .collect::<Result<_>>()?;
    }
    if let Some(kinds) = list_var(&lookup, "REBOUND_RETRYABLE_ERROR_KINDS") {
        retry.retryable_error_kinds = kinds.into_iter().map(ErrorKind::from).collect();
    }
    if let Some(value) = parse_var(&lookup, "REBOUND_ATTEMPT_TIMEOUT_SECONDS")? {
        retry.attempt_timeout_seconds = Some(value);
    }
    if let Some(value) = lookup("REBOUND_JITTER") {
        retry.jitter = parse_jitter(&value)?;
    }

    let transport = &mut config.transport;
    if let Some(value) = parse_var(&lookup, "REBOUND_REQUEST_TIMEOUT_SECONDS")? {
        transport.request_timeout_seconds = value;
    }
    if let Some(value) = parse_var(&lookup, "REBOUND_CONNECT_TIMEOUT_SECONDS")? {
        transport.connect_timeout_seconds = value;
    }
    if let Some(value) = lookup("REBOUND_USER_AGENT") {
        transport.user_agent = value;
    }

    Ok(config)
}

fn validate(config: &ClientConfig) -> Result<()> {
    config.retry.to_policy()?;
    config.transport.request_timeout()?;
    config.transport.connect_timeout()?;
    Ok(())
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key).map(|raw| parse_value(key, &raw)).transpose()
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ReboundError::Config(format!("Invalid value for {key} ({raw:?}): {e}")))
}

/// Comma-separated list; empty entries are dropped
fn list_var<F>(lookup: &F, key: &str) -> Option<Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map(|raw| {
        raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
    })
}

fn parse_jitter(raw: &str) -> Result<JitterMode> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "equal" => Ok(JitterMode::Equal),
        "full" => Ok(JitterMode::Full),
        "none" => Ok(JitterMode::None),
        other => Err(ReboundError::Config(format!(
            "Invalid value for REBOUND_JITTER ({other:?}): expected equal, full or none"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use tempfile::{Builder, NamedTempFile};

    use super::*;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_all_fields() {
        let lookup = env(&[
            ("REBOUND_MAX_ATTEMPTS", "5"),
            ("REBOUND_BASE_DELAY_SECONDS", "0.5"),
            ("REBOUND_MAX_DELAY_SECONDS", "10"),
            ("REBOUND_BACKOFF_FACTOR", "3"),
            ("REBOUND_RETRYABLE_STATUS_CODES", "429, 503,"),
            ("REBOUND_RETRYABLE_ERROR_KINDS", "transport-exception,timeout"),
            ("REBOUND_ATTEMPT_TIMEOUT_SECONDS", "2.5"),
            ("REBOUND_JITTER", "FULL"),
            ("REBOUND_REQUEST_TIMEOUT_SECONDS", "60"),
            ("REBOUND_CONNECT_TIMEOUT_SECONDS", "3"),
            ("REBOUND_USER_AGENT", "orders-service/1.2"),
        ]);

        let config = apply_env_overrides(ClientConfig::default(), lookup).unwrap();

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_seconds, 0.5);
        assert_eq!(config.retry.max_delay_seconds, 10.0);
        assert_eq!(config.retry.backoff_factor, 3.0);
        assert_eq!(config.retry.retryable_status_codes, vec![429, 503]);
        assert_eq!(
            config.retry.retryable_error_kinds,
            vec![ErrorKind::TRANSPORT, ErrorKind::TIMEOUT]
        );
        assert_eq!(config.retry.attempt_timeout_seconds, Some(2.5));
        assert_eq!(config.retry.jitter, JitterMode::Full);
        assert_eq!(config.transport.request_timeout_seconds, 60.0);
        assert_eq!(config.transport.connect_timeout_seconds, 3.0);
        assert_eq!(config.transport.user_agent, "orders-service/1.2");
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_env_overrides_leave_unset_fields() {
        let config = apply_env_overrides(ClientConfig::default(), env(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_env_invalid_number_names_variable() {
        let result =
            apply_env_overrides(ClientConfig::default(), env(&[("REBOUND_MAX_ATTEMPTS", "many")]));

        match result {
            Err(ReboundError::Config(msg)) => assert!(msg.contains("REBOUND_MAX_ATTEMPTS")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_env_invalid_jitter() {
        let result =
            apply_env_overrides(ClientConfig::default(), env(&[("REBOUND_JITTER", "sometimes")]));
        assert!(matches!(result, Err(ReboundError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_inconsistent_delays() {
        let config = apply_env_overrides(
            ClientConfig::default(),
            env(&[("REBOUND_BASE_DELAY_SECONDS", "60"), ("REBOUND_MAX_DELAY_SECONDS", "1")]),
        )
        .unwrap();

        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[retry]
max_attempts = 4
retryable_status_codes = [502, 503, 504]
jitter = "none"

[transport]
user_agent = "billing/0.3"

[transport.default_headers]
"x-api-version" = "2024-01"
"#
        )
        .unwrap();

        let config = load_from_file(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.retryable_status_codes, vec![502, 503, 504]);
        assert_eq!(config.retry.jitter, JitterMode::None);
        assert_eq!(config.transport.user_agent, "billing/0.3");
        assert_eq!(
            config.transport.default_headers.get("x-api-version").map(String::as_str),
            Some("2024-01")
        );
    }

    #[test]
    fn test_load_from_json_file() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"retry": {{"max_attempts": 2, "backoff_factor": 1.5}}}}"#).unwrap();

        let config = load_from_file(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.backoff_factor, 1.5);
        assert_eq!(config.transport, ClientConfig::default().transport);
    }

    #[test]
    fn test_load_from_missing_file() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/rebound.toml")));

        match result {
            Err(ReboundError::Config(msg)) => assert!(msg.contains("not found")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[retry\nmax_attempts = ").unwrap();

        let result = load_from_file(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(ReboundError::Config(msg)) if msg.contains("TOML")));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().with_extension("yaml");

        let result = parse_config("retry: {}", &path);
        assert!(matches!(result, Err(ReboundError::Config(msg)) if msg.contains("yaml")));
    }
}
