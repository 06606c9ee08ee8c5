//! Application configuration for wikireq.
//!
//! User config lives at `~/.wikireq/wikireq.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WikiReqError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "wikireq.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".wikireq";

// ---------------------------------------------------------------------------
// Config structs (matching wikireq.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Confluence server settings.
    #[serde(default)]
    pub confluence: ConfluenceConfig,

    /// Retry policy for upstream calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Annotation settings.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Debug artifact output.
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[confluence]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfluenceConfig {
    /// Base URL of the Confluence server (empty = offline only).
    #[serde(default)]
    pub base_url: String,

    /// Name of the env var holding the bearer token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Space key used when a page URL does not carry one.
    #[serde(default = "default_space")]
    pub default_space: String,

    /// `numberOfRequirements` requested from the requirements endpoint.
    #[serde(default = "default_index_page_size")]
    pub index_page_size: u32,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ConfluenceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token_env: default_token_env(),
            default_space: default_space(),
            index_page_size: default_index_page_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_token_env() -> String {
    "CONFLUENCE_TOKEN".into()
}
fn default_space() -> String {
    "BJS".into()
}
fn default_index_page_size() -> u32 {
    2000
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per request, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each subsequent retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound for a single backoff delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    21_000
}

/// `[enrichment]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Truncate inserted excerpts to this many characters (unset = no limit).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt_limit: Option<usize>,
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Persist enriched markup and plain text for debugging.
    #[serde(default)]
    pub debug_artifacts: bool,

    /// Directory for debug artifacts.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            debug_artifacts: false,
            artifacts_dir: default_artifacts_dir(),
        }
    }
}

fn default_artifacts_dir() -> String {
    "wikireq-output".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.wikireq/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| WikiReqError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.wikireq/wikireq.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| WikiReqError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| WikiReqError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| WikiReqError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| WikiReqError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| WikiReqError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the bearer token from the env var named in `[confluence].token_env`.
///
/// A missing or empty variable is not an error: the request is sent anonymously.
pub fn resolve_token(config: &ConfluenceConfig) -> Option<String> {
    match std::env::var(&config.token_env) {
        Ok(val) if !val.trim().is_empty() => Some(val.trim().to_string()),
        _ => {
            tracing::debug!(var = %config.token_env, "no Confluence token set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("token_env"));
        assert!(toml_str.contains("CONFLUENCE_TOKEN"));
        assert!(toml_str.contains("artifacts_dir"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.confluence.default_space, "BJS");
        assert_eq!(parsed.confluence.index_page_size, 2000);
        assert_eq!(parsed.retry.max_attempts, 3);
        assert!(parsed.enrichment.excerpt_limit.is_none());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[confluence]
base_url = "https://wiki.example.com"

[enrichment]
excerpt_limit = 150

[output]
debug_artifacts = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.confluence.base_url, "https://wiki.example.com");
        assert_eq!(config.confluence.timeout_secs, 30);
        assert_eq!(config.enrichment.excerpt_limit, Some(150));
        assert!(config.output.debug_artifacts);
        assert_eq!(config.output.artifacts_dir, "wikireq-output");
        assert_eq!(config.retry.base_delay_ms, 500);
    }

    #[test]
    fn missing_token_resolves_to_none() {
        let config = ConfluenceConfig {
            // Use a unique env var name to avoid interfering with other tests
            token_env: "WIKIREQ_TEST_NONEXISTENT_TOKEN_12345".into(),
            ..ConfluenceConfig::default()
        };
        assert!(resolve_token(&config).is_none());
    }

    #[test]
    fn load_config_from_reports_parse_errors() {
        let dir = std::env::temp_dir().join(format!("wikireq-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.toml");
        std::fs::write(&path, "[confluence\nbase_url = ").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
