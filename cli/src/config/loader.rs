//! Simple CLI configuration loader for ctxsync
//!
//! Implements single-source priority loading with flag overrides:
//! 1. --config file/dir (highest priority)
//! 2. Project directory: ./ctxsync.json or ./.ctxsync/config.json
//! 3. Git repository root: <repo_root>/.ctxsync/config.json
//! 4. User config dir: <config_dir>/ctxsync/config.json
//! 5. Environment variables only (no files)
//!
//! `CTXSYNC_BASE_URL` and `CTXSYNC_TOKEN` fill whatever the chosen source leaves unset.

use anyhow::{anyhow, Context, Result};
use ctxsync_core::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const BASE_URL_ENV: &str = "CTXSYNC_BASE_URL";
pub const TOKEN_ENV: &str = "CTXSYNC_TOKEN";

const CONFIG_DIR_NAME: &str = ".ctxsync";
const CONFIG_FILE_NAME: &str = "config.json";
const PROJECT_CONFIG_FILE: &str = "ctxsync.json";

/// Raw configuration file format; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// Retrieval service base URL
    pub base_url: Option<String>,
    /// API token (can be "env:VAR_NAME" for environment variable)
    pub token: Option<String>,
    pub batch_size: Option<usize>,
    pub max_lines_per_blob: Option<usize>,
    /// Replaces the default extension allow-list
    pub text_extensions: Option<Vec<String>>,
    /// Appended to the default exclude patterns
    pub exclude_patterns: Option<Vec<String>>,
    pub guidance: Option<String>,
    pub max_retries: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

/// CLI configuration loader
pub struct CliConfigLoader {
    /// Directory searched first and used as the start of the git root search
    project_dir: PathBuf,
    /// Override config file/directory path
    config_override: Option<PathBuf>,
    /// Flag overrides
    base_url_override: Option<String>,
    token_override: Option<String>,
}

impl CliConfigLoader {
    /// Create a new loader for `project_dir`
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            config_override: None,
            base_url_override: None,
            token_override: None,
        }
    }

    /// Set config file/directory override
    pub fn with_config_override(mut self, path: PathBuf) -> Self {
        self.config_override = Some(path);
        self
    }

    /// Set base URL override
    pub fn with_base_url_override(mut self, base_url: String) -> Self {
        self.base_url_override = Some(base_url);
        self
    }

    /// Set token override
    pub fn with_token_override(mut self, token: String) -> Self {
        self.token_override = Some(token);
        self
    }

    /// Load and resolve configuration
    pub async fn load(&self) -> Result<EngineConfig> {
        // Step 1: Find and load base configuration
        let mut config = if let Some(override_path) = &self.config_override {
            self.load_from_path(override_path).await.with_context(|| {
                format!(
                    "Failed to load config from override path: {}",
                    override_path.display()
                )
            })?
        } else {
            self.search_and_load().await?
        };

        // Step 2: Apply flag overrides, then environment for anything still unset
        if let Some(base_url) = &self.base_url_override {
            config.base_url = Some(base_url.clone());
        }
        if let Some(token) = &self.token_override {
            config.token = Some(token.clone());
        }
        if config.base_url.is_none() {
            config.base_url = std::env::var(BASE_URL_ENV).ok();
        }
        if config.token.is_none() {
            config.token = std::env::var(TOKEN_ENV).ok();
        }

        // Step 3: Resolve to final engine config
        resolve_config(config)
    }

    /// Search for config in priority order
    async fn search_and_load(&self) -> Result<RawConfig> {
        // 1. Project directory
        if let Some(config) = self.try_load_project().await? {
            return Ok(config);
        }

        // 2. Git repository root
        if let Some(config) = self.try_load_git_root().await? {
            return Ok(config);
        }

        // 3. User config directory
        if let Some(config) = self.try_load_user().await? {
            return Ok(config);
        }

        // 4. Environment variables only
        Ok(RawConfig::default())
    }

    async fn try_load_project(&self) -> Result<Option<RawConfig>> {
        let project_json = self.project_dir.join(PROJECT_CONFIG_FILE);
        if project_json.exists() {
            return Ok(Some(load_file(&project_json).await?));
        }

        let dir_config = self.project_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
        if dir_config.exists() {
            return Ok(Some(load_file(&dir_config).await?));
        }

        Ok(None)
    }

    async fn try_load_git_root(&self) -> Result<Option<RawConfig>> {
        if let Some(git_root) = find_git_root(&self.project_dir) {
            let config_path = git_root.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Ok(Some(load_file(&config_path).await?));
            }
        }
        Ok(None)
    }

    async fn try_load_user(&self) -> Result<Option<RawConfig>> {
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("ctxsync").join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Ok(Some(load_file(&config_path).await?));
            }
        }
        Ok(None)
    }

    /// Load configuration from a specific path (file or directory)
    async fn load_from_path(&self, path: &Path) -> Result<RawConfig> {
        if path.is_file() {
            load_file(path).await
        } else if path.is_dir() {
            let config_file = path.join(CONFIG_FILE_NAME);
            if config_file.exists() {
                load_file(&config_file).await
            } else {
                Err(anyhow!(
                    "No config.json found in directory: {}",
                    path.display()
                ))
            }
        } else {
            Err(anyhow!("Config path does not exist: {}", path.display()))
        }
    }
}

/// Load a single config file
async fn load_file(path: &Path) -> Result<RawConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Nearest ancestor of `start` containing `.git`
fn find_git_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

/// Expand `~` and `$VAR` in a user-supplied path
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => path.to_path_buf(),
    }
}

/// Resolve raw config to a validated EngineConfig
pub fn resolve_config(config: RawConfig) -> Result<EngineConfig> {
    let base_url = config.base_url.ok_or_else(|| {
        anyhow!(
            "No base URL configured. Set base_url in ctxsync.json, pass --base-url or set {}",
            BASE_URL_ENV
        )
    })?;

    let token = config.token.ok_or_else(|| {
        anyhow!(
            "No API token configured. Set token in ctxsync.json, pass --token or set {}",
            TOKEN_ENV
        )
    })?;

    // Resolve API token (handle env: prefix)
    let token = match token.strip_prefix("env:") {
        Some(var_name) => std::env::var(var_name)
            .with_context(|| format!("Environment variable not found: {}", var_name))?,
        None => token,
    };

    let mut resolved = EngineConfig::new(base_url, token);
    if let Some(batch_size) = config.batch_size {
        resolved = resolved.with_batch_size(batch_size);
    }
    if let Some(max_lines) = config.max_lines_per_blob {
        resolved = resolved.with_max_lines_per_blob(max_lines);
    }
    if let Some(extensions) = config.text_extensions {
        resolved = resolved.with_text_extensions(extensions);
    }
    if let Some(patterns) = config.exclude_patterns {
        let mut all = resolved.exclude_patterns.clone();
        all.extend(patterns);
        resolved = resolved.with_exclude_patterns(all);
    }
    if let Some(guidance) = config.guidance {
        resolved = resolved.with_guidance(guidance);
    }
    if config.max_retries.is_some() || config.retry_base_delay_ms.is_some() {
        let max_retries = config.max_retries.unwrap_or(resolved.max_retries);
        let base_delay_ms = config
            .retry_base_delay_ms
            .unwrap_or(resolved.retry_base_delay_ms);
        resolved = resolved.with_retry(max_retries, base_delay_ms);
    }
    if let Some(timeout) = config.request_timeout_secs {
        resolved.request_timeout_secs = timeout;
    }

    resolved
        .validate()
        .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(path: &Path, json: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, json).unwrap();
    }

    #[tokio::test]
    async fn test_project_file_takes_priority() {
        let temp_dir = TempDir::new().unwrap();
        write_config(
            &temp_dir.path().join("ctxsync.json"),
            r#"{"base_url": "https://a.example.com", "token": "t1", "batch_size": 4}"#,
        );
        write_config(
            &temp_dir.path().join(".ctxsync/config.json"),
            r#"{"base_url": "https://b.example.com", "token": "t2"}"#,
        );

        let config = CliConfigLoader::new(temp_dir.path()).load().await.unwrap();
        assert_eq!(config.base_url, "https://a.example.com");
        assert_eq!(config.api_token, "t1");
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.max_lines_per_blob, 800);
    }

    #[tokio::test]
    async fn test_flags_override_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.json");
        write_config(&path, r#"{"base_url": "https://a.example.com", "token": "t1"}"#);

        let config = CliConfigLoader::new(temp_dir.path())
            .with_config_override(path)
            .with_token_override("flag-token".to_string())
            .load()
            .await
            .unwrap();

        assert_eq!(config.api_token, "flag-token");
        assert_eq!(config.base_url, "https://a.example.com");
    }

    #[tokio::test]
    async fn test_override_directory_without_config_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = CliConfigLoader::new(temp_dir.path())
            .with_config_override(temp_dir.path().to_path_buf())
            .load()
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_token_from_environment_reference() {
        std::env::set_var("CTXSYNC_LOADER_TEST_TOKEN", "secret");
        let config = resolve_config(RawConfig {
            base_url: Some("https://example.com".to_string()),
            token: Some("env:CTXSYNC_LOADER_TEST_TOKEN".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.api_token, "secret");
    }

    #[test]
    fn test_optional_fields_take_defaults() {
        let config = resolve_config(RawConfig {
            base_url: Some("https://example.com".to_string()),
            token: Some("t".to_string()),
            max_retries: Some(5),
            text_extensions: Some(vec!["PY".to_string()]),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_base_delay_ms, 1000);

        let config = resolve_config(RawConfig {
            base_url: Some("https://example.com".to_string()),
            token: Some("t".to_string()),
            retry_base_delay_ms: Some(250),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay_ms, 250);
        assert!(config.allows_extension(".py"));
        assert!(!config.allows_extension(".rs"));
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = resolve_config(RawConfig {
            base_url: Some("ftp://example.com".to_string()),
            token: Some("t".to_string()),
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_find_git_root_walks_up() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join(".git")).unwrap();
        let nested = temp_dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_git_root(&nested), Some(temp_dir.path().to_path_buf()));
    }
}
