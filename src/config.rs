//! TOML configuration with environment overrides.
//!
//! Every section has defaults, so a missing file is not an error unless the
//! caller named one explicitly. `GITLAB_URL` and `GITLAB_API_KEY` override
//! the `[gitlab]` section.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::error::SearchError;

pub const ENV_GITLAB_URL: &str = "GITLAB_URL";
pub const ENV_GITLAB_API_KEY: &str = "GITLAB_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub gitlab: GitLabConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub projects: ProjectsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GitLabConfig {
    /// Instance base URL, e.g. `https://gitlab.example.com`.
    #[serde(default)]
    pub url: Option<String>,
    /// Personal or project access token.
    #[serde(default)]
    pub token: Option<String>,
}

/// Validated GitLab endpoint and token.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub base_url: String,
    pub token: String,
}

impl GitLabConfig {
    /// Returns the endpoint and token, or a configuration error when either
    /// is missing or blank.
    pub fn credentials(&self) -> Result<Credentials, SearchError> {
        let url = self.url.as_deref().map(str::trim).unwrap_or_default();
        let token = self.token.as_deref().map(str::trim).unwrap_or_default();
        if url.is_empty() || token.is_empty() {
            return Err(SearchError::Configuration);
        }
        Ok(Credentials {
            base_url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    10
}
fn default_timeout() -> u64 {
    30
}
fn default_user_agent() -> String {
    "GitLab-MultiProject-Search".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Pool size shared by every project's issue and wiki requests.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Pool size for the per-issue notes fan-out.
    #[serde(default = "default_notes_concurrency")]
    pub notes_concurrency: usize,
    /// Characters of context kept on each side of a match.
    #[serde(default = "default_excerpt_window")]
    pub excerpt_window: usize,
    #[serde(default = "default_per_page")]
    pub issues_per_page: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            notes_concurrency: default_notes_concurrency(),
            excerpt_window: default_excerpt_window(),
            issues_per_page: default_per_page(),
        }
    }
}

fn default_concurrency() -> usize {
    5
}
fn default_notes_concurrency() -> usize {
    10
}
fn default_excerpt_window() -> usize {
    150
}
fn default_per_page() -> u32 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProjectsConfig {
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Hard stop for link-header pagination.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl Default for ProjectsConfig {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
            max_pages: default_max_pages(),
        }
    }
}

fn default_max_pages() -> u32 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Load configuration from `path` (if given), then apply environment
/// overrides and validate.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            parse_config(&content)?
        }
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Parse a TOML document into a [`Config`] without touching the environment.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

/// Overlay `GITLAB_URL` / `GITLAB_API_KEY` onto the `[gitlab]` section.
///
/// Blank variables are ignored so an empty export does not wipe a value from
/// the file.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    if let Some(url) = non_blank(ENV_GITLAB_URL) {
        config.gitlab.url = Some(url);
    }
    if let Some(token) = non_blank(ENV_GITLAB_API_KEY) {
        config.gitlab.token = Some(token);
    }
}

pub fn validate(config: &Config) -> Result<()> {
    if config.http.connect_timeout_secs == 0 || config.http.timeout_secs == 0 {
        anyhow::bail!("http timeouts must be > 0");
    }
    if config.search.concurrency == 0 || config.search.notes_concurrency == 0 {
        anyhow::bail!("search.concurrency and search.notes_concurrency must be > 0");
    }
    if config.search.notes_concurrency < config.search.concurrency {
        anyhow::bail!(
            "search.notes_concurrency ({}) must be >= search.concurrency ({})",
            config.search.notes_concurrency,
            config.search.concurrency
        );
    }
    if config.search.excerpt_window == 0 {
        anyhow::bail!("search.excerpt_window must be > 0");
    }
    if config.search.issues_per_page == 0 || config.projects.per_page == 0 {
        anyhow::bail!("per_page values must be > 0");
    }
    if config.projects.max_pages == 0 {
        anyhow::bail!("projects.max_pages must be > 0");
    }
    if let Some(url) = config.gitlab.url.as_deref() {
        let url = url.trim();
        if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("gitlab.url must start with http:// or https://, got '{}'", url);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.http.connect_timeout_secs, 10);
        assert_eq!(cfg.http.timeout_secs, 30);
        assert_eq!(cfg.search.concurrency, 5);
        assert_eq!(cfg.search.excerpt_window, 150);
        assert_eq!(cfg.projects.max_pages, 10);
        assert!(cfg.gitlab.url.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let cfg = parse_config(
            r#"
[gitlab]
url = "https://gitlab.example.com/"

[search]
notes_concurrency = 20
"#,
        )
        .unwrap();
        assert_eq!(cfg.search.notes_concurrency, 20);
        assert_eq!(cfg.search.concurrency, 5);
        assert_eq!(cfg.gitlab.url.as_deref(), Some("https://gitlab.example.com/"));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut cfg = parse_config("[gitlab]\nurl = \"https://a.example\"\ntoken = \"file\"\n").unwrap();
        apply_env_overrides(&mut cfg, |key| match key {
            ENV_GITLAB_API_KEY => Some("from-env".to_string()),
            ENV_GITLAB_URL => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(cfg.gitlab.token.as_deref(), Some("from-env"));
        assert_eq!(cfg.gitlab.url.as_deref(), Some("https://a.example"));
    }

    #[test]
    fn test_credentials_require_url_and_token() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.gitlab.credentials(),
            Err(SearchError::Configuration)
        ));

        cfg.gitlab.url = Some("https://gitlab.example.com/".to_string());
        assert!(cfg.gitlab.credentials().is_err());

        cfg.gitlab.token = Some("secret".to_string());
        let creds = cfg.gitlab.credentials().unwrap();
        assert_eq!(creds.base_url, "https://gitlab.example.com");
        assert_eq!(creds.token, "secret");
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut cfg = Config::default();
        cfg.search.concurrency = 0;
        assert!(validate(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.projects.max_pages = 0;
        assert!(validate(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.gitlab.url = Some("gitlab.example.com".to_string());
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_validate_notes_pool_not_below_listing_pool() {
        let mut cfg = Config::default();
        cfg.search.concurrency = 8;
        cfg.search.notes_concurrency = 4;
        let err = validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("notes_concurrency (4)"));

        cfg.search.notes_concurrency = 8;
        assert!(validate(&cfg).is_ok());

        let cfg = parse_config("[search]\nconcurrency = 12\n").unwrap();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glms.toml");
        std::fs::write(&path, "[search]\nconcurrency = 8\n\n[server]\nbind = \"0.0.0.0:9000\"\n")
            .unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.search.concurrency, 8);
        assert_eq!(cfg.server.bind, "0.0.0.0:9000");

        let missing = dir.path().join("absent.toml");
        let err = load_config(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
