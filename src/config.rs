use anyhow::{Context, Result};
use chrono::Duration;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::auth::Token;
use crate::providers::circleci::{ClientSettings, DEFAULT_BASE_URL};

pub const MIN_POLL_INTERVAL_SECS: u64 = 1;
pub const MAX_POLL_INTERVAL_SECS: u64 = 3600;

/// Configuration file structure for circlewatch.
///
/// Loaded from the current directory or an explicit path; every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub circleci: CircleCiConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CircleCiConfig {
    /// CircleCI instance base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Only watch this organization (e.g. 'gh/acme'); all collaborations when unset
    pub organization: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PollingConfig {
    /// Seconds between poll cycles (1-3600)
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Pipelines created longer ago than this are not listed
    #[serde(default = "default_max_pipeline_age_days")]
    pub max_pipeline_age_days: i64,

    /// Workflows created longer ago than this are not shown
    #[serde(default = "default_workflow_recency_hours")]
    pub workflow_recency_hours: i64,

    /// Cap on finished (non-running) builds shown per cycle
    #[serde(default = "default_max_displayed_non_running")]
    pub max_displayed_non_running: usize,

    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Pipelines whose workflows are fetched together
    #[serde(default = "default_workflow_fetch_batch")]
    pub workflow_fetch_batch: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
}

/// Immutable settings for one poll cycle.
#[derive(Debug, Clone)]
pub struct CycleConfig {
    pub organization: Option<String>,
    pub max_pipeline_age: Duration,
    pub workflow_recency_window: Duration,
    pub max_displayed_non_running: usize,
    pub workflow_fetch_batch: usize,
}

impl Default for CycleConfig {
    fn default() -> Self {
        PollingConfig::default().cycle_config(None)
    }
}

impl Default for CircleCiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            organization: None,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            max_pipeline_age_days: default_max_pipeline_age_days(),
            workflow_recency_hours: default_workflow_recency_hours(),
            max_displayed_non_running: default_max_displayed_non_running(),
            request_timeout_seconds: default_request_timeout_seconds(),
            max_concurrent_requests: default_max_concurrent_requests(),
            workflow_fetch_batch: default_workflow_fetch_batch(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_interval_seconds() -> u64 {
    10
}

fn default_max_pipeline_age_days() -> i64 {
    14
}

fn default_workflow_recency_hours() -> i64 {
    24
}

fn default_max_displayed_non_running() -> usize {
    10
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_max_concurrent_requests() -> usize {
    8
}

fn default_workflow_fetch_batch() -> usize {
    4
}

impl PollingConfig {
    /// Poll interval clamped to 1-3600 seconds.
    pub fn interval(&self) -> std::time::Duration {
        let clamped = self
            .interval_seconds
            .clamp(MIN_POLL_INTERVAL_SECS, MAX_POLL_INTERVAL_SECS);
        if clamped != self.interval_seconds {
            warn!(
                "Poll interval {}s out of range, using {clamped}s",
                self.interval_seconds
            );
        }
        std::time::Duration::from_secs(clamped)
    }

    pub fn cycle_config(&self, organization: Option<String>) -> CycleConfig {
        CycleConfig {
            organization,
            max_pipeline_age: Duration::days(self.max_pipeline_age_days.max(1)),
            workflow_recency_window: Duration::hours(self.workflow_recency_hours.max(1)),
            max_displayed_non_running: self.max_displayed_non_running,
            workflow_fetch_batch: self.workflow_fetch_batch.max(1),
        }
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./circlewatch.toml
    /// 3. ./circlewatch.json
    /// 4. ./circlewatch.yaml
    /// 5. ./circlewatch.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = [
            "circlewatch.toml",
            "circlewatch.json",
            "circlewatch.yaml",
            "circlewatch.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    /// Save configuration to a file, in the format its extension implies.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml" | "yml") => serde_yaml::to_string(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn client_settings(&self, token: Option<Token>) -> ClientSettings {
        ClientSettings {
            base_url: self.circleci.base_url.clone(),
            token,
            request_timeout: std::time::Duration::from_secs(
                self.polling.request_timeout_seconds.max(1),
            ),
            max_concurrent_requests: self.polling.max_concurrent_requests.max(1),
        }
    }

    /// Cycle settings; an `organization` override wins over the configured one.
    pub fn cycle_config(&self, organization: Option<String>) -> CycleConfig {
        self.polling
            .cycle_config(organization.or_else(|| self.circleci.organization.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.circleci.base_url, "https://circleci.com");
        assert_eq!(config.circleci.organization, None);
        assert_eq!(config.polling.interval_seconds, 10);
        assert_eq!(config.polling.max_displayed_non_running, 10);
        assert_eq!(config.output.format, OutputFormat::Summary);
    }

    #[test]
    fn test_default_cycle_config() {
        let cycle = CycleConfig::default();
        assert_eq!(cycle.max_pipeline_age, Duration::days(14));
        assert_eq!(cycle.workflow_recency_window, Duration::hours(24));
        assert_eq!(cycle.max_displayed_non_running, 10);
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[circleci]
base-url = "https://circle.example.com"
organization = "gh/acme"

[polling]
interval-seconds = 30
max-pipeline-age-days = 7

[output]
format = "json"
pretty = true
"#;
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::load(Some(temp_file.path())).unwrap();
        assert_eq!(config.circleci.base_url, "https://circle.example.com");
        assert_eq!(config.circleci.organization, Some("gh/acme".to_string()));
        assert_eq!(config.polling.interval_seconds, 30);
        assert_eq!(config.polling.workflow_recency_hours, 24);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.pretty);

        let cycle = config.cycle_config(None);
        assert_eq!(cycle.organization.as_deref(), Some("gh/acme"));
        assert_eq!(cycle.max_pipeline_age, Duration::days(7));
    }

    #[test]
    fn test_cycle_config_organization_override() {
        let mut config = Config::default();
        config.circleci.organization = Some("gh/acme".into());

        let cycle = config.cycle_config(Some("bb/beta".into()));
        assert_eq!(cycle.organization.as_deref(), Some("bb/beta"));

        let cycle = config.cycle_config(None);
        assert_eq!(cycle.organization.as_deref(), Some("gh/acme"));
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "circleci": { "organization": "bb/beta" },
  "polling": { "max-displayed-non-running": 5 }
}"#;
        write!(temp_file, "{}", json_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.circleci.organization, Some("bb/beta".to_string()));
        assert_eq!(config.circleci.base_url, "https://circleci.com");
        assert_eq!(config.polling.max_displayed_non_running, 5);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(&dir.path().join("missing.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_interval_is_clamped() {
        let mut polling = PollingConfig::default();
        assert_eq!(polling.interval(), std::time::Duration::from_secs(10));

        polling.interval_seconds = 0;
        assert_eq!(polling.interval(), std::time::Duration::from_secs(1));

        polling.interval_seconds = 10_000;
        assert_eq!(polling.interval(), std::time::Duration::from_secs(3600));
    }

    #[test]
    fn test_save_and_reload_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("circlewatch.yaml");

        let mut config = Config::default();
        config.circleci.organization = Some("gh/acme".to_string());
        config.polling.interval_seconds = 60;
        config.save(&path).unwrap();

        let reloaded = Config::load(Some(&path)).unwrap();
        assert_eq!(reloaded.circleci.organization, Some("gh/acme".to_string()));
        assert_eq!(reloaded.polling.interval_seconds, 60);
    }

    #[test]
    fn test_client_settings_carry_timeouts() {
        let mut config = Config::default();
        config.polling.request_timeout_seconds = 5;

        let settings = config.client_settings(Some(Token::from("abc")));
        assert_eq!(settings.request_timeout, std::time::Duration::from_secs(5));
        assert_eq!(settings.base_url, "https://circleci.com");
        assert!(settings.token.is_some());
    }
}
