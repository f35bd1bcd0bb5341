//! Configuration loading (§6, §10.1). A TOML file mirrors the `settings.ini`
//! shape of the donor system, translated into sections; environment
//! variables layered on top via `figment` can override any leaf value, and
//! secrets (JWT secret, digest password, broker password) are typically
//! supplied that way rather than committed to the file.

use std::path::Path;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::domain::{PipelineError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub opencast: OpencastConfig,
    pub rabbit: RabbitConfig,
    pub zoom: ZoomConfig,
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpencastConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    /// Space-separated allowlist of workflow ids; empty = all.
    #[serde(default)]
    pub workflow_filter: String,
    /// Regex applied to series titles; empty = `.*`.
    #[serde(default)]
    pub series_filter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RabbitConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_queue_name")]
    pub queue: String,
}

fn default_queue_name() -> String {
    "zoomhook".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoomConfig {
    pub jwt_key: String,
    pub jwt_secret: String,
    #[serde(default)]
    pub gdpr: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub min_duration: i64,
    pub default_series_id: Option<String>,
    pub default_acl_id: Option<String>,
    pub default_workflow_id: Option<String>,
    pub secret: Option<String>,
}

impl WebhookConfig {
    /// §4.1: webhook ingest is globally disabled unless at least a default
    /// workflow or default series/acl is configured.
    pub fn webhook_ingest_enabled(&self) -> bool {
        self.default_workflow_id.is_some() || self.default_series_id.is_some() || self.default_acl_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_topic_regex")]
    pub topic_regex: String,
}

fn default_topic_regex() -> String {
    ".*".to_string()
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            topic_regex: default_topic_regex(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub database: String,
}

impl DatabaseConfig {
    pub const DEFAULT_URL: &'static str = "sqlite://zoom-ingest.db";

    pub fn is_default(&self) -> bool {
        self.database == Self::DEFAULT_URL
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self { enabled: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,
    #[serde(default = "default_reaper_threshold_secs")]
    pub reaper_threshold_secs: i64,
    #[serde(default = "default_in_progress_root")]
    pub in_progress_root: String,
}

fn default_worker_pool_size() -> usize {
    1
}

fn default_reaper_interval_secs() -> u64 {
    60
}

fn default_reaper_threshold_secs() -> i64 {
    3600
}

fn default_in_progress_root() -> String {
    "in-progress".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: default_worker_pool_size(),
            reaper_interval_secs: default_reaper_interval_secs(),
            reaper_threshold_secs: default_reaper_threshold_secs(),
            in_progress_root: default_in_progress_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load from a TOML file with environment-variable overrides, using the
    /// `Z_` prefix and `__` as the nested-key separator (e.g.
    /// `Z_OPENCAST__PASSWORD`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("Z_").split("__"))
            .extract()
            .map_err(|e| PipelineError::Config(format!("failed to load configuration: {e}")))
    }

    /// A default, entirely-local SQLite configuration suitable for tests and
    /// for the "warn on default database" behavior named in §6.
    pub fn default_sqlite() -> Self {
        Self {
            opencast: OpencastConfig {
                url: "http://localhost:8080".to_string(),
                user: "admin".to_string(),
                password: "opencast".to_string(),
                workflow_filter: String::new(),
                series_filter: String::new(),
            },
            rabbit: RabbitConfig {
                host: "localhost".to_string(),
                user: "guest".to_string(),
                password: "guest".to_string(),
                queue: default_queue_name(),
            },
            zoom: ZoomConfig {
                jwt_key: String::new(),
                jwt_secret: String::new(),
                gdpr: false,
            },
            webhook: WebhookConfig {
                min_duration: 0,
                default_series_id: None,
                default_acl_id: None,
                default_workflow_id: None,
                secret: None,
            },
            filter: FilterConfig::default(),
            database: DatabaseConfig {
                database: DatabaseConfig::DEFAULT_URL.to_string(),
            },
            email: EmailConfig::default(),
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sqlite_warns_worthy_database() {
        let config = AppConfig::default_sqlite();
        assert!(config.database.is_default());
    }

    #[test]
    fn webhook_ingest_disabled_with_no_defaults() {
        let config = AppConfig::default_sqlite();
        assert!(!config.webhook.webhook_ingest_enabled());
    }

    #[test]
    fn webhook_ingest_enabled_with_default_workflow() {
        let mut config = AppConfig::default_sqlite();
        config.webhook.default_workflow_id = Some("wf-1".to_string());
        assert!(config.webhook.webhook_ingest_enabled());
    }

    #[test]
    fn engine_defaults_match_spec() {
        let engine = EngineConfig::default();
        assert_eq!(engine.worker_pool_size, 1);
        assert_eq!(engine.reaper_interval_secs, 60);
        assert_eq!(engine.reaper_threshold_secs, 3600);
    }
}
