//! Application settings and catalog loading.
//!
//! Settings come from three YAML files in a config directory: `app.yaml`
//! (tuning knobs), `topics.yaml` (research-topic catalog) and
//! `publishers.yaml` (publisher catalog). Every knob has a default, so a
//! missing file or key falls back rather than failing. Settings are loaded
//! once at process start and never mutated afterwards.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument};

use crate::models::{PublisherDefinition, TopicDefinition};

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// A config file is not valid YAML for its expected shape.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Immutable process-lifetime settings, passed by reference into every
/// component that needs them.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub app_name: String,
    pub version: String,
    pub contact_email: String,
    pub cache_ttl_hours: u64,
    pub request_timeout_sec: u64,
    pub max_retries: u32,
    pub backoff_base_sec: f64,
    pub max_records_default: usize,
    pub rows_per_request: usize,
    /// Coverage rate below which a result carries an advisory warning.
    pub low_coverage_threshold: f64,
    pub topic_catalog_lookback_years: i32,
    pub gap_min_topic_cagr: f64,
    pub gap_max_target_share: f64,
    pub gap_min_topic_volume: u64,
    pub topics: Vec<TopicDefinition>,
    pub publishers: Vec<PublisherDefinition>,
}

impl AppSettings {
    /// User-Agent string sent to the catalog service (polite-pool format:
    /// app, version, and a mailto contact).
    #[must_use]
    pub fn user_agent(&self) -> String {
        format!(
            "{}/{} (mailto:{})",
            self.app_name, self.version, self.contact_email
        )
    }

    /// Looks up a topic by key in the configured catalog.
    #[must_use]
    pub fn topic(&self, key: &str) -> Option<&TopicDefinition> {
        self.topics.iter().find(|t| t.key == key)
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        RawAppConfig::default().into_settings(Vec::new(), Vec::new())
    }
}

// ==================== Raw YAML Shapes ====================

#[derive(Debug, Default, Deserialize)]
struct RawAppFile {
    #[serde(default)]
    app: RawAppConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawAppConfig {
    name: String,
    version: String,
    contact_email: String,
    cache_ttl_hours: u64,
    request_timeout_sec: u64,
    max_retries: u32,
    backoff_base_sec: f64,
    max_records_default: usize,
    rows_per_request: usize,
    low_coverage_threshold: f64,
    topic_catalog_lookback_years: i32,
    gap_analysis: RawGapConfig,
}

impl Default for RawAppConfig {
    fn default() -> Self {
        Self {
            name: "Photonics Publishing Intelligence".to_string(),
            version: "0.1.0".to_string(),
            contact_email: "contact@example.com".to_string(),
            cache_ttl_hours: 24,
            request_timeout_sec: 30,
            max_retries: 4,
            backoff_base_sec: 0.8,
            max_records_default: 2000,
            rows_per_request: 200,
            low_coverage_threshold: 0.25,
            topic_catalog_lookback_years: 5,
            gap_analysis: RawGapConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawGapConfig {
    min_topic_cagr: f64,
    max_target_share: f64,
    min_topic_volume: u64,
}

impl Default for RawGapConfig {
    fn default() -> Self {
        Self {
            min_topic_cagr: 0.08,
            max_target_share: 0.12,
            min_topic_volume: 40,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawTopicsFile {
    #[serde(default)]
    topics: Vec<TopicDefinition>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPublishersFile {
    #[serde(default)]
    publishers: Vec<PublisherDefinition>,
}

impl RawAppConfig {
    fn into_settings(
        self,
        topics: Vec<TopicDefinition>,
        publishers: Vec<PublisherDefinition>,
    ) -> AppSettings {
        AppSettings {
            app_name: self.name,
            version: self.version,
            contact_email: self.contact_email,
            cache_ttl_hours: self.cache_ttl_hours,
            request_timeout_sec: self.request_timeout_sec,
            max_retries: self.max_retries,
            backoff_base_sec: self.backoff_base_sec,
            max_records_default: self.max_records_default,
            rows_per_request: self.rows_per_request,
            low_coverage_threshold: self.low_coverage_threshold,
            topic_catalog_lookback_years: self.topic_catalog_lookback_years,
            gap_min_topic_cagr: self.gap_analysis.min_topic_cagr,
            gap_max_target_share: self.gap_analysis.max_target_share,
            gap_min_topic_volume: self.gap_analysis.min_topic_volume,
            topics,
            publishers,
        }
    }
}

// ==================== Loading ====================

/// Reads and parses one YAML file, treating a missing file as empty.
fn read_yaml<T>(path: &Path) -> Result<T, ConfigError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let text = std::fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_yaml::from_str(&text)?)
}

/// Loads settings and catalogs from `config_root`.
///
/// # Errors
///
/// Returns [`ConfigError`] when a file exists but cannot be read or parsed.
/// Missing files fall back to built-in defaults and empty catalogs.
#[instrument(skip(config_root), fields(dir = %config_root.display()))]
pub fn load_settings(config_root: &Path) -> Result<AppSettings, ConfigError> {
    let app: RawAppFile = read_yaml(&config_root.join("app.yaml"))?;
    let topics: RawTopicsFile = read_yaml(&config_root.join("topics.yaml"))?;
    let publishers: RawPublishersFile = read_yaml(&config_root.join("publishers.yaml"))?;

    let settings = app
        .app
        .into_settings(topics.topics, publishers.publishers);
    info!(
        topics = settings.topics.len(),
        publishers = settings.publishers.len(),
        "Loaded settings"
    );
    Ok(settings)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn missing_config_dir_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let settings = load_settings(temp.path()).unwrap();
        assert_eq!(settings.max_retries, 4);
        assert_eq!(settings.rows_per_request, 200);
        assert!(settings.topics.is_empty());
        assert!((settings.gap_min_topic_cagr - 0.08).abs() < 1e-12);
    }

    #[test]
    fn partial_app_yaml_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let mut f = std::fs::File::create(temp.path().join("app.yaml")).unwrap();
        writeln!(f, "app:\n  name: Test Intel\n  max_retries: 2").unwrap();

        let settings = load_settings(temp.path()).unwrap();
        assert_eq!(settings.app_name, "Test Intel");
        assert_eq!(settings.max_retries, 2);
        assert_eq!(settings.cache_ttl_hours, 24);
    }

    #[test]
    fn topic_and_publisher_catalogs_load() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("topics.yaml"),
            "topics:\n  - key: silicon_photonics\n    name: Silicon Photonics\n    keywords: [silicon photonics]\n",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("publishers.yaml"),
            "publishers:\n  - name: SPIE\n    aliases: [spie]\n    prefixes: ['10.1117']\n",
        )
        .unwrap();

        let settings = load_settings(temp.path()).unwrap();
        assert!(settings.topic("silicon_photonics").is_some());
        assert_eq!(settings.publishers[0].prefixes, vec!["10.1117"]);
    }

    #[test]
    fn user_agent_includes_contact() {
        let settings = AppSettings::default();
        assert!(settings.user_agent().contains("mailto:contact@example.com"));
    }
}
