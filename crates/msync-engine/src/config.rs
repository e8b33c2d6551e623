//! Engine configuration.

use chrono::NaiveTime;
use std::time::Duration;

use msync_core::identity::IdScheme;
use msync_core::types::{CategoryFilter, MirrorFilter};

/// Configuration for the reconciliation engine and its coordinator.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Category of source records that participate.
    pub category: CategoryFilter,

    /// Id scheme used when deriving mirror ids. Older schemes stay recognized.
    pub id_scheme: IdScheme,

    /// Prefix rendered into mirror titles.
    pub title_marker: String,

    /// Also discover managed mirrors by title marker, which recovers mirrors
    /// whose metadata was stripped by the mirror system.
    pub search_title_marker: bool,

    /// Start time of newly created timed mirrors.
    pub default_start_time: NaiveTime,

    /// Duration of newly created timed mirrors, in minutes.
    pub default_duration_mins: u32,

    /// Time zone label of newly created timed mirrors.
    pub time_zone: String,

    /// Back-link rendered into mirror descriptions; `{id}` is replaced by the source id.
    pub source_link_template: Option<String>,

    /// Minimum quiet period per direction after a run completes.
    pub cooldown: Duration,

    /// Time bound on every external call.
    pub call_timeout: Duration,

    /// Records processed concurrently within one pass.
    pub max_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            category: CategoryFilter::default(),
            id_scheme: IdScheme::NEWEST_FIRST[0],
            title_marker: "🎯".to_string(),
            search_title_marker: true,
            default_start_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN),
            default_duration_mins: 60,
            time_zone: "Australia/Melbourne".to_string(),
            source_link_template: None,
            cooldown: Duration::from_secs(10),
            call_timeout: Duration::from_secs(30),
            max_concurrency: 4,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// This allows tests to supply variables without mutating process-global
    /// environment state. Unset keys keep their defaults.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let mut config = Self::default();

        if let Ok(category) = reader("MSYNC_CATEGORY") {
            config.category = CategoryFilter::new(category);
        }

        if let Ok(raw) = reader("MSYNC_ID_SCHEME") {
            let version = raw
                .trim()
                .parse::<u8>()
                .map_err(|e| ConfigError::InvalidValue("MSYNC_ID_SCHEME".into(), e.to_string()))?;
            config.id_scheme = IdScheme::from_version(version).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "MSYNC_ID_SCHEME".into(),
                    format!("unknown id scheme version {version}"),
                )
            })?;
        }

        if let Ok(marker) = reader("MSYNC_TITLE_MARKER") {
            config.title_marker = marker;
        }

        if let Ok(raw) = reader("MSYNC_SEARCH_TITLE_MARKER") {
            config.search_title_marker = parse_value("MSYNC_SEARCH_TITLE_MARKER", &raw)?;
        }

        if let Ok(raw) = reader("MSYNC_DEFAULT_START_TIME") {
            config.default_start_time = NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S")
                .map_err(|e| {
                    ConfigError::InvalidValue("MSYNC_DEFAULT_START_TIME".into(), e.to_string())
                })?;
        }

        if let Ok(raw) = reader("MSYNC_DEFAULT_DURATION_MINS") {
            config.default_duration_mins = parse_value("MSYNC_DEFAULT_DURATION_MINS", &raw)?;
        }

        if let Ok(zone) = reader("MSYNC_TIME_ZONE") {
            config.time_zone = zone;
        }

        if let Ok(template) = reader("MSYNC_SOURCE_LINK_TEMPLATE") {
            config.source_link_template = Some(template).filter(|t| !t.trim().is_empty());
        }

        if let Ok(raw) = reader("MSYNC_COOLDOWN_SECS") {
            config.cooldown = Duration::from_secs(parse_value("MSYNC_COOLDOWN_SECS", &raw)?);
        }

        if let Ok(raw) = reader("MSYNC_CALL_TIMEOUT_SECS") {
            config.call_timeout = Duration::from_secs(parse_value("MSYNC_CALL_TIMEOUT_SECS", &raw)?);
        }

        if let Ok(raw) = reader("MSYNC_MAX_CONCURRENCY") {
            config.max_concurrency = parse_value("MSYNC_MAX_CONCURRENCY", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "MSYNC_MAX_CONCURRENCY".into(),
                "must be at least 1".into(),
            ));
        }
        if self.call_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "MSYNC_CALL_TIMEOUT_SECS".into(),
                "must be at least 1".into(),
            ));
        }
        if self.title_marker.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "MSYNC_TITLE_MARKER".into(),
                "must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Listings used to discover managed mirrors, in merge priority order.
    pub fn mirror_filters(&self) -> Vec<MirrorFilter> {
        let mut filters = vec![MirrorFilter::ManagedTag];
        if self.search_title_marker {
            filters.push(MirrorFilter::TitleMarker(self.title_marker.clone()));
        }
        filters
    }

    /// Set the cooldown window.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Set the per-call timeout.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the id scheme used for derivation.
    #[must_use]
    pub fn with_id_scheme(mut self, scheme: IdScheme) -> Self {
        self.id_scheme = scheme;
        self
    }

    /// Set the concurrency bound.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Set the description back-link template.
    #[must_use]
    pub fn with_source_link_template(mut self, template: impl Into<String>) -> Self {
        self.source_link_template = Some(template.into());
        self
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
