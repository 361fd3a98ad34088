//! Configuration management for the reporter.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Host broker property maps (`kafka.elasticsearch.metrics.*`)
//! - Validation and defaults

use crate::core::{Result, ReporterError};
use crate::predicate::{AllMetrics, ExcludeMBeanPredicate, ExcludeRegexPredicate, MetricPredicate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Default name of the reporter, used as the poll task's span name
pub const DEFAULT_NAME: &str = "elasticsearch-reporter";
/// Default prefix of the daily index names
pub const DEFAULT_INDEX_PREFIX: &str = "elasticsearch-reporter-default";
/// Default name of the timestamp field in every document
pub const DEFAULT_TIMESTAMP_FIELD_NAME: &str = "@timestamp";

/// Host property keys understood by [`ConfigBuilder::from_properties`].
pub mod keys {
    /// Comma-separated `host:port` list
    pub const NODES: &str = "kafka.elasticsearch.metrics.nodes";
    /// Index-name prefix
    pub const INDEX_PREFIX: &str = "kafka.elasticsearch.metrics.indexPrefix";
    /// Exclusion regex against the dotted metric name
    pub const EXCLUDE_REGEX: &str = "kafka.elasticsearch.metrics.excludeRegex";
    /// Exclusion regex against the MBean-style metric name
    pub const EXCLUDE_MBEAN_REGEX: &str = "kafka.elasticsearch.metrics.excludeMBeanRegex";
    /// Time-to-live written on every action line
    pub const TTL: &str = "kafka.elasticsearch.metrics.ttl";
    /// Whether the runtime statistics document is reported
    pub const RUNTIME_STATS: &str = "kafka.elasticsearch.metrics.getVmInfo";
    /// Name of the timestamp field
    pub const TIMESTAMP_FIELD_NAME: &str = "kafka.elasticsearch.metrics.timestampFieldName";
    /// Master switch
    pub const ENABLED: &str = "kafka.elasticsearch.metrics.reporter.enabled";
    /// Polling period in seconds, shared with the host's other reporters
    pub const POLLING_INTERVAL_SECS: &str = "kafka.metrics.polling.interval.secs";
}

/// Complete configuration for the reporter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Polling loop configuration
    pub reporter: ReporterSettings,
    /// Document store configuration
    pub elasticsearch: ElasticsearchSettings,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Polling loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterSettings {
    /// Start polling as soon as the host initialises the reporter
    pub enabled: bool,
    /// Reporter name
    pub name: String,
    /// Time between two poll ticks
    #[serde(with = "humantime_serde")]
    pub polling_interval: Duration,
    /// Report the synthetic runtime statistics document
    pub include_runtime_stats: bool,
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticsearchSettings {
    /// Comma-separated `host:port` list
    pub nodes: String,
    /// Prefix of the daily index name
    pub index_prefix: String,
    /// Name of the timestamp field
    pub timestamp_field_name: String,
    /// Store-specific TTL string such as `1d`
    pub ttl: Option<String>,
    /// Exclude metrics whose dotted name fully matches this regex
    pub exclude_regex: Option<String>,
    /// Exclude metrics whose MBean-style name fully matches this regex
    pub exclude_mbean_regex: Option<String>,
    /// Connect timeout for one endpoint attempt
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Override for the reported hostname
    pub hostname: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Include targets, thread ids and line numbers
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything
    Trace,
    /// Request bodies and tick summaries
    Debug,
    /// Requests and lifecycle
    Info,
    /// Rejected or dropped batches
    Warn,
    /// Failures only
    Error,
}

impl Default for ReporterSettings {
    fn default() -> Self {
        ReporterSettings {
            enabled: false,
            name: DEFAULT_NAME.to_string(),
            polling_interval: Duration::from_secs(10),
            include_runtime_stats: true,
        }
    }
}

impl Default for ElasticsearchSettings {
    fn default() -> Self {
        ElasticsearchSettings {
            nodes: "localhost:9200".to_string(),
            index_prefix: DEFAULT_INDEX_PREFIX.to_string(),
            timestamp_field_name: DEFAULT_TIMESTAMP_FIELD_NAME.to_string(),
            ttl: None,
            exclude_regex: None,
            exclude_mbean_regex: None,
            connect_timeout: Duration::from_secs(3),
            hostname: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl ElasticsearchSettings {
    /// Configured endpoints, trimmed, in declaration order
    pub fn endpoints(&self) -> Vec<String> {
        self.nodes
            .split(',')
            .map(str::trim)
            .filter(|node| !node.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// TTL to write on action lines; an empty string means none
    pub fn effective_ttl(&self) -> Option<&str> {
        self.ttl.as_deref().filter(|ttl| !ttl.is_empty())
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.elasticsearch.endpoints().is_empty() {
            return Err(ReporterError::config("at least one Elasticsearch node is required"));
        }

        if self.reporter.polling_interval.is_zero() {
            return Err(ReporterError::config("polling_interval must be greater than 0"));
        }

        if self.elasticsearch.connect_timeout.is_zero() {
            return Err(ReporterError::config("connect_timeout must be greater than 0"));
        }

        if self.elasticsearch.index_prefix.contains(['\n', '\r']) {
            return Err(ReporterError::config("index_prefix must not contain line breaks"));
        }

        // Compiling both patterns surfaces syntax errors at startup
        self.predicate()?;
        if let Some(regex) = &self.elasticsearch.exclude_regex {
            ExcludeRegexPredicate::new(regex)?;
        }

        Ok(())
    }

    /// Build the metric predicate described by this configuration.
    ///
    /// The MBean-style exclusion takes precedence over the dotted one when both are set.
    pub fn predicate(&self) -> Result<Box<dyn MetricPredicate>> {
        if let Some(regex) = &self.elasticsearch.exclude_mbean_regex {
            return Ok(Box::new(ExcludeMBeanPredicate::new(regex)?));
        }
        if let Some(regex) = &self.elasticsearch.exclude_regex {
            return Ok(Box::new(ExcludeRegexPredicate::new(regex)?));
        }
        Ok(Box::new(AllMetrics))
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| ReporterError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReporterError::config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        self.from_yaml(&content)
    }

    /// Apply the host broker's property map on top of the current settings
    pub fn from_properties(mut self, props: &HashMap<String, String>) -> Result<Self> {
        let es = &mut self.config.elasticsearch;
        if let Some(nodes) = props.get(keys::NODES) {
            es.nodes = nodes.clone();
        }
        if let Some(prefix) = props.get(keys::INDEX_PREFIX) {
            es.index_prefix = prefix.clone();
        }
        if let Some(field) = props.get(keys::TIMESTAMP_FIELD_NAME) {
            es.timestamp_field_name = field.clone();
        }
        if let Some(regex) = props.get(keys::EXCLUDE_REGEX) {
            es.exclude_regex = Some(regex.clone());
        }
        if let Some(regex) = props.get(keys::EXCLUDE_MBEAN_REGEX) {
            es.exclude_mbean_regex = Some(regex.clone());
        }
        if let Some(ttl) = props.get(keys::TTL) {
            es.ttl = Some(ttl.trim().to_string()).filter(|ttl| !ttl.is_empty());
        }

        let reporter = &mut self.config.reporter;
        if let Some(value) = props.get(keys::RUNTIME_STATS) {
            reporter.include_runtime_stats = parse_bool(keys::RUNTIME_STATS, value)?;
        }
        if let Some(value) = props.get(keys::ENABLED) {
            reporter.enabled = parse_bool(keys::ENABLED, value)?;
        }
        if let Some(value) = props.get(keys::POLLING_INTERVAL_SECS) {
            let secs = value.trim().parse::<u64>().map_err(|e| {
                ReporterError::config(format!(
                    "{} must be a whole number of seconds, got '{}': {}",
                    keys::POLLING_INTERVAL_SECS,
                    value,
                    e
                ))
            })?;
            reporter.polling_interval = Duration::from_secs(secs);
        }

        Ok(self)
    }

    /// Set the endpoint list
    pub fn nodes(mut self, nodes: impl Into<String>) -> Self {
        self.config.elasticsearch.nodes = nodes.into();
        self
    }

    /// Set the index prefix
    pub fn index_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.elasticsearch.index_prefix = prefix.into();
        self
    }

    /// Set the timestamp field name
    pub fn timestamp_field_name(mut self, name: impl Into<String>) -> Self {
        self.config.elasticsearch.timestamp_field_name = name.into();
        self
    }

    /// Set the TTL
    pub fn ttl(mut self, ttl: impl Into<String>) -> Self {
        self.config.elasticsearch.ttl = Some(ttl.into());
        self
    }

    /// Set the dotted-name exclusion regex
    pub fn exclude_regex(mut self, regex: impl Into<String>) -> Self {
        self.config.elasticsearch.exclude_regex = Some(regex.into());
        self
    }

    /// Set the MBean-name exclusion regex
    pub fn exclude_mbean_regex(mut self, regex: impl Into<String>) -> Self {
        self.config.elasticsearch.exclude_mbean_regex = Some(regex.into());
        self
    }

    /// Set the reported hostname
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.config.elasticsearch.hostname = Some(hostname.into());
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.elasticsearch.connect_timeout = timeout;
        self
    }

    /// Set the polling interval
    pub fn polling_interval(mut self, interval: Duration) -> Self {
        self.config.reporter.polling_interval = interval;
        self
    }

    /// Enable or disable the runtime statistics document
    pub fn include_runtime_stats(mut self, include: bool) -> Self {
        self.config.reporter.include_runtime_stats = include;
        self
    }

    /// Set the master switch
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.reporter.enabled = enabled;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ReporterError::config(format!(
            "{} must be true or false, got '{}'",
            key, other
        ))),
    }
}
