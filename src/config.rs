//! Runtime configuration.
//!
//! Every value has a default. [`Config::from_env`] overrides them from
//! `MEDIA_PIPELINE_*` environment variables (and a `.env` file if present).

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::event::InboundTopic;

pub const ENV_PREFIX: &str = "MEDIA_PIPELINE_";
pub const DEFAULT_SOURCE: &str = "media-pipeline";
pub const DEFAULT_CDN_PREFIX: &str = "http://localhost:8083/cdn";
pub const DEFAULT_CONSUMER_GROUP: &str = "media-pipeline";

#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    pub interval: Duration,
    pub batch_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            batch_size: 50,
        }
    }
}

impl DispatcherConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Both the interval and the batch size must be positive.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::config("dispatcher interval must be positive"));
        }
        if self.batch_size == 0 {
            return Err(Error::config("dispatcher batch size must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerConfig {
    pub group_id: String,
    pub topics: Vec<String>,
    /// How long one poll waits before checking for shutdown again.
    pub poll_timeout: Duration,
    /// Pause after a retryable handler failure before polling the same
    /// partition again.
    pub retry_backoff: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group_id: DEFAULT_CONSUMER_GROUP.to_string(),
            topics: InboundTopic::ALL
                .iter()
                .map(|topic| topic.as_str().to_string())
                .collect(),
            poll_timeout: Duration::from_millis(100),
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl ConsumerConfig {
    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }

    /// Topics are checked against the inbound topic list by [`Self::inbound_topics`].
    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Resolve the configured topic names, rejecting unknown and duplicate
    /// entries.
    pub fn inbound_topics(&self) -> Result<Vec<InboundTopic>> {
        if self.topics.is_empty() {
            return Err(Error::config("no consumer topics configured"));
        }

        let mut seen = HashSet::new();
        self.topics
            .iter()
            .map(|name| {
                let topic = InboundTopic::parse(name)
                    .ok_or_else(|| Error::config(format!("no handler for topic {}", name)))?;
                if !seen.insert(topic) {
                    return Err(Error::config(format!("topic {} configured twice", name)));
                }
                Ok(topic)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence.
    pub filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl LogConfig {
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Stamped on produced events that have no source yet.
    pub source: String,
    /// Stage events in the outbox; when false, publish straight to the broker.
    pub outbox_enabled: bool,
    pub cdn_prefix: String,
    pub dispatcher: DispatcherConfig,
    pub consumer: ConsumerConfig,
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            outbox_enabled: true,
            cdn_prefix: DEFAULT_CDN_PREFIX.to_string(),
            dispatcher: DispatcherConfig::default(),
            consumer: ConsumerConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_outbox_enabled(mut self, enabled: bool) -> Self {
        self.outbox_enabled = enabled;
        self
    }

    pub fn with_cdn_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cdn_prefix = prefix.into();
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: DispatcherConfig) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_consumer(mut self, consumer: ConsumerConfig) -> Self {
        self.consumer = consumer;
        self
    }

    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Load `.env` when present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from defaults overridden by `lookup`, which receives full
    /// variable names such as `MEDIA_PIPELINE_SOURCE`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|value| !value.trim().is_empty())
        };
        let mut config = Self::default();

        if let Some(source) = var("SOURCE") {
            config.source = source;
        }
        if let Some(raw) = var("OUTBOX_ENABLED") {
            config.outbox_enabled = parse_bool("OUTBOX_ENABLED", &raw)?;
        }
        if let Some(prefix) = var("CDN_PREFIX") {
            config.cdn_prefix = prefix;
        }
        if let Some(raw) = var("DISPATCH_INTERVAL_MS") {
            config.dispatcher.interval = parse_millis("DISPATCH_INTERVAL_MS", &raw)?;
        }
        if let Some(raw) = var("DISPATCH_BATCH_SIZE") {
            config.dispatcher.batch_size = parse_number("DISPATCH_BATCH_SIZE", &raw)?;
        }
        if let Some(group) = var("CONSUMER_GROUP") {
            config.consumer.group_id = group;
        }
        if let Some(raw) = var("CONSUMER_TOPICS") {
            config.consumer.topics = raw
                .split(',')
                .map(str::trim)
                .filter(|topic| !topic.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(raw) = var("POLL_TIMEOUT_MS") {
            config.consumer.poll_timeout = parse_millis("POLL_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = var("RETRY_BACKOFF_MS") {
            config.consumer.retry_backoff = parse_millis("RETRY_BACKOFF_MS", &raw)?;
        }
        if let Some(filter) = var("LOG") {
            config.log.filter = filter;
        }
        if let Some(raw) = var("LOG_JSON") {
            config.log.json = parse_bool("LOG_JSON", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check every section; run before anything is built.
    pub fn validate(&self) -> Result<()> {
        if self.source.trim().is_empty() {
            return Err(Error::config("source must not be empty"));
        }
        self.dispatcher.validate()?;
        self.consumer.inbound_topics()?;
        Ok(())
    }
}

fn parse_number<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        Error::config(format!("{}{} must be a number, got {:?}", ENV_PREFIX, name, raw))
    })
}

fn parse_millis(name: &str, raw: &str) -> Result<Duration> {
    parse_number::<u64>(name, raw).map(Duration::from_millis)
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config(format!(
            "{}{} must be a boolean, got {:?}",
            ENV_PREFIX, name, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (format!("{}{}", ENV_PREFIX, k), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.source, "media-pipeline");
        assert!(config.outbox_enabled);
        assert_eq!(config.dispatcher.interval, Duration::from_millis(500));
        assert_eq!(config.dispatcher.batch_size, 50);
        assert_eq!(config.consumer.topics.len(), InboundTopic::ALL.len());
    }

    #[test]
    fn overrides_from_lookup() {
        let config = Config::from_lookup(lookup(&[
            ("SOURCE", "asset-manager"),
            ("OUTBOX_ENABLED", "false"),
            ("DISPATCH_INTERVAL_MS", "250"),
            ("DISPATCH_BATCH_SIZE", "10"),
            ("CONSUMER_TOPICS", "hls.job.completed, dash.job.completed"),
            ("LOG_JSON", "1"),
        ]))
        .unwrap();

        assert_eq!(config.source, "asset-manager");
        assert!(!config.outbox_enabled);
        assert_eq!(config.dispatcher.interval, Duration::from_millis(250));
        assert_eq!(config.dispatcher.batch_size, 10);
        assert_eq!(config.consumer.topics, vec!["hls.job.completed", "dash.job.completed"]);
        assert!(config.log.json);
    }

    #[test]
    fn malformed_values_are_configuration_errors() {
        let err = Config::from_lookup(lookup(&[("DISPATCH_BATCH_SIZE", "lots")])).unwrap_err();
        assert!(
            matches!(err, Error::Configuration(ref msg) if msg.contains("DISPATCH_BATCH_SIZE"))
        );

        assert!(Config::from_lookup(lookup(&[("OUTBOX_ENABLED", "maybe")])).is_err());
        assert!(Config::from_lookup(lookup(&[("DISPATCH_BATCH_SIZE", "0")])).is_err());
    }

    #[test]
    fn unknown_and_duplicate_topics_are_rejected() {
        let unknown = ConsumerConfig::default().with_topics(["media.status.changed"]);
        assert!(unknown.inbound_topics().is_err());

        let duplicate =
            ConsumerConfig::default().with_topics(["hls.job.completed", "hls.job.completed"]);
        assert!(duplicate.inbound_topics().is_err());

        let empty = ConsumerConfig::default().with_topics(Vec::<String>::new());
        assert!(empty.inbound_topics().is_err());
    }
}
