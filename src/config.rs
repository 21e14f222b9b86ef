//! Stream configuration, built in code or read from the environment.

use std::env;

use crate::codec::RECORD_HEADER_SIZE;
use crate::error::LogError;
use crate::severity::{Severity, SeverityFilter};

/// Default arena block size: 64 KiB.
pub const DEFAULT_BLOCK_CAPACITY: usize = 64 * 1024;

/// Largest block size; record lengths are encoded as `u32`.
pub const MAX_BLOCK_CAPACITY: usize = u32::MAX as usize;

pub const ENV_LEVEL: &str = "REPLAY_LOG_LEVEL";
pub const ENV_CATEGORIES: &str = "REPLAY_LOG_CATEGORIES";
pub const ENV_BLOCK_SIZE: &str = "REPLAY_LOG_BLOCK_SIZE";
pub const ENV_FLUSH: &str = "REPLAY_LOG_FLUSH";
pub const ENV_LIVE: &str = "REPLAY_LOG_LIVE";

/// What the arena does when the tail block cannot hold the next record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// Link a new block; memory grows until an explicit flush.
    Append,
    /// Drain the full block through the sinks and reuse it.
    FlushWhenFull,
}

/// Settings for a [`LogStream`](crate::LogStream).
///
/// # Examples
///
/// ```
/// # use replay_logger::{FlushMode, LogConfig, Severity};
/// let config = LogConfig::default()
///     .with_block_capacity(4096)
///     .with_flush_mode(FlushMode::Append)
///     .with_live_output(false)
///     .with_min_severity(Severity::Warn);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub block_capacity: usize,
    pub flush_mode: FlushMode,
    /// Render every record to the text sinks as soon as it is captured.
    pub live_output: bool,
    pub min_severity: Severity,
    /// Category allow-list; empty allows everything.
    pub categories: Vec<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            block_capacity: DEFAULT_BLOCK_CAPACITY,
            flush_mode: FlushMode::FlushWhenFull,
            live_output: true,
            min_severity: Severity::Info,
            categories: Vec::new(),
        }
    }
}

impl LogConfig {
    pub fn with_block_capacity(mut self, capacity: usize) -> Self {
        self.block_capacity = capacity;
        self
    }

    pub fn with_flush_mode(mut self, mode: FlushMode) -> Self {
        self.flush_mode = mode;
        self
    }

    pub fn with_live_output(mut self, live: bool) -> Self {
        self.live_output = live;
        self
    }

    pub fn with_min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Reads the `REPLAY_LOG_*` variables on top of the defaults.
    pub fn from_env() -> Result<Self, LogError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`LogConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LogError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(level) = lookup(ENV_LEVEL) {
            config.min_severity = level.parse()?;
        }
        if let Some(list) = lookup(ENV_CATEGORIES) {
            config.categories = SeverityFilter::parse_categories(&list);
        }
        if let Some(size) = lookup(ENV_BLOCK_SIZE) {
            config.block_capacity = size.trim().parse().map_err(|_| {
                LogError::InvalidConfig(format!("{ENV_BLOCK_SIZE} must be a byte count, got `{size}`"))
            })?;
        }
        if let Some(mode) = lookup(ENV_FLUSH) {
            config.flush_mode = match mode.trim().to_ascii_lowercase().as_str() {
                "append" | "manual" => FlushMode::Append,
                "when_full" | "when-full" => FlushMode::FlushWhenFull,
                other => {
                    return Err(LogError::InvalidConfig(format!(
                        "{ENV_FLUSH} must be `append` or `when_full`, got `{other}`"
                    )))
                }
            };
        }
        if let Some(live) = lookup(ENV_LIVE) {
            config.live_output = match live.trim() {
                "1" | "true" | "on" => true,
                "0" | "false" | "off" => false,
                other => {
                    return Err(LogError::InvalidConfig(format!(
                        "{ENV_LIVE} must be one of 1, true, on, 0, false, off, got `{other}`"
                    )))
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// A block must at least hold a record with no values, and at most
    /// [`MAX_BLOCK_CAPACITY`] bytes.
    pub fn validate(&self) -> Result<(), LogError> {
        if self.block_capacity < RECORD_HEADER_SIZE {
            return Err(LogError::InvalidConfig(format!(
                "block capacity {} is smaller than a record header ({RECORD_HEADER_SIZE} bytes)",
                self.block_capacity
            )));
        }
        if self.block_capacity > MAX_BLOCK_CAPACITY {
            return Err(LogError::InvalidConfig(format!(
                "block capacity {} exceeds the maximum of {MAX_BLOCK_CAPACITY} bytes",
                self.block_capacity
            )));
        }
        Ok(())
    }

    pub fn filter(&self) -> SeverityFilter {
        SeverityFilter::new(self.min_severity).with_categories(self.categories.iter().cloned())
    }
}
