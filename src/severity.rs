use std::fmt;
use std::str::FromStr;

use crate::error::LogError;

/// Severity of a call site, ordered from least to most severe.
///
/// `Fatal` is special: once a fatal record is captured and drained, the
/// stream's fatal hook terminates the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
    Info = 0,
    Warn = 1,
    Error = 2,
    Fatal = 3,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::Fatal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" | "log" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" | "err" => Ok(Severity::Error),
            "fatal" => Ok(Severity::Fatal),
            other => Err(LogError::InvalidConfig(format!(
                "unknown severity `{other}`"
            ))),
        }
    }
}

/// The capture gate evaluated by every push.
///
/// A record passes when its severity is at least `min_severity` and, if an
/// allow-list is configured, its category is on the list. Records without a
/// category do not pass a non-empty allow-list. Fatal records ignore the
/// allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityFilter {
    min_severity: Severity,
    categories: Vec<String>,
}

impl SeverityFilter {
    pub fn new(min_severity: Severity) -> Self {
        Self {
            min_severity,
            categories: Vec::new(),
        }
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Splits a comma-separated allow-list, dropping blanks.
    ///
    /// ```
    /// # use replay_logger::SeverityFilter;
    /// assert_eq!(SeverityFilter::parse_categories(" net, db ,,"), vec!["net", "db"]);
    /// ```
    pub fn parse_categories(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect()
    }

    pub fn min_severity(&self) -> Severity {
        self.min_severity
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn set_min_severity(&mut self, severity: Severity) {
        self.min_severity = severity;
    }

    pub fn set_categories(&mut self, categories: Vec<String>) {
        self.categories = categories;
    }

    pub fn allows(&self, severity: Severity, category: Option<&str>) -> bool {
        if severity < self.min_severity {
            return false;
        }
        if self.categories.is_empty() || severity == Severity::Fatal {
            return true;
        }
        match category {
            Some(category) => self.categories.iter().any(|allowed| allowed == category),
            None => false,
        }
    }
}

impl Default for SeverityFilter {
    fn default() -> Self {
        Self::new(Severity::Info)
    }
}
