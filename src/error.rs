//! Error types for capture, rendering, decoding and queries.
//!
//! Each failure mode of the engine has its own enum so callers can match on
//! exactly what went wrong. [`LogError`] wraps all of them for APIs that can
//! fail in more than one way.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LogError>;

/// Top-level error for stream construction, capture and configuration.
#[derive(Debug, Error)]
pub enum LogError {
    /// A single record does not fit into one arena block.
    ///
    /// Records are never split across blocks, so this is a configuration
    /// defect: the block capacity is too small for what the program logs.
    #[error("record of {size} bytes exceeds the arena block capacity of {capacity} bytes")]
    RecordTooLarge { size: usize, capacity: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A message template with unbalanced or nested braces.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("placeholder opened at byte {position} is never closed")]
    UnclosedPlaceholder { position: usize },

    #[error("unmatched `}}` at byte {position}")]
    UnmatchedBrace { position: usize },

    #[error("nested `{{` inside the placeholder opened at byte {position}")]
    NestedPlaceholder { position: usize },
}

/// Failure to turn a captured record into text.
///
/// The record itself is untouched and stays queryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("template `{template}` has {placeholders} placeholders but {values} values were captured")]
    ArityMismatch {
        template: String,
        placeholders: usize,
        values: usize,
    },

    #[error("cannot render template `{template}`: {source}")]
    Template {
        template: String,
        #[source]
        source: TemplateError,
    },
}

/// Malformed bytes in an arena block or a binary sink frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated input: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("unknown value tag {0}")]
    UnknownTag(u8),

    #[error("invalid char scalar {0:#x}")]
    InvalidChar(u32),

    #[error("string value is not valid UTF-8")]
    InvalidUtf8,

    #[error("record declares {declared} bytes but its contents span {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("lz4 frame could not be decompressed: {0}")]
    Decompress(String),
}

/// Failure of a query against captured records.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("no captured record matches {locator}")]
    RecordNotFound { locator: String },

    #[error("call site `{template}` has no field named `{field}`")]
    FieldNotFound { template: String, field: String },

    #[error("field `{field}` was captured as {found} and cannot be read as {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("record handle from epoch {handle_epoch} is stale, the stream is at epoch {current_epoch}")]
    StaleHandle { handle_epoch: u64, current_epoch: u64 },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl QueryError {
    /// True for both "no such record" and "no such field".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            QueryError::RecordNotFound { .. } | QueryError::FieldNotFound { .. }
        )
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, QueryError::TypeMismatch { .. })
    }
}
