//! # Replay Logger
//!
//! A structured logging engine whose records can be queried back.
//!
//! Logging statements capture their arguments as typed values into an
//! append-only in-memory arena. Text is only produced when records reach a
//! sink, either immediately (live output) or when the arena is flushed.
//! Because the typed values stay in the arena until then, a test can ask what
//! a statement logged, with the types it logged, even while output is
//! suspended.
//!
//! ## Main Components
//!
//! * [`LogStream`]: owns the arena and the sinks; push, flush, suspend, resume
//! * [`call_site`]: one immutable descriptor per logging statement
//! * [`query`]: typed field lookup and cursors over captured records
//! * [`context`]: per-thread frames rendered only when a check fails
//! * [`sink`]: text and binary outputs, [`log_reader`] decodes the binary ones
//!
//! ## Quick Start
//!
//! ```
//! use replay_logger::sink::MemorySink;
//! use replay_logger::{log_info, log_warn, LogConfig, LogStream, Locator};
//!
//! let output = MemorySink::new();
//! let stream = LogStream::builder()
//!     .config(LogConfig::default())
//!     .text_sink(output.clone())
//!     .build()
//!     .unwrap();
//!
//! // Silence output but keep recording
//! stream.suspend();
//! let mut sum = 0;
//! for i in 1..=3 {
//!     sum += i;
//!     log_info!(&stream => "sum={sum}, i={i}", sum, i);
//! }
//! log_warn!(&stream => "done after {steps} steps", 3u8);
//! assert!(output.is_empty());
//!
//! // Replay what was logged
//! let sums: Vec<i32> = stream
//!     .iter_template("sum={sum}, i={i}")
//!     .map(|record| record.get("sum").unwrap())
//!     .collect();
//! assert_eq!(sums, vec![1, 3, 6]);
//!
//! // Resuming writes everything captured meanwhile
//! stream.resume();
//! assert_eq!(output.len(), 4);
//! ```

pub mod arena;
pub mod call_site;
pub mod clock;
pub mod codec;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod formatter;
pub mod log_reader;
pub mod loggable;
pub mod macros;
pub mod query;
pub mod severity;
pub mod sink;
pub mod stream;
pub mod template;
pub mod type_registry;

pub use call_site::{CallSiteId, CallSiteInfo};
pub use config::{FlushMode, LogConfig};
pub use error::{DecodeError, LogError, QueryError, RenderError, Result, TemplateError};
pub use loggable::{FromLogValue, LogValue, Loggable, ValueKind};
pub use query::{Locator, LogCursor, Occurrence, RecordView};
pub use severity::{Severity, SeverityFilter};
pub use stream::{
    default_stream, shutdown, FatalEvent, FlushSummary, LogStream, LogStreamBuilder, RecordHandle,
    StreamStatistics, SuspendGuard,
};
