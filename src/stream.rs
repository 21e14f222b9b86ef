//! The log stream: capture, flush and suspension.
//!
//! A [`LogStream`] owns an arena of encoded records plus the sinks they are
//! drained to. One mutex serializes every operation that touches the arena
//! (push, flush, suspend, resume, mode changes), so the order records appear
//! in is the order in which their pushes acquired the lock.
//!
//! # Lifecycle
//!
//! A stream is created with [`LogStream::builder`] and drains everything it
//! still holds when dropped. The process-wide [`default_stream`] is never
//! dropped; call [`shutdown`] before exiting to drain it.
//!
//! # Examples
//!
//! ```
//! # use replay_logger::{log_info, FlushMode, LogConfig, LogStream};
//! # use replay_logger::sink::MemorySink;
//! let lines = MemorySink::new();
//! let stream = LogStream::builder()
//!     .config(LogConfig::default().with_flush_mode(FlushMode::Append).with_live_output(false))
//!     .text_sink(lines.clone())
//!     .build()
//!     .unwrap();
//!
//! log_info!(&stream => "loaded {count} entries", 3);
//! assert!(lines.is_empty());
//!
//! let summary = stream.flush();
//! assert_eq!(summary.records, 1);
//! assert!(lines.lines()[0].ends_with("loaded 3 entries"));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::{Mutex, RwLock};

use crate::arena::{Arena, ArenaBlock, RecordLocation};
use crate::call_site::CallSiteInfo;
use crate::clock::{Clock, SystemClock};
use crate::codec;
use crate::config::{FlushMode, LogConfig};
use crate::error::Result;
use crate::formatter;
use crate::log_reader;
use crate::loggable::{LogValue, Loggable};
use crate::severity::{Severity, SeverityFilter};
use crate::sink::{BinarySink, StderrSink, TextSink};

/// Called after a fatal record has been captured and drained.
pub type FatalHook = Arc<dyn Fn(&FatalEvent) + Send + Sync>;

/// What the fatal hook is told.
#[derive(Debug, Clone)]
pub struct FatalEvent {
    pub site: &'static CallSiteInfo,
    /// The rendered message, or the raw template if it could not be rendered.
    pub message: String,
}

/// Identifies one captured record.
///
/// Handles are only valid until the next drain of the stream; after that,
/// [`LogStream::record`] reports them as stale.
#[derive(Debug, Clone, Copy)]
pub struct RecordHandle {
    pub(crate) epoch: u64,
    pub(crate) location: RecordLocation,
    pub(crate) site: &'static CallSiteInfo,
}

impl RecordHandle {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn site(&self) -> &'static CallSiteInfo {
        self.site
    }
}

/// Outcome of a flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub blocks: usize,
    pub records: usize,
}

/// Snapshot of a stream's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStatistics {
    /// Records written into the arena.
    pub captured: u64,
    /// Pushes rejected by the severity/category filter.
    pub dropped: u64,
    /// Drains triggered by a full block in `FlushWhenFull` mode.
    pub auto_flushes: u64,
    /// Explicit flushes that drained at least one record.
    pub flushes: u64,
    pub records_drained: u64,
    pub render_errors: u64,
    pub sink_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    captured: AtomicU64,
    dropped: AtomicU64,
    auto_flushes: AtomicU64,
    flushes: AtomicU64,
    records_drained: AtomicU64,
    render_errors: AtomicU64,
    sink_errors: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StreamStatistics {
        StreamStatistics {
            captured: self.captured.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            auto_flushes: self.auto_flushes.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            records_drained: self.records_drained.load(Ordering::Relaxed),
            render_errors: self.render_errors.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Default)]
struct Sinks {
    text: Vec<Box<dyn TextSink>>,
    binary: Vec<Box<dyn BinarySink>>,
}

impl Sinks {
    /// Renders one record to every text sink. Returns false if there are no
    /// text sinks.
    fn write_record(
        &mut self,
        site: &CallSiteInfo,
        timestamp_micros: u64,
        values: &[LogValue],
        counters: &Counters,
    ) -> bool {
        if self.text.is_empty() {
            return false;
        }

        let line = match formatter::render_line(site, timestamp_micros, values) {
            Ok(line) => line,
            Err(err) => {
                Counters::bump(&counters.render_errors, 1);
                tracing::warn!(site = %site, error = %err, "record could not be rendered");
                formatter::fallback_line(site, timestamp_micros, values, &err)
            }
        };

        for sink in &mut self.text {
            if let Err(err) = sink.write_line(site.severity(), site.category(), &line) {
                Counters::bump(&counters.sink_errors, 1);
                tracing::error!(error = %err, "text sink failed to write a record");
            }
        }
        true
    }

    fn drain_block(&mut self, block: &ArenaBlock, counters: &Counters) {
        if !self.text.is_empty() {
            for (index, slot) in block.slots().iter().enumerate() {
                if slot.rendered {
                    continue;
                }
                let Some(bytes) = block.record(index) else {
                    continue;
                };
                match log_reader::decode_record(bytes) {
                    Ok(record) => match record.site() {
                        Some(site) => {
                            self.write_record(site, record.timestamp_micros, &record.values, counters);
                        }
                        None => {
                            Counters::bump(&counters.render_errors, 1);
                            tracing::warn!(site_id = record.site_id, "record refers to an unknown call site");
                        }
                    },
                    Err(err) => {
                        Counters::bump(&counters.render_errors, 1);
                        tracing::warn!(error = %err, "skipping undecodable record");
                    }
                }
            }
        }

        for sink in &mut self.binary {
            if let Err(err) = sink.write_block(block.bytes()) {
                Counters::bump(&counters.sink_errors, 1);
                tracing::error!(error = %err, "binary sink failed to write a block");
            }
        }
    }

    fn flush_all(&mut self, counters: &Counters) {
        let text = self.text.iter_mut().map(|sink| sink.flush());
        let binary = self.binary.iter_mut().map(|sink| sink.flush());
        for result in text.chain(binary) {
            if let Err(err) = result {
                Counters::bump(&counters.sink_errors, 1);
                tracing::error!(error = %err, "sink failed to flush");
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Suspension {
    depth: usize,
    saved_mode: FlushMode,
    saved_live_output: bool,
}

pub(crate) struct StreamState {
    pub(crate) arena: Arena,
    sinks: Sinks,
    flush_mode: FlushMode,
    live_output: bool,
    suspension: Option<Suspension>,
}

/// An append-only, queryable record of everything logged to it.
pub struct LogStream {
    pub(crate) state: Mutex<StreamState>,
    filter: RwLock<SeverityFilter>,
    clock: Arc<dyn Clock>,
    on_fatal: FatalHook,
    counters: Counters,
}

impl fmt::Debug for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStream")
            .field("filter", &*self.filter.read())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Builder for [`LogStream`].
pub struct LogStreamBuilder {
    config: LogConfig,
    sinks: Sinks,
    clock: Arc<dyn Clock>,
    on_fatal: FatalHook,
}

impl Default for LogStreamBuilder {
    fn default() -> Self {
        Self {
            config: LogConfig::default(),
            sinks: Sinks::default(),
            clock: Arc::new(SystemClock),
            on_fatal: Arc::new(|_| std::process::abort()),
        }
    }
}

impl LogStreamBuilder {
    pub fn config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    pub fn text_sink(mut self, sink: impl TextSink + 'static) -> Self {
        self.sinks.text.push(Box::new(sink));
        self
    }

    pub fn binary_sink(mut self, sink: impl BinarySink + 'static) -> Self {
        self.sinks.binary.push(Box::new(sink));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the default fatal behavior, which aborts the process.
    pub fn on_fatal<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FatalEvent) + Send + Sync + 'static,
    {
        self.on_fatal = Arc::new(hook);
        self
    }

    /// # Errors
    ///
    /// [`LogError::InvalidConfig`](crate::error::LogError::InvalidConfig) if the configuration is rejected by
    /// [`LogConfig::validate`].
    pub fn build(self) -> Result<LogStream> {
        self.config.validate()?;
        Ok(self.assemble())
    }

    fn assemble(self) -> LogStream {
        let config = self.config;
        LogStream {
            state: Mutex::new(StreamState {
                arena: Arena::new(config.block_capacity),
                sinks: self.sinks,
                flush_mode: config.flush_mode,
                live_output: config.live_output,
                suspension: None,
            }),
            filter: RwLock::new(config.filter()),
            clock: self.clock,
            on_fatal: self.on_fatal,
            counters: Counters::default(),
        }
    }
}

impl LogStream {
    pub fn builder() -> LogStreamBuilder {
        LogStreamBuilder::default()
    }

    /// A stream with no sinks: records are only kept for queries.
    pub fn new(config: LogConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Whether a push from `site` would pass the filter.
    pub fn enabled(&self, site: &CallSiteInfo) -> bool {
        self.filter.read().allows(site.severity(), site.category())
    }

    /// Captures one record.
    ///
    /// Returns `None` if the record was rejected by the filter.
    ///
    /// # Panics
    ///
    /// If the encoded record is larger than a whole arena block. That is a
    /// configuration error; use [`LogStream::try_push`] to handle it.
    pub fn push(&self, site: &'static CallSiteInfo, args: &[&dyn Loggable]) -> Option<RecordHandle> {
        match self.try_push(site, args) {
            Ok(handle) => handle,
            Err(err) => panic!("failed to capture record at {}:{}: {err}", site.file(), site.line()),
        }
    }

    /// Captures one record, reporting oversized records as an error.
    pub fn try_push(
        &self,
        site: &'static CallSiteInfo,
        args: &[&dyn Loggable],
    ) -> Result<Option<RecordHandle>> {
        if !self.enabled(site) {
            Counters::bump(&self.counters.dropped, 1);
            return Ok(None);
        }

        let values: Vec<LogValue> = args.iter().map(|arg| arg.to_log_value()).collect();
        let size = codec::record_len(&values);

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let timestamp = self.clock.now_micros();
        let counters = &self.counters;

        let sinks = &mut state.sinks;
        let allocation = state
            .arena
            .allocate(size, state.flush_mode, |block| sinks.drain_block(block, counters))?;
        if allocation.drained > 0 {
            state.sinks.flush_all(counters);
            Counters::bump(&counters.auto_flushes, 1);
            Counters::bump(&counters.records_drained, allocation.drained as u64);
            tracing::debug!(records = allocation.drained, "arena block full, drained to sinks");
        }

        let location = allocation.location;
        codec::encode_record(state.arena.record_mut(location), site.id(), timestamp, &values);
        if state.live_output && state.sinks.write_record(site, timestamp, &values, counters) {
            state.arena.mark_rendered(location);
        }
        Counters::bump(&counters.captured, 1);

        let handle = RecordHandle {
            epoch: state.arena.epoch(),
            location,
            site,
        };

        if site.severity() == Severity::Fatal {
            let message = formatter::render_message(site, &values)
                .unwrap_or_else(|_| site.template().to_owned());
            // Suspended or not, nothing captured so far may be lost.
            self.flush_locked(state);
            drop(guard);
            tracing::error!(site = %site, "fatal record captured");
            (self.on_fatal)(&FatalEvent { site, message });
        }

        Ok(Some(handle))
    }

    /// Drains every block to the sinks in order and resets the arena.
    ///
    /// Invalidates all outstanding [`RecordHandle`]s. Flushing an empty
    /// stream writes nothing.
    pub fn flush(&self) -> FlushSummary {
        let mut state = self.state.lock();
        self.flush_locked(&mut state)
    }

    fn flush_locked(&self, state: &mut StreamState) -> FlushSummary {
        let blocks = state.arena.block_count();
        let counters = &self.counters;
        let sinks = &mut state.sinks;
        let records = state.arena.drain(|block| sinks.drain_block(block, counters));
        if records == 0 {
            return FlushSummary::default();
        }

        state.sinks.flush_all(counters);
        Counters::bump(&counters.flushes, 1);
        Counters::bump(&counters.records_drained, records as u64);
        tracing::debug!(records, blocks, "flushed log stream");
        FlushSummary { blocks, records }
    }

    /// Keeps recording but stops producing output.
    ///
    /// Saves the flush mode and live-output flag, then switches to `Append`
    /// without live output. Suspensions nest; only the outermost
    /// [`resume`](LogStream::resume) restores the saved settings.
    pub fn suspend(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if let Some(suspension) = state.suspension.as_mut() {
            suspension.depth += 1;
            return;
        }

        state.suspension = Some(Suspension {
            depth: 1,
            saved_mode: state.flush_mode,
            saved_live_output: state.live_output,
        });
        state.flush_mode = FlushMode::Append;
        state.live_output = false;
        tracing::debug!("log stream suspended");
    }

    /// Ends a suspension, restoring the saved settings and flushing once.
    ///
    /// Resuming a stream that is not suspended does nothing.
    pub fn resume(&self) -> FlushSummary {
        let mut state = self.state.lock();
        let Some(suspension) = state.suspension.take() else {
            return FlushSummary::default();
        };

        if suspension.depth > 1 {
            state.suspension = Some(Suspension {
                depth: suspension.depth - 1,
                ..suspension
            });
            return FlushSummary::default();
        }

        state.flush_mode = suspension.saved_mode;
        state.live_output = suspension.saved_live_output;
        tracing::debug!("log stream resumed");
        self.flush_locked(&mut state)
    }

    /// Suspends until the returned guard is dropped.
    pub fn suspend_scope(&self) -> SuspendGuard<'_> {
        self.suspend();
        SuspendGuard { stream: self }
    }

    pub fn is_suspended(&self) -> bool {
        self.state.lock().suspension.is_some()
    }

    /// Sets the flush mode; while suspended, the mode restored on resume.
    pub fn set_flush_mode(&self, mode: FlushMode) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match state.suspension.as_mut() {
            Some(suspension) => suspension.saved_mode = mode,
            None => state.flush_mode = mode,
        }
    }

    /// The mode in effect right now.
    pub fn flush_mode(&self) -> FlushMode {
        self.state.lock().flush_mode
    }

    /// Sets live output; while suspended, the value restored on resume.
    pub fn set_live_output(&self, live: bool) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match state.suspension.as_mut() {
            Some(suspension) => suspension.saved_live_output = live,
            None => state.live_output = live,
        }
    }

    pub fn live_output(&self) -> bool {
        self.state.lock().live_output
    }

    pub fn set_min_severity(&self, severity: Severity) {
        self.filter.write().set_min_severity(severity);
    }

    pub fn set_categories<I, S>(&self, categories: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let categories = categories.into_iter().map(Into::into).collect();
        self.filter.write().set_categories(categories);
    }

    pub fn filter(&self) -> SeverityFilter {
        self.filter.read().clone()
    }

    pub fn add_text_sink(&self, sink: impl TextSink + 'static) {
        self.state.lock().sinks.text.push(Box::new(sink));
    }

    pub fn add_binary_sink(&self, sink: impl BinarySink + 'static) {
        self.state.lock().sinks.binary.push(Box::new(sink));
    }

    pub fn stats(&self) -> StreamStatistics {
        self.counters.snapshot()
    }

    /// Records currently held in the arena.
    pub fn record_count(&self) -> usize {
        self.state.lock().arena.record_count()
    }

    pub fn block_count(&self) -> usize {
        self.state.lock().arena.block_count()
    }

    pub fn block_capacity(&self) -> usize {
        self.state.lock().arena.block_capacity()
    }

    /// Advances on every drain; handles from older epochs are stale.
    pub fn epoch(&self) -> u64 {
        self.state.lock().arena.epoch()
    }
}

impl Drop for LogStream {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Resumes its stream when dropped.
#[must_use = "the stream resumes as soon as the guard is dropped"]
pub struct SuspendGuard<'a> {
    stream: &'a LogStream,
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        self.stream.resume();
    }
}

lazy_static! {
    static ref DEFAULT_STREAM: LogStream = {
        let config = LogConfig::from_env().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "ignoring invalid log configuration from the environment");
            LogConfig::default()
        });
        LogStream::builder().config(config).text_sink(StderrSink).assemble()
    };
}

/// The process-wide stream used by the logging macros when no stream is
/// given. Configured from the `REPLAY_LOG_*` environment variables and
/// writing to standard error.
pub fn default_stream() -> &'static LogStream {
    &DEFAULT_STREAM
}

/// Drains the default stream. Call before the process exits.
pub fn shutdown() -> FlushSummary {
    default_stream().flush()
}
