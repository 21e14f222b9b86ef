//! Reading captured records back.
//!
//! Queries walk the arena in capture order and decode the typed values of
//! matching records, so a test can ask "what did this call site log" without
//! parsing any rendered text. Every step of a cursor takes the stream lock
//! briefly; no lock is held between steps.

use std::fmt;

use crate::arena::RecordLocation;
use crate::call_site::{self, CallSiteId, CallSiteInfo};
use crate::error::{QueryError, RenderError};
use crate::formatter;
use crate::log_reader;
use crate::loggable::{FromLogValue, LogValue};
use crate::stream::{LogStream, RecordHandle};

/// Selects call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator<'a> {
    /// Every site on a source line.
    Location { file: &'a str, line: u32 },
    /// One exact site.
    Site(CallSiteId),
    /// Sites in `module` whose template contains `contains`.
    ///
    /// `module` matches a site's module path exactly or as its last
    /// segments, so `"cache"` finds sites in `app::cache`.
    Message { module: &'a str, contains: &'a str },
}

impl<'a> Locator<'a> {
    pub fn at(file: &'a str, line: u32) -> Self {
        Locator::Location { file, line }
    }

    pub fn site(site: &CallSiteInfo) -> Self {
        Locator::Site(site.id())
    }

    pub fn message(module: &'a str, contains: &'a str) -> Self {
        Locator::Message { module, contains }
    }

    pub fn matches(&self, site: &CallSiteInfo) -> bool {
        match *self {
            Locator::Location { file, line } => site.file() == file && site.line() == line,
            Locator::Site(id) => site.id() == id,
            Locator::Message { module, contains } => {
                module_matches(site.module_path(), module) && site.template().contains(contains)
            }
        }
    }
}

fn module_matches(path: &str, module: &str) -> bool {
    path == module
        || path
            .strip_suffix(module)
            .is_some_and(|prefix| prefix.ends_with("::"))
}

impl fmt::Display for Locator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Location { file, line } => write!(f, "{}:{}", file, line),
            Locator::Site(id) => write!(f, "call site #{}", id),
            Locator::Message { module, contains } => {
                write!(f, "message containing `{}` in `{}`", contains, module)
            }
        }
    }
}

/// Which of several matching records a query picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Occurrence {
    #[default]
    First,
    Last,
    /// Zero-based: `Nth(0)` is the first match.
    Nth(usize),
}

/// A decoded record.
#[derive(Debug, Clone)]
pub struct RecordView {
    handle: RecordHandle,
    timestamp_micros: u64,
    values: Vec<LogValue>,
}

impl RecordView {
    pub fn site(&self) -> &'static CallSiteInfo {
        self.handle.site
    }

    pub fn handle(&self) -> RecordHandle {
        self.handle
    }

    pub fn timestamp_micros(&self) -> u64 {
        self.timestamp_micros
    }

    pub fn values(&self) -> &[LogValue] {
        &self.values
    }

    /// The value captured for the placeholder `name`.
    pub fn value(&self, name: &str) -> Result<&LogValue, QueryError> {
        let site = self.site();
        site.field_index(name)
            .and_then(|index| self.values.get(index))
            .ok_or_else(|| QueryError::FieldNotFound {
                template: site.template().to_owned(),
                field: name.to_owned(),
            })
    }

    /// The value of `name` read as `T`.
    ///
    /// # Errors
    ///
    /// * [`QueryError::FieldNotFound`] if the template has no such field.
    /// * [`QueryError::TypeMismatch`] if the captured type cannot be read
    ///   as `T` without loss.
    pub fn get<T: FromLogValue>(&self, name: &str) -> Result<T, QueryError> {
        let value = self.value(name)?;
        convert(name, value)
    }

    /// The `index`-th captured value read as `T`. Works for anonymous
    /// placeholders too.
    pub fn get_index<T: FromLogValue>(&self, index: usize) -> Result<T, QueryError> {
        let field = format!("#{}", index);
        let value = self
            .values
            .get(index)
            .ok_or_else(|| QueryError::FieldNotFound {
                template: self.site().template().to_owned(),
                field: field.clone(),
            })?;
        convert(&field, value)
    }

    pub fn message(&self) -> Result<String, RenderError> {
        formatter::render_message(self.site(), &self.values)
    }

    /// The full output line, as a text sink would receive it.
    pub fn render(&self) -> Result<String, RenderError> {
        formatter::render_line(self.site(), self.timestamp_micros, &self.values)
    }
}

fn convert<T: FromLogValue>(field: &str, value: &LogValue) -> Result<T, QueryError> {
    T::from_log_value(value).ok_or_else(|| QueryError::TypeMismatch {
        field: field.to_owned(),
        expected: std::any::type_name::<T>(),
        found: value.type_name(),
    })
}

enum Matcher<'a> {
    All,
    Locator(Locator<'a>),
    Template(&'a str),
    Predicate(Box<dyn FnMut(&RecordView) -> bool + 'a>),
}

impl Matcher<'_> {
    /// Cheap check on the call site, before the record is decoded.
    fn accepts_site(&self, site: &CallSiteInfo) -> bool {
        match self {
            Matcher::All | Matcher::Predicate(_) => true,
            Matcher::Locator(locator) => locator.matches(site),
            Matcher::Template(template) => site.template() == *template,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Position {
    Start,
    After { epoch: u64, location: RecordLocation },
}

/// A forward cursor over captured records, oldest first.
///
/// The cursor ends early if the stream is drained while it is live. Call
/// [`restart`](LogCursor::restart) to walk the records again from the
/// oldest one.
pub struct LogCursor<'a> {
    stream: &'a LogStream,
    matcher: Matcher<'a>,
    position: Position,
    done: bool,
}

impl<'a> LogCursor<'a> {
    fn new(stream: &'a LogStream, matcher: Matcher<'a>) -> Self {
        Self {
            stream,
            matcher,
            position: Position::Start,
            done: false,
        }
    }

    pub fn restart(&mut self) {
        self.position = Position::Start;
        self.done = false;
    }

    // Returns the next record whose site passes the matcher, or `None` at
    // the end of the arena.
    fn next_candidate(&mut self) -> Option<RecordView> {
        let stream = self.stream;
        let state = stream.state.lock();
        let arena = &state.arena;

        loop {
            let next = match self.position {
                Position::Start => arena.first_location(),
                Position::After { epoch, location } if epoch == arena.epoch() => {
                    arena.next_location(location)
                }
                Position::After { .. } => None,
            };
            let Some(location) = next else {
                self.done = true;
                return None;
            };
            let epoch = arena.epoch();
            self.position = Position::After { epoch, location };

            let Some(bytes) = arena.get(location) else {
                continue;
            };
            let site = match log_reader::read_header(bytes) {
                Ok(header) => call_site::lookup(header.site_id),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping undecodable record");
                    None
                }
            };
            let Some(site) = site.filter(|site| self.matcher.accepts_site(site)) else {
                continue;
            };

            match log_reader::decode_record(bytes) {
                Ok(record) => {
                    return Some(RecordView {
                        handle: RecordHandle {
                            epoch,
                            location,
                            site,
                        },
                        timestamp_micros: record.timestamp_micros,
                        values: record.values,
                    })
                }
                Err(err) => tracing::warn!(error = %err, "skipping undecodable record"),
            }
        }
    }
}

impl Iterator for LogCursor<'_> {
    type Item = RecordView;

    fn next(&mut self) -> Option<RecordView> {
        while !self.done {
            let view = self.next_candidate()?;
            // The predicate runs without the stream lock held.
            let accepted = match &mut self.matcher {
                Matcher::Predicate(predicate) => predicate(&view),
                _ => true,
            };
            if accepted {
                return Some(view);
            }
        }
        None
    }
}

impl LogStream {
    /// Every record, oldest first.
    pub fn records(&self) -> LogCursor<'_> {
        LogCursor::new(self, Matcher::All)
    }

    /// Records accepted by `predicate`, oldest first.
    pub fn iter_matching<'a, F>(&'a self, predicate: F) -> LogCursor<'a>
    where
        F: FnMut(&RecordView) -> bool + 'a,
    {
        LogCursor::new(self, Matcher::Predicate(Box::new(predicate)))
    }

    /// Records whose call site has exactly this template.
    ///
    /// ```
    /// # use replay_logger::{log_info, LogConfig, LogStream};
    /// let stream = LogStream::new(LogConfig::default()).unwrap();
    /// for i in 1..=4 {
    ///     log_info!(&stream => "sum={sum}, i={i}", i * 10, i);
    /// }
    ///
    /// let sums: Vec<i32> = stream
    ///     .iter_template("sum={sum}, i={i}")
    ///     .map(|record| record.get("sum").unwrap())
    ///     .collect();
    /// assert_eq!(sums, vec![10, 20, 30, 40]);
    /// ```
    pub fn iter_template<'a>(&'a self, template: &'a str) -> LogCursor<'a> {
        LogCursor::new(self, Matcher::Template(template))
    }

    /// Records from the sites selected by `locator`.
    pub fn iter_located<'a>(&'a self, locator: Locator<'a>) -> LogCursor<'a> {
        LogCursor::new(self, Matcher::Locator(locator))
    }

    /// Picks one record from the sites selected by `locator`.
    pub fn find(&self, locator: Locator<'_>, occurrence: Occurrence) -> Result<RecordView, QueryError> {
        let mut cursor = self.iter_located(locator);
        let found = match occurrence {
            Occurrence::First => cursor.next(),
            Occurrence::Last => cursor.last(),
            Occurrence::Nth(n) => cursor.nth(n),
        };
        found.ok_or_else(|| QueryError::RecordNotFound {
            locator: locator.to_string(),
        })
    }

    pub fn count(&self, locator: Locator<'_>) -> usize {
        self.iter_located(locator).count()
    }

    /// Reads a field of the first record logged at `locator`.
    ///
    /// ```
    /// # use replay_logger::{log_info, LogConfig, LogStream, Locator};
    /// let stream = LogStream::new(LogConfig::default()).unwrap();
    /// let line = line!(); log_info!(&stream => "sum={sum}, i={i}", 10, 1);
    ///
    /// let here = Locator::at(file!(), line);
    /// assert_eq!(stream.get_field::<i32>(here, "sum").unwrap(), 10);
    /// assert_eq!(stream.get_field::<i64>(here, "i").unwrap(), 1);
    /// assert!(stream.get_field::<i32>(here, "missing").unwrap_err().is_not_found());
    /// ```
    pub fn get_field<T: FromLogValue>(&self, locator: Locator<'_>, field: &str) -> Result<T, QueryError> {
        self.get_field_at(locator, field, Occurrence::First)
    }

    pub fn get_field_at<T: FromLogValue>(
        &self,
        locator: Locator<'_>,
        field: &str,
        occurrence: Occurrence,
    ) -> Result<T, QueryError> {
        self.find(locator, occurrence)?.get(field)
    }

    /// Decodes the record behind a handle returned by a push.
    ///
    /// # Errors
    ///
    /// [`QueryError::StaleHandle`] if the stream has been drained since.
    pub fn record(&self, handle: &RecordHandle) -> Result<RecordView, QueryError> {
        let state = self.state.lock();
        let current_epoch = state.arena.epoch();
        if handle.epoch != current_epoch {
            return Err(QueryError::StaleHandle {
                handle_epoch: handle.epoch,
                current_epoch,
            });
        }

        let bytes = state
            .arena
            .get(handle.location)
            .ok_or_else(|| QueryError::RecordNotFound {
                locator: format!("{} (block {}, record {})", handle.site, handle.location.block, handle.location.index),
            })?;
        let record = log_reader::decode_record(bytes)?;
        Ok(RecordView {
            handle: *handle,
            timestamp_micros: record.timestamp_micros,
            values: record.values,
        })
    }
}
