//! Output targets for drained records.
//!
//! Two kinds of sink are fed by a stream:
//!
//! * [`TextSink`] receives one fully rendered line per record, either at
//!   capture time (live output) or when the record's block is drained.
//! * [`BinarySink`] receives the raw bytes of every drained block, to be
//!   decoded later with [`log_reader`](crate::log_reader).
//!
//! Sinks are called with the stream lock held and must not log back into
//! the same stream.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::severity::Severity;

/// Receives rendered log lines.
pub trait TextSink: Send {
    fn write_line(&mut self, severity: Severity, category: Option<&str>, line: &str) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Receives raw arena blocks.
pub trait BinarySink: Send {
    fn write_block(&mut self, block: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes lines to standard error.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl TextSink for StderrSink {
    fn write_line(&mut self, _severity: Severity, _category: Option<&str>, line: &str) -> io::Result<()> {
        let mut stderr = io::stderr().lock();
        stderr.write_all(line.as_bytes())?;
        stderr.write_all(b"\n")
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Writes lines to any [`Write`] implementation.
pub struct WriterSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> TextSink for WriterSink<W> {
    fn write_line(&mut self, _severity: Severity, _category: Option<&str>, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{}", line)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Collects lines in memory.
///
/// Clones share the same buffer, so a test can keep one clone and hand the
/// other to the stream.
///
/// ```
/// # use replay_logger::sink::{MemorySink, TextSink};
/// # use replay_logger::Severity;
/// let sink = MemorySink::new();
/// let mut writer = sink.clone();
/// writer.write_line(Severity::Info, None, "hello").unwrap();
/// assert_eq!(sink.lines(), vec!["hello"]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl TextSink for MemorySink {
    fn write_line(&mut self, _severity: Severity, _category: Option<&str>, line: &str) -> io::Result<()> {
        self.lines.lock().push(line.to_owned());
        Ok(())
    }
}

/// How a [`FileSink`] spreads lines over files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirMode {
    /// Every line goes to `<dir>/<name>`.
    SingleFile(String),
    /// One file per severity: `info.log`, `warn.log`, ...
    SplitBySeverity,
    /// One file per category, `default.log` for uncategorized lines.
    SplitByCategory,
}

/// Writes lines to files in a directory.
///
/// Files are opened in append mode on first use.
pub struct FileSink {
    dir: PathBuf,
    mode: DirMode,
    files: HashMap<String, BufWriter<File>>,
}

impl FileSink {
    /// Creates the directory if needed.
    pub fn new(dir: impl AsRef<Path>, mode: DirMode) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            mode,
            files: HashMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(&self, severity: Severity, category: Option<&str>) -> String {
        match &self.mode {
            DirMode::SingleFile(name) => name.clone(),
            DirMode::SplitBySeverity => format!("{}.log", severity.as_str().to_ascii_lowercase()),
            DirMode::SplitByCategory => match category {
                Some(category) => format!("{}.log", sanitize(category)),
                None => "default.log".to_owned(),
            },
        }
    }
}

// Keeps category names from escaping the sink directory.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

impl TextSink for FileSink {
    fn write_line(&mut self, severity: Severity, category: Option<&str>, line: &str) -> io::Result<()> {
        let name = self.file_name(severity, category);
        let writer = match self.files.entry(name) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(self.dir.join(entry.key()))?;
                entry.insert(BufWriter::new(file))
            }
        };
        writeln!(writer, "{}", line)
    }

    fn flush(&mut self) -> io::Result<()> {
        for writer in self.files.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        let _ = TextSink::flush(self);
    }
}

/// Forwards lines as `tracing` events with target `replay_logger::records`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TextSink for TracingSink {
    fn write_line(&mut self, severity: Severity, category: Option<&str>, line: &str) -> io::Result<()> {
        let category = category.unwrap_or("");
        match severity {
            Severity::Info => tracing::info!(target: "replay_logger::records", category, "{}", line),
            Severity::Warn => tracing::warn!(target: "replay_logger::records", category, "{}", line),
            Severity::Error | Severity::Fatal => {
                tracing::error!(target: "replay_logger::records", category, "{}", line)
            }
        }
        Ok(())
    }
}

/// Forwards lines to the `log` facade, so any `log` backend can receive them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacadeSink;

impl TextSink for LogFacadeSink {
    fn write_line(&mut self, severity: Severity, _category: Option<&str>, line: &str) -> io::Result<()> {
        let level = match severity {
            Severity::Info => log::Level::Info,
            Severity::Warn => log::Level::Warn,
            Severity::Error | Severity::Fatal => log::Level::Error,
        };
        log::log!(target: "replay_logger::records", level, "{}", line);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        log::logger().flush();
        Ok(())
    }
}

fn write_frame<W: Write>(writer: &mut W, frame: &[u8]) -> io::Result<()> {
    writer.write_all(&(frame.len() as u64).to_le_bytes())?;
    writer.write_all(frame)
}

/// Writes each block as a `u64` length-prefixed frame.
pub struct BinaryWriterSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> BinaryWriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> BinarySink for BinaryWriterSink<W> {
    fn write_block(&mut self, block: &[u8]) -> io::Result<()> {
        write_frame(&mut self.writer, block)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Compresses each block with lz4 before framing it.
///
/// Frames hold `lz4_flex::compress_prepend_size` output; read them back with
/// [`log_reader::read_compressed_frames`](crate::log_reader::read_compressed_frames).
pub struct Lz4BinarySink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> Lz4BinarySink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> BinarySink for Lz4BinarySink<W> {
    fn write_block(&mut self, block: &[u8]) -> io::Result<()> {
        let compressed = lz4_flex::compress_prepend_size(block);
        write_frame(&mut self.writer, &compressed)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Collects framed blocks in a shared in-memory buffer.
#[derive(Debug, Default, Clone)]
pub struct MemoryBinarySink {
    data: Arc<Mutex<Vec<u8>>>,
    blocks: Arc<Mutex<usize>>,
}

impl MemoryBinarySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, framed like [`BinaryWriterSink`] output.
    pub fn data(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    pub fn block_count(&self) -> usize {
        *self.blocks.lock()
    }
}

impl BinarySink for MemoryBinarySink {
    fn write_block(&mut self, block: &[u8]) -> io::Result<()> {
        write_frame(&mut *self.data.lock(), block)?;
        *self.blocks.lock() += 1;
        Ok(())
    }
}
