use std::fs;

use replay_logger::sink::{DirMode, FileSink, LogFacadeSink, MemorySink, TextSink, TracingSink, WriterSink};
use replay_logger::{log_at, log_error, log_info, log_warn, LogStream, Severity};
use tempfile::TempDir;

fn lines_of(path: std::path::PathBuf) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn test_file_sink_single_file() {
    let dir = TempDir::new().unwrap();
    let stream = LogStream::builder()
        .text_sink(FileSink::new(dir.path(), DirMode::SingleFile("app.log".into())).unwrap())
        .build()
        .unwrap();

    log_info!(&stream => "started {name}", "svc");
    log_warn!(&stream => "queue at {pct}%", 91u8);
    drop(stream);

    let lines = lines_of(dir.path().join("app.log"));
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("[INFO]"));
    assert!(lines[0].ends_with("started svc"));
    assert!(lines[1].ends_with("queue at 91%"));
}

#[test]
fn test_file_sink_split_by_severity() {
    let dir = TempDir::new().unwrap();
    let stream = LogStream::builder()
        .text_sink(FileSink::new(dir.path(), DirMode::SplitBySeverity).unwrap())
        .build()
        .unwrap();

    log_info!(&stream => "one");
    log_error!(&stream => "two");
    log_info!(&stream => "three");
    drop(stream);

    assert_eq!(lines_of(dir.path().join("info.log")).len(), 2);
    let errors = lines_of(dir.path().join("error.log"));
    assert_eq!(errors.len(), 1);
    assert!(errors[0].ends_with("two"));
    assert!(!dir.path().join("warn.log").exists());
}

#[test]
fn test_file_sink_split_by_category() {
    let dir = TempDir::new().unwrap();
    let logs = dir.path().join("nested").join("logs");
    let stream = LogStream::builder()
        .text_sink(FileSink::new(&logs, DirMode::SplitByCategory).unwrap())
        .build()
        .unwrap();

    log_at!(&stream => Info in "net", "connected");
    log_at!(&stream => Warn in "../db", "slow query");
    log_info!(&stream => "plain");
    drop(stream);

    assert_eq!(lines_of(logs.join("net.log")).len(), 1);
    assert_eq!(lines_of(logs.join("___db.log")).len(), 1);
    assert_eq!(lines_of(logs.join("default.log")).len(), 1);
}

#[test]
fn test_writer_sink_and_memory_sink_see_the_same_lines() {
    let memory = MemorySink::new();
    let mut writer = WriterSink::new(Vec::new());
    let mut shared = memory.clone();

    for sink in [&mut writer as &mut dyn TextSink, &mut shared as &mut dyn TextSink] {
        sink.write_line(Severity::Info, None, "first").unwrap();
        sink.write_line(Severity::Error, Some("db"), "second").unwrap();
        sink.flush().unwrap();
    }

    assert_eq!(String::from_utf8(writer.into_inner()).unwrap(), "first\nsecond\n");
    assert_eq!(memory.lines(), vec!["first", "second"]);
    memory.clear();
    assert!(memory.is_empty());
}

#[test]
fn test_facade_sinks_accept_every_severity() {
    let mut tracing_sink = TracingSink;
    let mut log_sink = LogFacadeSink;
    for severity in [Severity::Info, Severity::Warn, Severity::Error, Severity::Fatal] {
        assert!(tracing_sink.write_line(severity, Some("net"), "line").is_ok());
        assert!(log_sink.write_line(severity, None, "line").is_ok());
    }
    assert!(log_sink.flush().is_ok());
}

#[test]
fn test_every_text_sink_receives_each_record() {
    let first = MemorySink::new();
    let second = MemorySink::new();
    let stream = LogStream::builder()
        .text_sink(first.clone())
        .text_sink(second.clone())
        .build()
        .unwrap();

    log_info!(&stream => "fan out {n}", 1);
    stream.add_text_sink(MemorySink::new());
    log_info!(&stream => "fan out {n}", 2);

    assert_eq!(first.lines(), second.lines());
    assert_eq!(first.len(), 2);
    assert_eq!(stream.stats().sink_errors, 0);
}
