use parking_lot::Mutex;
use replay_logger::call_site::{register, CallSiteMeta};
use replay_logger::clock::Clock;
use replay_logger::codec;
use replay_logger::log_reader::read_frames;
use replay_logger::sink::{MemoryBinarySink, MemorySink};
use replay_logger::{
    log_at, log_fatal, log_info, log_warn, FlushMode, FlushSummary, LogConfig, LogError, LogStream,
    Locator, LogValue, QueryError, Severity,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

/// Each reading is one microsecond after the previous one.
struct CountingClock(AtomicU64);

impl Clock for CountingClock {
    fn now_micros(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

fn stream_with(config: LogConfig) -> (LogStream, MemorySink) {
    let lines = MemorySink::new();
    let stream = LogStream::builder()
        .config(config)
        .text_sink(lines.clone())
        .build()
        .unwrap();
    (stream, lines)
}

fn deferred() -> LogConfig {
    LogConfig::default()
        .with_flush_mode(FlushMode::Append)
        .with_live_output(false)
}

#[test]
fn test_flush_on_empty_stream_is_noop() {
    let binary = MemoryBinarySink::new();
    let lines = MemorySink::new();
    let stream = LogStream::builder()
        .text_sink(lines.clone())
        .binary_sink(binary.clone())
        .build()
        .unwrap();

    assert_eq!(stream.flush(), FlushSummary::default());
    assert!(lines.is_empty());
    assert_eq!(binary.block_count(), 0);
    assert_eq!(stream.stats().flushes, 0);
    assert_eq!(stream.epoch(), 0, "Empty flush should not invalidate handles");
}

#[test]
fn test_suspend_then_resume_renders_nothing() {
    let (stream, lines) = stream_with(LogConfig::default());

    stream.suspend();
    assert_eq!(stream.resume(), FlushSummary::default());
    assert!(lines.is_empty());
    assert_eq!(stream.stats().captured, 0);

    // With an already rendered record in the arena
    log_info!(&stream => "before suspend {n}", 1);
    assert_eq!(lines.len(), 1);
    stream.suspend();
    stream.resume();
    assert_eq!(lines.len(), 1, "Live-rendered records must not be written twice");
    assert_eq!(stream.stats().captured, 1);
}

#[test]
fn test_live_output_renders_at_capture() {
    let (stream, lines) = stream_with(LogConfig::default());

    log_warn!(&stream => "disk usage at {pct}%", 91u8);
    let rendered = lines.lines();
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].starts_with("[WARN] "), "unexpected line: {}", rendered[0]);
    assert!(rendered[0].contains("tests/stream_tests.rs:"));
    assert!(rendered[0].ends_with("disk usage at 91%"));

    // Still queryable until flushed
    assert_eq!(stream.record_count(), 1);
    stream.flush();
    assert_eq!(lines.len(), 1);
    assert_eq!(stream.record_count(), 0);
}

#[test]
fn test_suspended_records_render_on_resume() {
    let (stream, lines) = stream_with(LogConfig::default());

    stream.suspend();
    assert!(stream.is_suspended());
    for i in 0..3 {
        log_info!(&stream => "step {i}", i);
    }
    assert!(lines.is_empty());
    assert_eq!(stream.record_count(), 3);

    let summary = stream.resume();
    assert_eq!(summary.records, 3);
    assert!(!stream.is_suspended());

    let rendered = lines.lines();
    assert_eq!(rendered.len(), 3);
    for (i, line) in rendered.iter().enumerate() {
        assert!(line.ends_with(&format!("step {}", i)), "out of order: {:?}", rendered);
    }
}

#[test]
fn test_oversized_record_is_a_configuration_error() {
    let stream = LogStream::new(LogConfig::default().with_block_capacity(64)).unwrap();
    let blob = "x".repeat(100);

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        log_info!(&stream => "blob {data}", blob.as_str());
    }));
    assert!(result.is_err(), "push must panic on a record larger than a block");

    let site = register(CallSiteMeta {
        file: file!(),
        line: line!(),
        column: 0,
        module_path: module_path!(),
        template: "blob {data}",
        severity: Severity::Info,
        category: None,
    })
    .unwrap();
    let err = stream.try_push(site, &[&blob]).unwrap_err();
    assert!(matches!(err, LogError::RecordTooLarge { capacity: 64, .. }));
    assert_eq!(stream.record_count(), 0, "Nothing may be captured partially");
}

#[test]
fn test_flush_when_full_drains_exactly_once() {
    const N: usize = 4;
    let record_size = codec::record_len(&[LogValue::I32(0)]);
    let config = LogConfig::default()
        .with_block_capacity(N * record_size)
        .with_flush_mode(FlushMode::FlushWhenFull)
        .with_live_output(false);
    let (stream, lines) = stream_with(config);

    for i in 0..N as i32 {
        log_info!(&stream => "n={n}", i);
    }
    assert_eq!(stream.stats().auto_flushes, 0);
    assert!(lines.is_empty());

    log_info!(&stream => "n={n}", N as i32);
    let stats = stream.stats();
    assert_eq!(stats.auto_flushes, 1);
    assert_eq!(stats.records_drained, N as u64);
    assert_eq!(lines.len(), N);
    assert_eq!(stream.record_count(), 1);
    assert_eq!(stream.block_count(), 1);
}

#[test]
fn test_append_mode_links_blocks() {
    let record_size = codec::record_len(&[LogValue::I32(0)]);
    let config = deferred().with_block_capacity(4 * record_size);
    let (stream, lines) = stream_with(config);

    for i in 0..10 {
        log_info!(&stream => "n={n}", i);
    }
    assert_eq!(stream.block_count(), 3);
    assert_eq!(stream.record_count(), 10);
    assert!(lines.is_empty());

    let summary = stream.flush();
    assert_eq!(summary, FlushSummary { blocks: 3, records: 10 });
    assert_eq!(stream.block_count(), 1);
    assert_eq!(lines.len(), 10);
}

#[test]
fn test_switching_to_flush_when_full_drains_all_blocks_in_order() {
    let record_size = codec::record_len(&[LogValue::I32(0)]);
    let config = deferred().with_block_capacity(4 * record_size);
    let (stream, lines) = stream_with(config);

    for i in 0..8 {
        log_info!(&stream => "n={n}", i);
    }
    assert_eq!(stream.block_count(), 2);

    stream.set_flush_mode(FlushMode::FlushWhenFull);
    log_info!(&stream => "n={n}", 8);

    let rendered = lines.lines();
    assert_eq!(rendered.len(), 8);
    for (i, line) in rendered.iter().enumerate() {
        assert!(line.ends_with(&format!("n={}", i)));
    }
    assert_eq!(stream.record_count(), 1);
}

#[test]
fn test_concurrent_pushes_keep_lock_order() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 250;

    let stream = LogStream::builder()
        .config(deferred())
        .clock(Arc::new(CountingClock(AtomicU64::new(0))))
        .build()
        .unwrap();

    thread::scope(|scope| {
        for t in 0..THREADS {
            let stream = &stream;
            scope.spawn(move || {
                for seq in 0..PER_THREAD {
                    log_info!(stream => "thread={t}, seq={seq}", t, seq);
                }
            });
        }
    });

    let records: Vec<_> = stream.records().collect();
    assert_eq!(records.len(), THREADS * PER_THREAD);

    // The clock is read under the stream lock, so timestamps follow lock order
    for pair in records.windows(2) {
        assert!(pair[0].timestamp_micros() < pair[1].timestamp_micros());
    }

    // Each thread's own records stay in program order
    let mut next_seq = [0usize; THREADS];
    for record in &records {
        let t: usize = record.get("t").unwrap();
        let seq: usize = record.get("seq").unwrap();
        assert_eq!(seq, next_seq[t]);
        next_seq[t] += 1;
    }
}

#[test]
fn test_filter_runs_before_capture() {
    let (stream, _lines) = stream_with(deferred().with_min_severity(Severity::Warn));

    let info_line = line!(); assert!(log_info!(&stream => "ignored {n}", 1u8).is_none());
    let warn_line = line!(); assert!(log_warn!(&stream => "kept {n}", 2u8).is_some());

    assert!(stream
        .get_field::<u8>(Locator::at(file!(), info_line), "n")
        .unwrap_err()
        .is_not_found());
    assert_eq!(stream.get_field::<u8>(Locator::at(file!(), warn_line), "n").unwrap(), 2);

    stream.set_categories(["net"]);
    assert!(log_at!(&stream => Warn in "net", "net record").is_some());
    assert!(log_at!(&stream => Warn in "db", "db record").is_none());
    assert!(log_warn!(&stream => "uncategorized").is_none());

    let stats = stream.stats();
    assert_eq!(stats.captured, 2);
    assert_eq!(stats.dropped, 3);
    assert_eq!(stream.record_count(), 2);

    stream.set_categories(Vec::<String>::new());
    stream.set_min_severity(Severity::Info);
    assert!(log_info!(&stream => "allowed again").is_some());
}

#[test]
fn test_handles_go_stale_after_flush() {
    let stream = LogStream::new(deferred()).unwrap();

    let handle = log_info!(&stream => "value={v}", 7i32).unwrap();
    let view = stream.record(&handle).unwrap();
    assert_eq!(view.get::<i32>("v").unwrap(), 7);

    stream.flush();
    assert_eq!(
        stream.record(&handle).unwrap_err(),
        QueryError::StaleHandle {
            handle_epoch: 0,
            current_epoch: 1
        }
    );
}

#[test]
fn test_nested_suspension_resumes_once() {
    let (stream, lines) = stream_with(LogConfig::default());

    stream.suspend();
    stream.suspend();
    log_info!(&stream => "inside");

    assert_eq!(stream.resume(), FlushSummary::default());
    assert!(stream.is_suspended());
    assert!(lines.is_empty());

    assert_eq!(stream.resume().records, 1);
    assert!(!stream.is_suspended());
    assert!(stream.live_output());
    assert_eq!(stream.flush_mode(), FlushMode::FlushWhenFull);
    assert_eq!(lines.len(), 1);
}

#[test]
fn test_suspend_scope_resumes_on_drop() {
    let (stream, lines) = stream_with(LogConfig::default());
    {
        let _quiet = stream.suspend_scope();
        log_info!(&stream => "quiet {n}", 1);
        assert!(stream.is_suspended());
        assert!(lines.is_empty());
    }
    assert!(!stream.is_suspended());
    assert_eq!(lines.len(), 1);
}

#[test]
fn test_fatal_drains_suspended_output() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&events);
    let lines = MemorySink::new();
    let stream = LogStream::builder()
        .text_sink(lines.clone())
        .on_fatal(move |event| seen.lock().push(event.message.clone()))
        .build()
        .unwrap();

    stream.suspend();
    log_info!(&stream => "last good state {n}", 3);
    log_fatal!(&stream => "disk {name} failed", "sda");

    assert_eq!(*events.lock(), vec!["disk sda failed".to_owned()]);
    let rendered = lines.lines();
    assert_eq!(rendered.len(), 2);
    assert!(rendered[0].ends_with("last good state 3"));
    assert!(rendered[1].starts_with("[FATAL]"));
    assert_eq!(stream.record_count(), 0);
}

#[test]
fn test_binary_sink_receives_raw_blocks() {
    let binary = MemoryBinarySink::new();
    let stream = LogStream::builder()
        .config(deferred())
        .binary_sink(binary.clone())
        .build()
        .unwrap();

    log_info!(&stream => "a={a}, b={b}", 1u16, "two");
    log_info!(&stream => "c={c}", 3.0f64);
    stream.flush();
    assert_eq!(binary.block_count(), 1);

    let records = read_frames(&binary.data()).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].values, vec![LogValue::U16(1), LogValue::Str("two".into())]);
    assert_eq!(records[1].values, vec![LogValue::F64(3.0)]);
    assert_eq!(records[1].site().unwrap().template(), "c={c}");
}

#[test]
fn test_render_failure_falls_back_and_keeps_record() {
    let (stream, lines) = stream_with(deferred());
    let site = register(CallSiteMeta {
        file: file!(),
        line: line!(),
        column: 0,
        module_path: module_path!(),
        template: "a={a} b={b}",
        severity: Severity::Error,
        category: None,
    })
    .unwrap();

    let handle = stream.push(site, &[&1i32]).unwrap();
    let view = stream.record(&handle).unwrap();
    assert_eq!(view.get::<i32>("a").unwrap(), 1);
    assert!(view.get::<i32>("b").unwrap_err().is_not_found());

    stream.flush();
    let rendered = lines.lines();
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].contains("a={a} b={b} [1]"), "unexpected line: {}", rendered[0]);
    assert_eq!(stream.stats().render_errors, 1);
}

#[test]
fn test_drop_drains_remaining_records() {
    let lines = MemorySink::new();
    {
        let stream = LogStream::builder()
            .config(deferred())
            .text_sink(lines.clone())
            .build()
            .unwrap();
        log_info!(&stream => "pending {n}", 1);
        assert!(lines.is_empty());
    }
    assert_eq!(lines.len(), 1);
}

#[test]
fn test_invalid_config_is_rejected() {
    let err = LogStream::new(LogConfig::default().with_block_capacity(8)).unwrap_err();
    assert!(matches!(err, LogError::InvalidConfig(_)));
}

#[test]
#[cfg(target_pointer_width = "64")]
fn test_block_capacity_beyond_u32_is_rejected() {
    let result = panic::catch_unwind(|| {
        LogStream::new(LogConfig::default().with_block_capacity(usize::MAX)).map(drop)
    });
    assert!(matches!(result, Ok(Err(LogError::InvalidConfig(_)))));

    let err = LogStream::builder()
        .config(LogConfig::default().with_block_capacity(u32::MAX as usize + 1))
        .build()
        .unwrap_err();
    assert!(matches!(err, LogError::InvalidConfig(_)));
}
