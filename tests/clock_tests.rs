use std::sync::Arc;
use std::thread;
use std::time::Duration;

use replay_logger::clock::{format_timestamp, get_timestamp, Clock, ManualClock, SystemClock};
use replay_logger::sink::MemorySink;
use replay_logger::{log_info, LogStream};

#[test]
fn test_timestamp_monotonicity() {
    let mut prev = get_timestamp();
    for _ in 0..1000 {
        let current = get_timestamp();
        assert!(current >= prev, "Timestamps should not go backwards");
        prev = current;
    }
}

#[test]
fn test_system_clock_tracks_real_time() {
    let before = SystemClock.now_micros();
    thread::sleep(Duration::from_millis(2));
    let after = SystemClock.now_micros();
    assert!(after - before >= 2_000);
}

#[test]
fn test_manual_clock_timestamps_reach_records_and_lines() {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000_000));
    let lines = MemorySink::new();
    let stream = LogStream::builder()
        .clock(clock.clone())
        .text_sink(lines.clone())
        .build()
        .unwrap();

    let first = log_info!(&stream => "first").unwrap();
    clock.advance(Duration::from_micros(1_500));
    let second = log_info!(&stream => "second").unwrap();

    assert_eq!(stream.record(&first).unwrap().timestamp_micros(), 1_700_000_000_000_000);
    assert_eq!(stream.record(&second).unwrap().timestamp_micros(), 1_700_000_000_001_500);

    let lines = lines.lines();
    assert!(lines[0].contains(" 1700000000.000000 "));
    assert!(lines[1].contains(" 1700000000.001500 "));
}

#[test]
fn test_manual_clock_set() {
    let clock = ManualClock::new(0);
    clock.set(42);
    assert_eq!(clock.now_micros(), 42);
    assert_eq!(format_timestamp(clock.now_micros()), "0.000042");
}
