use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::process::ExitCode;

use replay_logger::log_reader;
use replay_logger::sink::{Lz4BinarySink, StderrSink};
use replay_logger::{
    context_scope, diagnostics, log_every, log_get, log_info, log_warn, FlushMode, LogConfig, LogStream,
};

/// Demo: records a small workload with output suspended, replays it through
/// queries, then dumps the arena as lz4 frames and decodes them again.
///
/// Usage: `replay_logger [dump-file]`
fn main() -> ExitCode {
    diagnostics::init_diagnostics("replay_logger=info");

    let dump = env::args().nth(1).unwrap_or_else(|| "replay_dump.bin".to_owned());
    match run(&dump) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("replay_logger: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(dump: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = LogConfig::from_env()?.with_flush_mode(FlushMode::Append);
    let stream = LogStream::builder()
        .config(config)
        .text_sink(StderrSink)
        .binary_sink(Lz4BinarySink::new(BufWriter::new(File::create(dump)?)))
        .build()?;

    {
        let _quiet = stream.suspend_scope();
        let mut sum = 0i64;
        for i in 1..=100i64 {
            context_scope!("summing item {i}", i);
            sum += i;
            log_every!(&stream => Info, 25, "sum={sum}, i={i}", sum, i);
        }
        log_info!(&stream => "CacheHit: input = {input}", 2.5f64);
        log_warn!(&stream => "slow step took {ms} ms", 120u32);

        let input = log_get!(&stream => "CacheHit", input, f64)?;
        let sums: Vec<i64> = stream
            .iter_template("sum={sum}, i={i}")
            .filter_map(|record| record.get("sum").ok())
            .collect();
        println!("captured {} records while suspended", stream.record_count());
        println!("sampled sums: {sums:?}, cache input: {input}");
    }

    // The suspend guard resumed and flushed; drop the stream to close the dump
    drop(stream);

    let data = std::fs::read(dump)?;
    let records = log_reader::read_compressed_frames(&data)?;
    println!("{} records decoded from {dump}:", records.len());
    for record in &records {
        match record.render() {
            Ok(line) => println!("  {line}"),
            Err(err) => println!("  <unrenderable record: {err}>"),
        }
    }
    Ok(())
}
