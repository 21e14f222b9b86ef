//! Installation helpers for the engine's own diagnostics.
//!
//! The engine reports flushes, render failures and sink errors as `tracing`
//! events under the `replay_logger` target. These helpers install a
//! `tracing-subscriber` formatter for them; applications that already have
//! a subscriber need neither.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Installs a stderr subscriber filtered by `filter`, a directive string such
/// as `"replay_logger=debug"`. `RUST_LOG` takes precedence when set.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_diagnostics(filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(filter))
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

/// Installs a subscriber writing to `dir/file_name` on a background thread.
///
/// Events are written until the returned guard is dropped. Returns `None` if
/// a global subscriber was already installed.
pub fn init_file_diagnostics(dir: impl AsRef<Path>, file_name: &str, filter: &str) -> Option<WorkerGuard> {
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(filter))
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()
        .map(|()| guard)
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}
