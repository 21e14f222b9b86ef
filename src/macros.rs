//! Logging macros.
//!
//! Every macro registers its call site once, the first time it runs, and
//! caches it in a `static` local to the expansion. Templates are checked at
//! compile time: a template with unbalanced braces does not build.
//!
//! Each logging macro has two forms. Without a stream it logs to
//! [`default_stream`](crate::default_stream); with `stream =>` it logs to the
//! given `&LogStream`:
//!
//! ```
//! # use replay_logger::{log_info, log_warn, log_at, LogConfig, LogStream};
//! let stream = LogStream::new(LogConfig::default()).unwrap();
//! let input = 7;
//! log_info!(&stream => "CacheHit: input = {input}", input);
//! log_warn!(&stream => "slow request: {ms} ms", 950u64);
//! log_at!(&stream => Error in "net", "connection to {host} lost", "db-1");
//! assert_eq!(stream.record_count(), 3);
//! ```
//!
//! Every logging macro evaluates to `Option<RecordHandle>`, `None` when the
//! record was filtered out or the condition of a conditional macro did not
//! hold.

use std::sync::atomic::{AtomicU64, Ordering};

/// True on the 1st, (n+1)th, (2n+1)th... call. Never true for `n == 0`.
#[doc(hidden)]
pub fn every_nth(counter: &AtomicU64, n: u64) -> bool {
    let count = counter.fetch_add(1, Ordering::Relaxed);
    n > 0 && count % n == 0
}

/// True for the first `n` calls only.
#[doc(hidden)]
pub fn first_n(counter: &AtomicU64, n: u64) -> bool {
    counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
            (count < n).then_some(count + 1)
        })
        .is_ok()
}

#[doc(hidden)]
#[macro_export]
macro_rules! __site {
    ($severity:expr, $category:expr, $fmt:literal) => {{
        const _: () = assert!($crate::template::validate_template($fmt));
        static SITE: ::std::sync::OnceLock<&'static $crate::CallSiteInfo> = ::std::sync::OnceLock::new();
        *SITE.get_or_init(|| {
            $crate::call_site::register_validated($crate::call_site::CallSiteMeta {
                file: file!(),
                line: line!(),
                column: column!(),
                module_path: module_path!(),
                template: $fmt,
                severity: $severity,
                category: $category,
            })
        })
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __push {
    ($stream:expr, $site:expr $(, $arg:expr)*) => {{
        let stream: &$crate::LogStream = $stream;
        stream.push($site, &[$(&$arg as &dyn $crate::Loggable),*])
    }};
}

/// Logs with an explicit severity and optional category.
///
/// ```
/// # use replay_logger::{log_at, LogConfig, LogStream};
/// let stream = LogStream::new(LogConfig::default()).unwrap();
/// log_at!(&stream => Warn in "db", "pool exhausted after {n} tries", 3);
/// log_at!(&stream => Info, "plain record");
/// ```
#[macro_export]
macro_rules! log_at {
    ($stream:expr => $severity:ident in $category:literal, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        let site = $crate::__site!(
            $crate::Severity::$severity,
            ::core::option::Option::Some($category),
            $fmt
        );
        $crate::__push!($stream, site $(, $arg)*)
    }};
    ($stream:expr => $severity:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        let site = $crate::__site!($crate::Severity::$severity, ::core::option::Option::None, $fmt);
        $crate::__push!($stream, site $(, $arg)*)
    }};
}

#[macro_export]
macro_rules! log_info {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::log_at!($crate::default_stream() => Info, $fmt $(, $arg)*)
    };
    ($stream:expr => $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::log_at!($stream => Info, $fmt $(, $arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::log_at!($crate::default_stream() => Warn, $fmt $(, $arg)*)
    };
    ($stream:expr => $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::log_at!($stream => Warn, $fmt $(, $arg)*)
    };
}

#[macro_export]
macro_rules! log_error {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::log_at!($crate::default_stream() => Error, $fmt $(, $arg)*)
    };
    ($stream:expr => $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::log_at!($stream => Error, $fmt $(, $arg)*)
    };
}

/// Logs at fatal severity: the stream drains everything it holds, then runs
/// its fatal hook, which aborts the process unless replaced.
#[macro_export]
macro_rules! log_fatal {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::log_at!($crate::default_stream() => Fatal, $fmt $(, $arg)*)
    };
    ($stream:expr => $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::log_at!($stream => Fatal, $fmt $(, $arg)*)
    };
}

/// Logs only when `cond` holds. `cond` is evaluated before the arguments.
#[macro_export]
macro_rules! log_if {
    ($severity:ident, $cond:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::log_if!($crate::default_stream() => $severity, $cond, $fmt $(, $arg)*)
    };
    ($stream:expr => $severity:ident, $cond:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {
        if $cond {
            $crate::log_at!($stream => $severity, $fmt $(, $arg)*)
        } else {
            ::core::option::Option::None
        }
    };
}

/// Logs the 1st execution of the statement and every `n`-th after it.
///
/// ```
/// # use replay_logger::{log_every, LogConfig, LogStream};
/// let stream = LogStream::new(LogConfig::default()).unwrap();
/// for i in 0..10 {
///     log_every!(&stream => Info, 4, "tick {i}", i);
/// }
/// // Executions 0, 4 and 8
/// assert_eq!(stream.record_count(), 3);
/// ```
#[macro_export]
macro_rules! log_every {
    ($severity:ident, $n:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::log_every!($crate::default_stream() => $severity, $n, $fmt $(, $arg)*)
    };
    ($stream:expr => $severity:ident, $n:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        static COUNTER: ::std::sync::atomic::AtomicU64 = ::std::sync::atomic::AtomicU64::new(0);
        if $crate::macros::every_nth(&COUNTER, ($n) as u64) {
            $crate::log_at!($stream => $severity, $fmt $(, $arg)*)
        } else {
            ::core::option::Option::None
        }
    }};
}

/// Logs every `n`-th execution of the statement on which `cond` holds,
/// starting with the first. Executions where `cond` is false do not count.
#[macro_export]
macro_rules! log_if_every {
    ($severity:ident, $n:expr, $cond:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::log_if_every!($crate::default_stream() => $severity, $n, $cond, $fmt $(, $arg)*)
    };
    ($stream:expr => $severity:ident, $n:expr, $cond:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        static COUNTER: ::std::sync::atomic::AtomicU64 = ::std::sync::atomic::AtomicU64::new(0);
        if $cond && $crate::macros::every_nth(&COUNTER, ($n) as u64) {
            $crate::log_at!($stream => $severity, $fmt $(, $arg)*)
        } else {
            ::core::option::Option::None
        }
    }};
}

/// Logs only the first `n` executions of the statement.
#[macro_export]
macro_rules! log_first {
    ($severity:ident, $n:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::log_first!($crate::default_stream() => $severity, $n, $fmt $(, $arg)*)
    };
    ($stream:expr => $severity:ident, $n:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        static COUNTER: ::std::sync::atomic::AtomicU64 = ::std::sync::atomic::AtomicU64::new(0);
        if $crate::macros::first_n(&COUNTER, ($n) as u64) {
            $crate::log_at!($stream => $severity, $fmt $(, $arg)*)
        } else {
            ::core::option::Option::None
        }
    }};
}

/// Logging compiled in debug builds only. Severity defaults to Info.
///
/// ```
/// # use replay_logger::{dlog, LogConfig, LogStream};
/// let stream = LogStream::new(LogConfig::default()).unwrap();
/// dlog!(&stream => "cache size {n}", 3usize);
/// dlog!(&stream => Warn, "cache nearly full: {n}", 3usize);
/// ```
#[macro_export]
macro_rules! dlog {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::dlog!($crate::default_stream() => Info, $fmt $(, $arg)*)
    };
    ($severity:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::dlog!($crate::default_stream() => $severity, $fmt $(, $arg)*)
    };
    ($stream:expr => $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::dlog!($stream => Info, $fmt $(, $arg)*)
    };
    ($stream:expr => $severity:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {
        if cfg!(debug_assertions) {
            $crate::log_at!($stream => $severity, $fmt $(, $arg)*)
        } else {
            ::core::option::Option::None
        }
    };
}

/// [`log_if!`] compiled in debug builds only.
#[macro_export]
macro_rules! dlog_if {
    ($severity:ident, $cond:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::dlog_if!($crate::default_stream() => $severity, $cond, $fmt $(, $arg)*)
    };
    ($stream:expr => $severity:ident, $cond:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {
        if cfg!(debug_assertions) {
            $crate::log_if!($stream => $severity, $cond, $fmt $(, $arg)*)
        } else {
            ::core::option::Option::None
        }
    };
}

/// Reads a field logged by a statement in the calling module.
///
/// The statement is found by a piece of its template text.
///
/// ```
/// # use replay_logger::{log_get, log_info, LogConfig, LogStream};
/// let stream = LogStream::new(LogConfig::default()).unwrap();
/// log_info!(&stream => "CacheHit: input = {input}", 1.5f64);
///
/// let input = log_get!(&stream => "CacheHit", input, f64).unwrap();
/// assert_eq!(input, 1.5);
/// ```
#[macro_export]
macro_rules! log_get {
    ($message:literal, $field:ident, $ty:ty) => {
        $crate::log_get!($crate::default_stream() => $message, $field, $ty)
    };
    ($stream:expr => $message:literal, $field:ident, $ty:ty) => {
        ($stream).get_field::<$ty>(
            $crate::Locator::message(module_path!(), $message),
            stringify!($field),
        )
    };
}

/// Pushes a context frame for the rest of the enclosing block.
///
/// The values are captured now; the text is only rendered if a check fails
/// while the frame is active.
///
/// ```
/// # use replay_logger::{context, context_scope};
/// for i in 0..3 {
///     context_scope!("item {i}", i);
///     assert_eq!(context::render_frames(), vec![format!("item {}", i)]);
/// }
/// assert_eq!(context::depth(), 0);
/// ```
#[macro_export]
macro_rules! context_scope {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        const _: () = assert!($crate::template::validate_template($fmt));
        let context_values: ::std::vec::Vec<$crate::LogValue> =
            ::std::vec![$($crate::Loggable::to_log_value(&$arg)),*];
        let _context_guard = $crate::context::push_frame(move || {
            $crate::context::render_values($fmt, &context_values)
        });
    };
}

/// Checks a condition, reporting the active context frames if it fails.
///
/// Evaluates to the condition's value.
#[macro_export]
macro_rules! check {
    ($cond:expr $(,)?) => {{
        let passed: bool = $cond;
        if !passed {
            $crate::context::report_check_failure(
                file!(),
                line!(),
                stringify!($cond),
                ::core::option::Option::None,
            );
        }
        passed
    }};
    ($cond:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        let passed: bool = $cond;
        if !passed {
            let message = $crate::context::render_args($fmt, &[$(&$arg as &dyn $crate::Loggable),*]);
            $crate::context::report_check_failure(
                file!(),
                line!(),
                stringify!($cond),
                ::core::option::Option::Some(&message),
            );
        }
        passed
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_nth() {
        let counter = AtomicU64::new(0);
        let hits: Vec<bool> = (0..7).map(|_| every_nth(&counter, 3)).collect();
        assert_eq!(hits, vec![true, false, false, true, false, false, true]);
        assert!(!every_nth(&AtomicU64::new(0), 0));
    }

    #[test]
    fn test_first_n() {
        let counter = AtomicU64::new(0);
        let hits: Vec<bool> = (0..4).map(|_| first_n(&counter, 2)).collect();
        assert_eq!(hits, vec![true, true, false, false]);
    }
}
