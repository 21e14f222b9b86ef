//! Per-thread diagnostic context.
//!
//! A context frame describes what the current thread is in the middle of
//! ("processing item 42"). Frames are pushed on entry to a scope and popped
//! when their [`FrameGuard`] drops, on every exit path including unwinding.
//! Their text is produced lazily: nothing is rendered unless a check fails.
//!
//! Frames never enter a log stream and cannot be queried.
//!
//! # Examples
//!
//! ```
//! # use replay_logger::context;
//! let _outer = context::push_frame(|| "loading config".to_owned());
//! {
//!     let _inner = context::push_frame(|| "parsing section [net]".to_owned());
//!     assert_eq!(context::depth(), 2);
//! }
//! assert_eq!(context::render_frames(), vec!["loading config"]);
//! ```

use std::cell::RefCell;
use std::marker::PhantomData;

use crate::formatter;
use crate::loggable::{LogValue, Loggable};

type RenderFn = Box<dyn Fn() -> String>;

/// A LIFO stack of lazily rendered frames.
///
/// Each thread has one behind the free functions of this module. Explicit
/// stacks are useful where the thread-local one is not wanted, such as tests
/// that check frame handling in isolation.
#[derive(Default)]
pub struct ContextStack {
    frames: RefCell<Vec<RenderFn>>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&self, render: F) -> FrameGuard<'_>
    where
        F: Fn() -> String + 'static,
    {
        let depth = push_onto(self, render);
        FrameGuard {
            stack: StackRef::Explicit(self),
            depth,
            _not_send: PhantomData,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Renders every active frame, outermost first.
    ///
    /// Render closures must not push frames onto the same stack.
    pub fn render_frames(&self) -> Vec<String> {
        self.frames.borrow().iter().map(|render| render()).collect()
    }

    /// The active frames followed by `message`, one per line.
    pub fn failure_report(&self, message: &str) -> String {
        let mut report = String::new();
        for frame in self.render_frames() {
            report.push_str("  in: ");
            report.push_str(&frame);
            report.push('\n');
        }
        report.push_str(message);
        report
    }

    fn pop_to(&self, depth: usize) {
        self.frames.borrow_mut().truncate(depth);
    }
}

// Returns the depth the stack had before the push.
fn push_onto<F>(stack: &ContextStack, render: F) -> usize
where
    F: Fn() -> String + 'static,
{
    let mut frames = stack.frames.borrow_mut();
    frames.push(Box::new(render));
    frames.len() - 1
}

thread_local! {
    static CONTEXT: ContextStack = ContextStack::new();
}

enum StackRef<'a> {
    Thread,
    Explicit(&'a ContextStack),
}

/// Pops its frame when dropped.
///
/// Guards are tied to the thread that created them.
#[must_use = "the frame is popped as soon as the guard is dropped"]
pub struct FrameGuard<'a> {
    stack: StackRef<'a>,
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        match self.stack {
            StackRef::Explicit(stack) => stack.pop_to(self.depth),
            StackRef::Thread => {
                // The thread-local may already be gone during thread teardown.
                let _ = CONTEXT.try_with(|stack| stack.pop_to(self.depth));
            }
        }
    }
}

/// Pushes a frame onto this thread's context stack.
pub fn push_frame<F>(render: F) -> FrameGuard<'static>
where
    F: Fn() -> String + 'static,
{
    let depth = CONTEXT.with(|stack| push_onto(stack, render));
    FrameGuard {
        stack: StackRef::Thread,
        depth,
        _not_send: PhantomData,
    }
}

pub fn depth() -> usize {
    CONTEXT.with(ContextStack::depth)
}

pub fn render_frames() -> Vec<String> {
    CONTEXT.with(ContextStack::render_frames)
}

pub fn failure_report(message: &str) -> String {
    CONTEXT.with(|stack| stack.failure_report(message))
}

/// Reports a failed check with this thread's context.
///
/// The report goes to standard error and to `tracing` at error level, and
/// is returned for callers that want to keep it.
pub fn report_check_failure(file: &str, line: u32, expression: &str, message: Option<&str>) -> String {
    let headline = match message {
        Some(message) => format!("{}:{}: check `{}` failed: {}", file, line, expression, message),
        None => format!("{}:{}: check `{}` failed", file, line, expression),
    };
    let report = failure_report(&headline);
    eprintln!("{}", report);
    tracing::error!(file, line, expression, "{}", report);
    report
}

/// Renders a template for a frame or check message.
///
/// Falls back to the template and raw values instead of failing.
#[doc(hidden)]
pub fn render_values(template: &str, values: &[LogValue]) -> String {
    match formatter::render_template(template, values) {
        Ok(text) => text,
        Err(err) => {
            let raw: Vec<String> = values.iter().map(ToString::to_string).collect();
            format!("{} [{}] ({})", template, raw.join(", "), err)
        }
    }
}

#[doc(hidden)]
pub fn render_args(template: &str, args: &[&dyn Loggable]) -> String {
    let values: Vec<LogValue> = args.iter().map(|arg| arg.to_log_value()).collect();
    render_values(template, &values)
}
