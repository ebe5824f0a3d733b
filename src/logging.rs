//! RAM log capture layer
//!
//! A `tracing_subscriber` layer that formats every event as one line and
//! hands it to a [`LogCapture`], which stores it in the ring and forwards it
//! to live log-stream subscribers.
//!
//! Line format: `YYYY-MM-DD HH:MM:SS:mmm <sev> target: message\n`, with
//! `sev` one of `err`, `wrn`, `inf`, `dbg`, `trc`.

use chrono::{DateTime, Utc};
use relaykit_core::ramlog::LogCapture;
use std::cell::Cell;
use std::fmt::{self, Write as _};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Default longest line, trailing newline included
pub const DEFAULT_MAX_LINE_LEN: usize = 256;

thread_local! {
    // Set while this thread is inside `LogCapture::capture_line`
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
}

struct CaptureGuard;

impl CaptureGuard {
    fn enter() -> Option<Self> {
        if CAPTURING.with(|c| c.replace(true)) {
            None
        } else {
            Some(CaptureGuard)
        }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        CAPTURING.with(|c| c.set(false));
    }
}

/// Layer writing formatted events into a [`LogCapture`]
///
/// Events logged while a line is being captured on the same thread (for
/// example a queue-full warning from the bus) are not captured again.
pub struct RamLogLayer {
    capture: Arc<LogCapture>,
    level: Level,
    max_line_len: usize,
}

impl RamLogLayer {
    /// Capture events at `level` and more severe
    pub fn new(capture: Arc<LogCapture>, level: Level, max_line_len: usize) -> Self {
        Self {
            capture,
            level,
            max_line_len: max_line_len.max(2),
        }
    }
}

impl<S: Subscriber> Layer<S> for RamLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > self.level {
            return;
        }
        let Some(_guard) = CaptureGuard::enter() else {
            return;
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let line = format_line(
            Utc::now(),
            *metadata.level(),
            metadata.target(),
            &visitor.finish(),
            self.max_line_len,
        );
        self.capture.capture_line(&line);
    }
}

impl fmt::Debug for RamLogLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RamLogLayer")
            .field("level", &self.level)
            .field("max_line_len", &self.max_line_len)
            .finish()
    }
}

/// Three-letter severity tag
pub fn severity(level: Level) -> &'static str {
    match level {
        Level::ERROR => "err",
        Level::WARN => "wrn",
        Level::INFO => "inf",
        Level::DEBUG => "dbg",
        _ => "trc",
    }
}

/// Build one log line, at most `max_len` bytes including the newline
pub fn format_line(
    timestamp: DateTime<Utc>,
    level: Level,
    target: &str,
    message: &str,
    max_len: usize,
) -> String {
    let mut line = format!(
        "{} <{}> {}: {}",
        timestamp.format("%Y-%m-%d %H:%M:%S:%3f"),
        severity(level),
        target,
        message
    );

    let mut end = line.len().min(max_len.saturating_sub(1));
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    line.truncate(end);
    line.push('\n');
    line
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        let _ = write!(self.fields, " {}={}", name, value);
    }

    fn finish(mut self) -> String {
        self.message.push_str(&self.fields);
        self.message
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push_field(field.name(), format_args!("{}", value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            self.push_field(field.name(), format_args!("{:?}", value));
        }
    }
}
