//! Tracing setup and an in-process log capture for the web UI.
//!
//! [`init_tracing`] installs a registry with an `EnvFilter`, a stderr `fmt`
//! layer and an [`ActivityLayer`]. The layer copies every event into an
//! [`ActivityLog`], a capped ring of [`LogLine`]s that the web server serves
//! at `/api/logs`. The ring has its own mutex, so logging never contends
//! with session locks.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Subscriber;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// Lines kept by a default [`ActivityLog`].
pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// Log severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

/// One captured log event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogLine {
    pub time: DateTime<Utc>,
    pub level: LogLevel,
    pub target: String,
    pub message: String,
}

/// Shared, capped buffer of recent log lines. Cloning shares the buffer.
#[derive(Clone)]
pub struct ActivityLog {
    lines: Arc<Mutex<VecDeque<LogLine>>>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl ActivityLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
        }
    }

    /// Append a line, evicting the oldest once full.
    pub fn push(&self, line: LogLine) {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// The most recent `limit` lines, oldest first, at or above `min_level`.
    pub fn recent(&self, limit: usize, min_level: LogLevel) -> Vec<LogLine> {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<LogLine> = lines
            .iter()
            .rev()
            .filter(|l| l.level >= min_level)
            .take(limit)
            .cloned()
            .collect();
        out.reverse();
        out
    }

    pub fn len(&self) -> usize {
        self.lines.lock().map_or(0, |l| l.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A layer that feeds this log.
    pub fn layer(&self) -> ActivityLayer {
        ActivityLayer { log: self.clone() }
    }
}

/// [`tracing_subscriber::Layer`] that records events into an [`ActivityLog`].
pub struct ActivityLayer {
    log: ActivityLog,
}

impl<S: Subscriber + for<'a> LookupSpan<'a>> Layer<S> for ActivityLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let mut message = visitor.message;
        if !visitor.fields.is_empty() {
            let extras: Vec<String> = visitor
                .fields
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            if message.is_empty() {
                message = extras.join(" ");
            } else {
                message = format!("{message} {{{}}}", extras.join(", "));
            }
        }

        let metadata = event.metadata();
        self.log.push(LogLine {
            time: Utc::now(),
            level: (*metadata.level()).into(),
            target: metadata.target().to_string(),
            message,
        });
    }
}

/// Collects the message and the remaining fields of an event.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let raw = format!("{value:?}");
        if field.name() == "message" {
            self.message = raw;
        } else {
            self.fields.push((field.name().to_string(), raw));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }
}

/// Install the global subscriber and return the log it feeds.
///
/// `RUST_LOG` overrides `default_filter`. Calling this twice keeps the first
/// subscriber; the returned log then stays empty.
pub fn init_tracing(default_filter: &str) -> ActivityLog {
    let log = ActivityLog::default();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(log.layer())
        .try_init();
    log
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::subscriber::with_default;

    fn line(level: LogLevel, message: &str) -> LogLine {
        LogLine {
            time: Utc::now(),
            level,
            target: "test".into(),
            message: message.into(),
        }
    }

    #[test]
    fn ring_evicts_oldest() {
        let log = ActivityLog::with_capacity(2);
        log.push(line(LogLevel::Info, "a"));
        log.push(line(LogLevel::Info, "b"));
        log.push(line(LogLevel::Info, "c"));
        let messages: Vec<String> = log
            .recent(10, LogLevel::Trace)
            .into_iter()
            .map(|l| l.message)
            .collect();
        assert_eq!(messages, vec!["b", "c"]);
    }

    #[test]
    fn recent_filters_by_level_and_limit() {
        let log = ActivityLog::default();
        log.push(line(LogLevel::Debug, "noise"));
        log.push(line(LogLevel::Warn, "first warning"));
        log.push(line(LogLevel::Info, "info"));
        log.push(line(LogLevel::Error, "failure"));

        let warnings = log.recent(10, LogLevel::Warn);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].message, "first warning");

        let last = log.recent(1, LogLevel::Trace);
        assert_eq!(last[0].message, "failure");
    }

    #[test]
    fn layer_captures_message_and_fields() {
        let log = ActivityLog::default();
        let subscriber = tracing_subscriber::registry().with(log.layer());
        with_default(subscriber, || {
            tracing::warn!(reason = "too_long", count = 3, "Answer rejected by guard");
            tracing::info!("plain");
        });

        let lines = log.recent(10, LogLevel::Trace);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].level, LogLevel::Warn);
        assert_eq!(
            lines[0].message,
            "Answer rejected by guard {reason=too_long, count=3}"
        );
        assert_eq!(lines[1].message, "plain");
    }
}
