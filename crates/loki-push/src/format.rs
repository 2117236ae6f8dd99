//! Renders a [`LogRecord`] into the line that is shipped to Loki.
use crate::LogRecord;
use serde_json::{Map, Value};
use std::fmt::{self, Write};
use tracing::Level;

/// Error rendering a record into a line.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FormatError {
    /// Writing the line failed.
    #[error("unable to write log line")]
    Fmt(#[from] fmt::Error),
    /// The record could not be encoded as JSON.
    #[error("unable to encode log line: {0}")]
    Json(#[from] serde_json::Error),
}

/// Turns a record into a single log line.
pub trait FormatLine: Send + Sync + 'static {
    /// Append the rendered record to `buf`.
    fn format_line(&self, record: &LogRecord, buf: &mut String) -> Result<(), FormatError>;
}

/// Formats records as JSON objects with `level`, `msg` and `time` keys plus all fields.
///
/// Fields clashing with those keys are renamed to `fields.<key>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

/// Formats records as logfmt, e.g. `time=2024-01-01T00:00:00Z level=info msg="hello world"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogfmtFormat;

const RESERVED_KEYS: [&str; 3] = ["level", "msg", "time"];

impl FormatLine for JsonFormat {
    fn format_line(&self, record: &LogRecord, buf: &mut String) -> Result<(), FormatError> {
        let mut map = Map::new();
        for (key, value) in record.fields() {
            let key = if RESERVED_KEYS.contains(&key) {
                format!("fields.{key}")
            } else {
                key.to_owned()
            };
            map.insert(key, Value::from(value));
        }
        map.insert("level".into(), level_str(record).into());
        map.insert("msg".into(), record.message().into());
        map.insert("time".into(), record.timestamp().to_string().into());

        buf.push_str(&serde_json::to_string(&map)?);
        Ok(())
    }
}

impl FormatLine for LogfmtFormat {
    fn format_line(&self, record: &LogRecord, buf: &mut String) -> Result<(), FormatError> {
        write!(
            buf,
            "time={} level={} msg={}",
            record.timestamp(),
            level_str(record),
            Logfmt(record.message())
        )?;
        for (key, value) in record.fields() {
            write!(buf, " {key}={}", Logfmt(value))?;
        }
        Ok(())
    }
}

impl<F> FormatLine for F
where
    F: Fn(&LogRecord, &mut String) -> Result<(), FormatError> + Send + Sync + 'static,
{
    fn format_line(&self, record: &LogRecord, buf: &mut String) -> Result<(), FormatError> {
        self(record, buf)
    }
}

fn level_str(record: &LogRecord) -> &'static str {
    match record.level() {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warning",
        _ => "error",
    }
}

struct Logfmt<'a>(&'a str);

impl fmt::Display for Logfmt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let needs_quotes = self.0.is_empty()
            || self
                .0
                .chars()
                .any(|c| c.is_whitespace() || c == '=' || c == '"' || c.is_control());
        if needs_quotes {
            write!(f, "{:?}", self.0)
        } else {
            f.write_str(self.0)
        }
    }
}
