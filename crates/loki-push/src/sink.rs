use crate::format::FormatError;
use compact_str::CompactString;
use jiff::Timestamp;
use tracing::Level;

/// A structured log event, independent of the logging framework that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    timestamp: Timestamp,
    level: Level,
    message: CompactString,
    fields: Vec<(CompactString, CompactString)>,
}

/// Anything that can accept structured log records.
///
/// Implemented by [`Reporter`](crate::Reporter); logging framework adapters only depend on
/// this trait.
pub trait RecordSink: Send + Sync {
    /// Accept a record.
    ///
    /// An error means the record could not be rendered and was not queued. Delivery failures
    /// are never reported here.
    fn accept(&self, record: &LogRecord) -> Result<(), FormatError>;
}

impl LogRecord {
    /// Create a record stamped with the current time.
    pub fn new(level: Level, message: impl Into<CompactString>) -> Self {
        LogRecord {
            timestamp: Timestamp::now(),
            level,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Replace the timestamp.
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Add a field.
    pub fn with_field(
        mut self,
        key: impl Into<CompactString>,
        value: impl Into<CompactString>,
    ) -> Self {
        self.insert_field(key, value);
        self
    }

    /// Add a field, replacing the value of an existing field with the same key.
    pub fn insert_field(&mut self, key: impl Into<CompactString>, value: impl Into<CompactString>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Modify the timestamp.
    pub fn set_timestamp(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    /// Modify the message.
    pub fn set_message(&mut self, message: impl Into<CompactString>) {
        self.message = message.into();
    }

    /// Time of the event.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Severity of the event.
    pub fn level(&self) -> Level {
        self.level
    }

    /// The message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Additional fields, in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<T: RecordSink + ?Sized> RecordSink for &T {
    fn accept(&self, record: &LogRecord) -> Result<(), FormatError> {
        (**self).accept(record)
    }
}

impl<T: RecordSink + ?Sized> RecordSink for std::sync::Arc<T> {
    fn accept(&self, record: &LogRecord) -> Result<(), FormatError> {
        (**self).accept(record)
    }
}
