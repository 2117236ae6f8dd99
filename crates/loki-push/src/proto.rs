use crate::LabelSet;
use compact_str::{CompactString, ToCompactString};
use jiff::Timestamp;
use serde::Serialize;

/// A rendered log line waiting to be shipped, together with its labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    labels: LabelSet,
    timestamp: Timestamp,
    line: CompactString,
}

/// How streams are laid out in the push payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    /// `{"stream": {..labels}, "values": [["<unix nanos>", "<line>"]]}`
    #[default]
    Values,
    /// `{"labels": "{k=\"v\"}", "entries": [{"ts": "<RFC 3339>", "line": "<line>"}]}`
    Entries,
}

/// Request body of `POST /loki/api/v1/push`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushRequest {
    streams: Vec<Stream>,
}

/// Records sharing one label set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Stream {
    /// Labels as an object, timestamps as unix nanoseconds.
    Values {
        /// stream labels
        stream: LabelSet,
        /// `[timestamp, line]` pairs
        values: Vec<[CompactString; 2]>,
    },
    /// Labels as a selector string, already timestamped entries.
    Entries {
        /// stream selector
        labels: CompactString,
        /// log entries
        entries: Vec<Entry>,
    },
}

/// A single timestamped line of an [`Stream::Entries`] stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    ts: CompactString,
    line: CompactString,
}

impl Record {
    /// Create a new record.
    pub fn new(labels: LabelSet, timestamp: Timestamp, line: impl Into<CompactString>) -> Self {
        Record {
            labels,
            timestamp,
            line: line.into(),
        }
    }

    /// Labels of the record.
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Time the record was produced.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// The rendered log line.
    pub fn line(&self) -> &str {
        &self.line
    }
}

impl PushRequest {
    /// Create a push request from streams.
    pub fn new(streams: Vec<Stream>) -> Self {
        PushRequest { streams }
    }

    /// Wrap a single record into a push request.
    pub fn from_record(record: Record, encoding: Encoding) -> Self {
        let Record {
            labels,
            timestamp,
            line,
        } = record;
        PushRequest::new(vec![Stream::new(labels, [(timestamp, line)], encoding)])
    }

    /// Streams of the request.
    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    /// Encode the request as JSON.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

impl Stream {
    /// Group lines under one label set.
    pub fn new<I>(labels: LabelSet, lines: I, encoding: Encoding) -> Self
    where
        I: IntoIterator<Item = (Timestamp, CompactString)>,
    {
        let lines = lines.into_iter();
        match encoding {
            Encoding::Values => Stream::Values {
                stream: labels,
                values: lines
                    .map(|(ts, line)| [ts.as_nanosecond().to_compact_string(), line])
                    .collect(),
            },
            Encoding::Entries => Stream::Entries {
                labels: labels.to_selector(),
                entries: lines
                    .map(|(ts, line)| Entry {
                        ts: ts.to_compact_string(),
                        line,
                    })
                    .collect(),
            },
        }
    }

    /// Number of lines in the stream.
    pub fn len(&self) -> usize {
        match self {
            Stream::Values { values, .. } => values.len(),
            Stream::Entries { entries, .. } => entries.len(),
        }
    }

    /// Whether the stream carries no lines.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
