//! Ship log lines to [Grafana Loki](https://grafana.com/oss/loki/) without blocking on the
//! network.
//!
//! A [`Reporter`] renders a [`LogRecord`] into a line, attaches its labels and hands it to a
//! dedicated shipper thread, which posts one push request per record to
//! `<base url>/loki/api/v1/push`. Loki accepting a record means `204 No Content`, anything
//! else is logged through `tracing` and the record is dropped.
//!
//! ```no_run
//! use loki_push::{LogRecord, LokiClient, Reporter};
//! use tracing::Level;
//!
//! let client = LokiClient::builder()
//!     .endpoint("http://localhost:3100")
//!     .build()?;
//! let reporter = Reporter::builder(client, "my-app")
//!     .label("env", "dev")
//!     .spawn()?;
//!
//! reporter.fire(&LogRecord::new(Level::INFO, "hello").with_field("user", "42"))?;
//! reporter.stop();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `rustls` (default): use [`rustls`] for `https` endpoints.
//! - `native-tls`: use the platform TLS implementation instead.
//! - `test-util`: expose [`test_support`], a mock Loki server and a log capture writer.
//!
//! [`rustls`]: https://docs.rs/rustls
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod client;
pub mod config;
pub mod format;
pub mod global;
mod labels;
mod proto;
pub mod reporter;
mod sink;

#[cfg(any(test, feature = "test-util"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod test_support;

pub use client::{
    DEFAULT_TIMEOUT, LokiClient, LokiClientBuilder, LokiClientBuilderError, LokiClientError,
};
pub use config::Config;
pub use format::{FormatError, FormatLine, JsonFormat, LogfmtFormat};
pub use labels::LabelSet;
pub use proto::{Encoding, Entry, PushRequest, Record, Stream};
pub use reporter::{Reporter, ReporterBuilder, ReporterError};
pub use sink::{LogRecord, RecordSink};

#[cfg(test)]
#[cfg_attr(test, ctor::ctor)]
fn init() {
    // Initialize the tracing subscriber for tests
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .init();
}
