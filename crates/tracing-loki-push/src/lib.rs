//! A tracing layer that ships events to Grafana Loki.
//!
//! ```no_run
//! use tracing_loki_push::{LokiClient, Reporter};
//! use tracing_subscriber::layer::SubscriberExt;
//!
//! let client = LokiClient::builder().endpoint("http://localhost:3100").build()?;
//! let reporter = Reporter::builder(client, "my-app").spawn()?;
//! let subscriber = tracing_subscriber::registry().with(tracing_loki_push::layer(reporter.clone()));
//! tracing::subscriber::set_global_default(subscriber)?;
//!
//! tracing::info!(user = "alice", "logged in");
//! reporter.stop();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Recorders turning tracing [`Event`](tracing::Event)s into [`loki_push::LogRecord`]s.
pub mod event;
/// Options for the metadata recorded with each event.
pub mod format;
/// Tracing layer that ships events to Loki.
pub mod layer;
/// Time utilities for recording timestamps.
pub mod time;

pub use layer::{Layer, layer};
pub use loki_push::{self, LokiClient, Reporter};
