//! Loki push API client

pub use self::builder::{DEFAULT_TIMEOUT, LokiClientBuilder, LokiClientBuilderError};
use crate::PushRequest;
use std::sync::Arc;
use tracing::{Level, level_filters::LevelFilter};

mod builder;
pub(crate) mod headers;
mod imp;

/// A blocking client for the Loki push API.
///
/// Cloning is cheap, all clones share one connection pool.
#[derive(Clone)]
pub struct LokiClient {
    inner: Arc<LokiClientInner>,
}

struct LokiClientInner {
    http: imp::HttpClient,
    url: String,
    enable_trace: bool,
    print_internal_error: bool,
    diagnostic_level: LevelFilter,
}

/// Error type for Loki client operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LokiClientError {
    /// Loki answered with something other than `204 No Content`.
    #[error("http error [{status}] {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Body of the response.
        message: Box<str>,
    },
    /// The request could not be completed.
    #[error("other http client error: {0}")]
    Imp(#[from] imp::Error),
    /// The request body could not be encoded.
    #[error("unable to encode push request: {0}")]
    Encode(#[from] serde_json::Error),
}

impl LokiClient {
    /// Create a new Loki client builder.
    pub fn builder<'a>() -> LokiClientBuilder<'a> {
        LokiClientBuilder::default()
    }

    /// Full URL requests are posted to.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Minimum level of the client's own diagnostics.
    pub fn diagnostic_level(&self) -> LevelFilter {
        self.inner.diagnostic_level
    }

    /// Whether the client's diagnostics at `level` are emitted.
    pub(crate) fn diagnostics_enabled(&self, level: Level) -> bool {
        self.inner.enable_trace && self.inner.diagnostic_level >= level
    }

    /// Push streams to Loki.
    ///
    /// Failures are reported through the client's diagnostics and otherwise ignored.
    pub fn push(&self, request: &PushRequest) {
        self.try_push(request).ok();
    }

    /// Try to push streams to Loki.
    pub fn try_push(&self, request: &PushRequest) -> Result<(), LokiClientError> {
        let span = tracing::span!(Level::TRACE, "push", target = %self.inner.url);
        let _entered = self.inner.enable_trace.then(|| span.enter());

        match self.push_inner(request) {
            Err(e) => {
                self.report_error(&e);
                Err(e)
            }
            Ok(()) => Ok(()),
        }
    }

    fn push_inner(&self, request: &PushRequest) -> Result<(), LokiClientError> {
        let body = request.encode()?;
        let res = self.inner.http.post(&self.inner.url).body(body).send()?;

        let status = res.status();
        if status.is_no_content() {
            res.discard()?;
            if self.diagnostics_enabled(Level::TRACE) {
                tracing::trace!(%status, "pushed");
            }
            return Ok(());
        }

        let message = res.text()?;
        Err(LokiClientError::Http {
            status: status.as_u16(),
            message: message.into_boxed_str(),
        })
    }

    fn report_error(&self, e: &LokiClientError) {
        if self.inner.enable_trace {
            match e {
                LokiClientError::Http { status, message } => {
                    if self.inner.diagnostic_level >= Level::WARN {
                        tracing::warn!(status, "{message}");
                    }
                }
                e => {
                    if self.inner.diagnostic_level >= Level::ERROR {
                        tracing::error!(err = %e);
                    }
                }
            }
        } else if self.inner.print_internal_error {
            eprintln!("[loki-push] error pushing log: {e}");
        }
    }
}
