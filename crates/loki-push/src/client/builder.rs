use crate::client::{LokiClient, LokiClientInner, headers, imp};
use crate::config::{self, Config};
use std::{sync::Arc, time::Duration};
use tracing::level_filters::LevelFilter;
use url::Url;

/// Builder error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LokiClientBuilderError {
    /// The endpoint is not a valid URL.
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The endpoint URL cannot carry a path, e.g. `mailto:` or `data:` URLs.
    #[error("endpoint url cannot be a base: {0}")]
    CannotBeABase(Url),
    /// The underlying HTTP client could not be created.
    #[error("unable to create http client: {0}")]
    Http(#[from] imp::Error),
}

/// Builder for creating a Loki client.
pub struct LokiClientBuilder<'a> {
    endpoint: Option<&'a str>,
    timeout: Duration,
    enable_trace: bool,
    print_internal_error: bool,
    diagnostic_level: LevelFilter,
}

type Result<T, E = LokiClientBuilderError> = std::result::Result<T, E>;

/// Request timeout used unless [`LokiClientBuilder::timeout`] is called.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

impl Default for LokiClientBuilder<'_> {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: DEFAULT_TIMEOUT,
            enable_trace: true,
            print_internal_error: false,
            diagnostic_level: config::DEFAULT_BASE_LEVEL,
        }
    }
}

impl<'a> LokiClientBuilder<'a> {
    /// Create a builder from environment derived settings.
    pub fn from_config(config: &'a Config) -> Self {
        Self::default()
            .endpoint(&config.url)
            .diagnostic_level(config.base_level)
    }

    /// Set the base URL of the Loki server, e.g. `http://localhost:3100`.
    ///
    /// The push path `/loki/api/v1/push` is appended to whatever path the URL already has.
    /// Defaults to [`DEFAULT_URL`](crate::config::DEFAULT_URL).
    pub fn endpoint(mut self, endpoint: &'a str) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Set the timeout of a single push request.
    ///
    /// Defaults to 10 seconds. The shipper is blocked for at most this long per record.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable tracing for the Loki client.
    ///
    /// Enabled by default.
    /// If enabled, client will log via [`tracing`](https://docs.rs/tracing/latest/tracing/) crate.
    pub fn enable_trace(mut self, enable_trace: bool) -> Self {
        self.enable_trace = enable_trace;
        self
    }

    /// Enable or disable printing internal errors to stderr.
    ///
    /// Disabled by default.
    /// If enabled and tracing is not enabled, client will print errors to stderr.
    pub fn print_internal_error(mut self, print_internal_error: bool) -> Self {
        self.print_internal_error = print_internal_error;
        self
    }

    /// Set the minimum level of the client's own diagnostics.
    ///
    /// Defaults to `INFO`.
    pub fn diagnostic_level(mut self, level: impl Into<LevelFilter>) -> Self {
        self.diagnostic_level = level.into();
        self
    }

    /// Build the Loki client with the provided configuration.
    pub fn build(self) -> Result<LokiClient> {
        let mut url = Url::parse(self.endpoint.unwrap_or(config::DEFAULT_URL))?;
        if url.cannot_be_a_base() {
            return Err(LokiClientBuilderError::CannotBeABase(url));
        }
        let path = format!("{}{}", url.path().trim_end_matches('/'), headers::PUSH_PATH);
        url.set_path(&path);

        let client = LokiClientInner {
            http: imp::HttpClient::new(self.timeout)?,
            url: url.into(),
            enable_trace: self.enable_trace,
            print_internal_error: self.print_internal_error,
            diagnostic_level: self.diagnostic_level,
        };

        Ok(LokiClient {
            inner: Arc::new(client),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_url(endpoint: &str) -> String {
        LokiClientBuilder::default()
            .endpoint(endpoint)
            .build()
            .unwrap()
            .url()
            .to_string()
    }

    #[test]
    fn appends_push_path() {
        assert_eq!(push_url("http://localhost:3100"), "http://localhost:3100/loki/api/v1/push");
        assert_eq!(
            push_url("http://localhost:3100/"),
            "http://localhost:3100/loki/api/v1/push"
        );
        assert_eq!(
            push_url("https://logs.example.com/tenant-a/"),
            "https://logs.example.com/tenant-a/loki/api/v1/push"
        );
    }

    #[test]
    fn keeps_query() {
        assert_eq!(
            push_url("http://localhost:3100?org=1"),
            "http://localhost:3100/loki/api/v1/push?org=1"
        );
    }

    #[test]
    fn default_endpoint() {
        let client = LokiClientBuilder::default().build().unwrap();
        assert_eq!(client.url(), "http://localhost:3100/loki/api/v1/push");
        assert_eq!(client.diagnostic_level(), LevelFilter::INFO);
    }

    #[test]
    fn from_config() {
        let config = Config {
            url: "http://loki:3100".into(),
            base_level: LevelFilter::ERROR,
        };
        let client = LokiClientBuilder::from_config(&config).build().unwrap();
        assert_eq!(client.url(), "http://loki:3100/loki/api/v1/push");
        assert_eq!(client.diagnostic_level(), LevelFilter::ERROR);
    }

    #[test]
    fn rejects_invalid_urls() {
        assert!(matches!(
            LokiClientBuilder::default().endpoint("not a url").build(),
            Err(LokiClientBuilderError::InvalidUrl(_))
        ));
        assert!(matches!(
            LokiClientBuilder::default().endpoint("mailto:ops@example.com").build(),
            Err(LokiClientBuilderError::CannotBeABase(_))
        ));
    }
}
