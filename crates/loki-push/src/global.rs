//! A process wide reporter and logging shorthands built on it.
//!
//! The reporter is started on first use from [`Config::from_env`](crate::Config::from_env) and
//! tagged with the executable name, unless [`set_global`] installed one before.
use crate::{LogRecord, Reporter, ReporterError};
use async_lock::OnceCell;
use compact_str::CompactString;
use tracing::Level;

static GLOBAL: OnceCell<Reporter> = OnceCell::new();

/// Install `reporter` as the process wide reporter.
///
/// Returns the reporter back if one is already installed.
pub fn set_global(reporter: Reporter) -> Result<(), Reporter> {
    GLOBAL.set_blocking(reporter).map(|_| ())
}

/// The process wide reporter, started from the environment on first use.
pub fn global() -> Result<&'static Reporter, ReporterError> {
    GLOBAL.get_or_try_init_blocking(|| Reporter::from_env(default_app()))
}

/// The process wide reporter, if it was started already.
pub fn try_global() -> Option<&'static Reporter> {
    GLOBAL.get()
}

/// Send a message through the process wide reporter.
///
/// Failures are printed to stderr, logging never fails the caller.
pub fn log(level: Level, message: impl Into<CompactString>) {
    let reporter = match global() {
        Ok(reporter) => reporter,
        Err(e) => {
            eprintln!("[loki-push] unable to start reporter: {e}");
            return;
        }
    };
    if let Err(e) = reporter.fire(&LogRecord::new(level, message)) {
        eprintln!("[loki-push] unable to render log line: {e}");
    }
}

/// Log at `TRACE` level.
pub fn trace(message: impl Into<CompactString>) {
    log(Level::TRACE, message)
}

/// Log at `DEBUG` level.
pub fn debug(message: impl Into<CompactString>) {
    log(Level::DEBUG, message)
}

/// Log at `INFO` level.
pub fn info(message: impl Into<CompactString>) {
    log(Level::INFO, message)
}

/// Log at `WARN` level.
pub fn warn(message: impl Into<CompactString>) {
    log(Level::WARN, message)
}

/// Log at `ERROR` level.
pub fn error(message: impl Into<CompactString>) {
    log(Level::ERROR, message)
}

fn default_app() -> CompactString {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.file_stem().map(|stem| stem.to_string_lossy().into()))
        .unwrap_or_else(|| CompactString::const_new("unknown"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LokiClient;
    use crate::test_support::MockLoki;
    use std::time::Duration;

    #[test]
    fn shorthands_use_installed_reporter() {
        let loki = MockLoki::start(204, "");
        let client = LokiClient::builder()
            .endpoint(&loki.base_url())
            .build()
            .unwrap();
        let reporter = Reporter::builder(client, "global-test").spawn().unwrap();
        assert!(set_global(reporter.clone()).is_ok());
        assert!(set_global(reporter).is_err());

        warn("from the shorthand");

        let requests = loki.wait_for(1, Duration::from_secs(5));
        assert_eq!(requests.len(), 1);
        let body = requests[0].json();
        assert_eq!(body["streams"][0]["stream"]["app"], "global-test");
        let line: serde_json::Value =
            serde_json::from_str(body["streams"][0]["values"][0][1].as_str().unwrap()).unwrap();
        assert_eq!(line["level"], "warning");
        assert_eq!(line["msg"], "from the shorthand");

        assert!(try_global().is_some());
        try_global().unwrap().stop();
    }

    #[test]
    fn default_app_is_not_empty() {
        assert!(!default_app().is_empty());
    }
}
