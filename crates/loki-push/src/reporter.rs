//! A reporter handing records to a dedicated shipper thread.
//!
//! Producers never touch the network: [`Reporter::report`] only hands the record over to the
//! shipper. By default the handoff is a rendezvous, so a producer waits until the shipper is
//! done with the previous record. Memory stays bounded at the cost of stalling the call site
//! while Loki is slow.
use crate::{
    Config, Encoding, LabelSet, LogRecord, LokiClient, LokiClientBuilder, PushRequest, Record,
    RecordSink,
    client::LokiClientBuilderError,
    format::{FormatError, FormatLine, JsonFormat},
};
use compact_str::CompactString;
use crossbeam_channel::{Receiver, Sender, select};
use jiff::Timestamp;
use parking_lot::{Mutex, RwLock};
use std::{
    sync::{Arc, atomic, atomic::AtomicBool},
    thread::{self, JoinHandle},
};
use tracing::{Dispatch, Level};

type Producer = Sender<Record>;
type Consumer = Receiver<Record>;

/// Name of the thread pushing records to Loki.
pub const SHIPPER_THREAD_NAME: &str = "loki-push-shipper";
const LINE_DEFAULT_CAPACITY: usize = 256;

/// Error starting a reporter.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ReporterError {
    /// The Loki client could not be built.
    #[error(transparent)]
    Client(#[from] LokiClientBuilderError),
    /// The shipper thread could not be spawned.
    #[error("unable to spawn shipper thread: {0}")]
    Spawn(#[from] std::io::Error),
}

type Result<T, E = ReporterError> = std::result::Result<T, E>;

/// Handle to a running shipper.
///
/// Clones share the same shipper. The shipper runs until [`Reporter::stop`] is called or every
/// handle is dropped.
#[derive(Clone)]
pub struct Reporter {
    inner: Arc<Inner>,
}

/// Configures and spawns a [`Reporter`].
pub struct ReporterBuilder {
    client: LokiClient,
    app: CompactString,
    labels: LabelSet,
    format: Box<dyn FormatLine>,
    encoding: Encoding,
    dispatch_capacity: usize,
}

struct Inner {
    state: Arc<State>,
    producer: Producer,
    client: LokiClient,
    labels: LabelSet,
    app: RwLock<CompactString>,
    format: Box<dyn FormatLine>,
    shutdown: Mutex<Option<Sender<()>>>,
    shipper: Mutex<Option<JoinHandle<()>>>,
}

struct Shipper {
    consumer: Consumer,
    shutdown: Receiver<()>,
    client: LokiClient,
    encoding: Encoding,
    state: Arc<State>,
}

struct State {
    is_closing: AtomicBool,
    is_finished: AtomicBool,
}

impl Reporter {
    /// Create a builder for a reporter tagging every record with `app`.
    pub fn builder(client: LokiClient, app: impl Into<CompactString>) -> ReporterBuilder {
        ReporterBuilder {
            client,
            app: app.into(),
            labels: LabelSet::new(),
            format: Box::new(JsonFormat),
            encoding: Encoding::default(),
            dispatch_capacity: 0,
        }
    }

    /// Start a reporter configured from the environment, see [`Config::from_env`].
    pub fn from_env(app: impl Into<CompactString>) -> Result<Self> {
        let config = Config::from_env();
        let client = LokiClientBuilder::from_config(&config).build()?;
        Reporter::builder(client, app).spawn()
    }

    /// Queue an already rendered line.
    ///
    /// Blocks until the shipper takes the record, never waits for the network. Once the
    /// reporter is stopped, records are dropped.
    pub fn report(&self, timestamp: Timestamp, line: impl Into<CompactString>) {
        let inner = &self.inner;
        if inner.state.is_closing() {
            if inner.client.diagnostics_enabled(Level::DEBUG) {
                tracing::debug!("reporter is stopped, record dropped");
            }
            return;
        }

        let mut labels = inner.labels.clone();
        labels.insert("app", inner.app.read().clone());

        if let Err(e) = inner.producer.send(Record::new(labels, timestamp, line)) {
            if inner.client.diagnostics_enabled(Level::DEBUG) {
                tracing::debug!("shipper is gone, record dropped: {e}");
            }
        }
    }

    /// Render a record with the configured formatter and queue it.
    ///
    /// Only rendering can fail, delivery problems never surface here.
    pub fn fire(&self, record: &LogRecord) -> Result<(), FormatError> {
        let mut line = String::with_capacity(LINE_DEFAULT_CAPACITY);
        self.inner.format.format_line(record, &mut line)?;
        self.report(record.timestamp(), line);
        Ok(())
    }

    /// Replace the `app` label of records reported from now on.
    pub fn set_app(&self, app: impl Into<CompactString>) {
        *self.inner.app.write() = app.into();
    }

    /// Current `app` label.
    pub fn app(&self) -> CompactString {
        self.inner.app.read().clone()
    }

    /// Labels added to every record, besides `app`.
    pub fn labels(&self) -> &LabelSet {
        &self.inner.labels
    }

    /// The client records are pushed with.
    pub fn client(&self) -> &LokiClient {
        &self.inner.client
    }

    /// Stop the shipper and wait for it to exit.
    ///
    /// A push in progress is completed first. Records not yet taken by the shipper are
    /// dropped. Calling this more than once, from any thread, is fine: every call returns
    /// after the shipper has exited.
    pub fn stop(&self) {
        let mut shipper = self.inner.shipper.lock();
        self.inner.state.set_closing();
        self.inner.shutdown.lock().take();

        if let Some(handle) = shipper.take() {
            if handle.join().is_err() && self.inner.client.diagnostics_enabled(Level::ERROR) {
                tracing::error!("shipper thread panicked");
            }
        }
    }

    /// Whether [`Reporter::stop`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.state.is_closing()
    }

    /// Whether the shipper thread has exited.
    pub fn is_finished(&self) -> bool {
        self.inner.state.is_finished()
    }
}

impl RecordSink for Reporter {
    fn accept(&self, record: &LogRecord) -> Result<(), FormatError> {
        self.fire(record)
    }
}

impl ReporterBuilder {
    /// Add a label to every record.
    pub fn label(mut self, key: impl Into<CompactString>, value: impl Into<CompactString>) -> Self {
        self.labels.insert(key, value);
        self
    }

    /// Add labels to every record.
    pub fn labels<K, V>(mut self, labels: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<CompactString>,
        V: Into<CompactString>,
    {
        self.labels.extend(labels);
        self
    }

    /// Set the formatter rendering records passed to [`Reporter::fire`].
    ///
    /// Default is [`JsonFormat`].
    pub fn format(mut self, format: impl FormatLine) -> Self {
        self.format = Box::new(format);
        self
    }

    /// Set the payload layout.
    ///
    /// Default is [`Encoding::Values`].
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Let up to `capacity` records wait for the shipper instead of blocking producers.
    ///
    /// Default is `0`: every report waits for the shipper. Records still waiting when the
    /// reporter is stopped are dropped.
    pub fn dispatch_capacity(mut self, capacity: usize) -> Self {
        self.dispatch_capacity = capacity;
        self
    }

    /// Spawn the shipper thread and return the reporter.
    ///
    /// The shipper logs through the `tracing` dispatcher that is current on the calling
    /// thread.
    pub fn spawn(self) -> Result<Reporter> {
        let ReporterBuilder {
            client,
            app,
            labels,
            format,
            encoding,
            dispatch_capacity,
        } = self;

        let (producer, consumer) = crossbeam_channel::bounded(dispatch_capacity);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(0);
        let state = Arc::new(State::default());

        let shipper = Shipper {
            consumer,
            shutdown: shutdown_rx,
            client: client.clone(),
            encoding,
            state: state.clone(),
        };
        let dispatch = tracing::dispatcher::get_default(Dispatch::clone);
        let handle = thread::Builder::new()
            .name(SHIPPER_THREAD_NAME.into())
            .spawn(move || tracing::dispatcher::with_default(&dispatch, || shipper.run()))?;

        Ok(Reporter {
            inner: Arc::new(Inner {
                state,
                producer,
                client,
                labels,
                app: RwLock::new(app),
                format,
                shutdown: Mutex::new(Some(shutdown_tx)),
                shipper: Mutex::new(Some(handle)),
            }),
        })
    }
}

impl Shipper {
    fn run(self) {
        if self.client.diagnostics_enabled(Level::DEBUG) {
            tracing::debug!(url = self.client.url(), "shipper started");
        }

        // stop is observed between records; producers still blocked in the handoff are
        // released when the consumer is dropped
        while !self.state.is_closing() {
            // the shutdown channel never carries a message, it only disconnects
            let record = select! {
                recv(self.shutdown) -> _ => None,
                recv(self.consumer) -> record => record.ok(),
            };
            let Some(record) = record else {
                break;
            };
            self.ship(record);
        }

        self.state.is_finished.store(true, atomic::Ordering::Release);
        if self.client.diagnostics_enabled(Level::DEBUG) {
            tracing::debug!("shipper stopped");
        }
    }

    fn ship(&self, record: Record) {
        self.client
            .push(&PushRequest::from_record(record, self.encoding));
    }
}

impl Default for State {
    fn default() -> Self {
        Self {
            is_closing: AtomicBool::new(false),
            is_finished: AtomicBool::new(false),
        }
    }
}

impl State {
    fn set_closing(&self) {
        self.is_closing.store(true, atomic::Ordering::Release);
    }

    fn is_closing(&self) -> bool {
        self.is_closing.load(atomic::Ordering::Acquire)
    }

    fn is_finished(&self) -> bool {
        self.is_finished.load(atomic::Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::LogfmtFormat;
    use crate::test_support::{CapturedLogs, MockLoki, unreachable_endpoint};
    use std::time::{Duration, Instant};

    const PROMPT: Duration = Duration::from_secs(5);

    fn reporter(endpoint: &str) -> ReporterBuilder {
        let client = LokiClient::builder().endpoint(endpoint).build().unwrap();
        Reporter::builder(client, "test").label("key", "key-test")
    }

    fn line_of(request: &crate::test_support::CapturedRequest) -> serde_json::Value {
        let body = request.json();
        let line = body["streams"][0]["values"][0][1].as_str().unwrap().to_owned();
        serde_json::from_str(&line).unwrap()
    }

    #[test]
    fn ships_every_record_in_order() {
        let loki = MockLoki::start(204, "");
        let reporter = reporter(&loki.base_url()).spawn().unwrap();

        let messages: Vec<_> = (0..5).map(|i| format!("これはテストです-{i}")).collect();
        for message in &messages {
            reporter.fire(&LogRecord::new(Level::INFO, message.as_str())).unwrap();
        }
        reporter.stop();

        let requests = loki.requests();
        assert_eq!(requests.len(), 5);
        for (request, message) in requests.iter().zip(&messages) {
            let body = request.json();
            let stream = &body["streams"][0]["stream"];
            assert_eq!(stream["app"], "test");
            assert_eq!(stream["key"], "key-test");
            assert!(request.body.contains(r#""app":"test""#));
            assert!(request.body.contains(r#""key":"key-test""#));
            assert_eq!(line_of(request)["msg"], message.as_str());
            assert_eq!(line_of(request)["level"], "info");
        }
    }

    #[test]
    fn timestamp_is_unix_nanos() {
        let loki = MockLoki::start(204, "");
        let reporter = reporter(&loki.base_url()).spawn().unwrap();
        let ts = Timestamp::new(1_700_000_000, 5).unwrap();
        reporter.report(ts, "raw line");
        reporter.stop();

        let body = loki.requests()[0].json();
        assert_eq!(body["streams"][0]["values"][0][0], "1700000000000000005");
        assert_eq!(body["streams"][0]["values"][0][1], "raw line");
    }

    #[test]
    fn rejected_records_are_logged_and_dropped() {
        let logs = CapturedLogs::default();
        let loki = MockLoki::start(500, "boom");

        let elapsed = tracing::subscriber::with_default(logs.subscriber(), || {
            let reporter = reporter(&loki.base_url()).spawn().unwrap();
            assert!(reporter.fire(&LogRecord::new(Level::ERROR, "fails")).is_ok());
            let start = Instant::now();
            reporter.stop();
            start.elapsed()
        });

        assert!(elapsed < PROMPT);
        assert_eq!(loki.requests().len(), 1);
        let output = logs.contents();
        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("500"), "{output}");
        assert!(output.contains("boom"), "{output}");
    }

    #[test]
    fn unreachable_endpoint_does_not_fail_producer() {
        let reporter = reporter(&unreachable_endpoint()).spawn().unwrap();
        assert!(reporter.fire(&LogRecord::new(Level::INFO, "lost")).is_ok());

        let start = Instant::now();
        reporter.stop();
        assert!(start.elapsed() < PROMPT);
        assert!(reporter.is_finished());
    }

    #[test]
    fn stop_is_idempotent() {
        let loki = MockLoki::start(204, "");
        let reporter = reporter(&loki.base_url()).spawn().unwrap();
        reporter.report(Timestamp::now(), "one");

        reporter.stop();
        assert!(reporter.is_closed());
        assert!(reporter.is_finished());
        reporter.stop();
        assert!(reporter.is_finished());
    }

    #[test]
    fn concurrent_stop_waits_for_shipper() {
        let loki = MockLoki::start_with_delay(204, "", Duration::from_millis(200));
        let reporter = reporter(&loki.base_url()).spawn().unwrap();
        reporter.report(Timestamp::now(), "slow");

        let stoppers: Vec<_> = (0..4)
            .map(|_| {
                let reporter = reporter.clone();
                thread::spawn(move || {
                    reporter.stop();
                    reporter.is_finished()
                })
            })
            .collect();
        for stopper in stoppers {
            assert!(stopper.join().unwrap());
        }
        assert_eq!(loki.requests().len(), 1);
    }

    #[test]
    fn nothing_is_sent_after_stop() {
        let loki = MockLoki::start(204, "");
        let reporter = reporter(&loki.base_url()).spawn().unwrap();
        for i in 0..2 {
            reporter.report(Timestamp::now(), format!("before-{i}"));
        }
        reporter.stop();

        for i in 0..3 {
            assert!(reporter.fire(&LogRecord::new(Level::INFO, format!("after-{i}"))).is_ok());
        }
        thread::sleep(Duration::from_millis(100));
        assert_eq!(loki.requests().len(), 2);
    }

    #[test]
    fn stop_releases_blocked_producer() {
        let loki = MockLoki::start_with_delay(204, "", Duration::from_millis(500));
        let reporter = reporter(&loki.base_url()).spawn().unwrap();
        reporter.report(Timestamp::now(), "a");

        let blocked = {
            let reporter = reporter.clone();
            thread::spawn(move || reporter.report(Timestamp::now(), "b"))
        };
        thread::sleep(Duration::from_millis(100));

        let start = Instant::now();
        reporter.stop();
        blocked.join().unwrap();
        assert!(start.elapsed() < PROMPT);

        let requests = loki.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].json()["streams"][0]["values"][0][1], "a");
    }

    #[test]
    fn set_app_applies_to_later_records() {
        let loki = MockLoki::start(204, "");
        let reporter = reporter(&loki.base_url()).spawn().unwrap();
        reporter.report(Timestamp::now(), "first");
        reporter.set_app("renamed");
        assert_eq!(reporter.app(), "renamed");
        reporter.report(Timestamp::now(), "second");
        reporter.stop();

        let requests = loki.requests();
        assert_eq!(requests[0].json()["streams"][0]["stream"]["app"], "test");
        assert_eq!(requests[1].json()["streams"][0]["stream"]["app"], "renamed");
        assert_eq!(reporter.labels().get("app"), None);
    }

    #[test]
    fn producers_keep_their_own_order() {
        let loki = MockLoki::start(204, "");
        let reporter = reporter(&loki.base_url()).spawn().unwrap();

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let reporter = reporter.clone();
                thread::spawn(move || {
                    for i in 0..10 {
                        reporter.report(Timestamp::now(), format!("{p}:{i}"));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        reporter.stop();

        let lines: Vec<String> = loki
            .requests()
            .iter()
            .map(|r| r.json()["streams"][0]["values"][0][1].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(lines.len(), 40);
        for p in 0..4 {
            let own: Vec<_> = lines
                .iter()
                .filter(|l| l.starts_with(&format!("{p}:")))
                .cloned()
                .collect();
            let expected: Vec<_> = (0..10).map(|i| format!("{p}:{i}")).collect();
            assert_eq!(own, expected);
        }
    }

    #[test]
    fn entries_encoding_with_logfmt() {
        let loki = MockLoki::start(204, "");
        let reporter = reporter(&loki.base_url())
            .format(LogfmtFormat)
            .encoding(Encoding::Entries)
            .spawn()
            .unwrap();
        let record = LogRecord::new(Level::DEBUG, "hello world")
            .with_timestamp(Timestamp::from_second(1_700_000_000).unwrap());
        reporter.fire(&record).unwrap();
        reporter.stop();

        let body = loki.requests()[0].json();
        let stream = &body["streams"][0];
        assert_eq!(stream["labels"], r#"{app="test", key="key-test"}"#);
        assert_eq!(stream["entries"][0]["ts"], "2023-11-14T22:13:20Z");
        assert_eq!(
            stream["entries"][0]["line"],
            r#"time=2023-11-14T22:13:20Z level=debug msg="hello world""#
        );
    }

    #[test]
    fn buffered_dispatch_does_not_wait_for_shipper() {
        let loki = MockLoki::start_with_delay(204, "", Duration::from_millis(300));
        let reporter = reporter(&loki.base_url())
            .dispatch_capacity(8)
            .spawn()
            .unwrap();

        let start = Instant::now();
        for i in 0..3 {
            reporter.report(Timestamp::now(), format!("buffered-{i}"));
        }
        assert!(start.elapsed() < Duration::from_millis(250));

        reporter.stop();
        let sent = loki.requests().len();
        assert!((1..=3).contains(&sent), "sent {sent}");
    }

    #[test]
    fn format_errors_reach_the_caller() {
        let loki = MockLoki::start(204, "");
        let reporter = reporter(&loki.base_url())
            .format(|_: &LogRecord, _: &mut String| -> Result<(), FormatError> {
                Err(std::fmt::Error.into())
            })
            .spawn()
            .unwrap();
        assert!(matches!(
            reporter.fire(&LogRecord::new(Level::INFO, "x")),
            Err(FormatError::Fmt(_))
        ));
        reporter.stop();
        assert!(loki.requests().is_empty());
    }

    #[test]
    fn dropping_every_handle_stops_shipper() {
        let loki = MockLoki::start(204, "");
        let reporter = reporter(&loki.base_url()).spawn().unwrap();
        let state = reporter.inner.state.clone();
        drop(reporter);

        let deadline = Instant::now() + PROMPT;
        while !state.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(state.is_finished());
    }
}
