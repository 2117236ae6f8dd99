use crate::{
    event,
    event::RecordEvent,
    format,
    time::{RecordTime, SystemTime},
};
use loki_push::{LogRecord, RecordSink, Reporter, reporter::SHIPPER_THREAD_NAME};
use std::marker::PhantomData;
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    layer::{self, Context},
    registry::LookupSpan,
};

/// Targets whose events are never shipped, they come from the shipping path itself.
const INTERNAL_TARGETS: &[&str] = &[
    "loki_push",
    "tracing_loki_push",
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
];

/// A [`Layer`] that ships events to Loki through a [`RecordSink`], usually a [`Reporter`].
///
/// Events emitted by the shipper thread or by the HTTP stack are skipped, shipping them would
/// feed the shipper with its own diagnostics.
///
/// [`Layer`]: tracing_subscriber::layer::Layer
pub struct Layer<S, K = Reporter, FT = SystemTime, E = event::DefaultEvent> {
    sink: K,
    format: format::Format<FT>,
    record_event: E,
    log_internal_errors: bool,
    _inner: PhantomData<fn(S)>,
}

impl<S, K> Layer<S, K>
where
    K: RecordSink,
{
    /// Returns a new [`Layer`] with the default configuration.
    pub fn new(sink: K) -> Self {
        Self {
            sink,
            format: format::Format::default(),
            record_event: event::DefaultEvent::default(),
            log_internal_errors: true,
            _inner: PhantomData,
        }
    }
}

impl<S, K, FT, E> Layer<S, K, FT, E> {
    /// Sets the event recorder for the layer.
    pub fn record_event<E2>(self, record_event: E2) -> Layer<S, K, FT, E2>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
        E2: RecordEvent<S> + 'static,
    {
        Layer {
            sink: self.sink,
            format: self.format,
            record_event,
            log_internal_errors: self.log_internal_errors,
            _inner: PhantomData,
        }
    }

    /// Stamp records with `timer`, see [`time`](crate::time).
    pub fn with_timer<FT2>(self, timer: FT2) -> Layer<S, K, FT2, E> {
        Layer {
            sink: self.sink,
            format: self.format.with_timer(timer),
            record_event: self.record_event,
            log_internal_errors: self.log_internal_errors,
            _inner: self._inner,
        }
    }

    /// Record the event target as `target`. On by default.
    pub fn with_target(self, display_target: bool) -> Layer<S, K, FT, E> {
        Layer {
            format: self.format.with_target(display_target),
            ..self
        }
    }

    /// Record the source file as `file`.
    pub fn with_file(self, display_filename: bool) -> Layer<S, K, FT, E> {
        Layer {
            format: self.format.with_file(display_filename),
            ..self
        }
    }

    /// Record the source line as `line`.
    pub fn with_line_number(self, display_line_number: bool) -> Layer<S, K, FT, E> {
        Layer {
            format: self.format.with_line_number(display_line_number),
            ..self
        }
    }

    /// Record the thread id as `thread_id`.
    pub fn with_thread_ids(self, display_thread_ids: bool) -> Layer<S, K, FT, E> {
        Layer {
            format: self.format.with_thread_ids(display_thread_ids),
            ..self
        }
    }

    /// Record the thread name as `thread_name`.
    pub fn with_thread_names(self, display_thread_names: bool) -> Layer<S, K, FT, E> {
        Layer {
            format: self.format.with_thread_names(display_thread_names),
            ..self
        }
    }

    /// Record the name of the span the event happened in as `span`.
    pub fn with_current_span(self, display_current_span: bool) -> Layer<S, K, FT, E> {
        Layer {
            format: self.format.with_current_span(display_current_span),
            ..self
        }
    }

    /// Sets whether events that cannot be rendered are reported on stderr.
    ///
    /// Enabled by default.
    pub fn log_internal_errors(self, log_internal_errors: bool) -> Layer<S, K, FT, E> {
        Layer {
            log_internal_errors,
            ..self
        }
    }
}

impl<S, K, FT, E> layer::Layer<S> for Layer<S, K, FT, E>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    K: RecordSink + 'static,
    FT: RecordTime + 'static,
    E: RecordEvent<S> + 'static,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        if is_internal(event.metadata().target()) || on_shipper_thread() {
            return;
        }

        let mut record = LogRecord::new(*event.metadata().level(), "");
        self.format.timer.record_time(&mut record);
        self.record_event
            .record_event(event, &ctx, &self.format, &mut record);

        if let Err(e) = self.sink.accept(&record) {
            if self.log_internal_errors {
                eprintln!("[tracing-loki-push] unable to render event: {e}");
            }
        }
    }
}

fn is_internal(target: &str) -> bool {
    INTERNAL_TARGETS.iter().any(|internal| {
        target
            .strip_prefix(internal)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

fn on_shipper_thread() -> bool {
    std::thread::current().name() == Some(SHIPPER_THREAD_NAME)
}

/// Returns a new [loki layer] that can be [composed] with other layers to
/// construct a [`Subscriber`].
///
/// This is a shorthand for the equivalent [`Layer::new`] function.
///
/// [loki layer]: Layer
/// [composed]: tracing_subscriber::layer
pub fn layer<S>(reporter: Reporter) -> Layer<S> {
    Layer::new(reporter)
}
