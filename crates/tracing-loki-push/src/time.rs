use jiff::Timestamp;
use loki_push::LogRecord;

/// A type that can measure and record the current time.
///
/// This trait is used by the [`Layer`](crate::Layer) to stamp each `Event` when it is
/// recorded.
///
/// Notable implementations are [`SystemTime`], which records the current wall-clock time, and
/// [`Timestamp`], which records a fixed instant. `RecordTime` is also implemented for any
/// function pointer with the appropriate signature.
pub trait RecordTime {
    /// Measure and record the current time on `record`.
    fn record_time(&self, record: &mut LogRecord);
}

/// Returns a new `SystemTime` timestamp provider.
///
/// This is equivalent to calling
/// ```rust
/// # fn timer() -> tracing_loki_push::time::SystemTime {
/// tracing_loki_push::time::SystemTime::default()
/// # }
/// ```
pub fn time() -> SystemTime {
    SystemTime
}

impl<F> RecordTime for &F
where
    F: RecordTime,
{
    fn record_time(&self, record: &mut LogRecord) {
        (*self).record_time(record)
    }
}

impl RecordTime for fn(&mut LogRecord) {
    fn record_time(&self, record: &mut LogRecord) {
        (*self)(record)
    }
}

/// Retrieve and record the current wall-clock time.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct SystemTime;

impl RecordTime for SystemTime {
    fn record_time(&self, record: &mut LogRecord) {
        record.set_timestamp(Timestamp::now());
    }
}

impl RecordTime for Timestamp {
    fn record_time(&self, record: &mut LogRecord) {
        record.set_timestamp(*self);
    }
}
