use crate::format::Format;
use compact_str::{CompactString, ToCompactString, format_compact};
use loki_push::LogRecord;
use std::fmt;
use tracing::{
    Event, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{layer::Context, registry::LookupSpan};

/// Turns a tracing [`Event`] into the message and fields of a [`LogRecord`].
pub trait RecordEvent<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    /// Write the message and fields of `Event` in `Context` to the given [`LogRecord`].
    ///
    /// The level and the timestamp are already set.
    fn record_event<T>(
        &self,
        event: &Event<'_>,
        ctx: &Context<'_, S>,
        format: &Format<T>,
        record: &mut LogRecord,
    );
}

/// The default [`RecordEvent`] implementation to record [`Event`]
///
/// The `message` field becomes the message, every other field is recorded under its name.
/// Metadata enabled in [`Format`] is recorded as `target`, `thread_name`, `thread_id`,
/// `file`, `line` and `span`.
#[derive(Debug)]
pub struct DefaultEvent {
    // reserve the ability to add fields to this without causing a breaking
    // change in the future.
    _private: (),
}

impl DefaultEvent {
    /// Create a new `DefaultEvent`.
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl Default for DefaultEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> RecordEvent<S> for DefaultEvent
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn record_event<T>(
        &self,
        event: &Event<'_>,
        ctx: &Context<'_, S>,
        format: &Format<T>,
        record: &mut LogRecord,
    ) {
        let metadata = event.metadata();
        let current_thread = std::thread::current();
        if format.display_thread_name {
            if let Some(name) = current_thread.name() {
                record.insert_field("thread_name", name);
            } else if !format.display_thread_id {
                record.insert_field("thread_name", format_compact!("{:?}", current_thread.id()));
            }
        }
        if format.display_thread_id {
            record.insert_field("thread_id", format_compact!("{:?}", current_thread.id()));
        }

        if format.display_target {
            record.insert_field("target", metadata.target());
        }

        if format.display_filename {
            if let Some(file) = metadata.file() {
                record.insert_field("file", file);
            }
        }

        if format.display_line_number {
            if let Some(line) = metadata.line() {
                record.insert_field("line", line.to_compact_string());
            }
        }

        if format.display_current_span {
            if let Some(span) = ctx.event_span(event) {
                record.insert_field("span", span.name());
            }
        }

        event.record(&mut FieldVisitor { record });
    }
}

struct FieldVisitor<'a> {
    record: &'a mut LogRecord,
}

impl FieldVisitor<'_> {
    fn insert(&mut self, field: &Field, value: CompactString) {
        match field.name() {
            "message" => self.record.set_message(value),
            name => self.record.insert_field(name, value),
        }
    }
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.into());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format_compact!("{value:?}"));
    }
}
