use crate::time::SystemTime;

/// Event metadata copied into record fields, and the timer stamping the record.
///
/// Only `target` is recorded by default. Configured through the [`Layer`](crate::Layer)
/// builder methods.
pub struct Format<T = SystemTime> {
    pub(crate) timer: T,
    pub(crate) display_target: bool,
    pub(crate) display_thread_id: bool,
    pub(crate) display_thread_name: bool,
    pub(crate) display_filename: bool,
    pub(crate) display_line_number: bool,
    pub(crate) display_current_span: bool,
}

impl Default for Format<SystemTime> {
    fn default() -> Self {
        Format {
            timer: SystemTime,
            display_target: true,
            display_thread_id: false,
            display_thread_name: false,
            display_filename: false,
            display_line_number: false,
            display_current_span: false,
        }
    }
}

impl<T> Format<T> {
    /// Stamp records with `timer` instead.
    pub fn with_timer<T2>(self, timer: T2) -> Format<T2> {
        Format {
            timer,
            display_target: self.display_target,
            display_thread_id: self.display_thread_id,
            display_thread_name: self.display_thread_name,
            display_filename: self.display_filename,
            display_line_number: self.display_line_number,
            display_current_span: self.display_current_span,
        }
    }

    /// Record the event target as `target`.
    pub fn with_target(self, display_target: bool) -> Format<T> {
        Format {
            display_target,
            ..self
        }
    }

    /// Record the thread id as `thread_id`.
    pub fn with_thread_ids(self, display_thread_id: bool) -> Format<T> {
        Format {
            display_thread_id,
            ..self
        }
    }

    /// Record the thread name as `thread_name`.
    pub fn with_thread_names(self, display_thread_name: bool) -> Format<T> {
        Format {
            display_thread_name,
            ..self
        }
    }

    /// Record the source file as `file`.
    pub fn with_file(self, display_filename: bool) -> Format<T> {
        Format {
            display_filename,
            ..self
        }
    }

    /// Record the source line as `line`.
    pub fn with_line_number(self, display_line_number: bool) -> Format<T> {
        Format {
            display_line_number,
            ..self
        }
    }

    /// Record the name of the span the event happened in as `span`.
    pub fn with_current_span(self, display_current_span: bool) -> Format<T> {
        Format {
            display_current_span,
            ..self
        }
    }
}
