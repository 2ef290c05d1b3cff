//! Timed operations.
//!
//! A [`Timer`] measures a unit of work on the monotonic clock and logs
//! exactly one outcome record for it:
//!
//! - `"<op> completed"` (INFO) with `duration_ms`
//! - `"<op> failed"` (ERROR) with `duration_ms`, `error` and the exception
//! - `"<op> cancelled"` (WARNING) with `duration_ms`, when the timer is
//!   dropped unfinished, e.g. because the future driving it was dropped
//!
//! Fields added through [`Timer::fields_mut`] while the work runs are
//! included in the outcome record.

use crate::level::Level;
use crate::logger::Logger;
use crate::record::ErrorInfo;
use crate::value::{Fields, Value};
use std::error::Error;
use std::future::Future;
use std::panic::Location;
use std::time::Instant;

/// Guard timing one operation.
#[must_use = "dropping a timer immediately logs the operation as cancelled"]
#[derive(Debug)]
pub struct Timer {
    logger: Logger,
    operation: String,
    fields: Fields,
    start: Instant,
    location: &'static Location<'static>,
    finished: bool,
}

impl Timer {
    fn start(
        logger: Logger,
        operation: String,
        fields: Fields,
        location: &'static Location<'static>,
    ) -> Self {
        let timed_start = logger
            .pipeline()
            .is_some_and(|logging| logging.config().timed_start);
        if timed_start {
            logger.emit_at(
                Level::Info,
                format!("{} started", operation),
                Some(fields.clone()),
                None,
                location,
            );
        }
        Timer {
            logger,
            operation,
            fields,
            start: Instant::now(),
            location,
            finished: false,
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Fields merged into the outcome record.
    pub fn fields_mut(&mut self) -> &mut Fields {
        &mut self.fields
    }

    /// Milliseconds since the timer started, rounded to two decimals.
    pub fn elapsed_ms(&self) -> f64 {
        let ms = self.start.elapsed().as_secs_f64() * 1000.0;
        (ms * 100.0).round() / 100.0
    }

    /// Log the operation as completed.
    pub fn complete(mut self) {
        self.finish(Level::Info, "completed", None);
    }

    /// Log the operation as failed with `err`.
    pub fn fail<E: Error + ?Sized>(mut self, err: &E) {
        self.fields
            .insert("error".to_string(), Value::String(err.to_string()));
        self.finish(Level::Error, "failed", Some(ErrorInfo::from_error(err)));
    }

    /// Log the outcome of `result` and hand it back unchanged.
    pub fn finish_with<T, E: Error>(self, result: Result<T, E>) -> Result<T, E> {
        match &result {
            Ok(_) => self.complete(),
            Err(e) => self.fail(e),
        }
        result
    }

    fn finish(&mut self, level: Level, outcome: &str, error: Option<ErrorInfo>) {
        self.finished = true;
        let mut fields = std::mem::take(&mut self.fields);
        fields.insert("duration_ms".to_string(), Value::from(self.elapsed_ms()));
        self.logger.emit_at(
            level,
            format!("{} {}", self.operation, outcome),
            Some(fields),
            error,
            self.location,
        );
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if std::thread::panicking() {
            self.finish(
                Level::Error,
                "failed",
                Some(ErrorInfo::new("panic", "operation panicked")),
            );
        } else {
            self.finish(Level::Warning, "cancelled", None);
        }
    }
}

impl Logger {
    /// Start timing `operation`. See [`Timer`].
    #[track_caller]
    pub fn start_timer(&self, operation: impl Into<String>, fields: impl Into<Option<Fields>>) -> Timer {
        Timer::start(
            self.clone(),
            operation.into(),
            fields.into().unwrap_or_default(),
            Location::caller(),
        )
    }

    /// Run `work`, log its outcome with its duration, and return its result
    /// unchanged.
    ///
    /// **Parameters**
    /// - `operation`: name used in the outcome message, e.g. `"parse"`.
    /// - `fields`: extra fields for the outcome record.
    /// - `work`: the operation. It may add fields to the outcome record
    ///   through the `&mut Fields` it is handed.
    ///
    /// **Behavior**
    /// - `Ok` logs `"<operation> completed"` at INFO with `duration_ms`.
    /// - `Err` logs `"<operation> failed"` at ERROR with `duration_ms` and the
    ///   error attached as the exception.
    #[track_caller]
    pub fn timed<T, E, F>(
        &self,
        operation: impl Into<String>,
        fields: impl Into<Option<Fields>>,
        work: F,
    ) -> Result<T, E>
    where
        E: Error,
        F: FnOnce(&mut Fields) -> Result<T, E>,
    {
        let mut timer = self.start_timer(operation, fields);
        let result = work(timer.fields_mut());
        timer.finish_with(result)
    }

    /// Async counterpart of [`Logger::timed`]. The clock starts at the first
    /// poll and spans every suspension of `work`; dropping the returned
    /// future early logs the operation as cancelled.
    #[track_caller]
    pub fn timed_async<T, E, Fut>(
        &self,
        operation: impl Into<String>,
        fields: impl Into<Option<Fields>>,
        work: Fut,
    ) -> impl Future<Output = Result<T, E>>
    where
        E: Error,
        Fut: Future<Output = Result<T, E>>,
    {
        let location = Location::caller();
        let logger = self.clone();
        let operation = operation.into();
        let fields = fields.into().unwrap_or_default();
        async move {
            let timer = Timer::start(logger, operation, fields, location);
            let result = work.await;
            timer.finish_with(result)
        }
    }
}
