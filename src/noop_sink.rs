use crate::sink::LogSink;
use std::io;

/// A sink that simply drops all records.
///
/// Useful for measuring the overhead of formatting and context capture
/// without any I/O, and for tests that only care about side effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn write_record(&self, _record: &str) -> io::Result<()> {
        Ok(())
    }
}
