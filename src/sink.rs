use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};

/// Destination for rendered records.
///
/// Implementations must write each record atomically: under concurrent
/// callers two records may land in either order, but never interleaved.
pub trait LogSink: Send + Sync {
    /// Write one rendered record. The sink appends the line terminator.
    fn write_record(&self, record: &str) -> io::Result<()>;

    /// Flush any buffered records.
    ///
    /// Default implementation is a no-op.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Which standard stream a [`ConsoleSink`] writes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsoleStream {
    #[default]
    Stdout,
    Stderr,
}

/// Writes records to stdout or stderr.
///
/// Each record and its newline go out in a single `write_all` while the
/// stream lock is held.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink {
    stream: ConsoleStream,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        ConsoleSink {
            stream: ConsoleStream::Stdout,
        }
    }

    pub fn stderr() -> Self {
        ConsoleSink {
            stream: ConsoleStream::Stderr,
        }
    }
}

impl LogSink for ConsoleSink {
    fn write_record(&self, record: &str) -> io::Result<()> {
        let mut line = String::with_capacity(record.len() + 1);
        line.push_str(record);
        line.push('\n');
        match self.stream {
            ConsoleStream::Stdout => io::stdout().lock().write_all(line.as_bytes()),
            ConsoleStream::Stderr => io::stderr().lock().write_all(line.as_bytes()),
        }
    }

    fn flush(&self) -> io::Result<()> {
        match self.stream {
            ConsoleStream::Stdout => io::stdout().flush(),
            ConsoleStream::Stderr => io::stderr().flush(),
        }
    }
}

/// Writes newline-terminated records to any [`Write`] behind a mutex.
#[derive(Debug, Default)]
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        WriterSink {
            writer: Mutex::new(writer),
        }
    }

    /// Run `f` against the underlying writer.
    pub fn with_writer<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        f(&mut lock(&self.writer))
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn write_record(&self, record: &str) -> io::Result<()> {
        let mut writer = lock(&self.writer);
        writer.write_all(record.as_bytes())?;
        writer.write_all(b"\n")
    }

    fn flush(&self) -> io::Result<()> {
        lock(&self.writer).flush()
    }
}

/// Keeps records in memory, one entry per record.
///
/// Meant for tests and for inspecting output programmatically.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far.
    pub fn records(&self) -> Vec<String> {
        lock(&self.records).clone()
    }

    /// Remove and return everything written so far.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *lock(&self.records))
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemorySink {
    fn write_record(&self, record: &str) -> io::Result<()> {
        lock(&self.records).push(record.to_string());
        Ok(())
    }
}
