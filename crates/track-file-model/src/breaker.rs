//! Cooperative cancellation and progress reporting for a running parse

use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag for one parse
///
/// Cloning yields another handle to the same flag. Calling [`Breaker::request_break`]
/// from any thread makes the parse stop at its next safe point.
#[derive(Clone, Debug, Default)]
pub struct Breaker {
    aborted: Arc<AtomicBool>,
}

impl Breaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the parse to stop. Idempotent.
    pub fn request_break(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    /// Whether a break has been requested
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// Receiver for parse progress and parser error messages
pub trait ProgressSink: Send + Sync {
    /// Fraction of the input consumed, in `[0.0, 1.0]`
    fn progress(&self, fraction: f64);

    /// A fatal error message from the parser
    fn error(&self, _message: &str) {}
}

/// A sink that discards everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn progress(&self, _fraction: f64) {}
}

/// `Read` adapter that reports consumed bytes as progress and honours a [`Breaker`]
///
/// Every call to `read` is a safe point: if a break was requested the read fails with
/// an I/O error and the parser unwinds.
pub struct ProgressReader<'a, R> {
    inner: R,
    total_bytes: u64,
    bytes_read: u64,
    last_reported: f64,
    breaker: Breaker,
    sink: &'a dyn ProgressSink,
}

impl<'a, R: Read> ProgressReader<'a, R> {
    pub fn new(inner: R, total_bytes: u64, breaker: Breaker, sink: &'a dyn ProgressSink) -> Self {
        Self {
            inner,
            total_bytes,
            bytes_read: 0,
            last_reported: 0.0,
            breaker,
            sink,
        }
    }

    /// Number of bytes handed to the parser so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    fn report(&mut self) {
        if self.total_bytes == 0 {
            return;
        }
        let fraction = (self.bytes_read as f64 / self.total_bytes as f64).clamp(0.0, 1.0);
        if fraction > self.last_reported {
            self.last_reported = fraction;
            self.sink.progress(fraction);
        }
    }
}

impl<R: Read> Read for ProgressReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // Not `Interrupted`: readers retry on that kind
        if self.breaker.is_aborted() {
            return Err(io::Error::other("parse aborted"));
        }
        let n = self.inner.read(buf)?;
        self.bytes_read += n as u64;
        self.report();
        Ok(n)
    }
}
