//! Sequential byte sources feeding the scheduler.

use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{PlayError, Result};

/// A finite, sequential supplier of PCM bytes.
///
/// `read_chunk` fills `buf` and returns the number of bytes written. A short
/// count is only allowed at end of stream, and `0` signals exhaustion.
pub trait ByteSource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize>;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_chunk(buf)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_chunk(buf)
    }
}

/// Adapts any [`Read`] into a [`ByteSource`].
///
/// Short reads from pipes or sockets are retried until `buf` is full or the
/// reader reports EOF, so only the final chunk can be short. I/O failures
/// become [`PlayError::SourceRead`].
pub struct ReadSource<R> {
    inner: R,
    eof: bool,
}

impl<R: Read> ReadSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, eof: false }
    }
}

impl<R: Read> ByteSource for ReadSource<R> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() && !self.eof {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => self.eof = true,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(PlayError::SourceRead(e)),
            }
        }
        Ok(filled)
    }
}

/// Wraps a source so that it reports exhaustion once `stop` is raised.
///
/// This is how a caller ends playback early: the scheduler sees an empty read
/// and drains the buffers already queued.
pub struct StoppableSource<S> {
    inner: S,
    stop: Arc<AtomicBool>,
}

impl<S: ByteSource> StoppableSource<S> {
    pub fn new(inner: S, stop: Arc<AtomicBool>) -> Self {
        Self { inner, stop }
    }
}

impl<S: ByteSource> ByteSource for StoppableSource<S> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.stop.load(Ordering::Relaxed) {
            tracing::debug!("source stopped by request");
            return Ok(0);
        }
        self.inner.read_chunk(buf)
    }
}
