//! Newline framing over a timed-out byte stream

use std::io::{self, BufRead, BufReader, Read};
use std::sync::{Arc, Mutex, PoisonError};

use super::{LineSource, LinkError};

/// Splits a byte stream into lines, tolerating read timeouts mid-line
pub struct LineReader<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    eof: bool,
}

impl<R: Read> LineReader<R> {
    /// Wrap a reader whose `read` may fail with `TimedOut`/`WouldBlock`
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            pending: Vec::with_capacity(64),
            eof: false,
        }
    }

    fn take_line(&mut self) -> String {
        let bytes = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&bytes)
            .trim_end_matches(|c: char| c == '\r' || c == '\n')
            .to_string()
    }

    /// See [`LineSource::read_line`]
    pub fn next_line(&mut self) -> Result<Option<String>, LinkError> {
        if self.eof {
            return Err(LinkError::Closed);
        }

        // read_until keeps whatever it consumed in `pending` when it errors,
        // so a line split across a timeout is completed on the next call.
        match self.reader.read_until(b'\n', &mut self.pending) {
            Ok(0) => {
                self.eof = true;
                Err(LinkError::Closed)
            }
            Ok(_) => {
                if self.pending.last() != Some(&b'\n') {
                    // Stream ended without a terminator
                    self.eof = true;
                }
                Ok(Some(self.take_line()))
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl<R: Read + Send> LineSource for LineReader<R> {
    fn read_line(&mut self) -> Result<Option<String>, LinkError> {
        self.next_line()
    }
}

/// One [`LineReader`] handed to successive sessions.
///
/// Bytes buffered past the last newline stay with the reader, so a session
/// started after another one picks up exactly where the previous left off.
/// Only one session reads at a time; a draining session holds the lock for
/// at most one read timeout.
pub struct SharedLineReader<R>(Arc<Mutex<LineReader<R>>>);

impl<R: Read> SharedLineReader<R> {
    /// Share a reader over `inner`
    pub fn new(inner: R) -> Self {
        Self(Arc::new(Mutex::new(LineReader::new(inner))))
    }
}

impl<R> Clone for SharedLineReader<R> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<R: Read + Send> LineSource for SharedLineReader<R> {
    fn read_line(&mut self) -> Result<Option<String>, LinkError> {
        let mut reader = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        reader.next_line()
    }
}
