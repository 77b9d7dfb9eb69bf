//! Streaming Logger
//!
//! A logging session tails device output on its own thread. Each accepted
//! sample is appended to the session's CSV file and mirrored into the shared
//! [`SampleBuffer`]. The operator stops a session by raising its
//! [`StopSignal`]; the thread notices at the latest one read timeout later.

mod parse;
mod sink;

pub use parse::{classify_line, LineKind};
pub use sink::{session_file_name, CsvSink, FILE_NAME_FORMAT};

use chrono::{DateTime, Local};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, error, info, trace};

use crate::buffer::SampleBuffer;
use crate::config::LoggingSettings;
use crate::link::{LineSource, LinkError};

/// Errors that end a logging session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to open session file {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("Failed to write session file {}: {source}", path.display())]
    Sink { path: PathBuf, source: io::Error },

    #[error("Serial link failed during session: {0}")]
    Link(#[from] LinkError),

    #[error("Failed to spawn logger thread: {0}")]
    Spawn(io::Error),

    #[error("Logger thread panicked")]
    Panicked,
}

/// Cross-thread stop request for one session
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// New signal in the running state
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the session to stop
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Counters reported when a session ends
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    /// Session file
    pub path: PathBuf,
    /// Wall-clock start time
    pub started: DateTime<Local>,
    /// Complete lines read from the device
    pub lines: u64,
    /// Samples written to file and buffer
    pub samples: u64,
    /// Lines without a delimiter
    pub diagnostics: u64,
    /// Lines with a delimiter that failed to parse
    pub dropped: u64,
}

/// State owned by the logger thread
pub struct LoggerSession {
    source: Box<dyn LineSource>,
    sink: CsvSink,
    buffer: SampleBuffer,
    stop: StopSignal,
    summary: SessionSummary,
}

impl LoggerSession {
    /// Open the session file and start the logger thread.
    ///
    /// The file exists when this returns. The buffer policy from `settings`
    /// is applied before the first sample arrives.
    pub fn start(
        source: Box<dyn LineSource>,
        settings: &LoggingSettings,
        buffer: SampleBuffer,
    ) -> Result<SessionHandle, SessionError> {
        let started = Local::now();
        let path = CsvSink::path_for(&settings.output_dir, &started);
        let sink = CsvSink::open(path.clone()).map_err(|source| SessionError::Open {
            path: path.clone(),
            source,
        })?;

        buffer.begin_session(settings.buffer_policy);
        Self::start_with_sink(source, sink, buffer)
    }

    /// Start the logger thread on an already-open sink
    pub fn start_with_sink(
        source: Box<dyn LineSource>,
        sink: CsvSink,
        buffer: SampleBuffer,
    ) -> Result<SessionHandle, SessionError> {
        let started = Local::now();
        let path = sink.path().to_path_buf();
        let stop = StopSignal::new();
        let session = LoggerSession {
            source,
            sink,
            buffer,
            stop: stop.clone(),
            summary: SessionSummary {
                path: path.clone(),
                started,
                lines: 0,
                samples: 0,
                diagnostics: 0,
                dropped: 0,
            },
        };

        let thread = thread::Builder::new()
            .name("biorig-logger".into())
            .spawn(move || session.run())
            .map_err(SessionError::Spawn)?;

        info!(path = %path.display(), "logging session started");

        Ok(SessionHandle {
            path,
            started,
            stop,
            thread: Some(thread),
        })
    }

    fn run(mut self) -> Result<SessionSummary, SessionError> {
        let result = self.pump();

        let path = self.summary.path.clone();
        let closed = self
            .sink
            .finish()
            .map_err(|source| SessionError::Sink { path, source });

        let summary = self.summary;
        match result.and(closed) {
            Ok(_) => {
                info!(
                    path = %summary.path.display(),
                    lines = summary.lines,
                    samples = summary.samples,
                    dropped = summary.dropped,
                    "logging session closed"
                );
                Ok(summary)
            }
            Err(e) => {
                error!(path = %summary.path.display(), "logging session failed: {e}");
                Err(e)
            }
        }
    }

    fn pump(&mut self) -> Result<(), SessionError> {
        while !self.stop.is_raised() {
            let Some(line) = self.source.read_line()? else {
                continue;
            };
            self.summary.lines += 1;
            trace!(line = %line, "rx");

            match classify_line(&line) {
                LineKind::Sample(sample, fields) => {
                    // The buffer only mirrors rows that reached the file
                    self.sink
                        .write_row(fields)
                        .map_err(|source| SessionError::Sink {
                            path: self.summary.path.clone(),
                            source,
                        })?;
                    self.buffer.push(sample);
                    self.summary.samples += 1;
                }
                LineKind::Diagnostic => {
                    self.summary.diagnostics += 1;
                    debug!(line = %line, "device message");
                }
                LineKind::Malformed => {
                    self.summary.dropped += 1;
                    debug!(line = %line, "dropped malformed line");
                }
            }
        }
        Ok(())
    }
}

/// Operator-side handle to a running session.
///
/// Dropping the handle requests a stop but does not wait for the thread.
pub struct SessionHandle {
    path: PathBuf,
    started: DateTime<Local>,
    stop: StopSignal,
    thread: Option<JoinHandle<Result<SessionSummary, SessionError>>>,
}

impl SessionHandle {
    /// Session file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wall-clock start time
    pub fn started_at(&self) -> DateTime<Local> {
        self.started
    }

    /// Request a stop; returns immediately
    pub fn stop(&self) {
        self.stop.raise();
    }

    /// Whether a stop has been requested
    pub fn is_stopping(&self) -> bool {
        self.stop.is_raised()
    }

    /// Whether the logger thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Logging and not asked to stop
    pub fn is_running(&self) -> bool {
        !self.is_stopping() && !self.is_finished()
    }

    /// Wait for the logger thread and collect its outcome
    pub fn join(mut self) -> Result<SessionSummary, SessionError> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| SessionError::Panicked)?,
            None => Err(SessionError::Panicked),
        }
    }

    /// Stop and wait
    pub fn stop_and_join(self) -> Result<SessionSummary, SessionError> {
        self.stop();
        self.join()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.stop.raise();
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("path", &self.path)
            .field("started", &self.started)
            .field("stopping", &self.is_stopping())
            .field("finished", &self.is_finished())
            .finish()
    }
}
