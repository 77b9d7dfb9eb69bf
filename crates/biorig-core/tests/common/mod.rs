//! Test doubles shared by the integration tests
#![allow(dead_code)]

use biorig_core::link::{CommunicationChannel, LineSource, LinkError, SerialLink};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// How long a silent device takes to "time out"
pub const IDLE_READ: Duration = Duration::from_millis(2);

enum FeedEvent {
    Line(String),
    Fault,
}

/// Device output the test pushes while a session is running
#[derive(Clone, Default)]
pub struct Feed(Arc<Mutex<VecDeque<FeedEvent>>>);

impl Feed {
    pub fn line(&self, line: &str) {
        self.0.lock().unwrap().push_back(FeedEvent::Line(line.to_string()));
    }

    pub fn lines(&self, lines: &[&str]) {
        for line in lines {
            self.line(line);
        }
    }

    /// Next read fails as if the port vanished
    pub fn fault(&self) {
        self.0.lock().unwrap().push_back(FeedEvent::Fault);
    }

    pub fn is_drained(&self) -> bool {
        self.0.lock().unwrap().is_empty()
    }

    pub fn source(&self) -> Box<dyn LineSource> {
        Box::new(FeedSource(self.clone()))
    }
}

struct FeedSource(Feed);

impl LineSource for FeedSource {
    fn read_line(&mut self) -> Result<Option<String>, LinkError> {
        let next = self.0 .0.lock().unwrap().pop_front();
        match next {
            Some(FeedEvent::Line(line)) => Ok(Some(line)),
            Some(FeedEvent::Fault) => Err(LinkError::Closed),
            None => {
                thread::sleep(IDLE_READ);
                Ok(None)
            }
        }
    }
}

/// Records every line written; reads come from its [`Feed`]
#[derive(Clone, Default)]
pub struct MockLink {
    pub feed: Feed,
    sent: Arc<Mutex<Vec<String>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl SerialLink for MockLink {
    fn send_line(&mut self, line: &str) -> Result<(), LinkError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "port gone").into());
        }
        self.sent.lock().unwrap().push(line.to_string());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), LinkError> {
        Ok(())
    }

    fn line_source(&self) -> Result<Box<dyn LineSource>, LinkError> {
        Ok(self.feed.source())
    }
}

/// Byte-level device: each read hands out one pushed chunk as-is, so a
/// row can arrive split across reads
#[derive(Clone, Default)]
pub struct ChunkedChannel(Arc<Mutex<VecDeque<Vec<u8>>>>);

impl ChunkedChannel {
    pub fn push(&self, bytes: &str) {
        self.0.lock().unwrap().push_back(bytes.as_bytes().to_vec());
    }

    pub fn is_drained(&self) -> bool {
        self.0.lock().unwrap().is_empty()
    }
}

impl Read for ChunkedChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let next = self.0.lock().unwrap().pop_front();
        match next {
            Some(chunk) => {
                assert!(chunk.len() <= buf.len(), "chunk larger than read buffer");
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
            None => {
                thread::sleep(IDLE_READ);
                Err(io::ErrorKind::TimedOut.into())
            }
        }
    }
}

impl Write for ChunkedChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CommunicationChannel for ChunkedChannel {
    fn set_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.0.lock().unwrap().clear();
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Box<dyn CommunicationChannel>> {
        Ok(Box::new(self.clone()))
    }
}

/// Writer whose flushes reach `disk` until `good_flushes` are used up,
/// after which every flush fails like a full volume
pub struct FailingDisk {
    pending: Vec<u8>,
    disk: Arc<Mutex<Vec<u8>>>,
    good_flushes: usize,
}

impl FailingDisk {
    pub fn new(good_flushes: usize) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let disk = Arc::new(Mutex::new(Vec::new()));
        let writer = Self {
            pending: Vec::new(),
            disk: Arc::clone(&disk),
            good_flushes,
        };
        (writer, disk)
    }
}

impl Write for FailingDisk {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.good_flushes == 0 {
            return Err(io::Error::other("disk full"));
        }
        self.good_flushes -= 1;
        self.disk.lock().unwrap().append(&mut self.pending);
        Ok(())
    }
}

/// Poll `cond` for up to two seconds
pub fn wait_until(cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}
