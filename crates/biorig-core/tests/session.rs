//! Streaming logger behaviour against a scripted device

mod common;

use biorig_core::buffer::{BufferPolicy, Sample, SampleBuffer};
use biorig_core::config::LoggingSettings;
use biorig_core::link::{ChannelLink, LinkError, SerialLink};
use biorig_core::session::{CsvSink, LoggerSession, SessionError};
use common::{wait_until, ChunkedChannel, FailingDisk, Feed};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn settings(dir: &Path) -> LoggingSettings {
    LoggingSettings {
        output_dir: dir.to_path_buf(),
        ..LoggingSettings::default()
    }
}

#[test]
fn each_data_line_becomes_one_row_and_one_sample() {
    let dir = TempDir::new().unwrap();
    let feed = Feed::default();
    let buffer = SampleBuffer::new();

    let handle = LoggerSession::start(feed.source(), &settings(dir.path()), buffer.clone()).unwrap();
    feed.lines(&["0,1.5", "1000, 2.25", "2000,3\r"]);
    assert!(wait_until(|| buffer.len() == 3));

    let path = handle.path().to_path_buf();
    let summary = handle.stop_and_join().unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "0,1.5\n1000,2.25\n2000,3\n");
    assert_eq!(
        buffer.snapshot(),
        vec![
            Sample::new(0.0, 1.5),
            Sample::new(1000.0, 2.25),
            Sample::new(2000.0, 3.0),
        ]
    );
    assert_eq!(summary.samples, 3);
    assert_eq!(summary.dropped, 0);
}

#[test]
fn malformed_and_diagnostic_lines_are_skipped() {
    let dir = TempDir::new().unwrap();
    let feed = Feed::default();
    let buffer = SampleBuffer::new();

    let handle = LoggerSession::start(feed.source(), &settings(dir.path()), buffer.clone()).unwrap();
    feed.lines(&["Logging started.", "abc,1", "1,2,3", "", "5,6"]);
    assert!(wait_until(|| buffer.len() == 1 && feed.is_drained()));

    let path = handle.path().to_path_buf();
    let summary = handle.stop_and_join().unwrap();

    assert_eq!(fs::read_to_string(path).unwrap(), "5,6\n");
    assert_eq!(buffer.snapshot(), vec![Sample::new(5.0, 6.0)]);
    assert_eq!(summary.lines, 5);
    assert_eq!(summary.diagnostics, 2);
    assert_eq!(summary.dropped, 2);
}

#[test]
fn file_exists_on_start_and_stays_empty_without_data() {
    let dir = TempDir::new().unwrap();
    let feed = Feed::default();

    let handle =
        LoggerSession::start(feed.source(), &settings(dir.path()), SampleBuffer::new()).unwrap();
    let path = handle.path().to_path_buf();
    assert!(path.exists());
    assert!(path.starts_with(dir.path()));

    let name = path.file_name().unwrap().to_str().unwrap();
    assert_eq!(name.len(), "2024-03-01-14-05-09.csv".len());
    assert!(name.ends_with(".csv"));

    let summary = handle.stop_and_join().unwrap();
    assert_eq!(summary.lines, 0);
    assert_eq!(fs::read_to_string(path).unwrap(), "");
}

#[test]
fn output_directory_is_created() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("runs").join("today");

    let handle =
        LoggerSession::start(Feed::default().source(), &settings(&nested), SampleBuffer::new())
            .unwrap();
    assert!(handle.path().starts_with(&nested));
    handle.stop_and_join().unwrap();
}

#[test]
fn unopenable_file_is_reported_by_start() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, "").unwrap();

    let err = LoggerSession::start(
        Feed::default().source(),
        &settings(&blocker.join("sub")),
        SampleBuffer::new(),
    )
    .unwrap_err();
    assert!(matches!(err, SessionError::Open { .. }));
}

#[test]
fn link_fault_ends_the_session() {
    let dir = TempDir::new().unwrap();
    let feed = Feed::default();
    let buffer = SampleBuffer::new();

    let handle = LoggerSession::start(feed.source(), &settings(dir.path()), buffer.clone()).unwrap();
    feed.line("0,1");
    feed.fault();
    feed.line("1000,2");

    assert!(wait_until(|| handle.is_finished()));
    assert!(!handle.is_running());

    let path = handle.path().to_path_buf();
    let err = handle.join().unwrap_err();
    assert!(matches!(err, SessionError::Link(LinkError::Closed)));

    // Rows before the fault stay on disk
    assert_eq!(fs::read_to_string(path).unwrap(), "0,1\n");
    assert_eq!(buffer.len(), 1);
}

#[test]
fn reset_policy_clears_buffer_at_start() {
    let dir = TempDir::new().unwrap();
    let buffer = SampleBuffer::new();
    buffer.push(Sample::new(1.0, 1.0));

    let mut logging = settings(dir.path());
    logging.buffer_policy = BufferPolicy::ResetPerSession;
    let handle = LoggerSession::start(Feed::default().source(), &logging, buffer.clone()).unwrap();
    assert!(buffer.is_empty());
    handle.stop_and_join().unwrap();

    let handle = LoggerSession::start(
        Feed::default().source(),
        &settings(dir.path()),
        buffer.clone(),
    )
    .unwrap();
    buffer.push(Sample::new(2.0, 2.0));
    handle.stop_and_join().unwrap();
    assert_eq!(buffer.len(), 1);
}

#[test]
fn draining_session_does_not_touch_the_next_sessions_file() {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let first_feed = Feed::default();
    let second_feed = Feed::default();
    let buffer = SampleBuffer::new();

    let first = LoggerSession::start(
        first_feed.source(),
        &settings(first_dir.path()),
        buffer.clone(),
    )
    .unwrap();
    first_feed.line("0,1");
    assert!(wait_until(|| buffer.len() == 1));
    first.stop();

    let second = LoggerSession::start(
        second_feed.source(),
        &settings(second_dir.path()),
        buffer.clone(),
    )
    .unwrap();
    assert!(second.is_running());
    assert!(!first.is_running());

    first_feed.line("500,9");
    second_feed.lines(&["1000,2", "2000,3"]);
    assert!(wait_until(|| second_feed.is_drained()));

    let second_path = second.path().to_path_buf();
    first.join().unwrap();
    second.stop_and_join().unwrap();

    assert_eq!(fs::read_to_string(second_path).unwrap(), "1000,2\n2000,3\n");
}

#[test]
fn sink_fault_ends_the_session_and_keeps_earlier_rows() {
    let feed = Feed::default();
    let buffer = SampleBuffer::new();
    let (disk, written) = FailingDisk::new(2);
    let sink = CsvSink::from_writer("full.csv".into(), disk);

    let handle = LoggerSession::start_with_sink(feed.source(), sink, buffer.clone()).unwrap();
    feed.lines(&["0,1", "1000,2", "2000,3", "3000,4"]);

    assert!(wait_until(|| handle.is_finished()));
    assert!(!handle.is_running());

    let err = handle.join().unwrap_err();
    assert!(matches!(err, SessionError::Sink { ref path, .. } if path == Path::new("full.csv")));

    let on_disk = String::from_utf8(written.lock().unwrap().clone()).unwrap();
    assert_eq!(on_disk, "0,1\n1000,2\n");
    // The row that failed to write is not buffered either
    assert_eq!(
        buffer.snapshot(),
        vec![Sample::new(0.0, 1.0), Sample::new(1000.0, 2.0)]
    );
}

#[test]
fn restarted_session_completes_a_row_split_across_the_restart() {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let channel = ChunkedChannel::default();
    let link = ChannelLink::new(Box::new(channel.clone()));
    let buffer = SampleBuffer::new();

    let first = LoggerSession::start(
        link.line_source().unwrap(),
        &settings(first_dir.path()),
        buffer.clone(),
    )
    .unwrap();
    channel.push("120500,0.51\n1206");
    assert!(wait_until(|| buffer.len() == 1 && channel.is_drained()));
    let first_path = first.path().to_path_buf();
    first.stop_and_join().unwrap();

    let second = LoggerSession::start(
        link.line_source().unwrap(),
        &settings(second_dir.path()),
        buffer.clone(),
    )
    .unwrap();
    channel.push("00,0.52\n");
    assert!(wait_until(|| buffer.len() == 2));
    let second_path = second.path().to_path_buf();
    let summary = second.stop_and_join().unwrap();

    assert_eq!(fs::read_to_string(first_path).unwrap(), "120500,0.51\n");
    assert_eq!(fs::read_to_string(second_path).unwrap(), "120600,0.52\n");
    assert_eq!(buffer.last(), Some(Sample::new(120600.0, 0.52)));
    assert_eq!(summary.dropped, 0);
}
