//! Per-session CSV file

use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// strftime pattern for session file names
pub const FILE_NAME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Session file name for a start time, e.g. `2024-03-01-14-05-09.csv`
pub fn session_file_name(started: &DateTime<Local>) -> String {
    format!("{}.csv", started.format(FILE_NAME_FORMAT))
}

/// Append-only two-column CSV writer, no header
pub struct CsvSink {
    path: PathBuf,
    writer: Box<dyn Write + Send>,
    rows: u64,
}

impl CsvSink {
    /// Path a session started at `started` writes to inside `dir`
    pub fn path_for(dir: &Path, started: &DateTime<Local>) -> PathBuf {
        dir.join(session_file_name(started))
    }

    /// Open (or create) the file for appending
    pub fn open(path: PathBuf) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self::from_writer(path, BufWriter::new(file)))
    }

    /// Write rows to `writer`, reporting `path` as the destination
    pub fn from_writer(path: PathBuf, writer: impl Write + Send + 'static) -> Self {
        Self {
            path,
            writer: Box::new(writer),
            rows: 0,
        }
    }

    /// File being written
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written by this sink
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Write and flush one row
    pub fn write_row(&mut self, fields: [&str; 2]) -> io::Result<()> {
        writeln!(self.writer, "{},{}", fields[0], fields[1])?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and close the file
    pub fn finish(mut self) -> io::Result<PathBuf> {
        self.writer.flush()?;
        Ok(self.path)
    }
}
