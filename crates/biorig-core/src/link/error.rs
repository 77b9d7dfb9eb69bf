//! Link errors

use thiserror::Error;

/// Errors that can occur while talking to the device
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Link closed by device")]
    Closed,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serialport::Error> for LinkError {
    fn from(err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => LinkError::PortNotFound(err.to_string()),
            _ => LinkError::SerialError(err.to_string()),
        }
    }
}
