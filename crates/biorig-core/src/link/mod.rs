//! Serial Link
//!
//! Line-oriented access to the rig's microcontroller over a serial port.
//!
//! The operator thread writes commands while the logger thread reads device
//! output, so a link hands out [`LineSource`] readers backed by a clone of the
//! underlying channel. Successive logger sessions share one reader so no
//! buffered bytes are lost between them.

mod channel;
mod error;
mod line;
pub mod serial;

pub use channel::{ChannelLink, CommunicationChannel, SerialChannel};
pub use error::LinkError;
pub use line::{LineReader, SharedLineReader};
pub use serial::{list_ports, open_port, PortInfo};

/// Default baud rate of the rig firmware
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default read timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// A source of newline-terminated lines from the device
pub trait LineSource: Send {
    /// Read the next complete line with its terminator stripped.
    ///
    /// Returns `Ok(None)` when the read timeout elapsed before a full line
    /// arrived. Any bytes already received are kept for the next call.
    fn read_line(&mut self) -> Result<Option<String>, LinkError>;
}

impl<S: LineSource + ?Sized> LineSource for Box<S> {
    fn read_line(&mut self) -> Result<Option<String>, LinkError> {
        (**self).read_line()
    }
}

/// Duplex line link to the device
pub trait SerialLink: Send {
    /// Write one line to the device. The caller supplies any terminator.
    fn send_line(&mut self, line: &str) -> Result<(), LinkError>;

    /// Flush pending output
    fn flush(&mut self) -> Result<(), LinkError>;

    /// Reader over the device's output. Readers from one link share their
    /// framing state, so a line split across two sessions is not torn.
    fn line_source(&self) -> Result<Box<dyn LineSource>, LinkError>;
}
