//! Byte channels and the line link built on them

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, info};

use super::{open_port, LineSource, LinkError, SerialLink, SharedLineReader};
use crate::config::LinkSettings;

/// Byte transport under a [`ChannelLink`]
pub trait CommunicationChannel: Read + Write + Send {
    /// Bound how long a read may block before failing with `TimedOut`
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Discard anything the device sent before we started listening
    fn clear_input_buffer(&mut self) -> io::Result<()>;

    /// Second handle on the same device, for a reader on another thread
    fn try_clone(&self) -> io::Result<Box<dyn CommunicationChannel>>;
}

/// A real port from the `serialport` crate
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Wrap an opened serial port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Read for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl CommunicationChannel for SerialChannel {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port.set_timeout(timeout).map_err(io::Error::other)
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::other)
    }

    fn try_clone(&self) -> io::Result<Box<dyn CommunicationChannel>> {
        let port_clone = self.port.try_clone().map_err(io::Error::other)?;
        Ok(Box::new(SerialChannel::new(port_clone)))
    }
}

/// [`SerialLink`] over any [`CommunicationChannel`].
///
/// Every [`SerialLink::line_source`] call returns a handle to the same
/// reader, created on first use from a clone of the channel.
pub struct ChannelLink {
    channel: Box<dyn CommunicationChannel>,
    reader: Mutex<Option<SharedLineReader<Box<dyn CommunicationChannel>>>>,
}

impl ChannelLink {
    /// Wrap an already-open channel
    pub fn new(channel: Box<dyn CommunicationChannel>) -> Self {
        Self {
            channel,
            reader: Mutex::new(None),
        }
    }

    /// Open a serial port and discard stale input
    pub fn open(port_name: &str, settings: &LinkSettings) -> Result<Self, LinkError> {
        let port = open_port(port_name, settings.baud_rate, settings.timeout())?;
        let mut channel = SerialChannel::new(port);
        channel.clear_input_buffer()?;
        info!(
            port = port_name,
            baud = settings.baud_rate,
            timeout_ms = settings.timeout_ms,
            "serial link open"
        );
        Ok(Self::new(Box::new(channel)))
    }
}

impl SerialLink for ChannelLink {
    fn send_line(&mut self, line: &str) -> Result<(), LinkError> {
        debug!(line = line.trim_end(), "tx");
        self.channel.write_all(line.as_bytes())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), LinkError> {
        self.channel.flush()?;
        Ok(())
    }

    fn line_source(&self) -> Result<Box<dyn LineSource>, LinkError> {
        let mut slot = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        let reader = match slot.as_ref() {
            Some(reader) => reader.clone(),
            None => {
                let reader = SharedLineReader::new(self.channel.try_clone()?);
                *slot = Some(reader.clone());
                reader
            }
        };
        Ok(Box::new(reader))
    }
}
