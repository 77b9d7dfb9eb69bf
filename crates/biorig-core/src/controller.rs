//! Rig controller
//!
//! Operator-facing facade tying the link, command dispatcher, logger and
//! sample buffer together. One controller drives one rig.

use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

use crate::buffer::{Sample, SampleBuffer};
use crate::command::{Command, CommandDispatcher, CommandError, Mode};
use crate::config::{LoggingSettings, RigConfig};
use crate::link::{LinkError, SerialLink};
use crate::plot::{PlotError, PlotRenderer, PlotSeries};
use crate::session::{LoggerSession, SessionError, SessionHandle};

/// Errors from operator actions
#[derive(Error, Debug)]
pub enum ControlError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Plot(#[from] PlotError),

    #[error("Logging is already running into {}", path.display())]
    SessionActive { path: PathBuf },
}

/// Drives one rig over a [`SerialLink`]
pub struct RigController<L> {
    link: L,
    dispatcher: CommandDispatcher,
    buffer: SampleBuffer,
    logging: LoggingSettings,
    session: Option<SessionHandle>,
    active: BTreeSet<Mode>,
}

impl<L: SerialLink> RigController<L> {
    /// Create a controller with a buffer sized from `config`
    pub fn new(link: L, config: &RigConfig) -> Self {
        let buffer = SampleBuffer::with_capacity(config.logging.max_buffer_samples);
        Self::with_buffer(link, config, buffer)
    }

    /// Create a controller sharing an existing buffer
    pub fn with_buffer(link: L, config: &RigConfig, buffer: SampleBuffer) -> Self {
        Self {
            link,
            dispatcher: CommandDispatcher::new(config.commands.line_ending),
            buffer,
            logging: config.logging.clone(),
            session: None,
            active: BTreeSet::new(),
        }
    }

    /// Switch a mode on.
    ///
    /// For [`Mode::Acquisition`] a logger session is started before the
    /// command goes out, so no early rows are missed.
    pub fn start(&mut self, mode: Mode, parameter: Option<&str>) -> Result<Command, ControlError> {
        if mode != Mode::Acquisition {
            let command = self.dispatcher.send(&mut self.link, mode, true, parameter)?;
            self.active.insert(mode);
            return Ok(command);
        }

        if let Some(current) = self.session.as_ref().filter(|s| s.is_running()) {
            return Err(ControlError::SessionActive {
                path: current.path().to_path_buf(),
            });
        }

        // Validate before touching the filesystem
        let command = Command::start(mode, parameter)?;
        let session = LoggerSession::start(
            self.link.line_source()?,
            &self.logging,
            self.buffer.clone(),
        )?;

        if let Err(e) = self.dispatcher.dispatch(&mut self.link, &command) {
            session.stop();
            return Err(e.into());
        }

        if let Some(previous) = self.session.replace(session) {
            if !previous.is_finished() {
                info!(path = %previous.path().display(), "previous session still draining");
            }
        }
        self.active.insert(mode);
        Ok(command)
    }

    /// Switch a mode off.
    ///
    /// Stopping acquisition also signals the logger, even if the command
    /// could not be written.
    pub fn stop(&mut self, mode: Mode) -> Result<Command, ControlError> {
        let sent = self.dispatcher.send(&mut self.link, mode, false, None);
        if mode == Mode::Acquisition {
            if let Some(session) = &self.session {
                session.stop();
            }
        }
        self.active.remove(&mode);
        Ok(sent?)
    }

    /// Whether a mode was last switched on
    pub fn is_active(&self, mode: Mode) -> bool {
        self.active.contains(&mode)
    }

    /// Modes currently switched on, in wire-code order
    pub fn active_modes(&self) -> Vec<Mode> {
        self.active.iter().copied().collect()
    }

    /// Whether a logger session is running
    pub fn is_logging(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_running())
    }

    /// Most recent logger session, running or not
    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    /// Take ownership of the most recent session, e.g. to join it
    pub fn take_session(&mut self) -> Option<SessionHandle> {
        self.session.take()
    }

    /// Shared sample buffer
    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    /// Snapshot of every buffered sample
    pub fn samples(&self) -> Vec<Sample> {
        self.buffer.snapshot()
    }

    /// Buffered samples converted for plotting
    pub fn plot_series(&self) -> PlotSeries {
        PlotSeries::from_samples(&self.samples(), self.logging.timestamp_unit)
    }

    /// Render the current buffer; returns the number of points drawn
    pub fn plot(&self, renderer: &dyn PlotRenderer) -> Result<usize, ControlError> {
        let series = self.plot_series();
        renderer.render(&series)?;
        Ok(series.len())
    }

    /// Underlying link
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Switch every active mode off and hand back the last session.
    ///
    /// Send failures are logged and do not stop the remaining modes.
    pub fn shutdown(&mut self) -> Option<SessionHandle> {
        for mode in self.active_modes() {
            if let Err(e) = self.stop(mode) {
                warn!(%mode, "failed to switch off during shutdown: {e}");
            }
        }
        if let Some(session) = &self.session {
            session.stop();
        }
        self.session.take()
    }
}
