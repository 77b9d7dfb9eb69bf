//! # biorig Core Library
//!
//! Core functionality for the biorig bioelectronics rig control panel.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Serial link access to the rig's microcontroller
//! - Command dispatch for the rig's operating modes
//! - The streaming logger that tails device output into CSV sessions
//! - A shared sample buffer and plot rendering
//! - Device presence monitoring
//! - A simulated rig for bench testing
//!
//! ## Example
//!
//! ```rust,ignore
//! use biorig_core::prelude::*;
//!
//! let config = RigConfig::default();
//! let link = ChannelLink::open("/dev/ttyACM0", &config.link)?;
//! let mut rig = RigController::new(link, &config);
//!
//! rig.start(Mode::Acquisition, None)?;
//! // ... samples stream into a timestamped CSV file
//! rig.stop(Mode::Acquisition)?;
//! ```

pub mod buffer;
pub mod command;
pub mod config;
pub mod controller;
pub mod link;
pub mod plot;
pub mod presence;
pub mod session;
pub mod sim;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::buffer::{BufferPolicy, Sample, SampleBuffer};
    pub use crate::command::{Command, CommandDispatcher, LineEnding, Mode};
    pub use crate::config::RigConfig;
    pub use crate::controller::{ControlError, RigController};
    pub use crate::link::{ChannelLink, LineSource, LinkError, PortInfo, SerialLink};
    pub use crate::plot::{PlotRenderer, PlotSeries, SvgPlotRenderer, TimestampUnit};
    pub use crate::presence::{DeviceIdentity, PresenceMonitor, PresenceState};
    pub use crate::session::{LoggerSession, SessionError, SessionHandle, SessionSummary};
    pub use crate::sim::SimulatedRig;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
