//! Rig commands
//!
//! Every operator action becomes one `"<mode code>,<parameter>"` line on the
//! wire. The firmware does not acknowledge commands.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

use crate::link::{LinkError, SerialLink};

/// Parameter sent with every stop command
pub const STOP_PARAMETER: &str = "0";

/// Separator between the mode code and its parameter
pub const DELIMITER: char = ',';

/// Errors building or sending a command
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Unknown mode '{0}' (expected acquisition, stimulation, electrode or self-test)")]
    UnknownMode(String),

    #[error("Invalid parameter {parameter:?} for {mode}")]
    InvalidParameter { mode: Mode, parameter: String },

    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Device operating modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Firmware generates random output data
    SelfTest,
    /// Drive stimulation voltage onto the skin
    Stimulation,
    /// Stream measurements back at a fixed interval
    Acquisition,
    /// Supply the electrode with a bias voltage
    ElectrodePower,
}

impl Mode {
    /// All modes in wire-code order
    pub const ALL: [Mode; 4] = [
        Mode::SelfTest,
        Mode::Stimulation,
        Mode::Acquisition,
        Mode::ElectrodePower,
    ];

    /// Mode code understood by the firmware
    pub fn code(&self) -> u8 {
        match self {
            Mode::SelfTest => 0,
            Mode::Stimulation => 2,
            Mode::Acquisition => 3,
            Mode::ElectrodePower => 4,
        }
    }

    /// Parameter sent on start when the operator gives none
    pub fn default_parameter(&self) -> &'static str {
        match self {
            Mode::SelfTest => "1",
            Mode::Stimulation => "3.3",    // volts
            Mode::Acquisition => "1",      // seconds between samples
            Mode::ElectrodePower => "0.6", // volts
        }
    }

    /// Short name used on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Mode::SelfTest => "self-test",
            Mode::Stimulation => "stimulation",
            Mode::Acquisition => "acquisition",
            Mode::ElectrodePower => "electrode",
        }
    }

    /// Operator-facing status after switching the mode on or off
    pub fn status_message(&self, enabled: bool) -> &'static str {
        match (self, enabled) {
            (Mode::SelfTest, true) => "Testing mode.",
            (Mode::SelfTest, false) => "Normal mode.",
            (Mode::Stimulation, true) => "Stimulation started.",
            (Mode::Stimulation, false) => "Stimulation stopped.",
            (Mode::Acquisition, true) => "Logging started.",
            (Mode::Acquisition, false) => "Logging stopped.",
            (Mode::ElectrodePower, true) => "Electrode powered.",
            (Mode::ElectrodePower, false) => "Electrode unpowered.",
        }
    }

    /// Look up a mode by wire code
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.code() == code)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "acquisition" | "acq" | "log" | "logging" => Ok(Mode::Acquisition),
            "stimulation" | "stim" => Ok(Mode::Stimulation),
            "electrode" | "electrode-power" | "electrode_power" | "sens" | "power" => {
                Ok(Mode::ElectrodePower)
            }
            "self-test" | "self_test" | "selftest" | "test" => Ok(Mode::SelfTest),
            other => Err(CommandError::UnknownMode(other.to_string())),
        }
    }
}

/// Terminator appended after each command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEnding {
    /// Bare command; the firmware frames on its read timeout
    #[default]
    None,
    /// `\n`
    Lf,
    /// `\r\n`
    CrLf,
}

impl LineEnding {
    /// Terminator text
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::None => "",
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// One command for the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Target mode
    pub mode: Mode,
    /// Switch the mode on or off
    pub enabled: bool,
    /// Parameter as sent on the wire
    pub parameter: String,
}

impl Command {
    /// Build a command. Stops ignore `parameter`; a blank start parameter
    /// falls back to the mode default.
    pub fn new(mode: Mode, enabled: bool, parameter: Option<&str>) -> Result<Self, CommandError> {
        if !enabled {
            return Ok(Self::stop(mode));
        }

        let parameter = match parameter.map(str::trim) {
            Some(p) if !p.is_empty() => p,
            _ => mode.default_parameter(),
        };
        if parameter.contains(|c: char| c == DELIMITER || c == '\n' || c == '\r') {
            return Err(CommandError::InvalidParameter {
                mode,
                parameter: parameter.to_string(),
            });
        }

        Ok(Self {
            mode,
            enabled: true,
            parameter: parameter.to_string(),
        })
    }

    /// Start command with an optional parameter
    pub fn start(mode: Mode, parameter: Option<&str>) -> Result<Self, CommandError> {
        Self::new(mode, true, parameter)
    }

    /// Stop command
    pub fn stop(mode: Mode) -> Self {
        Self {
            mode,
            enabled: false,
            parameter: STOP_PARAMETER.to_string(),
        }
    }

    /// Wire form without terminator, e.g. `"3,1"`
    pub fn to_wire(&self) -> String {
        format!("{}{}{}", self.mode.code(), DELIMITER, self.parameter)
    }

    /// Wire form with the given terminator
    pub fn to_line(&self, ending: LineEnding) -> String {
        let mut line = self.to_wire();
        line.push_str(ending.as_str());
        line
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

/// Turns operator intents into wire commands
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandDispatcher {
    line_ending: LineEnding,
}

impl CommandDispatcher {
    /// Create a dispatcher appending `line_ending` to each command
    pub fn new(line_ending: LineEnding) -> Self {
        Self { line_ending }
    }

    /// Configured terminator
    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Build and send a command; returns what was sent
    pub fn send<L: SerialLink + ?Sized>(
        &self,
        link: &mut L,
        mode: Mode,
        enabled: bool,
        parameter: Option<&str>,
    ) -> Result<Command, CommandError> {
        let command = Command::new(mode, enabled, parameter)?;
        self.dispatch(link, &command)?;
        Ok(command)
    }

    /// Send a prepared command. Success means the write returned.
    pub fn dispatch<L: SerialLink + ?Sized>(
        &self,
        link: &mut L,
        command: &Command,
    ) -> Result<(), CommandError> {
        link.send_line(&command.to_line(self.line_ending))?;
        link.flush()?;
        info!(mode = %command.mode, wire = %command, "{}", command.mode.status_message(command.enabled));
        Ok(())
    }
}
