//! Operator console commands read from stdin

use anyhow::{bail, Context, Result};
use biorig_core::command::Mode;
use std::path::PathBuf;

/// Text printed by `help`
pub const HELP: &str = "\
Commands:
  start <mode> [param]   switch a mode on (acquisition, stimulation, electrode, self-test)
  stop <mode>            switch a mode off
  plot [path]            render buffered samples to an SVG file
  status                 show active modes and logging state
  help                   show this text
  quit                   switch everything off and exit";

/// One line of operator input
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Start {
        mode: Mode,
        parameter: Option<String>,
    },
    Stop(Mode),
    Plot(Option<PathBuf>),
    Status,
    Help,
    Quit,
}

/// Parse a console line; blank lines yield `None`
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match verb.to_ascii_lowercase().as_str() {
        "start" | "on" => {
            let (mode, parameter) = match rest.as_slice() {
                [mode] => (*mode, None),
                [mode, parameter] => (*mode, Some(parameter.to_string())),
                _ => bail!("usage: start <mode> [param]"),
            };
            ConsoleCommand::Start {
                mode: mode.parse::<Mode>().context("start")?,
                parameter,
            }
        }
        "stop" | "off" => match rest.as_slice() {
            [mode] => ConsoleCommand::Stop(mode.parse::<Mode>().context("stop")?),
            _ => bail!("usage: stop <mode>"),
        },
        "plot" => match rest.as_slice() {
            [] => ConsoleCommand::Plot(None),
            [path] => ConsoleCommand::Plot(Some(PathBuf::from(path))),
            _ => bail!("usage: plot [path]"),
        },
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => bail!("unknown command '{other}', try 'help'"),
    };

    Ok(Some(command))
}
