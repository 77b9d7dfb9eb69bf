//! Interactive control panel

use anyhow::{anyhow, Result};
use biorig_core::command::Mode;
use biorig_core::config::RigConfig;
use biorig_core::controller::RigController;
use biorig_core::link::SerialLink;
use biorig_core::plot::SvgPlotRenderer;
use biorig_core::presence::PresenceState;
use biorig_core::session::FILE_NAME_FORMAT;
use chrono::Local;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::console::{self, ConsoleCommand, HELP};

/// Whether the panel keeps reading input after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Control panel state for one rig
pub struct Panel<L> {
    rig: RigController<L>,
    output_dir: PathBuf,
}

impl<L: SerialLink> Panel<L> {
    pub fn new(rig: RigController<L>, config: &RigConfig) -> Self {
        Self {
            rig,
            output_dir: config.logging.output_dir.clone(),
        }
    }

    /// Read commands from stdin until `quit`, end of input, or device loss
    pub async fn run(&mut self, presence: Option<watch::Receiver<PresenceState>>) -> Result<()> {
        let input = spawn_stdin_reader()?;
        println!("{HELP}");
        self.run_with(input, presence).await
    }

    /// Drive the panel from `input` lines until `quit`, the sender closing,
    /// or device loss
    pub async fn run_with(
        &mut self,
        mut input: mpsc::Receiver<io::Result<String>>,
        presence: Option<watch::Receiver<PresenceState>>,
    ) -> Result<()> {
        let mut presence = presence;

        loop {
            tokio::select! {
                line = input.recv() => {
                    let Some(line) = line else {
                        break;
                    };
                    if self.handle_line(&line?) == Flow::Quit {
                        break;
                    }
                }
                _ = device_lost(&mut presence) => {
                    self.rig.shutdown();
                    return Err(anyhow!("device disconnected"));
                }
            }
        }

        self.rig.shutdown();
        info!("control panel closed");
        Ok(())
    }

    /// Parse and execute one console line, reporting failures to the operator
    pub fn handle_line(&mut self, line: &str) -> Flow {
        let command = match console::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Flow::Continue,
            Err(e) => {
                println!("{e:#}");
                return Flow::Continue;
            }
        };

        match self.execute(command) {
            Ok(flow) => flow,
            Err(e) => {
                error!("{e:#}");
                println!("error: {e:#}");
                Flow::Continue
            }
        }
    }

    /// Execute a parsed console command
    pub fn execute(&mut self, command: ConsoleCommand) -> Result<Flow> {
        match command {
            ConsoleCommand::Start { mode, parameter } => {
                let sent = self.rig.start(mode, parameter.as_deref())?;
                println!("{} (sent {sent})", mode.status_message(true));
                if let (Mode::Acquisition, Some(session)) = (mode, self.rig.session()) {
                    println!("logging to {}", session.path().display());
                }
            }
            ConsoleCommand::Stop(mode) => {
                let sent = self.rig.stop(mode)?;
                println!("{} (sent {sent})", mode.status_message(false));
            }
            ConsoleCommand::Plot(path) => {
                let path = path.unwrap_or_else(|| self.default_plot_path());
                let points = self.rig.plot(&SvgPlotRenderer::new(&path))?;
                println!("plotted {points} samples to {}", path.display());
            }
            ConsoleCommand::Status => self.print_status(),
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn default_plot_path(&self) -> PathBuf {
        let name = format!("{}.svg", Local::now().format(FILE_NAME_FORMAT));
        self.output_dir.join(name)
    }

    fn print_status(&mut self) {
        let modes = self.rig.active_modes();
        if modes.is_empty() {
            println!("active: none");
        } else {
            let names: Vec<&str> = modes.iter().map(Mode::name).collect();
            println!("active: {}", names.join(", "));
        }

        // A session that ended without being asked to has failed
        let failed = self
            .rig
            .session()
            .is_some_and(|s| s.is_finished() && !s.is_stopping());
        if failed {
            if let Some(session) = self.rig.take_session() {
                match session.join() {
                    Ok(summary) => println!("logger ended: {} samples", summary.samples),
                    Err(e) => println!("logger failed: {e}"),
                }
            }
        } else if let Some(session) = self.rig.session().filter(|s| s.is_running()) {
            println!(
                "logging since {} to {}",
                session.started_at().format("%H:%M:%S"),
                session.path().display()
            );
        } else {
            println!("logging: off");
        }

        let buffer = self.rig.buffer();
        match buffer.last() {
            Some(last) => println!(
                "buffer: {} samples, last {} @ {}",
                buffer.len(),
                last.value,
                last.timestamp
            ),
            None => println!("buffer: empty"),
        }
    }

    /// Controller being driven
    pub fn rig(&self) -> &RigController<L> {
        &self.rig
    }
}

/// Blocking stdin reads on a detached thread. The runtime never waits on
/// this thread, so device loss can end the process while a read is pending.
fn spawn_stdin_reader() -> Result<mpsc::Receiver<io::Result<String>>> {
    let (tx, rx) = mpsc::channel(16);
    thread::Builder::new()
        .name("biorig-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
            debug!("stdin closed");
        })?;
    Ok(rx)
}

async fn device_lost(presence: &mut Option<watch::Receiver<PresenceState>>) {
    match presence {
        Some(rx) => {
            // A dropped sender also means the monitor has finished
            let _ = rx.wait_for(|s| *s == PresenceState::Absent).await;
        }
        None => std::future::pending().await,
    }
}
