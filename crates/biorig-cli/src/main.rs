//! biorig - terminal control panel for the serial bioelectronics rig

mod console;
mod panel;

use anyhow::{bail, Context, Result};
use biorig_core::command::{CommandDispatcher, Mode};
use biorig_core::config::{RigConfig, CONFIG_FILE};
use biorig_core::controller::RigController;
use biorig_core::link::{list_ports, ChannelLink, CommunicationChannel, PortInfo};
use biorig_core::presence::{PresenceMonitor, SystemEnumerator};
use biorig_core::sim::SimulatedRig;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::panel::Panel;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Serial port, overriding the configuration
    #[arg(long, global = true)]
    port: Option<String>,

    /// Baud rate, overriding the configuration
    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Directory for session CSV files and plots
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Talk to a simulated rig instead of a serial port
    #[arg(long, global = true, default_value_t = false)]
    simulate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List serial ports
    Ports,
    /// Send a single command and exit
    Send {
        /// acquisition, stimulation, electrode or self-test
        mode: Mode,
        /// Switch the mode on or off
        #[arg(value_enum)]
        switch: Switch,
        /// Parameter for "on"; the mode default when omitted
        parameter: Option<String>,
    },
    /// Interactive control panel
    Run {
        /// Exit when the device disappears
        #[arg(long, default_value_t = false)]
        watch: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Switch {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "biorig=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Ports => print_ports(),
        Commands::Send {
            mode,
            switch,
            parameter,
        } => {
            let mut link = open_link(&config, cli.simulate)?;
            let dispatcher = CommandDispatcher::new(config.commands.line_ending);
            let sent = dispatcher.send(&mut link, mode, switch == Switch::On, parameter.as_deref())?;
            println!("{} (sent {sent})", mode.status_message(sent.enabled));
            Ok(())
        }
        Commands::Run { watch } => {
            let mut config = config;
            config.presence.enabled |= watch;
            run_panel(config, cli.simulate).await
        }
    }
}

fn load_config(cli: &Cli) -> Result<RigConfig> {
    let mut config = RigConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if let Some(port) = &cli.port {
        config.link.port = Some(port.clone());
    }
    if let Some(baud) = cli.baud {
        config.link.baud_rate = baud;
    }
    if let Some(dir) = &cli.output_dir {
        config.logging.output_dir = dir.clone();
    }
    Ok(config)
}

fn print_ports() -> Result<()> {
    let ports = list_ports();
    if ports.is_empty() {
        println!("no serial ports found");
    }
    for port in ports {
        println!("{}", describe_port(&port));
    }
    Ok(())
}

fn describe_port(port: &PortInfo) -> String {
    let mut line = port.name.clone();
    if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
        line.push_str(&format!("  {vid:04x}:{pid:04x}"));
    }
    if let Some(product) = port.product.as_ref().or(port.manufacturer.as_ref()) {
        line.push_str(&format!("  {product}"));
    }
    line
}

/// Pick the configured port, or the first enumerated one
fn resolve_port(config: &RigConfig) -> Result<String> {
    if let Some(port) = &config.link.port {
        return Ok(port.clone());
    }
    match list_ports().into_iter().next() {
        Some(port) => {
            warn!(port = %port.name, "no port configured, using the first one found");
            Ok(port.name)
        }
        None => bail!("no serial device found; connect the rig or pass --port"),
    }
}

fn open_link(config: &RigConfig, simulate: bool) -> Result<ChannelLink> {
    if simulate {
        let mut rig = SimulatedRig::new();
        rig.set_timeout(config.link.timeout())?;
        info!("using simulated rig");
        return Ok(rig.into_link());
    }

    let port = resolve_port(config)?;
    ChannelLink::open(&port, &config.link).with_context(|| format!("opening {port}"))
}

async fn run_panel(mut config: RigConfig, simulate: bool) -> Result<()> {
    if !simulate && config.link.port.is_none() {
        config.link.port = Some(resolve_port(&config)?);
    }
    let link = open_link(&config, simulate)?;

    let presence = match config.presence_identity() {
        Some(identity) if config.presence.enabled && !simulate => {
            if !identity.check_present(&SystemEnumerator) {
                bail!("device {identity} not found");
            }
            let monitor = PresenceMonitor::new(SystemEnumerator, identity, config.presence.interval());
            let (state, _task) = monitor.spawn();
            Some(state)
        }
        _ => None,
    };

    let rig = RigController::new(link, &config);
    Panel::new(rig, &config).run(presence).await
}
