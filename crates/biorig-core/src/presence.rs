//! Device presence monitoring
//!
//! Polls the OS serial-device list and reports when the rig disappears.
//! Absent is terminal: once the device is gone the monitor stops.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::link::{list_ports, PortInfo};

/// Default poll interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// How to recognise the rig among enumerated ports.
///
/// Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceIdentity {
    /// Port name, e.g. "COM4" or "/dev/ttyACM0"
    pub port: Option<String>,
    /// USB vendor ID
    pub vid: Option<u16>,
    /// USB product ID
    pub pid: Option<u16>,
    /// USB serial number
    pub serial_number: Option<String>,
}

impl DeviceIdentity {
    /// Match by port name only
    pub fn port(name: impl Into<String>) -> Self {
        Self {
            port: Some(name.into()),
            ..Self::default()
        }
    }

    /// Match by USB vendor/product ID
    pub fn usb(vid: u16, pid: u16) -> Self {
        Self {
            vid: Some(vid),
            pid: Some(pid),
            ..Self::default()
        }
    }

    /// Whether `info` describes this device
    pub fn matches(&self, info: &PortInfo) -> bool {
        fn field<T: PartialEq>(want: &Option<T>, have: &Option<T>) -> bool {
            want.as_ref().map_or(true, |w| have.as_ref() == Some(w))
        }

        self.port.as_ref().map_or(true, |p| *p == info.name)
            && field(&self.vid, &info.vid)
            && field(&self.pid, &info.pid)
            && field(&self.serial_number, &info.serial_number)
    }

    /// First port matching this identity
    pub fn find_in<'a>(&self, ports: &'a [PortInfo]) -> Option<&'a PortInfo> {
        ports.iter().find(|p| self.matches(p))
    }

    /// One-shot check, used at startup
    pub fn check_present<E: DeviceEnumerator + ?Sized>(&self, enumerator: &E) -> bool {
        self.find_in(&enumerator.devices()).is_some()
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(port) = &self.port {
            parts.push(port.clone());
        }
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => parts.push(format!("{vid:04x}:{pid:04x}")),
            (Some(vid), None) => parts.push(format!("{vid:04x}:*")),
            (None, Some(pid)) => parts.push(format!("*:{pid:04x}")),
            (None, None) => {}
        }
        if let Some(sn) = &self.serial_number {
            parts.push(format!("sn={sn}"));
        }
        if parts.is_empty() {
            f.write_str("any device")
        } else {
            f.write_str(&parts.join(" "))
        }
    }
}

/// Source of the currently connected serial devices
pub trait DeviceEnumerator: Send + Sync {
    /// Currently enumerated devices; an enumeration failure yields an empty list
    fn devices(&self) -> Vec<PortInfo>;
}

/// Enumerates through the OS
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnumerator;

impl DeviceEnumerator for SystemEnumerator {
    fn devices(&self) -> Vec<PortInfo> {
        list_ports()
    }
}

impl<F> DeviceEnumerator for F
where
    F: Fn() -> Vec<PortInfo> + Send + Sync,
{
    fn devices(&self) -> Vec<PortInfo> {
        self()
    }
}

/// Whether the rig is connected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    /// Still enumerated
    Present,
    /// Gone; terminal
    Absent,
}

/// Polls an enumerator until the device disappears
pub struct PresenceMonitor<E> {
    enumerator: E,
    identity: DeviceIdentity,
    interval: Duration,
}

impl<E: DeviceEnumerator + 'static> PresenceMonitor<E> {
    /// Create a monitor polling every `interval`
    pub fn new(enumerator: E, identity: DeviceIdentity, interval: Duration) -> Self {
        Self {
            enumerator,
            identity,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Identity being watched
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Single poll
    pub fn poll(&self) -> PresenceState {
        if self.identity.check_present(&self.enumerator) {
            PresenceState::Present
        } else {
            PresenceState::Absent
        }
    }

    /// Poll until the device is absent
    pub async fn run(self) -> PresenceState {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(identity = %self.identity, interval = ?self.interval, "presence monitor started");
        loop {
            ticker.tick().await;
            if self.poll() == PresenceState::Absent {
                warn!(identity = %self.identity, "device disappeared");
                return PresenceState::Absent;
            }
        }
    }

    /// Run on the tokio runtime, publishing the state on a watch channel
    pub fn spawn(self) -> (watch::Receiver<PresenceState>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(PresenceState::Present);
        let handle = tokio::spawn(async move {
            let state = self.run().await;
            let _ = tx.send(state);
        });
        (rx, handle)
    }
}
