//! Simulated rig
//!
//! An in-process stand-in for the rig's microcontroller, for bench testing
//! without hardware. It speaks the same wire protocol: `"<code>,<param>"`
//! commands in, status text and `"<millis>,<value>"` data rows out.
//!
//! Acquisition emits one row every `param` seconds as a slow random walk
//! around mid-rail. Self-test emits uniform random values at 10 Hz.
//! Stimulation superimposes a 1 Hz sine scaled by its amplitude.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::command::{Mode, DELIMITER};
use crate::link::{ChannelLink, CommunicationChannel, DEFAULT_TIMEOUT_MS};

/// Row period while self-test is on
pub const SELF_TEST_PERIOD: Duration = Duration::from_millis(100);

/// Supply rail of the simulated ADC in volts
const RAIL_VOLTS: f64 = 3.3;

#[derive(Debug, Clone, Copy)]
struct Stream {
    period: Duration,
    due: Instant,
}

impl Stream {
    fn starting(period: Duration, now: Instant) -> Self {
        Self {
            period,
            due: now + period,
        }
    }
}

/// Pops the next due emission time and schedules the one after it
fn take_due(stream: &mut Option<Stream>, now: Instant) -> Option<Instant> {
    let s = stream.as_mut()?;
    if s.due > now {
        return None;
    }
    let at = s.due;
    s.due += s.period;
    Some(at)
}

struct RigState {
    booted: Instant,
    rng: StdRng,
    acquisition: Option<Stream>,
    self_test: Option<Stream>,
    stimulation: Option<f64>,
    electrode_powered: bool,
    level: f64,
    outbox: VecDeque<u8>,
    received: Vec<String>,
}

impl RigState {
    fn new(rng: StdRng) -> Self {
        Self {
            booted: Instant::now(),
            rng,
            acquisition: None,
            self_test: None,
            stimulation: None,
            electrode_powered: false,
            level: RAIL_VOLTS / 2.0,
            outbox: VecDeque::new(),
            received: Vec::new(),
        }
    }

    fn push_line(&mut self, line: &str) {
        self.outbox.extend(line.as_bytes());
        self.outbox.extend(b"\r\n");
    }

    fn push_sample(&mut self, at: Instant, value: f64) {
        let millis = at.duration_since(self.booted).as_millis();
        self.push_line(&format!("{millis}{DELIMITER}{value:.3}"));
    }

    fn next_level(&mut self, at: Instant) -> f64 {
        self.level = (self.level + self.rng.gen_range(-0.05..=0.05)).clamp(0.0, RAIL_VOLTS);
        let stim = self.stimulation.map_or(0.0, |amplitude| {
            let t = at.duration_since(self.booted).as_secs_f64();
            0.1 * amplitude * (TAU * t).sin()
        });
        (self.level + stim).clamp(0.0, RAIL_VOLTS)
    }

    fn emit_due(&mut self, now: Instant) {
        while let Some(at) = take_due(&mut self.acquisition, now) {
            let value = self.next_level(at);
            self.push_sample(at, value);
        }
        while let Some(at) = take_due(&mut self.self_test, now) {
            let value = self.rng.gen_range(0.0..1.0);
            self.push_sample(at, value);
        }
    }

    fn next_due(&self) -> Option<Instant> {
        [self.acquisition, self.self_test]
            .into_iter()
            .flatten()
            .map(|s| s.due)
            .min()
    }

    fn handle_command(&mut self, text: &str, now: Instant) {
        self.received.push(text.to_string());

        let Some((code, param)) = text.split_once(DELIMITER) else {
            self.push_line(&format!("Unknown command: {text}"));
            return;
        };
        let Some(mode) = code.trim().parse::<u8>().ok().and_then(Mode::from_code) else {
            self.push_line(&format!("Unknown mode: {}", code.trim()));
            return;
        };
        let Some(value) = param.trim().parse::<f64>().ok().filter(|v| v.is_finite()) else {
            self.push_line(&format!("Invalid parameter: {}", param.trim()));
            return;
        };

        let enabled = value > 0.0;
        match mode {
            Mode::Acquisition => {
                self.acquisition = enabled.then(|| {
                    let period = Duration::from_secs_f64(value.min(3600.0));
                    Stream::starting(period.max(Duration::from_millis(1)), now)
                });
            }
            Mode::SelfTest => {
                self.self_test = enabled.then(|| Stream::starting(SELF_TEST_PERIOD, now));
            }
            Mode::Stimulation => self.stimulation = enabled.then_some(value),
            Mode::ElectrodePower => self.electrode_powered = enabled,
        }
        debug!(%mode, enabled, param = value, "simulated rig command");
        self.push_line(mode.status_message(enabled));
    }
}

/// A fake rig behind the [`CommunicationChannel`] interface.
///
/// Clones share one device, so a writer and a reader can run on different
/// threads exactly as they do with a real port.
pub struct SimulatedRig {
    shared: Arc<(Mutex<RigState>, Condvar)>,
    timeout: Duration,
}

impl Default for SimulatedRig {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRig {
    /// Create a rig with an entropy-seeded generator
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Create a rig whose values are reproducible
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            shared: Arc::new((Mutex::new(RigState::new(rng)), Condvar::new())),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Wrap in a [`ChannelLink`]
    pub fn into_link(self) -> ChannelLink {
        ChannelLink::new(Box::new(self))
    }

    /// Commands received so far, in order, without terminators
    pub fn received(&self) -> Vec<String> {
        self.state().received.clone()
    }

    /// Whether a mode is currently switched on
    pub fn is_enabled(&self, mode: Mode) -> bool {
        let state = self.state();
        match mode {
            Mode::Acquisition => state.acquisition.is_some(),
            Mode::SelfTest => state.self_test.is_some(),
            Mode::Stimulation => state.stimulation.is_some(),
            Mode::ElectrodePower => state.electrode_powered,
        }
    }

    fn state(&self) -> MutexGuard<'_, RigState> {
        self.shared.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Read for SimulatedRig {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let deadline = Instant::now() + self.timeout;
        let (lock, ready) = &*self.shared;
        let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);

        loop {
            let now = Instant::now();
            state.emit_due(now);

            if !state.outbox.is_empty() {
                let n = buf.len().min(state.outbox.len());
                for (dst, src) in buf.iter_mut().zip(state.outbox.drain(..n)) {
                    *dst = src;
                }
                return Ok(n);
            }
            if now >= deadline {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "simulated rig read timed out",
                ));
            }

            let wake = state.next_due().map_or(deadline, |due| due.min(deadline));
            state = ready
                .wait_timeout(state, wake.saturating_duration_since(now))
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

impl Write for SimulatedRig {
    /// Each write carries whole commands; `\r`/`\n` separate several.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        let now = Instant::now();
        {
            let mut state = self.state();
            for command in text.split(['\r', '\n']).filter(|c| !c.trim().is_empty()) {
                state.handle_command(command.trim(), now);
            }
        }
        self.shared.1.notify_all();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CommunicationChannel for SimulatedRig {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.state().outbox.clear();
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Box<dyn CommunicationChannel>> {
        Ok(Box::new(SimulatedRig {
            shared: Arc::clone(&self.shared),
            timeout: self.timeout,
        }))
    }
}
