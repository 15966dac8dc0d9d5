//! Scriptable in-memory front-end driver.
//!
//! Used by the CLI for dry runs and by the tests. Every hardware command is
//! appended to a journal so callers can check exactly what would have been
//! sent to the device.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use dvbfe_params::{DeliverySystem, DiseqcCommand};

use super::{
    DriverError, FrontendDriver, FrontendEvent, PowerLimitingMode, ReadinessSender, StatusFlags,
    Tone, Toneburst, TuneRequest, Voltage,
};

/// A hardware command recorded by [`SimulatedDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCommand {
    Open,
    Close,
    SetVoltage(Voltage),
    SetTone(Tone),
    SendDiseqc(DiseqcCommand),
    SendToneburst(Toneburst),
    SetFrontend(TuneRequest),
    SetPowerLimiting(PowerLimitingMode),
}

impl DriverCommand {
    fn name(&self) -> &'static str {
        match self {
            DriverCommand::Open => "open",
            DriverCommand::Close => "close",
            DriverCommand::SetVoltage(_) => "set_voltage",
            DriverCommand::SetTone(_) => "set_tone",
            DriverCommand::SendDiseqc(_) => "send_diseqc",
            DriverCommand::SendToneburst(_) => "send_toneburst",
            DriverCommand::SetFrontend(_) => "set_frontend",
            DriverCommand::SetPowerLimiting(_) => "set_power_limiting",
        }
    }
}

/// Static behaviour of a simulated front-end.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct SimulatedDriverConfig {
    pub delivery_systems: Vec<DeliverySystem>,
    /// Status polls after `set_frontend` until lock, `None` never locks.
    pub lock_after_polls: Option<u32>,
    /// Input power reported when no scripted reading is queued.
    pub input_power: i32,
    pub snr: u16,
    pub signal_strength: u16,
    pub ber: u32,
}

impl Default for SimulatedDriverConfig {
    fn default() -> Self {
        Self {
            delivery_systems: vec![DeliverySystem::DvbS, DeliverySystem::DvbS2],
            lock_after_polls: Some(0),
            input_power: 20,
            snr: 0xA000,
            signal_strength: 0xC000,
            ber: 0,
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    open: bool,
    journal: Vec<DriverCommand>,
    events: VecDeque<FrontendEvent>,
    locked: bool,
    polls_since_tune: u32,
    tuned: Option<TuneRequest>,
    input_power_script: VecDeque<i32>,
    snr_script: VecDeque<u16>,
    fail_next: Option<&'static str>,
    readiness: Option<ReadinessSender>,
}

/// In-memory driver; cheap to clone through [`SimulatedHandle`].
pub struct SimulatedDriver {
    config: SimulatedDriverConfig,
    state: Arc<Mutex<SimState>>,
}

/// Test/CLI handle sharing state with a boxed [`SimulatedDriver`].
#[derive(Clone)]
pub struct SimulatedHandle {
    state: Arc<Mutex<SimState>>,
}

fn guard(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SimState {
    fn push_event(&mut self, event: FrontendEvent) {
        self.events.push_back(event);
        if let Some(tx) = &self.readiness {
            let _ = tx.send(());
        }
    }
}

impl SimulatedDriver {
    pub fn new(config: SimulatedDriverConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    pub fn handle(&self) -> SimulatedHandle {
        SimulatedHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn record(&mut self, command: DriverCommand) -> Result<(), DriverError> {
        let mut state = guard(&self.state);
        if !state.open && command != DriverCommand::Open {
            return Err(DriverError::NotOpen);
        }
        if state.fail_next == Some(command.name()) {
            state.fail_next = None;
            return Err(DriverError::Rejected(format!("{} refused", command.name())));
        }
        debug!("simulated driver: {:?}", command);
        state.journal.push(command);
        Ok(())
    }
}

impl FrontendDriver for SimulatedDriver {
    fn open(&mut self) -> Result<(), DriverError> {
        self.record(DriverCommand::Open)?;
        guard(&self.state).open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.record(DriverCommand::Close)?;
        let mut state = guard(&self.state);
        state.open = false;
        state.locked = false;
        state.events.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        guard(&self.state).open
    }

    fn delivery_systems(&self) -> Vec<DeliverySystem> {
        self.config.delivery_systems.clone()
    }

    fn set_voltage(&mut self, voltage: Voltage) -> Result<(), DriverError> {
        self.record(DriverCommand::SetVoltage(voltage))
    }

    fn set_tone(&mut self, tone: Tone) -> Result<(), DriverError> {
        self.record(DriverCommand::SetTone(tone))
    }

    fn send_diseqc(&mut self, command: &DiseqcCommand) -> Result<(), DriverError> {
        self.record(DriverCommand::SendDiseqc(*command))
    }

    fn send_toneburst(&mut self, burst: Toneburst) -> Result<(), DriverError> {
        self.record(DriverCommand::SendToneburst(burst))
    }

    fn set_frontend(&mut self, request: &TuneRequest) -> Result<(), DriverError> {
        self.record(DriverCommand::SetFrontend(*request))?;
        let mut state = guard(&self.state);
        state.tuned = Some(*request);
        state.polls_since_tune = 0;
        state.locked = self.config.lock_after_polls == Some(0);
        if state.locked {
            state.push_event(FrontendEvent {
                has_lock: true,
                timed_out: false,
            });
        }
        Ok(())
    }

    fn set_power_limiting(&mut self, mode: PowerLimitingMode) -> Result<(), DriverError> {
        self.record(DriverCommand::SetPowerLimiting(mode))
    }

    fn poll_event(&mut self) -> Result<Option<FrontendEvent>, DriverError> {
        Ok(guard(&self.state).events.pop_front())
    }

    fn read_status(&mut self) -> Result<StatusFlags, DriverError> {
        let mut state = guard(&self.state);
        if state.tuned.is_some() && !state.locked {
            state.polls_since_tune += 1;
            if let Some(after) = self.config.lock_after_polls {
                if state.polls_since_tune >= after {
                    state.locked = true;
                    state.push_event(FrontendEvent {
                        has_lock: true,
                        timed_out: false,
                    });
                }
            }
        }
        Ok(StatusFlags {
            locked: state.locked,
            synced: state.locked,
        })
    }

    fn read_snr(&mut self) -> Result<u16, DriverError> {
        let mut state = guard(&self.state);
        Ok(state.snr_script.pop_front().unwrap_or(self.config.snr))
    }

    fn read_ber(&mut self) -> Result<u32, DriverError> {
        Ok(self.config.ber)
    }

    fn read_signal_strength(&mut self) -> Result<u16, DriverError> {
        Ok(self.config.signal_strength)
    }

    fn read_input_power(&mut self) -> Result<i32, DriverError> {
        let mut state = guard(&self.state);
        Ok(state
            .input_power_script
            .pop_front()
            .unwrap_or(self.config.input_power))
    }

    fn get_frontend(&mut self) -> Result<TuneRequest, DriverError> {
        guard(&self.state)
            .tuned
            .ok_or_else(|| DriverError::Unsupported("no parameters programmed".into()))
    }

    fn attach_readiness(&mut self, tx: ReadinessSender) {
        guard(&self.state).readiness = Some(tx);
    }
}

impl SimulatedHandle {
    /// Hardware commands issued so far.
    pub fn journal(&self) -> Vec<DriverCommand> {
        guard(&self.state).journal.clone()
    }

    pub fn clear_journal(&self) {
        guard(&self.state).journal.clear();
    }

    /// Queue an event and signal readiness.
    pub fn push_event(&self, event: FrontendEvent) {
        guard(&self.state).push_event(event);
    }

    /// Force the lock bit, e.g. to simulate a signal loss.
    pub fn set_locked(&self, locked: bool) {
        guard(&self.state).locked = locked;
    }

    /// Queue input power readings returned before the configured default.
    pub fn script_input_power(&self, readings: impl IntoIterator<Item = i32>) {
        guard(&self.state).input_power_script.extend(readings);
    }

    pub fn script_snr(&self, readings: impl IntoIterator<Item = u16>) {
        guard(&self.state).snr_script.extend(readings);
    }

    /// Make the next command with this name fail with `Rejected`.
    pub fn fail_next(&self, command: &'static str) {
        guard(&self.state).fail_next = Some(command);
    }

    pub fn is_open(&self) -> bool {
        guard(&self.state).open
    }
}
