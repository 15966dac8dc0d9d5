//! SEC program interpreter.
//!
//! One instruction is executed per [`FrontendGroup::tick`]. Line commands
//! (voltage, tone, DiSEqC, input power) act on the sec front-end of the
//! chain; `SetFrontend` and lock polling act on the ticking front-end.

use std::time::Duration;

use log::{debug, error, warn};

use super::FrontendGroup;
use crate::error::{EngineError, Result};
use crate::frontend::{DataSlot, FrontendId, FrontendState, Tick, TimerRequest};
use crate::sec::{
    RotorDirection, SecCommand, LOCK_CONFIRMATIONS, LOCK_SIGNAL_TOLERANCE, ROTOR_CONFIRMATIONS,
};

/// Instruction limit for simulated programs without a configured tick limit.
const SIMULATE_STEP_LIMIT: u32 = 10_000;

/// `[SEC]` trace, silent for simulated front-ends.
macro_rules! sec_debug {
    ($simulate:expr, $($arg:tt)+) => {
        if !$simulate {
            debug!($($arg)+);
        }
    };
}

impl FrontendGroup {
    /// Execute the next instruction of the program of `id`.
    ///
    /// Schedules the following tick through a [`TimerRequest`]. A failing
    /// device command aborts the program and leaves the front-end `Failed`.
    pub fn tick(&mut self, id: FrontendId) -> Result<Tick> {
        let i = self.index(id)?;
        let root = self.sec_root_index(i);

        // a dependent may run while its sec front-end is closed
        let reopen = root != i
            && self.links[root].in_use == 0
            && self.frontends[root].state == FrontendState::Closed;
        let result = if reopen {
            match self.acquire_index(root) {
                Ok(()) => {
                    let result = self.step(i);
                    self.release_index(root);
                    result
                }
                Err(e) => Err(e),
            }
        } else {
            self.step(i)
        };

        match result {
            Ok(Tick::Continue(delay)) => {
                self.frontends[i].push_timer(TimerRequest::Tick(delay));
                Ok(Tick::Continue(delay))
            }
            Ok(Tick::Finished) => {
                self.frontends[i].push_timer(TimerRequest::StopTick);
                Ok(Tick::Finished)
            }
            Err(e) => Err(self.abort_program(i, e)),
        }
    }

    /// Drop the program of a front-end and mark it `Failed`.
    pub(crate) fn abort_program(&mut self, index: usize, reason: EngineError) -> EngineError {
        error!("{}: SEC program aborted: {}", FrontendId(index), reason);
        let fe = &mut self.frontends[index];
        fe.sequence.clear();
        fe.tuning = 0;
        fe.push_timer(TimerRequest::StopTick);
        fe.push_timer(TimerRequest::DisarmDeadline);
        self.set_state(index, FrontendState::Failed);
        reason
    }

    /// Run a simulated program to its end in one go.
    pub(crate) fn run_to_completion(&mut self, index: usize) -> Result<()> {
        let limit = self.tick_limit.unwrap_or(SIMULATE_STEP_LIMIT);
        for _ in 0..limit {
            match self.step(index) {
                Ok(Tick::Finished) => return Ok(()),
                Ok(Tick::Continue(_)) => {}
                Err(e) => return Err(self.abort_program(index, e)),
            }
        }
        warn!(
            "{}: simulated program did not finish within {} instructions",
            FrontendId(index),
            limit
        );
        Err(self.abort_program(index, EngineError::LockTimeout))
    }

    fn advance(&mut self, index: usize) {
        self.frontends[index].sequence.advance();
    }

    /// Jump when `condition` holds and the jump moves the cursor, else advance.
    fn branch(&mut self, index: usize, condition: bool, steps: i32) {
        let taken = condition && self.frontends[index].sequence.jump(steps);
        if !taken {
            self.advance(index);
        }
    }

    fn write_back(&mut self, index: usize, command: SecCommand) {
        if let Some(slot) = self.frontends[index].sequence.current_mut() {
            *slot = command;
        }
    }

    /// One poll of a counted gate: the timeout counter drops and an expired
    /// counter consumes one retry.
    fn count_poll(&mut self, index: usize) {
        let fe = &mut self.frontends[index];
        fe.timeout_count -= 1;
        if fe.timeout_count == 0 && fe.retry_count > 0 {
            fe.retry_count -= 1;
        }
    }

    fn read_input_power(&mut self, target: usize, simulate: bool) -> i32 {
        if simulate {
            return 0;
        }
        self.drivers[target].read_input_power().unwrap_or_else(|e| {
            warn!("{}: input power read failed: {}", FrontendId(target), e);
            0
        })
    }

    fn read_locked(&mut self, index: usize) -> bool {
        match self.drivers[index].read_status() {
            Ok(flags) => flags.locked,
            Err(e) => {
                warn!("{}: status read failed: {}", FrontendId(index), e);
                false
            }
        }
    }

    /// Signal reading compared by the lock gate: calibrated centi-dB when a
    /// curve is known, the raw SNR otherwise.
    fn lock_signal(&mut self, index: usize) -> i32 {
        let raw = self.drivers[index].read_snr().unwrap_or_else(|e| {
            warn!("{}: snr read failed: {}", FrontendId(index), e);
            0
        });
        match &self.frontends[index].calibration {
            Some(curve) => curve.centi_db(raw),
            None => raw as i32,
        }
    }

    fn step(&mut self, i: usize) -> Result<Tick> {
        let simulate = self.frontends[i].is_simulated();
        let Some(command) = self.frontends[i].sequence.current().cloned() else {
            return Ok(Tick::Finished);
        };
        let root = self.sec_root_index(i);
        let slot = self.frontends[i].info.slot;
        let mut delay = 0;

        match command {
            SecCommand::Sleep(ms) => {
                delay = ms;
                sec_debug!(simulate, "[SEC] sleep {}ms", ms);
                self.advance(i);
            }
            SecCommand::Goto(steps) => {
                self.branch(i, true, steps);
            }
            SecCommand::SetVoltage(voltage) => {
                sec_debug!(simulate, "[SEC] setVoltage {:?}", voltage);
                self.set_voltage_on(root, voltage, simulate)?;
                self.advance(i);
            }
            SecCommand::SetTone(tone) => {
                sec_debug!(simulate, "[SEC] setTone {:?}", tone);
                self.set_tone_on(root, tone, simulate)?;
                self.advance(i);
            }
            SecCommand::SendDiseqc(message) => {
                sec_debug!(simulate, "[SEC] sendDiseqc: {}", message);
                if !simulate {
                    self.drivers[root]
                        .send_diseqc(&message)
                        .map_err(|e| EngineError::device("send_diseqc", e))?;
                }
                self.advance(i);
            }
            SecCommand::SendToneburst(burst) => {
                sec_debug!(simulate, "[SEC] sendToneburst {:?}", burst);
                if !simulate {
                    self.drivers[root]
                        .send_toneburst(burst)
                        .map_err(|e| EngineError::device("send_toneburst", e))?;
                }
                self.advance(i);
            }
            SecCommand::SetFrontend { events } => {
                sec_debug!(simulate, "[SEC] setFrontend events {}", events);
                self.apply_frontend(i, events, simulate)?;
                self.advance(i);
            }
            SecCommand::StartTuneTimeout(ms) => {
                sec_debug!(simulate, "[SEC] startTuneTimeout {}ms", ms);
                if !simulate {
                    self.frontends[i]
                        .push_timer(TimerRequest::ArmDeadline(Duration::from_millis(ms as u64)));
                }
                self.advance(i);
            }
            SecCommand::SetTimeoutCounter(count) => {
                sec_debug!(simulate, "[SEC] set timeout counter {}", count);
                self.frontends[i].timeout_count = count;
                self.advance(i);
            }
            SecCommand::IfVoltageGoto { voltage, steps } => {
                let hit = self.data[root].get(DataSlot::CurVoltage) == voltage.code();
                self.branch(i, hit, steps);
            }
            SecCommand::IfNotVoltageGoto { voltage, steps } => {
                let hit = self.data[root].get(DataSlot::CurVoltage) != voltage.code();
                self.branch(i, hit, steps);
            }
            SecCommand::IfToneGoto { tone, steps } => {
                let hit = self.data[root].get(DataSlot::CurTone) == tone.code();
                self.branch(i, hit, steps);
            }
            SecCommand::IfNotToneGoto { tone, steps } => {
                let hit = self.data[root].get(DataSlot::CurTone) != tone.code();
                self.branch(i, hit, steps);
            }
            SecCommand::IfTimeoutGoto(steps) => {
                let expired = self.frontends[i].timeout_count == 0;
                if expired {
                    sec_debug!(simulate, "[SEC] rotor timeout");
                }
                self.branch(i, expired, steps);
            }
            SecCommand::IfNoMoreRetriesGoto(steps) => {
                let exhausted = self.frontends[i].retry_count == 0;
                if exhausted {
                    sec_debug!(simulate, "[SEC] no more rotor retries");
                }
                self.branch(i, exhausted, steps);
            }
            SecCommand::IfRotorPosValidGoto(steps) => {
                let data = &self.data[root];
                let valid = data.is_set(DataSlot::RotorCmd) && data.is_set(DataSlot::RotorPos);
                self.branch(i, valid, steps);
            }
            SecCommand::MeasureIdleInputPower(idx) => {
                if idx < 2 {
                    let power = self.read_input_power(root, simulate);
                    self.frontends[i].idle_input_power[idx as usize] = power;
                    sec_debug!(simulate, "[SEC] idleInputpower[{}] is {}", idx, power);
                } else {
                    sec_debug!(simulate, "[SEC] idleInputpower measure index {} out of bound", idx);
                }
                self.advance(i);
            }
            SecCommand::IfMeasureIdleFailedGoto { slot: idx, steps } => {
                let mut failed = false;
                if !simulate && idx < 2 {
                    let now = self.read_input_power(root, simulate);
                    let idle = self.frontends[i].idle_input_power[idx as usize];
                    let diff = (now - idle).abs();
                    if diff > 0 {
                        sec_debug!(
                            simulate,
                            "[SEC] measure idle({}) was not okay ({} - {} = {}), retry",
                            idx,
                            idle,
                            now,
                            diff
                        );
                        failed = true;
                    }
                }
                self.branch(i, failed, steps);
            }
            SecCommand::MeasureRunningInputPower => {
                let power = self.read_input_power(root, simulate);
                self.frontends[i].running_input_power = power;
                sec_debug!(simulate, "[SEC] runningInputpower is {}", power);
                self.advance(i);
            }
            SecCommand::IfInputpowerDeltaGoto(mut gate) => {
                if simulate {
                    self.branch(i, true, gate.steps);
                    return Ok(Tick::Continue(Duration::ZERO));
                }
                let idx = if self.data[root].get(DataSlot::CurVoltage) & 1 == 1 { 0 } else { 1 };
                let idle = self.frontends[i].idle_input_power[idx];
                let running = self.frontends[i].running_input_power;
                self.count_poll(i);

                let diff = (running - idle).abs();
                let ok = match gate.direction {
                    RotorDirection::Running => diff >= gate.delta,
                    RotorDirection::Stopped => diff <= gate.delta,
                };
                sec_debug!(
                    simulate,
                    "[SEC] waiting for rotor {}: {} - {} = {} (delta {}) {}",
                    gate.direction.label(),
                    running,
                    idle,
                    diff,
                    gate.delta,
                    if ok { "ok" } else { "not ok" }
                );
                if ok {
                    gate.okcount += 1;
                    if gate.okcount > ROTOR_CONFIRMATIONS {
                        gate.okcount = 0;
                        self.write_back(i, SecCommand::IfInputpowerDeltaGoto(gate));
                        if self.frontends[i].sequence.jump(gate.steps) {
                            sec_debug!(simulate, "[SEC] rotor {}", gate.direction.label());
                            return Ok(Tick::Continue(Duration::ZERO));
                        }
                    }
                } else {
                    gate.okcount = 0;
                }
                self.write_back(i, SecCommand::IfInputpowerDeltaGoto(gate));
                self.advance(i);
            }
            SecCommand::IfTunerLockedGoto(mut gate) => {
                if simulate {
                    self.branch(i, true, gate.steps);
                    return Ok(Tick::Continue(Duration::ZERO));
                }
                let locked = self.read_locked(i);
                self.frontends[i].idle_input_power = [0; 2];
                self.count_poll(i);

                let signal = self.lock_signal(i);
                let stable = gate
                    .baseline
                    .map_or(true, |base| (signal - base).abs() < LOCK_SIGNAL_TOLERANCE);
                if locked && stable {
                    if gate.okcount == 0 {
                        gate.baseline = Some(signal);
                    }
                    gate.okcount += 1;
                    sec_debug!(
                        simulate,
                        "[SEC] locked, signal {} (poll {})",
                        signal,
                        gate.okcount
                    );
                    if gate.okcount > LOCK_CONFIRMATIONS {
                        gate.okcount = 0;
                        gate.baseline = None;
                        self.write_back(i, SecCommand::IfTunerLockedGoto(gate));
                        if self.frontends[i].sequence.jump(gate.steps) {
                            sec_debug!(simulate, "[SEC] lock confirmed, goto {}", gate.steps);
                            self.set_state(i, FrontendState::Locked);
                            self.frontends[i].tuning = 0;
                            self.drain_events(i, true);
                            self.frontends[i].events_enabled = true;
                            return Ok(Tick::Continue(Duration::ZERO));
                        }
                    }
                } else {
                    sec_debug!(simulate, "[SEC] rotor locked step failed (signal {})", signal);
                    gate.okcount = 0;
                    gate.baseline = None;
                }
                self.write_back(i, SecCommand::IfTunerLockedGoto(gate));
                self.advance(i);
            }
            SecCommand::InvalidateCurrentSwitchParams => {
                self.data[root].reset_switch();
                self.advance(i);
            }
            SecCommand::CommitCurrentSwitchParams => {
                self.data[root].commit_switch();
                self.advance(i);
            }
            SecCommand::InvalidateCurrentRotorParams => {
                self.data[root].reset_rotor();
                self.advance(i);
            }
            SecCommand::CommitCurrentRotorParams => {
                self.data[root].commit_rotor();
                sec_debug!(
                    simulate,
                    "[SEC] rotor at {}",
                    self.data[root].get(DataSlot::RotorPos)
                );
                self.advance(i);
            }
            SecCommand::SetRotorRetryBudget(retries) => {
                self.frontends[i].retry_count = retries;
                self.advance(i);
            }
            SecCommand::SetRotorMoving(moving) => {
                if !simulate {
                    if let Some(authority) = self.authority.as_mut() {
                        authority.set_rotor_moving(slot, moving);
                    }
                }
                self.advance(i);
            }
            SecCommand::SetPowerLimitingMode(mode) => {
                sec_debug!(simulate, "[SEC] set {:?} current limiting", mode);
                if !simulate {
                    self.drivers[root]
                        .set_power_limiting(mode)
                        .map_err(|e| EngineError::device("set_power_limiting", e))?;
                }
                self.advance(i);
            }
            SecCommand::DelayedCloseFrontend => {
                sec_debug!(simulate, "[SEC] delayed close frontend");
                if let Err(e) = self.close_index(i, false, true) {
                    warn!("{}: delayed close failed: {}", FrontendId(i), e);
                }
                self.advance(i);
            }
        }

        Ok(Tick::Continue(Duration::from_millis(delay as u64)))
    }

    /// Program the demodulator with the prepared request.
    fn apply_frontend(&mut self, i: usize, events: bool, simulate: bool) -> Result<()> {
        let Some(request) = self.frontends[i].request else {
            return Err(EngineError::InvalidParameters(format!(
                "{}: no tune request prepared",
                FrontendId(i)
            )));
        };
        // stale events of the previous tune
        self.drain_events(i, true);
        if events {
            self.frontends[i].events_enabled = true;
        }
        if !simulate {
            self.drivers[i]
                .set_frontend(&request)
                .map_err(|e| EngineError::device("set_frontend", e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{astra, astra_authority, driver_with, linked_pair, sat_driver};
    use super::*;
    use crate::driver::{DriverCommand, SimulatedDriverConfig, Tone, Voltage};
    use crate::frontend::SlotInfo;
    use crate::sec::SecSequence;
    use dvbfe_params::DiseqcCommand;

    fn single(config: SimulatedDriverConfig) -> (FrontendGroup, crate::driver::SimulatedHandle) {
        let (driver, handle) = driver_with(config);
        let group = FrontendGroup::builder()
            .frontend(SlotInfo::new(0, "Simulated DVB-S2"), driver)
            .authority(astra_authority(vec![0]))
            .build()
            .unwrap();
        (group, handle)
    }

    fn load(group: &mut FrontendGroup, commands: Vec<SecCommand>) {
        group.frontends[0].sequence = SecSequence::from(commands);
        group.frontends[0].request = group.frontends[0]
            .commanded
            .map(|params| crate::driver::TuneRequest {
                frequency: 1_236_000,
                params,
            });
    }

    fn run(group: &mut FrontendGroup, id: FrontendId, max: usize) -> usize {
        for n in 0..max {
            if group.tick(id).unwrap() == Tick::Finished {
                return n;
            }
            group.handle_events(id).unwrap();
        }
        max
    }

    #[test]
    fn test_tune_runs_to_lock() {
        let (mut group, handle) = single(SimulatedDriverConfig::default());
        group.open(FrontendId(0)).unwrap();
        handle.clear_journal();
        group.tune(FrontendId(0), astra()).unwrap();
        run(&mut group, FrontendId(0), 100);

        let fe = group.frontend(FrontendId(0)).unwrap();
        assert_eq!(fe.state(), FrontendState::Locked);
        assert!(fe.sequence().is_finished());

        let journal = handle.journal();
        assert_eq!(journal[0], DriverCommand::SetVoltage(Voltage::V18));
        assert!(journal.contains(&DriverCommand::SendDiseqc(
            DiseqcCommand::from_hex("e01038f3").unwrap()
        )));
        assert!(matches!(journal.last(), Some(DriverCommand::SetFrontend(r)) if r.frequency == 1_236_000));

        let data = group.runtime_data(FrontendId(0)).unwrap();
        assert_eq!(data.get(DataSlot::Csw), 0xF3);
        assert_eq!(data.get(DataSlot::CurTone), Tone::On.code());
    }

    #[test]
    fn test_minimal_program_ends_locked() {
        let (mut group, handle) = single(SimulatedDriverConfig::default());
        group.open(FrontendId(0)).unwrap();
        group.tune(FrontendId(0), astra()).unwrap();
        handle.clear_journal();
        group.take_timer_requests(FrontendId(0)).unwrap();

        load(
            &mut group,
            vec![
                SecCommand::SetVoltage(Voltage::V13),
                SecCommand::SetTone(Tone::On),
                SecCommand::SetFrontend { events: true },
                SecCommand::StartTuneTimeout(5000),
                SecCommand::if_tuner_locked(1),
            ],
        );
        // the lock arrives as a driver event, the gate itself needs five polls
        assert_eq!(run(&mut group, FrontendId(0), 10), 5);

        let fe = group.frontend(FrontendId(0)).unwrap();
        assert_eq!(fe.state(), FrontendState::Locked);
        assert!(fe.sequence().is_finished());
        let journal = handle.journal();
        assert_eq!(journal[0], DriverCommand::SetVoltage(Voltage::V13));
        assert_eq!(journal[1], DriverCommand::SetTone(Tone::On));
        assert!(matches!(journal[2], DriverCommand::SetFrontend(_)));
        assert!(group
            .take_timer_requests(FrontendId(0))
            .unwrap()
            .contains(&TimerRequest::ArmDeadline(Duration::from_millis(5000))));
    }

    #[test]
    fn test_lock_gate_needs_five_polls() {
        let (mut group, _) = single(SimulatedDriverConfig::default());
        group.open(FrontendId(0)).unwrap();
        group.tune(FrontendId(0), astra()).unwrap();
        run(&mut group, FrontendId(0), 100);
        group.set_state(0, FrontendState::Tuning);

        load(
            &mut group,
            vec![
                SecCommand::if_tuner_locked(3),
                SecCommand::Sleep(10),
                SecCommand::Goto(-2),
            ],
        );
        let mut polls = 0;
        while !group.frontends[0].sequence.is_finished() {
            if matches!(group.frontends[0].sequence.current(), Some(SecCommand::IfTunerLockedGoto(_))) {
                polls += 1;
            }
            group.tick(FrontendId(0)).unwrap();
            assert!(polls <= 5);
        }
        assert_eq!(polls, 5);
        assert_eq!(group.frontend(FrontendId(0)).unwrap().state(), FrontendState::Locked);
    }

    #[test]
    fn test_lock_gate_resets_on_signal_jump() {
        let (mut group, handle) = single(SimulatedDriverConfig::default());
        group.open(FrontendId(0)).unwrap();
        group.tune(FrontendId(0), astra()).unwrap();
        run(&mut group, FrontendId(0), 100);

        handle.script_snr([1000, 1010, 2000]);
        load(&mut group, vec![SecCommand::if_tuner_locked(1)]);
        group.tick(FrontendId(0)).unwrap();
        group.frontends[0].sequence.rewind();
        group.tick(FrontendId(0)).unwrap();
        group.frontends[0].sequence.rewind();
        assert!(matches!(
            group.frontends[0].sequence.current(),
            Some(SecCommand::IfTunerLockedGoto(g)) if g.okcount == 2 && g.baseline == Some(1000)
        ));
        group.tick(FrontendId(0)).unwrap();
        group.frontends[0].sequence.rewind();
        assert!(matches!(
            group.frontends[0].sequence.current(),
            Some(SecCommand::IfTunerLockedGoto(g)) if g.okcount == 0 && g.baseline.is_none()
        ));
    }

    #[test]
    fn test_rotor_gate_jumps_on_seventh_poll() {
        let (mut group, handle) = single(SimulatedDriverConfig::default());
        group.open(FrontendId(0)).unwrap();
        group.data[0].set(DataSlot::CurVoltage, Voltage::V13.code());
        handle.script_input_power([20]);
        handle.script_input_power(std::iter::repeat(200).take(7));

        load(
            &mut group,
            vec![
                SecCommand::MeasureIdleInputPower(0),
                SecCommand::SetTimeoutCounter(100),
                SecCommand::MeasureRunningInputPower,
                SecCommand::if_inputpower_delta(RotorDirection::Running, 60, 3),
                SecCommand::Goto(-2),
                SecCommand::Sleep(1),
                SecCommand::SetRotorMoving(true),
            ],
        );
        group.tick(FrontendId(0)).unwrap();
        group.tick(FrontendId(0)).unwrap();

        let mut gate_polls = 0;
        loop {
            let at_gate = matches!(
                group.frontends[0].sequence.current(),
                Some(SecCommand::IfInputpowerDeltaGoto(_))
            );
            group.tick(FrontendId(0)).unwrap();
            if at_gate {
                gate_polls += 1;
                if group.frontends[0].sequence.cursor() == 6 {
                    break;
                }
                assert_eq!(group.frontends[0].sequence.cursor(), 4);
            }
            assert!(gate_polls < 7 || group.frontends[0].sequence.cursor() == 6);
        }
        assert_eq!(gate_polls, 7);
        assert_eq!(group.frontends[0].timeout_count, 93);
    }

    #[test]
    fn test_timeout_consumes_retry() {
        let (mut group, _) = single(SimulatedDriverConfig::default());
        group.open(FrontendId(0)).unwrap();
        group.data[0].set(DataSlot::CurVoltage, Voltage::V13.code());
        load(
            &mut group,
            vec![
                SecCommand::SetRotorRetryBudget(2),
                SecCommand::SetTimeoutCounter(1),
                SecCommand::if_inputpower_delta(RotorDirection::Running, 60, 5),
                SecCommand::IfTimeoutGoto(2),
                SecCommand::Sleep(1),
                SecCommand::IfNoMoreRetriesGoto(2),
                SecCommand::Sleep(1),
            ],
        );
        for _ in 0..4 {
            group.tick(FrontendId(0)).unwrap();
        }
        assert_eq!(group.frontends[0].timeout_count, 0);
        assert_eq!(group.frontends[0].retry_count, 1);
        assert_eq!(group.frontends[0].sequence.cursor(), 5);
        group.tick(FrontendId(0)).unwrap();
        assert_eq!(group.frontends[0].sequence.cursor(), 6);
    }

    #[test]
    fn test_conditional_jumps_read_line_state() {
        let (mut group, handle) = single(SimulatedDriverConfig::default());
        group.open(FrontendId(0)).unwrap();
        handle.clear_journal();
        load(
            &mut group,
            vec![
                SecCommand::IfVoltageGoto {
                    voltage: Voltage::Off,
                    steps: 2,
                },
                SecCommand::SetVoltage(Voltage::V18),
                SecCommand::IfToneGoto {
                    tone: Tone::On,
                    steps: 2,
                },
                SecCommand::SetTone(Tone::On),
                SecCommand::IfRotorPosValidGoto(2),
                SecCommand::Sleep(5),
            ],
        );
        run(&mut group, FrontendId(0), 20);
        assert_eq!(handle.journal(), vec![DriverCommand::SetTone(Tone::On)]);
    }

    #[test]
    fn test_device_failure_aborts_program() {
        let (mut group, handle) = single(SimulatedDriverConfig::default());
        let mut rx = group.subscribe();
        group.open(FrontendId(0)).unwrap();
        group.tune(FrontendId(0), astra()).unwrap();
        group.take_timer_requests(FrontendId(0)).unwrap();
        handle.fail_next("set_voltage");

        // IfVoltageGoto, then SetVoltage fails
        group.tick(FrontendId(0)).unwrap();
        let err = group.tick(FrontendId(0)).unwrap_err();
        assert!(matches!(
            err,
            EngineError::DeviceCommandFailed {
                command: "set_voltage",
                ..
            }
        ));
        let fe = group.frontend(FrontendId(0)).unwrap();
        assert_eq!(fe.state(), FrontendState::Failed);
        assert!(fe.sequence().is_empty());
        assert!(group
            .take_timer_requests(FrontendId(0))
            .unwrap()
            .contains(&TimerRequest::StopTick));

        let states: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).map(|c| c.state).collect();
        assert_eq!(
            states,
            vec![FrontendState::Idle, FrontendState::Tuning, FrontendState::Failed]
        );
    }

    #[test]
    fn test_linked_member_drives_sec_root() {
        let (mut group, h0, h1) = linked_pair();
        group.acquire(FrontendId(0)).unwrap();
        group.acquire(FrontendId(1)).unwrap();
        h0.clear_journal();
        h1.clear_journal();

        group.tune(FrontendId(1), astra()).unwrap();
        run(&mut group, FrontendId(1), 100);

        assert!(h0.journal().contains(&DriverCommand::SetVoltage(Voltage::V18)));
        assert!(h1
            .journal()
            .iter()
            .all(|c| matches!(c, DriverCommand::SetFrontend(_))));
        assert_eq!(group.runtime_data(FrontendId(0)).unwrap().get(DataSlot::Csw), 0xF3);
        assert_eq!(group.frontend(FrontendId(1)).unwrap().state(), FrontendState::Locked);
    }

    #[test]
    fn test_linked_member_reopens_closed_root() {
        let (mut group, h0, _) = linked_pair();
        group.acquire(FrontendId(1)).unwrap();
        group.tune(FrontendId(1), astra()).unwrap();

        // IfVoltageGoto: root opened for the step and closed again
        group.tick(FrontendId(1)).unwrap();
        assert!(!h0.is_open());

        // SetVoltage: the powered line keeps the root open for its dependent
        group.tick(FrontendId(1)).unwrap();
        assert!(h0.is_open());
        assert_eq!(
            group.runtime_data(FrontendId(0)).unwrap().get(DataSlot::CurVoltage),
            Voltage::V18.code()
        );
    }

    #[test]
    fn test_simulated_frontend_runs_synchronously() {
        let (driver, handle) = sat_driver();
        let mut info = SlotInfo::new(0, "Simulated DVB-S2");
        info.simulate = true;
        let mut group = FrontendGroup::builder()
            .frontend(info, driver)
            .authority(astra_authority(vec![0]))
            .build()
            .unwrap();

        group.tune(FrontendId(0), astra()).unwrap();
        let fe = group.frontend(FrontendId(0)).unwrap();
        assert!(fe.sequence().is_finished());
        assert_eq!(fe.state(), FrontendState::Closed);
        assert!(handle.journal().is_empty());
        assert_eq!(group.runtime_data(FrontendId(0)).unwrap().get(DataSlot::Csw), 0xF3);
        assert!(group.take_timer_requests(FrontendId(0)).unwrap().iter().all(|t| !matches!(t, TimerRequest::ArmDeadline(_))));
    }
}
