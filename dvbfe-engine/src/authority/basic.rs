//! Reference satellite equipment control.
//!
//! Supports universal Ku-band LNBs behind an optional committed DiSEqC 1.0
//! switch or tone burst, DiSEqC 1.2 rotors with stored positions, and
//! unicable (SATCR) LNBs.

use std::collections::HashSet;

use log::{debug, info};
use serde::Deserialize;

use dvbfe_params::{DiseqcCommand, SatelliteParameters};

use super::{AntennaAuthority, PrepareContext, SatellitePlan};
use crate::driver::{PowerLimitingMode, Tone, Toneburst, Voltage};
use crate::error::{EngineError, Result};
use crate::frontend::{DataSlot, RuntimeData, UNSET};
use crate::sec::{RotorDirection, SecCommand, SecSequence};

const VOLTAGE_SETTLE_MS: u32 = 50;
const TONE_SETTLE_MS: u32 = 15;
const DISEQC_SETTLE_MS: u32 = 50;
const POLL_INTERVAL_MS: u32 = 50;
const LOCK_POLL_INTERVAL_MS: u32 = 100;

/// A stored rotor position.
#[derive(Debug, Clone, Deserialize)]
pub struct RotorPosition {
    pub orbital_position: i32,
    pub stored_position: u8,
}

/// Unicable user band assignment.
#[derive(Debug, Clone, Deserialize)]
pub struct SatcrConfig {
    pub user_band: u8,
    /// Centre frequency of the user band, kHz.
    pub frequency: u32,
    #[serde(default)]
    pub position_b: bool,
}

/// One LNB (or rotor-mounted LNB) and the slots wired to it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LnbConfig {
    pub slots: Vec<usize>,
    /// Fixed positions served without a rotor.
    pub orbital_positions: Vec<i32>,
    /// Committed DiSEqC 1.0 port, `0..=3`.
    pub committed_port: Option<u8>,
    pub toneburst: Option<Toneburst>,
    /// DiSEqC 1.2 stored positions.
    pub rotor_positions: Vec<RotorPosition>,
    pub satcr: Option<SatcrConfig>,
}

/// `[satellite]` configuration section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SatelliteConfig {
    /// Local oscillators and band switch frequency, kHz.
    pub lof_low: u32,
    pub lof_high: u32,
    pub lof_threshold: u32,
    /// Input power change that means "rotor turning".
    pub rotor_delta: i32,
    pub rotor_retries: i32,
    /// Polls to wait for the rotor to start turning.
    pub rotor_running_polls: i32,
    /// Polls to wait for the rotor to stop.
    pub rotor_stopped_polls: i32,
    /// Polls of the lock confirmation loop.
    pub lock_polls: i32,
    pub lnb: Vec<LnbConfig>,
}

impl Default for SatelliteConfig {
    fn default() -> Self {
        Self {
            lof_low: 9_750_000,
            lof_high: 10_600_000,
            lof_threshold: 11_700_000,
            rotor_delta: 60,
            rotor_retries: 2,
            rotor_running_polls: 40,
            rotor_stopped_polls: 1200,
            lock_polls: 50,
            lnb: Vec::new(),
        }
    }
}

enum Mount<'a> {
    Fixed,
    Rotor(&'a RotorPosition),
}

/// Program builder for the wiring in a [`SatelliteConfig`].
pub struct BasicSatelliteAuthority {
    config: SatelliteConfig,
    rotor_moving: HashSet<usize>,
}

impl BasicSatelliteAuthority {
    pub fn new(config: SatelliteConfig) -> Self {
        Self {
            config,
            rotor_moving: HashSet::new(),
        }
    }

    pub fn is_rotor_moving(&self, slot: usize) -> bool {
        self.rotor_moving.contains(&slot)
    }

    fn lookup(&self, slot_mask: u32, orbital_position: i32) -> Option<(&LnbConfig, Mount<'_>)> {
        self.config
            .lnb
            .iter()
            .filter(|lnb| lnb.slots.iter().any(|s| *s < 32 && slot_mask & (1 << s) != 0))
            .find_map(|lnb| {
                if lnb.orbital_positions.contains(&orbital_position) {
                    Some((lnb, Mount::Fixed))
                } else {
                    lnb.rotor_positions
                        .iter()
                        .find(|p| p.orbital_position == orbital_position)
                        .map(|p| (lnb, Mount::Rotor(p)))
                }
            })
    }

    fn high_band(&self, frequency: u32) -> bool {
        frequency > self.config.lof_threshold
    }

    fn prepare_satcr(
        &self,
        ctx: &PrepareContext<'_>,
        satcr: &SatcrConfig,
    ) -> Result<SatellitePlan> {
        let p = ctx.params;
        let high = self.high_band(p.frequency);
        let lof = if high { self.config.lof_high } else { self.config.lof_low };
        let lnb_if = p.frequency.abs_diff(lof);

        let t = ((lnb_if + satcr.frequency + 2000) / 4000).saturating_sub(350);
        let bank = (if satcr.position_b { 4 } else { 0 })
            | (if p.polarisation.is_high_voltage() { 2 } else { 0 })
            | (if high { 1 } else { 0 });
        let odu = DiseqcCommand::new(&[
            0xE0,
            0x10,
            0x5A,
            (satcr.user_band << 5) | (bank << 2) | ((t >> 8) as u8 & 0x3),
            (t & 0xFF) as u8,
        ])?;

        let mut seq = SecSequence::new();
        seq.push(SecCommand::IfToneGoto { tone: Tone::Off, steps: 2 });
        seq.push(SecCommand::SetTone(Tone::Off));
        seq.push(SecCommand::SetVoltage(Voltage::V18));
        seq.push(SecCommand::Sleep(20));
        seq.push(SecCommand::SendDiseqc(odu));
        seq.push(SecCommand::Sleep(DISEQC_SETTLE_MS));
        seq.push(SecCommand::SetVoltage(Voltage::V13));
        seq.push(SecCommand::StartTuneTimeout(ctx.lock_timeout.as_millis() as u32));
        seq.push(SecCommand::SetFrontend { events: true });

        Ok(SatellitePlan {
            sequence: seq,
            intermediate_frequency: satcr.frequency,
            frequency_offset: p.frequency as i64 - satcr.frequency as i64,
            satcr: Some(satcr.user_band),
        })
    }

    /// Switch block: committed DiSEqC and/or tone burst, skipped when the
    /// line is already on the wanted input.
    fn push_switch(
        &self,
        seq: &mut SecSequence,
        lnb: &LnbConfig,
        data: &mut RuntimeData,
        voltage: Voltage,
        high: bool,
    ) -> Result<()> {
        let csw = lnb.committed_port.map(|port| {
            0xF0 | ((port & 0x3) << 2)
                | (if voltage == Voltage::V18 { 2 } else { 0 })
                | (if high { 1 } else { 0 })
        });
        let new_csw = csw.map_or(UNSET, i64::from);
        let new_toneburst = lnb.toneburst.map_or(UNSET, Toneburst::code);
        data.set(DataSlot::NewCsw, new_csw);
        data.set(DataSlot::NewUcsw, UNSET);
        data.set(DataSlot::NewToneburst, new_toneburst);

        if csw.is_none() && lnb.toneburst.is_none() {
            return Ok(());
        }
        if data.get(DataSlot::Csw) == new_csw && data.get(DataSlot::Toneburst) == new_toneburst {
            debug!("switch already on csw {:#x}, skip diseqc", new_csw);
            return Ok(());
        }

        seq.push(SecCommand::InvalidateCurrentSwitchParams);
        seq.push(SecCommand::IfToneGoto { tone: Tone::Off, steps: 3 });
        seq.push(SecCommand::SetTone(Tone::Off));
        seq.push(SecCommand::Sleep(TONE_SETTLE_MS));
        if let Some(csw) = csw {
            seq.push(SecCommand::SendDiseqc(DiseqcCommand::new(&[0xE0, 0x10, 0x38, csw])?));
            seq.push(SecCommand::Sleep(DISEQC_SETTLE_MS));
        }
        if let Some(burst) = lnb.toneburst {
            seq.push(SecCommand::SendToneburst(burst));
            seq.push(SecCommand::Sleep(DISEQC_SETTLE_MS));
        }
        seq.push(SecCommand::CommitCurrentSwitchParams);
        Ok(())
    }

    /// Rotor block: drive to the stored position and follow the motion via
    /// the LNB supply current.
    fn push_rotor(
        &self,
        seq: &mut SecSequence,
        position: &RotorPosition,
        data: &mut RuntimeData,
        voltage: Voltage,
        rotor_workaround: bool,
    ) -> Result<()> {
        data.set(DataSlot::NewRotorCmd, position.stored_position as i64);
        data.set(DataSlot::NewRotorPos, position.orbital_position as i64);
        if data.get(DataSlot::RotorCmd) == position.stored_position as i64
            && data.get(DataSlot::RotorPos) == position.orbital_position as i64
        {
            debug!("rotor already at {}, no move", position.orbital_position);
            return Ok(());
        }

        let idle = if voltage.is_low() { 0 } else { 1 };
        let goto = DiseqcCommand::new(&[0xE0, 0x31, 0x6B, position.stored_position])?;
        let delta = self.config.rotor_delta;

        if rotor_workaround {
            seq.push(SecCommand::SetPowerLimitingMode(PowerLimitingMode::Static));
        }
        seq.push(SecCommand::MeasureIdleInputPower(idle));
        seq.push(SecCommand::Sleep(POLL_INTERVAL_MS));
        seq.push(SecCommand::IfMeasureIdleFailedGoto { slot: idle, steps: -2 });
        seq.push(SecCommand::InvalidateCurrentRotorParams);
        seq.push(SecCommand::SetRotorRetryBudget(self.config.rotor_retries));
        // retry: 0
        seq.push(SecCommand::SendDiseqc(goto));
        seq.push(SecCommand::SetTimeoutCounter(self.config.rotor_running_polls));
        // wait for running: 2
        seq.push(SecCommand::MeasureRunningInputPower);
        seq.push(SecCommand::if_inputpower_delta(RotorDirection::Running, delta, 6));
        seq.push(SecCommand::IfTimeoutGoto(3));
        seq.push(SecCommand::Sleep(POLL_INTERVAL_MS));
        seq.push(SecCommand::Goto(-4));
        // start timeout: 7
        seq.push(SecCommand::IfNoMoreRetriesGoto(10));
        seq.push(SecCommand::Goto(-8));
        // running: 9
        seq.push(SecCommand::SetRotorMoving(true));
        seq.push(SecCommand::SetTimeoutCounter(self.config.rotor_stopped_polls));
        seq.push(SecCommand::MeasureRunningInputPower);
        seq.push(SecCommand::if_inputpower_delta(RotorDirection::Stopped, delta, 4));
        seq.push(SecCommand::IfTimeoutGoto(4));
        seq.push(SecCommand::Sleep(POLL_INTERVAL_MS));
        seq.push(SecCommand::Goto(-4));
        // stopped: 16
        seq.push(SecCommand::CommitCurrentRotorParams);
        // done or given up: 17
        seq.push(SecCommand::SetRotorMoving(false));
        if rotor_workaround {
            seq.push(SecCommand::SetPowerLimitingMode(PowerLimitingMode::Dynamic));
        }
        Ok(())
    }

    /// Tail for rotor installations: a confirmed position tunes normally,
    /// otherwise lock is confirmed by polling.
    fn push_rotor_tail(&self, seq: &mut SecSequence, timeout_ms: u32) {
        seq.push(SecCommand::IfRotorPosValidGoto(8));
        seq.push(SecCommand::StartTuneTimeout(timeout_ms));
        seq.push(SecCommand::SetFrontend { events: false });
        seq.push(SecCommand::SetTimeoutCounter(self.config.lock_polls));
        seq.push(SecCommand::if_tuner_locked(6));
        seq.push(SecCommand::IfTimeoutGoto(5));
        seq.push(SecCommand::Sleep(LOCK_POLL_INTERVAL_MS));
        seq.push(SecCommand::Goto(-3));
        seq.push(SecCommand::StartTuneTimeout(timeout_ms));
        seq.push(SecCommand::SetFrontend { events: true });
    }
}

impl AntennaAuthority for BasicSatelliteAuthority {
    fn can_tune(&self, params: &SatelliteParameters, slot_mask: u32, data: &RuntimeData) -> u32 {
        match self.lookup(slot_mask, params.orbital_position) {
            None => 0,
            Some((_, Mount::Fixed)) => 3,
            Some((lnb, Mount::Rotor(position))) => {
                if data.get(DataSlot::RotorPos) == position.orbital_position as i64 {
                    3
                } else if lnb
                    .slots
                    .iter()
                    .any(|s| *s < 32 && slot_mask & (1 << s) == 0 && self.is_rotor_moving(*s))
                {
                    // the dish is being turned for another slot
                    0
                } else {
                    2
                }
            }
        }
    }

    fn prepare(&mut self, ctx: PrepareContext<'_>) -> Result<SatellitePlan> {
        let p = ctx.params;
        let Some((lnb, mount)) = self.lookup(1 << ctx.slot.min(31), p.orbital_position) else {
            return Err(EngineError::InvalidParameters(format!(
                "no LNB for orbital position {} on slot {}",
                p.orbital_position, ctx.slot
            )));
        };
        if let Some(satcr) = &lnb.satcr {
            return self.prepare_satcr(&ctx, satcr);
        }

        let high = self.high_band(p.frequency);
        let lof = if high { self.config.lof_high } else { self.config.lof_low };
        let voltage = if p.polarisation.is_high_voltage() {
            Voltage::V18
        } else {
            Voltage::V13
        };
        let tone = if high { Tone::On } else { Tone::Off };
        let timeout_ms = ctx.lock_timeout.as_millis() as u32;

        let mut seq = SecSequence::new();
        seq.push(SecCommand::IfVoltageGoto { voltage, steps: 3 });
        seq.push(SecCommand::SetVoltage(voltage));
        seq.push(SecCommand::Sleep(VOLTAGE_SETTLE_MS));

        self.push_switch(&mut seq, lnb, ctx.data, voltage, high)?;

        let rotor = match mount {
            Mount::Rotor(position) if !p.no_rotor_command_on_tune => {
                self.push_rotor(&mut seq, position, ctx.data, voltage, ctx.rotor_workaround)?;
                true
            }
            Mount::Rotor(_) => true,
            Mount::Fixed => false,
        };

        seq.push(SecCommand::IfToneGoto { tone, steps: 3 });
        seq.push(SecCommand::SetTone(tone));
        seq.push(SecCommand::Sleep(TONE_SETTLE_MS));

        if rotor {
            self.push_rotor_tail(&mut seq, timeout_ms);
        } else {
            seq.push(SecCommand::StartTuneTimeout(timeout_ms));
            seq.push(SecCommand::SetFrontend { events: true });
        }

        info!(
            "prepare slot {}: pos {} freq {} {:?} -> if {} {:?} {:?}",
            ctx.slot, p.orbital_position, p.frequency, p.polarisation, p.frequency.abs_diff(lof), voltage, tone
        );
        Ok(SatellitePlan {
            sequence: seq,
            intermediate_frequency: p.frequency.abs_diff(lof),
            frequency_offset: lof as i64,
            satcr: None,
        })
    }

    fn set_rotor_moving(&mut self, slot: usize, moving: bool) {
        debug!("slot {} rotor moving {}", slot, moving);
        if moving {
            self.rotor_moving.insert(slot);
        } else {
            self.rotor_moving.remove(&slot);
        }
    }

    fn prepare_turn_off_satcr(&self, slot: usize) -> Option<SecSequence> {
        let satcr = self
            .config
            .lnb
            .iter()
            .filter(|lnb| lnb.slots.contains(&slot))
            .find_map(|lnb| lnb.satcr.as_ref())?;
        let off = DiseqcCommand::new(&[0xE0, 0x10, 0x5A, satcr.user_band << 5, 0x00]).ok()?;
        Some(SecSequence::from(vec![
            SecCommand::SetVoltage(Voltage::V18),
            SecCommand::Sleep(20),
            SecCommand::SendDiseqc(off),
            SecCommand::Sleep(DISEQC_SETTLE_MS),
            SecCommand::SetVoltage(Voltage::V13),
            SecCommand::DelayedCloseFrontend,
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvbfe_params::Polarisation;

    fn astra() -> SatelliteParameters {
        SatelliteParameters {
            frequency: 11_836_000,
            symbol_rate: 27_500_000,
            polarisation: Polarisation::Horizontal,
            orbital_position: 192,
            ..Default::default()
        }
    }

    fn config() -> SatelliteConfig {
        SatelliteConfig {
            lnb: vec![
                LnbConfig {
                    slots: vec![0, 1],
                    orbital_positions: vec![192],
                    committed_port: Some(0),
                    ..Default::default()
                },
                LnbConfig {
                    slots: vec![2],
                    rotor_positions: vec![
                        RotorPosition {
                            orbital_position: 130,
                            stored_position: 1,
                        },
                        RotorPosition {
                            orbital_position: 192,
                            stored_position: 2,
                        },
                    ],
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    fn prepare(
        authority: &mut BasicSatelliteAuthority,
        slot: usize,
        params: &SatelliteParameters,
        data: &mut RuntimeData,
    ) -> SatellitePlan {
        authority
            .prepare(PrepareContext {
                slot,
                params,
                data,
                lock_timeout: std::time::Duration::from_millis(5000),
                rotor_workaround: false,
            })
            .unwrap()
    }

    #[test]
    fn test_fixed_lnb_program() {
        let mut authority = BasicSatelliteAuthority::new(config());
        let mut data = RuntimeData::default();
        let plan = prepare(&mut authority, 0, &astra(), &mut data);

        assert_eq!(plan.intermediate_frequency, 1_236_000);
        assert_eq!(plan.frequency_offset, 10_600_000);
        assert_eq!(data.get(DataSlot::NewCsw), 0xF3);
        let diseqc = DiseqcCommand::from_hex("e01038f3").unwrap();
        assert!(plan.sequence.commands().contains(&SecCommand::SendDiseqc(diseqc)));
        assert_eq!(
            plan.sequence.commands().last(),
            Some(&SecCommand::SetFrontend { events: true })
        );
    }

    #[test]
    fn test_switch_skipped_when_current() {
        let mut authority = BasicSatelliteAuthority::new(config());
        let mut data = RuntimeData::default();
        data.set(DataSlot::Csw, 0xF3);
        let plan = prepare(&mut authority, 0, &astra(), &mut data);
        assert!(!plan.sequence.has_pending_diseqc());
    }

    #[test]
    fn test_rotor_jump_targets() {
        let mut authority = BasicSatelliteAuthority::new(config());
        let mut data = RuntimeData::default();
        let plan = prepare(&mut authority, 2, &astra(), &mut data);
        let cmds = plan.sequence.commands();

        let gate = cmds
            .iter()
            .position(|c| {
                matches!(c, SecCommand::IfInputpowerDeltaGoto(g) if g.direction == RotorDirection::Running)
            })
            .unwrap();
        assert_eq!(cmds[gate + 6], SecCommand::SetRotorMoving(true));

        let stopped = cmds
            .iter()
            .position(|c| {
                matches!(c, SecCommand::IfInputpowerDeltaGoto(g) if g.direction == RotorDirection::Stopped)
            })
            .unwrap();
        assert_eq!(cmds[stopped + 4], SecCommand::CommitCurrentRotorParams);
        assert_eq!(cmds[stopped + 5], SecCommand::SetRotorMoving(false));

        let retry = cmds
            .iter()
            .position(|c| matches!(c, SecCommand::IfNoMoreRetriesGoto(_)))
            .unwrap();
        assert_eq!(cmds[retry + 10], SecCommand::SetRotorMoving(false));
        assert!(matches!(cmds[retry - 7], SecCommand::SendDiseqc(_)));

        let locked = cmds
            .iter()
            .position(|c| matches!(c, SecCommand::IfTunerLockedGoto(_)))
            .unwrap();
        assert_eq!(locked + 6, cmds.len());
        assert_eq!(data.get(DataSlot::NewRotorCmd), 2);
    }

    #[test]
    fn test_can_tune() {
        let mut authority = BasicSatelliteAuthority::new(config());
        let data = RuntimeData::default();
        assert_eq!(authority.can_tune(&astra(), 1 << 0, &data), 3);
        assert_eq!(authority.can_tune(&astra(), 1 << 2, &data), 2);
        assert_eq!(authority.can_tune(&astra(), 1 << 3, &data), 0);
        let hotbird = SatelliteParameters {
            orbital_position: 130,
            ..astra()
        };
        assert_eq!(authority.can_tune(&hotbird, 1 << 0, &data), 0);

        authority.set_rotor_moving(2, true);
        assert!(authority.is_rotor_moving(2));
        authority.set_rotor_moving(2, false);
        assert!(!authority.is_rotor_moving(2));
    }

    #[test]
    fn test_satcr_program() {
        let mut cfg = config();
        cfg.lnb.push(LnbConfig {
            slots: vec![3],
            orbital_positions: vec![192],
            satcr: Some(SatcrConfig {
                user_band: 1,
                frequency: 1_284_000,
                position_b: false,
            }),
            ..Default::default()
        });
        let mut authority = BasicSatelliteAuthority::new(cfg);
        let mut data = RuntimeData::default();
        let plan = prepare(&mut authority, 3, &astra(), &mut data);
        assert_eq!(plan.satcr, Some(1));
        assert_eq!(plan.intermediate_frequency, 1_284_000);

        let off = authority.prepare_turn_off_satcr(3).unwrap();
        assert_eq!(
            off.commands().last(),
            Some(&SecCommand::DelayedCloseFrontend)
        );
        assert!(authority.prepare_turn_off_satcr(0).is_none());
    }
}
