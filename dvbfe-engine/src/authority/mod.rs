//! Antenna configuration authority.
//!
//! The authority knows the satellite equipment wiring (LNBs, switches,
//! rotors) and turns a satellite transponder into a SEC program for one
//! slot. The engine consults it for scoring and for every satellite tune.

pub mod basic;

use std::time::Duration;

use dvbfe_params::SatelliteParameters;

use crate::error::Result;
use crate::frontend::RuntimeData;
use crate::sec::SecSequence;

pub use basic::{BasicSatelliteAuthority, LnbConfig, RotorPosition, SatcrConfig, SatelliteConfig};

/// Input to [`AntennaAuthority::prepare`].
pub struct PrepareContext<'a> {
    pub slot: usize,
    pub params: &'a SatelliteParameters,
    /// Runtime data of the sec front-end; `New*` fields are filled in here.
    pub data: &'a mut RuntimeData,
    pub lock_timeout: Duration,
    /// Switch to static current limiting while the rotor turns.
    pub rotor_workaround: bool,
}

/// Program and demodulator settings for one satellite tune.
#[derive(Debug, Clone)]
pub struct SatellitePlan {
    pub sequence: SecSequence,
    /// Frequency programmed into the tuner, kHz.
    pub intermediate_frequency: u32,
    /// Added to the read-back frequency to recover the transponder frequency.
    pub frequency_offset: i64,
    /// Unicable user band, when the slot sits behind a SATCR.
    pub satcr: Option<u8>,
}

/// Satellite equipment control topology resolver.
pub trait AntennaAuthority: Send {
    /// Base score for tuning `params` on any slot in `slot_mask`, `0` when
    /// the position is not reachable.
    fn can_tune(&self, params: &SatelliteParameters, slot_mask: u32, data: &RuntimeData) -> u32;

    fn prepare(&mut self, ctx: PrepareContext<'_>) -> Result<SatellitePlan>;

    fn set_rotor_moving(&mut self, slot: usize, moving: bool);

    /// Program that releases the unicable user band before closing.
    fn prepare_turn_off_satcr(&self, slot: usize) -> Option<SecSequence>;
}
