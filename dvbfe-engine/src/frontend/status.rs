//! Status export types and SNR calibration curves.

use serde::Serialize;

use dvbfe_params::FrontendType;

/// Converts a raw SNR register value into centi-dB for one device family.
pub trait SnrCalibration: Send + Sync {
    fn centi_db(&self, raw: u16) -> i32;

    /// Quality reported as 100% on satellite, in centi-dB.
    fn satellite_max(&self) -> i32 {
        1600
    }
}

/// Broadcom BCM4505/BCM4506 demodulators.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bcm4506Curve;

impl SnrCalibration for Bcm4506Curve {
    fn centi_db(&self, raw: u16) -> i32 {
        (raw as i32 * 100) >> 8
    }
}

/// Alps BSBE2 tuner (STV0288).
#[derive(Debug, Clone, Copy, Default)]
pub struct Bsbe2Curve;

impl SnrCalibration for Bsbe2Curve {
    fn centi_db(&self, raw: u16) -> i32 {
        ((raw >> 7) as i32) * 10
    }
}

/// Pick a built-in curve from the slot description.
pub(crate) fn calibration_for(description: &str) -> Option<Box<dyn SnrCalibration>> {
    if description.contains("BCM4506") || description.contains("BCM4505") {
        Some(Box::new(Bcm4506Curve))
    } else if description == "Alps BSBE2" {
        Some(Box::new(Bsbe2Curve))
    } else {
        None
    }
}

/// Scale centi-dB to `0..=65536` against the family maximum.
pub fn scale_quality(centi_db: i32, family: FrontendType, satellite_max: i32) -> u32 {
    let max = match family {
        FrontendType::Satellite => satellite_max,
        FrontendType::Cable => 4200,
        FrontendType::Terrestrial => 2400,
    };
    if centi_db >= max {
        65536
    } else if centi_db <= 0 || max <= 0 {
        0
    } else {
        (centi_db as i64 * 65536 / max as i64) as u32
    }
}

/// Snapshot of a front-end's live readings.
#[derive(Debug, Clone, Serialize)]
pub struct FrontendStatus {
    pub tuner_state: &'static str,
    pub tuner_locked: bool,
    pub tuner_synced: bool,
    pub tuner_bit_error_rate: u32,
    pub tuner_signal_quality: u32,
    /// `None` when no calibration curve is known for the device.
    pub tuner_signal_quality_db: Option<i32>,
    pub tuner_signal_power: u16,
    /// Local time the readings were taken, RFC 3339.
    pub timestamp: String,
}

/// Static identification of a front-end.
#[derive(Debug, Clone, Serialize)]
pub struct FrontendData {
    pub tuner_number: usize,
    /// `DVB-S`, `DVB-C`, `DVB-T` or `UNKNOWN`.
    pub tuner_type: &'static str,
}
