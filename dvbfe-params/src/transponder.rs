//! Transponder parameter records and the comparator.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ParamError;
use crate::types::*;

/// Variants differ outright.
pub const DIFF_TYPE: u32 = 1 << 30;
/// Satellites at different orbital positions.
pub const DIFF_POSITION: u32 = 1 << 29;
/// Same position, different polarisation.
pub const DIFF_POLARISATION: u32 = 1 << 28;
/// Exact comparison found a non-`Auto` FEC or modulation mismatch.
pub const DIFF_EXACT: u32 = 1 << 27;

/// Satellite transponder.
///
/// Frequencies are in kHz, symbol rates in symbols per second and orbital
/// positions in tenths of a degree east (`0..3600`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SatelliteParameters {
    pub frequency: u32,
    pub symbol_rate: u32,
    pub polarisation: Polarisation,
    pub fec: CodeRate,
    pub inversion: Inversion,
    pub orbital_position: i32,
    pub system: SatelliteSystem,
    pub modulation: SatelliteModulation,
    pub rolloff: RollOff,
    pub pilot: Pilot,
    /// Input stream id for multistream DVB-S2, `None` when not used.
    pub stream_id: Option<u8>,
    /// Tune without moving the rotor (the dish is already being driven).
    pub no_rotor_command_on_tune: bool,
}

impl Default for SatelliteParameters {
    fn default() -> Self {
        Self {
            frequency: 0,
            symbol_rate: 0,
            polarisation: Polarisation::Horizontal,
            fec: CodeRate::Auto,
            inversion: Inversion::Auto,
            orbital_position: 0,
            system: SatelliteSystem::DvbS,
            modulation: SatelliteModulation::Auto,
            rolloff: RollOff::Alpha035,
            pilot: Pilot::Auto,
            stream_id: None,
            no_rotor_command_on_tune: false,
        }
    }
}

/// Cable transponder. Frequency in kHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CableParameters {
    pub frequency: u32,
    pub symbol_rate: u32,
    pub modulation: CableModulation,
    pub inversion: Inversion,
    pub fec_inner: CodeRate,
}

/// Terrestrial transponder. Frequency in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrestrialParameters {
    pub frequency: u32,
    pub bandwidth: Bandwidth,
    pub code_rate_hp: CodeRate,
    pub code_rate_lp: CodeRate,
    pub modulation: TerrestrialModulation,
    pub transmission_mode: TransmissionMode,
    pub guard_interval: GuardInterval,
    pub hierarchy: Hierarchy,
    pub inversion: Inversion,
    pub system: TerrestrialSystem,
    /// Physical layer pipe, only compared for DVB-T2.
    pub plp_id: u32,
}

/// Lock timeouts per delivery family.
///
/// The satellite tiers are selected by symbol rate: above 20 Msym/s the
/// high tier applies, above 10 Msym/s the middle tier, otherwise the low one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockTimeouts {
    pub satellite_high_sr_ms: u64,
    pub satellite_mid_sr_ms: u64,
    pub satellite_low_sr_ms: u64,
    pub cable_ms: u64,
    pub terrestrial_ms: u64,
}

impl Default for LockTimeouts {
    fn default() -> Self {
        Self {
            satellite_high_sr_ms: 5000,
            satellite_mid_sr_ms: 10000,
            satellite_low_sr_ms: 20000,
            cable_ms: 5000,
            terrestrial_ms: 5000,
        }
    }
}

/// A transponder of exactly one delivery family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransponderParameters {
    Satellite(SatelliteParameters),
    Cable(CableParameters),
    Terrestrial(TerrestrialParameters),
}

/// `true` when both sides are concrete and differ.
fn concrete_mismatch<T: PartialEq>(a: T, b: T, auto: T) -> bool {
    a != b && a != auto && b != auto
}

impl TransponderParameters {
    /// Wrap satellite parameters, setting the rotor bypass flag.
    pub fn satellite(mut params: SatelliteParameters, no_rotor_command_on_tune: bool) -> Self {
        params.no_rotor_command_on_tune = no_rotor_command_on_tune;
        TransponderParameters::Satellite(params)
    }

    pub fn frontend_type(&self) -> FrontendType {
        match self {
            TransponderParameters::Satellite(_) => FrontendType::Satellite,
            TransponderParameters::Cable(_) => FrontendType::Cable,
            TransponderParameters::Terrestrial(_) => FrontendType::Terrestrial,
        }
    }

    /// The delivery system generation a front-end must support to tune this.
    pub fn delivery_system(&self) -> DeliverySystem {
        match self {
            TransponderParameters::Satellite(p) => p.system.delivery_system(),
            TransponderParameters::Cable(_) => DeliverySystem::DvbC,
            TransponderParameters::Terrestrial(p) => p.system.delivery_system(),
        }
    }

    pub fn as_satellite(&self) -> Result<&SatelliteParameters, ParamError> {
        match self {
            TransponderParameters::Satellite(p) => Ok(p),
            other => Err(ParamError::TypeMismatch {
                expected: FrontendType::Satellite,
                actual: other.frontend_type(),
            }),
        }
    }

    pub fn as_cable(&self) -> Result<&CableParameters, ParamError> {
        match self {
            TransponderParameters::Cable(p) => Ok(p),
            other => Err(ParamError::TypeMismatch {
                expected: FrontendType::Cable,
                actual: other.frontend_type(),
            }),
        }
    }

    pub fn as_terrestrial(&self) -> Result<&TerrestrialParameters, ParamError> {
        match self {
            TransponderParameters::Terrestrial(p) => Ok(p),
            other => Err(ParamError::TypeMismatch {
                expected: FrontendType::Terrestrial,
                actual: other.frontend_type(),
            }),
        }
    }

    /// Distance between two transponders.
    ///
    /// Structural differences map to one of the `DIFF_*` bands, otherwise the
    /// numeric frequency (and symbol rate) distance is returned. With `exact`
    /// set, concrete mismatches in enumerated fields also count as
    /// structural; `Auto` on either side never does.
    pub fn difference(&self, other: &TransponderParameters, exact: bool) -> u32 {
        use TransponderParameters::*;

        match (self, other) {
            (Satellite(a), Satellite(b)) => {
                if a.orbital_position != b.orbital_position {
                    DIFF_POSITION
                } else if a.polarisation != b.polarisation {
                    DIFF_POLARISATION
                } else if exact && concrete_mismatch(a.fec, b.fec, CodeRate::Auto) {
                    DIFF_EXACT
                } else if exact
                    && concrete_mismatch(a.modulation, b.modulation, SatelliteModulation::Auto)
                {
                    DIFF_EXACT
                } else {
                    distance(
                        a.frequency.abs_diff(b.frequency) as u64
                            + a.symbol_rate.abs_diff(b.symbol_rate) as u64,
                    )
                }
            }
            (Cable(a), Cable(b)) => {
                if exact && concrete_mismatch(a.modulation, b.modulation, CableModulation::Auto) {
                    DIFF_POSITION
                } else if exact && concrete_mismatch(a.fec_inner, b.fec_inner, CodeRate::Auto) {
                    DIFF_EXACT
                } else {
                    distance(
                        a.frequency.abs_diff(b.frequency) as u64
                            + a.symbol_rate.abs_diff(b.symbol_rate) as u64,
                    )
                }
            }
            (Terrestrial(a), Terrestrial(b)) => {
                let exact_mismatch = exact
                    && (concrete_mismatch(a.bandwidth, b.bandwidth, Bandwidth::Auto)
                        || concrete_mismatch(a.modulation, b.modulation, TerrestrialModulation::Auto)
                        || concrete_mismatch(
                            a.transmission_mode,
                            b.transmission_mode,
                            TransmissionMode::Auto,
                        )
                        || concrete_mismatch(a.guard_interval, b.guard_interval, GuardInterval::Auto)
                        || concrete_mismatch(a.hierarchy, b.hierarchy, Hierarchy::Auto)
                        || concrete_mismatch(a.code_rate_lp, b.code_rate_lp, CodeRate::Auto)
                        || concrete_mismatch(a.code_rate_hp, b.code_rate_hp, CodeRate::Auto));
                if exact_mismatch || a.system != b.system {
                    DIFF_TYPE
                } else if a.system == TerrestrialSystem::DvbT2 && a.plp_id != b.plp_id {
                    DIFF_TYPE
                } else {
                    a.frequency.abs_diff(b.frequency) / 1000
                }
            }
            _ => DIFF_TYPE,
        }
    }

    /// Compact, lossy key for fast pre-filtering.
    pub fn hash(&self) -> u32 {
        match self {
            TransponderParameters::Satellite(p) => {
                ((p.orbital_position as u32) << 16)
                    | ((p.frequency / 1000) & 0xFFFF)
                    | ((p.polarisation.code() & 1) << 15)
            }
            TransponderParameters::Cable(p) => 0xFFFF_0000 | ((p.frequency / 1000) & 0xFFFF),
            TransponderParameters::Terrestrial(p) => {
                0xEEEE_0000 | ((p.frequency / 1_000_000) & 0xFFFF)
            }
        }
    }

    /// Expected lock time with the default timeouts.
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout_with(&LockTimeouts::default())
    }

    pub fn lock_timeout_with(&self, timeouts: &LockTimeouts) -> Duration {
        let ms = match self {
            TransponderParameters::Satellite(p) => {
                if p.symbol_rate > 20_000_000 {
                    timeouts.satellite_high_sr_ms
                } else if p.symbol_rate > 10_000_000 {
                    timeouts.satellite_mid_sr_ms
                } else {
                    timeouts.satellite_low_sr_ms
                }
            }
            TransponderParameters::Cable(_) => timeouts.cable_ms,
            TransponderParameters::Terrestrial(_) => timeouts.terrestrial_ms,
        };
        Duration::from_millis(ms)
    }
}

/// Numeric distances stay below the structural bands.
fn distance(d: u64) -> u32 {
    d.min((DIFF_EXACT - 1) as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn astra() -> SatelliteParameters {
        SatelliteParameters {
            frequency: 11_836_000,
            symbol_rate: 27_500_000,
            polarisation: Polarisation::Horizontal,
            fec: CodeRate::R3_4,
            orbital_position: 192,
            system: SatelliteSystem::DvbS,
            modulation: SatelliteModulation::Qpsk,
            ..Default::default()
        }
    }

    #[test]
    fn test_identical_parameters() {
        let variants = [
            TransponderParameters::Satellite(astra()),
            TransponderParameters::Cable(CableParameters {
                frequency: 346_000,
                symbol_rate: 6_900_000,
                modulation: CableModulation::Qam256,
                ..Default::default()
            }),
            TransponderParameters::Terrestrial(TerrestrialParameters {
                frequency: 482_000_000,
                bandwidth: Bandwidth::Bw8MHz,
                ..Default::default()
            }),
        ];
        for p in &variants {
            let copy = *p;
            assert_eq!(p.difference(&copy, true), 0);
            assert_eq!(p.hash(), copy.hash());
        }
    }

    #[test]
    fn test_orbital_position_difference() {
        let a = TransponderParameters::Satellite(astra());
        let b = TransponderParameters::Satellite(SatelliteParameters {
            orbital_position: 130,
            ..astra()
        });
        assert!(a.difference(&b, false) >= 1 << 29);
        assert!(a.difference(&b, true) >= 1 << 29);
    }

    #[test]
    fn test_auto_fec_is_tolerated() {
        let a = TransponderParameters::Satellite(astra());
        let b = TransponderParameters::Satellite(SatelliteParameters {
            fec: CodeRate::Auto,
            frequency: 11_837_000,
            ..astra()
        });
        assert_eq!(a.difference(&b, true), 1000);

        let c = TransponderParameters::Satellite(SatelliteParameters {
            fec: CodeRate::R5_6,
            ..astra()
        });
        assert_eq!(a.difference(&c, true), DIFF_EXACT);
        assert_eq!(a.difference(&c, false), 0);
    }

    #[test]
    fn test_type_difference() {
        let a = TransponderParameters::Satellite(astra());
        let b = TransponderParameters::Cable(CableParameters::default());
        assert_eq!(a.difference(&b, false), DIFF_TYPE);
    }

    #[test]
    fn test_terrestrial_plp_mismatch() {
        let t2 = TerrestrialParameters {
            frequency: 690_000_000,
            system: TerrestrialSystem::DvbT2,
            plp_id: 0,
            ..Default::default()
        };
        let a = TransponderParameters::Terrestrial(t2);
        let b = TransponderParameters::Terrestrial(TerrestrialParameters { plp_id: 1, ..t2 });
        assert_eq!(a.difference(&b, false), DIFF_TYPE);

        let c = TransponderParameters::Terrestrial(TerrestrialParameters {
            frequency: 690_166_000,
            ..t2
        });
        assert_eq!(a.difference(&c, false), 166);
    }

    #[test]
    fn test_hash_layout() {
        let p = TransponderParameters::Satellite(astra());
        assert_eq!(p.hash(), (192 << 16) | 11_836);
        let v = TransponderParameters::Satellite(SatelliteParameters {
            polarisation: Polarisation::Vertical,
            ..astra()
        });
        assert_eq!(v.hash(), (192 << 16) | 11_836 | (1 << 15));
        let t = TransponderParameters::Terrestrial(TerrestrialParameters {
            frequency: 482_000_000,
            ..Default::default()
        });
        assert_eq!(t.hash(), 0xEEEE_0000 | 482);
    }

    #[test]
    fn test_lock_timeout_tiers() {
        let with_sr = |symbol_rate| {
            TransponderParameters::Satellite(SatelliteParameters {
                symbol_rate,
                ..astra()
            })
            .lock_timeout()
        };
        assert_eq!(with_sr(27_500_000), Duration::from_millis(5000));
        assert_eq!(with_sr(20_000_001), Duration::from_millis(5000));
        assert_eq!(with_sr(20_000_000), Duration::from_millis(10000));
        assert_eq!(with_sr(10_000_001), Duration::from_millis(10000));
        assert_eq!(with_sr(10_000_000), Duration::from_millis(20000));
        assert_eq!(with_sr(2_000_000), Duration::from_millis(20000));

        let cable = TransponderParameters::Cable(CableParameters {
            symbol_rate: 1_000_000,
            ..Default::default()
        });
        assert_eq!(cable.lock_timeout(), Duration::from_millis(5000));
        let terr = TransponderParameters::Terrestrial(TerrestrialParameters::default());
        assert_eq!(terr.lock_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn test_wrong_variant_access() {
        let p = TransponderParameters::Cable(CableParameters::default());
        assert_eq!(
            p.as_satellite().unwrap_err(),
            ParamError::TypeMismatch {
                expected: FrontendType::Satellite,
                actual: FrontendType::Cable,
            }
        );
        assert!(p.as_cable().is_ok());
        assert!(p.as_terrestrial().is_err());
    }

    #[test]
    fn test_serde_tagged() {
        let p = TransponderParameters::satellite(astra(), true);
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"type\":\"satellite\""));
        let back: TransponderParameters = serde_json::from_str(&json).unwrap();
        assert!(back.as_satellite().unwrap().no_rotor_command_on_tune);
    }
}
