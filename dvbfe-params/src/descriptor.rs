//! Mapping of delivery system descriptors onto transponder parameters.
//!
//! The descriptor structs carry the already-extracted descriptor fields in
//! their broadcast units. Mapping never fails: out-of-range enumerated values
//! are clamped to `Auto` and the correction is logged.

use log::{debug, warn};

use crate::transponder::{CableParameters, SatelliteParameters, TerrestrialParameters};
use crate::types::*;

/// Satellite delivery system descriptor (tag 0x43).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SatelliteDeliveryDescriptor {
    /// Frequency in units of 10 kHz.
    pub frequency: u32,
    /// Orbital position, four BCD digits in tenths of a degree.
    pub orbital_position: u16,
    /// `true` for east, `false` for west.
    pub west_east_flag: bool,
    pub polarization: u8,
    pub roll_off: u8,
    /// `0` for DVB-S, `1` for DVB-S2.
    pub modulation_system: u8,
    pub modulation_type: u8,
    /// Symbol rate in units of 100 symbols per second.
    pub symbol_rate: u32,
    pub fec_inner: u8,
}

/// Cable delivery system descriptor (tag 0x44).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CableDeliveryDescriptor {
    /// Frequency in units of 100 Hz.
    pub frequency: u32,
    pub modulation: u8,
    /// Symbol rate in units of 100 symbols per second.
    pub symbol_rate: u32,
    pub fec_inner: u8,
}

/// Terrestrial delivery system descriptor (tag 0x5A).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerrestrialDeliveryDescriptor {
    /// Centre frequency in units of 10 Hz.
    pub centre_frequency: u32,
    pub bandwidth: u8,
    pub constellation: u8,
    pub hierarchy_information: u8,
    pub code_rate_hp_stream: u8,
    pub code_rate_lp_stream: u8,
    pub guard_interval: u8,
    pub transmission_mode: u8,
}

fn decode_bcd_position(raw: u16) -> i32 {
    (((raw >> 12) & 0xF) * 1000 + ((raw >> 8) & 0xF) * 100 + ((raw >> 4) & 0xF) * 10 + (raw & 0xF))
        as i32
}

impl SatelliteParameters {
    pub fn from_descriptor(d: &SatelliteDeliveryDescriptor) -> Self {
        let mut orbital_position = decode_bcd_position(d.orbital_position);
        if orbital_position != 0 && !d.west_east_flag {
            orbital_position = 3600 - orbital_position;
        }

        let fec = match CodeRate::from_fec_inner(d.fec_inner) {
            Some(fec) => fec,
            None => {
                warn!("satellite descriptor: FEC code {} out of range, using auto", d.fec_inner);
                CodeRate::Auto
            }
        };

        let system = if d.modulation_system == 1 {
            SatelliteSystem::DvbS2
        } else {
            SatelliteSystem::DvbS
        };
        let mut modulation = SatelliteModulation::from_code(d.modulation_type);
        if system == SatelliteSystem::DvbS && modulation == SatelliteModulation::Psk8 {
            warn!("satellite descriptor: 8PSK is not valid for DVB-S, forcing QPSK");
            modulation = SatelliteModulation::Qpsk;
        }

        let params = Self {
            frequency: d.frequency.saturating_mul(10),
            symbol_rate: d.symbol_rate.saturating_mul(100),
            polarisation: Polarisation::from_code(d.polarization),
            fec,
            inversion: Inversion::Auto,
            orbital_position,
            system,
            modulation,
            rolloff: RollOff::from_code(d.roll_off),
            pilot: Pilot::Auto,
            stream_id: None,
            no_rotor_command_on_tune: false,
        };
        debug!(
            "SAT {} freq {}, {:?}, pos {}, sr {}, fec {:?}",
            system.delivery_system(),
            params.frequency,
            params.polarisation,
            params.orbital_position,
            params.symbol_rate,
            params.fec
        );
        params
    }
}

impl CableParameters {
    pub fn from_descriptor(d: &CableDeliveryDescriptor) -> Self {
        let fec_inner = match CodeRate::from_fec_inner(d.fec_inner) {
            Some(CodeRate::None) => CodeRate::None,
            Some(fec) if d.fec_inner <= 6 => fec,
            _ => {
                warn!("cable descriptor: FEC code {} out of range, using auto", d.fec_inner);
                CodeRate::Auto
            }
        };
        let modulation = CableModulation::from_code(d.modulation).unwrap_or_else(|| {
            warn!("cable descriptor: modulation {} out of range, using auto", d.modulation);
            CableModulation::Auto
        });

        let params = Self {
            frequency: d.frequency / 10,
            symbol_rate: d.symbol_rate.saturating_mul(100),
            modulation,
            inversion: Inversion::Auto,
            fec_inner,
        };
        debug!(
            "Cable freq {}, mod {:?}, sr {}, fec {:?}",
            params.frequency, params.modulation, params.symbol_rate, params.fec_inner
        );
        params
    }
}

impl TerrestrialParameters {
    pub fn from_descriptor(d: &TerrestrialDeliveryDescriptor) -> Self {
        let modulation = TerrestrialModulation::from_code(d.constellation).unwrap_or_else(|| {
            warn!(
                "terrestrial descriptor: constellation {} out of range, using auto",
                d.constellation
            );
            TerrestrialModulation::Auto
        });

        let params = Self {
            frequency: d.centre_frequency.saturating_mul(10),
            bandwidth: Bandwidth::from_code(d.bandwidth),
            code_rate_hp: CodeRate::from_terrestrial_code(d.code_rate_hp_stream),
            code_rate_lp: CodeRate::from_terrestrial_code(d.code_rate_lp_stream),
            modulation,
            transmission_mode: TransmissionMode::from_code(d.transmission_mode),
            guard_interval: GuardInterval::from_code(d.guard_interval),
            hierarchy: Hierarchy::from_code(d.hierarchy_information),
            inversion: Inversion::Auto,
            system: TerrestrialSystem::DvbT,
            plp_id: 0,
        };
        debug!(
            "Terr freq {}, bw {:?}, cr_hp {:?}, cr_lp {:?}, tm_mode {:?}, guard {:?}, hierarchy {:?}, const {:?}",
            params.frequency,
            params.bandwidth,
            params.code_rate_hp,
            params.code_rate_lp,
            params.transmission_mode,
            params.guard_interval,
            params.hierarchy,
            params.modulation
        );
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_satellite_descriptor() {
        let d = SatelliteDeliveryDescriptor {
            frequency: 1_183_600,
            orbital_position: 0x0192,
            west_east_flag: true,
            polarization: 0,
            roll_off: 0,
            modulation_system: 0,
            modulation_type: 2,
            symbol_rate: 275_000,
            fec_inner: 3,
        };
        let p = SatelliteParameters::from_descriptor(&d);
        assert_eq!(p.frequency, 11_836_000);
        assert_eq!(p.symbol_rate, 27_500_000);
        assert_eq!(p.orbital_position, 192);
        assert_eq!(p.fec, CodeRate::R3_4);
        // 8PSK is forced to QPSK on DVB-S
        assert_eq!(p.modulation, SatelliteModulation::Qpsk);
    }

    #[test]
    fn test_satellite_descriptor_west() {
        let d = SatelliteDeliveryDescriptor {
            orbital_position: 0x0300,
            west_east_flag: false,
            fec_inner: 12,
            ..Default::default()
        };
        let p = SatelliteParameters::from_descriptor(&d);
        assert_eq!(p.orbital_position, 3300);
        assert_eq!(p.fec, CodeRate::Auto);
    }

    #[test]
    fn test_cable_descriptor_clamps() {
        let d = CableDeliveryDescriptor {
            frequency: 3_460_000,
            modulation: 9,
            symbol_rate: 69_000,
            fec_inner: 8,
        };
        let p = CableParameters::from_descriptor(&d);
        assert_eq!(p.frequency, 346_000);
        assert_eq!(p.modulation, CableModulation::Auto);
        assert_eq!(p.fec_inner, CodeRate::Auto);
    }

    #[test]
    fn test_terrestrial_descriptor() {
        let d = TerrestrialDeliveryDescriptor {
            centre_frequency: 48_200_000,
            bandwidth: 0,
            constellation: 3,
            hierarchy_information: 0x5,
            code_rate_hp_stream: 2,
            code_rate_lp_stream: 7,
            guard_interval: 2,
            transmission_mode: 1,
        };
        let p = TerrestrialParameters::from_descriptor(&d);
        assert_eq!(p.frequency, 482_000_000);
        assert_eq!(p.bandwidth, Bandwidth::Bw8MHz);
        assert_eq!(p.modulation, TerrestrialModulation::Auto);
        assert_eq!(p.hierarchy, Hierarchy::H1);
        assert_eq!(p.code_rate_hp, CodeRate::R3_4);
        assert_eq!(p.code_rate_lp, CodeRate::Auto);
        assert_eq!(p.transmission_mode, TransmissionMode::Mode8k);
        assert_eq!(p.system, TerrestrialSystem::DvbT);
    }
}
