//! Enumerated transponder fields.
//!
//! Every enum that can be left to the demodulator carries an explicit `Auto`
//! variant. `Auto` means "accept the driver default" and is never used to
//! declare two transponders different.
//!
//! The numeric codes accepted by the `from_code` constructors follow the
//! delivery system descriptor tables of EN 300 468.

use serde::{Deserialize, Serialize};

/// Delivery system identifiers advertised by a front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliverySystem {
    /// DVB-S (QPSK)
    DvbS,
    /// DVB-S2
    DvbS2,
    /// DVB-C Annex A/C
    DvbC,
    /// DVB-T
    DvbT,
    /// DVB-T2
    DvbT2,
}

impl DeliverySystem {
    /// Human readable name as used in logs and status output.
    pub fn name(self) -> &'static str {
        match self {
            DeliverySystem::DvbS => "DVB-S",
            DeliverySystem::DvbS2 => "DVB-S2",
            DeliverySystem::DvbC => "DVB-C",
            DeliverySystem::DvbT => "DVB-T",
            DeliverySystem::DvbT2 => "DVB-T2",
        }
    }
}

impl std::fmt::Display for DeliverySystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Front-end family, one per [`crate::TransponderParameters`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontendType {
    Satellite,
    Cable,
    Terrestrial,
}

impl FrontendType {
    pub fn name(self) -> &'static str {
        match self {
            FrontendType::Satellite => "DVB-S",
            FrontendType::Cable => "DVB-C",
            FrontendType::Terrestrial => "DVB-T",
        }
    }
}

impl std::fmt::Display for FrontendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Spectral inversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Inversion {
    Off,
    On,
    #[default]
    Auto,
}

/// Satellite polarisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarisation {
    Horizontal = 0,
    Vertical = 1,
    CircularLeft = 2,
    CircularRight = 3,
}

impl Polarisation {
    pub fn from_code(code: u8) -> Self {
        match code & 0x3 {
            0 => Polarisation::Horizontal,
            1 => Polarisation::Vertical,
            2 => Polarisation::CircularLeft,
            _ => Polarisation::CircularRight,
        }
    }

    /// Raw two-bit value, used by the lossy transponder hash.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Horizontal and circular-left are fed with the high LNB voltage.
    pub fn is_high_voltage(self) -> bool {
        matches!(self, Polarisation::Horizontal | Polarisation::CircularLeft)
    }
}

/// Inner forward error correction rate.
///
/// Shared by the satellite, cable and terrestrial records; each delivery
/// system only accepts a subset of the rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CodeRate {
    #[default]
    Auto,
    #[serde(rename = "1/2")]
    R1_2,
    #[serde(rename = "2/3")]
    R2_3,
    #[serde(rename = "3/4")]
    R3_4,
    #[serde(rename = "5/6")]
    R5_6,
    #[serde(rename = "7/8")]
    R7_8,
    #[serde(rename = "8/9")]
    R8_9,
    #[serde(rename = "3/5")]
    R3_5,
    #[serde(rename = "4/5")]
    R4_5,
    #[serde(rename = "9/10")]
    R9_10,
    #[serde(rename = "6/7")]
    R6_7,
    None,
}

impl CodeRate {
    /// Decode a satellite/cable `FEC_inner` field.
    ///
    /// Returns `None` for reserved codes; `0` ("not defined") maps to `Auto`.
    pub fn from_fec_inner(code: u8) -> Option<Self> {
        Some(match code {
            0 => CodeRate::Auto,
            1 => CodeRate::R1_2,
            2 => CodeRate::R2_3,
            3 => CodeRate::R3_4,
            4 => CodeRate::R5_6,
            5 => CodeRate::R7_8,
            6 => CodeRate::R8_9,
            7 => CodeRate::R3_5,
            8 => CodeRate::R4_5,
            9 => CodeRate::R9_10,
            15 => CodeRate::None,
            _ => return None,
        })
    }

    /// Decode a terrestrial HP/LP code rate field.
    pub fn from_terrestrial_code(code: u8) -> Self {
        match code {
            0 => CodeRate::R1_2,
            1 => CodeRate::R2_3,
            2 => CodeRate::R3_4,
            3 => CodeRate::R5_6,
            4 => CodeRate::R7_8,
            _ => CodeRate::Auto,
        }
    }

    /// Rates a DVB-S demodulator can be commanded with.
    pub fn valid_for_dvbs(self) -> bool {
        matches!(
            self,
            CodeRate::Auto
                | CodeRate::None
                | CodeRate::R1_2
                | CodeRate::R2_3
                | CodeRate::R3_4
                | CodeRate::R5_6
                | CodeRate::R7_8
        )
    }

    /// DVB-S2 has no automatic rate detection.
    pub fn valid_for_dvbs2(self) -> bool {
        matches!(
            self,
            CodeRate::R1_2
                | CodeRate::R2_3
                | CodeRate::R3_4
                | CodeRate::R3_5
                | CodeRate::R4_5
                | CodeRate::R5_6
                | CodeRate::R7_8
                | CodeRate::R8_9
                | CodeRate::R9_10
        )
    }
}

/// Satellite modulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SatelliteModulation {
    #[default]
    Auto,
    Qpsk,
    #[serde(rename = "8psk")]
    Psk8,
    Qam16,
}

impl SatelliteModulation {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => SatelliteModulation::Qpsk,
            2 => SatelliteModulation::Psk8,
            3 => SatelliteModulation::Qam16,
            _ => SatelliteModulation::Auto,
        }
    }
}

/// Satellite delivery system generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SatelliteSystem {
    #[default]
    #[serde(rename = "DVB-S")]
    DvbS,
    #[serde(rename = "DVB-S2")]
    DvbS2,
}

impl SatelliteSystem {
    pub fn delivery_system(self) -> DeliverySystem {
        match self {
            SatelliteSystem::DvbS => DeliverySystem::DvbS,
            SatelliteSystem::DvbS2 => DeliverySystem::DvbS2,
        }
    }
}

/// DVB-S2 roll-off factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RollOff {
    #[default]
    #[serde(rename = "0.35")]
    Alpha035,
    #[serde(rename = "0.25")]
    Alpha025,
    #[serde(rename = "0.20")]
    Alpha020,
}

impl RollOff {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => RollOff::Alpha025,
            2 => RollOff::Alpha020,
            _ => RollOff::Alpha035,
        }
    }
}

/// DVB-S2 pilot symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pilot {
    Off,
    On,
    #[default]
    Auto,
}

/// Cable constellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CableModulation {
    #[default]
    Auto,
    Qam16,
    Qam32,
    Qam64,
    Qam128,
    Qam256,
}

impl CableModulation {
    /// Returns `None` for codes beyond 256-QAM.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => CableModulation::Auto,
            1 => CableModulation::Qam16,
            2 => CableModulation::Qam32,
            3 => CableModulation::Qam64,
            4 => CableModulation::Qam128,
            5 => CableModulation::Qam256,
            _ => return None,
        })
    }
}

/// Terrestrial channel bandwidth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Bandwidth {
    #[serde(rename = "8MHz")]
    Bw8MHz,
    #[serde(rename = "7MHz")]
    Bw7MHz,
    #[serde(rename = "6MHz")]
    Bw6MHz,
    #[serde(rename = "5MHz")]
    Bw5MHz,
    #[serde(rename = "10MHz")]
    Bw10MHz,
    #[serde(rename = "1.712MHz")]
    Bw1_712MHz,
    #[default]
    #[serde(rename = "auto")]
    Auto,
}

impl Bandwidth {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Bandwidth::Bw8MHz,
            1 => Bandwidth::Bw7MHz,
            2 => Bandwidth::Bw6MHz,
            3 => Bandwidth::Bw5MHz,
            4 => Bandwidth::Bw10MHz,
            5 => Bandwidth::Bw1_712MHz,
            _ => Bandwidth::Auto,
        }
    }

    /// Bandwidth in Hz, `0` for automatic detection.
    pub fn hz(self) -> u32 {
        match self {
            Bandwidth::Bw8MHz => 8_000_000,
            Bandwidth::Bw7MHz => 7_000_000,
            Bandwidth::Bw6MHz => 6_000_000,
            Bandwidth::Bw5MHz => 5_000_000,
            Bandwidth::Bw10MHz => 10_000_000,
            Bandwidth::Bw1_712MHz => 1_712_000,
            Bandwidth::Auto => 0,
        }
    }

    pub fn from_hz(hz: u32) -> Self {
        match hz {
            8_000_000 => Bandwidth::Bw8MHz,
            7_000_000 => Bandwidth::Bw7MHz,
            6_000_000 => Bandwidth::Bw6MHz,
            5_000_000 => Bandwidth::Bw5MHz,
            10_000_000 => Bandwidth::Bw10MHz,
            1_712_000 => Bandwidth::Bw1_712MHz,
            _ => Bandwidth::Auto,
        }
    }
}

/// Terrestrial constellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerrestrialModulation {
    Qpsk,
    Qam16,
    Qam64,
    Qam256,
    #[default]
    Auto,
}

impl TerrestrialModulation {
    /// Returns `None` for the reserved code.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => TerrestrialModulation::Qpsk,
            1 => TerrestrialModulation::Qam16,
            2 => TerrestrialModulation::Qam64,
            _ => return None,
        })
    }
}

/// OFDM transmission mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransmissionMode {
    #[serde(rename = "2k")]
    Mode2k,
    #[serde(rename = "8k")]
    Mode8k,
    #[serde(rename = "4k")]
    Mode4k,
    #[serde(rename = "1k")]
    Mode1k,
    #[serde(rename = "16k")]
    Mode16k,
    #[serde(rename = "32k")]
    Mode32k,
    #[default]
    #[serde(rename = "auto")]
    Auto,
}

impl TransmissionMode {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => TransmissionMode::Mode2k,
            1 => TransmissionMode::Mode8k,
            2 => TransmissionMode::Mode4k,
            3 => TransmissionMode::Mode1k,
            4 => TransmissionMode::Mode16k,
            5 => TransmissionMode::Mode32k,
            _ => TransmissionMode::Auto,
        }
    }
}

/// OFDM guard interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GuardInterval {
    #[serde(rename = "1/32")]
    G1_32,
    #[serde(rename = "1/16")]
    G1_16,
    #[serde(rename = "1/8")]
    G1_8,
    #[serde(rename = "1/4")]
    G1_4,
    #[serde(rename = "1/128")]
    G1_128,
    #[serde(rename = "19/128")]
    G19_128,
    #[serde(rename = "19/256")]
    G19_256,
    #[default]
    #[serde(rename = "auto")]
    Auto,
}

impl GuardInterval {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => GuardInterval::G1_32,
            1 => GuardInterval::G1_16,
            2 => GuardInterval::G1_8,
            3 => GuardInterval::G1_4,
            4 => GuardInterval::G1_128,
            5 => GuardInterval::G19_128,
            6 => GuardInterval::G19_256,
            _ => GuardInterval::Auto,
        }
    }
}

/// Hierarchy information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hierarchy {
    None,
    #[serde(rename = "1")]
    H1,
    #[serde(rename = "2")]
    H2,
    #[serde(rename = "4")]
    H4,
    #[default]
    Auto,
}

impl Hierarchy {
    /// Only the lower two bits of the descriptor field carry the alpha value.
    pub fn from_code(code: u8) -> Self {
        match code & 0x3 {
            0 => Hierarchy::None,
            1 => Hierarchy::H1,
            2 => Hierarchy::H2,
            _ => Hierarchy::H4,
        }
    }
}

/// Terrestrial delivery system generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TerrestrialSystem {
    #[default]
    #[serde(rename = "DVB-T")]
    DvbT,
    #[serde(rename = "DVB-T2")]
    DvbT2,
}

impl TerrestrialSystem {
    pub fn delivery_system(self) -> DeliverySystem {
        match self {
            TerrestrialSystem::DvbT => DeliverySystem::DvbT,
            TerrestrialSystem::DvbT2 => DeliverySystem::DvbT2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fec_inner_codes() {
        assert_eq!(CodeRate::from_fec_inner(0), Some(CodeRate::Auto));
        assert_eq!(CodeRate::from_fec_inner(3), Some(CodeRate::R3_4));
        assert_eq!(CodeRate::from_fec_inner(9), Some(CodeRate::R9_10));
        assert_eq!(CodeRate::from_fec_inner(15), Some(CodeRate::None));
        assert_eq!(CodeRate::from_fec_inner(12), None);
    }

    #[test]
    fn test_dvbs2_rejects_auto_rate() {
        assert!(!CodeRate::Auto.valid_for_dvbs2());
        assert!(!CodeRate::None.valid_for_dvbs2());
        assert!(CodeRate::R9_10.valid_for_dvbs2());
        assert!(CodeRate::Auto.valid_for_dvbs());
        assert!(!CodeRate::R9_10.valid_for_dvbs());
    }

    #[test]
    fn test_polarisation_voltage() {
        assert!(Polarisation::Horizontal.is_high_voltage());
        assert!(Polarisation::CircularLeft.is_high_voltage());
        assert!(!Polarisation::Vertical.is_high_voltage());
        assert_eq!(Polarisation::from_code(0x5), Polarisation::Vertical);
    }

    #[test]
    fn test_bandwidth_hz() {
        assert_eq!(Bandwidth::from_hz(Bandwidth::Bw1_712MHz.hz()), Bandwidth::Bw1_712MHz);
        assert_eq!(Bandwidth::from_hz(0), Bandwidth::Auto);
        assert_eq!(Bandwidth::from_code(7), Bandwidth::Auto);
    }
}
