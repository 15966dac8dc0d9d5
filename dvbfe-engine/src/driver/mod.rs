//! Device driver boundary.
//!
//! The engine never touches hardware registers itself. Each physical
//! front-end is represented by a [`FrontendDriver`] that accepts the SEC
//! primitive commands, reports asynchronous lock events and exposes raw
//! readings.
//!
//! - [`SimulatedDriver`]: scriptable in-memory driver with a command journal

pub mod simulated;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use dvbfe_params::{DeliverySystem, DiseqcCommand, TransponderParameters};

pub use simulated::{DriverCommand, SimulatedDriver, SimulatedDriverConfig, SimulatedHandle};

/// Errors reported by a device driver.
#[derive(Error, Debug)]
pub enum DriverError {
    /// I/O failure talking to the device.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device does not implement this command.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The device refused the command or its arguments.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// The device is not open.
    #[error("Device not open")]
    NotOpen,
}

/// LNB supply voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Voltage {
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "13V")]
    V13,
    #[serde(rename = "18V")]
    V18,
    #[serde(rename = "13.5V")]
    V13_5,
    #[serde(rename = "18.5V")]
    V18_5,
}

impl Voltage {
    /// Value stored in the `CurVoltage` runtime slot.
    pub fn code(self) -> i64 {
        match self {
            Voltage::Off => 0,
            Voltage::V13 => 1,
            Voltage::V18 => 2,
            Voltage::V13_5 => 3,
            Voltage::V18_5 => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => Voltage::Off,
            1 => Voltage::V13,
            2 => Voltage::V18,
            3 => Voltage::V13_5,
            4 => Voltage::V18_5,
            _ => return None,
        })
    }

    /// 13.5V and 18.5V are the base levels with the high-voltage boost.
    pub fn is_increased(self) -> bool {
        matches!(self, Voltage::V13_5 | Voltage::V18_5)
    }

    /// Both 13V levels share one idle input power baseline.
    pub fn is_low(self) -> bool {
        matches!(self, Voltage::V13 | Voltage::V13_5)
    }
}

/// 22 kHz continuous tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    On,
    Off,
}

impl Tone {
    pub fn code(self) -> i64 {
        match self {
            Tone::On => 0,
            Tone::Off => 1,
        }
    }
}

/// Mini DiSEqC (tone burst) satellite selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toneburst {
    A,
    B,
}

impl Toneburst {
    pub fn code(self) -> i64 {
        match self {
            Toneburst::A => 0,
            Toneburst::B => 1,
        }
    }
}

/// LNB supply current limiting, switched to static while a rotor turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerLimitingMode {
    Static,
    Dynamic,
}

/// Parameters handed to the demodulator.
///
/// `frequency` is the value programmed into the tuner: the intermediate
/// frequency in kHz for satellite, Hz for cable and terrestrial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuneRequest {
    pub frequency: u32,
    pub params: TransponderParameters,
}

/// One asynchronous front-end event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrontendEvent {
    pub has_lock: bool,
    pub timed_out: bool,
}

/// Lock/sync status bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusFlags {
    pub locked: bool,
    pub synced: bool,
}

/// Sender used by a driver to signal "events available".
pub type ReadinessSender = mpsc::UnboundedSender<()>;

/// Capability object for one physical front-end.
pub trait FrontendDriver: Send {
    fn open(&mut self) -> Result<(), DriverError>;
    fn close(&mut self) -> Result<(), DriverError>;
    fn is_open(&self) -> bool;

    /// Delivery systems enumerated from the device.
    fn delivery_systems(&self) -> Vec<DeliverySystem>;

    fn set_voltage(&mut self, voltage: Voltage) -> Result<(), DriverError>;
    fn set_tone(&mut self, tone: Tone) -> Result<(), DriverError>;
    fn send_diseqc(&mut self, command: &DiseqcCommand) -> Result<(), DriverError>;
    fn send_toneburst(&mut self, burst: Toneburst) -> Result<(), DriverError>;
    fn set_frontend(&mut self, request: &TuneRequest) -> Result<(), DriverError>;
    fn set_power_limiting(&mut self, mode: PowerLimitingMode) -> Result<(), DriverError>;

    /// Pop the next pending event, `Ok(None)` once the queue is drained.
    fn poll_event(&mut self) -> Result<Option<FrontendEvent>, DriverError>;

    fn read_status(&mut self) -> Result<StatusFlags, DriverError>;
    fn read_snr(&mut self) -> Result<u16, DriverError>;
    fn read_ber(&mut self) -> Result<u32, DriverError>;
    fn read_signal_strength(&mut self) -> Result<u16, DriverError>;
    /// Instantaneous LNB supply current/power in driver units.
    fn read_input_power(&mut self) -> Result<i32, DriverError>;

    /// Parameters read back from the demodulator.
    fn get_frontend(&mut self) -> Result<TuneRequest, DriverError>;

    /// Register the channel used to signal event readiness.
    fn attach_readiness(&mut self, _tx: ReadinessSender) {}
}
