//! SEC instructions.

use dvbfe_params::DiseqcCommand;

use crate::driver::{PowerLimitingMode, Tone, Toneburst, Voltage};

/// Which rotor transition an input power gate waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotorDirection {
    /// Running power departs from the idle baseline by at least `delta`.
    Running,
    /// Running power is back within `delta` of the idle baseline.
    Stopped,
}

impl RotorDirection {
    pub fn label(self) -> &'static str {
        match self {
            RotorDirection::Running => "running",
            RotorDirection::Stopped => "stopped",
        }
    }
}

/// State of an `IfInputpowerDeltaGoto` gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotorGate {
    pub direction: RotorDirection,
    pub delta: i32,
    pub steps: i32,
    /// Consecutive successful polls.
    pub okcount: u32,
}

/// State of an `IfTunerLockedGoto` gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockGate {
    pub steps: i32,
    /// Consecutive polls with a stable locked signal.
    pub okcount: u32,
    /// Signal quality recorded on the first good poll.
    pub baseline: Option<i32>,
}

/// Polls a rotor gate must see in a row before it jumps (jumps on the 7th).
pub const ROTOR_CONFIRMATIONS: u32 = 6;
/// Polls a lock gate must see in a row before it jumps (jumps on the 5th).
pub const LOCK_CONFIRMATIONS: u32 = 4;
/// Maximum drift from the lock baseline, in signal quality units.
pub const LOCK_SIGNAL_TOLERANCE: i32 = 40;

/// One SEC instruction.
///
/// Jump targets are relative to the instruction itself; a jump landing past
/// the end of the program completes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecCommand {
    Sleep(u32),
    Goto(i32),
    SetVoltage(Voltage),
    SetTone(Tone),
    SendDiseqc(DiseqcCommand),
    SendToneburst(Toneburst),
    SetFrontend { events: bool },
    StartTuneTimeout(u32),
    SetTimeoutCounter(i32),
    IfVoltageGoto { voltage: Voltage, steps: i32 },
    IfNotVoltageGoto { voltage: Voltage, steps: i32 },
    IfToneGoto { tone: Tone, steps: i32 },
    IfNotToneGoto { tone: Tone, steps: i32 },
    IfTimeoutGoto(i32),
    IfNoMoreRetriesGoto(i32),
    IfRotorPosValidGoto(i32),
    IfInputpowerDeltaGoto(RotorGate),
    IfTunerLockedGoto(LockGate),
    IfMeasureIdleFailedGoto { slot: u8, steps: i32 },
    InvalidateCurrentSwitchParams,
    CommitCurrentSwitchParams,
    InvalidateCurrentRotorParams,
    CommitCurrentRotorParams,
    SetRotorRetryBudget(i32),
    MeasureIdleInputPower(u8),
    MeasureRunningInputPower,
    SetRotorMoving(bool),
    SetPowerLimitingMode(PowerLimitingMode),
    DelayedCloseFrontend,
}

impl SecCommand {
    pub fn if_inputpower_delta(direction: RotorDirection, delta: i32, steps: i32) -> Self {
        SecCommand::IfInputpowerDeltaGoto(RotorGate {
            direction,
            delta,
            steps,
            okcount: 0,
        })
    }

    pub fn if_tuner_locked(steps: i32) -> Self {
        SecCommand::IfTunerLockedGoto(LockGate {
            steps,
            okcount: 0,
            baseline: None,
        })
    }
}
