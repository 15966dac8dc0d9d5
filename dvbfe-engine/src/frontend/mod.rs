//! Front-end state.
//!
//! A [`Frontend`] holds everything the engine tracks for one physical tuner:
//! lifecycle state, the SEC program in flight, interpreter counters and the
//! parameters last commanded. Frontends live in a
//! [`FrontendGroup`](crate::group::FrontendGroup) arena and are addressed by
//! [`FrontendId`].

pub mod data;
pub mod status;

use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use dvbfe_params::{DeliverySystem, TransponderParameters};

use crate::driver::TuneRequest;
use crate::sec::SecSequence;

pub use data::{DataSlot, RuntimeData, UNSET};
pub use status::{
    Bcm4506Curve, Bsbe2Curve, FrontendData, FrontendStatus, SnrCalibration,
};

/// Handle of a front-end inside its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrontendId(pub usize);

impl std::fmt::Display for FrontendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fe{}", self.0)
    }
}

/// Lifecycle state of a front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrontendState {
    Closed,
    Idle,
    Tuning,
    Locked,
    LostLock,
    Failed,
}

impl FrontendState {
    /// Label used by the status export.
    pub fn label(self) -> &'static str {
        match self {
            FrontendState::Idle => "IDLE",
            FrontendState::Tuning => "TUNING",
            FrontendState::Failed => "FAILED",
            FrontendState::Locked => "LOCKED",
            FrontendState::LostLock => "LOSTLOCK",
            FrontendState::Closed => "UNKNOWN",
        }
    }

    /// No further transition is expected without a new tune.
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            FrontendState::Locked | FrontendState::Failed | FrontendState::LostLock
        )
    }
}

/// State change notification published on the group's broadcast channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub frontend: FrontendId,
    pub state: FrontendState,
}

/// Timer operation requested by the engine, executed by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerRequest {
    /// Call `tick` after the delay.
    Tick(Duration),
    /// Stop calling `tick`.
    StopTick,
    /// Call `on_tune_timeout` after the delay unless disarmed.
    ArmDeadline(Duration),
    DisarmDeadline,
}

/// Result of running one SEC instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue(Duration),
    Finished,
}

/// Result of a close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CloseOutcome {
    Closed,
    /// A turn-off program is running; the front-end closes when it ends.
    Delayed,
}

/// Static slot description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotInfo {
    pub slot: usize,
    pub description: String,
    pub enabled: bool,
    /// Forces DVB-S2 support for drivers that cannot enumerate it.
    #[serde(default)]
    pub dvbs2: bool,
    /// Forces DVB-T2 support for drivers that cannot enumerate it.
    #[serde(default)]
    pub dvbt2: bool,
    /// Never drive hardware, run programs to completion at once.
    #[serde(default)]
    pub simulate: bool,
}

impl SlotInfo {
    pub fn new(slot: usize, description: impl Into<String>) -> Self {
        Self {
            slot,
            description: description.into(),
            enabled: true,
            dvbs2: false,
            dvbt2: false,
            simulate: false,
        }
    }

    /// NIMs with an LNBP21 supply need static current limiting while a
    /// rotor is turning.
    pub fn needs_rotor_workaround(&self) -> bool {
        ["Alps BSBE1", "Alps BSBE2", "Alps -S", "BCM4501"]
            .iter()
            .any(|prefix| self.description.contains(prefix))
    }
}

/// One physical front-end.
pub struct Frontend {
    pub(crate) info: SlotInfo,
    pub(crate) state: FrontendState,
    pub(crate) delivery_systems: BTreeSet<DeliverySystem>,
    pub(crate) whitelist: BTreeSet<DeliverySystem>,
    pub(crate) rotor_workaround: bool,
    pub(crate) sequence: SecSequence,
    /// Lock events seen while tuning, `0` when not tuning.
    pub(crate) tuning: u32,
    pub(crate) rotor_mode: bool,
    pub(crate) events_enabled: bool,
    pub(crate) timeout_count: i32,
    pub(crate) retry_count: i32,
    pub(crate) idle_input_power: [i32; 2],
    pub(crate) running_input_power: i32,
    pub(crate) request: Option<TuneRequest>,
    pub(crate) commanded: Option<TransponderParameters>,
    pub(crate) timers: VecDeque<TimerRequest>,
    pub(crate) calibration: Option<Box<dyn SnrCalibration>>,
}

impl Frontend {
    pub(crate) fn new(info: SlotInfo, delivery_systems: Vec<DeliverySystem>) -> Self {
        let mut systems: BTreeSet<DeliverySystem> = delivery_systems.into_iter().collect();
        if info.dvbs2 {
            systems.insert(DeliverySystem::DvbS2);
        }
        if info.dvbt2 {
            systems.insert(DeliverySystem::DvbT2);
        }
        let calibration = status::calibration_for(&info.description);
        let rotor_workaround = info.needs_rotor_workaround();
        Self {
            info,
            state: FrontendState::Closed,
            delivery_systems: systems,
            whitelist: BTreeSet::new(),
            rotor_workaround,
            sequence: SecSequence::new(),
            tuning: 0,
            rotor_mode: false,
            events_enabled: false,
            timeout_count: 0,
            retry_count: 0,
            idle_input_power: [0; 2],
            running_input_power: 0,
            request: None,
            commanded: None,
            timers: VecDeque::new(),
            calibration,
        }
    }

    pub fn info(&self) -> &SlotInfo {
        &self.info
    }

    pub fn state(&self) -> FrontendState {
        self.state
    }

    pub fn sequence(&self) -> &SecSequence {
        &self.sequence
    }

    pub fn is_simulated(&self) -> bool {
        self.info.simulate
    }

    pub fn rotor_mode(&self) -> bool {
        self.rotor_mode
    }

    /// Parameters of the last accepted tune.
    pub fn commanded(&self) -> Option<&TransponderParameters> {
        self.commanded.as_ref()
    }

    /// Whether the device advertises `system`, optionally filtered by the
    /// delivery system whitelist. An empty whitelist allows everything.
    pub fn supports_delivery_system(&self, system: DeliverySystem, obey_whitelist: bool) -> bool {
        if !self.delivery_systems.contains(&system) {
            return false;
        }
        !obey_whitelist || self.whitelist.is_empty() || self.whitelist.contains(&system)
    }

    pub fn set_delivery_system_whitelist(&mut self, whitelist: impl IntoIterator<Item = DeliverySystem>) {
        self.whitelist = whitelist.into_iter().collect();
    }

    pub fn set_calibration(&mut self, calibration: Option<Box<dyn SnrCalibration>>) {
        self.calibration = calibration;
    }

    pub(crate) fn push_timer(&mut self, request: TimerRequest) {
        self.timers.push_back(request);
    }
}
