//! Per front-end runtime data.
//!
//! Switch and rotor fields describe the antenna line, so for linked
//! front-ends they are only ever read and written on the sec front-end of
//! the chain.

use serde::Serialize;

/// Value of a runtime field that is not known.
pub const UNSET: i64 = -1;

/// Runtime data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSlot {
    /// Committed DiSEqC switch command currently applied.
    Csw,
    /// Uncommitted DiSEqC switch command currently applied.
    Ucsw,
    Toneburst,
    CurVoltage,
    CurTone,
    NewCsw,
    NewUcsw,
    NewToneburst,
    /// Stored position command the rotor last moved to.
    RotorCmd,
    /// Orbital position the rotor points at.
    RotorPos,
    NewRotorCmd,
    NewRotorPos,
    LinkableCsw,
    LinkableUcsw,
    LinkableToneburst,
    /// Unicable user band in use, `UNSET` when not a SATCR installation.
    Satcr,
    /// LNB local oscillator added to the read-back frequency.
    FreqOffset,
}

impl DataSlot {
    pub const COUNT: usize = 17;

    pub const ALL: [DataSlot; DataSlot::COUNT] = [
        DataSlot::Csw,
        DataSlot::Ucsw,
        DataSlot::Toneburst,
        DataSlot::CurVoltage,
        DataSlot::CurTone,
        DataSlot::NewCsw,
        DataSlot::NewUcsw,
        DataSlot::NewToneburst,
        DataSlot::RotorCmd,
        DataSlot::RotorPos,
        DataSlot::NewRotorCmd,
        DataSlot::NewRotorPos,
        DataSlot::LinkableCsw,
        DataSlot::LinkableUcsw,
        DataSlot::LinkableToneburst,
        DataSlot::Satcr,
        DataSlot::FreqOffset,
    ];
}

/// Fixed-size table of signed runtime values, all `UNSET` initially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuntimeData {
    values: [i64; DataSlot::COUNT],
}

impl Default for RuntimeData {
    fn default() -> Self {
        Self {
            values: [UNSET; DataSlot::COUNT],
        }
    }
}

impl RuntimeData {
    pub fn get(&self, slot: DataSlot) -> i64 {
        self.values[slot as usize]
    }

    pub fn set(&mut self, slot: DataSlot, value: i64) {
        self.values[slot as usize] = value;
    }

    pub fn is_set(&self, slot: DataSlot) -> bool {
        self.get(slot) != UNSET
    }

    /// Forget which switch position the antenna line is on.
    pub fn reset_switch(&mut self) {
        self.set(DataSlot::Csw, UNSET);
        self.set(DataSlot::Ucsw, UNSET);
        self.set(DataSlot::Toneburst, UNSET);
    }

    pub fn reset_linkable(&mut self) {
        self.set(DataSlot::LinkableCsw, UNSET);
        self.set(DataSlot::LinkableUcsw, UNSET);
        self.set(DataSlot::LinkableToneburst, UNSET);
    }

    pub fn reset_rotor(&mut self) {
        self.set(DataSlot::RotorCmd, UNSET);
        self.set(DataSlot::RotorPos, UNSET);
    }

    pub fn commit_switch(&mut self) {
        self.set(DataSlot::Csw, self.get(DataSlot::NewCsw));
        self.set(DataSlot::Ucsw, self.get(DataSlot::NewUcsw));
        self.set(DataSlot::Toneburst, self.get(DataSlot::NewToneburst));
    }

    pub fn commit_rotor(&mut self) {
        self.set(DataSlot::RotorCmd, self.get(DataSlot::NewRotorCmd));
        self.set(DataSlot::RotorPos, self.get(DataSlot::NewRotorPos));
    }
}
