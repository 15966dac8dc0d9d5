//! Satellite equipment control programs.
//!
//! A program is a flat list of [`SecCommand`]s executed one instruction per
//! scheduler tick. Jumps are relative and clamped to the program bounds.

pub mod command;
pub mod sequence;

pub use command::{
    LockGate, RotorDirection, RotorGate, SecCommand, LOCK_CONFIRMATIONS, LOCK_SIGNAL_TOLERANCE,
    ROTOR_CONFIRMATIONS,
};
pub use sequence::SecSequence;
