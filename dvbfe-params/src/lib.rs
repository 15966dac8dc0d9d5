//! Transponder parameter model for the dvbfe tuning engine.
//!
//! This crate describes what a front-end is asked to tune:
//!
//! - [`TransponderParameters`]: satellite, cable or terrestrial transponder
//! - [`TransponderParameters::difference`] and [`TransponderParameters::hash`]:
//!   similarity metric and lossy dedup key
//! - [`TransponderParameters::lock_timeout`]: expected time to lock
//! - [`DiseqcCommand`]: raw DiSEqC master command
//! - descriptor mapping from delivery system descriptors
//!
//! # Example
//!
//! ```rust
//! use dvbfe_params::{SatelliteParameters, TransponderParameters, Polarisation};
//!
//! let a = TransponderParameters::Satellite(SatelliteParameters {
//!     frequency: 11_836_000,
//!     symbol_rate: 27_500_000,
//!     polarisation: Polarisation::Horizontal,
//!     orbital_position: 192,
//!     ..Default::default()
//! });
//! assert_eq!(a.difference(&a, true), 0);
//! assert_eq!(a.lock_timeout().as_millis(), 5000);
//! ```

pub mod descriptor;
pub mod diseqc;
pub mod error;
pub mod transponder;
pub mod types;

pub use descriptor::{CableDeliveryDescriptor, SatelliteDeliveryDescriptor, TerrestrialDeliveryDescriptor};
pub use diseqc::{DiseqcCommand, DISEQC_MAX_LEN};
pub use error::ParamError;
pub use transponder::{
    CableParameters, LockTimeouts, SatelliteParameters, TerrestrialParameters,
    TransponderParameters, DIFF_EXACT, DIFF_POLARISATION, DIFF_POSITION, DIFF_TYPE,
};
pub use types::*;
