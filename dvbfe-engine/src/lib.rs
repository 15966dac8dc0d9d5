//! Transponder tuning engine for DVB front-ends.
//!
//! The engine turns a [`TransponderParameters`] request into a sequence of
//! hardware commands and drives it to lock:
//!
//! - [`sec`]: satellite equipment control programs (voltage, tone, DiSEqC,
//!   rotor movement, lock polling)
//! - [`authority`]: antenna wiring, builds the SEC program for a satellite
//!   transponder
//! - [`group`]: front-ends sharing antenna lines, their lifecycle and the
//!   program interpreter
//! - [`scoring`]: how well a front-end can tune a transponder
//! - [`runner`]: tokio tasks executing the timers the group requests
//! - [`driver`]: hardware seam and an in-memory simulated driver
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use dvbfe_engine::config::load_config;
//! use dvbfe_engine::runner::FrontendRunner;
//! use dvbfe_engine::FrontendId;
//!
//! # async fn run(params: dvbfe_params::TransponderParameters) -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("dvbfe.toml".as_ref())?;
//! let (group, _handles) = config.build_group()?;
//! let best = group.best_frontend(&params).map(|(id, _)| id).unwrap_or(FrontendId(0));
//!
//! let runner = FrontendRunner::start(group);
//! runner.acquire(best).await?;
//! runner.tune(best, params).await?;
//! let state = runner.wait_for_settled(best, Duration::from_secs(10)).await?;
//! println!("{} is {}", best, state.label());
//! # Ok(())
//! # }
//! ```

pub mod authority;
pub mod config;
pub mod driver;
pub mod error;
pub mod frontend;
pub mod group;
pub mod runner;
pub mod scoring;
pub mod sec;

pub use dvbfe_params::TransponderParameters;
pub use error::{EngineError, Result};
pub use frontend::{CloseOutcome, FrontendId, FrontendState, StateChange};
pub use group::{FrontendGroup, FrontendGroupBuilder};
pub use runner::FrontendRunner;
