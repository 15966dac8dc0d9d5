//! Configuration file and settings lookup.
//!
//! The TOML file describes the front-ends of a receiver, how they are linked
//! and how the antenna is wired:
//!
//! ```toml
//! [engine]
//! preferred_frontend = 0
//!
//! [[frontend]]
//! slot = 0
//! description = "BCM4506 (internal)"
//! dvbs2 = true
//!
//! [[frontend]]
//! slot = 1
//! linked_to = 0
//!
//! [[satellite.lnb]]
//! slots = [0, 1]
//! orbital_positions = [192]
//! committed_port = 0
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use log::debug;
use serde::Deserialize;
use thiserror::Error;

use dvbfe_params::{DeliverySystem, LockTimeouts};

use crate::authority::{BasicSatelliteAuthority, SatelliteConfig};
use crate::driver::{SimulatedDriver, SimulatedDriverConfig, SimulatedHandle};
use crate::error::EngineError;
use crate::frontend::{FrontendId, SlotInfo};
use crate::group::FrontendGroup;

/// Read-only settings store consulted by the engine.
pub trait ConfigSource: Send {
    fn lookup(&self, key: &str) -> Option<String>;
}

impl ConfigSource for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for this schema.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The settings are inconsistent.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The engine refused the resulting group.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Configuration file format.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub timeouts: LockTimeouts,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub frontend: Vec<FrontendSection>,
    #[serde(default)]
    pub satellite: SatelliteConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct EngineSection {
    /// Slot number preferred when scores are otherwise equal.
    pub preferred_frontend: Option<usize>,
    /// Abort SEC programs after this many instructions.
    pub tick_limit: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LoggingSection {
    pub log_dir: Option<String>,
    pub retention_days: Option<u64>,
    pub level: Option<String>,
}

/// One `[[frontend]]` entry.
#[derive(Debug, Deserialize)]
pub struct FrontendSection {
    pub slot: usize,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    #[serde(default)]
    pub dvbs2: bool,
    #[serde(default)]
    pub dvbt2: bool,
    #[serde(default)]
    pub delivery_system_whitelist: Vec<DeliverySystem>,
    /// Power an active terrestrial antenna with 5V.
    #[serde(default)]
    pub terrestrial_5v: bool,
    /// Slot number of the front-end whose antenna line this one shares.
    pub linked_to: Option<usize>,
    #[serde(default)]
    pub simulate: bool,
    #[serde(default)]
    pub driver: SimulatedDriverConfig,
}

impl FrontendSection {
    fn slot_info(&self) -> SlotInfo {
        let mut info = SlotInfo::new(
            self.slot,
            self.description
                .clone()
                .unwrap_or_else(|| format!("Simulated frontend {}", self.slot)),
        );
        info.enabled = self.enabled.unwrap_or(true);
        info.dvbs2 = self.dvbs2;
        info.dvbt2 = self.dvbt2;
        info.simulate = self.simulate;
        info
    }
}

/// Read and parse a configuration file.
pub fn load_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: ConfigFile = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

impl ConfigFile {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut slots = HashSet::new();
        for fe in &self.frontend {
            if !slots.insert(fe.slot) {
                return Err(ConfigError::Invalid(format!("slot {} defined twice", fe.slot)));
            }
        }
        for fe in &self.frontend {
            if let Some(target) = fe.linked_to {
                if !slots.contains(&target) {
                    return Err(ConfigError::Invalid(format!(
                        "slot {} linked to unknown slot {}",
                        fe.slot, target
                    )));
                }
            }
        }
        if let Some(preferred) = self.engine.preferred_frontend {
            if !slots.contains(&preferred) {
                return Err(ConfigError::Invalid(format!(
                    "preferred frontend {} is not configured",
                    preferred
                )));
            }
        }
        Ok(())
    }

    /// Settings answered through [`ConfigSource`].
    pub fn nim_settings(&self) -> HashMap<String, String> {
        self.frontend
            .iter()
            .map(|fe| {
                (
                    format!("config.Nims.{}.terrestrial_5V", fe.slot),
                    if fe.terrestrial_5v { "True" } else { "False" }.to_string(),
                )
            })
            .collect()
    }

    /// Build a group of simulated front-ends from this configuration.
    ///
    /// Returns the group and one journal handle per front-end, in
    /// [`FrontendId`] order.
    pub fn build_group(&self) -> Result<(FrontendGroup, Vec<SimulatedHandle>), ConfigError> {
        self.validate()?;
        let index_of: HashMap<usize, usize> = self
            .frontend
            .iter()
            .enumerate()
            .map(|(index, fe)| (fe.slot, index))
            .collect();

        let mut builder = FrontendGroup::builder()
            .authority(Box::new(BasicSatelliteAuthority::new(self.satellite.clone())))
            .config_source(Box::new(self.nim_settings()))
            .lock_timeouts(self.timeouts)
            .preferred_frontend(self.engine.preferred_frontend)
            .tick_limit(self.engine.tick_limit);

        let mut handles = Vec::with_capacity(self.frontend.len());
        for fe in &self.frontend {
            let driver = SimulatedDriver::new(fe.driver.clone());
            handles.push(driver.handle());
            builder = builder.frontend(fe.slot_info(), Box::new(driver));
        }
        for (index, fe) in self.frontend.iter().enumerate() {
            if let Some(target) = fe.linked_to.and_then(|slot| index_of.get(&slot)) {
                debug!("slot {} linked to slot {}", fe.slot, self.frontend[*target].slot);
                builder = builder.link(index, *target);
            }
        }

        let mut group = builder.build()?;
        for (index, fe) in self.frontend.iter().enumerate() {
            if !fe.delivery_system_whitelist.is_empty() {
                group.set_delivery_system_whitelist(
                    FrontendId(index),
                    fe.delivery_system_whitelist.iter().copied(),
                )?;
            }
        }
        Ok((group, handles))
    }

    /// [`FrontendId`] of a configured slot.
    pub fn frontend_id(&self, slot: usize) -> Option<FrontendId> {
        self.frontend
            .iter()
            .position(|fe| fe.slot == slot)
            .map(FrontendId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[engine]
preferred_frontend = 1
tick_limit = 5000

[timeouts]
cable_ms = 3000

[logging]
level = "debug"

[[frontend]]
slot = 0
description = "BCM4506 (internal)"
dvbs2 = true

[[frontend]]
slot = 1
linked_to = 0
delivery_system_whitelist = ["dvb-s"]

[[frontend]]
slot = 2
terrestrial_5v = true
[frontend.driver]
delivery_systems = ["dvb-t", "dvb-t2"]
lock_after_polls = 3

[[satellite.lnb]]
slots = [0, 1]
orbital_positions = [192, 235]
committed_port = 1
"#;

    #[test]
    fn test_parse_sample() {
        let config: ConfigFile = toml::from_str(SAMPLE).unwrap();
        config.validate().unwrap();
        assert_eq!(config.engine.preferred_frontend, Some(1));
        assert_eq!(config.timeouts.cable_ms, 3000);
        assert_eq!(config.timeouts.satellite_high_sr_ms, 5000);
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert_eq!(config.frontend.len(), 3);
        assert_eq!(config.frontend[2].driver.lock_after_polls, Some(3));
        assert_eq!(config.satellite.lnb[0].committed_port, Some(1));
        assert_eq!(config.satellite.lof_high, 10_600_000);
    }

    #[test]
    fn test_build_group() {
        let config: ConfigFile = toml::from_str(SAMPLE).unwrap();
        let (group, handles) = config.build_group().unwrap();
        assert_eq!(group.len(), 3);
        assert_eq!(handles.len(), 3);
        assert_eq!(group.sec_root(FrontendId(1)).unwrap(), FrontendId(0));
        assert_eq!(group.frontend_data(FrontendId(2)).unwrap().tuner_type, "DVB-T");
        assert!(!group
            .frontend(FrontendId(1))
            .unwrap()
            .supports_delivery_system(DeliverySystem::DvbS2, true));
        assert_eq!(config.frontend_id(2), Some(FrontendId(2)));
    }

    #[test]
    fn test_nim_settings() {
        let config: ConfigFile = toml::from_str(SAMPLE).unwrap();
        let settings = config.nim_settings();
        assert_eq!(settings.lookup("config.Nims.2.terrestrial_5V").as_deref(), Some("True"));
        assert_eq!(settings.lookup("config.Nims.0.terrestrial_5V").as_deref(), Some("False"));
        assert!(settings.lookup("config.Nims.9.terrestrial_5V").is_none());
    }

    #[test]
    fn test_invalid_links() {
        let config: ConfigFile = toml::from_str(
            r#"
[[frontend]]
slot = 0
linked_to = 4
"#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config: ConfigFile = toml::from_str(
            r#"
[[frontend]]
slot = 0
[[frontend]]
slot = 0
"#,
        )
        .unwrap();
        assert!(matches!(config.build_group(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_config(Path::new("/nonexistent/dvbfe.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
