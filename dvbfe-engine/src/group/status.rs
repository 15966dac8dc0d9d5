//! Status export for group members.

use log::debug;

use dvbfe_params::{DeliverySystem, TransponderParameters};

use super::FrontendGroup;
use crate::driver::StatusFlags;
use crate::error::Result;
use crate::frontend::status::scale_quality;
use crate::frontend::{DataSlot, FrontendData, FrontendId, FrontendState, FrontendStatus};

impl FrontendGroup {
    /// Live readings of `id`. Closed and simulated front-ends report zeros.
    pub fn status(&mut self, id: FrontendId) -> Result<FrontendStatus> {
        let i = self.index(id)?;
        let fe = &self.frontends[i];
        let live = fe.state != FrontendState::Closed && !fe.is_simulated();

        let (flags, ber, power, snr) = if live {
            let driver = &mut self.drivers[i];
            let flags = driver.read_status().unwrap_or_else(|e| {
                debug!("{}: status read failed: {}", id, e);
                StatusFlags::default()
            });
            let ber = driver.read_ber().unwrap_or(0);
            let power = driver.read_signal_strength().unwrap_or(0);
            let snr = driver.read_snr().unwrap_or(0);
            (flags, ber, power, snr)
        } else {
            (StatusFlags::default(), 0, 0, 0)
        };

        let fe = &self.frontends[i];
        let (quality, quality_db) = match &fe.calibration {
            Some(curve) => {
                let centi_db = curve.centi_db(snr);
                let quality = match &fe.commanded {
                    Some(params) => {
                        scale_quality(centi_db, params.frontend_type(), curve.satellite_max())
                    }
                    None => centi_db.max(0) as u32,
                };
                (quality, Some(centi_db))
            }
            None => (snr as u32, None),
        };

        Ok(FrontendStatus {
            tuner_state: fe.state.label(),
            tuner_locked: flags.locked,
            tuner_synced: flags.synced,
            tuner_bit_error_rate: ber,
            tuner_signal_quality: quality,
            tuner_signal_quality_db: quality_db,
            tuner_signal_power: power,
            timestamp: chrono::Local::now().to_rfc3339(),
        })
    }

    /// Parameters of the current transponder.
    ///
    /// With `original` the commanded parameters are returned unchanged,
    /// otherwise the demodulator read-back translated to transponder
    /// frequency. `None` before the first tune.
    pub fn transponder_data(
        &mut self,
        id: FrontendId,
        original: bool,
    ) -> Result<Option<TransponderParameters>> {
        let i = self.index(id)?;
        let fe = &self.frontends[i];
        let Some(commanded) = fe.commanded else {
            return Ok(None);
        };
        if original || fe.is_simulated() || fe.state == FrontendState::Closed {
            return Ok(Some(commanded));
        }

        let readback = match self.drivers[i].get_frontend() {
            Ok(readback) => readback,
            Err(e) => {
                debug!("{}: read back failed, using commanded: {}", id, e);
                return Ok(Some(commanded));
            }
        };

        let params = match (readback.params, commanded) {
            (TransponderParameters::Satellite(mut p), TransponderParameters::Satellite(cmd)) => {
                let offset = self.data[i].get(DataSlot::FreqOffset);
                let offset = if self.data[i].is_set(DataSlot::FreqOffset) { offset } else { 0 };
                p.frequency = (readback.frequency as i64 + offset).max(0) as u32;
                p.orbital_position = cmd.orbital_position;
                p.polarisation = cmd.polarisation;
                TransponderParameters::Satellite(p)
            }
            (TransponderParameters::Cable(mut p), TransponderParameters::Cable(_)) => {
                p.frequency = readback.frequency / 1000;
                TransponderParameters::Cable(p)
            }
            (TransponderParameters::Terrestrial(mut p), TransponderParameters::Terrestrial(_)) => {
                p.frequency = readback.frequency;
                TransponderParameters::Terrestrial(p)
            }
            _ => commanded,
        };
        Ok(Some(params))
    }

    /// Slot number and tuner family of `id`.
    pub fn frontend_data(&self, id: FrontendId) -> Result<FrontendData> {
        let fe = &self.frontends[self.index(id)?];
        let has = |system| fe.supports_delivery_system(system, true);
        let tuner_type = if has(DeliverySystem::DvbS) || has(DeliverySystem::DvbS2) {
            "DVB-S"
        } else if has(DeliverySystem::DvbC) {
            "DVB-C"
        } else if has(DeliverySystem::DvbT) || has(DeliverySystem::DvbT2) {
            "DVB-T"
        } else {
            "UNKNOWN"
        };
        Ok(FrontendData {
            tuner_number: fe.info.slot,
            tuner_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{astra, astra_authority, driver_with, linked_pair};
    use super::*;
    use crate::driver::SimulatedDriverConfig;
    use crate::frontend::SlotInfo;
    use dvbfe_params::CableParameters;

    #[test]
    fn test_status_of_closed_frontend() {
        let (mut group, _, _) = linked_pair();
        let status = group.status(FrontendId(0)).unwrap();
        assert_eq!(status.tuner_state, "UNKNOWN");
        assert!(!status.tuner_locked);
        assert_eq!(status.tuner_signal_quality, 0);
        assert!(status.tuner_signal_quality_db.is_none());
    }

    #[test]
    fn test_calibrated_quality() {
        let (driver, handle) = driver_with(SimulatedDriverConfig::default());
        let mut group = FrontendGroup::builder()
            .frontend(SlotInfo::new(0, "BCM4506 (internal)"), driver)
            .authority(astra_authority(vec![0]))
            .build()
            .unwrap();
        group.open(FrontendId(0)).unwrap();
        group.tune(FrontendId(0), astra()).unwrap();

        // 0x0800 is 8.00 dB on the BCM4506 curve, half of the satellite maximum
        handle.script_snr([0x0800]);
        let status = group.status(FrontendId(0)).unwrap();
        assert_eq!(status.tuner_signal_quality_db, Some(800));
        assert_eq!(status.tuner_signal_quality, 32768);
        assert_eq!(status.tuner_state, "TUNING");
    }

    #[test]
    fn test_transponder_data_translates_if() {
        let (mut group, _, _) = linked_pair();
        group.open(FrontendId(0)).unwrap();
        assert!(group.transponder_data(FrontendId(0), false).unwrap().is_none());

        group.tune(FrontendId(0), astra()).unwrap();
        while group.tick(FrontendId(0)).unwrap() != crate::frontend::Tick::Finished {}

        let readback = group.transponder_data(FrontendId(0), false).unwrap().unwrap();
        let p = readback.as_satellite().unwrap();
        assert_eq!(p.frequency, 11_836_000);
        assert_eq!(p.orbital_position, 192);
        assert_eq!(
            group.transponder_data(FrontendId(0), true).unwrap(),
            Some(astra())
        );
    }

    #[test]
    fn test_frontend_data() {
        let (driver, _) = driver_with(SimulatedDriverConfig {
            delivery_systems: vec![DeliverySystem::DvbC],
            ..Default::default()
        });
        let mut group = FrontendGroup::builder()
            .frontend(SlotInfo::new(3, "DVB-C"), driver)
            .build()
            .unwrap();
        let data = group.frontend_data(FrontendId(0)).unwrap();
        assert_eq!(data.tuner_number, 3);
        assert_eq!(data.tuner_type, "DVB-C");

        group
            .set_delivery_system_whitelist(FrontendId(0), [DeliverySystem::DvbT])
            .unwrap();
        assert_eq!(group.frontend_data(FrontendId(0)).unwrap().tuner_type, "UNKNOWN");

        group.open(FrontendId(0)).unwrap();
        group
            .tune(
                FrontendId(0),
                TransponderParameters::Cable(CableParameters {
                    frequency: 346_000,
                    symbol_rate: 6_900_000,
                    ..Default::default()
                }),
            )
            .unwrap();
        while group.tick(FrontendId(0)).unwrap() != crate::frontend::Tick::Finished {}
        let readback = group.transponder_data(FrontendId(0), false).unwrap().unwrap();
        assert_eq!(readback.as_cable().unwrap().frequency, 346_000);
    }
}
