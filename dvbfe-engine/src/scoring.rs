//! Capability scoring.
//!
//! Scores how well a front-end can tune a transponder:
//! - `0` means it cannot tune it at all
//! - satellite scores come from the antenna authority, minus one when a
//!   DVB-S2 capable front-end would be spent on plain DVB-S
//! - cable scores `2`, terrestrial `2` (minus one for DVB-T on a T2 tuner)
//! - the preferred slot gets a large bonus on any nonzero score

use log::debug;

use dvbfe_params::{
    DeliverySystem, SatelliteSystem, TerrestrialSystem, TransponderParameters,
};

use crate::error::Result;
use crate::frontend::FrontendId;
use crate::group::FrontendGroup;

/// Bonus added to the preferred slot's nonzero score.
pub const PREFERRED_BONUS: u32 = 100_000;

impl FrontendGroup {
    /// Capability score of `id` for `params`.
    pub fn score(&self, id: FrontendId, params: &TransponderParameters) -> Result<u32> {
        let i = self.index(id)?;
        let fe = &self.frontends[i];
        if !fe.info.enabled {
            return Ok(0);
        }
        let has = |system| fe.supports_delivery_system(system, true);

        let mut score = match params {
            TransponderParameters::Satellite(p) => {
                let can_s2 = has(DeliverySystem::DvbS2);
                let supported = match p.system {
                    SatelliteSystem::DvbS => has(DeliverySystem::DvbS),
                    SatelliteSystem::DvbS2 => can_s2,
                };
                if !supported {
                    0
                } else {
                    let root = self.sec_root_index(i);
                    let slot_mask = if fe.info.slot < 32 { 1u32 << fe.info.slot } else { 0 };
                    let mut score = self
                        .authority
                        .as_ref()
                        .map_or(0, |a| a.can_tune(p, slot_mask, &self.data[root]));
                    if score > 1 && p.system == SatelliteSystem::DvbS && can_s2 {
                        score -= 1;
                    }
                    score
                }
            }
            TransponderParameters::Cable(_) => {
                if has(DeliverySystem::DvbC) {
                    2
                } else {
                    0
                }
            }
            TransponderParameters::Terrestrial(p) => {
                let can_t2 = has(DeliverySystem::DvbT2);
                let supported = match p.system {
                    TerrestrialSystem::DvbT => has(DeliverySystem::DvbT),
                    TerrestrialSystem::DvbT2 => can_t2,
                };
                match (supported, p.system) {
                    (false, _) => 0,
                    (true, TerrestrialSystem::DvbT) if can_t2 => 1,
                    (true, _) => 2,
                }
            }
        };

        if score != 0 && self.preferred == Some(fe.info.slot) {
            score += PREFERRED_BONUS;
        }
        debug!("{} score {} for {}", id, score, params.delivery_system());
        Ok(score)
    }

    /// Scores of every member, in id order.
    pub fn scores(&self, params: &TransponderParameters) -> Vec<(FrontendId, u32)> {
        self.ids()
            .map(|id| (id, self.score(id, params).unwrap_or(0)))
            .collect()
    }

    /// Highest scoring member, lowest id on ties. `None` when nobody can tune.
    pub fn best_frontend(&self, params: &TransponderParameters) -> Option<(FrontendId, u32)> {
        self.scores(params)
            .into_iter()
            .filter(|(_, score)| *score > 0)
            .fold(None, |best, candidate| match best {
                Some((_, best_score)) if best_score >= candidate.1 => best,
                _ => Some(candidate),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{SimulatedDriver, SimulatedDriverConfig};
    use crate::frontend::SlotInfo;
    use crate::group::tests::{astra, astra_authority};
    use dvbfe_params::{CableParameters, SatelliteParameters, TerrestrialParameters};

    fn simulated(systems: Vec<DeliverySystem>) -> Box<SimulatedDriver> {
        Box::new(SimulatedDriver::new(SimulatedDriverConfig {
            delivery_systems: systems,
            ..Default::default()
        }))
    }

    fn group(preferred: Option<usize>) -> FrontendGroup {
        FrontendGroup::builder()
            .frontend(SlotInfo::new(0, "S only"), simulated(vec![DeliverySystem::DvbS]))
            .frontend(
                SlotInfo::new(1, "S2"),
                simulated(vec![DeliverySystem::DvbS, DeliverySystem::DvbS2]),
            )
            .frontend(
                SlotInfo::new(2, "T2"),
                simulated(vec![DeliverySystem::DvbT, DeliverySystem::DvbT2]),
            )
            .frontend(SlotInfo::new(3, "C"), simulated(vec![DeliverySystem::DvbC]))
            .authority(astra_authority(vec![0, 1]))
            .preferred_frontend(preferred)
            .build()
            .unwrap()
    }

    #[test]
    fn test_satellite_scores() {
        let group = group(None);
        assert_eq!(group.score(FrontendId(0), &astra()).unwrap(), 3);
        // DVB-S on an S2 tuner is slightly less attractive
        assert_eq!(group.score(FrontendId(1), &astra()).unwrap(), 2);
        assert_eq!(group.score(FrontendId(2), &astra()).unwrap(), 0);

        let s2 = TransponderParameters::Satellite(SatelliteParameters {
            system: SatelliteSystem::DvbS2,
            ..*astra().as_satellite().unwrap()
        });
        assert_eq!(group.score(FrontendId(0), &s2).unwrap(), 0);
        assert_eq!(group.score(FrontendId(1), &s2).unwrap(), 3);
        assert_eq!(group.best_frontend(&astra()), Some((FrontendId(0), 3)));
    }

    #[test]
    fn test_terrestrial_and_cable_scores() {
        let group = group(None);
        let t = TransponderParameters::Terrestrial(TerrestrialParameters::default());
        let t2 = TransponderParameters::Terrestrial(TerrestrialParameters {
            system: TerrestrialSystem::DvbT2,
            ..Default::default()
        });
        let c = TransponderParameters::Cable(CableParameters::default());
        assert_eq!(group.score(FrontendId(2), &t).unwrap(), 1);
        assert_eq!(group.score(FrontendId(2), &t2).unwrap(), 2);
        assert_eq!(group.score(FrontendId(3), &c).unwrap(), 2);
        assert_eq!(group.score(FrontendId(3), &t).unwrap(), 0);
    }

    #[test]
    fn test_preferred_bonus_needs_capability() {
        let group = group(Some(3));
        let c = TransponderParameters::Cable(CableParameters::default());
        assert_eq!(group.score(FrontendId(3), &c).unwrap(), 2 + PREFERRED_BONUS);
        // no bonus on a zero score
        assert_eq!(group.score(FrontendId(3), &astra()).unwrap(), 0);
    }

    #[test]
    fn test_disabled_and_whitelisted() {
        let mut info = SlotInfo::new(0, "S2 disabled");
        info.enabled = false;
        let mut group = FrontendGroup::builder()
            .frontend(info, simulated(vec![DeliverySystem::DvbS, DeliverySystem::DvbS2]))
            .frontend(
                SlotInfo::new(1, "S2"),
                simulated(vec![DeliverySystem::DvbS, DeliverySystem::DvbS2]),
            )
            .authority(astra_authority(vec![0, 1]))
            .build()
            .unwrap();
        assert_eq!(group.score(FrontendId(0), &astra()).unwrap(), 0);

        group
            .set_delivery_system_whitelist(FrontendId(1), [DeliverySystem::DvbS2])
            .unwrap();
        assert_eq!(group.score(FrontendId(1), &astra()).unwrap(), 0);
        assert!(group.best_frontend(&astra()).is_none());
    }
}
