//! Linked front-end group.
//!
//! Front-ends that share one antenna line are linked into chains: the
//! first member of a chain (the sec front-end) owns the LNB supply, tone and
//! DiSEqC bus, and its runtime data describes the line for every member.
//! The group owns all front-ends, their drivers and runtime data in index
//! based arenas; links are plain indices.
//!
//! Operations never block. Timing is requested through [`TimerRequest`]s
//! which the caller (normally [`FrontendRunner`](crate::runner::FrontendRunner))
//! collects with [`FrontendGroup::take_timer_requests`].

pub mod interpreter;
pub mod status;

use log::{debug, info, warn};
use tokio::sync::broadcast;

use dvbfe_params::{
    CableParameters, CodeRate, DeliverySystem, LockTimeouts, SatelliteParameters,
    SatelliteSystem, TerrestrialParameters, TransponderParameters,
};

use crate::authority::{AntennaAuthority, PrepareContext, SatellitePlan};
use crate::config::ConfigSource;
use crate::driver::{FrontendDriver, ReadinessSender, Tone, TuneRequest, Voltage};
use crate::error::{EngineError, Result};
use crate::frontend::{
    CloseOutcome, DataSlot, Frontend, FrontendId, FrontendState, RuntimeData, SlotInfo,
    StateChange, TimerRequest, UNSET,
};
use crate::sec::{SecCommand, SecSequence};

/// Capacity of the state change broadcast channel.
const STATE_CHANNEL_CAPACITY: usize = 64;

/// Intermediate frequency range accepted by satellite tuners, kHz.
const SATELLITE_IF_RANGE: std::ops::RangeInclusive<u32> = 900_000..=2_200_000;

#[derive(Debug, Clone, Copy, Default)]
struct Link {
    /// Member this one depends on, towards the sec front-end.
    prev: Option<usize>,
    /// Dependent member.
    next: Option<usize>,
    in_use: u32,
}

/// Builder for [`FrontendGroup`].
#[derive(Default)]
pub struct FrontendGroupBuilder {
    entries: Vec<(SlotInfo, Box<dyn FrontendDriver>)>,
    links: Vec<(usize, usize)>,
    authority: Option<Box<dyn AntennaAuthority>>,
    config: Option<Box<dyn ConfigSource>>,
    timeouts: LockTimeouts,
    preferred: Option<usize>,
    tick_limit: Option<u32>,
}

impl FrontendGroupBuilder {
    /// Add a front-end. Its [`FrontendId`] is the insertion index.
    pub fn frontend(mut self, info: SlotInfo, driver: Box<dyn FrontendDriver>) -> Self {
        self.entries.push((info, driver));
        self
    }

    /// Make `dependent` share the antenna line of `predecessor`.
    pub fn link(mut self, dependent: usize, predecessor: usize) -> Self {
        self.links.push((dependent, predecessor));
        self
    }

    pub fn authority(mut self, authority: Box<dyn AntennaAuthority>) -> Self {
        self.authority = Some(authority);
        self
    }

    pub fn config_source(mut self, config: Box<dyn ConfigSource>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn lock_timeouts(mut self, timeouts: LockTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Slot number that receives the preference bonus when scoring.
    pub fn preferred_frontend(mut self, slot: Option<usize>) -> Self {
        self.preferred = slot;
        self
    }

    /// Abort programs that run more than this many instructions.
    pub fn tick_limit(mut self, limit: Option<u32>) -> Self {
        self.tick_limit = limit;
        self
    }

    pub fn build(self) -> Result<FrontendGroup> {
        let count = self.entries.len();
        let mut links = vec![Link::default(); count];

        for &(dependent, predecessor) in &self.links {
            if dependent >= count || predecessor >= count {
                return Err(EngineError::InvalidTopology(format!(
                    "link {} -> {}: no such frontend",
                    dependent, predecessor
                )));
            }
            if dependent == predecessor {
                return Err(EngineError::InvalidTopology(format!(
                    "frontend {} linked to itself",
                    dependent
                )));
            }
            if links[dependent].prev.is_some() {
                return Err(EngineError::InvalidTopology(format!(
                    "frontend {} linked twice",
                    dependent
                )));
            }
            if links[predecessor].next.is_some() {
                return Err(EngineError::InvalidTopology(format!(
                    "frontend {} already has a dependent",
                    predecessor
                )));
            }
            links[dependent].prev = Some(predecessor);
            links[predecessor].next = Some(dependent);
        }

        for start in 0..count {
            let mut cursor = links[start].prev;
            let mut hops = 0;
            while let Some(index) = cursor {
                hops += 1;
                if hops > count {
                    return Err(EngineError::InvalidTopology(format!(
                        "link cycle through frontend {}",
                        start
                    )));
                }
                cursor = links[index].prev;
            }
        }

        let mut frontends = Vec::with_capacity(count);
        let mut drivers = Vec::with_capacity(count);
        for (info, driver) in self.entries {
            debug!(
                "frontend slot {} '{}' systems {:?}",
                info.slot,
                info.description,
                driver.delivery_systems()
            );
            frontends.push(Frontend::new(info, driver.delivery_systems()));
            drivers.push(driver);
        }

        let (state_tx, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        info!("frontend group with {} frontends", count);

        Ok(FrontendGroup {
            frontends,
            drivers,
            data: vec![RuntimeData::default(); count],
            links,
            authority: self.authority,
            config: self.config.unwrap_or_else(|| {
                Box::new(std::collections::HashMap::<String, String>::new()) as Box<dyn ConfigSource>
            }),
            timeouts: self.timeouts,
            preferred: self.preferred,
            tick_limit: self.tick_limit,
            state_tx,
        })
    }
}

/// All front-ends of one receiver and the links between them.
pub struct FrontendGroup {
    pub(crate) frontends: Vec<Frontend>,
    pub(crate) drivers: Vec<Box<dyn FrontendDriver>>,
    pub(crate) data: Vec<RuntimeData>,
    links: Vec<Link>,
    pub(crate) authority: Option<Box<dyn AntennaAuthority>>,
    config: Box<dyn ConfigSource>,
    timeouts: LockTimeouts,
    pub(crate) preferred: Option<usize>,
    tick_limit: Option<u32>,
    state_tx: broadcast::Sender<StateChange>,
}

impl FrontendGroup {
    pub fn builder() -> FrontendGroupBuilder {
        FrontendGroupBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.frontends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frontends.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = FrontendId> {
        (0..self.frontends.len()).map(FrontendId)
    }

    pub fn tick_limit(&self) -> Option<u32> {
        self.tick_limit
    }

    pub fn preferred_frontend(&self) -> Option<usize> {
        self.preferred
    }

    pub(crate) fn index(&self, id: FrontendId) -> Result<usize> {
        if id.0 < self.frontends.len() {
            Ok(id.0)
        } else {
            Err(EngineError::UnknownFrontend(id.0))
        }
    }

    pub fn frontend(&self, id: FrontendId) -> Result<&Frontend> {
        Ok(&self.frontends[self.index(id)?])
    }

    pub fn runtime_data(&self, id: FrontendId) -> Result<&RuntimeData> {
        Ok(&self.data[self.index(id)?])
    }

    /// Number of users holding the front-end through [`acquire`](Self::acquire).
    pub fn in_use(&self, id: FrontendId) -> Result<u32> {
        Ok(self.links[self.index(id)?].in_use)
    }

    pub fn set_delivery_system_whitelist(
        &mut self,
        id: FrontendId,
        whitelist: impl IntoIterator<Item = DeliverySystem>,
    ) -> Result<()> {
        let i = self.index(id)?;
        self.frontends[i].set_delivery_system_whitelist(whitelist);
        Ok(())
    }

    /// First member of the chain `id` belongs to.
    pub fn sec_root(&self, id: FrontendId) -> Result<FrontendId> {
        Ok(FrontendId(self.sec_root_index(self.index(id)?)))
    }

    pub(crate) fn sec_root_index(&self, index: usize) -> usize {
        let mut root = index;
        // build() rejects cycles, the bound only guards the walk
        for _ in 0..self.links.len() {
            match self.links[root].prev {
                Some(prev) => root = prev,
                None => break,
            }
        }
        root
    }

    /// Whether the program of `id` still has a DiSEqC message to send.
    pub fn has_pending_diseqc(&self, id: FrontendId) -> Result<bool> {
        Ok(self.frontends[self.index(id)?].sequence.has_pending_diseqc())
    }

    /// Subscribe to state change notifications of every member.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    pub(crate) fn state_sender(&self) -> broadcast::Sender<StateChange> {
        self.state_tx.clone()
    }

    pub fn attach_readiness(&mut self, id: FrontendId, tx: ReadinessSender) -> Result<()> {
        let i = self.index(id)?;
        self.drivers[i].attach_readiness(tx);
        Ok(())
    }

    /// Timer operations requested since the last call, in order.
    pub fn take_timer_requests(&mut self, id: FrontendId) -> Result<Vec<TimerRequest>> {
        let i = self.index(id)?;
        Ok(self.frontends[i].timers.drain(..).collect())
    }

    pub(crate) fn set_state(&mut self, index: usize, state: FrontendState) {
        let fe = &mut self.frontends[index];
        if fe.state == state {
            return;
        }
        debug!(
            "{} state {:?} -> {:?}",
            FrontendId(index),
            fe.state,
            state
        );
        fe.state = state;
        // no subscribers is fine
        let _ = self.state_tx.send(StateChange {
            frontend: FrontendId(index),
            state,
        });
    }

    // ------------------------------------------------------------------
    // Line control
    // ------------------------------------------------------------------

    pub(crate) fn set_voltage_on(
        &mut self,
        target: usize,
        voltage: Voltage,
        simulate: bool,
    ) -> Result<()> {
        let data = &mut self.data[target];
        data.set(DataSlot::CurVoltage, voltage.code());
        if voltage == Voltage::Off {
            data.reset_switch();
        }
        if voltage.is_increased() {
            debug!("{} increased LNB voltage", FrontendId(target));
        }
        if !simulate {
            self.drivers[target]
                .set_voltage(voltage)
                .map_err(|e| EngineError::device("set_voltage", e))?;
        }
        Ok(())
    }

    pub(crate) fn set_tone_on(&mut self, target: usize, tone: Tone, simulate: bool) -> Result<()> {
        self.data[target].set(DataSlot::CurTone, tone.code());
        if !simulate {
            self.drivers[target]
                .set_tone(tone)
                .map_err(|e| EngineError::device("set_tone", e))?;
        }
        Ok(())
    }

    /// Install a program; with a unicable band active a running program is
    /// extended instead of replaced.
    pub(crate) fn set_sequence(&mut self, index: usize, sequence: SecSequence) {
        let satcr = self.data[index].is_set(DataSlot::Satcr);
        let fe = &mut self.frontends[index];
        if satcr && !fe.sequence.is_finished() {
            fe.sequence.append(sequence);
        } else {
            fe.sequence = sequence;
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn open(&mut self, id: FrontendId) -> Result<()> {
        let i = self.index(id)?;
        self.open_index(i)
    }

    fn open_index(&mut self, index: usize) -> Result<()> {
        let id = FrontendId(index);
        if self.frontends[index].state != FrontendState::Closed {
            return Err(EngineError::ResourceUnavailable(format!(
                "{} is already open",
                id
            )));
        }
        let simulate = self.frontends[index].is_simulated();
        if !simulate {
            self.drivers[index]
                .open()
                .map_err(|e| EngineError::device("open", e))?;
        }
        self.frontends[index].tuning = 0;
        self.set_state(index, FrontendState::Idle);
        info!("{} opened ({})", id, self.frontends[index].info.description);

        if let Err(e) = self.set_tone_on(index, Tone::Off, simulate) {
            warn!("{}: tone off after open failed: {}", id, e);
        }
        if let Err(e) = self.set_voltage_on(index, Voltage::Off, simulate) {
            warn!("{}: voltage off after open failed: {}", id, e);
        }
        Ok(())
    }

    /// Close a front-end.
    ///
    /// Without `force` the close is refused while the line is powered and a
    /// dependent member is in use. With a unicable band active the close is
    /// delayed until the band release program has run.
    pub fn close(&mut self, id: FrontendId, force: bool) -> Result<CloseOutcome> {
        let i = self.index(id)?;
        self.close_index(i, force, false)
    }

    pub(crate) fn close_index(
        &mut self,
        index: usize,
        force: bool,
        no_delayed: bool,
    ) -> Result<CloseOutcome> {
        let id = FrontendId(index);
        if self.frontends[index].state == FrontendState::Closed {
            return Ok(CloseOutcome::Closed);
        }

        if !force {
            let voltage = self.data[index].get(DataSlot::CurVoltage);
            if voltage != UNSET && voltage != Voltage::Off.code() {
                let mut next = self.links[index].next;
                while let Some(member) = next {
                    if self.links[member].in_use > 0 {
                        warn!(
                            "{}: close refused, linked {} still in use",
                            id,
                            FrontendId(member)
                        );
                        return Err(EngineError::ResourceUnavailable(format!(
                            "linked {} still in use",
                            FrontendId(member)
                        )));
                    }
                    next = self.links[member].next;
                }
            }
        }

        let slot = self.frontends[index].info.slot;
        if self.data[index].is_set(DataSlot::Satcr) {
            if !no_delayed {
                let turn_off = self
                    .authority
                    .as_ref()
                    .and_then(|a| a.prepare_turn_off_satcr(slot));
                if let Some(sequence) = turn_off {
                    info!("{}: releasing unicable band before close", id);
                    self.set_sequence(index, sequence);
                    self.frontends[index].push_timer(TimerRequest::Tick(std::time::Duration::ZERO));
                    return Ok(CloseOutcome::Delayed);
                }
            } else {
                self.data[index].set(DataSlot::RotorCmd, UNSET);
                self.data[index].set(DataSlot::Satcr, UNSET);
            }
        }

        let simulate = self.frontends[index].is_simulated();
        if let Err(e) = self.set_tone_on(index, Tone::Off, simulate) {
            warn!("{}: tone off on close failed: {}", id, e);
        }
        if let Err(e) = self.set_voltage_on(index, Voltage::Off, simulate) {
            warn!("{}: voltage off on close failed: {}", id, e);
        }

        let fe = &mut self.frontends[index];
        fe.sequence.clear();
        fe.push_timer(TimerRequest::StopTick);
        fe.push_timer(TimerRequest::DisarmDeadline);
        fe.events_enabled = false;
        fe.tuning = 0;

        if !simulate {
            if let Some(authority) = self.authority.as_mut() {
                authority.set_rotor_moving(slot, false);
            }
            if let Err(e) = self.drivers[index].close() {
                warn!("{}: driver close failed: {}", id, e);
            }
        }
        self.set_state(index, FrontendState::Closed);
        info!("{} closed", id);
        Ok(CloseOutcome::Closed)
    }

    /// Take a usage reference, opening the front-end on first use.
    pub fn acquire(&mut self, id: FrontendId) -> Result<()> {
        let i = self.index(id)?;
        self.acquire_index(i)
    }

    pub(crate) fn acquire_index(&mut self, index: usize) -> Result<()> {
        self.links[index].in_use += 1;
        if self.links[index].in_use == 1 && self.frontends[index].state == FrontendState::Closed {
            if let Err(e) = self.open_index(index) {
                self.links[index].in_use -= 1;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Drop a usage reference, closing the front-end when the last one goes.
    pub fn release(&mut self, id: FrontendId) -> Result<()> {
        let i = self.index(id)?;
        self.release_index(i);
        Ok(())
    }

    pub(crate) fn release_index(&mut self, index: usize) {
        let link = &mut self.links[index];
        if link.in_use == 0 {
            warn!("{}: release without acquire", FrontendId(index));
            return;
        }
        link.in_use -= 1;
        if link.in_use == 0 {
            if let Err(e) = self.close_index(index, false, false) {
                warn!("{}: close on last release failed: {}", FrontendId(index), e);
            }
        }
    }

    // ------------------------------------------------------------------
    // Tuning
    // ------------------------------------------------------------------

    /// Start tuning `params`.
    ///
    /// All parameter checks happen before any hardware command is issued.
    /// Support and open checks reject without touching the front-end; a
    /// rejection after that leaves it without a program, and a front-end
    /// that was `Tuning` moves to `Failed`.
    pub fn tune(&mut self, id: FrontendId, params: TransponderParameters) -> Result<()> {
        let i = self.index(id)?;

        let system = params.delivery_system();
        if !self.frontends[i].supports_delivery_system(system, false) {
            return Err(EngineError::InvalidParameters(format!(
                "{} does not support {}",
                id, system
            )));
        }
        let simulate = self.frontends[i].is_simulated();
        if !simulate && self.frontends[i].state == FrontendState::Closed {
            return Err(EngineError::ResourceUnavailable(format!("{} is not open", id)));
        }

        let was_tuning = self.frontends[i].state == FrontendState::Tuning;
        let events_enabled = self.frontends[i].events_enabled;
        {
            let fe = &mut self.frontends[i];
            fe.push_timer(TimerRequest::DisarmDeadline);
            fe.events_enabled = false;
            fe.sequence.clear();
        }
        let timeout = params.lock_timeout_with(&self.timeouts);
        let timeout_ms = timeout.as_millis() as u32;

        let prepared = match params {
            TransponderParameters::Satellite(p) => self.prepare_satellite(i, p, timeout),
            TransponderParameters::Cable(p) => {
                self.prepare_cable(i, p, timeout_ms);
                Ok(params)
            }
            TransponderParameters::Terrestrial(p) => {
                self.prepare_terrestrial(i, p, timeout_ms);
                Ok(params)
            }
        };
        let commanded = match prepared {
            Ok(commanded) => commanded,
            Err(e) => {
                let fe = &mut self.frontends[i];
                fe.sequence.clear();
                fe.push_timer(TimerRequest::StopTick);
                warn!("{}: tune rejected: {}", id, e);
                if was_tuning {
                    fe.tuning = 0;
                    self.set_state(i, FrontendState::Failed);
                } else {
                    fe.events_enabled = events_enabled;
                }
                return Err(e);
            }
        };

        let fe = &mut self.frontends[i];
        fe.sequence.rewind();
        fe.commanded = Some(commanded);
        info!(
            "{}: tune {} ({} instructions, timeout {}ms)",
            id,
            system,
            fe.sequence.len(),
            timeout_ms
        );

        if simulate {
            self.run_to_completion(i)
        } else {
            let fe = &mut self.frontends[i];
            fe.push_timer(TimerRequest::Tick(std::time::Duration::ZERO));
            fe.tuning = 1;
            self.set_state(i, FrontendState::Tuning);
            Ok(())
        }
    }

    fn prepare_satellite(
        &mut self,
        index: usize,
        mut p: SatelliteParameters,
        timeout: std::time::Duration,
    ) -> Result<TransponderParameters> {
        let id = FrontendId(index);
        match p.system {
            SatelliteSystem::DvbS2 if !p.fec.valid_for_dvbs2() => {
                return Err(EngineError::InvalidParameters(format!(
                    "code rate {:?} not valid for DVB-S2",
                    p.fec
                )));
            }
            SatelliteSystem::DvbS if !p.fec.valid_for_dvbs() => {
                warn!("{}: code rate {:?} not valid for DVB-S, using auto", id, p.fec);
                p.fec = CodeRate::Auto;
            }
            _ => {}
        }

        let root = self.sec_root_index(index);
        let saved_line = self.data[root];
        let saved_rotor_mode = self.frontends[index].rotor_mode;
        let plan = match self.plan_satellite(index, root, &p, timeout) {
            Ok(plan) => plan,
            Err(e) => {
                self.data[root] = saved_line;
                self.frontends[index].rotor_mode = saved_rotor_mode;
                return Err(e);
            }
        };

        if !self.frontends[index].is_simulated() {
            if let Some(authority) = self.authority.as_mut() {
                authority.set_rotor_moving(self.frontends[index].info.slot, false);
            }
        }

        let params = TransponderParameters::Satellite(p);
        self.frontends[index].request = Some(TuneRequest {
            frequency: plan.intermediate_frequency,
            params,
        });
        self.data[index].set(DataSlot::FreqOffset, plan.frequency_offset);
        if let Some(user_band) = plan.satcr {
            self.data[index].set(DataSlot::Satcr, user_band as i64);
        }
        self.set_sequence(index, plan.sequence);
        Ok(params)
    }

    /// Build the satellite program. May write the sec line's runtime data
    /// even when it fails.
    fn plan_satellite(
        &mut self,
        index: usize,
        root: usize,
        p: &SatelliteParameters,
        timeout: std::time::Duration,
    ) -> Result<SatellitePlan> {
        let no_rotor = p.no_rotor_command_on_tune;
        if self.frontends[index].rotor_mode != no_rotor && !no_rotor {
            // leaving rotor mode: the line state is unknown
            let data = &mut self.data[root];
            data.reset_switch();
            data.reset_rotor();
        }
        self.frontends[index].rotor_mode = no_rotor;

        let slot = self.frontends[index].info.slot;
        let rotor_workaround = self.frontends[index].rotor_workaround;
        let authority = self.authority.as_mut().ok_or_else(|| {
            EngineError::ResourceUnavailable("no antenna configuration".to_string())
        })?;
        let plan = authority.prepare(PrepareContext {
            slot,
            params: p,
            data: &mut self.data[root],
            lock_timeout: timeout,
            rotor_workaround,
        })?;

        if !SATELLITE_IF_RANGE.contains(&plan.intermediate_frequency) {
            return Err(EngineError::InvalidParameters(format!(
                "intermediate frequency {} kHz out of range",
                plan.intermediate_frequency
            )));
        }
        Ok(plan)
    }

    fn prepare_cable(&mut self, index: usize, p: CableParameters, timeout_ms: u32) {
        let fe = &mut self.frontends[index];
        fe.request = Some(TuneRequest {
            frequency: p.frequency.saturating_mul(1000),
            params: TransponderParameters::Cable(p),
        });
        fe.sequence = SecSequence::from(vec![
            SecCommand::StartTuneTimeout(timeout_ms),
            SecCommand::SetFrontend { events: true },
        ]);
    }

    fn prepare_terrestrial(&mut self, index: usize, p: TerrestrialParameters, timeout_ms: u32) {
        let slot = self.frontends[index].info.slot;
        let key = format!("config.Nims.{}.terrestrial_5V", slot);
        let voltage = if self.config.lookup(&key).as_deref() == Some("True") {
            Voltage::V13
        } else {
            Voltage::Off
        };
        let fe = &mut self.frontends[index];
        fe.request = Some(TuneRequest {
            frequency: p.frequency,
            params: TransponderParameters::Terrestrial(p),
        });
        fe.sequence = SecSequence::from(vec![
            SecCommand::StartTuneTimeout(timeout_ms),
            SecCommand::SetVoltage(voltage),
            SecCommand::SetFrontend { events: true },
        ]);
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Drain the driver's event queue after a readiness signal.
    pub fn handle_events(&mut self, id: FrontendId) -> Result<()> {
        let i = self.index(id)?;
        let flush = !self.frontends[i].events_enabled;
        self.drain_events(i, flush);
        Ok(())
    }

    pub(crate) fn drain_events(&mut self, index: usize, flush: bool) {
        let id = FrontendId(index);
        if self.frontends[index].is_simulated() {
            return;
        }
        loop {
            let event = match self.drivers[index].poll_event() {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(e) => {
                    warn!("{}: event read failed: {}", id, e);
                    break;
                }
            };
            if flush {
                debug!("{}: discard event {:?}", id, event);
                continue;
            }

            let state = if event.has_lock {
                self.frontends[index].tuning = 0;
                FrontendState::Locked
            } else if self.frontends[index].tuning > 0 {
                if event.timed_out {
                    self.frontends[index].push_timer(TimerRequest::StopTick);
                    self.on_tune_timeout_index(index);
                    return;
                }
                self.frontends[index].tuning += 1;
                FrontendState::Tuning
            } else {
                if !self.frontends[index].rotor_mode {
                    let root = self.sec_root_index(index);
                    let data = &mut self.data[root];
                    data.reset_switch();
                    data.reset_linkable();
                }
                FrontendState::LostLock
            };
            self.set_state(index, state);
        }
    }

    /// Tune deadline expired.
    pub fn on_tune_timeout(&mut self, id: FrontendId) -> Result<()> {
        let i = self.index(id)?;
        self.on_tune_timeout_index(i);
        Ok(())
    }

    fn on_tune_timeout_index(&mut self, index: usize) {
        self.frontends[index].tuning = 0;
        if self.frontends[index].state == FrontendState::Tuning {
            warn!("{}: no lock before deadline", FrontendId(index));
            let fe = &mut self.frontends[index];
            fe.sequence.clear();
            fe.push_timer(TimerRequest::StopTick);
            self.set_state(index, FrontendState::Failed);
        }
    }
}
