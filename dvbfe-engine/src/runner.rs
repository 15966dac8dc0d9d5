//! Async driver for a [`FrontendGroup`].
//!
//! The runner owns the group behind a `tokio::sync::Mutex` and spawns one
//! task per front-end. Each task waits on:
//! - the next SEC tick
//! - the tune deadline
//! - driver readiness (events available)
//! - commands from [`FrontendRunner`] handles
//!
//! and turns the [`TimerRequest`]s the group emits into its own sleeps.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use dvbfe_params::TransponderParameters;

use crate::error::{EngineError, Result};
use crate::frontend::{CloseOutcome, FrontendId, FrontendState, StateChange, TimerRequest};
use crate::group::FrontendGroup;

enum RunnerCommand {
    Acquire(oneshot::Sender<Result<()>>),
    Release(oneshot::Sender<Result<()>>),
    Tune(TransponderParameters, oneshot::Sender<Result<()>>),
    Close(bool, oneshot::Sender<Result<CloseOutcome>>),
    Shutdown,
}

/// Timers of one front-end task.
#[derive(Debug, Default)]
struct Timers {
    tick_at: Option<Instant>,
    deadline: Option<Instant>,
    /// Instructions run since the last tune.
    executed: u32,
}

impl Timers {
    fn apply(&mut self, requests: Vec<TimerRequest>) {
        let now = Instant::now();
        for request in requests {
            match request {
                TimerRequest::Tick(delay) => self.tick_at = Some(now + delay),
                TimerRequest::StopTick => self.tick_at = None,
                TimerRequest::ArmDeadline(after) => self.deadline = Some(now + after),
                TimerRequest::DisarmDeadline => self.deadline = None,
            }
        }
    }
}

async fn sleep_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Handle to the running front-end tasks.
pub struct FrontendRunner {
    group: Arc<Mutex<FrontendGroup>>,
    commands: Vec<mpsc::UnboundedSender<RunnerCommand>>,
    tasks: Vec<JoinHandle<()>>,
    state_tx: broadcast::Sender<StateChange>,
}

impl FrontendRunner {
    /// Take ownership of `group` and start one task per member.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(mut group: FrontendGroup) -> Self {
        let ids: Vec<FrontendId> = group.ids().collect();
        let tick_limit = group.tick_limit();
        let state_tx = group.state_sender();

        let mut readiness = Vec::with_capacity(ids.len());
        for id in &ids {
            let (tx, rx) = mpsc::unbounded_channel();
            if let Err(e) = group.attach_readiness(*id, tx) {
                warn!("{}: readiness not attached: {}", id, e);
            }
            readiness.push(rx);
        }

        let group = Arc::new(Mutex::new(group));
        let mut commands = Vec::with_capacity(ids.len());
        let mut tasks = Vec::with_capacity(ids.len());
        for (id, ready) in ids.into_iter().zip(readiness) {
            let (tx, rx) = mpsc::unbounded_channel();
            commands.push(tx);
            let group = Arc::clone(&group);
            tasks.push(tokio::spawn(async move {
                run_frontend(group, id, rx, ready, tick_limit).await;
            }));
        }
        info!("runner started for {} frontends", tasks.len());

        Self {
            group,
            commands,
            tasks,
            state_tx,
        }
    }

    /// Shared group, e.g. for status queries.
    pub fn group(&self) -> Arc<Mutex<FrontendGroup>> {
        Arc::clone(&self.group)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    async fn request<T>(
        &self,
        id: FrontendId,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> RunnerCommand,
    ) -> Result<T> {
        let tx = self
            .commands
            .get(id.0)
            .ok_or(EngineError::UnknownFrontend(id.0))?;
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(make(reply_tx))
            .map_err(|_| EngineError::ResourceUnavailable(format!("{} runner stopped", id)))?;
        reply_rx
            .await
            .map_err(|_| EngineError::ResourceUnavailable(format!("{} runner stopped", id)))?
    }

    pub async fn acquire(&self, id: FrontendId) -> Result<()> {
        self.request(id, RunnerCommand::Acquire).await
    }

    pub async fn release(&self, id: FrontendId) -> Result<()> {
        self.request(id, RunnerCommand::Release).await
    }

    pub async fn tune(&self, id: FrontendId, params: TransponderParameters) -> Result<()> {
        self.request(id, |reply| RunnerCommand::Tune(params, reply)).await
    }

    pub async fn close(&self, id: FrontendId, force: bool) -> Result<CloseOutcome> {
        self.request(id, |reply| RunnerCommand::Close(force, reply)).await
    }

    /// Wait until `id` reaches a settled state.
    ///
    /// `Locked` and `LostLock` are returned as is; `Failed` and an expired
    /// `timeout` both map to [`EngineError::LockTimeout`].
    pub async fn wait_for_settled(
        &self,
        id: FrontendId,
        timeout: Duration,
    ) -> Result<FrontendState> {
        let mut rx = self.subscribe();
        let current = self.group.lock().await.frontend(id)?.state();
        let settled = if current.is_settled() || current == FrontendState::Closed {
            current
        } else {
            tokio::time::timeout(timeout, async {
                loop {
                    match rx.recv().await {
                        Ok(change) if change.frontend == id => {
                            if change.state.is_settled() || change.state == FrontendState::Closed {
                                return Ok(change.state);
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!("{}: state receiver lagged by {}", id, skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(EngineError::ResourceUnavailable(
                                "state channel closed".to_string(),
                            ));
                        }
                    }
                }
            })
            .await
            .map_err(|_| EngineError::LockTimeout)??
        };

        match settled {
            FrontendState::Failed => Err(EngineError::LockTimeout),
            FrontendState::Closed => Err(EngineError::ResourceUnavailable(format!(
                "{} closed while tuning",
                id
            ))),
            state => Ok(state),
        }
    }

    /// Stop all tasks.
    pub async fn shutdown(self) {
        for tx in &self.commands {
            let _ = tx.send(RunnerCommand::Shutdown);
        }
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("frontend task ended abnormally: {}", e);
            }
        }
        info!("runner stopped");
    }
}

async fn run_frontend(
    group: Arc<Mutex<FrontendGroup>>,
    id: FrontendId,
    mut commands: mpsc::UnboundedReceiver<RunnerCommand>,
    mut ready: mpsc::UnboundedReceiver<()>,
    tick_limit: Option<u32>,
) {
    let mut timers = Timers::default();
    debug!("{}: task started", id);

    loop {
        tokio::select! {
            _ = sleep_until(timers.tick_at) => {
                let mut g = group.lock().await;
                timers.tick_at = None;
                timers.executed += 1;
                match tick_limit {
                    Some(limit) if timers.executed > limit => {
                        g.abort_program(
                            id.0,
                            EngineError::ResourceUnavailable(format!(
                                "program exceeded {} instructions",
                                limit
                            )),
                        );
                    }
                    _ => {
                        if let Err(e) = g.tick(id) {
                            debug!("{}: tick ended program: {}", id, e);
                        }
                    }
                }
                if let Ok(requests) = g.take_timer_requests(id) {
                    timers.apply(requests);
                }
            }
            _ = sleep_until(timers.deadline) => {
                let mut g = group.lock().await;
                timers.deadline = None;
                if let Err(e) = g.on_tune_timeout(id) {
                    warn!("{}: timeout handling failed: {}", id, e);
                }
                if let Ok(requests) = g.take_timer_requests(id) {
                    timers.apply(requests);
                }
            }
            Some(()) = ready.recv() => {
                let mut g = group.lock().await;
                if let Err(e) = g.handle_events(id) {
                    warn!("{}: event handling failed: {}", id, e);
                }
                if let Ok(requests) = g.take_timer_requests(id) {
                    timers.apply(requests);
                }
            }
            command = commands.recv() => {
                let Some(command) = command else { break };
                let mut g = group.lock().await;
                match command {
                    RunnerCommand::Acquire(reply) => {
                        let _ = reply.send(g.acquire(id));
                    }
                    RunnerCommand::Release(reply) => {
                        let _ = reply.send(g.release(id));
                    }
                    RunnerCommand::Tune(params, reply) => {
                        timers.executed = 0;
                        let _ = reply.send(g.tune(id, params));
                    }
                    RunnerCommand::Close(force, reply) => {
                        let _ = reply.send(g.close(id, force));
                    }
                    RunnerCommand::Shutdown => break,
                }
                if let Ok(requests) = g.take_timer_requests(id) {
                    timers.apply(requests);
                }
            }
        }
    }
    debug!("{}: task stopped", id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverCommand, SimulatedDriverConfig, SimulatedHandle, Voltage};
    use crate::frontend::SlotInfo;
    use crate::group::tests::{astra, astra_authority, driver_with};

    fn start_runner(
        config: SimulatedDriverConfig,
        tick_limit: Option<u32>,
    ) -> (FrontendRunner, SimulatedHandle) {
        let (driver, handle) = driver_with(config);
        let group = FrontendGroup::builder()
            .frontend(SlotInfo::new(0, "Simulated DVB-S2"), driver)
            .authority(astra_authority(vec![0]))
            .tick_limit(tick_limit)
            .build()
            .unwrap();
        (FrontendRunner::start(group), handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_tune_to_lock() {
        let (runner, handle) = start_runner(SimulatedDriverConfig::default(), None);
        runner.acquire(FrontendId(0)).await.unwrap();
        runner.tune(FrontendId(0), astra()).await.unwrap();

        let state = runner
            .wait_for_settled(FrontendId(0), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(state, FrontendState::Locked);
        assert!(handle.journal().contains(&DriverCommand::SetVoltage(Voltage::V18)));

        let status = runner.group().lock().await.status(FrontendId(0)).unwrap();
        assert_eq!(status.tuner_state, "LOCKED");
        assert!(status.tuner_locked);
        runner.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_lock_times_out() {
        let (runner, _) = start_runner(
            SimulatedDriverConfig {
                lock_after_polls: None,
                ..Default::default()
            },
            None,
        );
        runner.acquire(FrontendId(0)).await.unwrap();
        runner.tune(FrontendId(0), astra()).await.unwrap();

        let started = Instant::now();
        let result = runner
            .wait_for_settled(FrontendId(0), Duration::from_secs(30))
            .await;
        assert!(matches!(result, Err(EngineError::LockTimeout)));
        // 27.5 Msym/s selects the 5 s satellite deadline
        assert!(started.elapsed() >= Duration::from_millis(5000));
        assert!(started.elapsed() < Duration::from_secs(30));
        assert_eq!(
            runner.group().lock().await.frontend(FrontendId(0)).unwrap().state(),
            FrontendState::Failed
        );
        runner.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_limit_aborts_program() {
        let (runner, handle) = start_runner(SimulatedDriverConfig::default(), Some(3));
        runner.acquire(FrontendId(0)).await.unwrap();
        handle.clear_journal();
        runner.tune(FrontendId(0), astra()).await.unwrap();

        let result = runner
            .wait_for_settled(FrontendId(0), Duration::from_secs(10))
            .await;
        assert!(matches!(result, Err(EngineError::LockTimeout)));
        assert!(!handle
            .journal()
            .iter()
            .any(|c| matches!(c, DriverCommand::SetFrontend(_))));
        runner.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_frontend() {
        let (runner, _) = start_runner(SimulatedDriverConfig::default(), None);
        assert!(matches!(
            runner.acquire(FrontendId(4)).await,
            Err(EngineError::UnknownFrontend(4))
        ));
        runner.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_after_lock() {
        let (runner, handle) = start_runner(SimulatedDriverConfig::default(), None);
        runner.acquire(FrontendId(0)).await.unwrap();
        runner.tune(FrontendId(0), astra()).await.unwrap();
        runner
            .wait_for_settled(FrontendId(0), Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(
            runner.close(FrontendId(0), false).await.unwrap(),
            CloseOutcome::Closed
        );
        assert!(!handle.is_open());
        runner.shutdown().await;
    }
}
