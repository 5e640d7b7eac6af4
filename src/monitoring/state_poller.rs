// state_poller.rs
//
// One tokio task owns the DashboardState. It loads the map, then refreshes the
// dynamic slices on a fixed interval by fanning out to every endpoint at once
// and merging the results when all of them settle. Cycles never overlap:
// the task does not look at the timer again until the current cycle is done,
// and ticks missed in the meantime are skipped. Commands keep being served
// while a request is in flight, so a stop drops the outstanding futures and
// their results are never applied. Refresh requests that arrive during a
// cycle collapse into one follow-up cycle.

use crate::communication::SimulationService;
use crate::error::DashboardError;
use crate::global_variables::{INITIAL_REFRESH_DELAY_MS, POLL_INTERVAL_MS, REQUEST_TIMEOUT_MS};
use crate::monitoring::dashboard_state::{CycleResults, DashboardState, RefreshOutcome};
use crate::monitoring::refresh_log::RefreshRecord;
use crate::shared_data::CityMap;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, timeout, Duration, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    /// Delay of the single-shot refresh after a map is accepted.
    pub initial_refresh_delay: Duration,
    /// A cycle still unsettled after this long is abandoned.
    pub cycle_timeout: Duration,
    pub fetch_vehicle_list: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
            initial_refresh_delay: Duration::from_millis(INITIAL_REFRESH_DELAY_MS),
            cycle_timeout: Duration::from_millis(REQUEST_TIMEOUT_MS * 2),
            fetch_vehicle_list: false,
        }
    }
}

#[derive(Debug)]
enum PollerCommand {
    LoadMap(CityMap),
    Refresh,
    Records(mpsc::UnboundedSender<RefreshRecord>),
    Stop,
}

/// Control surface of a running poller.
#[derive(Debug)]
pub struct PollerHandle {
    commands: mpsc::UnboundedSender<PollerCommand>,
    snapshots: watch::Receiver<Arc<DashboardState>>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Submits a replacement map. Returns `false` if the poller is gone.
    pub fn load_map(&self, map: CityMap) -> bool {
        self.commands.send(PollerCommand::LoadMap(map)).is_ok()
    }

    /// Runs a refresh cycle now, or right after the one in flight.
    pub fn request_refresh(&self) -> bool {
        self.commands.send(PollerCommand::Refresh).is_ok()
    }

    /// Receives one record per finished cycle, in cycle order.
    ///
    /// A later call replaces the earlier receiver, which then sees the
    /// channel close.
    pub fn refresh_records(&self) -> mpsc::UnboundedReceiver<RefreshRecord> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = self.commands.send(PollerCommand::Records(tx));
        rx
    }

    pub fn snapshot(&self) -> Arc<DashboardState> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<DashboardState>> {
        self.snapshots.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels the timer and any in-flight requests, then waits for the task to exit.
    pub async fn stop(self) {
        let _ = self.commands.send(PollerCommand::Stop);
        if let Err(e) = self.task.await {
            log::warn!("State poller task ended abnormally: {}", e);
        }
    }
}

/// Starts the poller. `initial_map` is submitted straight away.
pub fn spawn_poller<S: SimulationService>(
    service: Arc<S>,
    config: PollerConfig,
    initial_map: Option<CityMap>,
) -> PollerHandle {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(DashboardState::new()));

    if let Some(map) = initial_map {
        let _ = command_tx.send(PollerCommand::LoadMap(map));
    }

    let task = PollerTask {
        service,
        config,
        state: DashboardState::new(),
        snapshots: snapshot_tx,
        commands: command_rx,
        deferred: VecDeque::new(),
        refresh_pending: false,
        refresh_at: None,
        records: None,
    };

    PollerHandle {
        commands: command_tx,
        snapshots: snapshot_rx,
        task: tokio::spawn(task.run()),
    }
}

/// Issues every dynamic fetch concurrently and waits for all of them.
pub async fn fetch_cycle<S: SimulationService>(service: Arc<S>, fetch_vehicle_list: bool) -> CycleResults {
    let vehicles = async {
        if fetch_vehicle_list {
            Some(service.vehicles().await)
        } else {
            None
        }
    };
    let (system_state, road_conditions, vehicles) =
        tokio::join!(service.system_state(), service.road_conditions(), vehicles);
    CycleResults {
        system_state,
        road_conditions,
        vehicles,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

struct PollerTask<S> {
    service: Arc<S>,
    config: PollerConfig,
    state: DashboardState,
    snapshots: watch::Sender<Arc<DashboardState>>,
    commands: mpsc::UnboundedReceiver<PollerCommand>,
    /// Commands received while a request was in flight.
    deferred: VecDeque<PollerCommand>,
    /// A refresh was requested while a request was in flight.
    refresh_pending: bool,
    /// Pending single-shot refresh after a map load.
    refresh_at: Option<Instant>,
    records: Option<mpsc::UnboundedSender<RefreshRecord>>,
}

impl<S: SimulationService> PollerTask<S> {
    async fn run(mut self) {
        let period = self.config.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        log::info!(
            "State poller started (interval {:?}, vehicle list {})",
            self.config.poll_interval,
            if self.config.fetch_vehicle_list { "on" } else { "off" }
        );

        loop {
            let keep_running = if let Some(command) = self.deferred.pop_front() {
                self.handle(Some(command)).await
            } else if self.refresh_pending {
                self.refresh_pending = false;
                self.refresh().await
            } else {
                let refresh_at = self.refresh_at;
                tokio::select! {
                    biased;
                    command = self.commands.recv() => self.handle(command).await,
                    _ = wait_until(refresh_at) => {
                        self.refresh_at = None;
                        self.refresh().await
                    }
                    _ = ticker.tick() => self.refresh().await,
                }
            };
            if !keep_running {
                break;
            }
        }

        self.state.stop();
        self.publish();
        log::info!("State poller stopped after {} cycles", self.state.cycles_started);
    }

    async fn handle(&mut self, command: Option<PollerCommand>) -> bool {
        match command {
            None | Some(PollerCommand::Stop) => false,
            Some(PollerCommand::LoadMap(map)) => self.load_map(map).await,
            Some(PollerCommand::Refresh) => self.refresh().await,
            Some(PollerCommand::Records(tx)) => {
                self.records = Some(tx);
                true
            }
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(Arc::new(self.state.clone()));
    }

    fn record_cycle(&mut self) {
        let Some(tx) = &self.records else {
            return;
        };
        if tx.send(RefreshRecord::from_state(&self.state)).is_err() {
            self.records = None;
        }
    }

    /// Drives `fut` while still serving commands. `None` means stop was requested.
    async fn interruptible<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                output = &mut fut => return Some(output),
                command = self.commands.recv() => match command {
                    None | Some(PollerCommand::Stop) => return None,
                    Some(PollerCommand::Refresh) => self.refresh_pending = true,
                    Some(PollerCommand::Records(tx)) => self.records = Some(tx),
                    Some(other) => self.deferred.push_back(other),
                },
            }
        }
    }

    async fn load_map(&mut self, map: CityMap) -> bool {
        self.state.begin_map_load();
        self.refresh_at = None;
        self.publish();
        log::info!(
            "Loading map with {} nodes and {} edges",
            map.nodes.len(),
            map.edges.len()
        );

        let map = Arc::new(map);
        let service = Arc::clone(&self.service);
        let submitted = Arc::clone(&map);
        let submission = async move { service.load_map(&submitted).await };

        match self.interruptible(submission).await {
            None => false,
            Some(Ok(())) => {
                self.state.commit_map(map);
                self.refresh_at = Some(Instant::now() + self.config.initial_refresh_delay);
                self.publish();
                true
            }
            Some(Err(e)) => {
                let e = match e {
                    DashboardError::MapLoad(_) => e,
                    other => DashboardError::MapLoad(other.to_string()),
                };
                log::warn!("{}", e);
                self.state.fail_map_load(&e);
                self.publish();
                true
            }
        }
    }

    async fn refresh(&mut self) -> bool {
        let Some(ticket) = self.state.begin_cycle() else {
            log::debug!("Refresh skipped in phase {:?}", self.state.phase);
            return true;
        };
        self.publish();

        let cycle = timeout(
            self.config.cycle_timeout,
            fetch_cycle(Arc::clone(&self.service), self.config.fetch_vehicle_list),
        );

        match self.interruptible(cycle).await {
            None => false,
            Some(Ok(results)) => {
                let outcome = self.state.apply_cycle(ticket, results);
                match &outcome {
                    RefreshOutcome::Complete => log::debug!(
                        "Cycle {} complete: {} vehicles, {} roads",
                        ticket.id(),
                        self.state.vehicles.len(),
                        self.state.road_conditions.len()
                    ),
                    _ => log::warn!(
                        "Cycle {} {}: {}",
                        ticket.id(),
                        outcome.label(),
                        self.state.error.as_deref().unwrap_or("")
                    ),
                }
                if outcome != RefreshOutcome::Discarded {
                    self.record_cycle();
                }
                self.publish();
                true
            }
            Some(Err(_)) => {
                log::warn!(
                    "Cycle {} abandoned after {:?}",
                    ticket.id(),
                    self.config.cycle_timeout
                );
                self.state.abandon_cycle(ticket);
                self.record_cycle();
                self.publish();
                true
            }
        }
    }
}
