pub mod dashboard_state;
pub mod refresh_log;
pub mod state_poller;

pub use dashboard_state::{
    CycleResults, CycleTicket, DashboardState, Endpoint, PollerPhase, RefreshOutcome,
};
pub use state_poller::{fetch_cycle, spawn_poller, PollerConfig, PollerHandle};
