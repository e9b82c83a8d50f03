mod error;
mod monitor;
mod pump;
mod report;
mod state;

pub use error::HealthError;
pub use monitor::{ConnectivityMonitor, MonitorConfig};
pub use pump::{parse_batch, run_channel_pump};
pub use report::{HealthStatus, NEVER_UPDATED, ServiceHealthReport};
pub use state::AppStateMachine;
