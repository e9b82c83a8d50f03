use std::sync::Arc;

use qcon::ChannelEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::monitor::ConnectivityMonitor;
use crate::report::ServiceHealthReport;

/// Parse a raw health batch entry by entry. Malformed entries are logged
/// and dropped; the rest of the batch survives.
pub fn parse_batch(entries: &[serde_json::Value], timestamp: i64) -> Vec<ServiceHealthReport> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            ServiceHealthReport::from_wire(entry, timestamp)
                .inspect_err(|e| tracing::warn!(index, error = %e, "skipping health report"))
                .ok()
        })
        .collect()
}

/// Feed realtime channel events into the monitor until cancelled or the
/// channel closes.
pub async fn run_channel_pump(
    monitor: Arc<ConnectivityMonitor>,
    mut events: mpsc::Receiver<ChannelEvent>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            () = token.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                monitor.handle_channel_event(event);
            }
        }
    }
    tracing::debug!("channel pump stopped");
}
