use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use qcon::{AppState, ChannelEvent, ReconnectCause};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::pump::parse_batch;
use crate::report::{HealthStatus, ServiceHealthReport};
use crate::state::AppStateMachine;

const ENDPOINT_SERVICE: &str = "Endpoint";

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Services with a tracked report.
    pub tracked_services: Vec<String>,
    /// Services that must be `Working` for the app to count as connected.
    pub maintained_services: Vec<String>,
    pub watchdog_interval: Duration,
    /// How long the app may stay `Connecting` without news before a hard disconnect.
    pub degraded_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let services = vec!["ComponentService".to_string(), "CVMServer".to_string()];
        Self {
            tracked_services: services.clone(),
            maintained_services: services,
            watchdog_interval: Duration::from_secs(5),
            degraded_timeout: Duration::from_secs(120),
        }
    }
}

struct MonitorState {
    reports: Vec<ServiceHealthReport>,
    endpoint: ServiceHealthReport,
    /// Last published verdict.
    connected: bool,
    initialized: bool,
    /// Refreshed while healthy and when a degraded window opens.
    last_connectivity_update: Option<Instant>,
    /// A healthy verdict was computed since the previous watchdog tick.
    healthy_since_tick: bool,
    /// The watchdog already escalated during the current degraded window.
    escalated: bool,
}

impl MonitorState {
    fn new(config: &MonitorConfig) -> Self {
        Self {
            reports: config
                .tracked_services
                .iter()
                .map(ServiceHealthReport::new)
                .collect(),
            endpoint: ServiceHealthReport::new(ENDPOINT_SERVICE),
            connected: true,
            initialized: false,
            last_connectivity_update: None,
            healthy_since_tick: false,
            escalated: false,
        }
    }
}

/// Derives one connected/disconnected verdict from per-service health
/// reports and the endpoint link, and drives the app state from it.
///
/// All methods are total: bad input is logged and skipped.
pub struct ConnectivityMonitor {
    config: MonitorConfig,
    state: Mutex<MonitorState>,
    app: Arc<AppStateMachine>,
    watchdog: Mutex<Option<CancellationToken>>,
}

impl ConnectivityMonitor {
    pub fn new(config: MonitorConfig, app: Arc<AppStateMachine>) -> Self {
        Self {
            state: Mutex::new(MonitorState::new(&config)),
            config,
            app,
            watchdog: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn app(&self) -> &Arc<AppStateMachine> {
        &self.app
    }

    /// Reset every tracked report, mark the endpoint `Working`, apply
    /// `initial`, then arm the watchdog.
    pub fn initialize(self: &Arc<Self>, initial: &[ServiceHealthReport], timestamp: i64) {
        {
            let mut state = self.lock();
            for report in &mut state.reports {
                report.reset();
            }
            state.endpoint.reset();
            state
                .endpoint
                .update(HealthStatus::Working, "", timestamp, false);
            apply_reports(&mut state.reports, initial);
            state.initialized = true;
            state.escalated = false;
        }
        tracing::info!(reports = initial.len(), timestamp, "connectivity monitor initialized");
        self.monitor_connectivity();
    }

    /// Apply a health batch, then recompute the verdict unconditionally.
    pub fn update_services_status_reports(&self, reports: &[ServiceHealthReport], timestamp: i64) {
        let mut state = self.lock();
        let applied = apply_reports(&mut state.reports, reports);
        tracing::debug!(received = reports.len(), applied, timestamp, "health batch");
        self.recompute(&mut state);
    }

    /// The transport link itself went up or down.
    ///
    /// A local "down" without a timestamp reuses the stored one and is
    /// always recorded.
    pub fn handle_endpoint_connectivity_changed(&self, connected: bool, timestamp: Option<i64>) {
        let mut state = self.lock();
        let applied = if connected {
            let ts = timestamp.unwrap_or_else(qcon::now_millis);
            state.endpoint.update(HealthStatus::Working, "", ts, false)
        } else {
            let ignore_timestamp = timestamp.is_none();
            let ts = timestamp.unwrap_or(state.endpoint.timestamp);
            state
                .endpoint
                .update(HealthStatus::Error, "", ts, ignore_timestamp)
        };
        tracing::debug!(connected, applied, "endpoint connectivity changed");
        self.recompute(&mut state);
    }

    /// Transport error notification from the request path or the channel.
    pub fn handle_reconnect(&self, cause: ReconnectCause) {
        match cause {
            ReconnectCause::Timeout => {
                {
                    let mut state = self.lock();
                    if self.app.status() == AppState::Ready {
                        open_degraded_window(&mut state);
                        state.connected = false;
                    }
                }
                tracing::warn!("request timed out, reconnecting");
                self.app.enter_connecting();
            }
            ReconnectCause::Disconnected => {
                self.lock().connected = false;
                self.app.disconnect();
            }
            ReconnectCause::Other => {
                tracing::debug!("transport error without reconnect action");
            }
        }
    }

    /// Single dispatch for realtime channel events.
    pub fn handle_channel_event(self: &Arc<Self>, event: ChannelEvent) {
        match event {
            ChannelEvent::ServiceHealthBatch { reports, timestamp } => {
                let reports = parse_batch(&reports, timestamp);
                self.update_services_status_reports(&reports, timestamp);
            }
            ChannelEvent::TransportError(info) => {
                tracing::warn!(status = ?info.status, code = ?info.code, message = %info.message, "transport error");
                self.handle_reconnect(info.cause());
            }
            ChannelEvent::TransportDisconnected => {
                self.handle_endpoint_connectivity_changed(false, None);
            }
            ChannelEvent::TransportReady { timestamp } => {
                if self.is_initialized() {
                    self.handle_endpoint_connectivity_changed(true, Some(timestamp));
                } else {
                    self.initialize(&[], timestamp);
                }
            }
        }
    }

    /// Arm the watchdog. A no-op while one is already running.
    pub fn monitor_connectivity(self: &Arc<Self>) {
        let mut slot = self.watchdog.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|t| !t.is_cancelled()) {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::error!("no async runtime, connectivity watchdog not armed");
            return;
        };

        let token = CancellationToken::new();
        *slot = Some(token.clone());
        handle.spawn(run_watchdog(
            Arc::downgrade(self),
            self.config.watchdog_interval,
            token,
        ));
        tracing::debug!(interval = ?self.config.watchdog_interval, "connectivity watchdog armed");
    }

    /// Back to the pre-initialization state: connected, reports unknown,
    /// watchdog stopped.
    pub fn reset(&self) {
        if let Some(token) = self
            .watchdog
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            token.cancel();
        }
        *self.lock() = MonitorState::new(&self.config);
        tracing::debug!("connectivity monitor reset");
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    pub fn is_watchdog_armed(&self) -> bool {
        self.watchdog
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_cancelled())
    }

    pub fn service_reports(&self) -> Vec<ServiceHealthReport> {
        self.lock().reports.clone()
    }

    pub fn endpoint_report(&self) -> ServiceHealthReport {
        self.lock().endpoint.clone()
    }

    /// One watchdog pass at `now`. Returns whether it escalated.
    ///
    /// A tick that follows a healthy verdict never escalates. Recomputations
    /// that found the system still degraded do not hold it off.
    pub(crate) fn watchdog_tick(&self, now: Instant) -> bool {
        let mut state = self.lock();
        let last = *state.last_connectivity_update.get_or_insert(now);
        let healthy = std::mem::take(&mut state.healthy_since_tick);

        if !state.initialized || state.escalated || healthy {
            return false;
        }
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.config.degraded_timeout || self.app.status() != AppState::Connecting {
            return false;
        }

        state.escalated = true;
        state.connected = false;
        tracing::warn!(?elapsed, "connectivity degraded too long, forcing disconnect");
        self.app.disconnect();
        true
    }

    fn recompute(&self, state: &mut MonitorState) {
        let connecting = self.app.status() == AppState::Connecting;

        if !state.endpoint.is_working() {
            self.publish_disconnected(state, connecting);
            return;
        }

        let healthy = self.maintained_services_working(&state.reports);
        if !connecting && !healthy {
            self.publish_disconnected(state, connecting);
        } else if healthy {
            state.healthy_since_tick = true;
            state.last_connectivity_update = Some(Instant::now());
            // Also clears a verdict published while the app could not degrade.
            if connecting || !state.connected {
                state.connected = true;
                state.escalated = false;
                tracing::info!("all maintained services working, connected");
                self.app.connectivity_changed(true);
            }
        }
    }

    fn publish_disconnected(&self, state: &mut MonitorState, connecting: bool) {
        if !connecting {
            open_degraded_window(state);
        }
        if state.connected {
            tracing::warn!(
                endpoint = %state.endpoint.status,
                "connectivity lost"
            );
        }
        state.connected = false;
        self.app.connectivity_changed(false);
    }

    fn maintained_services_working(&self, reports: &[ServiceHealthReport]) -> bool {
        self.config.maintained_services.iter().all(|name| {
            reports
                .iter()
                .find(|r| r.matches(name))
                .is_some_and(ServiceHealthReport::is_working)
        })
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        if let Some(token) = self
            .watchdog
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            token.cancel();
        }
    }
}

fn open_degraded_window(state: &mut MonitorState) {
    state.last_connectivity_update = Some(Instant::now());
    state.escalated = false;
}

/// Apply each incoming report to its tracked counterpart. Unknown services
/// are ignored. Returns the number of reports that changed.
fn apply_reports(tracked: &mut [ServiceHealthReport], incoming: &[ServiceHealthReport]) -> usize {
    let mut applied = 0;
    for report in incoming {
        let Some(target) = tracked.iter_mut().find(|t| t.matches(&report.service_name)) else {
            tracing::debug!(service = %report.service_name, "report for untracked service ignored");
            continue;
        };
        if target.apply(report, false) {
            applied += 1;
        }
    }
    applied
}

async fn run_watchdog(monitor: Weak<ConnectivityMonitor>, period: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {
                let Some(monitor) = monitor.upgrade() else { break };
                monitor.watchdog_tick(Instant::now());
            }
        }
    }
    tracing::debug!("connectivity watchdog stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcon::{AppEvent, EventBus, TransportErrorInfo};
    use tokio::sync::broadcast::Receiver;

    use crate::report::NEVER_UPDATED;

    fn working(name: &str, ts: i64) -> ServiceHealthReport {
        ServiceHealthReport::with_status(name, HealthStatus::Working, ts)
    }

    fn failing(name: &str, ts: i64) -> ServiceHealthReport {
        ServiceHealthReport::with_status(name, HealthStatus::Error, ts)
    }

    fn monitor() -> (Arc<ConnectivityMonitor>, Receiver<AppEvent>) {
        let bus = EventBus::default();
        let rx = bus.subscribe();
        let app = Arc::new(AppStateMachine::new(bus));
        app.initialization_complete();
        let monitor = Arc::new(ConnectivityMonitor::new(MonitorConfig::default(), app));
        (monitor, rx)
    }

    fn drain(rx: &mut Receiver<AppEvent>) -> Vec<AppEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    fn count(events: &[AppEvent], wanted: AppEvent) -> usize {
        events.iter().filter(|e| **e == wanted).count()
    }

    #[test]
    fn connected_before_initialization() {
        let (m, _rx) = monitor();
        assert!(m.is_connected());
        assert!(!m.is_initialized());
    }

    #[tokio::test]
    async fn initialize_resets_and_applies_initial_reports() {
        let (m, _rx) = monitor();
        m.update_services_status_reports(&[working("CVMServer", 500)], 500);

        m.initialize(&[ServiceHealthReport::new("ComponentService")], 10);

        assert!(m.is_initialized());
        assert!(m.is_watchdog_armed());
        let reports = m.service_reports();
        assert!(reports.iter().all(|r| r.timestamp == NEVER_UPDATED));
        let endpoint = m.endpoint_report();
        assert_eq!(endpoint.status, HealthStatus::Working);
        assert_eq!(endpoint.timestamp, 10);
    }

    #[tokio::test]
    async fn case_insensitive_update_keeps_connected() {
        let (m, _rx) = monitor();
        m.initialize(&[ServiceHealthReport::new("ComponentService")], 1_000);

        m.update_services_status_reports(
            &[working("componentservice", 1_005), working("cvmserver", 1_005)],
            1_005,
        );

        assert!(m.is_connected());
        assert_eq!(m.app().status(), AppState::Ready);
        assert!(m.service_reports().iter().all(ServiceHealthReport::is_working));
    }

    #[tokio::test]
    async fn out_of_order_report_is_discarded() {
        let (m, _rx) = monitor();
        m.initialize(&[], 0);
        m.update_services_status_reports(&[working("CVMServer", 100)], 100);
        m.update_services_status_reports(&[failing("CVMServer", 50)], 50);

        let cvm = m
            .service_reports()
            .into_iter()
            .find(|r| r.matches("CVMServer"))
            .unwrap();
        assert_eq!(cvm.timestamp, 100);
        assert_eq!(cvm.status, HealthStatus::Working);
    }

    #[tokio::test]
    async fn failing_service_disconnects_and_degrades() {
        let (m, mut rx) = monitor();
        m.initialize(&[working("ComponentService", 1), working("CVMServer", 1)], 1);
        drain(&mut rx);

        m.update_services_status_reports(&[failing("CVMServer", 2)], 2);

        assert!(!m.is_connected());
        assert_eq!(m.app().status(), AppState::Connecting);
        let events = drain(&mut rx);
        assert_eq!(count(&events, AppEvent::ConnectivityChanged), 1);
    }

    #[tokio::test]
    async fn missing_maintained_service_counts_as_down() {
        let bus = EventBus::default();
        let app = Arc::new(AppStateMachine::new(bus));
        app.initialization_complete();
        let config = MonitorConfig {
            tracked_services: vec!["ComponentService".into()],
            maintained_services: vec!["ComponentService".into(), "CVMServer".into()],
            ..MonitorConfig::default()
        };
        let m = Arc::new(ConnectivityMonitor::new(config, app));
        m.initialize(&[], 0);

        m.update_services_status_reports(&[working("ComponentService", 1)], 1);
        assert!(!m.is_connected());
    }

    #[tokio::test]
    async fn partial_recovery_while_connecting_emits_nothing() {
        let (m, mut rx) = monitor();
        m.initialize(&[working("ComponentService", 1), working("CVMServer", 1)], 1);
        m.update_services_status_reports(
            &[failing("ComponentService", 2), failing("CVMServer", 2)],
            2,
        );
        assert_eq!(m.app().status(), AppState::Connecting);
        drain(&mut rx);

        m.update_services_status_reports(&[working("ComponentService", 3)], 3);

        assert!(drain(&mut rx).is_empty());
        assert_eq!(m.app().status(), AppState::Connecting);
        assert!(!m.is_connected());
    }

    #[tokio::test]
    async fn full_recovery_while_connecting_reconnects() {
        let (m, mut rx) = monitor();
        m.initialize(&[working("ComponentService", 1), working("CVMServer", 1)], 1);
        m.update_services_status_reports(&[failing("CVMServer", 2)], 2);
        drain(&mut rx);

        m.update_services_status_reports(&[working("CVMServer", 3)], 3);

        assert!(m.is_connected());
        assert_eq!(m.app().status(), AppState::Ready);
        let events = drain(&mut rx);
        assert_eq!(count(&events, AppEvent::ConnectivityChanged), 1);
        assert_eq!(count(&events, AppEvent::RebootRequested), 1);
    }

    #[tokio::test]
    async fn healthy_batch_while_ready_emits_nothing() {
        let (m, mut rx) = monitor();
        m.initialize(&[working("ComponentService", 1), working("CVMServer", 1)], 1);
        drain(&mut rx);

        m.update_services_status_reports(&[working("CVMServer", 2)], 2);
        m.update_services_status_reports(&[], 3);

        assert!(drain(&mut rx).is_empty());
        assert!(m.is_connected());
    }

    #[tokio::test]
    async fn endpoint_down_disconnects_even_while_connecting() {
        let (m, mut rx) = monitor();
        m.initialize(&[working("ComponentService", 1), working("CVMServer", 1)], 1);
        m.handle_reconnect(ReconnectCause::Timeout);
        assert_eq!(m.app().status(), AppState::Connecting);
        drain(&mut rx);

        m.handle_endpoint_connectivity_changed(false, None);

        assert!(!m.is_connected());
        assert_eq!(count(&drain(&mut rx), AppEvent::ConnectivityChanged), 1);
    }

    #[tokio::test]
    async fn local_disconnect_twice_reuses_timestamp() {
        let (m, _rx) = monitor();
        m.initialize(&[], 40);

        m.handle_endpoint_connectivity_changed(false, None);
        let first = m.endpoint_report();
        m.handle_endpoint_connectivity_changed(false, None);
        let second = m.endpoint_report();

        assert_eq!(first.status, HealthStatus::Error);
        assert_eq!(second.status, HealthStatus::Error);
        assert_eq!(first.timestamp, 40);
        assert_eq!(second.timestamp, first.timestamp);
    }

    #[tokio::test]
    async fn stale_endpoint_up_is_ignored() {
        let (m, _rx) = monitor();
        m.initialize(&[], 100);
        m.handle_endpoint_connectivity_changed(false, Some(200));
        m.handle_endpoint_connectivity_changed(true, Some(150));
        assert_eq!(m.endpoint_report().status, HealthStatus::Error);

        m.handle_endpoint_connectivity_changed(true, Some(250));
        assert_eq!(m.endpoint_report().status, HealthStatus::Working);
    }

    #[tokio::test]
    async fn endpoint_recovery_with_healthy_services_reconnects() {
        let (m, _rx) = monitor();
        m.initialize(&[working("ComponentService", 1), working("CVMServer", 1)], 1);
        m.handle_endpoint_connectivity_changed(false, None);
        assert_eq!(m.app().status(), AppState::Connecting);

        m.handle_endpoint_connectivity_changed(true, Some(5));
        assert!(m.is_connected());
        assert_eq!(m.app().status(), AppState::Ready);
    }

    #[tokio::test]
    async fn timeout_degrades_without_waiting() {
        let (m, mut rx) = monitor();
        m.initialize(&[], 1);
        drain(&mut rx);

        m.handle_reconnect(ReconnectCause::Timeout);

        assert_eq!(m.app().status(), AppState::Connecting);
        assert!(!m.is_connected());
        assert_eq!(count(&drain(&mut rx), AppEvent::ConnectivityChanged), 1);
    }

    #[tokio::test]
    async fn healthy_batch_clears_hard_disconnect() {
        let (m, mut rx) = monitor();
        m.initialize(&[working("ComponentService", 1), working("CVMServer", 1)], 1);
        m.handle_reconnect(ReconnectCause::Disconnected);
        assert!(!m.is_connected());
        assert_eq!(m.app().status(), AppState::Ready);
        drain(&mut rx);

        m.update_services_status_reports(&[working("CVMServer", 2)], 2);
        m.update_services_status_reports(&[working("CVMServer", 3)], 3);

        assert!(m.is_connected());
        assert_eq!(m.app().status(), AppState::Ready);
        assert_eq!(count(&drain(&mut rx), AppEvent::ConnectivityChanged), 1);
    }

    #[tokio::test]
    async fn disconnect_seen_while_preparing_clears_once_healthy() {
        let app = Arc::new(AppStateMachine::new(EventBus::default()));
        let m = Arc::new(ConnectivityMonitor::new(MonitorConfig::default(), app.clone()));
        m.initialize(&[], 1);
        m.update_services_status_reports(&[], 1);
        assert!(!m.is_connected());
        assert_eq!(app.status(), AppState::Preparing);

        app.initialization_complete();
        m.update_services_status_reports(
            &[working("ComponentService", 2), working("CVMServer", 2)],
            2,
        );

        assert!(m.is_connected());
        assert_eq!(app.status(), AppState::Ready);
    }

    #[tokio::test]
    async fn definite_disconnect_signals_directly() {
        let (m, mut rx) = monitor();
        m.initialize(&[], 1);
        drain(&mut rx);

        m.handle_channel_event(ChannelEvent::TransportError(TransportErrorInfo::with_code(
            "Disconnected",
        )));

        assert_eq!(drain(&mut rx), vec![AppEvent::Disconnected]);
        assert!(!m.is_connected());
    }

    #[tokio::test]
    async fn watchdog_escalates_once_after_timeout() {
        let (m, mut rx) = monitor();
        m.initialize(&[working("ComponentService", 1), working("CVMServer", 1)], 1);
        m.handle_reconnect(ReconnectCause::Timeout);
        drain(&mut rx);
        let start = Instant::now();

        assert!(!m.watchdog_tick(start + Duration::from_secs(60)));
        assert!(m.watchdog_tick(start + Duration::from_secs(121)));
        assert!(!m.watchdog_tick(start + Duration::from_secs(126)));

        assert_eq!(drain(&mut rx), vec![AppEvent::Disconnected]);
    }

    #[tokio::test]
    async fn degraded_verdicts_do_not_hold_off_watchdog() {
        let (m, mut rx) = monitor();
        m.initialize(&[working("ComponentService", 1), working("CVMServer", 1)], 1);
        m.handle_reconnect(ReconnectCause::Timeout);
        let start = Instant::now();

        m.update_services_status_reports(&[failing("CVMServer", 2)], 2);
        drain(&mut rx);

        assert!(m.watchdog_tick(start + Duration::from_secs(121)));
        assert_eq!(drain(&mut rx), vec![AppEvent::Disconnected]);
    }

    #[tokio::test]
    async fn watchdog_yields_to_healthy_verdict_in_same_tick() {
        let (m, _rx) = monitor();
        m.initialize(&[], 1);
        m.update_services_status_reports(
            &[working("ComponentService", 2), working("CVMServer", 2)],
            2,
        );
        let start = Instant::now();
        m.app().enter_connecting();

        assert!(!m.watchdog_tick(start + Duration::from_secs(121)));
        assert!(m.watchdog_tick(start + Duration::from_secs(126)));
    }

    #[tokio::test]
    async fn watchdog_quiet_when_ready_or_uninitialized() {
        let (m, mut rx) = monitor();
        let start = Instant::now();
        assert!(!m.watchdog_tick(start));
        assert!(!m.watchdog_tick(start + Duration::from_secs(600)));

        m.initialize(&[], 1);
        assert!(!m.watchdog_tick(Instant::now() + Duration::from_secs(600)));
        assert!(drain(&mut rx).iter().all(|e| *e != AppEvent::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn armed_watchdog_fires_exactly_once_on_simulated_clock() {
        let (m, mut rx) = monitor();
        m.initialize(&[working("ComponentService", 1), working("CVMServer", 1)], 1);
        m.handle_reconnect(ReconnectCause::Timeout);
        drain(&mut rx);

        tokio::time::sleep(Duration::from_secs(200)).await;

        assert_eq!(count(&drain(&mut rx), AppEvent::Disconnected), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn steady_error_batches_still_escalate() {
        let (m, mut rx) = monitor();
        m.initialize(&[working("ComponentService", 1), working("CVMServer", 1)], 1);
        m.update_services_status_reports(&[failing("CVMServer", 2)], 2);
        assert_eq!(m.app().status(), AppState::Connecting);
        drain(&mut rx);

        for ts in 3..53 {
            tokio::time::sleep(Duration::from_secs(4)).await;
            m.update_services_status_reports(&[failing("CVMServer", ts)], ts);
        }

        assert_eq!(m.app().status(), AppState::Connecting);
        assert_eq!(count(&drain(&mut rx), AppEvent::Disconnected), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovery_before_timeout_prevents_escalation() {
        let (m, mut rx) = monitor();
        m.initialize(&[working("ComponentService", 1), working("CVMServer", 1)], 1);
        m.update_services_status_reports(&[failing("CVMServer", 2)], 2);

        tokio::time::sleep(Duration::from_secs(90)).await;
        m.update_services_status_reports(&[working("CVMServer", 3)], 3);
        tokio::time::sleep(Duration::from_secs(200)).await;

        assert_eq!(m.app().status(), AppState::Ready);
        assert_eq!(count(&drain(&mut rx), AppEvent::Disconnected), 0);
    }

    #[tokio::test]
    async fn arming_twice_keeps_one_watchdog() {
        let (m, _rx) = monitor();
        m.monitor_connectivity();
        let first = m.watchdog.lock().unwrap().clone().unwrap();
        m.monitor_connectivity();
        let second = m.watchdog.lock().unwrap().clone().unwrap();
        assert!(!second.is_cancelled());
        first.cancel();
        assert!(second.is_cancelled());
    }

    #[tokio::test]
    async fn reset_restores_connected_and_stops_watchdog() {
        let (m, _rx) = monitor();
        m.initialize(&[working("ComponentService", 1)], 1);
        m.handle_endpoint_connectivity_changed(false, None);
        assert!(!m.is_connected());

        m.reset();

        assert!(m.is_connected());
        assert!(!m.is_initialized());
        assert!(!m.is_watchdog_armed());
        assert!(m.service_reports().iter().all(|r| r.timestamp == NEVER_UPDATED));
    }

    #[test]
    fn arming_without_runtime_is_a_no_op() {
        let (m, _rx) = monitor();
        m.monitor_connectivity();
        assert!(!m.is_watchdog_armed());
    }

    #[tokio::test]
    async fn malformed_batch_entries_do_not_block_the_rest() {
        let (m, _rx) = monitor();
        m.initialize(&[], 1);
        m.handle_channel_event(ChannelEvent::ServiceHealthBatch {
            reports: vec![
                serde_json::json!({"serviceName": "ComponentService"}),
                serde_json::json!("garbage"),
                serde_json::json!({"serviceName": "CVMServer", "status": "Working"}),
            ],
            timestamp: 9,
        });

        let cvm = m
            .service_reports()
            .into_iter()
            .find(|r| r.matches("CVMServer"))
            .unwrap();
        assert_eq!(cvm.status, HealthStatus::Working);
        assert_eq!(cvm.timestamp, 9);
    }

    #[tokio::test]
    async fn transport_ready_initializes_once() {
        let (m, _rx) = monitor();
        m.handle_channel_event(ChannelEvent::TransportReady { timestamp: 7 });
        assert!(m.is_initialized());
        assert_eq!(m.endpoint_report().timestamp, 7);

        m.handle_channel_event(ChannelEvent::TransportDisconnected);
        m.handle_channel_event(ChannelEvent::TransportReady { timestamp: 8 });
        let endpoint = m.endpoint_report();
        assert_eq!(endpoint.status, HealthStatus::Working);
        assert_eq!(endpoint.timestamp, 8);
    }
}
