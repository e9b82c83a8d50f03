//! Shared wiring for the unit tests of this crate, over the in-memory backends.

use std::sync::{Arc, Mutex};

use qcon::{
    AuthGrant, AuthUser, ChannelEvent, Credential, CrossTabMessage, EventBus, SessionBroadcast,
    SessionEvent,
};
use qcon_health::{AppStateMachine, ConnectivityMonitor, MonitorConfig};
use qcon_memory::{
    MemoryAuthEndpoint, MemoryBroadcastHub, MemoryRealtimeChannel, MemoryRequestTransport,
    MemoryTab,
};
use tokio::sync::{broadcast, mpsc};

use crate::gateway::{GatewayConfig, RequestGateway};
use crate::refresher::TokenRefresher;
use crate::store::TokenStore;

pub(crate) fn credential(token: &str, is_sso: bool) -> Credential {
    Credential::from_grant(
        AuthGrant {
            user: AuthUser {
                id: "u-1".into(),
                username: "operator".into(),
            },
            token: token.into(),
            refresh_token: format!("{token}-refresh"),
        },
        is_sso,
    )
}

pub(crate) struct Fixture {
    pub bus: EventBus,
    pub store: Arc<TokenStore>,
    pub auth: Arc<MemoryAuthEndpoint>,
    pub channel: Arc<MemoryRealtimeChannel>,
    pub broadcast: Arc<MemoryTab>,
    pub transport: Arc<MemoryRequestTransport>,
    pub app: Arc<AppStateMachine>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub refresher: Arc<TokenRefresher>,
    pub gateway: Arc<RequestGateway>,
    broadcasts: Mutex<broadcast::Receiver<CrossTabMessage>>,
    _channel_events: mpsc::Receiver<ChannelEvent>,
}

impl Fixture {
    pub fn new() -> Self {
        let bus = EventBus::default();
        let store = Arc::new(TokenStore::new());
        let auth = Arc::new(MemoryAuthEndpoint::new());
        let (channel, channel_events) = MemoryRealtimeChannel::new(8);
        let channel = Arc::new(channel);
        let broadcast = Arc::new(MemoryBroadcastHub::default().tab());
        let broadcasts = Mutex::new(broadcast.subscribe());
        let transport = Arc::new(MemoryRequestTransport::default());
        let app = Arc::new(AppStateMachine::new(bus.clone()));
        app.initialization_complete();
        let monitor = Arc::new(ConnectivityMonitor::new(MonitorConfig::default(), app.clone()));
        let refresher = Arc::new(TokenRefresher::new(
            store.clone(),
            auth.clone(),
            channel.clone(),
            broadcast.clone(),
            bus.clone(),
        ));
        let gateway = Arc::new(RequestGateway::new(
            GatewayConfig::default(),
            transport.clone(),
            store.clone(),
            refresher.clone(),
            monitor.clone(),
        ));
        Self {
            bus,
            store,
            auth,
            channel,
            broadcast,
            transport,
            app,
            monitor,
            refresher,
            gateway,
            broadcasts,
            _channel_events: channel_events,
        }
    }

    /// `(topic, bearer token)` of every request sent so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.transport
            .sent()
            .into_iter()
            .map(|(request, token)| (request.topic, token))
            .collect()
    }

    /// Session events broadcast since the last call.
    pub fn broadcast_events(&self) -> Vec<SessionEvent> {
        let mut rx = self.broadcasts.lock().unwrap();
        std::iter::from_fn(|| rx.try_recv().ok())
            .map(|message| message.event)
            .collect()
    }
}
