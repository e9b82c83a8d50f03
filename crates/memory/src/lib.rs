mod auth;
mod broadcast;
mod channel;
mod transport;

pub use auth::MemoryAuthEndpoint;
pub use broadcast::{MemoryBroadcastHub, MemoryTab};
pub use channel::{ChannelOp, MemoryRealtimeChannel};
pub use transport::{MemoryRequestTransport, MemoryTransportConfig};
