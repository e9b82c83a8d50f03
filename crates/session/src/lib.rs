mod error;
mod gateway;
mod mirror;
mod refresher;
mod session;
mod store;
#[cfg(test)]
mod testing;

pub use error::{GatewayError, RefreshError};
pub use gateway::{GatewayConfig, RequestGateway};
pub use mirror::SessionMirror;
pub use refresher::TokenRefresher;
pub use session::SessionManager;
pub use store::TokenStore;
