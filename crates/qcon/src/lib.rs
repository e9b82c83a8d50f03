mod auth;
mod bus;
mod channel;
mod credential;
mod error;
mod request;
mod session;
mod state;

pub use auth::{AuthEndpoint, AuthGrant, AuthUser, CredentialRequest};
pub use bus::{AppEvent, EventBus};
pub use channel::{ChannelEvent, RealtimeChannel, ReconnectCause, TransportErrorInfo};
pub use credential::{Credential, RefreshTokenData};
pub use error::ConsoleError;
pub use request::{Request, RequestTransport, Response, ResultCode, TransportFailure};
pub use session::{CrossTabMessage, SessionBroadcast, SessionEvent, SessionSnapshot};
pub use state::{AppErrorKind, AppState};

/// Current wall-clock time in unix milliseconds.
///
/// Returns 0 if the system clock reads before the epoch.
#[allow(clippy::cast_possible_truncation)] // millis since epoch fits in i64 for the foreseeable future
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}
