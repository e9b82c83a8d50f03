use qcon::AppState;

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("malformed health report: {0}")]
    MalformedReport(#[from] serde_json::Error),

    #[error("unknown service status: {0}")]
    UnknownStatus(String),

    #[error("empty service name")]
    EmptyServiceName,

    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: AppState, to: AppState },
}
