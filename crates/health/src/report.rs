use serde::{Deserialize, Serialize};

use crate::error::HealthError;

/// Timestamp of a report that has never received an update.
pub const NEVER_UPDATED: i64 = -1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    #[default]
    Unknown,
    Working,
    Error,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Working => "Working",
            Self::Error => "Error",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HealthStatus {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Unknown, Self::Working, Self::Error]
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| HealthError::UnknownStatus(s.to_string()))
    }
}

/// Last known status of one named service.
///
/// Updates are monotonic in `timestamp`: an update older than or equal to
/// the stored one is discarded unless the caller forces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealthReport {
    pub service_name: String,
    pub status: HealthStatus,
    /// Display string supplied by the reporter. Opaque.
    pub last_update: String,
    /// Unix millis of the applied update, or [`NEVER_UPDATED`].
    pub timestamp: i64,
}

/// Lenient wire form: status is a free string, optional fields may be absent.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReport {
    service_name: String,
    status: String,
    #[serde(default)]
    last_update: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
}

impl ServiceHealthReport {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            status: HealthStatus::Unknown,
            last_update: String::new(),
            timestamp: NEVER_UPDATED,
        }
    }

    pub fn with_status(service_name: impl Into<String>, status: HealthStatus, timestamp: i64) -> Self {
        Self {
            status,
            timestamp,
            ..Self::new(service_name)
        }
    }

    /// Parse one entry of a health batch. Entries without a timestamp take
    /// `batch_timestamp`.
    ///
    /// # Errors
    /// Fails on missing fields, an empty service name or an unrecognised status.
    pub fn from_wire(value: &serde_json::Value, batch_timestamp: i64) -> Result<Self, HealthError> {
        let wire = WireReport::deserialize(value)?;
        if wire.service_name.trim().is_empty() {
            return Err(HealthError::EmptyServiceName);
        }
        Ok(Self {
            service_name: wire.service_name,
            status: wire.status.parse()?,
            last_update: wire.last_update.unwrap_or_default(),
            timestamp: wire.timestamp.unwrap_or(batch_timestamp),
        })
    }

    /// Case-insensitive service name match.
    pub fn matches(&self, service_name: &str) -> bool {
        self.service_name.eq_ignore_ascii_case(service_name)
    }

    pub fn is_working(&self) -> bool {
        self.status == HealthStatus::Working
    }

    /// Apply an update. Returns whether the report changed hands.
    ///
    /// Without `ignore_timestamp` the update only lands if `timestamp` is
    /// strictly newer than the stored one.
    pub fn update(
        &mut self,
        status: HealthStatus,
        last_update: &str,
        timestamp: i64,
        ignore_timestamp: bool,
    ) -> bool {
        if !ignore_timestamp && timestamp <= self.timestamp {
            tracing::debug!(
                service = %self.service_name,
                stored = self.timestamp,
                incoming = timestamp,
                "stale health update discarded"
            );
            return false;
        }
        self.status = status;
        self.last_update = last_update.to_string();
        self.timestamp = timestamp;
        true
    }

    /// [`update`](Self::update) from another report's fields.
    pub fn apply(&mut self, incoming: &Self, ignore_timestamp: bool) -> bool {
        self.update(
            incoming.status,
            &incoming.last_update,
            incoming.timestamp,
            ignore_timestamp,
        )
    }

    pub fn reset(&mut self) {
        self.status = HealthStatus::Unknown;
        self.last_update.clear();
        self.timestamp = NEVER_UPDATED;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_report_is_unknown_and_never_updated() {
        let r = ServiceHealthReport::new("CVMServer");
        assert_eq!(r.status, HealthStatus::Unknown);
        assert_eq!(r.timestamp, NEVER_UPDATED);
    }

    #[test]
    fn older_update_is_discarded() {
        let mut r = ServiceHealthReport::new("ComponentService");
        assert!(r.update(HealthStatus::Working, "10:00", 100, false));
        assert!(!r.update(HealthStatus::Error, "09:59", 50, false));
        assert_eq!(r.timestamp, 100);
        assert_eq!(r.status, HealthStatus::Working);
        assert_eq!(r.last_update, "10:00");
    }

    #[test]
    fn equal_timestamp_is_discarded() {
        let mut r = ServiceHealthReport::new("ComponentService");
        r.update(HealthStatus::Working, "", 100, false);
        assert!(!r.update(HealthStatus::Error, "", 100, false));
        assert_eq!(r.status, HealthStatus::Working);
    }

    #[test]
    fn forced_update_ignores_order() {
        let mut r = ServiceHealthReport::new("endpoint");
        r.update(HealthStatus::Working, "", 100, false);
        assert!(r.update(HealthStatus::Error, "", 40, true));
        assert_eq!(r.status, HealthStatus::Error);
        assert_eq!(r.timestamp, 40);
    }

    #[test]
    fn stored_timestamp_tracks_highest_applied() {
        let mut r = ServiceHealthReport::new("svc");
        for ts in [5, 3, 9, 9, 1, 12, 11] {
            let before = r.timestamp;
            r.update(HealthStatus::Working, &ts.to_string(), ts, false);
            assert!(r.timestamp >= before);
        }
        assert_eq!(r.timestamp, 12);
        assert_eq!(r.last_update, "12");
    }

    #[test]
    fn name_match_ignores_case() {
        let r = ServiceHealthReport::new("ComponentService");
        assert!(r.matches("componentservice"));
        assert!(r.matches("COMPONENTSERVICE"));
        assert!(!r.matches("CVMServer"));
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut r = ServiceHealthReport::with_status("svc", HealthStatus::Error, 77);
        r.last_update = "yesterday".into();
        r.reset();
        assert_eq!(r, ServiceHealthReport::new("svc"));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("working".parse::<HealthStatus>().unwrap(), HealthStatus::Working);
        assert_eq!(" ERROR ".parse::<HealthStatus>().unwrap(), HealthStatus::Error);
        assert!("degraded".parse::<HealthStatus>().is_err());
    }

    #[test]
    fn wire_entry_takes_batch_timestamp_when_missing() {
        let v = serde_json::json!({"serviceName": "CVMServer", "status": "Working"});
        let r = ServiceHealthReport::from_wire(&v, 1_234).unwrap();
        assert_eq!(r.timestamp, 1_234);
        assert_eq!(r.status, HealthStatus::Working);
        assert!(r.last_update.is_empty());
    }

    #[test]
    fn wire_entry_keeps_own_timestamp() {
        let v = serde_json::json!({
            "serviceName": "CVMServer",
            "status": "error",
            "lastUpdate": "2026-10-19 08:00",
            "timestamp": 99
        });
        let r = ServiceHealthReport::from_wire(&v, 1_234).unwrap();
        assert_eq!(r.timestamp, 99);
        assert_eq!(r.status, HealthStatus::Error);
        assert_eq!(r.last_update, "2026-10-19 08:00");
    }

    #[test]
    fn malformed_wire_entries_are_rejected() {
        let missing_status = serde_json::json!({"serviceName": "CVMServer"});
        assert!(matches!(
            ServiceHealthReport::from_wire(&missing_status, 0),
            Err(HealthError::MalformedReport(_))
        ));

        let bad_status = serde_json::json!({"serviceName": "CVMServer", "status": "flaky"});
        assert!(matches!(
            ServiceHealthReport::from_wire(&bad_status, 0),
            Err(HealthError::UnknownStatus(_))
        ));

        let blank = serde_json::json!({"serviceName": " ", "status": "Working"});
        assert!(matches!(
            ServiceHealthReport::from_wire(&blank, 0),
            Err(HealthError::EmptyServiceName)
        ));

        assert!(ServiceHealthReport::from_wire(&serde_json::json!(42), 0).is_err());
    }
}
