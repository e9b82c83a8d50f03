/// Top-level application status gating UI rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    #[default]
    Preparing,
    Ready,
    Connecting,
    Error,
}

impl AppState {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Preparing, Self::Ready)
                | (Self::Preparing, Self::Error)
                // Degraded and back
                | (Self::Ready, Self::Connecting)
                | (Self::Connecting, Self::Ready)
                | (Self::Ready, Self::Error)
                | (Self::Connecting, Self::Error)
                // Forced reboot
                | (Self::Error, Self::Ready)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Connecting => "connecting",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the app entered [`AppState::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppErrorKind {
    CaptionLoad,
    LanguageLoad,
    Startup,
}
