//! Observable workflow phase, derived from in-memory and persisted state.

use std::fmt;
use std::sync::Arc;

use crate::download::DownloadId;
use crate::release::ReleaseDetails;
use crate::state::DownloadMarker;

/// Where a ready package will be installed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// The application is in front; installation starts right away.
    Foreground,
    /// The user was notified; installation starts on the next foreground.
    Background,
}

/// Logical phase of the current cycle. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowPhase {
    Idle,
    AuthorizationPending,
    ReleaseCheckInFlight,
    DecisionPending,
    DownloadInFlight,
    InstallPending(InstallMode),
    Completed,
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AuthorizationPending => "authorization pending",
            Self::ReleaseCheckInFlight => "release check in flight",
            Self::DecisionPending => "decision pending",
            Self::DownloadInFlight => "download in flight",
            Self::InstallPending(InstallMode::Foreground) => "install pending (foreground)",
            Self::InstallPending(InstallMode::Background) => "install pending (background)",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Read-only view of the controller for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSnapshot {
    pub phase: WorkflowPhase,
    pub started: bool,
    pub enabled: bool,
    pub foreground: bool,
    pub browser_opened: bool,
    pub has_update_token: bool,
    pub pending_request_id: bool,
    pub download_id: Option<DownloadId>,
    pub download_marker: DownloadMarker,
    pub pending_release: Option<Arc<ReleaseDetails>>,
}
