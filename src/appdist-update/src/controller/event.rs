//! Messages accepted by the controller and the effects it emits.

use std::sync::Arc;

use appdist_login::AuthorizationCallback;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::download::{ArtifactRef, DownloadId, DownloadOutcome, DownloadRecord};
use crate::error::UpdateResult;
use crate::host::DecisionRequest;
use crate::release::ReleaseDetails;
use crate::token::CallToken;

/// The user's answer to a [`DecisionRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionChoice {
    /// Download and install the release.
    Accept,
    /// Skip the release for this cycle.
    Decline,
    /// The prompt went away without an answer.
    Cancel,
}

/// Everything that can advance the workflow.
///
/// Host triggers come first; the remaining variants carry results of
/// asynchronous operations back to the controller together with the token
/// that identifies the operation.
#[derive(Debug)]
pub enum WorkflowEvent {
    /// The host finished initializing the controller.
    Start,
    /// Re-evaluate the workflow without changing any input.
    Resume,
    /// The application came to the foreground.
    Foreground,
    /// The application left the foreground.
    Background,
    /// The application's entry point was launched again.
    LauncherRestarted,
    /// The update service was switched on or off.
    SetEnabled(bool),
    /// Abandon the current cycle and forget the cached authorization.
    Reset,
    /// The browser handed back an update token.
    AuthorizationCallback(AuthorizationCallback),
    /// A release check finished.
    ReleaseChecked {
        call: CallToken,
        result: UpdateResult<ReleaseDetails>,
    },
    /// The user answered a decision prompt.
    Decision {
        ticket: CallToken,
        choice: DecisionChoice,
    },
    /// A download job was created, or creating it failed.
    DownloadScheduled {
        call: CallToken,
        result: UpdateResult<DownloadRecord>,
    },
    /// The download engine reported that a job finished.
    DownloadCompleted { id: DownloadId },
    /// A finished job was inspected.
    DownloadInspected {
        call: CallToken,
        record: DownloadRecord,
        outcome: DownloadOutcome,
    },
}

/// Work the controller asks for once its lock is released.
pub(crate) enum Effect {
    OpenLogin(Url),
    CheckRelease {
        call: CallToken,
        update_token: String,
        cancel: CancellationToken,
    },
    PresentDecision(DecisionRequest),
    ScheduleDownload {
        call: CallToken,
        release: Arc<ReleaseDetails>,
        cancel: CancellationToken,
    },
    InspectDownload {
        call: CallToken,
        record: DownloadRecord,
    },
    RemoveDownload(DownloadId),
    BeginInstall(ArtifactRef),
    NotifyDeferred(ArtifactRef),
    DismissNotification,
}

impl Effect {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::OpenLogin(_) => "open_login",
            Self::CheckRelease { .. } => "check_release",
            Self::PresentDecision(_) => "present_decision",
            Self::ScheduleDownload { .. } => "schedule_download",
            Self::InspectDownload { .. } => "inspect_download",
            Self::RemoveDownload(_) => "remove_download",
            Self::BeginInstall(_) => "begin_install",
            Self::NotifyDeferred(_) => "notify_deferred",
            Self::DismissNotification => "dismiss_notification",
        }
    }
}
