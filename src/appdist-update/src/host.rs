//! Side-effect surface the workflow drives in its host application.

use std::sync::Arc;

use url::Url;

use crate::download::ArtifactRef;
use crate::error::UpdateResult;
use crate::release::ReleaseDetails;
use crate::token::CallToken;

/// An applicable release waiting for the user's choice.
///
/// The ticket must be handed back with the answer; answers carrying a ticket
/// the controller no longer holds are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRequest {
    pub ticket: CallToken,
    pub release: Arc<ReleaseDetails>,
}

/// Host-side collaborators invoked by the workflow.
///
/// Every call happens outside the controller's lock and must not block for
/// long: prompts are expected to answer later through
/// [`UpdateController::accept`](crate::UpdateController::accept) and friends.
pub trait UpdateHost: Send + Sync {
    /// Open the login page in a browser.
    fn open_login(&self, url: &Url) -> UpdateResult<()>;

    /// Ask the user whether to download `request.release`.
    fn present_decision(&self, request: &DecisionRequest);

    /// Hand a downloaded package to the installer.
    fn begin_install(&self, artifact: &ArtifactRef) -> UpdateResult<()>;

    /// Tell the user a package is ready while the application is in the
    /// background.
    fn present_deferred_notification(&self, artifact: &ArtifactRef);

    /// Withdraw a notification posted by
    /// [`present_deferred_notification`](Self::present_deferred_notification).
    fn dismiss_deferred_notification(&self) {}
}
