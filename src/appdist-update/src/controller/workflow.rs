//! The workflow state machine.
//!
//! [`Workflow::apply`] runs under the controller's lock. It mutates in-memory
//! and persisted state and returns the [`Effect`]s to perform afterwards; it
//! never waits on a collaborator.

use std::sync::Arc;

use appdist_login::{AuthorizationCallback, LoginRequest, generate_request_id};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use super::event::{DecisionChoice, Effect, WorkflowEvent};
use super::phase::{InstallMode, WorkflowPhase, WorkflowSnapshot};
use crate::config::UpdateConfig;
use crate::download::{ArtifactRef, DownloadCoordinator, DownloadId, DownloadOutcome, DownloadRecord};
use crate::error::UpdateResult;
use crate::host::DecisionRequest;
use crate::release::ReleaseDetails;
use crate::state::{DownloadMarker, PersistedState};
use crate::token::{CallToken, TokenMint};
use crate::version::{LocalRelease, is_applicable, release_hash};

struct InFlight {
    call: CallToken,
    cancel: CancellationToken,
}

struct Scheduling {
    call: CallToken,
    cancel: CancellationToken,
}

struct Inspection {
    call: CallToken,
    id: DownloadId,
}

pub(crate) struct Workflow {
    config: UpdateConfig,
    local: LocalRelease,
    persisted: PersistedState,
    coordinator: DownloadCoordinator,
    mint: TokenMint,

    started: bool,
    enabled: bool,
    foreground: bool,
    browser_opened: bool,
    completed: bool,
    decision_presented: bool,
    shut_down: bool,

    buffered_callback: Option<AuthorizationCallback>,
    check: Option<InFlight>,
    decision: Option<DecisionRequest>,
    scheduling: Option<Scheduling>,
    inspection: Option<Inspection>,
    early_completion: Option<DownloadId>,
}

impl Workflow {
    pub(crate) fn new(
        config: UpdateConfig,
        persisted: PersistedState,
        coordinator: DownloadCoordinator,
    ) -> Self {
        Self {
            local: config.app.local_release(),
            enabled: config.enabled,
            config,
            persisted,
            coordinator,
            mint: TokenMint::default(),
            started: false,
            foreground: false,
            browser_opened: false,
            completed: false,
            decision_presented: false,
            shut_down: false,
            buffered_callback: None,
            check: None,
            decision: None,
            scheduling: None,
            inspection: None,
            early_completion: None,
        }
    }

    pub(crate) fn apply(&mut self, event: WorkflowEvent) -> Vec<Effect> {
        let mut fx = Vec::new();
        if self.shut_down {
            debug!(?event, "Controller is shut down, ignoring event");
            return fx;
        }

        match event {
            WorkflowEvent::Start => {
                self.started = true;
                self.resume(&mut fx);
            }
            WorkflowEvent::Resume => self.resume(&mut fx),
            WorkflowEvent::Foreground => {
                self.foreground = true;
                self.resume(&mut fx);
            }
            WorkflowEvent::Background => {
                self.foreground = false;
                // The prompt goes away with the window.
                self.decision_presented = false;
            }
            WorkflowEvent::LauncherRestarted => self.launcher_restarted(),
            WorkflowEvent::SetEnabled(enabled) => self.set_enabled(enabled, &mut fx),
            WorkflowEvent::Reset => self.reset(&mut fx),
            WorkflowEvent::AuthorizationCallback(callback) => {
                if self.started {
                    self.consume_callback(callback, &mut fx);
                } else {
                    debug!("Controller not started yet, keeping update token for later");
                    self.buffered_callback = Some(callback);
                }
            }
            WorkflowEvent::ReleaseChecked { call, result } => {
                self.on_release_checked(call, result, &mut fx)
            }
            WorkflowEvent::Decision { ticket, choice } => self.on_decision(ticket, choice, &mut fx),
            WorkflowEvent::DownloadScheduled { call, result } => {
                self.on_download_scheduled(call, result, &mut fx)
            }
            WorkflowEvent::DownloadCompleted { id } => self.on_download_completed(id, &mut fx),
            WorkflowEvent::DownloadInspected {
                call,
                record,
                outcome,
            } => self.on_download_inspected(call, record, outcome, &mut fx),
        }
        fx
    }

    /// Re-entry: performs at most one action, in fixed priority order.
    fn resume(&mut self, fx: &mut Vec<Effect>) {
        if !self.started {
            trace!("Controller not started yet");
            return;
        }

        if let Some(callback) = self.buffered_callback.take() {
            self.consume_callback(callback, fx);
            return;
        }

        if !self.enabled || !self.foreground || self.completed {
            trace!(
                enabled = self.enabled,
                foreground = self.foreground,
                completed = self.completed,
                "Nothing to resume"
            );
            return;
        }

        match self.persisted.download_marker() {
            DownloadMarker::ReadyAt(location) => match ArtifactRef::parse(&location) {
                Ok(artifact) => {
                    debug!(artifact = %artifact, "Resume installing downloaded release");
                    self.install(artifact, fx);
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "Download location was invalid, discarding it");
                    self.cancel_previous_tasks(fx);
                }
            },
            DownloadMarker::InFlight => {
                debug!("Download is still in progress");
                return;
            }
            DownloadMarker::NoDownload => {}
        }

        if self.scheduling.is_some() || self.inspection.is_some() {
            debug!("Download is being scheduled or inspected");
            return;
        }

        if let Some(decision) = &self.decision {
            if !self.decision_presented {
                debug!(ticket = %decision.ticket, "Show pending release again");
                fx.push(Effect::PresentDecision(decision.clone()));
                self.decision_presented = true;
            }
            return;
        }

        if let Some(check) = &self.check {
            debug!(call = %check.call, "Release check already in progress");
            return;
        }

        if let Some(update_token) = self.persisted.update_token() {
            self.start_check(update_token, fx);
            return;
        }

        if self.browser_opened {
            debug!("Waiting for the browser to return an update token");
            return;
        }

        self.start_login(fx);
    }

    fn start_login(&mut self, fx: &mut Vec<Effect>) {
        let request = LoginRequest {
            app_secret: self.config.app_secret.clone(),
            release_hash: release_hash(&self.config.app),
            redirect_id: self.config.app.package_name.clone(),
            request_id: generate_request_id(),
            platform: self.config.platform.clone(),
        };
        let url = match request.redirect_url(&self.config.login_url) {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "Cannot build login URL");
                return;
            }
        };

        self.persisted.set_request_id(&request.request_id);
        self.browser_opened = true;
        debug!(%url, "No token, need to open browser");
        fx.push(Effect::OpenLogin(url));
    }

    fn consume_callback(&mut self, callback: AuthorizationCallback, fx: &mut Vec<Effect>) {
        if !self.enabled {
            warn!("Update service is disabled, ignoring update token");
            return;
        }

        let expected = self.persisted.request_id();
        if let Err(e) = callback.validate(expected.as_deref()) {
            warn!(error = %e, "Ignoring update token");
            return;
        }

        debug!("Stored update token");
        self.persisted.set_update_token(&callback.update_token);
        self.persisted.clear_request_id();
        self.browser_opened = false;
        self.completed = false;
        self.cancel_previous_tasks(fx);
        self.start_check(callback.update_token, fx);
    }

    fn start_check(&mut self, update_token: String, fx: &mut Vec<Effect>) {
        let call = self.mint.mint();
        let cancel = CancellationToken::new();
        debug!(%call, "Check latest release");
        self.check = Some(InFlight {
            call,
            cancel: cancel.clone(),
        });
        fx.push(Effect::CheckRelease {
            call,
            update_token,
            cancel,
        });
    }

    fn on_release_checked(
        &mut self,
        call: CallToken,
        result: UpdateResult<ReleaseDetails>,
        fx: &mut Vec<Effect>,
    ) {
        if self.check.as_ref().map(|check| check.call) != Some(call) {
            debug!(%call, "Ignoring stale release check result");
            return;
        }
        self.check = None;

        let release = match result {
            Ok(release) => release,
            Err(e) => {
                error!(error = %e, "Failed to check latest release");
                self.complete_cycle();
                return;
            }
        };

        if !is_applicable(&self.local, &release) {
            debug!(
                version = release.version,
                installed = self.local.version,
                "Latest release is not more recent"
            );
            self.complete_cycle();
            return;
        }

        let request = DecisionRequest {
            ticket: call,
            release: Arc::new(release),
        };
        debug!(version = request.release.version, ticket = %call, "New release available");
        if self.foreground {
            fx.push(Effect::PresentDecision(request.clone()));
            self.decision_presented = true;
        }
        self.decision = Some(request);
    }

    fn on_decision(&mut self, ticket: CallToken, choice: DecisionChoice, fx: &mut Vec<Effect>) {
        let Some(decision) = self.decision.as_ref().filter(|d| d.ticket == ticket) else {
            debug!(%ticket, ?choice, "Ignoring answer to a stale decision");
            return;
        };

        match choice {
            DecisionChoice::Accept => {
                let release = decision.release.clone();
                self.decision = None;
                self.decision_presented = false;

                let call = self.mint.mint();
                let cancel = CancellationToken::new();
                debug!(%call, version = release.version, "Release accepted, scheduling download");
                self.scheduling = Some(Scheduling {
                    call,
                    cancel: cancel.clone(),
                });
                fx.push(Effect::ScheduleDownload {
                    call,
                    release,
                    cancel,
                });
            }
            DecisionChoice::Decline | DecisionChoice::Cancel => {
                debug!(?choice, "Release not accepted");
                self.complete_cycle();
            }
        }
    }

    fn on_download_scheduled(
        &mut self,
        call: CallToken,
        result: UpdateResult<DownloadRecord>,
        fx: &mut Vec<Effect>,
    ) {
        if self.scheduling.as_ref().map(|s| s.call) != Some(call) {
            if let Ok(record) = result {
                debug!(%call, download_id = %record.id, "State changed while scheduling, removing download");
                fx.push(Effect::RemoveDownload(record.id));
            }
            return;
        }
        self.scheduling = None;

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, "Failed to schedule download");
                self.complete_cycle();
                return;
            }
        };

        if let Some(previous) = self.coordinator.track(&self.persisted, &record) {
            debug!(download_id = %previous, "Removing previous download");
            fx.push(Effect::RemoveDownload(previous));
            fx.push(Effect::DismissNotification);
        }
        debug!(download_id = %record.id, "Download scheduled");

        if let Some(early) = self.early_completion.take() {
            if early == record.id {
                self.start_inspection(record, fx);
            } else {
                warn!(download_id = %early, "Removing download we didn't expect");
                fx.push(Effect::RemoveDownload(early));
            }
        }
    }

    fn on_download_completed(&mut self, id: DownloadId, fx: &mut Vec<Effect>) {
        if self.coordinator.is_tracked(&self.persisted, id) {
            if self.persisted.download_marker() != DownloadMarker::InFlight {
                debug!(download_id = %id, "Download already processed");
                return;
            }
            if self.inspection.as_ref().is_some_and(|i| i.id == id) {
                debug!(download_id = %id, "Download already being inspected");
                return;
            }
            self.start_inspection(DownloadRecord::from_id(id), fx);
        } else if self.scheduling.is_some() {
            // The job may finish before its id is known.
            debug!(download_id = %id, "Download completed while scheduling");
            if let Some(replaced) = self.early_completion.replace(id) {
                fx.push(Effect::RemoveDownload(replaced));
            }
        } else {
            warn!(download_id = %id, "Removing download we didn't expect");
            fx.push(Effect::RemoveDownload(id));
        }
    }

    fn start_inspection(&mut self, record: DownloadRecord, fx: &mut Vec<Effect>) {
        let call = self.mint.mint();
        trace!(%call, download_id = %record.id, "Inspect download");
        self.inspection = Some(Inspection { call, id: record.id });
        fx.push(Effect::InspectDownload { call, record });
    }

    fn on_download_inspected(
        &mut self,
        call: CallToken,
        record: DownloadRecord,
        outcome: DownloadOutcome,
        fx: &mut Vec<Effect>,
    ) {
        if self.inspection.as_ref().map(|i| i.call) != Some(call) {
            debug!(%call, download_id = %record.id, "Ignoring stale download inspection");
            return;
        }
        self.inspection = None;

        match outcome {
            DownloadOutcome::StillRunning => {
                trace!(download_id = %record.id, "Download still in progress");
            }
            DownloadOutcome::Ready(artifact) => {
                if self.foreground && self.enabled {
                    debug!(download_id = %record.id, "Application is in foreground, install now");
                    self.install(artifact, fx);
                } else {
                    debug!(download_id = %record.id, "Application is in background, post a notification");
                    self.persisted.mark_download_ready(&artifact);
                    fx.push(Effect::NotifyDeferred(artifact));
                }
            }
            DownloadOutcome::Failed(reason) => {
                error!(download_id = %record.id, %reason, "Failed to download update");
                fx.push(Effect::RemoveDownload(record.id));
                self.persisted.clear_download_id();
                self.complete_cycle();
            }
        }
    }

    fn install(&mut self, artifact: ArtifactRef, fx: &mut Vec<Effect>) {
        fx.push(Effect::DismissNotification);
        fx.push(Effect::BeginInstall(artifact));
        self.complete_cycle();
    }

    fn set_enabled(&mut self, enabled: bool, fx: &mut Vec<Effect>) {
        if enabled {
            if !self.enabled {
                debug!("Update service enabled");
                self.enabled = true;
                self.browser_opened = false;
                self.completed = false;
            }
            self.resume(fx);
        } else {
            debug!("Update service disabled");
            self.enabled = false;
            self.reset(fx);
        }
    }

    fn launcher_restarted(&mut self) {
        if self.persisted.download_marker() == DownloadMarker::NoDownload {
            debug!("Launcher restarted, starting a new cycle");
            self.completed = false;
            self.browser_opened = false;
        }
    }

    /// Abandon the cycle and forget the authorization. Idempotent.
    fn reset(&mut self, fx: &mut Vec<Effect>) {
        self.cancel_previous_tasks(fx);
        self.persisted.clear_update_token();
        self.persisted.clear_request_id();
        self.buffered_callback = None;
        self.browser_opened = false;
        self.completed = false;
    }

    fn cancel_previous_tasks(&mut self, fx: &mut Vec<Effect>) {
        if let Some(check) = self.check.take() {
            debug!(call = %check.call, "Cancel release check");
            check.cancel.cancel();
        }
        if let Some(scheduling) = self.scheduling.take() {
            debug!(call = %scheduling.call, "Cancel download scheduling");
            scheduling.cancel.cancel();
        }
        self.inspection = None;
        if let Some(early) = self.early_completion.take() {
            fx.push(Effect::RemoveDownload(early));
        }
        self.decision = None;
        self.decision_presented = false;

        if let Some(id) = self.persisted.download_id() {
            fx.push(Effect::RemoveDownload(id));
            fx.push(Effect::DismissNotification);
        }
        self.persisted.clear_download_id();
        self.persisted.clear_download_marker();
    }

    /// End the cycle. The tracked download id is kept so its file can be
    /// removed when the next download is scheduled.
    fn complete_cycle(&mut self) {
        self.persisted.clear_download_marker();
        if let Some(check) = self.check.take() {
            check.cancel.cancel();
        }
        self.decision = None;
        self.decision_presented = false;
        self.completed = true;
        debug!("Update cycle completed");
    }

    /// Stop honoring events. Persisted state is left for the next process.
    pub(crate) fn shutdown(&mut self) {
        if let Some(check) = self.check.take() {
            check.cancel.cancel();
        }
        if let Some(scheduling) = self.scheduling.take() {
            scheduling.cancel.cancel();
        }
        self.shut_down = true;
    }

    pub(crate) fn login_failed(&mut self) {
        self.browser_opened = false;
    }

    pub(crate) fn phase(&self) -> WorkflowPhase {
        if self.completed {
            return WorkflowPhase::Completed;
        }
        match self.persisted.download_marker() {
            DownloadMarker::ReadyAt(_) => {
                let mode = if self.foreground {
                    InstallMode::Foreground
                } else {
                    InstallMode::Background
                };
                return WorkflowPhase::InstallPending(mode);
            }
            DownloadMarker::InFlight => return WorkflowPhase::DownloadInFlight,
            DownloadMarker::NoDownload => {}
        }
        if self.scheduling.is_some() || self.inspection.is_some() {
            WorkflowPhase::DownloadInFlight
        } else if self.decision.is_some() {
            WorkflowPhase::DecisionPending
        } else if self.check.is_some() {
            WorkflowPhase::ReleaseCheckInFlight
        } else if self.browser_opened {
            WorkflowPhase::AuthorizationPending
        } else {
            WorkflowPhase::Idle
        }
    }

    pub(crate) fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            phase: self.phase(),
            started: self.started,
            enabled: self.enabled,
            foreground: self.foreground,
            browser_opened: self.browser_opened,
            has_update_token: self.persisted.update_token().is_some(),
            pending_request_id: self.persisted.request_id().is_some(),
            download_id: self.persisted.download_id(),
            download_marker: self.persisted.download_marker(),
            pending_release: self.decision.as_ref().map(|d| d.release.clone()),
        }
    }
}
