//! Workflow controller.
//!
//! One [`UpdateController`] per process drives the update cycle. Every
//! trigger enters through [`UpdateController::handle`], which applies the
//! event under a single lock and then performs the resulting effects:
//! collaborator calls run on the tokio runtime and report back as further
//! events tagged with the [`CallToken`] they were started with.
//!
//! Host calls of one event finish before the next event's host calls start,
//! so the host sees them in event order.

mod event;
mod phase;
mod workflow;

use std::sync::Arc;

use appdist_login::AuthorizationCallback;
use appdist_storage::KeyValueStore;
use futures::future::join_all;
use parking_lot::{Mutex, ReentrantMutex};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

pub use event::{DecisionChoice, WorkflowEvent};
pub use phase::{InstallMode, WorkflowPhase, WorkflowSnapshot};

use self::event::Effect;
use self::workflow::Workflow;
use crate::checker::ReleaseChecker;
use crate::config::UpdateConfig;
use crate::download::{DownloadCoordinator, DownloadEngine, DownloadId};
use crate::error::{UpdateError, UpdateResult};
use crate::host::UpdateHost;
use crate::state::PersistedState;
use crate::token::CallToken;

/// External collaborators of the controller.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn KeyValueStore>,
    pub checker: Arc<dyn ReleaseChecker>,
    pub engine: Arc<dyn DownloadEngine>,
    pub host: Arc<dyn UpdateHost>,
}

struct Shared {
    /// Held from applying an event until its effects are performed.
    dispatch: ReentrantMutex<()>,
    workflow: Mutex<Workflow>,
    removals: Mutex<Vec<JoinHandle<()>>>,
    checker: Arc<dyn ReleaseChecker>,
    coordinator: DownloadCoordinator,
    host: Arc<dyn UpdateHost>,
    runtime: Handle,
}

/// Restart-resilient update workflow controller.
///
/// Cheap to clone; clones share the same workflow.
#[derive(Clone)]
pub struct UpdateController {
    shared: Arc<Shared>,
}

impl UpdateController {
    /// Create a controller running its tasks on the current tokio runtime.
    pub fn new(config: UpdateConfig, collaborators: Collaborators) -> UpdateResult<Self> {
        let runtime = Handle::try_current().map_err(|_| UpdateError::NoRuntime)?;
        Ok(Self::with_runtime(config, collaborators, runtime))
    }

    /// Create a controller running its tasks on `runtime`.
    pub fn with_runtime(config: UpdateConfig, collaborators: Collaborators, runtime: Handle) -> Self {
        let Collaborators {
            store,
            checker,
            engine,
            host,
        } = collaborators;
        let coordinator = DownloadCoordinator::new(engine);
        let workflow = Workflow::new(config, PersistedState::new(store), coordinator.clone());

        Self {
            shared: Arc::new(Shared {
                dispatch: ReentrantMutex::new(()),
                workflow: Mutex::new(workflow),
                removals: Mutex::new(Vec::new()),
                checker,
                coordinator,
                host,
                runtime,
            }),
        }
    }

    /// Apply one event and perform what it asks for.
    pub fn handle(&self, event: WorkflowEvent) {
        let _dispatch = self.shared.dispatch.lock();
        let effects = self.shared.workflow.lock().apply(event);
        for effect in effects {
            self.perform(effect);
        }
    }

    /// Mark the controller initialized and resume the workflow.
    pub fn start(&self) {
        self.handle(WorkflowEvent::Start);
    }

    pub fn resume(&self) {
        self.handle(WorkflowEvent::Resume);
    }

    pub fn enter_foreground(&self) {
        self.handle(WorkflowEvent::Foreground);
    }

    pub fn enter_background(&self) {
        self.handle(WorkflowEvent::Background);
    }

    /// Begin a new cycle unless a downloaded package is waiting.
    pub fn launcher_restarted(&self) {
        self.handle(WorkflowEvent::LauncherRestarted);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.handle(WorkflowEvent::SetEnabled(enabled));
    }

    /// Abandon the current cycle, cancel outstanding work and forget the
    /// cached authorization.
    pub fn reset(&self) {
        self.handle(WorkflowEvent::Reset);
    }

    /// Deliver the token handed back by the login page.
    pub fn authorization_callback(&self, callback: AuthorizationCallback) {
        self.handle(WorkflowEvent::AuthorizationCallback(callback));
    }

    pub fn accept(&self, ticket: CallToken) {
        self.decide(ticket, DecisionChoice::Accept);
    }

    pub fn decline(&self, ticket: CallToken) {
        self.decide(ticket, DecisionChoice::Decline);
    }

    /// End the cycle if `ticket` still identifies the pending release.
    pub fn complete_if_current(&self, ticket: CallToken) {
        self.decide(ticket, DecisionChoice::Cancel);
    }

    fn decide(&self, ticket: CallToken, choice: DecisionChoice) {
        self.handle(WorkflowEvent::Decision { ticket, choice });
    }

    /// Report that the download engine finished job `id`.
    pub fn download_completed(&self, id: DownloadId) {
        self.handle(WorkflowEvent::DownloadCompleted { id });
    }

    /// Forward engine completions from `completions` until the channel closes.
    pub fn forward_completions(&self, mut completions: mpsc::UnboundedReceiver<DownloadId>) -> JoinHandle<()> {
        let controller = self.clone();
        self.shared.runtime.spawn(async move {
            while let Some(id) = completions.recv().await {
                controller.download_completed(id);
            }
            trace!("Download completion channel closed");
        })
    }

    /// Stop handling events and cancel outstanding work.
    ///
    /// Persisted state is kept, so a later process resumes where this one
    /// stopped.
    pub fn shutdown(&self) {
        self.shared.workflow.lock().shutdown();
    }

    /// Wait for every download removal started so far to finish.
    pub async fn drain_removals(&self) {
        let pending = std::mem::take(&mut *self.shared.removals.lock());
        for result in join_all(pending).await {
            if let Err(e) = result {
                error!(error = %e, "Download removal task failed");
            }
        }
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.shared.workflow.lock().phase()
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.shared.workflow.lock().snapshot()
    }

    fn perform(&self, effect: Effect) {
        trace!(effect = effect.name(), "Perform");
        match effect {
            Effect::OpenLogin(url) => {
                if let Err(e) = self.shared.host.open_login(&url) {
                    error!(error = %e, "Failed to open login page");
                    self.shared.workflow.lock().login_failed();
                }
            }
            Effect::CheckRelease {
                call,
                update_token,
                cancel,
            } => {
                let controller = self.clone();
                let checker = self.shared.checker.clone();
                self.shared.runtime.spawn(async move {
                    let result = tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!(%call, "Release check canceled");
                            return;
                        }
                        result = checker.check_latest(&update_token) => result,
                    };
                    controller.handle(WorkflowEvent::ReleaseChecked { call, result });
                });
            }
            Effect::PresentDecision(request) => self.shared.host.present_decision(&request),
            Effect::ScheduleDownload {
                call,
                release,
                cancel,
            } => {
                let controller = self.clone();
                let coordinator = self.shared.coordinator.clone();
                self.shared.runtime.spawn(async move {
                    if cancel.is_cancelled() {
                        debug!(%call, "Download scheduling canceled");
                        return;
                    }
                    // Always reported: a job created after cancellation must
                    // still be removed.
                    let result = coordinator.schedule(&release).await;
                    controller.handle(WorkflowEvent::DownloadScheduled { call, result });
                });
            }
            Effect::InspectDownload { call, record } => {
                let controller = self.clone();
                let coordinator = self.shared.coordinator.clone();
                self.shared.runtime.spawn(async move {
                    let outcome = coordinator.inspect(&record).await;
                    controller.handle(WorkflowEvent::DownloadInspected {
                        call,
                        record,
                        outcome,
                    });
                });
            }
            Effect::RemoveDownload(id) => {
                let coordinator = self.shared.coordinator.clone();
                let task = self.shared.runtime.spawn(async move {
                    coordinator.discard(id).await;
                });
                let mut removals = self.shared.removals.lock();
                removals.retain(|task| !task.is_finished());
                removals.push(task);
            }
            Effect::BeginInstall(artifact) => {
                if let Err(e) = self.shared.host.begin_install(&artifact) {
                    error!(artifact = %artifact, error = %e, "No installer could open the downloaded release");
                }
            }
            Effect::NotifyDeferred(artifact) => self.shared.host.present_deferred_notification(&artifact),
            Effect::DismissNotification => self.shared.host.dismiss_deferred_notification(),
        }
    }
}
