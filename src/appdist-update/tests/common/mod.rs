//! Fake collaborators for controller scenario tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use appdist_login::AuthorizationCallback;
use appdist_storage::MemoryStore;
use appdist_update::{
    AppIdentity, ArtifactRef, Collaborators, DecisionRequest, DownloadEngine, DownloadId,
    JobStatus, PersistedState, ReleaseChecker, ReleaseDetails, UpdateConfig, UpdateController,
    UpdateError, UpdateHost, UpdateResult,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, oneshot};
use url::Url;

pub const LOGIN_URL: &str = "https://login.appdist.test";

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

/// Let spawned tasks run for a moment.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

pub fn app() -> AppIdentity {
    AppIdentity {
        package_name: "dev.appdist.demo".to_string(),
        version_name: "1.4.0".to_string(),
        version_code: 5,
    }
}

pub fn config() -> UpdateConfig {
    UpdateConfig {
        app_secret: "app-secret".to_string(),
        login_url: LOGIN_URL.to_string(),
        app: app(),
        ..Default::default()
    }
}

pub fn release(version: i64, fingerprint: &str) -> ReleaseDetails {
    ReleaseDetails {
        id: 42,
        version,
        short_version: Some(format!("1.{version}.0")),
        fingerprint: fingerprint.to_string(),
        download_url: Url::parse("https://cdn.appdist.test/demo.pkg").unwrap(),
        release_notes: Some("Bug fixes".to_string()),
        min_api_level: None,
    }
}

/// Release checker answering only when the test says so.
#[derive(Default)]
pub struct ScriptedChecker {
    pending: Mutex<VecDeque<(String, oneshot::Sender<UpdateResult<ReleaseDetails>>)>>,
    calls: AtomicUsize,
}

impl ScriptedChecker {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Answer the oldest outstanding check and return the token it was
    /// called with.
    pub async fn respond(&self, result: UpdateResult<ReleaseDetails>) -> String {
        wait_for(|| self.pending() > 0).await;
        let (token, tx) = self.pending.lock().pop_front().unwrap();
        let _ = tx.send(result);
        token
    }
}

#[async_trait]
impl ReleaseChecker for ScriptedChecker {
    async fn check_latest(&self, update_token: &str) -> UpdateResult<ReleaseDetails> {
        let (tx, rx) = oneshot::channel();
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().push_back((update_token.to_string(), tx));
        rx.await.unwrap_or_else(|_| {
            Err(UpdateError::ConnectionFailed {
                message: "check abandoned".to_string(),
            })
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    OpenLogin(Url),
    Decision(DecisionRequest),
    Install(ArtifactRef),
    Notify(ArtifactRef),
    Dismiss,
}

/// Host recording every call it receives.
#[derive(Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
    fail_install: AtomicBool,
    fail_browser: AtomicBool,
    slow_notify: AtomicBool,
    notifying: AtomicBool,
}

impl RecordingHost {
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    pub fn fail_install(&self) {
        self.fail_install.store(true, Ordering::SeqCst);
    }

    pub fn fail_browser(&self) {
        self.fail_browser.store(true, Ordering::SeqCst);
    }

    /// Make deferred notifications take a while to show.
    pub fn slow_notify(&self) {
        self.slow_notify.store(true, Ordering::SeqCst);
    }

    /// Whether a deferred notification has started showing.
    pub fn notifying(&self) -> bool {
        self.notifying.load(Ordering::SeqCst)
    }

    pub fn login_urls(&self) -> Vec<Url> {
        self.filter(|call| match call {
            HostCall::OpenLogin(url) => Some(url.clone()),
            _ => None,
        })
    }

    pub fn decisions(&self) -> Vec<DecisionRequest> {
        self.filter(|call| match call {
            HostCall::Decision(request) => Some(request.clone()),
            _ => None,
        })
    }

    pub fn installs(&self) -> Vec<ArtifactRef> {
        self.filter(|call| match call {
            HostCall::Install(artifact) => Some(artifact.clone()),
            _ => None,
        })
    }

    pub fn notifications(&self) -> Vec<ArtifactRef> {
        self.filter(|call| match call {
            HostCall::Notify(artifact) => Some(artifact.clone()),
            _ => None,
        })
    }

    pub fn dismissals(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, HostCall::Dismiss))
            .count()
    }

    fn filter<T>(&self, f: impl Fn(&HostCall) -> Option<T>) -> Vec<T> {
        self.calls.lock().iter().filter_map(f).collect()
    }
}

impl UpdateHost for RecordingHost {
    fn open_login(&self, url: &Url) -> UpdateResult<()> {
        self.calls.lock().push(HostCall::OpenLogin(url.clone()));
        if self.fail_browser.load(Ordering::SeqCst) {
            return Err(UpdateError::BrowserUnavailable {
                message: "no browser".to_string(),
            });
        }
        Ok(())
    }

    fn present_decision(&self, request: &DecisionRequest) {
        self.calls.lock().push(HostCall::Decision(request.clone()));
    }

    fn begin_install(&self, artifact: &ArtifactRef) -> UpdateResult<()> {
        self.calls.lock().push(HostCall::Install(artifact.clone()));
        if self.fail_install.load(Ordering::SeqCst) {
            return Err(UpdateError::InstallFailed {
                message: "no installer".to_string(),
            });
        }
        Ok(())
    }

    fn present_deferred_notification(&self, artifact: &ArtifactRef) {
        self.notifying.store(true, Ordering::SeqCst);
        if self.slow_notify.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(200));
        }
        self.calls.lock().push(HostCall::Notify(artifact.clone()));
    }

    fn dismiss_deferred_notification(&self) {
        self.calls.lock().push(HostCall::Dismiss);
    }
}

/// In-memory download engine driven by the test.
pub struct FakeEngine {
    next: AtomicU64,
    jobs: Mutex<HashMap<DownloadId, JobStatus>>,
    enqueued: Mutex<Vec<DownloadId>>,
    removed: Mutex<Vec<DownloadId>>,
    held: AtomicBool,
    gate: Notify,
    status_calls: AtomicUsize,
    status_held: AtomicBool,
    status_gate: Notify,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(100),
            jobs: Mutex::new(HashMap::new()),
            enqueued: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            held: AtomicBool::new(false),
            gate: Notify::new(),
            status_calls: AtomicUsize::new(0),
            status_held: AtomicBool::new(false),
            status_gate: Notify::new(),
        }
    }
}

impl FakeEngine {
    pub fn enqueued(&self) -> Vec<DownloadId> {
        self.enqueued.lock().clone()
    }

    pub fn removed(&self) -> Vec<DownloadId> {
        self.removed.lock().clone()
    }

    pub fn last_id(&self) -> DownloadId {
        *self.enqueued.lock().last().unwrap()
    }

    pub fn finish(&self, id: DownloadId, location: &str) {
        self.jobs.lock().insert(
            id,
            JobStatus::Succeeded {
                location: location.to_string(),
            },
        );
    }

    pub fn fail(&self, id: DownloadId, reason: &str) {
        self.jobs.lock().insert(
            id,
            JobStatus::Failed {
                reason: reason.to_string(),
            },
        );
    }

    /// Make the next `enqueue` wait for [`release`](Self::release) before
    /// returning its id.
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.gate.notify_one();
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Make `status` read the job, then wait for
    /// [`release_status`](Self::release_status) before answering.
    pub fn hold_status(&self) {
        self.status_held.store(true, Ordering::SeqCst);
    }

    pub fn release_status(&self) {
        self.status_held.store(false, Ordering::SeqCst);
        self.status_gate.notify_one();
    }
}

#[async_trait]
impl DownloadEngine for FakeEngine {
    async fn enqueue(&self, _url: &Url) -> UpdateResult<DownloadId> {
        let id = DownloadId::new(self.next.fetch_add(1, Ordering::SeqCst)).unwrap();
        self.jobs.lock().insert(id, JobStatus::Running);
        self.enqueued.lock().push(id);
        if self.held.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        Ok(id)
    }

    async fn status(&self, id: DownloadId) -> UpdateResult<JobStatus> {
        let status = self.jobs.lock().get(&id).cloned().unwrap_or(JobStatus::Failed {
            reason: format!("unknown download {id}"),
        });
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.status_held.load(Ordering::SeqCst) {
            self.status_gate.notified().await;
        }
        Ok(status)
    }

    async fn remove(&self, id: DownloadId) {
        self.jobs.lock().remove(&id);
        self.removed.lock().push(id);
    }
}

/// A controller wired to fakes, plus handles on each fake.
pub struct Harness {
    pub controller: UpdateController,
    pub store: Arc<MemoryStore>,
    pub checker: Arc<ScriptedChecker>,
    pub engine: Arc<FakeEngine>,
    pub host: Arc<RecordingHost>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(config: UpdateConfig) -> Self {
        Self::build(config, Arc::new(MemoryStore::new()), Arc::new(FakeEngine::default()))
    }

    /// A fresh controller over the same persisted state and engine, as after
    /// a process restart.
    pub fn restart(&self) -> Self {
        self.controller.shutdown();
        Self::build(config(), self.store.clone(), self.engine.clone())
    }

    fn build(config: UpdateConfig, store: Arc<MemoryStore>, engine: Arc<FakeEngine>) -> Self {
        let checker = Arc::new(ScriptedChecker::default());
        let host = Arc::new(RecordingHost::default());
        let controller = UpdateController::new(
            config,
            Collaborators {
                store: store.clone(),
                checker: checker.clone(),
                engine: engine.clone(),
                host: host.clone(),
            },
        )
        .unwrap();

        Self {
            controller,
            store,
            checker,
            engine,
            host,
        }
    }

    pub fn state(&self) -> PersistedState {
        PersistedState::new(self.store.clone())
    }

    /// Callback echoing the persisted request id.
    pub fn callback(&self, update_token: &str) -> AuthorizationCallback {
        let request_id = self.state().request_id().unwrap();
        AuthorizationCallback::new(update_token, request_id)
    }

    /// From a fresh start to a presented decision for `release`.
    pub async fn drive_to_decision(&self, release: ReleaseDetails) -> DecisionRequest {
        self.controller.start();
        self.controller.enter_foreground();
        wait_for(|| self.host.login_urls().len() == 1).await;

        self.controller.authorization_callback(self.callback("token-1"));
        self.checker.respond(Ok(release)).await;
        wait_for(|| !self.host.decisions().is_empty()).await;
        self.host.decisions().remove(0)
    }

    /// From a fresh start to a scheduled, still running download.
    pub async fn drive_to_download(&self) -> DownloadId {
        let decision = self.drive_to_decision(release(6, "remote")).await;
        self.controller.accept(decision.ticket);
        wait_for(|| {
            self.state().download_marker() == appdist_update::DownloadMarker::InFlight
        })
        .await;
        self.engine.last_id()
    }
}
