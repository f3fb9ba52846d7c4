//! Download scheduling and inspection.
//!
//! The job engine itself is a collaborator ([`DownloadEngine`]); the
//! coordinator decides what a job means for the workflow and keeps the
//! persisted download entries consistent with it.

use std::fmt;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::error::{UpdateError, UpdateResult};
use crate::release::ReleaseDetails;
use crate::state::{KEY_DOWNLOAD_URI, PersistedState};

/// Identifier of a download job. Zero is reserved for "no download".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DownloadId(NonZeroU64);

impl DownloadId {
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Location of a downloaded package that can be handed to an installer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef(Url);

impl ArtifactRef {
    /// Parse a persisted location: an absolute URL or an absolute file path.
    pub fn parse(location: &str) -> UpdateResult<Self> {
        let malformed = || UpdateError::MalformedState {
            key: KEY_DOWNLOAD_URI,
            value: location.to_string(),
        };
        match Url::parse(location) {
            Ok(url) if url.cannot_be_a_base() => Err(malformed()),
            Ok(url) => Ok(Self(url)),
            Err(_) => Url::from_file_path(location)
                .map(Self)
                .map_err(|()| malformed()),
        }
    }

    pub fn from_path(path: &Path) -> UpdateResult<Self> {
        Url::from_file_path(path)
            .map(Self)
            .map_err(|()| UpdateError::DownloadFailed {
                message: format!("not an absolute path: {}", path.display()),
            })
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Local file path, when the artifact lives on this machine.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        if self.0.scheme() == "file" {
            self.0.to_file_path().ok()
        } else {
            None
        }
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// A scheduled download job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    pub id: DownloadId,
}

impl DownloadRecord {
    pub fn from_id(id: DownloadId) -> Self {
        Self { id }
    }
}

/// Status of a job as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Succeeded { location: String },
    Failed { reason: String },
}

/// What an inspected job means for the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Ready(ArtifactRef),
    StillRunning,
    Failed(String),
}

/// External download job execution engine.
#[async_trait]
pub trait DownloadEngine: Send + Sync {
    /// Start a job for `url` and return its identifier.
    async fn enqueue(&self, url: &Url) -> UpdateResult<DownloadId>;

    /// Report the status of a job. Unknown jobs are failures.
    async fn status(&self, id: DownloadId) -> UpdateResult<JobStatus>;

    /// Cancel a job if it is running and delete whatever it produced.
    async fn remove(&self, id: DownloadId);
}

/// Schedules release downloads and interprets finished jobs.
#[derive(Clone)]
pub struct DownloadCoordinator {
    engine: Arc<dyn DownloadEngine>,
}

impl DownloadCoordinator {
    pub fn new(engine: Arc<dyn DownloadEngine>) -> Self {
        Self { engine }
    }

    /// Start downloading the package of `release`.
    pub async fn schedule(&self, release: &ReleaseDetails) -> UpdateResult<DownloadRecord> {
        debug!(url = %release.download_url, version = release.version, "Start downloading new release");
        let id = self.engine.enqueue(&release.download_url).await?;
        Ok(DownloadRecord::from_id(id))
    }

    /// Inspect a job that reported completion.
    pub async fn inspect(&self, record: &DownloadRecord) -> DownloadOutcome {
        match self.engine.status(record.id).await {
            Ok(JobStatus::Running) => DownloadOutcome::StillRunning,
            Ok(JobStatus::Succeeded { location }) => match ArtifactRef::parse(&location) {
                Ok(artifact) => DownloadOutcome::Ready(artifact),
                Err(e) => DownloadOutcome::Failed(e.to_string()),
            },
            Ok(JobStatus::Failed { reason }) => DownloadOutcome::Failed(reason),
            Err(e) => DownloadOutcome::Failed(e.to_string()),
        }
    }

    /// Cancel and delete a job. Errors are absorbed by the engine.
    pub async fn discard(&self, id: DownloadId) {
        debug!(download_id = %id, "Delete download");
        self.engine.remove(id).await;
    }

    /// Persist `record` as the tracked download with an in-flight marker.
    ///
    /// Returns the previously tracked job, which the caller must discard.
    pub fn track(&self, state: &PersistedState, record: &DownloadRecord) -> Option<DownloadId> {
        let previous = state.download_id().filter(|prev| *prev != record.id);
        state.set_download_id(record.id);
        state.mark_download_in_flight();
        previous
    }

    /// Whether `id` is the job the persisted state is waiting for.
    pub fn is_tracked(&self, state: &PersistedState, id: DownloadId) -> bool {
        state.download_id() == Some(id)
    }
}
