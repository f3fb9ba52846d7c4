//! HTTP download engine backed by tokio tasks.
//!
//! Each job streams its package into the download directory and reports its
//! id on a completion channel once it finishes, successfully or not. Jobs
//! live in memory only; an id persisted by an earlier process reads as a
//! failed job, and removing it deletes whatever file that process left.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::checker::USER_AGENT;
use crate::download::{ArtifactRef, DownloadEngine, DownloadId, JobStatus};
use crate::error::{UpdateError, UpdateResult};

const DEFAULT_FILE_NAME: &str = "release.pkg";

struct Job {
    status: JobStatus,
    path: PathBuf,
    task: Option<JoinHandle<()>>,
}

struct Inner {
    client: Client,
    dir: PathBuf,
    next_id: Mutex<u64>,
    jobs: Mutex<HashMap<DownloadId, Job>>,
    completions: mpsc::UnboundedSender<DownloadId>,
}

/// Downloads release packages over HTTP into a local directory.
#[derive(Clone)]
pub struct HttpDownloadEngine {
    inner: Arc<Inner>,
}

impl HttpDownloadEngine {
    /// Create an engine writing into `dir` and reporting finished jobs on
    /// `completions`.
    pub fn new(dir: impl AsRef<Path>, completions: mpsc::UnboundedSender<DownloadId>) -> UpdateResult<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Self::with_client(client, dir, completions)
    }

    pub fn with_client(
        client: Client,
        dir: impl AsRef<Path>,
        completions: mpsc::UnboundedSender<DownloadId>,
    ) -> UpdateResult<Self> {
        let dir = std::path::absolute(dir.as_ref())?;
        std::fs::create_dir_all(&dir)?;

        // Seeded from the clock so ids from an earlier process are not reused.
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                dir,
                next_id: Mutex::new(seed),
                jobs: Mutex::new(HashMap::new()),
                completions,
            }),
        })
    }

    /// Directory downloaded packages are written to.
    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    fn allocate_id(&self) -> UpdateResult<DownloadId> {
        let mut next = self.inner.next_id.lock();
        *next = next.wrapping_add(1);
        DownloadId::new(*next).ok_or_else(|| UpdateError::DownloadFailed {
            message: "download id space exhausted".to_string(),
        })
    }
}

fn file_name_for(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(|name| {
            name.chars()
                .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
                .collect()
        })
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string())
}

async fn fetch(client: &Client, url: &Url, dest: &Path) -> UpdateResult<()> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| UpdateError::DownloadFailed {
            message: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(UpdateError::DownloadFailed {
            message: format!("HTTP {}", response.status()),
        });
    }

    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| UpdateError::DownloadFailed {
            message: e.to_string(),
        })?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;
    debug!(path = %dest.display(), bytes = downloaded, "Download written");
    Ok(())
}

async fn run_job(inner: Arc<Inner>, id: DownloadId, url: Url, dest: PathBuf) {
    let status = match fetch(&inner.client, &url, &dest).await {
        Ok(()) => match ArtifactRef::from_path(&dest) {
            Ok(artifact) => {
                info!(download_id = %id, path = %dest.display(), "Download finished");
                JobStatus::Succeeded {
                    location: artifact.to_string(),
                }
            }
            Err(e) => JobStatus::Failed {
                reason: e.to_string(),
            },
        },
        Err(e) => {
            warn!(download_id = %id, url = %url, error = %e, "Download failed");
            let _ = tokio::fs::remove_file(&dest).await;
            JobStatus::Failed {
                reason: e.to_string(),
            }
        }
    };

    {
        let mut jobs = inner.jobs.lock();
        match jobs.get_mut(&id) {
            Some(job) => {
                job.status = status;
                job.task = None;
            }
            // Removed while running.
            None => return,
        }
    }

    if inner.completions.send(id).is_err() {
        debug!(download_id = %id, "No listener for download completion");
    }
}

/// Files in `dir` written for `id`, following the `{id}_{name}` scheme.
async fn leftover_files(dir: &Path, id: DownloadId) -> Vec<PathBuf> {
    let prefix = format!("{id}_");
    let mut found = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to list download directory");
            return found;
        }
    };
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                if entry.file_name().to_string_lossy().starts_with(&prefix) {
                    found.push(entry.path());
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to list download directory");
                break;
            }
        }
    }
    found
}

async fn delete_file(id: DownloadId, path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(download_id = %id, path = %path.display(), "Removed download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(download_id = %id, error = %e, "Failed to delete downloaded file"),
    }
}

#[async_trait]
impl DownloadEngine for HttpDownloadEngine {
    async fn enqueue(&self, url: &Url) -> UpdateResult<DownloadId> {
        let id = self.allocate_id()?;
        let dest = self.inner.dir.join(format!("{}_{}", id, file_name_for(url)));

        // Registered before spawning so a fast job always finds its entry.
        let mut jobs = self.inner.jobs.lock();
        let task = tokio::spawn(run_job(self.inner.clone(), id, url.clone(), dest.clone()));
        jobs.insert(
            id,
            Job {
                status: JobStatus::Running,
                path: dest,
                task: Some(task),
            },
        );
        drop(jobs);

        debug!(download_id = %id, url = %url, "Download enqueued");
        Ok(id)
    }

    async fn status(&self, id: DownloadId) -> UpdateResult<JobStatus> {
        Ok(self
            .inner
            .jobs
            .lock()
            .get(&id)
            .map(|job| job.status.clone())
            .unwrap_or_else(|| JobStatus::Failed {
                reason: format!("unknown download {id}"),
            }))
    }

    async fn remove(&self, id: DownloadId) {
        let job = self.inner.jobs.lock().remove(&id);
        let Some(job) = job else {
            // Started by an earlier process; only its file is left.
            for path in leftover_files(&self.inner.dir, id).await {
                delete_file(id, &path).await;
            }
            return;
        };
        if let Some(task) = job.task {
            task.abort();
        }
        delete_file(id, &job.path).await;
    }
}
