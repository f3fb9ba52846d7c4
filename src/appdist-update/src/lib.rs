//! Appdist Update - restart-resilient update workflow.
//!
//! Checks the distribution service for a newer release of the running
//! application and walks it to installation:
//! - browser login handoff when no update token is cached
//! - latest-release check with version and fingerprint comparison
//! - user decision, download job, install or deferred notification
//!
//! Progress is persisted through an [`appdist_storage::KeyValueStore`] so a
//! new process picks up where the previous one stopped. Results of
//! operations the workflow has since abandoned are recognized by their
//! [`CallToken`] or download id and dropped.
//!
//! # Example
//!
//! ```rust,ignore
//! use appdist_update::{Collaborators, HttpReleaseChecker, UpdateConfig, UpdateController};
//!
//! let config = UpdateConfig::load().with_env_overrides();
//! let controller = UpdateController::new(config.clone(), Collaborators {
//!     store,
//!     checker: Arc::new(HttpReleaseChecker::new(&config)?),
//!     engine,
//!     host,
//! })?;
//!
//! controller.start();
//! controller.enter_foreground();
//! ```

mod checker;
mod config;
mod controller;
mod download;
mod engine;
mod error;
mod host;
mod release;
mod state;
mod token;
mod version;

pub use checker::{CHECK_UPDATE_PATH, HEADER_API_TOKEN, HttpReleaseChecker, ReleaseChecker};
pub use config::{AppIdentity, CONFIG_FILE, DEFAULT_API_URL, UpdateConfig};
pub use controller::{
    Collaborators, DecisionChoice, InstallMode, UpdateController, WorkflowEvent, WorkflowPhase,
    WorkflowSnapshot,
};
pub use download::{
    ArtifactRef, DownloadCoordinator, DownloadEngine, DownloadId, DownloadOutcome, DownloadRecord,
    JobStatus,
};
pub use engine::HttpDownloadEngine;
pub use error::{UpdateError, UpdateResult};
pub use host::{DecisionRequest, UpdateHost};
pub use release::ReleaseDetails;
pub use state::{
    DownloadMarker, KEY_DOWNLOAD_ID, KEY_DOWNLOAD_URI, KEY_REQUEST_ID, KEY_UPDATE_TOKEN,
    PersistedState,
};
pub use token::CallToken;
pub use version::{LocalRelease, is_applicable, release_hash};

/// Storage scope of the workflow's persisted entries.
pub const STATE_SCOPE: &str = "updates";
