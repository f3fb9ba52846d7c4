//! Typed view over the persisted workflow entries.
//!
//! The on-disk encoding keeps a string-keyed layout:
//!
//! | key | type | meaning |
//! |---|---|---|
//! | `update_token` | string | cached authorization token |
//! | `request_id` | string | pending login request id |
//! | `download_id` | integer | tracked download job, absent or 0 means none |
//! | `download_uri` | string | `""` in flight, absent none, otherwise ready artifact |
//!
//! The workflow only sees [`DownloadMarker`]; the tri-state string stays at
//! this boundary. Storage failures are logged and read as "absent".

use std::sync::Arc;

use appdist_storage::KeyValueStore;
use tracing::warn;

use crate::download::{ArtifactRef, DownloadId};

pub const KEY_UPDATE_TOKEN: &str = "update_token";
pub const KEY_REQUEST_ID: &str = "request_id";
pub const KEY_DOWNLOAD_ID: &str = "download_id";
pub const KEY_DOWNLOAD_URI: &str = "download_uri";

/// Persisted download progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadMarker {
    /// No download tracked for this cycle.
    NoDownload,
    /// A download job is running.
    InFlight,
    /// The package is downloaded at this location, waiting to be installed.
    ReadyAt(String),
}

/// Accessors for the workflow's persisted entries.
#[derive(Clone)]
pub struct PersistedState {
    store: Arc<dyn KeyValueStore>,
}

impl PersistedState {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn update_token(&self) -> Option<String> {
        self.read_string(KEY_UPDATE_TOKEN)
    }

    pub fn set_update_token(&self, token: &str) {
        self.write_string(KEY_UPDATE_TOKEN, token);
    }

    pub fn clear_update_token(&self) {
        self.remove(KEY_UPDATE_TOKEN);
    }

    pub fn request_id(&self) -> Option<String> {
        self.read_string(KEY_REQUEST_ID)
    }

    pub fn set_request_id(&self, request_id: &str) {
        self.write_string(KEY_REQUEST_ID, request_id);
    }

    pub fn clear_request_id(&self) {
        self.remove(KEY_REQUEST_ID);
    }

    pub fn download_id(&self) -> Option<DownloadId> {
        match self.store.get_i64(KEY_DOWNLOAD_ID) {
            Ok(value) => value.and_then(|raw| u64::try_from(raw).ok()).and_then(DownloadId::new),
            Err(e) => {
                warn!(key = KEY_DOWNLOAD_ID, error = %e, "Ignoring unreadable download id");
                None
            }
        }
    }

    pub fn set_download_id(&self, id: DownloadId) {
        let Ok(raw) = i64::try_from(id.get()) else {
            warn!(download_id = %id, "Download id does not fit the persisted format");
            return;
        };
        if let Err(e) = self.store.put_i64(KEY_DOWNLOAD_ID, raw) {
            warn!(key = KEY_DOWNLOAD_ID, error = %e, "Failed to persist download id");
        }
    }

    pub fn clear_download_id(&self) {
        self.remove(KEY_DOWNLOAD_ID);
    }

    pub fn download_marker(&self) -> DownloadMarker {
        match self.read_string(KEY_DOWNLOAD_URI) {
            None => DownloadMarker::NoDownload,
            Some(location) if location.is_empty() => DownloadMarker::InFlight,
            Some(location) => DownloadMarker::ReadyAt(location),
        }
    }

    pub fn mark_download_in_flight(&self) {
        self.write_string(KEY_DOWNLOAD_URI, "");
    }

    pub fn mark_download_ready(&self, artifact: &ArtifactRef) {
        self.write_string(KEY_DOWNLOAD_URI, artifact.as_str());
    }

    pub fn clear_download_marker(&self) {
        self.remove(KEY_DOWNLOAD_URI);
    }

    fn read_string(&self, key: &'static str) -> Option<String> {
        self.store.get_string(key).unwrap_or_else(|e| {
            warn!(key, error = %e, "Ignoring unreadable persisted entry");
            None
        })
    }

    fn write_string(&self, key: &'static str, value: &str) {
        if let Err(e) = self.store.put_string(key, value) {
            warn!(key, error = %e, "Failed to persist entry");
        }
    }

    fn remove(&self, key: &'static str) {
        if let Err(e) = self.store.remove(key) {
            warn!(key, error = %e, "Failed to remove persisted entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appdist_storage::MemoryStore;

    fn state() -> (Arc<MemoryStore>, PersistedState) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), PersistedState::new(store))
    }

    #[test]
    fn test_download_marker_encoding() {
        let (store, state) = state();
        assert_eq!(state.download_marker(), DownloadMarker::NoDownload);

        state.mark_download_in_flight();
        assert_eq!(store.get_string(KEY_DOWNLOAD_URI).unwrap().as_deref(), Some(""));
        assert_eq!(state.download_marker(), DownloadMarker::InFlight);

        let artifact = ArtifactRef::parse("file:///tmp/app.pkg").unwrap();
        state.mark_download_ready(&artifact);
        assert_eq!(
            state.download_marker(),
            DownloadMarker::ReadyAt("file:///tmp/app.pkg".to_string())
        );

        state.clear_download_marker();
        assert_eq!(state.download_marker(), DownloadMarker::NoDownload);
    }

    #[test]
    fn test_download_id_zero_means_none() {
        let (store, state) = state();
        store.put_i64(KEY_DOWNLOAD_ID, 0).unwrap();
        assert_eq!(state.download_id(), None);

        store.put_i64(KEY_DOWNLOAD_ID, -4).unwrap();
        assert_eq!(state.download_id(), None);

        let id = DownloadId::new(17).unwrap();
        state.set_download_id(id);
        assert_eq!(state.download_id(), Some(id));
    }

    #[test]
    fn test_wrong_type_reads_as_absent() {
        let (store, state) = state();
        store.put_string(KEY_DOWNLOAD_ID, "seventeen").unwrap();
        store.put_i64(KEY_UPDATE_TOKEN, 5).unwrap();
        assert_eq!(state.download_id(), None);
        assert_eq!(state.update_token(), None);
    }
}
