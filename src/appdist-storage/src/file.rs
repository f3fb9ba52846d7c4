//! JSON-file backed store.

use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, StorageError};
use crate::store::{KeyValueStore, StoredValue};

/// A [`KeyValueStore`] persisted as a single JSON object on disk.
///
/// Entries are cached in memory; every mutation rewrites the file through a
/// temporary sibling that is fsynced and renamed over the original, so a crash
/// leaves either the old or the new contents on disk.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, StoredValue>>,
}

impl FileStore {
    /// Open the store at `path`, creating parent directories as needed.
    ///
    /// A missing file is an empty store. An unreadable or corrupt file is
    /// logged and treated as empty; it is overwritten by the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| StorageError::InvalidPath(path.clone()))?;
        std::fs::create_dir_all(parent)?;

        let entries = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Discarding corrupt state file");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), entries = entries.len(), "State store opened");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate(&self, apply: impl FnOnce(&mut BTreeMap<String, StoredValue>) -> bool) -> Result<()> {
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        if !apply(&mut next) {
            return Ok(());
        }
        write_atomically(&self.path, &next)?;
        *entries = next;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<StoredValue>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: StoredValue) -> Result<()> {
        self.mutate(|entries| entries.insert(key.to_string(), value.clone()) != Some(value))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.mutate(|entries| entries.remove(key).is_some())
    }

    fn clear(&self) -> Result<()> {
        self.mutate(|entries| {
            let changed = !entries.is_empty();
            entries.clear();
            changed
        })
    }
}

fn write_atomically(path: &Path, entries: &BTreeMap<String, StoredValue>) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let file = std::fs::File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, entries)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    std::fs::rename(&tmp, path)?;

    // Persist the directory entry of the rename
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent() {
            if let Ok(dir) = std::fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }
    }

    Ok(())
}
