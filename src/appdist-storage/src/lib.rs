//! Appdist Storage - durable key/value state for the update service.
//!
//! The update workflow keeps a handful of string-keyed entries that must
//! survive process death (cached token, pending request id, tracked
//! download). This crate provides:
//!
//! - [`KeyValueStore`], the storage seam the workflow is written against
//! - [`FileStore`], a JSON-file backend with crash-safe writes
//! - [`MemoryStore`], an in-process backend for tests and ephemeral hosts
//! - [`AppdistPaths`], OS-aware locations for state and configuration
//!
//! # Usage
//!
//! ```rust,no_run
//! use appdist_storage::{AppdistPaths, FileStore, KeyValueStore};
//!
//! fn main() -> appdist_storage::Result<()> {
//!     let paths = AppdistPaths::new()?;
//!     paths.ensure_dirs()?;
//!
//!     let store = FileStore::open(paths.state_file("updates"))?;
//!     store.put_string("update_token", "secret")?;
//!     assert_eq!(store.get_string("update_token")?.as_deref(), Some("secret"));
//!     Ok(())
//! }
//! ```

pub mod error;
mod file;
mod memory;
pub mod paths;
mod store;

pub use error::{Result, StorageError};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use paths::{AppdistPaths, appdist_config_dir, appdist_data_dir};
pub use store::{KeyValueStore, StoredValue};
