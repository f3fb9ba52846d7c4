//! Installed release identity and update applicability.

use sha2::{Digest, Sha256};

use crate::config::AppIdentity;
use crate::release::ReleaseDetails;

/// Version and fingerprint of the installed application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRelease {
    pub version: i64,
    pub fingerprint: String,
}

impl LocalRelease {
    pub fn new(version: i64, fingerprint: impl Into<String>) -> Self {
        Self {
            version,
            fingerprint: fingerprint.into(),
        }
    }
}

/// Fingerprint of an installed build: `hex(sha256("<package>:<versionName>:<versionCode>"))`.
pub fn release_hash(app: &AppIdentity) -> String {
    let input = format!(
        "{}:{}:{}",
        app.package_name, app.version_name, app.version_code
    );
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// An update applies when the remote version is strictly greater, or equal
/// with a different fingerprint (same version, rebuilt binary).
pub fn is_applicable(local: &LocalRelease, remote: &ReleaseDetails) -> bool {
    if remote.version == local.version {
        return remote.fingerprint != local.fingerprint;
    }
    remote.version > local.version
}
