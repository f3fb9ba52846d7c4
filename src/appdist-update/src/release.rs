//! Release details returned by the latest-release endpoint.

use serde::Deserialize;
use url::Url;

use crate::error::{UpdateError, UpdateResult};

/// Latest release published for the application. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDetails {
    /// Server-side release identifier.
    pub id: i64,
    /// Monotonic build number.
    pub version: i64,
    /// Human readable version, if published.
    pub short_version: Option<String>,
    /// Content hash distinguishing rebuilds sharing a version number.
    pub fingerprint: String,
    /// Absolute URL of the release package.
    pub download_url: Url,
    /// Release notes, `None` when absent or blank.
    pub release_notes: Option<String>,
    /// Minimum platform level required by the package.
    pub min_api_level: Option<i64>,
}

#[derive(Deserialize)]
struct RawRelease {
    #[serde(default)]
    id: i64,
    version: i64,
    #[serde(default)]
    short_version: Option<String>,
    fingerprint: String,
    download_url: String,
    #[serde(default)]
    release_notes: Option<String>,
    #[serde(default)]
    min_api_level: Option<i64>,
}

impl ReleaseDetails {
    /// Parse the JSON payload of the latest-release endpoint.
    pub fn parse(payload: &str) -> UpdateResult<Self> {
        let raw: RawRelease =
            serde_json::from_str(payload).map_err(|e| UpdateError::InvalidRelease {
                message: e.to_string(),
            })?;

        if raw.fingerprint.trim().is_empty() {
            return Err(UpdateError::InvalidRelease {
                message: "empty fingerprint".to_string(),
            });
        }

        let download_url =
            Url::parse(&raw.download_url).map_err(|e| UpdateError::InvalidRelease {
                message: format!("download_url {:?}: {e}", raw.download_url),
            })?;
        if !matches!(download_url.scheme(), "http" | "https") {
            return Err(UpdateError::InvalidRelease {
                message: format!("download_url must use http or https: {download_url}"),
            });
        }

        Ok(Self {
            id: raw.id,
            version: raw.version,
            short_version: raw.short_version.filter(|v| !v.trim().is_empty()),
            fingerprint: raw.fingerprint,
            download_url,
            release_notes: raw.release_notes.filter(|n| !n.trim().is_empty()),
            min_api_level: raw.min_api_level,
        })
    }

    /// Label used in prompts and logs: the short version when known.
    pub fn display_version(&self) -> String {
        match &self.short_version {
            Some(short) => format!("{short} ({})", self.version),
            None => self.version.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_payload() {
        let release = ReleaseDetails::parse(
            r#"{
                "id": 42,
                "version": 7,
                "short_version": "1.3.0",
                "release_notes": "Bug fixes",
                "download_url": "https://cdn.example.com/app-7.pkg",
                "fingerprint": "deadbeef",
                "min_api_level": 21,
                "extra": true
            }"#,
        )
        .unwrap();

        assert_eq!(release.id, 42);
        assert_eq!(release.version, 7);
        assert_eq!(release.short_version.as_deref(), Some("1.3.0"));
        assert_eq!(release.release_notes.as_deref(), Some("Bug fixes"));
        assert_eq!(release.download_url.as_str(), "https://cdn.example.com/app-7.pkg");
        assert_eq!(release.fingerprint, "deadbeef");
        assert_eq!(release.min_api_level, Some(21));
        assert_eq!(release.display_version(), "1.3.0 (7)");
    }

    #[test]
    fn test_blank_notes_are_none() {
        let release = ReleaseDetails::parse(
            r#"{"version": 1, "fingerprint": "a", "download_url": "https://x.test/a", "release_notes": "  "}"#,
        )
        .unwrap();
        assert_eq!(release.release_notes, None);
        assert_eq!(release.display_version(), "1");
    }

    #[test]
    fn test_rejects_bad_payloads() {
        for payload in [
            "not json",
            r#"{"fingerprint": "a", "download_url": "https://x.test/a"}"#,
            r#"{"version": 1, "fingerprint": "", "download_url": "https://x.test/a"}"#,
            r#"{"version": 1, "fingerprint": "a", "download_url": "relative/path"}"#,
            r#"{"version": 1, "fingerprint": "a", "download_url": "file:///etc/passwd"}"#,
        ] {
            let err = ReleaseDetails::parse(payload).unwrap_err();
            assert!(
                matches!(err, UpdateError::InvalidRelease { .. }),
                "payload {payload} gave {err:?}"
            );
        }
    }
}
