//! Callback payload delivered when the browser hands control back.

use std::fmt;

use tracing::debug;
use url::Url;

use crate::constants::{PARAM_REQUEST_ID, PARAM_UPDATE_TOKEN};
use crate::error::{HandoffError, Result};

/// Token and request id returned by the login page.
///
/// Both fields are required; a payload missing either is ignored by the
/// caller.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationCallback {
    pub update_token: String,
    pub request_id: String,
}

impl fmt::Debug for AuthorizationCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationCallback")
            .field("update_token", &"<redacted>")
            .field("request_id", &self.request_id)
            .finish()
    }
}

impl AuthorizationCallback {
    pub fn new(update_token: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            update_token: update_token.into(),
            request_id: request_id.into(),
        }
    }

    /// Extract the payload from decoded key/value pairs.
    pub fn from_pairs<K, V, I>(pairs: I) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut update_token = None;
        let mut request_id = None;
        for (key, value) in pairs {
            let value = value.as_ref();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                PARAM_UPDATE_TOKEN => update_token = Some(value.to_string()),
                PARAM_REQUEST_ID => request_id = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(Self {
            update_token: update_token.ok_or(HandoffError::MissingParameter(PARAM_UPDATE_TOKEN))?,
            request_id: request_id.ok_or(HandoffError::MissingParameter(PARAM_REQUEST_ID))?,
        })
    }

    /// Parse a raw query string such as `update_token=..&request_id=..`.
    pub fn from_query(query: &str) -> Result<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()))
    }

    /// Parse either a full deep link (`scheme://host/path?...`) or a bare query string.
    pub fn parse(input: &str) -> Result<Self> {
        let parsed = match Url::parse(input) {
            Ok(url) => Self::from_pairs(url.query_pairs()),
            Err(_) => Self::from_query(input),
        };
        match &parsed {
            Ok(callback) => debug!(request_id = %callback.request_id, "Parsed login callback"),
            Err(e) => debug!(error = %e, "Rejected login callback"),
        }
        parsed
    }

    /// Check the returned request id against the one persisted when the
    /// login page was opened.
    pub fn validate(&self, expected: Option<&str>) -> Result<()> {
        let expected = expected.ok_or(HandoffError::NoPendingRequest)?;
        if constant_time_compare(expected, &self.request_id) {
            Ok(())
        } else {
            debug!(expected, received = %self.request_id, "Login callback request id mismatch");
            Err(HandoffError::RequestIdMismatch)
        }
    }
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
