//! Login redirect construction.

use url::Url;
use uuid::Uuid;

use crate::constants::{
    LOGIN_PAGE_PATH, PARAM_PLATFORM, PARAM_REDIRECT_ID, PARAM_RELEASE_HASH, PARAM_REQUEST_ID,
};
use crate::error::{HandoffError, Result};

/// Generate a fresh, unguessable request identifier.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Everything needed to send the user to the login page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    /// Application secret identifying the app on the service.
    pub app_secret: String,
    /// Fingerprint of the installed release.
    pub release_hash: String,
    /// Identifier the browser redirects back to (the package name).
    pub redirect_id: String,
    /// Request identifier persisted before opening the page.
    pub request_id: String,
    /// Platform name reported to the service.
    pub platform: String,
}

impl LoginRequest {
    /// Build the redirect target under `login_base`.
    ///
    /// The result has the form
    /// `<base>/apps/{app}/update-setup/?release_hash=..&redirect_id=..&request_id=..&platform=..`.
    pub fn redirect_url(&self, login_base: &str) -> Result<Url> {
        let base = Url::parse(login_base)
            .map_err(|e| HandoffError::InvalidBaseUrl(format!("{login_base}: {e}")))?;
        match base.scheme() {
            "http" | "https" => {}
            other => return Err(HandoffError::UnsupportedScheme(other.to_string())),
        }

        let page = LOGIN_PAGE_PATH.replace("{app}", &urlencoding::encode(&self.app_secret));
        let target = format!("{}{}", base.as_str().trim_end_matches('/'), page);
        let mut url =
            Url::parse(&target).map_err(|e| HandoffError::InvalidBaseUrl(e.to_string()))?;

        url.query_pairs_mut()
            .append_pair(PARAM_RELEASE_HASH, &self.release_hash)
            .append_pair(PARAM_REDIRECT_ID, &self.redirect_id)
            .append_pair(PARAM_REQUEST_ID, &self.request_id)
            .append_pair(PARAM_PLATFORM, &self.platform);

        Ok(url)
    }
}
