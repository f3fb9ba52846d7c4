//! Latest-release client for the distribution API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::UpdateConfig;
use crate::error::{UpdateError, UpdateResult};
use crate::release::ReleaseDetails;

/// Check latest release API path.
pub const CHECK_UPDATE_PATH: &str = "/sdk/apps/{app}/releases/latest";

/// Header carrying the update token.
pub const HEADER_API_TOKEN: &str = "x-api-token";

/// User-Agent string for HTTP requests.
pub const USER_AGENT: &str = concat!("appdist-update/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches the latest release for one application.
///
/// The workflow keeps at most one check outstanding and discards results of
/// checks it has since abandoned; implementations need not guard against
/// overlapping calls themselves.
#[async_trait]
pub trait ReleaseChecker: Send + Sync {
    async fn check_latest(&self, update_token: &str) -> UpdateResult<ReleaseDetails>;
}

/// [`ReleaseChecker`] calling `GET <api>/sdk/apps/{app}/releases/latest`.
#[derive(Clone)]
pub struct HttpReleaseChecker {
    client: Client,
    api_url: String,
    app_secret: String,
}

impl HttpReleaseChecker {
    /// Create a checker for the API and application in `config`.
    pub fn new(config: &UpdateConfig) -> UpdateResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(
            client,
            config.api_url.clone(),
            config.app_secret.clone(),
        ))
    }

    /// Create a checker reusing an existing client.
    pub fn with_client(client: Client, api_url: String, app_secret: String) -> Self {
        Self {
            client,
            api_url,
            app_secret,
        }
    }

    fn latest_url(&self) -> String {
        let path = CHECK_UPDATE_PATH.replace("{app}", &urlencoding::encode(&self.app_secret));
        format!("{}{}", self.api_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl ReleaseChecker for HttpReleaseChecker {
    async fn check_latest(&self, update_token: &str) -> UpdateResult<ReleaseDetails> {
        let url = self.latest_url();
        debug!(%url, "Get latest release details");

        let response = self
            .client
            .get(&url)
            .header(HEADER_API_TOKEN, update_token)
            .send()
            .await
            .map_err(|e| UpdateError::ConnectionFailed {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(UpdateError::ServerError {
                status: status.as_u16(),
                message,
            });
        }

        let payload = response.text().await?;
        ReleaseDetails::parse(&payload)
    }
}
