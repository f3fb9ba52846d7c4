//! Constants for the appdist-login module.

/// Default base URL opened in the browser to log in.
pub const DEFAULT_LOGIN_URL: &str = "https://install.appdist.dev";

/// Login page path. The trailing slash avoids a redirect that drops the query string.
pub const LOGIN_PAGE_PATH: &str = "/apps/{app}/update-setup/";

/// Platform reported to the login page.
pub const DEFAULT_PLATFORM: &str = "Rust";

/// Query parameter carrying the installed release hash.
pub const PARAM_RELEASE_HASH: &str = "release_hash";

/// Query parameter carrying the identifier the browser redirects back to.
pub const PARAM_REDIRECT_ID: &str = "redirect_id";

/// Query parameter carrying the request identifier, both ways.
pub const PARAM_REQUEST_ID: &str = "request_id";

/// Query parameter carrying the platform name.
pub const PARAM_PLATFORM: &str = "platform";

/// Callback parameter carrying the update token.
pub const PARAM_UPDATE_TOKEN: &str = "update_token";
