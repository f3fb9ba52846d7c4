//! Appdist Login - browser login handoff for the update service.
//!
//! The update service has no credentials of its own. When no update token is
//! cached it sends the user to a login page in the browser; the page redirects
//! back to the application with an `update_token` and the `request_id` the
//! application generated when it opened the page.
//!
//! This crate owns the pieces of that handoff that do not depend on workflow
//! state:
//! - generating unguessable request identifiers
//! - building the login redirect target
//! - parsing the callback payload from a deep link or query string
//! - validating the returned request id against the persisted one

pub mod callback;
pub mod constants;
mod error;
pub mod request;

pub use callback::AuthorizationCallback;
pub use constants::{
    DEFAULT_LOGIN_URL, DEFAULT_PLATFORM, LOGIN_PAGE_PATH, PARAM_PLATFORM, PARAM_REDIRECT_ID,
    PARAM_RELEASE_HASH, PARAM_REQUEST_ID, PARAM_UPDATE_TOKEN,
};
pub use error::{HandoffError, Result};
pub use request::{LoginRequest, generate_request_id};
