//! User-facing session error messages.

use crate::backend::BackendError;

pub const NO_ACTIVE_ACCOUNT: &str = "No account with this phone number and password was found.";
pub const NETWORK_UNAVAILABLE: &str =
    "Could not reach the server. Check your internet connection and try again.";
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again later.";
pub const INVALID_TOKEN: &str = "Invalid token.";
pub const SESSION_EXPIRED: &str = "Your session has expired. Please sign in again.";

/// Detail the backend sends when credentials match no active account.
const NO_ACTIVE_ACCOUNT_DETAIL: &str = "no active account found with the given credentials";

/// Maps a failed credential exchange to a message for the sign-in form.
#[must_use]
pub fn credential_error_message(error: &BackendError) -> String {
    if error.is_network() {
        return NETWORK_UNAVAILABLE.to_string();
    }
    match error.body().and_then(|body| body.detail()) {
        Some(detail) if detail.trim().eq_ignore_ascii_case(NO_ACTIVE_ACCOUNT_DETAIL) => {
            NO_ACTIVE_ACCOUNT.to_string()
        }
        Some(detail) if !detail.trim().is_empty() => detail.to_string(),
        _ => GENERIC_FAILURE.to_string(),
    }
}
