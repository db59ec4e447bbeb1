//! The authentication gate.
//!
//! Protected handlers call [`require_user`] first and bubble the result with
//! `?`. When the session does not resolve to a full identity, the returned
//! error is a redirect to `/login` carrying a session-clearing cookie and the
//! originally requested path, so the user comes back after logging in. This
//! is control flow, not a fault; the error page layer never sees it.

use http::{HeaderMap, header};

use crate::client::AccessToken;
use crate::error::Error;
use crate::session::{Session, SessionRecord, SessionStore};

/// Default destination after login when no return path was captured.
pub const DEFAULT_AFTER_LOGIN: &str = "/dashboard";

/// A fully-resolved identity: both the user identifier and the backend
/// credential are guaranteed present.
#[derive(Debug, Clone)]
pub struct Identity {
    record: SessionRecord,
}

impl Identity {
    /// The identifier of the authenticated user.
    #[must_use]
    pub fn user_id(&self) -> &str {
        self.record.user_id()
    }

    /// The bearer credential for backend calls, scoped to this request.
    #[must_use]
    pub fn token(&self) -> AccessToken<'_> {
        AccessToken::new(self.record.auth_token())
    }

    /// The underlying session record, e.g. for flash-message handling.
    pub fn record_mut(&mut self) -> &mut SessionRecord {
        &mut self.record
    }
}

/// Resolves the caller's identity or signals a redirect to the login page.
///
/// On an anonymous session (including tampered, expired, and half-populated
/// cookies, which the store already collapses into anonymous) the session is
/// destroyed and the original path is preserved in the `next` query
/// parameter.
///
/// # Errors
///
/// Returns a redirect-to-login [`Error`]; callers must treat it as a
/// control-flow exit, not a recoverable fault.
pub fn require_user(
    store: &SessionStore,
    headers: &HeaderMap,
    original_path: &str,
) -> Result<Identity, Error> {
    match optional_user(store, headers) {
        Some(identity) => Ok(identity),
        None => Err(redirect_to_login(store, original_path)),
    }
}

/// Resolves the caller's identity, tolerating anonymous access.
///
/// Used by public pages that render differently for logged-in users, and by
/// the login page itself to bounce already-authenticated visitors.
#[must_use]
pub fn optional_user(store: &SessionStore, headers: &HeaderMap) -> Option<Identity> {
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok());
    match store.read(cookie_header) {
        Session::Authenticated(record) => Some(Identity { record }),
        Session::Anonymous => None,
    }
}

fn redirect_to_login(store: &SessionStore, original_path: &str) -> Error {
    Error::see_other_with_cookies(
        login_location(original_path),
        vec![store.destroy().into()],
    )
}

/// Builds the login URL preserving the originally requested path.
#[must_use]
pub fn login_location(original_path: &str) -> String {
    let next: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", original_path)
        .finish();
    format!("/login?{next}")
}

/// Validates a post-login return path taken from the `next` parameter.
///
/// Only same-site absolute paths are accepted; anything else (external URLs,
/// protocol-relative `//host` tricks) falls back to the dashboard so the
/// login page cannot be used as an open redirect.
#[must_use]
pub fn sanitize_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => DEFAULT_AFTER_LOGIN,
    }
}
