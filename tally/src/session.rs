//! Cookie-carried session management.
//!
//! There is no server-side session table: the cookie payload itself is the
//! record. The payload is JSON, authenticated with HMAC-SHA256 under the
//! configured secret key and hex-encoded as `payload.mac`. Each request
//! deserializes its own copy; nothing is shared between requests.
//!
//! `read` fails soft: a missing, malformed, tampered, expired, or
//! half-populated cookie all come back as [`Session::Anonymous`]. Callers
//! cannot distinguish a forged cookie from an absent one, so the response
//! never leaks which it was.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::{SecretKey, SessionConfig};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "_auth_session";

type HmacSha256 = Hmac<Sha256>;

/// The session state resolved from a request's cookies.
#[derive(Debug, Clone, PartialEq)]
pub enum Session {
    /// No valid session. Covers absent, malformed, tampered, expired, and
    /// half-populated cookies alike.
    Anonymous,
    /// A valid session carrying both the user identifier and the backend
    /// credential.
    Authenticated(SessionRecord),
}

impl Session {
    /// Whether this session is anonymous.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Session::Anonymous)
    }
}

/// The data carried by a valid session cookie.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "userId", default)]
    user_id: String,
    #[serde(rename = "authToken", default)]
    auth_token: String,
    #[serde(
        rename = "toastMessage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    toast_message: Option<String>,
    #[serde(rename = "expiresAt")]
    expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// The identifier of the user this session belongs to.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The bearer credential for backend calls.
    #[must_use]
    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    /// When this session expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Attaches a one-time message to the session. The message survives until
    /// the next [`SessionRecord::take_toast`] and must then be re-committed
    /// without it.
    pub fn set_toast<T: Into<String>>(&mut self, message: T) {
        self.toast_message = Some(message.into());
    }

    /// Takes the one-time message out of the record, if any. The caller is
    /// responsible for committing the record afterwards so the message is
    /// not served twice.
    pub fn take_toast(&mut self) -> Option<String> {
        self.toast_message.take()
    }
}

impl std::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("user_id", &self.user_id)
            .field("auth_token", &"**********")
            .field("toast_message", &self.toast_message)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A `Set-Cookie` header value produced by the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie(String);

impl SetCookie {
    /// Returns the header value as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<SetCookie> for String {
    fn from(value: SetCookie) -> Self {
        value.0
    }
}

impl std::fmt::Display for SetCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Creates, reads, and destroys session cookies.
#[derive(Debug, Clone)]
pub struct SessionStore {
    secret: SecretKey,
    ttl: Duration,
    cookie_secure: bool,
}

impl SessionStore {
    /// Creates a store from the session configuration.
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            secret: config.secret_key.clone(),
            ttl: config.ttl,
            cookie_secure: config.cookie_secure,
        }
    }

    /// Creates a fresh session for a user and returns the cookie committing
    /// it. Both identity fields are set atomically; any session previously
    /// carried by the browser is superseded by this cookie.
    #[must_use]
    pub fn create(&self, user_id: &str, auth_token: &str) -> SetCookie {
        let record = SessionRecord {
            user_id: user_id.to_owned(),
            auth_token: auth_token.to_owned(),
            toast_message: None,
            expires_at: Utc::now()
                + chrono::Duration::seconds(i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX)),
        };
        self.commit(&record)
    }

    /// Serializes and signs a record into a `Set-Cookie` value, preserving
    /// the record's remaining lifetime.
    #[must_use]
    pub fn commit(&self, record: &SessionRecord) -> SetCookie {
        let payload =
            serde_json::to_vec(record).expect("session record serialization cannot fail");
        let tag = self.sign(&payload);
        let value = format!("{}.{}", hex::encode(&payload), hex::encode(tag));

        let max_age = (record.expires_at - Utc::now()).num_seconds().max(0);
        SetCookie(self.cookie(&value, max_age))
    }

    /// Resolves the session carried by a `Cookie` header.
    ///
    /// Never errors; every failure mode resolves to [`Session::Anonymous`].
    #[must_use]
    pub fn read(&self, cookie_header: Option<&str>) -> Session {
        let Some(value) = cookie_header.and_then(find_session_cookie) else {
            return Session::Anonymous;
        };
        let Some((payload_hex, tag_hex)) = value.split_once('.') else {
            return Session::Anonymous;
        };
        let (Ok(payload), Ok(tag)) = (hex::decode(payload_hex), hex::decode(tag_hex)) else {
            return Session::Anonymous;
        };

        let expected = self.sign(&payload);
        if !bool::from(expected.as_slice().ct_eq(&tag)) {
            return Session::Anonymous;
        }

        let Ok(record) = serde_json::from_slice::<SessionRecord>(&payload) else {
            return Session::Anonymous;
        };
        if record.expires_at <= Utc::now() {
            return Session::Anonymous;
        }
        // A record with exactly one of the two identity fields must never be
        // partially trusted.
        if record.user_id.is_empty() || record.auth_token.is_empty() {
            return Session::Anonymous;
        }

        Session::Authenticated(record)
    }

    /// Returns the cookie that clears the session. Idempotent; safe to emit
    /// for an already-anonymous session.
    #[must_use]
    pub fn destroy(&self) -> SetCookie {
        SetCookie(self.cookie("", 0))
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }

    fn cookie(&self, value: &str, max_age: i64) -> String {
        let mut cookie =
            format!("{SESSION_COOKIE}={value}; Max-Age={max_age}; Path=/; HttpOnly; SameSite=Lax");
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

fn find_session_cookie(header: &str) -> Option<&str> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then_some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(&SessionConfig {
            secret_key: SecretKey::from("test-secret"),
            ttl: Duration::from_secs(3600),
            cookie_secure: true,
        })
    }

    fn cookie_header(set_cookie: &SetCookie) -> String {
        set_cookie.as_str().split(';').next().unwrap().to_owned()
    }

    #[test]
    fn create_then_read_roundtrips() {
        let store = store();
        let cookie = store.create("42", "token-abc");
        let session = store.read(Some(&cookie_header(&cookie)));

        let Session::Authenticated(record) = session else {
            panic!("expected an authenticated session");
        };
        assert_eq!(record.user_id(), "42");
        assert_eq!(record.auth_token(), "token-abc");
    }

    #[test]
    fn cookie_carries_required_attributes() {
        let store = store();
        let cookie = store.create("42", "token-abc");
        let value = cookie.as_str();
        assert!(value.starts_with("_auth_session="));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Path=/"));
        assert!(value.contains("Secure"));
    }

    #[test]
    fn missing_cookie_is_anonymous() {
        assert!(store().read(None).is_anonymous());
        assert!(store().read(Some("other=1")).is_anonymous());
    }

    #[test]
    fn garbage_cookie_is_anonymous() {
        let store = store();
        for garbage in ["_auth_session=", "_auth_session=xyz", "_auth_session=ab.cd"] {
            assert!(store.read(Some(garbage)).is_anonymous(), "{garbage}");
        }
    }

    #[test]
    fn tampered_payload_is_anonymous() {
        let store = store();
        let cookie = cookie_header(&store.create("42", "token-abc"));
        let (name, value) = cookie.split_once('=').unwrap();
        let mut chars: Vec<char> = value.chars().collect();
        // Flip a nibble inside the hex payload.
        chars[2] = if chars[2] == '0' { '1' } else { '0' };
        let tampered: String = chars.into_iter().collect();
        assert!(store.read(Some(&format!("{name}={tampered}"))).is_anonymous());
    }

    #[test]
    fn wrong_key_is_anonymous() {
        let cookie = cookie_header(&store().create("42", "token-abc"));
        let other = SessionStore::new(&SessionConfig {
            secret_key: SecretKey::from("another-secret"),
            ttl: Duration::from_secs(3600),
            cookie_secure: true,
        });
        assert!(other.read(Some(&cookie)).is_anonymous());
    }

    #[test]
    fn expired_session_is_anonymous() {
        let store = SessionStore::new(&SessionConfig {
            secret_key: SecretKey::from("test-secret"),
            ttl: Duration::from_secs(0),
            cookie_secure: true,
        });
        let cookie = cookie_header(&store.create("42", "token-abc"));
        assert!(store.read(Some(&cookie)).is_anonymous());
    }

    #[test]
    fn half_populated_record_is_anonymous() {
        let store = store();
        for (user_id, token) in [("", "token-abc"), ("42", "")] {
            let cookie = cookie_header(&store.create(user_id, token));
            assert!(store.read(Some(&cookie)).is_anonymous());
        }
    }

    #[test]
    fn destroy_then_read_is_anonymous() {
        let store = store();
        let _session = store.create("42", "token-abc");
        let cleared = store.destroy();
        assert!(cleared.as_str().contains("Max-Age=0"));
        assert!(store.read(Some(&cookie_header(&cleared))).is_anonymous());
    }

    #[test]
    fn toast_is_returned_exactly_once() {
        let store = store();
        let cookie = cookie_header(&store.create("42", "token-abc"));
        let Session::Authenticated(mut record) = store.read(Some(&cookie)) else {
            panic!("expected an authenticated session");
        };

        record.set_toast("Something went wrong. Please, try again later.");
        let cookie = cookie_header(&store.commit(&record));

        let Session::Authenticated(mut record) = store.read(Some(&cookie)) else {
            panic!("expected an authenticated session");
        };
        assert_eq!(
            record.take_toast().as_deref(),
            Some("Something went wrong. Please, try again later.")
        );
        assert_eq!(record.take_toast(), None);

        // Re-committing after the take omits the toast from later reads.
        let cookie = cookie_header(&store.commit(&record));
        let Session::Authenticated(mut record) = store.read(Some(&cookie)) else {
            panic!("expected an authenticated session");
        };
        assert_eq!(record.take_toast(), None);
    }

    #[test]
    fn commit_preserves_remaining_lifetime() {
        let store = store();
        let cookie = cookie_header(&store.create("42", "token-abc"));
        let Session::Authenticated(record) = store.read(Some(&cookie)) else {
            panic!("expected an authenticated session");
        };
        let committed = store.commit(&record);
        // Max-Age reflects the original expiry, not a fresh TTL window.
        let max_age: i64 = committed
            .as_str()
            .split("Max-Age=")
            .nth(1)
            .and_then(|rest| rest.split(';').next())
            .unwrap()
            .parse()
            .unwrap();
        assert!(max_age <= 3600);
        assert!(max_age > 3590);
    }
}
