//! Signed-cookie sessions
//!
//! The whole session lives client side: a JSON object signed with the
//! cookie jar's HMAC and stored in a single cookie. Tampering is detected on
//! load and yields an empty session.

use std::collections::BTreeMap;

use cookie::{Cookie, CookieJar, Key};
use serde_json::Value;
use sha2::{Digest, Sha512};
use thiserror::Error;

use crate::logger;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session secret must not be empty")]
    EmptySecret,
    #[error("invalid session key: {0}")]
    Key(String),
    #[error("session cookie signature mismatch")]
    BadSignature,
    #[error("malformed session payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Per-request session state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    values: BTreeMap<String, Value>,
    modified: bool,
    existed: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    fn loaded(values: BTreeMap<String, Value>) -> Self {
        Self {
            values,
            modified: false,
            existed: true,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
        self.modified = true;
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.values.remove(key);
        if removed.is_some() {
            self.modified = true;
        }
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub const fn is_modified(&self) -> bool {
        self.modified
    }
}

/// Reads and writes the session cookie
pub struct SessionCodec {
    key: Key,
    cookie_name: String,
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec")
            .field("cookie_name", &self.cookie_name)
            .finish_non_exhaustive()
    }
}

impl SessionCodec {
    /// The signing key is the SHA-512 digest of `secret`
    pub fn new(secret: &str, cookie_name: &str) -> Result<Self, SessionError> {
        if secret.is_empty() {
            return Err(SessionError::EmptySecret);
        }
        let digest = Sha512::digest(secret.as_bytes());
        let key = Key::try_from(digest.as_slice()).map_err(|e| SessionError::Key(e.to_string()))?;
        Ok(Self {
            key,
            cookie_name: cookie_name.to_string(),
        })
    }

    /// Verify and decode the session cookie, `None` when the request has none
    pub fn decode(&self, jar: &CookieJar) -> Result<Option<Session>, SessionError> {
        if jar.get(&self.cookie_name).is_none() {
            return Ok(None);
        }
        let cookie = jar
            .signed(&self.key)
            .get(&self.cookie_name)
            .ok_or(SessionError::BadSignature)?;
        let values: BTreeMap<String, Value> = serde_json::from_str(cookie.value())?;
        Ok(Some(Session::loaded(values)))
    }

    /// Like [`decode`](Self::decode), falling back to an empty session
    pub fn load(&self, jar: &CookieJar) -> Session {
        match self.decode(jar) {
            Ok(Some(session)) => session,
            Ok(None) => Session::new(),
            Err(e) => {
                logger::log_warning(&format!("Discarding session cookie: {e}"));
                // an emptied session clears the bad cookie
                Session {
                    existed: true,
                    ..Session::default()
                }
            }
        }
    }

    /// Write a modified session back into `jar`. An emptied session that
    /// came from a cookie is removed.
    pub fn store(&self, session: &Session, jar: &mut CookieJar) -> Result<(), SessionError> {
        if !session.is_modified() {
            return Ok(());
        }
        if session.is_empty() {
            if session.existed {
                jar.remove(Cookie::build(self.cookie_name.clone()).path("/"));
            }
            return Ok(());
        }

        let payload = serde_json::to_string(&session.values)?;
        let cookie = Cookie::build((self.cookie_name.clone(), payload))
            .path("/")
            .http_only(true)
            .build();
        jar.signed_mut(&self.key).add(cookie);
        Ok(())
    }
}

/// `Set-Cookie` header values for every change made to `jar`
pub fn set_cookie_headers(jar: &CookieJar) -> Vec<String> {
    jar.delta().map(|c| c.encoded().to_string()).collect()
}
