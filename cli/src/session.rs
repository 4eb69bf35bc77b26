//! Session state: the bearer token and an optional cached user object.
//!
//! Storage is behind the [`SessionStore`] trait and injected into the HTTP
//! client, so tests run against [`MemorySessionStore`] and the binary uses the
//! keyring-backed store from [`crate::auth`].

use crate::error::SessionError;
use crate::model::CurrentUser;
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Standard alphabet, padding optional. Token segments are usually unpadded.
const CLAIMS_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Persistent client-side storage for the session.
///
/// Implementations use interior mutability; the store is shared as
/// `Arc<dyn SessionStore>` between the HTTP client and whoever logs in or out.
pub trait SessionStore: Send + Sync {
    fn token(&self) -> Option<String>;
    fn set_token(&self, token: &str) -> Result<(), SessionError>;
    /// Raw JSON of the cached user, if one was stored at login.
    fn cached_user(&self) -> Option<String>;
    fn set_cached_user(&self, user: &str) -> Result<(), SessionError>;
    /// Removes the token and the cached user.
    fn clear(&self) -> Result<(), SessionError>;
}

#[derive(Default)]
struct MemoryState {
    token: Option<String>,
    user: Option<String>,
}

/// Session store that lives only as long as the process.
#[derive(Default)]
pub struct MemorySessionStore {
    state: Mutex<MemoryState>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        let store = Self::default();
        store.state().token = Some(token.to_string());
        store
    }

    // Writes replace whole fields, so a poisoned state is still consistent.
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for MemorySessionStore {
    fn token(&self) -> Option<String> {
        self.state().token.clone()
    }

    fn set_token(&self, token: &str) -> Result<(), SessionError> {
        self.state().token = Some(token.to_string());
        Ok(())
    }

    fn cached_user(&self) -> Option<String> {
        self.state().user.clone()
    }

    fn set_cached_user(&self, user: &str) -> Result<(), SessionError> {
        self.state().user = Some(user.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.state() = MemoryState::default();
        Ok(())
    }
}

/// Decodes the claims (middle) segment of a token without checking its signature.
///
/// Returns `None` when the token has no middle segment, the segment is not
/// base64url, the bytes are not UTF-8, or the text is not JSON.
pub fn decode_claims(token: &str) -> Option<Value> {
    let segment = token.split('.').nth(1)?;
    let standard = segment.replace('-', "+").replace('_', "/");

    let bytes = match CLAIMS_ENGINE.decode(standard.as_bytes()) {
        Ok(b) => b,
        Err(e) => {
            log::warn!("Token claims are not valid base64: {}", e);
            return None;
        }
    };
    let text = match String::from_utf8(bytes) {
        Ok(t) => t,
        Err(e) => {
            log::warn!("Token claims are not valid UTF-8: {}", e);
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(v) => Some(v),
        Err(e) => {
            log::warn!("Token claims are not JSON: {}", e);
            None
        }
    }
}

/// Handle over the session store with the identity helpers layered on top.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn SessionStore>,
}

impl Session {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStore::new()))
    }

    pub fn token(&self) -> Option<String> {
        self.store.token()
    }

    pub fn set_token(&self, token: &str) -> Result<(), SessionError> {
        self.store.set_token(token)
    }

    pub fn cache_user(&self, user: &Value) -> Result<(), SessionError> {
        self.store.set_cached_user(&user.to_string())
    }

    /// Drops the token and any cached user. Requests already in flight keep the
    /// header they were built with.
    pub fn clear(&self) -> Result<(), SessionError> {
        self.store.clear()
    }

    /// The current identity, from the cached user if there is one, else from the
    /// token claims. Never fails; anything undecodable yields `None`.
    pub fn current_user(&self) -> Option<CurrentUser> {
        if let Some(raw) = self.store.cached_user() {
            match serde_json::from_str::<Value>(&raw) {
                Ok(v) => {
                    if let Some(user) = CurrentUser::from_value(v) {
                        return Some(user);
                    }
                }
                Err(e) => log::warn!("Ignoring unreadable cached user: {}", e),
            }
        }

        let token = self.store.token()?;
        CurrentUser::from_value(decode_claims(&token)?)
    }
}
