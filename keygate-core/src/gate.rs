//! Helpers for tools that gate their forms on key availability.
//!
//! Deciding that a downstream failure means "bad key" stays with the tool.
//! [`is_auth_failure`] covers the shapes the hosted AI providers produce, and
//! [`KeyGate::guard`] forwards such failures to
//! [`invalidate`](KeyLifecycleController::invalidate).

use crate::availability::KeyAvailability;
use crate::controller::KeyLifecycleController;
use crate::key_store::KeyStore;

/// Message some providers return instead of 401/403 when the key is invalid.
const ENTITY_NOT_FOUND: &str = "Requested entity was not found.";

/// User-facing message to show when a call was rejected for its key.
pub const INVALID_KEY_MESSAGE: &str =
    "API Key not found or invalid. Please select a valid API key.";

/// What a tool should show in place of (or as) its form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateView {
    /// Availability not known yet; show a loading indicator.
    Checking,

    /// No usable key; show the key prompt.
    KeyRequired,

    /// Show the tool.
    Ready,
}

impl From<KeyAvailability> for GateView {
    fn from(availability: KeyAvailability) -> Self {
        match availability {
            KeyAvailability::Unknown => Self::Checking,
            KeyAvailability::Available => Self::Ready,
            KeyAvailability::Unavailable => Self::KeyRequired,
        }
    }
}

/// Whether a downstream failure indicates an unusable key.
///
/// True for HTTP 401 and 403, and for the "entity not found" message used by
/// some providers as a proxy for an invalid key.
pub fn is_auth_failure(status: Option<u16>, message: &str) -> bool {
    matches!(status, Some(401 | 403)) || message.contains(ENTITY_NOT_FOUND)
}

/// A tool's view of a shared controller.
#[derive(Debug)]
pub struct KeyGate<'a, K> {
    controller: &'a KeyLifecycleController<K>,
}

impl<'a, K: KeyStore> KeyGate<'a, K> {
    /// Borrow a controller.
    pub fn new(controller: &'a KeyLifecycleController<K>) -> Self {
        Self { controller }
    }

    /// What to show right now.
    pub fn view(&self) -> GateView {
        self.controller.availability().into()
    }

    /// The prompt's "select key" action.
    pub async fn select_key(&self) -> GateView {
        self.controller.select_key().await.into()
    }

    /// Pass a downstream result through, invalidating the key when the
    /// error is an auth failure.
    ///
    /// `status_of` extracts the HTTP status from the tool's own error type,
    /// if it has one. The error's `Display` text is checked for the
    /// provider-specific message.
    pub fn guard<T, E>(
        &self,
        result: Result<T, E>,
        status_of: impl FnOnce(&E) -> Option<u16>,
    ) -> Result<T, E>
    where
        E: std::fmt::Display,
    {
        if let Err(e) = &result {
            if is_auth_failure(status_of(e), &e.to_string()) {
                tracing::info!("Downstream call rejected the API key: {}", e);
                self.controller.invalidate();
            }
        }
        result
    }
}
