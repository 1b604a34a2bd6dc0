//! Secret storage for API keys.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for key material that prevents accidental logging
//! - [`SecretStore`] - Trait for secret storage backends
//! - [`MemoryStore`] - In-memory implementation for tests and ephemeral hosts
//! - [`KeyringStore`] - OS keyring implementation (with `keyring-store` feature)
//! - [`create_store`] - Helper to select a backend based on availability
//!
//! # Entry Naming
//!
//! Keys are stored under [`Provider::entry_name`](crate::Provider::entry_name),
//! i.e. `keygate/{provider}/api_key`.
//!
//! # Example
//!
//! ```rust,ignore
//! use keygate_core::store::{Secret, SecretStore, create_store};
//!
//! let store = create_store(true); // Prefer keyring if available
//!
//! store.set("keygate/gemini/api_key", &Secret::new("AIza...")).await?;
//! assert!(store.exists("keygate/gemini/api_key").await?);
//! ```

use async_trait::async_trait;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

mod memory;
#[cfg(feature = "keyring-store")]
mod keyring;

pub use memory::MemoryStore;
#[cfg(feature = "keyring-store")]
pub use keyring::KeyringStore;

/// An API key that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose) and
/// is zeroed when the secret is dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Error type for secret store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Access to the entry was denied.
    #[error("access denied to entry: {entry}")]
    AccessDenied { entry: String },

    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    Backend { message: String },

    /// The keyring backend is not available.
    #[error("keyring not available: {message}")]
    KeyringUnavailable { message: String },
}

/// Abstraction over secret storage backends.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Retrieve a secret by entry name.
    ///
    /// Returns `Ok(None)` if the entry doesn't exist.
    async fn get(&self, entry: &str) -> Result<Option<Secret>, StoreError>;

    /// Store a secret, overwriting any existing value.
    async fn set(&self, entry: &str, secret: &Secret) -> Result<(), StoreError>;

    /// Delete an entry.
    ///
    /// Returns `Ok(())` even if the entry didn't exist.
    async fn delete(&self, entry: &str) -> Result<(), StoreError>;

    /// Check if an entry exists without handing out its value.
    async fn exists(&self, entry: &str) -> Result<bool, StoreError> {
        Ok(self.get(entry).await?.is_some())
    }
}

#[async_trait]
impl<T: SecretStore + ?Sized> SecretStore for Box<T> {
    async fn get(&self, entry: &str) -> Result<Option<Secret>, StoreError> {
        (**self).get(entry).await
    }

    async fn set(&self, entry: &str, secret: &Secret) -> Result<(), StoreError> {
        (**self).set(entry, secret).await
    }

    async fn delete(&self, entry: &str) -> Result<(), StoreError> {
        (**self).delete(entry).await
    }

    async fn exists(&self, entry: &str) -> Result<bool, StoreError> {
        (**self).exists(entry).await
    }
}

/// Create a secret store with automatic backend selection.
///
/// - If `prefer_keyring` is `true` and the `keyring-store` feature is enabled,
///   attempts a [`KeyringStore`] and falls back to [`MemoryStore`] with a
///   warning if the keyring is unavailable.
/// - Otherwise returns a [`MemoryStore`].
pub fn create_store(prefer_keyring: bool) -> Box<dyn SecretStore> {
    create_store_in(DEFAULT_KEYRING_SERVICE, prefer_keyring)
}

/// Keyring service name used by [`create_store`].
pub const DEFAULT_KEYRING_SERVICE: &str = "keygate";

/// [`create_store`] with an explicit keyring service name.
pub fn create_store_in(keyring_service: &str, prefer_keyring: bool) -> Box<dyn SecretStore> {
    #[cfg(not(feature = "keyring-store"))]
    let _ = keyring_service;

    #[cfg(feature = "keyring-store")]
    if prefer_keyring {
        match KeyringStore::try_new(keyring_service) {
            Ok(store) => {
                tracing::info!("Using OS keyring for API key storage");
                return Box::new(store);
            }
            Err(e) => {
                tracing::warn!(
                    "Keyring unavailable ({}), falling back to memory store. \
                     Selected keys will not persist across restarts.",
                    e
                );
            }
        }
    }

    #[cfg(not(feature = "keyring-store"))]
    if prefer_keyring {
        tracing::warn!(
            "Keyring storage requested but keyring-store feature not enabled. \
             Using memory store."
        );
    }

    tracing::debug!("Using in-memory API key storage");
    Box::new(MemoryStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_redacted() {
        let secret = Secret::new("sk-live-123");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("sk-live-123"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_secret_display_redacted() {
        let secret = Secret::new("sk-live-123");
        assert_eq!(secret.to_string(), "[REDACTED]");
    }

    #[test]
    fn test_secret_blank() {
        assert!(Secret::new("").is_blank());
        assert!(Secret::new("  \n").is_blank());
        assert!(!Secret::new("r8_abc").is_blank());
    }

    #[tokio::test]
    async fn test_create_store_memory() {
        let store = create_store(false);

        store.set("keygate/gemini/api_key", &Secret::new("k")).await.unwrap();
        assert!(store.exists("keygate/gemini/api_key").await.unwrap());

        store.delete("keygate/gemini/api_key").await.unwrap();
        assert!(!store.exists("keygate/gemini/api_key").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_store_prefer_keyring_keeps_values() {
        // Either a keyring that passed its persistence check or the memory
        // fallback; both must return what was written.
        let store = create_store_in("keygate-test-create", true);
        let entry = "keygate/deepseek/api_key";

        store.set(entry, &Secret::new("sk-ds")).await.unwrap();
        let read = store.get(entry).await.unwrap();
        let _ = store.delete(entry).await;

        assert_eq!(read.map(|s| s.expose().to_string()).as_deref(), Some("sk-ds"));
    }
}
