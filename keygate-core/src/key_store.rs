//! The key store capability the lifecycle controller is built on.
//!
//! This module provides:
//! - [`KeyStore`] - Host-supplied facility that reports and selects a key
//! - [`KeyStoreError`] - Failures a key store can report
//! - [`EnvKeyStore`] - Key deployed through an environment variable
//! - [`SecretKeyStore`] - Key held in a [`SecretStore`] and chosen through a [`KeyPicker`]

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::provider::Provider;
use crate::store::{Secret, SecretStore, StoreError};

/// Error type for key store operations.
///
/// The controller never surfaces these; they end up in logs and as an
/// `Unavailable` state.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// The user dismissed the selection without choosing a key.
    #[error("key selection cancelled")]
    Cancelled,

    /// This store cannot prompt for a key.
    #[error("interactive key selection not supported: {message}")]
    SelectionUnsupported { message: String },

    /// The store could not be reached.
    #[error("key store unavailable: {message}")]
    Unavailable { message: String },

    /// The underlying secret storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// The selection prompt failed.
    #[error("key prompt failed: {message}")]
    Prompt { message: String },
}

/// Platform facility that knows whether a usable key is selected and can
/// ask the user to pick one.
///
/// The controller has no knowledge of how keys are stored or validated;
/// hosts supply an implementation.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Whether a usable key is currently selected.
    async fn has_selected_key(&self) -> Result<bool, KeyStoreError>;

    /// Run the interactive selection flow.
    ///
    /// Resolves when the user finishes choosing. Cancellation is an error.
    async fn open_select_key(&self) -> Result<(), KeyStoreError>;
}

#[async_trait]
impl<T: KeyStore + ?Sized> KeyStore for Arc<T> {
    async fn has_selected_key(&self) -> Result<bool, KeyStoreError> {
        (**self).has_selected_key().await
    }

    async fn open_select_key(&self) -> Result<(), KeyStoreError> {
        (**self).open_select_key().await
    }
}

#[async_trait]
impl<T: KeyStore + ?Sized> KeyStore for Box<T> {
    async fn has_selected_key(&self) -> Result<bool, KeyStoreError> {
        (**self).has_selected_key().await
    }

    async fn open_select_key(&self) -> Result<(), KeyStoreError> {
        (**self).open_select_key().await
    }
}

/// Key store backed by an environment variable.
///
/// A key is selected when the variable is set to a non-blank value. Keys
/// provided this way belong to the deployment, so selection cannot be done
/// interactively and always fails with [`KeyStoreError::SelectionUnsupported`].
#[derive(Debug, Clone)]
pub struct EnvKeyStore {
    var: String,
}

impl EnvKeyStore {
    /// Watch an arbitrary environment variable.
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    /// Watch the conventional variable for `provider`.
    pub fn for_provider(provider: Provider) -> Self {
        Self::new(provider.env_var())
    }

    /// The variable name being watched.
    pub fn var(&self) -> &str {
        &self.var
    }
}

#[async_trait]
impl KeyStore for EnvKeyStore {
    async fn has_selected_key(&self) -> Result<bool, KeyStoreError> {
        match std::env::var(&self.var) {
            Ok(value) => Ok(!value.trim().is_empty()),
            Err(std::env::VarError::NotPresent) => Ok(false),
            Err(std::env::VarError::NotUnicode(_)) => Err(KeyStoreError::Unavailable {
                message: format!("{} is not valid unicode", self.var),
            }),
        }
    }

    async fn open_select_key(&self) -> Result<(), KeyStoreError> {
        Err(KeyStoreError::SelectionUnsupported {
            message: format!(
                "set the {} environment variable in the deployment settings",
                self.var
            ),
        })
    }
}

/// Source of a key during interactive selection.
#[async_trait]
pub trait KeyPicker: Send + Sync {
    /// Ask the user for a key for `provider`.
    ///
    /// `Ok(None)` means the user dismissed the prompt.
    async fn pick_key(&self, provider: Provider) -> Result<Option<Secret>, KeyStoreError>;
}

/// Key store that keeps the selected key in a [`SecretStore`].
///
/// A key is selected when the provider's entry exists. Selection asks the
/// picker for a key and writes it under the provider's entry name.
pub struct SecretKeyStore<S, P> {
    provider: Provider,
    store: S,
    picker: P,
}

impl<S: SecretStore, P: KeyPicker> SecretKeyStore<S, P> {
    /// Create a key store for `provider`.
    pub fn new(provider: Provider, store: S, picker: P) -> Self {
        Self {
            provider,
            store,
            picker,
        }
    }

    /// The provider whose key is managed.
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// The underlying secret store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Remove the stored key. Succeeds if none was stored.
    pub async fn forget(&self) -> Result<(), KeyStoreError> {
        self.store.delete(&self.provider.entry_name()).await?;
        tracing::info!("Removed stored {} key", self.provider);
        Ok(())
    }
}

impl<S, P> std::fmt::Debug for SecretKeyStore<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKeyStore")
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S: SecretStore, P: KeyPicker> KeyStore for SecretKeyStore<S, P> {
    async fn has_selected_key(&self) -> Result<bool, KeyStoreError> {
        Ok(self.store.exists(&self.provider.entry_name()).await?)
    }

    async fn open_select_key(&self) -> Result<(), KeyStoreError> {
        let secret = match self.picker.pick_key(self.provider).await? {
            Some(secret) if !secret.is_blank() => secret,
            _ => return Err(KeyStoreError::Cancelled),
        };

        self.store.set(&self.provider.entry_name(), &secret).await?;
        tracing::debug!("Stored selected {} key", self.provider);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    struct FixedPicker(Option<&'static str>);

    #[async_trait]
    impl KeyPicker for FixedPicker {
        async fn pick_key(&self, _provider: Provider) -> Result<Option<Secret>, KeyStoreError> {
            Ok(self.0.map(Secret::new))
        }
    }

    struct BrokenPicker;

    #[async_trait]
    impl KeyPicker for BrokenPicker {
        async fn pick_key(&self, _provider: Provider) -> Result<Option<Secret>, KeyStoreError> {
            Err(KeyStoreError::Prompt {
                message: "terminal closed".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_env_key_store_missing_var() {
        let store = EnvKeyStore::new("KEYGATE_TEST_DEFINITELY_UNSET_VAR");
        assert!(!store.has_selected_key().await.unwrap());
    }

    #[tokio::test]
    async fn test_env_key_store_present_var() {
        // PATH is set in any environment the test suite runs in.
        let store = EnvKeyStore::new("PATH");
        assert!(store.has_selected_key().await.unwrap());
    }

    #[tokio::test]
    async fn test_env_key_store_selection_unsupported() {
        let store = EnvKeyStore::for_provider(Provider::DeepSeek);
        let err = store.open_select_key().await.unwrap_err();
        assert!(matches!(err, KeyStoreError::SelectionUnsupported { .. }));
        assert!(err.to_string().contains("DEEPSEEK_API_KEY"));
    }

    #[tokio::test]
    async fn test_secret_key_store_select_persists_key() {
        let store = SecretKeyStore::new(
            Provider::Replicate,
            MemoryStore::new(),
            FixedPicker(Some("r8_abc")),
        );
        assert!(!store.has_selected_key().await.unwrap());

        store.open_select_key().await.unwrap();

        assert!(store.has_selected_key().await.unwrap());
        let saved = store.store().get("keygate/replicate/api_key").await.unwrap();
        assert_eq!(saved.unwrap().expose(), "r8_abc");
    }

    #[tokio::test]
    async fn test_secret_key_store_dismissed_prompt_is_cancelled() {
        let store = SecretKeyStore::new(Provider::Gemini, MemoryStore::new(), FixedPicker(None));
        let err = store.open_select_key().await.unwrap_err();
        assert!(matches!(err, KeyStoreError::Cancelled));
        assert!(!store.has_selected_key().await.unwrap());
    }

    #[tokio::test]
    async fn test_secret_key_store_blank_key_is_cancelled() {
        let store = SecretKeyStore::new(Provider::Gemini, MemoryStore::new(), FixedPicker(Some("   ")));
        assert!(matches!(
            store.open_select_key().await,
            Err(KeyStoreError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_secret_key_store_picker_error_propagates() {
        let store = SecretKeyStore::new(Provider::Gemini, MemoryStore::new(), BrokenPicker);
        assert!(matches!(
            store.open_select_key().await,
            Err(KeyStoreError::Prompt { .. })
        ));
    }

    #[tokio::test]
    async fn test_secret_key_store_forget() {
        let store = SecretKeyStore::new(
            Provider::OpenRouter,
            MemoryStore::with_entry("keygate/openrouter/api_key", Secret::new("sk-or")),
            FixedPicker(None),
        );
        assert!(store.has_selected_key().await.unwrap());

        store.forget().await.unwrap();
        assert!(!store.has_selected_key().await.unwrap());
    }
}
