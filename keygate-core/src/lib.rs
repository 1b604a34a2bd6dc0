//! # Keygate Core
//!
//! API-key availability lifecycle for tools that call hosted AI services.
//!
//! This crate provides:
//! - [`KeyAvailability`] - The tri-state availability value tool pages render from
//! - [`KeyLifecycleController`] - Owner of that value: startup check, invalidation, selection
//! - [`KeyStore`] - The host-supplied capability the controller queries and prompts through
//! - Environment and secret-store backed [`KeyStore`] implementations
//! - [`KeyGate`] - Consumer-side helpers for gating forms and reacting to auth failures
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use keygate_core::{EnvKeyStore, KeyAvailability, KeyLifecycleController, Provider};
//!
//! async fn startup() -> Arc<KeyLifecycleController<EnvKeyStore>> {
//!     let controller = Arc::new(KeyLifecycleController::new(EnvKeyStore::for_provider(Provider::DeepSeek)));
//!     if controller.check_availability().await != KeyAvailability::Available {
//!         // show the gate, then on user action:
//!         controller.select_key().await;
//!     }
//!     controller
//! }
//! ```

pub mod availability;
pub mod controller;
pub mod gate;
pub mod key_store;
pub mod provider;
pub mod store;

// Re-export commonly used types at crate root
pub use availability::KeyAvailability;

pub use controller::{
    ControllerConfig,
    KeyLifecycleController,
};

pub use key_store::{
    EnvKeyStore,
    KeyPicker,
    KeyStore,
    KeyStoreError,
    SecretKeyStore,
};

pub use gate::{
    GateView,
    KeyGate,
    INVALID_KEY_MESSAGE,
    is_auth_failure,
};

pub use provider::{
    Provider,
    ParseProviderError,
};

pub use store::{
    Secret,
    SecretStore,
    StoreError,
    MemoryStore,
    create_store,
    create_store_in,
    DEFAULT_KEYRING_SERVICE,
};

#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;
