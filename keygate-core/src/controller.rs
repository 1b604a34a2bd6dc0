//! The key lifecycle controller.
//!
//! [`KeyLifecycleController`] owns the single [`KeyAvailability`] value of a
//! running host and is the only thing that mutates it:
//!
//! | From    | Event                          | To          |
//! |---------|--------------------------------|-------------|
//! | Unknown | startup check finds a key      | Available   |
//! | Unknown | startup check finds none/fails | Unavailable |
//! | any     | [`invalidate`]                 | Unavailable |
//! | any     | [`select_key`] resolves        | Available   |
//! | any     | [`select_key`] fails           | Unavailable |
//!
//! Public operations never return errors. Every key store failure, including
//! a panic inside the store or an elapsed startup timeout, ends as
//! `Unavailable` so consumers always have a definite value to render.
//!
//! [`invalidate`]: KeyLifecycleController::invalidate
//! [`select_key`]: KeyLifecycleController::select_key
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() {
//! use std::sync::Arc;
//! use keygate_core::{EnvKeyStore, KeyAvailability, KeyLifecycleController};
//!
//! let controller = Arc::new(KeyLifecycleController::new(EnvKeyStore::new("API_KEY")));
//! let mut changes = controller.subscribe();
//!
//! controller.check_availability().await;
//! assert_ne!(*changes.borrow_and_update(), KeyAvailability::Unknown);
//! # }
//! ```

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::availability::KeyAvailability;
use crate::key_store::{KeyStore, KeyStoreError};

/// Default bound on the startup check, in seconds.
const DEFAULT_CHECK_TIMEOUT_SECS: u64 = 10;

/// Controller settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Upper bound on the startup check in seconds. `None` waits for the
    /// store indefinitely.
    pub check_timeout_secs: Option<u64>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            check_timeout_secs: Some(DEFAULT_CHECK_TIMEOUT_SECS),
        }
    }
}

impl ControllerConfig {
    /// Config with no startup timeout.
    pub fn without_timeout() -> Self {
        Self {
            check_timeout_secs: None,
        }
    }

    /// The startup check bound as a [`Duration`].
    pub fn check_timeout(&self) -> Option<Duration> {
        self.check_timeout_secs.map(Duration::from_secs)
    }
}

/// Why a key store call ended without an answer.
#[derive(Debug, Error)]
enum StoreFailure {
    #[error(transparent)]
    Store(#[from] KeyStoreError),

    #[error("key store panicked: {0}")]
    Panicked(String),

    #[error("key store did not answer within {0:?}")]
    TimedOut(Duration),
}

/// Owner of the tri-state key availability value.
///
/// Create one per host and share it with consumers behind an `Arc`; all
/// operations take `&self`.
pub struct KeyLifecycleController<K> {
    store: K,
    config: ControllerConfig,
    state: watch::Sender<KeyAvailability>,
}

impl<K: KeyStore> KeyLifecycleController<K> {
    /// Create a controller in the `Unknown` state with default settings.
    pub fn new(store: K) -> Self {
        Self::with_config(store, ControllerConfig::default())
    }

    /// Create a controller in the `Unknown` state.
    pub fn with_config(store: K, config: ControllerConfig) -> Self {
        let (state, _) = watch::channel(KeyAvailability::Unknown);
        Self {
            store,
            config,
            state,
        }
    }

    /// Current availability.
    pub fn availability(&self) -> KeyAvailability {
        *self.state.borrow()
    }

    /// Receive every subsequent availability change.
    pub fn subscribe(&self) -> watch::Receiver<KeyAvailability> {
        self.state.subscribe()
    }

    /// The injected key store.
    pub fn key_store(&self) -> &K {
        &self.store
    }

    /// Settings in effect.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Run the startup check and settle the state.
    ///
    /// Queries the key store once. If the state has already settled (a
    /// previous check, [`invalidate`](Self::invalidate) or
    /// [`select_key`](Self::select_key)) the current value is returned
    /// without querying. A result that arrives after something else settled
    /// the state is discarded.
    pub async fn check_availability(&self) -> KeyAvailability {
        let current = self.availability();
        if current.is_settled() {
            return current;
        }

        let resolved = match self.query_store().await {
            Ok(has_key) => KeyAvailability::from_has_key(has_key),
            Err(e) => {
                warn!("API key availability check failed, treating key as unavailable: {}", e);
                KeyAvailability::Unavailable
            }
        };

        self.state.send_if_modified(|state| {
            if state.is_settled() {
                debug!(
                    "Discarding startup check result ({}); state already settled to {}",
                    resolved, state
                );
                return false;
            }
            debug!("API key availability: {} -> {}", state, resolved);
            *state = resolved;
            true
        });

        self.availability()
    }

    /// Mark the key unusable.
    ///
    /// Called by consumers after their own downstream call failed
    /// authorization. Idempotent.
    pub fn invalidate(&self) {
        self.transition(KeyAvailability::Unavailable);
    }

    /// Run the interactive selection and settle the state.
    ///
    /// A completed selection is assumed to have produced a usable key and
    /// the state becomes `Available` immediately; the next failing
    /// downstream call is expected to [`invalidate`](Self::invalidate) it.
    pub async fn select_key(&self) -> KeyAvailability {
        let outcome = AssertUnwindSafe(async { self.store.open_select_key().await })
            .catch_unwind()
            .await
            .map_err(|panic| StoreFailure::Panicked(panic_message(&*panic)))
            .and_then(|result| result.map_err(StoreFailure::from));

        let next = match outcome {
            Ok(()) => KeyAvailability::Available,
            Err(e) => {
                warn!("API key selection failed: {}", e);
                KeyAvailability::Unavailable
            }
        };

        self.transition(next);
        next
    }

    async fn query_store(&self) -> Result<bool, StoreFailure> {
        let query = AssertUnwindSafe(async { self.store.has_selected_key().await }).catch_unwind();

        let caught = match self.config.check_timeout() {
            Some(limit) => tokio::time::timeout(limit, query)
                .await
                .map_err(|_| StoreFailure::TimedOut(limit))?,
            None => query.await,
        };

        caught
            .map_err(|panic| StoreFailure::Panicked(panic_message(&*panic)))?
            .map_err(StoreFailure::from)
    }

    fn transition(&self, next: KeyAvailability) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            debug!("API key availability: {} -> {}", state, next);
            *state = next;
            true
        });
    }
}

impl<K> std::fmt::Debug for KeyLifecycleController<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLifecycleController")
            .field("availability", &*self.state.borrow())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
