//! OS keyring-backed secret storage.

use async_trait::async_trait;
use keyring::Entry;

use super::{Secret, SecretStore, StoreError};

/// Keyring user name every keygate entry is filed under.
const KEYRING_USER: &str = "keygate";

/// Value written while checking that the keyring persists entries.
const PROBE_VALUE: &str = "keygate-persistence-check";

/// API keys held in the platform keyring.
///
/// Backends: Keychain on macOS, Credential Manager on Windows and the kernel
/// keyutils session keyring on Linux. An entry named `keygate/gemini/api_key`
/// is filed under the keyring service `{service_name}/keygate/gemini/api_key`.
pub struct KeyringStore {
    service_name: String,
}

impl KeyringStore {
    /// Open the keyring, proving first that it keeps what is written to it.
    ///
    /// A probe value is written through one handle and read back through a
    /// fresh one. Builds without a platform backend hand out mock credentials
    /// that forget everything between handles; those fail here with
    /// [`StoreError::KeyringUnavailable`].
    pub fn try_new(service_name: &str) -> Result<Self, StoreError> {
        let store = Self {
            service_name: service_name.to_string(),
        };

        let writer = store.locate("__probe__").map_err(unavailable)?;
        let reader = store.locate("__probe__").map_err(unavailable)?;
        let verdict = check_persistence(&writer, &reader);
        let _ = writer.delete_credential();

        verdict.map(|()| store)
    }

    fn locate(&self, entry: &str) -> keyring::Result<Entry> {
        Entry::new(&format!("{}/{}", self.service_name, entry), KEYRING_USER)
    }

    fn entry(&self, entry: &str) -> Result<Entry, StoreError> {
        self.locate(entry).map_err(|e| StoreError::Backend {
            message: format!("cannot address keyring entry {}: {}", entry, e),
        })
    }
}

/// Write through `writer`, read through `reader`.
fn check_persistence(writer: &Entry, reader: &Entry) -> Result<(), StoreError> {
    writer.set_password(PROBE_VALUE).map_err(unavailable)?;

    match reader.get_password() {
        Ok(value) if value == PROBE_VALUE => Ok(()),
        Ok(_) => Err(StoreError::KeyringUnavailable {
            message: "probe entry read back a different value".to_string(),
        }),
        Err(keyring::Error::NoEntry) => Err(StoreError::KeyringUnavailable {
            message: "keyring does not persist entries (no platform backend)".to_string(),
        }),
        Err(e) => Err(unavailable(e)),
    }
}

fn unavailable(e: keyring::Error) -> StoreError {
    StoreError::KeyringUnavailable {
        message: e.to_string(),
    }
}

fn backend_failure(entry: &str, action: &str, e: keyring::Error) -> StoreError {
    match e {
        keyring::Error::NoStorageAccess(_) => StoreError::AccessDenied {
            entry: entry.to_string(),
        },
        e => StoreError::Backend {
            message: format!("failed to {} {}: {}", action, entry, e),
        },
    }
}

impl std::fmt::Debug for KeyringStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringStore")
            .field("service_name", &self.service_name)
            .finish()
    }
}

#[async_trait]
impl SecretStore for KeyringStore {
    async fn get(&self, entry: &str) -> Result<Option<Secret>, StoreError> {
        match self.entry(entry)?.get_password() {
            Ok(password) => Ok(Some(Secret::new(password))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(backend_failure(entry, "read", e)),
        }
    }

    async fn set(&self, entry: &str, secret: &Secret) -> Result<(), StoreError> {
        self.entry(entry)?
            .set_password(secret.expose())
            .map_err(|e| backend_failure(entry, "write", e))
    }

    async fn delete(&self, entry: &str) -> Result<(), StoreError> {
        match self.entry(entry)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(backend_failure(entry, "delete", e)),
        }
    }
}
