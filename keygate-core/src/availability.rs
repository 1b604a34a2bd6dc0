//! The tri-state key availability value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a usable API key is known to exist.
///
/// `Unknown` is only ever observed before the startup check settles.
/// After that the value cycles between `Available` and `Unavailable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAvailability {
    /// The startup check has not resolved yet.
    #[default]
    Unknown,

    /// A key is presumed usable.
    Available,

    /// No key is selected, or the last use of it failed authorization.
    Unavailable,
}

impl KeyAvailability {
    /// Whether the value has left `Unknown`.
    pub fn is_settled(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Whether a key is presumed usable.
    pub fn is_available(self) -> bool {
        matches!(self, Self::Available)
    }

    /// Map the result of a "has key" query onto a settled value.
    pub fn from_has_key(has_key: bool) -> Self {
        if has_key {
            Self::Available
        } else {
            Self::Unavailable
        }
    }

    /// Lowercase name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Available => "available",
            Self::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for KeyAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
