//! Preview handle type.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const HANDLE_PREFIX: &str = "blob:opener/";

/// A revocable reference to in-memory media bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreviewHandle(String);

impl PreviewHandle {
    pub(crate) fn generate() -> Self {
        Self(format!("{}{}", HANDLE_PREFIX, Uuid::new_v4()))
    }

    /// Rebuilds a handle from the id segment used in preview URLs.
    ///
    /// Returns `None` for anything that is not a UUID.
    pub fn from_id(id: &str) -> Option<Self> {
        Uuid::parse_str(id)
            .ok()
            .map(|uuid| Self(format!("{}{}", HANDLE_PREFIX, uuid)))
    }

    /// The id segment after the `blob:opener/` prefix.
    pub fn id(&self) -> &str {
        self.0.strip_prefix(HANDLE_PREFIX).unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
