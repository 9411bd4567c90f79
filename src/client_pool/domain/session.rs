//! Per-acquisition session settings.

use super::SessionId;
use serde::{Deserialize, Serialize};

/// A root directory hint forwarded to backends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Root {
    /// Root URI, usually `file://...`.
    pub uri: String,
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
}

impl Root {
    /// Creates an unnamed root.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Context of the client-facing session requesting a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SessionConfig {
    session: Option<SessionId>,
    read_only: Option<bool>,
}

impl SessionConfig {
    /// Creates a configuration scoped to `session`.
    #[must_use]
    pub const fn for_session(session: SessionId) -> Self {
        Self {
            session: Some(session),
            read_only: None,
        }
    }

    /// Creates a configuration not tied to any session.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            session: None,
            read_only: None,
        }
    }

    /// Sets the read-only hint applied to volume mounts.
    #[must_use]
    pub const fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = Some(read_only);
        self
    }

    /// Returns the calling session.
    #[must_use]
    pub const fn session(&self) -> Option<SessionId> {
        self.session
    }

    /// Returns whether mounts must be read-only.
    #[must_use]
    pub fn read_only(&self) -> bool {
        self.read_only.unwrap_or(false)
    }
}
