//! Error types.

use std::sync::Arc;
use thiserror::Error;

/// Result alias for hosts operations.
pub type Result<T> = std::result::Result<T, HostsError>;

/// Errors returned by the profile store, the content cache and the sync engine.
///
/// Wrapped sources are reference-counted so the error is `Clone`: a single
/// failed content load is handed to every reader that was waiting on it.
#[derive(Debug, Clone, Error)]
pub enum HostsError {
    /// The referenced profile, trash entry or content does not exist.
    #[error("profile not found: {id}")]
    NotFound {
        /// The id that was looked up.
        id: String,
    },

    /// A profile with this id already exists.
    #[error("profile id already in use: {id}")]
    DuplicateId {
        /// The conflicting id.
        id: String,
    },

    /// Attempted to rename, re-flag or trash the system profile.
    #[error("the system profile cannot be modified")]
    Immutable,

    /// Profile fields failed validation.
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    /// The write was rejected for lack of privilege.
    #[error("permission denied: {path}")]
    PermissionDenied {
        /// The file that could not be written.
        path: String,
    },

    /// Reading a file failed for a reason other than permissions.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The file being read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// Writing a file failed for a reason other than permissions.
    #[error("failed to write {path}: {message}")]
    Write {
        /// The file being written.
        path: String,
        /// What went wrong.
        message: String,
    },

    /// The user declined the elevation prompt.
    #[error("elevation prompt was cancelled")]
    Cancelled,

    /// An external read or write timed out or was cancelled.
    #[error("operation on {path} was interrupted")]
    Interrupted {
        /// The file involved.
        path: String,
    },

    /// A persisted JSON document could not be (de)serialized.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// The document path.
        path: String,
        /// Underlying serde error.
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// Filesystem I/O failed outside the hosts file itself.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<std::io::Error>),
}

impl From<std::io::Error> for HostsError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

impl HostsError {
    /// Returns `true` if the write was refused for lack of privilege.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::PermissionDenied { .. } => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }

    /// Returns `true` for a missing profile, trash entry or content file.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) fn parse(path: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}
