//! Interfaces to the world outside the engine.
//!
//! Each external collaborator gets its own trait so it can be swapped or
//! mocked independently. [`crate::file_hosts`] provides filesystem implementations.

use crate::error::Result;
use async_trait::async_trait;

/// A secret that lets a write run with elevated privilege (for example a
/// `sudo` password). Never printed and never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a secret.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret, for handing to the privileged writer.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Read/write access to the system hosts file.
#[async_trait]
pub trait SystemHosts: Send + Sync {
    /// Reads the current hosts file.
    ///
    /// # Errors
    ///
    /// [`HostsError::Read`](crate::HostsError::Read), or
    /// [`HostsError::Interrupted`](crate::HostsError::Interrupted) on
    /// timeout/cancellation.
    async fn read(&self) -> Result<String>;

    /// Replaces the hosts file, optionally using `credential` to elevate.
    ///
    /// # Errors
    ///
    /// [`HostsError::PermissionDenied`](crate::HostsError::PermissionDenied)
    /// when elevation is needed or the credential was rejected,
    /// [`HostsError::Write`](crate::HostsError::Write) for other failures,
    /// [`HostsError::Interrupted`](crate::HostsError::Interrupted) on
    /// timeout/cancellation.
    async fn write(&self, content: &str, credential: Option<&Credential>) -> Result<()>;
}

/// Storage for user profile contents.
#[async_trait]
pub trait ProfileContent: Send + Sync {
    /// Loads the raw text of profile `id`.
    ///
    /// # Errors
    ///
    /// [`HostsError::NotFound`](crate::HostsError::NotFound) if the profile
    /// has no stored content.
    async fn load(&self, id: &str) -> Result<String>;

    /// Persists the raw text of profile `id`.
    ///
    /// # Errors
    ///
    /// Implementation-specific I/O errors.
    async fn save(&self, id: &str, content: &str) -> Result<()>;
}

/// Asks the user for an elevation credential.
#[async_trait]
pub trait CredentialPrompt: Send + Sync {
    /// Returns `None` when the user dismissed the prompt.
    async fn prompt(&self) -> Option<Credential>;
}

/// A prompt that never yields a credential; for headless use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

#[async_trait]
impl CredentialPrompt for NoPrompt {
    async fn prompt(&self) -> Option<Credential> {
        None
    }
}
