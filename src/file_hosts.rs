//! Filesystem-backed capabilities.
//!
//! [`FsSystemHosts`] reads and writes the real hosts file, falling back to
//! `sudo` when a credential is supplied and the direct write is refused.
//! [`FsProfileContent`] keeps each profile's text in
//! `<data_dir>/hosts_content_<id>.txt`.

use crate::capability::{Credential, ProfileContent, SystemHosts};
use crate::config::{SyncConfig, system_hosts_path};
use crate::error::{HostsError, Result};
use crate::util::{is_elevated, now_ms};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The system hosts file on local disk.
///
/// # Permissions
///
/// Writing `/etc/hosts` normally requires root. Without a credential a
/// refused write reports [`HostsError::PermissionDenied`] so the engine can
/// prompt. With a credential (Unix only) the content is staged in a temp
/// file and copied into place with `sudo -S`, the password fed on stdin.
///
/// # Safe mode
///
/// When enabled, writes land in a fresh temp file and the hosts file is
/// never touched.
#[derive(Debug, Clone)]
pub struct FsSystemHosts {
    path: PathBuf,
    safe_mode: bool,
    staging_dir: PathBuf,
}

impl FsSystemHosts {
    /// Targets the platform hosts file.
    #[must_use]
    pub fn new() -> Self {
        Self::with_path(system_hosts_path())
    }

    /// Targets a custom file (useful for testing).
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            safe_mode: false,
            staging_dir: std::env::temp_dir(),
        }
    }

    /// Uses the hosts path and safe-mode flag from `config`.
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::with_path(&config.hosts_path).safe_mode(config.safe_mode)
    }

    /// Enables or disables safe mode.
    #[must_use]
    pub const fn safe_mode(mut self, on: bool) -> Self {
        self.safe_mode = on;
        self
    }

    /// Directory for sudo staging files and safe-mode copies. Defaults to
    /// the system temp directory.
    #[must_use]
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    /// Returns the target path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_safe_copy(&self, content: &str) -> Result<()> {
        let tmp = self
            .staging_dir
            .join(format!("hosts-sync-safe-{}.hosts", now_ms()));
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| self.write_error(&e))?;
        tracing::info!(
            target_path = %self.path.display(),
            path = %tmp.display(),
            "Safe mode: wrote hosts content to temp file"
        );
        Ok(())
    }

    #[cfg(unix)]
    async fn write_with_sudo(&self, content: &str, credential: &Credential) -> Result<()> {
        use std::process::Stdio;
        use tokio::io::AsyncWriteExt;

        let staged = self.stage(content).await?;
        let mut child = self
            .sudo_copy(staged.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.write_error(&e))?;

        if let Some(mut stdin) = child.stdin.take() {
            let line = format!("{}\n", credential.expose());
            stdin
                .write_all(line.as_bytes())
                .await
                .map_err(|e| self.write_error(&e))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.write_error(&e))?;
        if output.status.success() {
            tracing::info!(path = %self.path.display(), "Wrote hosts file via sudo");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_sudo_rejection(&stderr) {
            tracing::warn!(path = %self.path.display(), "sudo rejected the credential");
            return Err(self.permission_denied());
        }
        Err(HostsError::Write {
            path: self.path.display().to_string(),
            message: stderr.trim().to_string(),
        })
    }

    /// Copies `content` into a private temp file for the privileged copy.
    #[cfg(unix)]
    async fn stage(&self, content: &str) -> Result<tempfile::NamedTempFile> {
        let staged = tempfile::Builder::new()
            .prefix("hosts-sync-")
            .suffix(".hosts")
            .tempfile_in(&self.staging_dir)
            .map_err(|e| self.write_error(&e))?;
        tokio::fs::write(staged.path(), content)
            .await
            .map_err(|e| self.write_error(&e))?;
        Ok(staged)
    }

    /// `sudo` invocation copying `staged` over the hosts file. The C locale
    /// keeps its messages recognisable to [`is_sudo_rejection`].
    #[cfg(unix)]
    fn sudo_copy(&self, staged: &Path) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new("sudo");
        cmd.env("LC_ALL", "C")
            .args(["-S", "-p", "", "sh", "-c", r#"cat "$1" > "$2" && chmod 644 "$2""#, "sh"])
            .arg(staged)
            .arg(&self.path);
        cmd
    }

    #[cfg(not(unix))]
    async fn write_with_sudo(&self, _content: &str, _credential: &Credential) -> Result<()> {
        tracing::warn!(path = %self.path.display(), "Elevated writes are not supported on this platform");
        Err(self.permission_denied())
    }

    fn permission_denied(&self) -> HostsError {
        HostsError::PermissionDenied {
            path: self.path.display().to_string(),
        }
    }

    fn read_error(&self, e: std::io::Error) -> HostsError {
        match e.kind() {
            ErrorKind::TimedOut | ErrorKind::Interrupted => HostsError::Interrupted {
                path: self.path.display().to_string(),
            },
            _ => HostsError::Read {
                path: self.path.display().to_string(),
                source: Arc::new(e),
            },
        }
    }

    fn write_error(&self, e: &std::io::Error) -> HostsError {
        match e.kind() {
            ErrorKind::TimedOut | ErrorKind::Interrupted => HostsError::Interrupted {
                path: self.path.display().to_string(),
            },
            _ => HostsError::Write {
                path: self.path.display().to_string(),
                message: e.to_string(),
            },
        }
    }
}

impl Default for FsSystemHosts {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SystemHosts for FsSystemHosts {
    async fn read(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.read_error(e))
    }

    async fn write(&self, content: &str, credential: Option<&Credential>) -> Result<()> {
        if self.safe_mode {
            return self.write_safe_copy(content).await;
        }

        match tokio::fs::write(&self.path, content).await {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), bytes = content.len(), "Wrote hosts file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                if is_elevated() {
                    // Root was refused; a password will not help.
                    return Err(self.write_error(&e));
                }
                match credential {
                    Some(credential) => self.write_with_sudo(content, credential).await,
                    None => {
                        tracing::debug!(path = %self.path.display(), "Hosts write needs elevation");
                        Err(self.permission_denied())
                    }
                }
            }
            Err(e) => Err(self.write_error(&e)),
        }
    }
}

/// Profile contents as `hosts_content_<id>.txt` files in a directory.
#[derive(Debug, Clone)]
pub struct FsProfileContent {
    dir: PathBuf,
}

impl FsProfileContent {
    /// Stores contents under `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the content file for `id`.
    ///
    /// # Errors
    ///
    /// [`HostsError::InvalidProfile`] if `id` could escape the directory.
    pub fn content_path(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(HostsError::InvalidProfile(format!("unusable profile id: {id:?}")));
        }
        Ok(self.dir.join(format!("hosts_content_{id}.txt")))
    }
}

#[async_trait]
impl ProfileContent for FsProfileContent {
    async fn load(&self, id: &str) -> Result<String> {
        let path = self.content_path(id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(HostsError::NotFound { id: id.to_string() }),
            Err(e) => Err(HostsError::Read {
                path: path.display().to_string(),
                source: Arc::new(e),
            }),
        }
    }

    async fn save(&self, id: &str, content: &str) -> Result<()> {
        let path = self.content_path(id)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, content).await?;
        Ok(())
    }
}

fn is_sudo_rejection(stderr: &str) -> bool {
    ["incorrect password", "Sorry, try again", "not in the sudoers", "a password is required"]
        .iter()
        .any(|needle| stderr.contains(needle))
}
