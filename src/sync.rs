//! Reconciliation of enabled profiles into the system hosts file.

use crate::cache::ContentCache;
use crate::capability::{Credential, CredentialPrompt, SystemHosts};
use crate::config::SyncConfig;
use crate::error::{HostsError, Result};
use crate::file_hosts::{FsProfileContent, FsSystemHosts};
use crate::history::HostsHistory;
use crate::profile::SYSTEM_PROFILE_ID;
use crate::splice::{compose_payload, splice};
use crate::store::{JsonRepository, ProfileStore};
use parking_lot::Mutex;
use std::sync::Arc;

/// Where a [`SyncEngine::reconcile`] call currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No reconcile running.
    Idle,
    /// Reading the hosts file.
    Reading,
    /// Building the payload and splicing.
    Composing,
    /// First write attempt.
    Writing,
    /// First write was refused; asking for a credential.
    NeedsElevation,
    /// The single retry with a fresh credential.
    Retrying,
    /// Last call wrote the file.
    Success,
    /// Last call gave up.
    Failed,
}

/// A successful reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// The text now in the hosts file.
    pub content: String,
    /// Whether the text differs from what was read.
    pub changed: bool,
    /// Whether a credential prompt was needed.
    pub elevated: bool,
}

/// A failed reconcile, carrying the text that would have been written.
#[derive(Debug, Clone, thiserror::Error)]
#[error("hosts file not updated: {source}")]
pub struct ReconcileError {
    /// Why it failed.
    #[source]
    pub source: HostsError,
    /// The composed hosts text, when composition got that far.
    pub content: Option<String>,
}

impl ReconcileError {
    fn before_compose(source: HostsError) -> Self {
        Self {
            source,
            content: None,
        }
    }

    fn with_content(source: HostsError, content: String) -> Self {
        Self {
            source,
            content: Some(content),
        }
    }

    /// Returns `true` if the user declined the elevation prompt.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.source, HostsError::Cancelled)
    }
}

/// Process-lifetime slot for the elevation credential.
///
/// Starts empty and is only written by the elevation-retry protocol.
#[derive(Debug, Clone, Default)]
pub struct CredentialCache(Arc<Mutex<Option<Credential>>>);

impl CredentialCache {
    /// The cached credential, if any.
    #[must_use]
    pub fn get(&self) -> Option<Credential> {
        self.0.lock().clone()
    }

    /// Returns `true` if a credential is cached.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.lock().is_some()
    }

    fn replace(&self, credential: Option<Credential>) {
        *self.0.lock() = credential;
    }
}

/// Composes enabled profiles and writes them into the hosts file.
///
/// At most one reconcile runs at a time; further calls wait their turn and
/// then read fresh state. Profile mutations never wait on a reconcile.
pub struct SyncEngine {
    store: Arc<ProfileStore>,
    cache: Arc<ContentCache>,
    hosts: Arc<dyn SystemHosts>,
    prompt: Arc<dyn CredentialPrompt>,
    credential: CredentialCache,
    history: Option<Arc<HostsHistory>>,
    writer: tokio::sync::Mutex<()>,
    phase: Mutex<SyncPhase>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("phase", &*self.phase.lock())
            .field("credential_cached", &self.credential.is_set())
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Creates an engine with an empty credential cache.
    #[must_use]
    pub fn new(
        store: Arc<ProfileStore>,
        cache: Arc<ContentCache>,
        hosts: Arc<dyn SystemHosts>,
        prompt: Arc<dyn CredentialPrompt>,
    ) -> Self {
        Self {
            store,
            cache,
            hosts,
            prompt,
            credential: CredentialCache::default(),
            history: None,
            writer: tokio::sync::Mutex::new(()),
            phase: Mutex::new(SyncPhase::Idle),
        }
    }

    /// Wires an engine over the data directory and hosts file named in
    /// `config`, with write history enabled.
    ///
    /// # Errors
    ///
    /// Propagates failures loading `list.json` / `trashcan.json`.
    pub fn open(config: &SyncConfig, prompt: Arc<dyn CredentialPrompt>) -> Result<Self> {
        let store = Arc::new(ProfileStore::open(Arc::new(JsonRepository::new(
            &config.data_dir,
        )))?);
        let hosts: Arc<dyn SystemHosts> = Arc::new(FsSystemHosts::from_config(config));
        let contents = Arc::new(FsProfileContent::new(&config.data_dir));
        let cache = Arc::new(ContentCache::new(Arc::clone(&hosts), contents));
        let history = Arc::new(HostsHistory::new(&config.data_dir, config.history_limit));

        tracing::info!(
            data_dir = %config.data_dir.display(),
            hosts = %config.hosts_path.display(),
            safe_mode = config.safe_mode,
            "Opened hosts sync engine"
        );
        Ok(Self::new(store, cache, hosts, prompt).with_history(history))
    }

    /// Records every changing write into `history`.
    #[must_use]
    pub fn with_history(mut self, history: Arc<HostsHistory>) -> Self {
        self.history = Some(history);
        self
    }

    /// The profile store this engine reads.
    #[must_use]
    pub fn store(&self) -> &Arc<ProfileStore> {
        &self.store
    }

    /// The content cache this engine reads.
    #[must_use]
    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// Handle to the engine's credential slot.
    #[must_use]
    pub fn credential(&self) -> &CredentialCache {
        &self.credential
    }

    /// Drops the cached credential; the next refused write prompts again.
    pub fn forget_credential(&self) {
        self.credential.replace(None);
    }

    /// Current phase of the running (or last) reconcile.
    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock()
    }

    /// Writes the enabled profiles into the hosts file's managed region.
    ///
    /// A refused write triggers one credential prompt and exactly one retry.
    ///
    /// # Errors
    ///
    /// [`ReconcileError`] wrapping the read, load or write failure
    /// (`Cancelled` if the prompt was dismissed). `content` holds the text
    /// that would have been written once composition succeeded.
    pub async fn reconcile(&self) -> std::result::Result<Reconciled, ReconcileError> {
        let _turn = self.writer.lock().await;
        let result = self.run().await;
        self.set_phase(if result.is_ok() {
            SyncPhase::Success
        } else {
            SyncPhase::Failed
        });
        result
    }

    /// Saves new content for profile `id` and reconciles if it is enabled.
    ///
    /// Returns `None` when the profile is disabled and the hosts file was
    /// left alone.
    ///
    /// # Errors
    ///
    /// The content store's save error (with no `content`), or the reconcile
    /// error.
    pub async fn update_content(
        &self,
        id: &str,
        text: &str,
    ) -> std::result::Result<Option<Reconciled>, ReconcileError> {
        if id == SYSTEM_PROFILE_ID {
            return Err(ReconcileError::before_compose(HostsError::Immutable));
        }
        self.cache
            .store(id, text)
            .await
            .map_err(ReconcileError::before_compose)?;
        if !self.store.get(id).is_some_and(|p| p.enabled) {
            return Ok(None);
        }
        self.reconcile().await.map(Some)
    }

    async fn run(&self) -> std::result::Result<Reconciled, ReconcileError> {
        self.set_phase(SyncPhase::Reading);
        let current = self.hosts.read().await.map_err(ReconcileError::before_compose)?;

        self.set_phase(SyncPhase::Composing);
        let payload = self.payload().await.map_err(ReconcileError::before_compose)?;
        let next = splice(&current, &payload);

        self.set_phase(SyncPhase::Writing);
        let cached = self.credential.get();
        let elevated = match self.hosts.write(&next, cached.as_ref()).await {
            Ok(()) => false,
            Err(e) if e.is_permission_denied() => {
                self.elevate_and_retry(&next, e).await?;
                true
            }
            Err(e) => return Err(ReconcileError::with_content(e, next)),
        };

        self.after_write(current.clone(), next.clone()).await;
        tracing::info!(
            bytes = next.len(),
            changed = current != next,
            elevated,
            "Applied hosts profiles"
        );
        Ok(Reconciled {
            changed: current != next,
            content: next,
            elevated,
        })
    }

    async fn elevate_and_retry(
        &self,
        next: &str,
        refused: HostsError,
    ) -> std::result::Result<(), ReconcileError> {
        self.set_phase(SyncPhase::NeedsElevation);
        tracing::warn!(error = %refused, "Hosts write refused, asking for credential");

        let Some(credential) = self.prompt.prompt().await else {
            tracing::info!("Elevation prompt dismissed");
            return Err(ReconcileError::with_content(HostsError::Cancelled, next.to_string()));
        };
        self.credential.replace(Some(credential.clone()));

        self.set_phase(SyncPhase::Retrying);
        match self.hosts.write(next, Some(&credential)).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if e.is_permission_denied() {
                    tracing::warn!("Credential rejected, clearing cache");
                    self.credential.replace(None);
                }
                Err(ReconcileError::with_content(e, next.to_string()))
            }
        }
    }

    async fn payload(&self) -> Result<String> {
        let mut contents = Vec::new();
        for profile in self.store.enabled_profiles() {
            match self.cache.get(&profile.id).await {
                Ok(text) => contents.push(text),
                Err(e) if e.is_not_found() => {
                    tracing::warn!(id = %profile.id, "Enabled profile has no content, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(compose_payload(contents))
    }

    async fn after_write(&self, old: String, new: String) {
        self.cache.set(SYSTEM_PROFILE_ID, &new);
        let Some(history) = self.history.clone() else {
            return;
        };
        // HostsHistory does blocking file I/O.
        match tokio::task::spawn_blocking(move || history.record(&old, &new)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to record hosts history"),
            Err(e) => tracing::warn!(error = %e, "History task did not finish"),
        }
    }

    fn set_phase(&self, phase: SyncPhase) {
        tracing::debug!(?phase, "Reconcile phase");
        *self.phase.lock() = phase;
    }
}
