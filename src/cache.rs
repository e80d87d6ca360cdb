//! Memoized profile contents.

use crate::capability::{ProfileContent, SystemHosts};
use crate::error::Result;
use crate::profile::SYSTEM_PROFILE_ID;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

type PendingLoad = Shared<BoxFuture<'static, Result<String>>>;

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, String>,
    pending: HashMap<String, PendingLoad>,
}

/// Lazily loads and memoizes raw profile text by id.
///
/// The system profile (`"0"`) is loaded from the hosts file; every other id
/// from the profile content store. Concurrent misses on the same id share a
/// single load and all receive its result.
pub struct ContentCache {
    system: Arc<dyn SystemHosts>,
    profiles: Arc<dyn ProfileContent>,
    state: Mutex<CacheState>,
}

impl std::fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ContentCache")
            .field("entries", &state.entries.len())
            .field("pending", &state.pending.len())
            .finish_non_exhaustive()
    }
}

impl ContentCache {
    /// Creates an empty cache over the two loaders.
    #[must_use]
    pub fn new(system: Arc<dyn SystemHosts>, profiles: Arc<dyn ProfileContent>) -> Self {
        Self {
            system,
            profiles,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Returns the cached text for `id`, loading it on first access.
    ///
    /// # Errors
    ///
    /// Whatever the loader returned. Failures are not cached.
    pub async fn get(&self, id: &str) -> Result<String> {
        let load = {
            let mut state = self.state.lock();
            if let Some(text) = state.entries.get(id) {
                tracing::debug!(id = %id, "Content cache hit");
                return Ok(text.clone());
            }
            if let Some(pending) = state.pending.get(id) {
                tracing::debug!(id = %id, "Joining in-flight content load");
                pending.clone()
            } else {
                let load = self.loader(id);
                state.pending.insert(id.to_string(), load.clone());
                load
            }
        };

        let result = load.clone().await;

        let mut state = self.state.lock();
        // Only the load still registered may fill the entry; a `set` in the
        // meantime removed it and owns the value.
        if state.pending.get(id).is_some_and(|p| p.ptr_eq(&load)) {
            state.pending.remove(id);
            if let Ok(text) = &result {
                state.entries.insert(id.to_string(), text.clone());
            }
        }
        result
    }

    /// Overwrites the entry for `id`, superseding any in-flight load.
    pub fn set(&self, id: &str, text: impl Into<String>) {
        let mut state = self.state.lock();
        state.pending.remove(id);
        state.entries.insert(id.to_string(), text.into());
    }

    /// Persists `text` as the content of profile `id`, then caches it.
    ///
    /// # Errors
    ///
    /// The content store's save error; the cache is left untouched.
    pub async fn store(&self, id: &str, text: &str) -> Result<()> {
        self.profiles.save(id, text).await?;
        self.set(id, text);
        tracing::info!(id = %id, bytes = text.len(), "Saved profile content");
        Ok(())
    }

    /// Drops the entry for `id` so the next read goes to the loader.
    pub fn invalidate(&self, id: &str) {
        let mut state = self.state.lock();
        state.pending.remove(id);
        state.entries.remove(id);
    }

    /// Returns `true` if `id` is cached.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().entries.contains_key(id)
    }

    fn loader(&self, id: &str) -> PendingLoad {
        if id == SYSTEM_PROFILE_ID {
            let system = Arc::clone(&self.system);
            async move { system.read().await }.boxed().shared()
        } else {
            let profiles = Arc::clone(&self.profiles);
            let id = id.to_string();
            async move { profiles.load(&id).await }.boxed().shared()
        }
    }
}
