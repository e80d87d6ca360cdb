//! Profile collection with trash semantics.
//!
//! Every mutation builds a new [`Snapshot`], hands it to the
//! [`ProfileRepository`], and only publishes it once the save succeeded.
//! Readers always see a complete, persisted state.
//!
//! Mutations are synchronous and block on the repository's save; call them
//! from a blocking context when the repository touches disk.

use crate::error::{HostsError, Result};
use crate::profile::{Profile, ProfilePatch, SYSTEM_PROFILE_ID, TrashedProfile};
use crate::util::{now_ms, write_atomic};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

const LIST_FILE: &str = "list.json";
const TRASH_FILE: &str = "trashcan.json";

/// The persisted state: active profiles in display order, then the trash.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Top-level user profiles in display order, folders holding their
    /// children. Never contains the system profile.
    pub profiles: Vec<Profile>,
    /// Trashed profiles, oldest first.
    pub trash: Vec<TrashedProfile>,
}

impl Snapshot {
    /// Finds an active profile anywhere in the tree.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Profile> {
        find_in(&self.profiles, id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Profile> {
        find_in_mut(&mut self.profiles, id)
    }

    /// Detaches `id` from the tree, returning it with its folder's id.
    fn take(&mut self, id: &str) -> Option<(Profile, Option<String>)> {
        take_from(&mut self.profiles, id, None)
    }

    fn id_in_use(&self, id: &str) -> bool {
        id == SYSTEM_PROFILE_ID
            || self.find(id).is_some()
            || self
                .trash
                .iter()
                .any(|t| find_in(std::slice::from_ref(&t.profile), id).is_some())
    }
}

fn find_in<'a>(profiles: &'a [Profile], id: &str) -> Option<&'a Profile> {
    profiles
        .iter()
        .find_map(|p| if p.id == id { Some(p) } else { find_in(&p.children, id) })
}

fn find_in_mut<'a>(profiles: &'a mut [Profile], id: &str) -> Option<&'a mut Profile> {
    for p in profiles.iter_mut() {
        if p.id == id {
            return Some(p);
        }
        if let Some(found) = find_in_mut(&mut p.children, id) {
            return Some(found);
        }
    }
    None
}

fn take_from(
    profiles: &mut Vec<Profile>,
    id: &str,
    parent: Option<&str>,
) -> Option<(Profile, Option<String>)> {
    if let Some(idx) = profiles.iter().position(|p| p.id == id) {
        return Some((profiles.remove(idx), parent.map(str::to_string)));
    }
    profiles
        .iter_mut()
        .find_map(|p| take_from(&mut p.children, id, Some(p.id.as_str())))
}

/// Pre-order walk collecting enabled entries.
fn collect_enabled(profiles: &[Profile], out: &mut Vec<Profile>) {
    for p in profiles {
        if p.enabled && !p.is_system() {
            out.push(p.clone());
        }
        collect_enabled(&p.children, out);
    }
}

/// Pre-order display order; `true` marks entries leaving with a trashed
/// ancestor or themselves.
fn display_order<'a>(
    profiles: &'a [Profile],
    doomed: &HashSet<&str>,
    parent_gone: bool,
    out: &mut Vec<(&'a str, bool)>,
) {
    for p in profiles {
        let gone = parent_gone || doomed.contains(p.id.as_str());
        out.push((p.id.as_str(), gone));
        display_order(&p.children, doomed, gone, out);
    }
}

/// Loads and saves whole snapshots.
pub trait ProfileRepository: Send + Sync {
    /// Reads the persisted state.
    ///
    /// # Errors
    ///
    /// Implementation-specific I/O or parse errors.
    fn load(&self) -> Result<Snapshot>;

    /// Replaces the persisted state.
    ///
    /// # Errors
    ///
    /// Implementation-specific I/O errors. On error the previous state must
    /// still be readable.
    fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// Keeps snapshots in memory only.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    inner: Mutex<Snapshot>,
}

impl MemoryRepository {
    /// Creates a repository seeded with `snapshot`.
    #[must_use]
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            inner: Mutex::new(snapshot),
        }
    }
}

impl ProfileRepository for MemoryRepository {
    fn load(&self) -> Result<Snapshot> {
        Ok(self.inner.lock().clone())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        *self.inner.lock() = snapshot.clone();
        Ok(())
    }
}

/// Stores `list.json` and `trashcan.json` in a data directory.
///
/// Both documents are staged in temp files before either is renamed into
/// place. If the second rename fails, the first file is put back, so a
/// failed save leaves the previous pair on disk.
#[derive(Debug, Clone)]
pub struct JsonRepository {
    dir: PathBuf,
}

impl JsonRepository {
    /// Creates a repository rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the data directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_array<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path)?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).map_err(|e| HostsError::parse(path.display().to_string(), e))
    }

    fn stage<T: serde::Serialize>(&self, name: &str, items: &[T]) -> Result<NamedTempFile> {
        let raw = serde_json::to_vec(items)
            .map_err(|e| HostsError::parse(self.dir.join(name).display().to_string(), e))?;
        std::fs::create_dir_all(&self.dir)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&raw)?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }

    fn roll_back(path: &Path, previous: Option<&[u8]>) {
        let undone = match previous {
            Some(bytes) => write_atomic(path, bytes),
            None => std::fs::remove_file(path),
        };
        if let Err(e) = undone {
            tracing::error!(
                path = %path.display(),
                error = %e,
                "Failed to roll back after a partial save"
            );
        }
    }
}

impl ProfileRepository for JsonRepository {
    fn load(&self) -> Result<Snapshot> {
        let mut profiles: Vec<Profile> = self.read_array(LIST_FILE)?;
        let before = profiles.len();
        profiles.retain(|p| !p.is_system());
        if profiles.len() != before {
            tracing::warn!(dir = %self.dir.display(), "Dropped system profile entry from list.json");
        }
        Ok(Snapshot {
            profiles,
            trash: self.read_array(TRASH_FILE)?,
        })
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let list = self.stage(LIST_FILE, &snapshot.profiles)?;
        let trash = self.stage(TRASH_FILE, &snapshot.trash)?;

        let list_path = self.dir.join(LIST_FILE);
        let previous = match std::fs::read(&list_path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        list.persist(&list_path).map_err(|e| e.error)?;
        if let Err(e) = trash.persist(self.dir.join(TRASH_FILE)) {
            tracing::warn!(dir = %self.dir.display(), error = %e.error, "Saving trash failed, restoring list.json");
            Self::roll_back(&list_path, previous.as_deref());
            return Err(e.error.into());
        }
        Ok(())
    }
}

/// Where display focus should go after a trash operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The selected profile was not trashed.
    Unchanged,
    /// The selected profile was trashed; focus moves here (`None` = nothing).
    Moved(Option<String>),
}

/// Result of [`ProfileStore::trash`] and [`ProfileStore::trash_many`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrashOutcome {
    /// Ids actually moved to the trash, in request order.
    pub trashed: Vec<String>,
    /// New display selection.
    pub selection: Selection,
}

/// Ordered profile collection with the system profile always in front.
///
/// Lookups, updates and trashing reach profiles nested inside folders.
/// New profiles are appended at the top level.
pub struct ProfileStore {
    repo: Arc<dyn ProfileRepository>,
    state: RwLock<Arc<Snapshot>>,
    // Serialises read-modify-save so two mutations never race on the repo.
    write: Mutex<()>,
}

impl std::fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ProfileStore")
            .field("profiles", &state.profiles.len())
            .field("trash", &state.trash.len())
            .finish_non_exhaustive()
    }
}

impl ProfileStore {
    /// Opens a store backed by `repo`, loading its current snapshot.
    ///
    /// # Errors
    ///
    /// Propagates the repository's load error.
    pub fn open(repo: Arc<dyn ProfileRepository>) -> Result<Self> {
        let snapshot = repo.load()?;
        tracing::debug!(
            profiles = snapshot.profiles.len(),
            trash = snapshot.trash.len(),
            "Loaded profile store"
        );
        Ok(Self {
            repo,
            state: RwLock::new(Arc::new(snapshot)),
            write: Mutex::new(()),
        })
    }

    /// A store with no persistence, starting empty.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            repo: Arc::new(MemoryRepository::default()),
            state: RwLock::new(Arc::new(Snapshot::default())),
            write: Mutex::new(()),
        }
    }

    /// The current persisted state.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.state.read())
    }

    /// All active top-level profiles, system profile first. Folders carry
    /// their nested profiles in [`Profile::children`].
    #[must_use]
    pub fn list(&self) -> Vec<Profile> {
        let snap = self.snapshot();
        std::iter::once(Profile::system())
            .chain(snap.profiles.iter().cloned())
            .collect()
    }

    /// Enabled user profiles in display order, folders walked depth-first.
    /// A nested profile counts whether or not its folder is enabled.
    #[must_use]
    pub fn enabled_profiles(&self) -> Vec<Profile> {
        let mut out = Vec::new();
        collect_enabled(&self.snapshot().profiles, &mut out);
        out
    }

    /// Looks up an active profile (including the system profile).
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Profile> {
        if id == SYSTEM_PROFILE_ID {
            return Some(Profile::system());
        }
        self.snapshot().find(id).cloned()
    }

    /// The trash, oldest first.
    #[must_use]
    pub fn trash_list(&self) -> Vec<TrashedProfile> {
        self.snapshot().trash.clone()
    }

    /// Appends a new user profile.
    ///
    /// # Errors
    ///
    /// [`HostsError::DuplicateId`] if the id is taken (active, trashed or
    /// reserved); [`HostsError::InvalidProfile`] for an empty name or a
    /// profile flagged as system.
    pub fn create(&self, profile: Profile) -> Result<()> {
        if profile.system {
            return Err(HostsError::InvalidProfile(
                "only the built-in profile can be a system profile".into(),
            ));
        }
        if profile.name.trim().is_empty() {
            return Err(HostsError::InvalidProfile("name must not be empty".into()));
        }

        self.mutate(|snap| {
            if snap.id_in_use(&profile.id) {
                return Err(HostsError::DuplicateId {
                    id: profile.id.clone(),
                });
            }
            tracing::info!(id = %profile.id, name = %profile.name, "Created profile");
            snap.profiles.push(profile);
            Ok(())
        })
    }

    /// Merges `patch` into the profile with `id`.
    ///
    /// The system profile ignores `enabled` and rejects `name`/`system`.
    ///
    /// # Errors
    ///
    /// [`HostsError::Immutable`], [`HostsError::NotFound`], or
    /// [`HostsError::InvalidProfile`] for an empty name or `system = true`.
    pub fn update(&self, id: &str, patch: ProfilePatch) -> Result<()> {
        if id == SYSTEM_PROFILE_ID {
            if patch.name.is_some() || patch.system.is_some() {
                return Err(HostsError::Immutable);
            }
            tracing::debug!("Ignoring enablement change on system profile");
            return Ok(());
        }
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(HostsError::InvalidProfile("name must not be empty".into()));
        }
        if patch.system == Some(true) {
            return Err(HostsError::InvalidProfile(
                "only the built-in profile can be a system profile".into(),
            ));
        }

        self.mutate(|snap| {
            let profile = snap
                .find_mut(id)
                .ok_or_else(|| HostsError::NotFound { id: id.to_string() })?;
            if let Some(name) = patch.name {
                profile.name = name;
            }
            if let Some(on) = patch.enabled {
                profile.enabled = on;
            }
            tracing::info!(id = %id, enabled = profile.enabled, "Updated profile");
            Ok(())
        })
    }

    /// Sets the top-level display order. `ids` must list every top-level
    /// user profile exactly once.
    ///
    /// # Errors
    ///
    /// [`HostsError::InvalidProfile`] if `ids` is not such a permutation.
    pub fn reorder(&self, ids: &[&str]) -> Result<()> {
        self.mutate(|snap| {
            let wanted: HashSet<&str> = ids.iter().copied().collect();
            let current: HashSet<&str> = snap.profiles.iter().map(|p| p.id.as_str()).collect();
            if wanted.len() != ids.len() || wanted != current {
                return Err(HostsError::InvalidProfile(
                    "reorder must name every top-level profile exactly once".into(),
                ));
            }
            let mut rest = std::mem::take(&mut snap.profiles);
            for id in ids {
                if let Some(pos) = rest.iter().position(|p| p.id == *id) {
                    snap.profiles.push(rest.swap_remove(pos));
                }
            }
            Ok(())
        })
    }

    /// Moves one profile (a folder goes with its children) to the trash.
    ///
    /// `selected` is the id currently focused in the UI; the outcome tells
    /// the caller where focus should go.
    ///
    /// # Errors
    ///
    /// [`HostsError::Immutable`] for the system profile,
    /// [`HostsError::NotFound`] if no such active profile exists.
    pub fn trash(&self, id: &str, selected: Option<&str>) -> Result<TrashOutcome> {
        self.move_to_trash(&[id], selected, true)
    }

    /// Moves several profiles to the trash, skipping unknown ids.
    ///
    /// # Errors
    ///
    /// [`HostsError::Immutable`] if `ids` contains the system profile; the
    /// store is left unchanged in that case.
    pub fn trash_many(&self, ids: &[&str], selected: Option<&str>) -> Result<TrashOutcome> {
        self.move_to_trash(ids, selected, false)
    }

    fn move_to_trash(
        &self,
        ids: &[&str],
        selected: Option<&str>,
        require_all: bool,
    ) -> Result<TrashOutcome> {
        if ids.contains(&SYSTEM_PROFILE_ID) {
            return Err(HostsError::Immutable);
        }

        let mut outcome = TrashOutcome {
            trashed: Vec::new(),
            selection: Selection::Unchanged,
        };
        self.mutate(|snap| {
            if require_all {
                if let Some(missing) = ids.iter().find(|id| snap.find(id).is_none()) {
                    return Err(HostsError::NotFound {
                        id: (*missing).to_string(),
                    });
                }
            }

            let doomed: HashSet<&str> = ids.iter().copied().collect();
            if let Some(sel) = selected {
                let mut order = Vec::new();
                display_order(&snap.profiles, &doomed, false, &mut order);
                if let Some(idx) = order.iter().position(|(id, gone)| *gone && *id == sel) {
                    outcome.selection = Selection::Moved(replacement(&order, idx));
                }
            }

            let now = now_ms();
            for id in ids {
                if let Some((profile, parent_id)) = snap.take(id) {
                    snap.trash.push(TrashedProfile {
                        profile,
                        trashed_at_ms: now,
                        parent_id,
                    });
                    outcome.trashed.push((*id).to_string());
                }
            }
            Ok(())
        })?;

        if !outcome.trashed.is_empty() {
            tracing::info!(ids = ?outcome.trashed, "Moved profiles to trash");
        }
        Ok(outcome)
    }

    /// Moves a trashed profile back, with every field as it was when
    /// trashed. It rejoins its folder when that folder is still active,
    /// otherwise the end of the top-level list.
    ///
    /// # Errors
    ///
    /// [`HostsError::NotFound`] if `id` is not in the trash,
    /// [`HostsError::DuplicateId`] if an active profile reused the id.
    pub fn restore(&self, id: &str) -> Result<()> {
        self.mutate(|snap| {
            let idx = snap
                .trash
                .iter()
                .position(|t| t.profile.id == id)
                .ok_or_else(|| HostsError::NotFound { id: id.to_string() })?;
            if snap.find(id).is_some() {
                return Err(HostsError::DuplicateId { id: id.to_string() });
            }
            let entry = snap.trash.remove(idx);
            match entry.parent_id.as_deref().and_then(|pid| snap.find_mut(pid)) {
                Some(folder) => folder.children.push(entry.profile),
                None => snap.profiles.push(entry.profile),
            }
            tracing::info!(id = %id, parent = ?entry.parent_id, "Restored profile from trash");
            Ok(())
        })
    }

    /// Permanently deletes a trashed profile. Returns whether anything was
    /// removed; an absent id is not an error.
    ///
    /// # Errors
    ///
    /// Only repository save failures.
    pub fn purge(&self, id: &str) -> Result<bool> {
        if !self.snapshot().trash.iter().any(|t| t.profile.id == id) {
            tracing::debug!(id = %id, "Trash entry already gone, skipping");
            return Ok(false);
        }
        let mut removed = false;
        self.mutate(|snap| {
            let before = snap.trash.len();
            snap.trash.retain(|t| t.profile.id != id);
            removed = snap.trash.len() != before;
            Ok(())
        })?;
        if removed {
            tracing::info!(id = %id, "Purged profile");
        }
        Ok(removed)
    }

    /// Empties the trash. Returns how many entries were removed.
    ///
    /// # Errors
    ///
    /// Only repository save failures.
    pub fn purge_all(&self) -> Result<usize> {
        let mut removed = 0;
        self.mutate(|snap| {
            removed = snap.trash.len();
            snap.trash.clear();
            Ok(())
        })?;
        tracing::info!(count = removed, "Emptied trash");
        Ok(removed)
    }

    fn mutate<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Snapshot) -> Result<()>,
    {
        let _guard = self.write.lock();
        let mut next = (*self.snapshot()).clone();
        f(&mut next)?;
        self.repo.save(&next)?;
        *self.state.write() = Arc::new(next);
        Ok(())
    }
}

/// Previous surviving entry before `idx`, else the next one, else nothing.
fn replacement(order: &[(&str, bool)], idx: usize) -> Option<String> {
    let survives = |entry: &&(&str, bool)| !entry.1;
    order[..idx]
        .iter()
        .rev()
        .find(survives)
        .or_else(|| order[idx + 1..].iter().find(survives))
        .map(|(id, _)| (*id).to_string())
}
