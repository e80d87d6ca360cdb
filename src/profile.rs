//! Profile records as listed and persisted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Id reserved for the built-in profile that stands for the live hosts file.
pub const SYSTEM_PROFILE_ID: &str = "0";

/// A named, toggleable block of hosts entries.
///
/// Serialized with the `id`/`title`/`on` field names used by existing
/// `list.json` files. A folder carries its nested profiles in `children`;
/// any enabled entry in the tree is spliced, whatever its folder's flag.
/// Fields this crate does not model (`type`, `folder_mode`, ...) survive a
/// load/save round trip untouched.
///
/// # Example
///
/// ```
/// use hosts_sync::Profile;
///
/// let p = Profile::new("dev", "Dev boxes").enabled(true);
/// assert!(p.enabled);
/// assert!(!p.is_system());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Stable opaque identifier.
    pub id: String,

    /// Display label.
    #[serde(rename = "title", default)]
    pub name: String,

    /// Whether this profile is spliced into the hosts file.
    #[serde(rename = "on", default)]
    pub enabled: bool,

    /// Marks the built-in, non-deletable profile.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub system: bool,

    /// Nested profiles, when this entry is a folder.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Self>,

    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Profile {
    /// Creates a disabled user profile.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: false,
            system: false,
            children: Vec::new(),
            extra: Map::new(),
        }
    }

    /// The profile representing the system hosts file itself.
    #[must_use]
    pub fn system() -> Self {
        Self {
            id: SYSTEM_PROFILE_ID.to_string(),
            name: "system".to_string(),
            enabled: true,
            system: true,
            children: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Sets the enabled flag.
    #[must_use]
    pub const fn enabled(mut self, on: bool) -> Self {
        self.enabled = on;
        self
    }

    /// Replaces the nested profiles.
    #[must_use]
    pub fn with_children(mut self, children: Vec<Self>) -> Self {
        self.children = children;
        self
    }

    /// Returns `true` for the built-in system profile.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.system || self.id == SYSTEM_PROFILE_ID
    }

    /// Unmodelled fields carried over from the persisted record.
    #[must_use]
    pub const fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

/// Partial update applied by [`ProfileStore::update`](crate::ProfileStore::update).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    /// New display label.
    pub name: Option<String>,
    /// New enabled flag.
    pub enabled: Option<bool>,
    /// New system flag. Only ever accepted as a no-op.
    pub system: Option<bool>,
}

impl ProfilePatch {
    /// A patch that only renames.
    #[must_use]
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// A patch that only toggles.
    #[must_use]
    pub fn toggle(on: bool) -> Self {
        Self {
            enabled: Some(on),
            ..Self::default()
        }
    }
}

/// A profile sitting in the trash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrashedProfile {
    /// The profile exactly as it was when trashed.
    #[serde(rename = "data")]
    pub profile: Profile,

    /// Deletion time, Unix milliseconds.
    #[serde(rename = "add_time_ms")]
    pub trashed_at_ms: i64,

    /// The folder it was trashed from, `None` for top-level entries.
    #[serde(default)]
    pub parent_id: Option<String>,
}
