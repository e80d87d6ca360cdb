//! Managed-region splicing.
//!
//! The hosts file is split at the first recognised start marker. Everything
//! before it belongs to the user and is kept; everything from the marker on
//! belongs to us and is rewritten wholesale:
//!
//! ```text
//! 127.0.0.1 localhost            <- preserved prefix
//!
//!
//!
//! # --- SWEETHOSTS_CONTENT_START ---
//!
//! 10.0.0.1 api.dev               <- payload
//! ```

/// Start marker written in front of the managed region.
pub const CURRENT_MARKER: &str = "# --- SWEETHOSTS_CONTENT_START ---";

/// Markers written by earlier releases. Still recognised, never written.
pub const LEGACY_MARKERS: &[&str] = &["# --- SWITCHHOSTS_CONTENT_START ---"];

const REGION_GAP: &str = "\n\n\n\n";
const HEADER_GAP: &str = "\n\n";
const PROFILE_SEPARATOR: &str = "\n\n\n";

/// Location of the managed region inside a hosts file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagedRegion {
    /// Byte offset of the marker; the region runs to end of file.
    pub offset: usize,
    /// The marker found at `offset`.
    pub marker: &'static str,
}

impl ManagedRegion {
    /// Returns `true` if the region was written by an older release.
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.marker != CURRENT_MARKER
    }
}

/// Finds the earliest recognised marker in `target`.
#[must_use]
pub fn find_region(target: &str) -> Option<ManagedRegion> {
    std::iter::once(CURRENT_MARKER)
        .chain(LEGACY_MARKERS.iter().copied())
        .filter_map(|marker| target.find(marker).map(|offset| ManagedRegion { offset, marker }))
        .min_by_key(|r| r.offset)
}

/// The user-owned part of `target`, with trailing whitespace removed.
#[must_use]
pub fn preserved_prefix(target: &str) -> &str {
    let head = find_region(target).map_or(target, |r| &target[..r.offset]);
    head.trim_end()
}

/// Text following the current marker's header, if the file has one.
#[must_use]
pub fn managed_payload(target: &str) -> Option<&str> {
    let region = find_region(target)?;
    let body = &target[region.offset + region.marker.len()..];
    Some(body.strip_prefix(HEADER_GAP).unwrap_or_else(|| body.trim_start_matches('\n')))
}

/// Computes the new hosts file text for `payload`.
///
/// An empty payload removes the managed region entirely.
///
/// # Example
///
/// ```
/// use hosts_sync::splice::{splice, CURRENT_MARKER};
///
/// let once = splice("127.0.0.1 localhost\n", "10.0.0.1 api.dev");
/// assert_eq!(
///     once,
///     format!("127.0.0.1 localhost\n\n\n\n{CURRENT_MARKER}\n\n10.0.0.1 api.dev")
/// );
/// assert_eq!(splice(&once, "10.0.0.1 api.dev"), once);
/// assert_eq!(splice(&once, ""), "127.0.0.1 localhost\n");
/// ```
#[must_use]
pub fn splice(target: &str, payload: &str) -> String {
    let prefix = preserved_prefix(target);
    if payload.is_empty() {
        return format!("{prefix}\n");
    }
    format!("{prefix}{REGION_GAP}{CURRENT_MARKER}{HEADER_GAP}{payload}")
}

/// Joins profile contents into one payload.
///
/// Each content is trimmed at the end; blank contents are skipped; the rest
/// are separated by two blank lines.
#[must_use]
pub fn compose_payload<I, S>(contents: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parts: Vec<String> = contents
        .into_iter()
        .map(|c| c.as_ref().trim_end().to_string())
        .filter(|c| !c.trim().is_empty())
        .collect();
    parts.join(PROFILE_SEPARATOR)
}
