//! # hosts-sync
//!
//! Keep several named hosts profiles, toggle them on and off, and splice the
//! enabled ones into the system hosts file.
//!
//! Only a clearly marked region at the end of the hosts file is managed.
//! Everything above the marker belongs to the user and is never touched:
//!
//! ```text
//! 127.0.0.1 localhost
//!
//!
//!
//! # --- SWEETHOSTS_CONTENT_START ---
//!
//! 10.0.0.5 api.dev.example
//! ```
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hosts_sync::{NoPrompt, Profile, ProfilePatch, SyncConfig, SyncEngine};
//!
//! let config = SyncConfig::from_env()?;
//! let engine = SyncEngine::open(&config, Arc::new(NoPrompt))?;
//!
//! engine.store().create(Profile::new("dev", "Dev boxes"))?;
//! engine.cache().store("dev", "10.0.0.5 api.dev.example").await?;
//! engine.store().update("dev", ProfilePatch::toggle(true))?;
//!
//! let applied = engine.reconcile().await?;
//! assert!(applied.content.contains("api.dev.example"));
//! ```
//!
//! ## Elevation
//!
//! Writing `/etc/hosts` usually requires root. When a write is refused the
//! engine asks its [`CredentialPrompt`] once, retries once, and keeps the
//! credential in memory for the rest of the process. A dismissed prompt
//! surfaces as [`HostsError::Cancelled`], distinct from I/O failures.
//!
//! ## Markers
//!
//! The start marker is part of the on-disk contract. Files written with the
//! legacy marker are recognised and migrated on the next write.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod capability;
pub mod config;
pub mod error;
pub mod file_hosts;
pub mod history;
pub mod profile;
pub mod splice;
pub mod store;
pub mod sync;
pub mod util;

pub use cache::ContentCache;
pub use capability::{Credential, CredentialPrompt, NoPrompt, ProfileContent, SystemHosts};
pub use config::SyncConfig;
pub use error::{HostsError, Result};
pub use file_hosts::{FsProfileContent, FsSystemHosts};
pub use history::{HistoryEntry, HostsHistory};
pub use profile::{Profile, ProfilePatch, SYSTEM_PROFILE_ID, TrashedProfile};
pub use store::{JsonRepository, MemoryRepository, ProfileRepository, ProfileStore, Selection, TrashOutcome};
pub use sync::{CredentialCache, ReconcileError, Reconciled, SyncEngine, SyncPhase};
