// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Sync orchestration for gitkeeper.
//!
//! Ties the git plumbing of `gk-repo` and the credential lifecycle of
//! `gk-credentials` together behind [`SyncOrchestrator`], and owns the
//! layered application configuration and the persisted settings record.

pub mod config;
pub mod error;
pub mod housekeeping;
pub mod settings;
pub mod sync;

pub use config::{GkConfig, StoreScope, ENV_PREFIX};
pub use error::{Result, SyncError};
pub use housekeeping::{purge, FileSystem, LocalFileSystem};
pub use settings::{MemorySettingsStore, Settings, SettingsStore, TomlSettingsStore};
pub use sync::{clone_repository, Collaborators, IdentitySource, PushOutcome, SyncConfig, SyncOrchestrator};
