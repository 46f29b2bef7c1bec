// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The per-user settings record persisted between sessions.

use crate::error::{Result, SyncError};
use gk_repo::{Identity, RepositoryState};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

/// Snapshot of repository state worth restoring at the next start.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct Settings {
    pub path: Option<PathBuf>,
    pub remote_url: Option<String>,
    pub current_branch: Option<String>,
    pub remote_branch_ref: Option<String>,
    pub commit_needed: bool,
    pub format_version: Option<u32>,
    pub file_mode: Option<bool>,
    pub bare: Option<bool>,
    pub log_updates: Option<bool>,
    pub fetch_refspec: Option<String>,
    pub token_file: Option<PathBuf>,
    pub identity: Identity,
}

impl Settings {
    pub fn from_state(state: &RepositoryState, token_file: &Path) -> Self {
        Self {
            path: Some(state.path.clone()),
            remote_url: state.remote_url.clone(),
            current_branch: state.current_branch.clone(),
            remote_branch_ref: state.remote_branch_ref.clone(),
            commit_needed: state.commit_needed,
            format_version: state.format_version,
            file_mode: Some(state.file_mode_tracking),
            bare: Some(state.bare),
            log_updates: Some(state.log_updates),
            fetch_refspec: state.fetch_refspec.clone(),
            token_file: Some(token_file.to_path_buf()),
            identity: state.user_identity.clone(),
        }
    }

    /// Whether this record was written for the repository at `path`.
    pub fn describes(&self, path: &Path) -> bool {
        self.path.as_deref() == Some(path)
    }

    /// Restore repository fields into `state`. Derived flags stay stale
    /// until the next status refresh.
    pub fn restore_into(&self, state: &mut RepositoryState) {
        state.remote_url = self.remote_url.clone();
        state.current_branch = self.current_branch.clone();
        state.remote_branch_ref = self.remote_branch_ref.clone();
        state.commit_needed = self.commit_needed;
        state.format_version = self.format_version;
        if let Some(file_mode) = self.file_mode {
            state.file_mode_tracking = file_mode;
        }
        if let Some(bare) = self.bare {
            state.bare = bare;
        }
        if let Some(log_updates) = self.log_updates {
            state.log_updates = log_updates;
        }
        state.fetch_refspec = self.fetch_refspec.clone();
        state.user_identity = self.identity.clone();
        state.mark_stale();
    }
}

/// Loads and saves the settings record.
pub trait SettingsStore {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Settings>>;
    fn save(&self, settings: &Settings) -> Result<()>;
}

/// TOML file store, `<config_dir>/gitkeeper/settings.toml` by default.
#[derive(Debug, Clone)]
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gitkeeper").join("settings.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, message: impl ToString) -> SyncError {
        SyncError::Settings {
            path: self.path.clone(),
            message: message.to_string(),
        }
    }
}

impl SettingsStore for TomlSettingsStore {
    fn load(&self) -> Result<Option<Settings>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.error(err)),
        };
        let settings = toml::from_str(&text).map_err(|e| self.error(e))?;
        tracing::debug!(path = %self.path.display(), "settings loaded");
        Ok(Some(settings))
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.error(e))?;
        }
        let content = toml::to_string_pretty(settings).map_err(|e| self.error(e))?;

        // Write to a temporary file first, then rename for atomicity
        let temp_file = self.path.with_extension("toml.tmp");
        fs::write(&temp_file, content).map_err(|e| self.error(e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_file, fs::Permissions::from_mode(0o600)).map_err(|e| self.error(e))?;
        }
        fs::rename(&temp_file, &self.path).map_err(|e| self.error(e))?;

        tracing::debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    record: RefCell<Option<Settings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(settings: Settings) -> Self {
        Self {
            record: RefCell::new(Some(settings)),
        }
    }

    pub fn current(&self) -> Option<Settings> {
        self.record.borrow().clone()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Option<Settings>> {
        Ok(self.record.borrow().clone())
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        *self.record.borrow_mut() = Some(settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Settings {
        let mut state = RepositoryState::new("/work/widgets");
        state.remote_url = Some("https://github.com/acme/widgets.git".into());
        state.current_branch = Some("main".into());
        state.user_identity = Identity::new("Ada", "ada@example.com");
        Settings::from_state(&state, Path::new("/home/ada/.gitkeeper/git_token"))
    }

    #[test]
    fn toml_store_saves_and_reloads() {
        let dir = TempDir::new().unwrap();
        let store = TomlSettingsStore::new(dir.path().join("gitkeeper").join("settings.toml"));
        assert_eq!(store.load().unwrap(), None);

        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(store.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "path = \"/x\"\nsurprise = 1\n").unwrap();

        let err = TomlSettingsStore::new(&path).load().unwrap_err();
        match err {
            SyncError::Settings { message, .. } => assert!(message.contains("surprise")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn restore_marks_flags_stale() {
        let settings = sample();
        let mut state = RepositoryState::new("/work/widgets");
        state.refresh(&gk_repo::parse_status("On branch main\nnothing to commit"));
        settings.restore_into(&mut state);

        assert!(!state.is_fresh());
        assert_eq!(state.user_identity.email.as_deref(), Some("ada@example.com"));
        assert!(settings.describes(Path::new("/work/widgets")));
    }
}
