// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Top-level orchestration of one repository's sync with its remote.
//!
//! [`SyncOrchestrator`] owns the [`RepositoryState`] and borrows every
//! collaborator it talks to through [`Collaborators`].

use crate::config::{GkConfig, StoreScope};
use crate::error::{Result, SyncError};
use crate::housekeeping::{self, FileSystem};
use crate::settings::{Settings, SettingsStore};
use gk_credentials::{with_exposed_credential, CredentialVault, ExposureRequest, Prompter, Secret};
use gk_repo::ops::{self, PushRequest};
use gk_repo::{
    history, read_repo_config, verify_repository, BranchLifecycle, BranchManager, CommandRunner, CommitRecord,
    Identity, Listing, RefEntry, RepoConfig, RepositoryState, StatusReader, StatusSnapshot, VcsCommand, VcsError,
    DEFAULT_COMMIT_MESSAGE,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Explicit inputs of one session. Nothing here is read from the environment.
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    pub repo_path: PathBuf,
    /// Remote URL used when bootstrapping a new repository.
    pub remote_url: Option<String>,
    /// Identity given on the command line.
    pub identity: Option<Identity>,
    /// Token given on the command line.
    pub token: Option<Secret>,
    /// Token and account supplied through the environment.
    pub env_token: Option<Secret>,
    pub env_account: Option<String>,
    pub app: GkConfig,
}

impl SyncConfig {
    pub fn new(repo_path: impl Into<PathBuf>, app: GkConfig) -> Self {
        Self {
            repo_path: repo_path.into(),
            app,
            ..Default::default()
        }
    }
}

/// Borrowed collaborators.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub runner: &'a dyn CommandRunner,
    pub vault: &'a dyn CredentialVault,
    pub prompter: &'a dyn Prompter,
    pub settings: &'a dyn SettingsStore,
    pub filesystem: &'a dyn FileSystem,
}

/// What a push actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PushOutcome {
    pub committed: bool,
    pub pushed: bool,
}

/// Where the session identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    Explicit,
    Environment,
    StoredSettings,
    RepositoryConfig,
    Prompt,
}

pub struct SyncOrchestrator<'a> {
    config: SyncConfig,
    with: Collaborators<'a>,
    state: RepositoryState,
}

/// Clone `url` into `dest`; `runner` must run outside the destination.
pub fn clone_repository(runner: &dyn CommandRunner, url: &str, dest: &Path) -> Result<()> {
    let cmd = VcsCommand::git(["clone".to_string(), url.to_string(), dest.display().to_string()]);
    runner.run(&cmd)?.into_result(&cmd)?;
    tracing::info!(url, dest = %dest.display(), "cloned repository");
    Ok(())
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(config: SyncConfig, with: Collaborators<'a>) -> Self {
        let state = RepositoryState::new(config.repo_path.clone());
        Self { config, with, state }
    }

    pub fn state(&self) -> &RepositoryState {
        &self.state
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn git<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cmd = VcsCommand::git(args);
        Ok(self.with.runner.run(&cmd)?.into_result(&cmd)?)
    }

    fn branches(&self) -> BranchManager<'a> {
        BranchManager::new(self.with.runner, self.config.app.remote.clone(), self.config.app.trunk.clone())
    }

    /// Validate the repository (offering to create it), restore settings,
    /// establish identity and credential-helper configuration, then refresh.
    pub fn init(&mut self) -> Result<()> {
        let stored = self.with.settings.load()?;
        if let Some(settings) = stored.as_ref().filter(|s| s.describes(&self.config.repo_path)) {
            settings.restore_into(&mut self.state);
            tracing::debug!("restored settings for this repository");
        }

        let mut needs_first_commit = false;
        match verify_repository(self.with.runner, &self.config.repo_path) {
            Ok(()) => {}
            Err(VcsError::NotARepository(path)) => {
                let question = format!("{} is not a repository. Create one?", path.display());
                if !self.with.prompter.confirm(&question)? {
                    return Err(VcsError::NotARepository(path).into());
                }
                self.git(["init"])?;
                needs_first_commit = true;
                tracing::info!(path = %path.display(), "initialised repository");
            }
            Err(err) => return Err(err.into()),
        }

        let repo_config = read_repo_config(self.with.runner, &self.config.app.remote)?;
        self.state.apply_config(&repo_config);

        let (identity, source) =
            self.resolve_identity(stored.as_ref().map(|s| &s.identity), &repo_config)?;
        if source != IdentitySource::RepositoryConfig
            && identity.email.is_some()
            && identity.email != repo_config.user_email
        {
            self.write_identity(&identity, self.config.app.store_scope)?;
        }
        self.state.user_identity = identity;

        if needs_first_commit {
            self.bootstrap()?;
        }

        if repo_config.credential_store.as_deref() != Some("plaintext") {
            self.git(["config", self.config.app.store_scope.flag(), "credential.credentialStore", "plaintext"])?;
        }

        self.refresh(self.config.app.auto_update)?;
        self.save()
    }

    fn bootstrap(&mut self) -> Result<()> {
        let root = &self.config.repo_path;
        let readme = root.join("README.md");
        if !readme.exists() {
            let title = root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "repository".to_string());
            self.with.filesystem.write_text(&readme, &format!("# {title}\n"))?;
        }
        ops::stage_all(self.with.runner)?;
        self.git(["commit", "-m", "first commit"])?;
        self.git(["branch", "-M", self.config.app.trunk.as_str()])?;
        if let Some(url) = &self.config.remote_url {
            self.git(["remote", "add", self.config.app.remote.as_str(), url.as_str()])?;
            self.state.remote_url = Some(url.clone());
        }
        tracing::info!(trunk = %self.config.app.trunk, "bootstrapped repository");
        Ok(())
    }

    /// Identity priority: explicit argument, environment account (only with an
    /// environment token), stored settings, repository config, then a prompt.
    pub fn resolve_identity(
        &self,
        stored: Option<&Identity>,
        repo_config: &RepoConfig,
    ) -> Result<(Identity, IdentitySource)> {
        if let Some(identity) = self.config.identity.as_ref().filter(|i| !i.is_empty()) {
            return Ok((identity.clone(), IdentitySource::Explicit));
        }
        if self.config.env_token.is_some() {
            if let Some(account) = &self.config.env_account {
                let identity = Identity {
                    name: repo_config.user_name.clone(),
                    email: Some(account.clone()),
                };
                return Ok((identity, IdentitySource::Environment));
            }
        }
        if let Some(identity) = stored.filter(|i| i.email.is_some()) {
            return Ok((identity.clone(), IdentitySource::StoredSettings));
        }
        if let Some(email) = &repo_config.user_email {
            let identity = Identity {
                name: repo_config.user_name.clone(),
                email: Some(email.clone()),
            };
            return Ok((identity, IdentitySource::RepositoryConfig));
        }

        let email = self
            .with
            .prompter
            .text_input("Account email for the remote: ")
            .map_err(|e| SyncError::IdentityUnavailable(e.to_string()))?;
        if email.is_empty() {
            return Err(SyncError::IdentityUnavailable("empty email".to_string()));
        }
        let name = match &repo_config.user_name {
            Some(name) => Some(name.clone()),
            None => self
                .with
                .prompter
                .text_input("Author name: ")
                .ok()
                .filter(|n| !n.is_empty()),
        };
        Ok((Identity { name, email: Some(email) }, IdentitySource::Prompt))
    }

    fn write_identity(&self, identity: &Identity, scope: StoreScope) -> Result<()> {
        if let Some(email) = &identity.email {
            self.git(["config", scope.flag(), "user.email", email.as_str()])?;
        }
        if let Some(name) = &identity.name {
            self.git(["config", scope.flag(), "user.name", name.as_str()])?;
        }
        Ok(())
    }

    /// Set and persist the author identity.
    pub fn set_identity(&mut self, identity: Identity, scope: StoreScope) -> Result<()> {
        self.write_identity(&identity, scope)?;
        tracing::info!(email = ?identity.email, "identity updated");
        self.state.user_identity = identity;
        self.save()
    }

    /// Account the credential is stored under.
    pub fn account(&self) -> String {
        let identity = &self.state.user_identity;
        identity
            .email
            .clone()
            .or_else(|| identity.name.clone())
            .unwrap_or_else(|| "default".to_string())
    }

    fn exposure_request(&self) -> ExposureRequest {
        ExposureRequest {
            service: self.config.app.credential_service.clone(),
            account: self.account(),
            token_file: self.config.app.token_file_path(),
            preset: self.config.token.clone().or_else(|| self.config.env_token.clone()),
        }
    }

    /// Read status and apply it to the state.
    pub fn refresh(&mut self, auto_update: bool) -> Result<StatusSnapshot> {
        let snapshot = StatusReader::new(self.with.runner, &self.config.app.remote).read(auto_update)?;
        self.state.refresh(&snapshot.report);
        Ok(snapshot)
    }

    pub fn status(&mut self) -> Result<StatusSnapshot> {
        self.refresh(self.config.app.auto_update)
    }

    /// Purge artifacts, expose the credential, commit if needed and push if
    /// needed. A rejected push is returned as-is and never forced here.
    pub fn push(&mut self, message: Option<&str>, force: bool) -> Result<PushOutcome> {
        housekeeping::purge(self.with.filesystem, &self.config.repo_path, &self.config.app.housekeeping_patterns);

        let request = self.exposure_request();
        let (vault, prompter) = (self.with.vault, self.with.prompter);
        let outcome = with_exposed_credential(vault, prompter, &request, |token| -> Result<PushOutcome> {
            let mut outcome = PushOutcome::default();
            self.refresh(false)?;

            if self.state.commit_needed {
                ops::stage_all(self.with.runner)?;
                ops::commit(self.with.runner, message.unwrap_or(DEFAULT_COMMIT_MESSAGE))?;
                self.state.mark_committed();
                outcome.committed = true;
                tracing::info!("committed local changes");
            }

            if self.state.push_needed || force {
                let upstream = match (&self.state.remote_branch_ref, &self.state.current_branch) {
                    (None, Some(branch)) => Some((self.config.app.remote.clone(), branch.clone())),
                    _ => None,
                };
                ops::push(
                    self.with.runner,
                    &PushRequest {
                        force,
                        upstream,
                        env: token.helper_env(),
                    },
                )?;
                self.state.mark_pushed();
                outcome.pushed = true;
            }
            Ok(outcome)
        })?;

        self.save()?;
        Ok(outcome)
    }

    pub fn pull(&mut self) -> Result<String> {
        let output = ops::pull(self.with.runner, None)?;
        self.state.mark_stale();
        self.refresh(false)?;
        Ok(output)
    }

    pub fn add(&mut self) -> Result<()> {
        ops::stage_all(self.with.runner)?;
        self.state.mark_stale();
        Ok(())
    }

    /// Commit when there is something to commit. Returns whether a commit was made.
    pub fn commit(&mut self, message: Option<&str>) -> Result<bool> {
        self.refresh(false)?;
        if !self.state.commit_needed {
            tracing::info!("nothing to commit");
            return Ok(false);
        }
        ops::stage_all(self.with.runner)?;
        ops::commit(self.with.runner, message.unwrap_or(DEFAULT_COMMIT_MESSAGE))?;
        self.state.mark_committed();
        Ok(true)
    }

    pub fn history(&self, revision: Option<&str>) -> Vec<CommitRecord> {
        history::read_history(self.with.runner, revision)
    }

    pub fn last_commit(&self) -> Option<CommitRecord> {
        history::last_commit(self.with.runner)
    }

    /// Merge `from` into `to` and push `to`, with the credential exposed.
    /// Unknown branch names fail before the credential is touched.
    pub fn merge(&mut self, from: &str, to: &str) -> Result<BranchLifecycle> {
        self.branches().ensure_on_remote(&[from, to])?;

        let request = self.exposure_request();
        let (vault, prompter) = (self.with.vault, self.with.prompter);
        let manager = self.branches();
        let state = &mut self.state;
        let lifecycle = with_exposed_credential(vault, prompter, &request, |token| -> Result<BranchLifecycle> {
            let manager = manager.with_push_env(token.helper_env());
            Ok(manager.merge(state, from, to)?)
        })?;
        self.save()?;
        Ok(lifecycle)
    }

    pub fn merge_main_into(&mut self, target: &str) -> Result<BranchLifecycle> {
        let lifecycle = self.branches().merge_main_into(&mut self.state, target)?;
        self.refresh(false)?;
        Ok(lifecycle)
    }

    /// Switch to `name`, creating it when forced or unknown to the remote.
    pub fn branch(&mut self, name: &str, force_create: bool) -> Result<BranchLifecycle> {
        let lifecycle = self.branches().switch_or_create(name, force_create)?;
        self.state.mark_stale();
        self.refresh(false)?;
        Ok(lifecycle)
    }

    /// Create `name`; fails when the remote already has it.
    pub fn create_branch(&mut self, name: &str) -> Result<BranchLifecycle> {
        let lifecycle = self.branches().create(name)?;
        self.state.mark_stale();
        self.refresh(false)?;
        Ok(lifecycle)
    }

    pub fn create_branch_from(&mut self, new: &str, source: &str) -> Result<BranchLifecycle> {
        let lifecycle = self.branches().create_from(new, source)?;
        self.state.mark_stale();
        self.refresh(false)?;
        Ok(lifecycle)
    }

    pub fn pull_branch(&mut self, name: &str) -> Result<BranchLifecycle> {
        let lifecycle = self.branches().pull_branch(name)?;
        self.state.mark_stale();
        self.refresh(false)?;
        Ok(lifecycle)
    }

    /// Delete a local branch after confirmation. Returns whether it was deleted.
    pub fn delete_branch(&mut self, name: &str) -> Result<bool> {
        if !self.with.prompter.confirm(&format!("Delete local branch {name}?"))? {
            return Ok(false);
        }
        self.branches().delete(name)?;
        Ok(true)
    }

    pub fn merge_sources(&self) -> Result<Listing<BTreeMap<String, RefEntry>>> {
        Ok(self.branches().merge_sources()?)
    }

    /// Persist the settings snapshot.
    pub fn save(&self) -> Result<()> {
        let settings = Settings::from_state(&self.state, &self.config.app.token_file_path());
        self.with.settings.save(&settings)
    }
}
