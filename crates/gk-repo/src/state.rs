// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory view of one repository and its derived sync flags.

use crate::repo_config::RepoConfig;
use crate::status::StatusReport;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Author identity used for commits and credential lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Identity {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: Some(email.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}

/// Repository state owned by a single orchestrator.
///
/// `commit_needed`, `push_needed` and `behind` are only meaningful after a
/// [`refresh`](Self::refresh); mutating operations mark them stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryState {
    pub path: PathBuf,
    pub remote_url: Option<String>,
    pub current_branch: Option<String>,
    pub remote_branch_ref: Option<String>,
    pub commit_needed: bool,
    pub push_needed: bool,
    pub behind: bool,
    pub format_version: Option<u32>,
    pub file_mode_tracking: bool,
    pub bare: bool,
    pub log_updates: bool,
    pub fetch_refspec: Option<String>,
    pub user_identity: Identity,
    status_recognized: bool,
    fresh: bool,
}

impl RepositoryState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            remote_url: None,
            current_branch: None,
            remote_branch_ref: None,
            commit_needed: false,
            push_needed: false,
            behind: false,
            format_version: None,
            file_mode_tracking: true,
            bare: false,
            log_updates: true,
            fetch_refspec: None,
            user_identity: Identity::default(),
            status_recognized: true,
            fresh: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply a parsed status report. Flags the report does not state keep
    /// their previous values; an unrecognised report is logged.
    /// A report for another branch replaces the tracking ref, clearing it
    /// when the new branch has no upstream.
    pub fn refresh(&mut self, report: &StatusReport) {
        match &report.branch {
            Some(branch) if self.current_branch.as_ref() != Some(branch) => {
                self.current_branch = Some(branch.clone());
                self.remote_branch_ref = report.upstream.clone();
            }
            _ => {
                if let Some(upstream) = &report.upstream {
                    self.remote_branch_ref = Some(upstream.clone());
                }
            }
        }
        if let Some(commit_needed) = report.commit_needed {
            self.commit_needed = commit_needed;
        }
        if let Some(push_needed) = report.push_needed {
            self.push_needed = push_needed;
        }
        self.behind = report.behind;
        self.status_recognized = report.is_recognized();
        self.fresh = true;

        if !self.status_recognized {
            tracing::warn!(
                phrasing = report.phrasing,
                "status report matched no known phrasing; keeping previous commit state"
            );
        }
        tracing::info!(
            branch = ?self.current_branch,
            commit_needed = self.commit_needed,
            push_needed = self.push_needed,
            behind = self.behind,
            "repository state refreshed"
        );
    }

    /// Copy values from the local repository configuration.
    pub fn apply_config(&mut self, config: &RepoConfig) {
        if config.format_version.is_some() {
            self.format_version = config.format_version;
        }
        if let Some(file_mode) = config.file_mode {
            self.file_mode_tracking = file_mode;
        }
        if let Some(bare) = config.bare {
            self.bare = bare;
        }
        if let Some(log_updates) = config.log_all_ref_updates {
            self.log_updates = log_updates;
        }
        if config.remote_url.is_some() {
            self.remote_url = config.remote_url.clone();
        }
        if config.fetch_refspec.is_some() {
            self.fetch_refspec = config.fetch_refspec.clone();
        }
        if self.remote_branch_ref.is_none() {
            if let Some(branch) = &self.current_branch {
                if let Some(remote) = config.branch_remotes.get(branch) {
                    self.remote_branch_ref = Some(format!("{remote}/{branch}"));
                }
            }
        }
        if self.user_identity.name.is_none() {
            self.user_identity.name = config.user_name.clone();
        }
        if self.user_identity.email.is_none() {
            self.user_identity.email = config.user_email.clone();
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.commit_needed || self.push_needed
    }

    /// Whether the derived flags reflect the latest refresh.
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub fn is_status_recognized(&self) -> bool {
        self.status_recognized
    }

    /// Invalidate derived flags after checkout, merge or pull.
    pub fn mark_stale(&mut self) {
        self.fresh = false;
    }

    /// Record a successful commit: nothing left to commit, history to push.
    pub fn mark_committed(&mut self) {
        self.commit_needed = false;
        self.push_needed = true;
    }

    pub fn mark_pushed(&mut self) {
        self.push_needed = false;
        self.fresh = false;
    }
}
