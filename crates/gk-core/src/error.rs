// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for sync orchestration

use gk_credentials::CredentialError;
use gk_repo::{BranchLifecycle, VcsError};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for orchestration
pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("settings file {path}: {message}")]
    Settings { path: PathBuf, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("no identity available: {0}")]
    IdentityUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Whether the remote refused a push for diverged history.
    pub fn is_rejected_push(&self) -> bool {
        matches!(self, SyncError::Vcs(err) if err.is_rejected_push())
    }

    /// `ConflictReported` when a merge stopped on conflicts.
    pub fn merge_lifecycle(&self) -> Option<BranchLifecycle> {
        match self {
            SyncError::Vcs(err) => BranchLifecycle::after_failed_merge(err),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for SyncError {
    fn from(err: config::ConfigError) -> Self {
        SyncError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Config(err.to_string())
    }
}
