// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for repository operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for repository operations
pub type VcsResult<T> = std::result::Result<T, VcsError>;

/// Errors that can occur while driving the version-control program
#[derive(Debug, Error)]
pub enum VcsError {
    /// The program ran and exited non-zero; `output` is its diagnostic text verbatim.
    #[error("command `{command}` failed: {output}")]
    CommandFailure { command: String, output: String },

    #[error("refusing to run command that does not invoke `{program}`: {command}")]
    InvalidCommand { program: String, command: String },

    #[error("not a repository: {0}")]
    NotARepository(PathBuf),

    #[error("branch already exists: {0}")]
    BranchExists(String),

    #[error("unknown branch: {0}")]
    UnknownBranch(String),

    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    /// The remote refused the push because its history diverged from ours.
    #[error("push rejected by remote: {0}")]
    RejectedPush(String),

    #[error("merge of {from} into {to} failed: {diagnostic}")]
    MergeConflict {
        from: String,
        to: String,
        diagnostic: String,
    },

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VcsError {
    /// Whether the caller may reasonably retry with a forced push.
    pub fn is_rejected_push(&self) -> bool {
        matches!(self, VcsError::RejectedPush(_))
    }
}
