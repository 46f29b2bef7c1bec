// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Git plumbing for gitkeeper.
//!
//! This crate runs git through a guarded [`CommandRunner`], turns git's
//! human-readable reports into structured values and drives branch and merge
//! workflows on top of them.

pub mod branch;
pub mod error;
pub mod history;
pub mod ops;
pub mod refs;
pub mod repo_config;
pub mod runner;
pub mod state;
pub mod status;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use branch::{valid_branch_name, BranchLifecycle, BranchManager};
pub use error::{VcsError, VcsResult};
pub use history::{last_commit, parse_log, read_history, CommitRecord};
pub use ops::{is_rejection, PushRequest, DEFAULT_COMMIT_MESSAGE};
pub use refs::{parse_remote_branches, parse_remote_refs, Listing, RefEntry, RefKind};
pub use repo_config::{parse_config_listing, read_repo_config, RepoConfig};
pub use runner::{CommandOutput, CommandRunner, ProcessRunner, VcsCommand, GIT};
pub use state::{Identity, RepositoryState};
pub use status::{parse_status, verify_repository, StatusPhrasing, StatusReader, StatusReport, StatusSnapshot, GIT_EN_V2};

#[cfg(any(test, feature = "test-support"))]
pub use runner::MockCommandRunner;
