// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Branch creation, switching and merge workflows.

use crate::error::{VcsError, VcsResult};
use crate::ops::{self, PushRequest};
use crate::refs::{self, Listing, RefEntry};
use crate::runner::{CommandRunner, VcsCommand};
use crate::state::RepositoryState;
use crate::status::StatusReader;
use std::collections::{BTreeMap, BTreeSet};

/// Where a branch stands in the create → push → merge workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchLifecycle {
    Unknown,
    Local,
    Tracked { remote: String },
    Merged,
    /// Needs manual conflict resolution before a retry.
    ConflictReported,
}

impl BranchLifecycle {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BranchLifecycle::Merged | BranchLifecycle::ConflictReported)
    }

    /// State a failed merge leaves the target branch in. `None` when the
    /// failure is not a merge conflict.
    pub fn after_failed_merge(err: &VcsError) -> Option<Self> {
        matches!(err, VcsError::MergeConflict { .. }).then_some(BranchLifecycle::ConflictReported)
    }
}

/// Check a branch name against git's ref-format rules.
pub fn valid_branch_name(name: &str) -> bool {
    const FORBIDDEN: &[char] = &[' ', '~', '^', ':', '?', '*', '[', '\\'];

    !name.is_empty()
        && name != "@"
        && !name.starts_with(['-', '/', '.'])
        && !name.ends_with(['/', '.'])
        && !name.ends_with(".lock")
        && !name.contains("..")
        && !name.contains("//")
        && !name.contains("@{")
        && !name.contains("/.")
        && !name.chars().any(|c| c.is_control() || FORBIDDEN.contains(&c))
}

/// Drives branch workflows through a borrowed runner.
pub struct BranchManager<'a> {
    runner: &'a dyn CommandRunner,
    remote: String,
    trunk: String,
    push_env: Vec<(String, String)>,
}

impl<'a> BranchManager<'a> {
    pub fn new(runner: &'a dyn CommandRunner, remote: impl Into<String>, trunk: impl Into<String>) -> Self {
        Self {
            runner,
            remote: remote.into(),
            trunk: trunk.into(),
            push_env: Vec::new(),
        }
    }

    /// Environment passed to pushes issued by [`merge`](Self::merge).
    pub fn with_push_env(mut self, env: Vec<(String, String)>) -> Self {
        self.push_env = env;
        self
    }

    pub fn trunk(&self) -> &str {
        &self.trunk
    }

    fn run_checked<I, S>(&self, args: I) -> VcsResult<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cmd = VcsCommand::git(args);
        self.runner.run(&cmd)?.into_result(&cmd)
    }

    /// Branch names known on the remote, without the remote prefix.
    pub fn remote_branches(&self) -> VcsResult<BTreeSet<String>> {
        match refs::list_remote_branches(self.runner)? {
            Listing::Available(branches) => Ok(branches),
            Listing::Unavailable { diagnostic } => Err(VcsError::CommandFailure {
                command: "git branch --remotes".to_string(),
                output: diagnostic,
            }),
        }
    }

    /// Fail with `UnknownBranch` for the first name the remote does not have.
    pub fn ensure_on_remote(&self, names: &[&str]) -> VcsResult<()> {
        let remote = self.remote_branches()?;
        match names.iter().find(|name| !remote.contains(**name)) {
            Some(missing) => Err(VcsError::UnknownBranch(missing.to_string())),
            None => Ok(()),
        }
    }

    /// Merge sources advertised by the remote.
    pub fn merge_sources(&self) -> VcsResult<Listing<BTreeMap<String, RefEntry>>> {
        refs::list_remote_refs(self.runner, &self.remote)
    }

    /// Name of the checked-out branch; `None` when HEAD is detached.
    pub fn current_branch(&self) -> VcsResult<Option<String>> {
        let name = self.run_checked(["branch", "--show-current"])?;
        let name = name.trim();
        Ok((!name.is_empty()).then(|| name.to_string()))
    }

    fn ensure_valid(name: &str) -> VcsResult<()> {
        if valid_branch_name(name) {
            Ok(())
        } else {
            Err(VcsError::InvalidBranchName(name.to_string()))
        }
    }

    /// Create `name` and switch to it. Fails when the remote already has it.
    pub fn create(&self, name: &str) -> VcsResult<BranchLifecycle> {
        Self::ensure_valid(name)?;
        if self.remote_branches()?.contains(name) {
            return Err(VcsError::BranchExists(name.to_string()));
        }
        self.run_checked(["branch", name])?;
        self.run_checked(["checkout", name])?;
        tracing::info!(branch = name, "created branch");
        Ok(BranchLifecycle::Local)
    }

    /// Create `name` when forced or unknown to the remote; otherwise check it out.
    pub fn switch_or_create(&self, name: &str, force_create: bool) -> VcsResult<BranchLifecycle> {
        Self::ensure_valid(name)?;

        let on_remote = self.remote_branches()?.contains(name);
        if force_create || !on_remote {
            let cmd = VcsCommand::git(["branch", name]);
            let created = self.runner.run(&cmd)?;
            if !created.success {
                if created.output.contains("already exists") {
                    tracing::debug!(branch = name, "local branch already exists");
                } else {
                    return Err(VcsError::CommandFailure {
                        command: cmd.display(),
                        output: created.output,
                    });
                }
            }
            self.run_checked(["checkout", name])?;
            tracing::info!(branch = name, "switched to local branch");
            return Ok(BranchLifecycle::Local);
        }

        self.run_checked(["checkout", name])?;
        tracing::info!(branch = name, "switched to tracked branch");
        Ok(BranchLifecycle::Tracked {
            remote: format!("{}/{}", self.remote, name),
        })
    }

    /// Merge `from` into `to` and push `to` upstream.
    ///
    /// Both branches must exist on the remote; otherwise `UnknownBranch` is
    /// returned before any mutating command runs. Uncommitted work is
    /// committed first. A failed merge is reported as
    /// [`VcsError::MergeConflict`] and left for manual resolution; see
    /// [`BranchLifecycle::after_failed_merge`].
    pub fn merge(&self, state: &mut RepositoryState, from: &str, to: &str) -> VcsResult<BranchLifecycle> {
        self.ensure_on_remote(&[from, to])?;

        let snapshot = StatusReader::new(self.runner, &self.remote).read(false)?;
        state.refresh(&snapshot.report);
        if state.commit_needed {
            ops::stage_all(self.runner)?;
            ops::commit(self.runner, &format!("Merging {from} into {to}."))?;
            state.mark_committed();
        }

        self.run_checked(["checkout", to])?;
        state.mark_stale();

        let cmd = VcsCommand::git(["merge", from]);
        let merged = self.runner.run(&cmd)?;
        if !merged.success {
            tracing::warn!(from, to, "merge failed; manual resolution required");
            return Err(VcsError::MergeConflict {
                from: from.to_string(),
                to: to.to_string(),
                diagnostic: merged.output,
            });
        }

        ops::push(
            self.runner,
            &PushRequest {
                force: false,
                upstream: Some((self.remote.clone(), to.to_string())),
                env: self.push_env.clone(),
            },
        )?;
        state.mark_pushed();
        tracing::info!(from, to, "merged and pushed");
        Ok(BranchLifecycle::Merged)
    }

    /// Merge the trunk into `target` to keep a working branch current.
    pub fn merge_main_into(&self, state: &mut RepositoryState, target: &str) -> VcsResult<BranchLifecycle> {
        self.switch_or_create(target, false)?;
        state.mark_stale();

        let cmd = VcsCommand::git(["merge", self.trunk.as_str()]);
        let merged = self.runner.run(&cmd)?;
        if merged.success {
            tracing::info!(trunk = %self.trunk, target, "merged trunk");
            Ok(BranchLifecycle::Merged)
        } else {
            Err(VcsError::MergeConflict {
                from: self.trunk.clone(),
                to: target.to_string(),
                diagnostic: merged.output,
            })
        }
    }

    /// Delete a fully merged local branch.
    pub fn delete(&self, name: &str) -> VcsResult<()> {
        Self::ensure_valid(name)?;
        self.run_checked(["branch", "-d", name])?;
        tracing::info!(branch = name, "deleted branch");
        Ok(())
    }

    /// Pull `name` from the remote and switch to it.
    pub fn pull_branch(&self, name: &str) -> VcsResult<BranchLifecycle> {
        Self::ensure_valid(name)?;
        ops::pull(self.runner, Some((self.remote.as_str(), name)))?;
        self.switch_or_create(name, false)
    }

    /// Create `new` starting at `source` and switch to it.
    pub fn create_from(&self, new: &str, source: &str) -> VcsResult<BranchLifecycle> {
        Self::ensure_valid(new)?;
        self.run_checked(["checkout", "-b", new, source])?;
        tracing::info!(branch = new, source, "created branch from source");
        Ok(BranchLifecycle::Local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, MockCommandRunner};

    #[test]
    fn branch_name_rules() {
        for ok in ["main", "feature/login", "fix-12", "release_1.2"] {
            assert!(valid_branch_name(ok), "{ok}");
        }
        for bad in ["", "-x", "a..b", "a b", "x.lock", "a//b", "a/", "a@{1}", "what?"] {
            assert!(!valid_branch_name(bad), "{bad}");
        }
    }

    #[test]
    fn lifecycle_terminal_states() {
        assert!(BranchLifecycle::Merged.is_terminal());
        assert!(BranchLifecycle::ConflictReported.is_terminal());
        assert!(!BranchLifecycle::Local.is_terminal());
        assert!(!BranchLifecycle::Tracked { remote: "origin/x".into() }.is_terminal());
    }

    #[test]
    fn only_conflicts_report_a_lifecycle() {
        let conflict = VcsError::MergeConflict {
            from: "feature".into(),
            to: "main".into(),
            diagnostic: "CONFLICT (content)".into(),
        };
        assert_eq!(
            BranchLifecycle::after_failed_merge(&conflict),
            Some(BranchLifecycle::ConflictReported)
        );
        assert_eq!(
            BranchLifecycle::after_failed_merge(&VcsError::UnknownBranch("nope".into())),
            None
        );
    }

    #[test]
    fn create_refuses_existing_remote_branch() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|cmd| cmd.has_args_prefix(&["branch", "--remotes"]))
            .times(1)
            .returning(|_| Ok(CommandOutput::ok("  origin/main\n  origin/feature")));

        let manager = BranchManager::new(&runner, "origin", "main");
        let err = manager.create("feature").unwrap_err();
        assert!(matches!(err, VcsError::BranchExists(name) if name == "feature"));
    }

    #[test]
    fn switch_checks_out_tracked_branch() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|cmd| cmd.has_args_prefix(&["branch", "--remotes"]))
            .returning(|_| Ok(CommandOutput::ok("  origin/main\n  origin/feature")));
        runner
            .expect_run()
            .withf(|cmd| cmd.args() == ["checkout", "feature"])
            .times(1)
            .returning(|_| Ok(CommandOutput::ok("")));

        let manager = BranchManager::new(&runner, "origin", "main");
        let lifecycle = manager.switch_or_create("feature", false).unwrap();
        assert_eq!(lifecycle, BranchLifecycle::Tracked { remote: "origin/feature".into() });
    }

    #[test]
    fn invalid_names_issue_no_commands() {
        let runner = MockCommandRunner::new();
        let manager = BranchManager::new(&runner, "origin", "main");
        assert!(matches!(manager.create("bad name"), Err(VcsError::InvalidBranchName(_))));
    }

    #[test]
    fn current_branch_detached_is_none() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_| Ok(CommandOutput::ok("\n")));
        let manager = BranchManager::new(&runner, "origin", "main");
        assert_eq!(manager.current_branch().unwrap(), None);
    }
}
