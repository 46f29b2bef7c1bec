// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use gk_repo::testing::ScriptedRunner;
use gk_repo::{BranchLifecycle, BranchManager, CommandOutput, MockCommandRunner, RepositoryState, VcsError};

const REMOTES_MAIN_ONLY: &str = "  origin/HEAD -> origin/main\n  origin/main\n";
const CLEAN: &str = "On branch main\nYour branch is up to date with 'origin/main'.\nnothing to commit, working tree clean";

#[test]
fn merge_refuses_unknown_branch_without_mutating() {
    let mut runner = MockCommandRunner::new();
    // Only the read-only enumeration may run; any other call fails the mock.
    runner
        .expect_run()
        .withf(|cmd| cmd.args() == ["branch", "--remotes"])
        .times(1)
        .returning(|_| Ok(CommandOutput::ok(REMOTES_MAIN_ONLY)));

    let manager = BranchManager::new(&runner, "origin", "main");
    let mut state = RepositoryState::new("/repo");
    let err = manager.merge(&mut state, "feature", "main").unwrap_err();
    assert!(matches!(err, VcsError::UnknownBranch(ref name) if name == "feature"));
}

#[test]
fn merge_refuses_unknown_target() {
    let runner = ScriptedRunner::new().on(&["branch", "--remotes"], CommandOutput::ok(REMOTES_MAIN_ONLY));
    let manager = BranchManager::new(&runner, "origin", "main");
    let mut state = RepositoryState::new("/repo");

    let err = manager.merge(&mut state, "main", "release").unwrap_err();
    assert!(matches!(err, VcsError::UnknownBranch(ref name) if name == "release"));
    assert_eq!(runner.command_lines(), vec!["git branch --remotes".to_string()]);
}

#[test]
fn merge_commits_dirty_tree_then_merges_and_pushes() {
    let runner = ScriptedRunner::new()
        .on(&["branch", "--remotes"], CommandOutput::ok("  origin/main\n  origin/feature\n"))
        .on(&["status"], CommandOutput::ok("On branch feature\nChanges not staged for commit:\n\tmodified: a.rs"));
    let manager = BranchManager::new(&runner, "origin", "main")
        .with_push_env(vec![("GCM_PLAINTEXT_STORE_PATH".into(), "/tmp/tok".into())]);
    let mut state = RepositoryState::new("/repo");

    let lifecycle = manager.merge(&mut state, "feature", "main").unwrap();
    assert_eq!(lifecycle, BranchLifecycle::Merged);
    assert!(lifecycle.is_terminal());

    assert_eq!(
        runner.command_lines(),
        vec![
            "git branch --remotes",
            "git status",
            "git add .",
            "git commit -m Merging feature into main.",
            "git checkout main",
            "git merge feature",
            "git push --set-upstream origin main",
        ]
    );
    let push = runner.calls().pop().unwrap();
    assert_eq!(push.envs()[0].0, "GCM_PLAINTEXT_STORE_PATH");
    assert!(!state.push_needed);
}

#[test]
fn merge_failure_reports_conflict_and_does_not_push() {
    let runner = ScriptedRunner::new()
        .on(&["branch", "--remotes"], CommandOutput::ok("  origin/main\n  origin/feature\n"))
        .on(&["status"], CommandOutput::ok(CLEAN))
        .on(
            &["merge"],
            CommandOutput::failed("CONFLICT (content): Merge conflict in src/lib.rs\nAutomatic merge failed"),
        );
    let manager = BranchManager::new(&runner, "origin", "main");
    let mut state = RepositoryState::new("/repo");

    let err = manager.merge(&mut state, "feature", "main").unwrap_err();
    match &err {
        VcsError::MergeConflict { from, to, diagnostic } => {
            assert_eq!((from.as_str(), to.as_str()), ("feature", "main"));
            assert!(diagnostic.contains("Merge conflict in src/lib.rs"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let lifecycle = BranchLifecycle::after_failed_merge(&err).unwrap();
    assert_eq!(lifecycle, BranchLifecycle::ConflictReported);
    assert!(lifecycle.is_terminal());
    assert_eq!(runner.count(&["push"]), 0);
    assert_eq!(runner.count(&["commit"]), 0);
}

#[test]
fn merge_push_rejection_is_distinct() {
    let runner = ScriptedRunner::new()
        .on(&["branch", "--remotes"], CommandOutput::ok("  origin/main\n  origin/feature\n"))
        .on(&["status"], CommandOutput::ok(CLEAN))
        .on(&["push"], CommandOutput::failed(" ! [rejected]        main -> main (fetch first)"));
    let manager = BranchManager::new(&runner, "origin", "main");
    let mut state = RepositoryState::new("/repo");

    let err = manager.merge(&mut state, "feature", "main").unwrap_err();
    assert!(err.is_rejected_push());
}

#[test]
fn switch_creates_branch_absent_from_remote() {
    let runner = ScriptedRunner::new().on(&["branch", "--remotes"], CommandOutput::ok(REMOTES_MAIN_ONLY));
    let manager = BranchManager::new(&runner, "origin", "main");

    let lifecycle = manager.switch_or_create("topic/new", false).unwrap();
    assert_eq!(lifecycle, BranchLifecycle::Local);
    assert_eq!(
        runner.command_lines(),
        vec!["git branch --remotes", "git branch topic/new", "git checkout topic/new"]
    );
}

#[test]
fn switch_reuses_existing_local_branch() {
    let runner = ScriptedRunner::new()
        .on(&["branch", "--remotes"], CommandOutput::ok(REMOTES_MAIN_ONLY))
        .on(&["branch", "wip"], CommandOutput::failed("fatal: a branch named 'wip' already exists"));
    let manager = BranchManager::new(&runner, "origin", "main");

    assert_eq!(manager.switch_or_create("wip", false).unwrap(), BranchLifecycle::Local);
    assert_eq!(runner.count(&["checkout", "wip"]), 1);
}

#[test]
fn forced_create_skips_checkout_of_remote_branch() {
    let runner = ScriptedRunner::new().on(&["branch", "--remotes"], CommandOutput::ok(REMOTES_MAIN_ONLY));
    let manager = BranchManager::new(&runner, "origin", "main");

    assert_eq!(manager.switch_or_create("main", true).unwrap(), BranchLifecycle::Local);
    assert_eq!(runner.count(&["branch", "main"]), 1);
}

#[test]
fn merge_main_into_working_branch() {
    let runner = ScriptedRunner::new().on(&["branch", "--remotes"], CommandOutput::ok("  origin/main\n  origin/dev\n"));
    let manager = BranchManager::new(&runner, "origin", "main");
    let mut state = RepositoryState::new("/repo");

    assert_eq!(manager.merge_main_into(&mut state, "dev").unwrap(), BranchLifecycle::Merged);
    assert_eq!(runner.command_lines().last().map(String::as_str), Some("git merge main"));
    assert!(!state.is_fresh());
}

#[test]
fn pull_branch_then_switches() {
    let runner = ScriptedRunner::new().on(&["branch", "--remotes"], CommandOutput::ok("  origin/main\n  origin/dev\n"));
    let manager = BranchManager::new(&runner, "origin", "main");

    let lifecycle = manager.pull_branch("dev").unwrap();
    assert_eq!(lifecycle, BranchLifecycle::Tracked { remote: "origin/dev".into() });
    assert_eq!(runner.command_lines()[0], "git pull origin dev");
}

#[test]
fn merge_sources_unavailable_when_ls_remote_fails() {
    let runner = ScriptedRunner::new().on(&["ls-remote"], CommandOutput::failed("fatal: could not read from remote"));
    let manager = BranchManager::new(&runner, "origin", "main");
    let listing = manager.merge_sources().unwrap();
    assert!(!listing.is_available());
}
