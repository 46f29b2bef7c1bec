// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use gk_cli::{clone_directory, is_remote_url, Cli, Commands, Parser};
use gk_core::StoreScope;
use gk_logging::CliLogLevel;
use serde_json::json;
use std::path::{Path, PathBuf};

#[test]
fn push_flags() {
    let cli = Cli::try_parse_from(["gk", "push", "-m", "wip", "--yes"]).unwrap();
    assert_eq!(
        cli.command,
        Commands::Push {
            message: Some("wip".into()),
            force: false,
            yes: true,
            target: None
        }
    );
}

#[test]
fn positional_target_follows_command() {
    let cli = Cli::try_parse_from(["gk", "status", "https://github.com/acme/widgets.git"]).unwrap();
    assert_eq!(cli.command.target(), Some("https://github.com/acme/widgets.git"));

    let cwd = tempfile::tempdir().unwrap();
    let target = cli.target(cwd.path());
    assert_eq!(target.url.as_deref(), Some("https://github.com/acme/widgets.git"));
    assert_eq!(target.path, cwd.path().join("widgets"));

    let cli = Cli::try_parse_from(["gk", "push", "work/widgets", "-m", "wip"]).unwrap();
    let target = cli.target(Path::new("/home/ada"));
    assert_eq!(target.path, PathBuf::from("/home/ada/work/widgets"));
    assert_eq!(target.url, None);

    let cli = Cli::try_parse_from(["gk", "commit", "tidy up", "work/widgets"]).unwrap();
    assert_eq!(
        cli.command,
        Commands::Commit {
            message: Some("tidy up".into()),
            target: Some("work/widgets".into())
        }
    );
}

#[test]
fn no_target_means_current_directory() {
    let cli = Cli::try_parse_from(["gk", "add"]).unwrap();
    assert_eq!(cli.command, Commands::Add { target: None });
    let target = cli.target(Path::new("/home/ada/widgets"));
    assert_eq!(target.path, PathBuf::from("/home/ada/widgets"));
    assert!(Cli::try_parse_from(["gk", "work/widgets", "status"]).is_err());
}

#[test]
fn url_inside_existing_checkout_stays_in_place() {
    let cwd = tempfile::tempdir().unwrap();
    std::fs::create_dir(cwd.path().join(".git")).unwrap();
    let cli = Cli::try_parse_from(["gk", "--url", "https://github.com/acme/widgets", "status"]).unwrap();
    assert_eq!(cli.target(cwd.path()).path, cwd.path());
}

#[test]
fn global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "gk",
        "merge",
        "feature",
        "--into",
        "release",
        "--log-level",
        "debug",
        "--trunk",
        "master",
        "--no-auto-update",
    ])
    .unwrap();
    assert_eq!(
        cli.command,
        Commands::Merge {
            from: "feature".into(),
            into: Some("release".into())
        }
    );
    assert_eq!(cli.logging.log_level, Some(CliLogLevel::Debug));
    assert_eq!(cli.to_json_overrides(), json!({"trunk": "master", "auto-update": false}));
}

#[test]
fn branch_options_conflict() {
    assert!(Cli::try_parse_from(["gk", "branch", "x", "--create", "--delete"]).is_err());
    let cli = Cli::try_parse_from(["gk", "branch", "x", "--from", "v1.0"]).unwrap();
    assert!(matches!(cli.command, Commands::Branch { from: Some(ref f), .. } if f == "v1.0"));
}

#[test]
fn identity_scope_follows_flag() {
    let cli = Cli::try_parse_from(["gk", "--email", "ada@example.com", "identity", "--global"]).unwrap();
    assert_eq!(cli.identity_scope(), Some(StoreScope::Global));
    assert_eq!(cli.email.as_deref(), Some("ada@example.com"));
    assert_eq!(Cli::try_parse_from(["gk", "status"]).unwrap().identity_scope(), None);
}

#[test]
fn log_options() {
    let cli = Cli::try_parse_from(["gk", "log", "--last"]).unwrap();
    assert_eq!(
        cli.command,
        Commands::Log {
            last: true,
            json: false,
            revision: None
        }
    );
    assert!(Cli::try_parse_from(["gk"]).is_err());
}

#[test]
fn remote_urls_and_clone_directories() {
    assert!(is_remote_url("https://github.com/acme/widgets.git"));
    assert!(is_remote_url("git@github.com:acme/widgets.git"));
    assert!(!is_remote_url("./widgets"));

    let base = Path::new("/src");
    assert_eq!(clone_directory(base, "https://github.com/acme/widgets.git"), base.join("widgets"));
    assert_eq!(clone_directory(base, "git@github.com:widgets.git"), base.join("widgets"));
    assert_eq!(clone_directory(base, "https://github.com/acme/widgets/"), base.join("widgets"));
}
