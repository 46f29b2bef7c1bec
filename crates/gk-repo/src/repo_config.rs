// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Repository-local configuration as listed by `git config --local -l`.

use crate::error::VcsResult;
use crate::runner::{CommandRunner, VcsCommand};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RepoConfig {
    pub format_version: Option<u32>,
    pub file_mode: Option<bool>,
    pub bare: Option<bool>,
    pub log_all_ref_updates: Option<bool>,
    pub remote_url: Option<String>,
    pub fetch_refspec: Option<String>,
    /// `branch.<name>.remote` entries.
    pub branch_remotes: BTreeMap<String, String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub credential_store: Option<String>,
}

/// Parse a git boolean. Unrecognised text yields `None`.
pub fn parse_git_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" | "" => Some(false),
        _ => None,
    }
}

/// Parse `key=value` lines. Remote settings are read for `remote` only.
pub fn parse_config_listing(text: &str, remote: &str) -> RepoConfig {
    let mut config = RepoConfig::default();
    let remote_url = format!("remote.{remote}.url").to_ascii_lowercase();
    let remote_fetch = format!("remote.{remote}.fetch").to_ascii_lowercase();

    for line in text.lines() {
        let Some((raw_key, value)) = line.split_once('=') else {
            continue;
        };
        let raw_key = raw_key.trim();
        // Section and variable names are case-insensitive; subsections are not.
        let key = raw_key.to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "core.repositoryformatversion" => config.format_version = value.parse().ok(),
            "core.filemode" => config.file_mode = parse_git_bool(value),
            "core.bare" => config.bare = parse_git_bool(value),
            "core.logallrefupdates" => config.log_all_ref_updates = parse_git_bool(value),
            "user.name" => config.user_name = Some(value.to_string()),
            "user.email" => config.user_email = Some(value.to_string()),
            "credential.credentialstore" => config.credential_store = Some(value.to_string()),
            k if k == remote_url => config.remote_url = Some(value.to_string()),
            k if k == remote_fetch => config.fetch_refspec = Some(value.to_string()),
            _ => {
                if let Some(branch) = raw_key
                    .strip_prefix("branch.")
                    .and_then(|rest| rest.strip_suffix(".remote"))
                {
                    config.branch_remotes.insert(branch.to_string(), value.to_string());
                }
            }
        }
    }

    config
}

/// Read local configuration. An unreadable configuration yields defaults.
pub fn read_repo_config(runner: &dyn CommandRunner, remote: &str) -> VcsResult<RepoConfig> {
    let cmd = VcsCommand::git(["config", "--local", "-l"]);
    let output = runner.run(&cmd)?;
    if output.success {
        Ok(parse_config_listing(&output.output, remote))
    } else {
        tracing::warn!(command = %cmd, output = %output.output, "local configuration unavailable");
        Ok(RepoConfig::default())
    }
}
