// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Remote reference and branch enumeration.

use crate::error::VcsResult;
use crate::runner::{CommandRunner, VcsCommand};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Result of an enumeration whose command may fail as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing<T> {
    Available(T),
    Unavailable { diagnostic: String },
}

impl<T> Listing<T> {
    pub fn available(self) -> Option<T> {
        match self {
            Listing::Available(value) => Some(value),
            Listing::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Listing::Available(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefKind {
    Head,
    Branch,
    PullRequest,
}

/// A merge source advertised by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefEntry {
    pub id: String,
    pub name: String,
    pub kind: RefKind,
    pub path: String,
    pub pull_request_id: Option<u64>,
}

fn classify(id: &str, path: &str) -> Option<RefEntry> {
    let entry = |name: &str, kind, pull_request_id| RefEntry {
        id: id.to_string(),
        name: name.to_string(),
        kind,
        path: path.to_string(),
        pull_request_id,
    };

    if path == "HEAD" {
        return Some(entry("HEAD", RefKind::Head, None));
    }
    if let Some(branch) = path.strip_prefix("refs/heads/") {
        return Some(entry(branch, RefKind::Branch, None));
    }
    if let Some(rest) = path.strip_prefix("refs/pull/") {
        let (number, name) = rest.split_once('/')?;
        let number = number.parse().ok()?;
        return Some(entry(name, RefKind::PullRequest, Some(number)));
    }
    None
}

/// Parse `git ls-remote` output into entries keyed by object id.
/// Later lines for the same id replace earlier ones.
pub fn parse_remote_refs(text: &str) -> BTreeMap<String, RefEntry> {
    let mut refs = BTreeMap::new();
    for line in text.lines() {
        let mut fields = line.split_whitespace();
        let (Some(id), Some(path)) = (fields.next(), fields.next()) else {
            continue;
        };
        if let Some(entry) = classify(id, path) {
            refs.insert(entry.id.clone(), entry);
        }
    }
    refs
}

/// Parse `git branch --remotes` output into branch names without the remote prefix.
pub fn parse_remote_branches(text: &str) -> BTreeSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains(" -> "))
        .map(|line| match line.split_once('/') {
            Some((_remote, branch)) => branch.to_string(),
            None => line.to_string(),
        })
        .collect()
}

pub fn list_remote_refs(
    runner: &dyn CommandRunner,
    remote: &str,
) -> VcsResult<Listing<BTreeMap<String, RefEntry>>> {
    let output = runner.run(&VcsCommand::git(["ls-remote", remote]))?;
    Ok(if output.success {
        Listing::Available(parse_remote_refs(&output.output))
    } else {
        Listing::Unavailable {
            diagnostic: output.output,
        }
    })
}

pub fn list_remote_branches(runner: &dyn CommandRunner) -> VcsResult<Listing<BTreeSet<String>>> {
    let output = runner.run(&VcsCommand::git(["branch", "--remotes"]))?;
    Ok(if output.success {
        Listing::Available(parse_remote_branches(&output.output))
    } else {
        Listing::Unavailable {
            diagnostic: output.output,
        }
    })
}
