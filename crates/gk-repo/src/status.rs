// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Parsing of human-readable `git status` reports.
//!
//! Status classification relies on the exact phrasing git prints, which varies
//! with version and locale. The phrase table is therefore versioned
//! ([`StatusPhrasing`]) and a report that matches none of the commit-state
//! phrases is flagged as unrecognised instead of silently defaulting.

use crate::error::{VcsError, VcsResult};
use crate::runner::{CommandRunner, VcsCommand};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Versioned table of the phrases the classifier looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPhrasing {
    pub version: &'static str,
    pub branch_header: &'static str,
    pub up_to_date: &'static str,
    pub ahead: &'static str,
    pub behind: &'static str,
    pub diverged: &'static str,
    pub untracked_header: &'static str,
    pub clean: &'static [&'static str],
    pub dirty: &'static [&'static str],
}

/// English phrasing printed by git 2.x.
pub const GIT_EN_V2: StatusPhrasing = StatusPhrasing {
    version: "git-2.x/en",
    branch_header: "On branch ",
    up_to_date: "is up to date with",
    ahead: "Your branch is ahead of ",
    behind: "Your branch is behind",
    diverged: "have diverged",
    untracked_header: "Untracked files:",
    clean: &["nothing to commit", "working tree clean"],
    dirty: &[
        "untracked files present",
        "Changes not staged for commit",
        "Changes to be committed",
    ],
};

/// Structured view of one status report. `None` means "not stated".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusReport {
    pub branch: Option<String>,
    /// Upstream ref such as `origin/main`, when the report names one.
    pub upstream: Option<String>,
    pub commit_needed: Option<bool>,
    pub push_needed: Option<bool>,
    pub behind: bool,
    pub diverged: bool,
    pub phrasing: &'static str,
}

impl StatusReport {
    /// A report is recognised when it stated the working tree's commit state.
    pub fn is_recognized(&self) -> bool {
        self.commit_needed.is_some()
    }
}

fn quoted_ref() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"'([^']+)'").expect("static regex"))
}

/// Parse a status report using the current phrasing table.
pub fn parse_status(text: &str) -> StatusReport {
    parse_status_with(&GIT_EN_V2, text)
}

/// Parse a status report. Lines are scanned in order and later matches win.
pub fn parse_status_with(phrasing: &StatusPhrasing, text: &str) -> StatusReport {
    let mut report = StatusReport {
        phrasing: phrasing.version,
        ..Default::default()
    };

    for line in text.lines() {
        let line = line.trim();

        if let Some(branch) = line.strip_prefix(phrasing.branch_header) {
            report.branch = Some(branch.trim().to_string());
        }

        if line.contains(phrasing.up_to_date) {
            report.push_needed = Some(false);
            report.upstream = quoted_ref()
                .captures(line)
                .map(|caps| caps[1].to_string());
        } else if line.contains(phrasing.ahead) || line.contains(phrasing.untracked_header) {
            report.push_needed = Some(true);
        } else if line.contains(phrasing.diverged) {
            report.diverged = true;
            report.behind = true;
            report.push_needed = Some(true);
        }

        if phrasing.clean.iter().any(|p| line.contains(p)) {
            report.commit_needed = Some(false);
        } else if phrasing.dirty.iter().any(|p| line.contains(p)) {
            report.commit_needed = Some(true);
        } else if line.contains(phrasing.behind) {
            report.behind = true;
        }
    }

    report
}

/// Raw status text together with its parsed form.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub report: StatusReport,
    pub raw: String,
    /// Whether an automatic pull ran because the branch was behind.
    pub pulled: bool,
}

/// Runs `git status` (optionally fetching and pulling first) and parses it.
pub struct StatusReader<'a> {
    runner: &'a dyn CommandRunner,
    remote: &'a str,
    phrasing: &'a StatusPhrasing,
}

impl<'a> StatusReader<'a> {
    pub fn new(runner: &'a dyn CommandRunner, remote: &'a str) -> Self {
        Self {
            runner,
            remote,
            phrasing: &GIT_EN_V2,
        }
    }

    pub fn with_phrasing(mut self, phrasing: &'a StatusPhrasing) -> Self {
        self.phrasing = phrasing;
        self
    }

    /// Read the current status. With `auto_update`, fetches from the remote
    /// first and pulls when the report says the branch is behind.
    pub fn read(&self, auto_update: bool) -> VcsResult<StatusSnapshot> {
        if auto_update {
            let fetch = self.runner.run(&VcsCommand::git(["fetch", self.remote]))?;
            if !fetch.success {
                tracing::warn!(remote = self.remote, output = %fetch.output, "fetch failed; status may be stale");
            }
        }

        let (mut report, mut raw) = self.status_once()?;
        let mut pulled = false;

        if report.behind && auto_update {
            tracing::info!("local branch is behind its upstream; pulling");
            let pull = VcsCommand::git(["pull"]);
            self.runner.run(&pull)?.into_result(&pull)?;
            pulled = true;
            (report, raw) = self.status_once()?;
        }

        Ok(StatusSnapshot {
            report,
            raw,
            pulled,
        })
    }

    fn status_once(&self) -> VcsResult<(StatusReport, String)> {
        let cmd = VcsCommand::git(["status"]);
        let raw = self.runner.run(&cmd)?.into_result(&cmd)?;
        Ok((parse_status_with(self.phrasing, &raw), raw))
    }
}

/// Verify that the runner's working directory is a repository.
pub fn verify_repository(runner: &dyn CommandRunner, path: &Path) -> VcsResult<()> {
    let output = runner.run(&VcsCommand::git(["status"]))?;
    if output.success {
        Ok(())
    } else {
        tracing::debug!(path = %path.display(), output = %output.output, "status failed");
        Err(VcsError::NotARepository(path.to_path_buf()))
    }
}
