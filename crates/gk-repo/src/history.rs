// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Commit history parsed from the default `git log` format.

use crate::runner::{CommandRunner, VcsCommand};
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Date layout of `git log` without `--date`.
pub const GIT_DATE_FORMAT: &str = "%a %b %e %H:%M:%S %Y %z";

/// One commit from the history, newest first in any returned sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    pub id: String,
    pub author: Option<String>,
    /// Date text as printed by git.
    pub timestamp: Option<String>,
    pub parent_merge_ids: Option<Vec<String>>,
    pub message: Option<String>,
    pub description_lines: Vec<String>,
}

impl CommitRecord {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author: None,
            timestamp: None,
            parent_merge_ids: None,
            message: None,
            description_lines: Vec::new(),
        }
    }

    /// Body lines after the message, joined with `". "`.
    pub fn description(&self) -> Option<String> {
        if self.description_lines.is_empty() {
            None
        } else {
            Some(self.description_lines.join(". "))
        }
    }

    pub fn parsed_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        let text = self.timestamp.as_deref()?;
        DateTime::parse_from_str(text, GIT_DATE_FORMAT).ok()
    }

    pub fn is_merge(&self) -> bool {
        self.parent_merge_ids.is_some()
    }
}

fn commit_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^commit ([0-9a-f]{7,64})\b").expect("static regex"))
}

/// Parse `git log` output. Text before the first header is ignored and a
/// repeated id keeps its first record.
pub fn parse_log(text: &str) -> Vec<CommitRecord> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();
    let mut current: Option<CommitRecord> = None;

    let mut flush = |record: Option<CommitRecord>, records: &mut Vec<CommitRecord>| {
        if let Some(record) = record {
            if seen.insert(record.id.clone()) {
                records.push(record);
            }
        }
    };

    for line in text.lines() {
        if let Some(caps) = commit_header().captures(line) {
            flush(current.take(), &mut records);
            current = Some(CommitRecord::new(&caps[1]));
            continue;
        }

        let Some(record) = current.as_mut() else {
            continue;
        };

        if let Some(parents) = line.strip_prefix("Merge:") {
            record.parent_merge_ids = Some(parents.split_whitespace().map(str::to_string).collect());
        } else if let Some(author) = line.strip_prefix("Author:") {
            record.author = Some(author.trim().to_string());
        } else if let Some(date) = line.strip_prefix("Date:") {
            record.timestamp = Some(date.trim().to_string());
        } else {
            let body = line.trim();
            if body.is_empty() {
                continue;
            }
            if record.message.is_none() {
                record.message = Some(body.to_string());
            } else {
                record.description_lines.push(body.to_string());
            }
        }
    }
    flush(current.take(), &mut records);

    records
}

/// Read history for `revision` (the current branch when `None`).
/// A failed `git log` yields an empty history.
pub fn read_history(runner: &dyn CommandRunner, revision: Option<&str>) -> Vec<CommitRecord> {
    let mut args = vec!["log".to_string()];
    args.extend(revision.map(str::to_string));
    let cmd = VcsCommand::git(args);

    match runner.run(&cmd) {
        Ok(output) if output.success => parse_log(&output.output),
        Ok(output) => {
            tracing::debug!(command = %cmd, output = %output.output, "history unavailable");
            Vec::new()
        }
        Err(err) => {
            tracing::warn!(command = %cmd, error = %err, "history unavailable");
            Vec::new()
        }
    }
}

/// Most recent commit, if any.
pub fn last_commit(runner: &dyn CommandRunner) -> Option<CommitRecord> {
    let cmd = VcsCommand::git(["log", "-1"]);
    let output = runner.run(&cmd).ok().filter(|o| o.success)?;
    parse_log(&output.output).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    const LOG: &str = "\
commit 3f1c2a9d8e7b6a5f4e3d2c1b0a9f8e7d6c5b4a39
Merge: 1a2b3c4 5d6e7f8
Author: Ada Lovelace <ada@example.com>
Date:   Mon Oct 19 10:15:00 2026 +0200

    Merge branch 'feature'

    Brings the parser work in
    with tests

commit 1a2b3c4d5e6f708192a3b4c5d6e7f8091a2b3c4d
Author: Ada Lovelace <ada@example.com>
Date:   Mon Oct 12 09:00:00 2026 +0200

    Initial commit
";

    #[test]
    fn parses_records_in_order() {
        let records = parse_log(LOG);
        assert_eq!(records.len(), 2);

        let merge = &records[0];
        assert_eq!(merge.id, "3f1c2a9d8e7b6a5f4e3d2c1b0a9f8e7d6c5b4a39");
        assert_eq!(merge.author.as_deref(), Some("Ada Lovelace <ada@example.com>"));
        assert_eq!(
            merge.parent_merge_ids,
            Some(vec!["1a2b3c4".to_string(), "5d6e7f8".to_string()])
        );
        assert_eq!(merge.message.as_deref(), Some("Merge branch 'feature'"));
        assert_eq!(merge.description().as_deref(), Some("Brings the parser work in. with tests"));

        let first = &records[1];
        assert!(!first.is_merge());
        assert_eq!(first.message.as_deref(), Some("Initial commit"));
        assert_eq!(first.description(), None);
    }

    #[test]
    fn parses_git_dates() {
        let records = parse_log(LOG);
        let ts = records[1].parsed_timestamp().expect("date parses");
        assert_eq!((ts.year(), ts.month(), ts.day()), (2026, 10, 12));
    }

    #[test]
    fn ignores_preamble_and_duplicate_ids() {
        let text = "warning: something\ncommit abcdef1\n    one\ncommit abcdef1\n    again\n";
        let records = parse_log(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message.as_deref(), Some("one"));
    }

    #[test]
    fn indented_header_words_stay_in_body() {
        let text = "commit abcdef1\nAuthor: A <a@b>\n\n    Fix\n    Author: someone else\n";
        let records = parse_log(text);
        assert_eq!(records[0].author.as_deref(), Some("A <a@b>"));
        assert_eq!(records[0].description_lines, vec!["Author: someone else".to_string()]);
    }

    #[test]
    fn empty_log_yields_nothing() {
        assert!(parse_log("").is_empty());
    }
}
