// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Filesystem collaborator and pre-push artifact purge.

use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub trait FileSystem {
    /// Entries under `root` whose file name matches the glob `pattern`.
    /// Matching directories are returned whole, not descended into.
    fn find(&self, root: &Path, pattern: &str) -> io::Result<Vec<PathBuf>>;
    /// Remove a file or a directory tree.
    fn remove(&self, path: &Path) -> io::Result<()>;
    fn make_directory(&self, path: &Path) -> io::Result<()>;
    fn write_text(&self, path: &Path, text: &str) -> io::Result<()>;
}

/// Translate a file-name glob (`*`, `?`) into an anchored regex.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn find(&self, root: &Path, pattern: &str) -> io::Result<Vec<PathBuf>> {
        let matcher = glob_to_regex(pattern).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let mut found = Vec::new();

        let mut walker = WalkDir::new(root).min_depth(1).into_iter();
        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy();
            let is_dir = entry.file_type().is_dir();

            if is_dir && name == ".git" {
                walker.skip_current_dir();
                continue;
            }
            if matcher.is_match(&name) {
                found.push(entry.path().to_path_buf());
                if is_dir {
                    walker.skip_current_dir();
                }
            }
        }
        Ok(found)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        if fs::symlink_metadata(path)?.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
    }

    fn make_directory(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn write_text(&self, path: &Path, text: &str) -> io::Result<()> {
        fs::write(path, text)
    }
}

/// Remove everything under `root` matching `patterns`. Failures are logged
/// and skipped. Returns the number of removed entries.
pub fn purge(filesystem: &dyn FileSystem, root: &Path, patterns: &[String]) -> usize {
    let mut removed = 0;
    for pattern in patterns {
        let matches = match filesystem.find(root, pattern) {
            Ok(matches) => matches,
            Err(err) => {
                tracing::warn!(pattern = %pattern, error = %err, "housekeeping search failed");
                continue;
            }
        };
        for path in matches {
            match filesystem.remove(&path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "purged");
                    removed += 1;
                }
                Err(err) => tracing::warn!(path = %path.display(), error = %err, "could not purge"),
            }
        }
    }
    if removed > 0 {
        tracing::info!(removed, "housekeeping purged artifacts");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn globs_match_whole_names() {
        let re = glob_to_regex("*.pyc").unwrap();
        assert!(re.is_match("mod.pyc"));
        assert!(!re.is_match("mod.pyc.bak"));
        assert!(glob_to_regex("__pycache__").unwrap().is_match("__pycache__"));
        assert!(glob_to_regex("a?c").unwrap().is_match("abc"));
        assert!(!glob_to_regex("a.c").unwrap().is_match("abc"));
    }

    #[test]
    fn purge_removes_matching_trees_and_skips_git() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("pkg/__pycache__")).unwrap();
        fs::write(root.join("pkg/__pycache__/m.cpython-312.pyc"), "x").unwrap();
        fs::create_dir_all(root.join("__pycache__")).unwrap();
        fs::create_dir_all(root.join(".git/__pycache__")).unwrap();
        fs::write(root.join("pkg/keep.py"), "print()").unwrap();

        let removed = purge(&LocalFileSystem, root, &["__pycache__".to_string()]);

        assert_eq!(removed, 2);
        assert!(!root.join("pkg/__pycache__").exists());
        assert!(!root.join("__pycache__").exists());
        assert!(root.join(".git/__pycache__").exists());
        assert!(root.join("pkg/keep.py").exists());
    }

    #[test]
    fn local_fs_writes_text() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b");
        LocalFileSystem.make_directory(&nested).unwrap();
        LocalFileSystem.write_text(&nested.join("README.md"), "# hi\n").unwrap();
        assert_eq!(fs::read_to_string(nested.join("README.md")).unwrap(), "# hi\n");
    }
}
