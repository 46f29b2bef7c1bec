// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use clap::Subcommand;
use gk_core::StoreScope;
use gk_logging::CliLoggingArgs;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

pub mod commands;

pub use clap::Parser;

/// Environment variable holding a token that bypasses the vault.
pub const TOKEN_ENV: &str = "GIT_TOKEN";
/// Environment variable naming the account the token belongs to.
pub const ACCOUNT_ENV: &str = "GK_ACCOUNT";

#[derive(clap::Parser, Debug)]
#[command(
    name = "gk",
    about = "Keep a working repository in sync with its remote",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file (default: <config_dir>/gitkeeper/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub logging: CliLoggingArgs,

    /// Repository working directory
    #[arg(long, global = true)]
    pub path: Option<PathBuf>,

    /// Remote URL; cloned when the working directory does not exist yet
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Create the repository without asking when it does not exist
    #[arg(long, global = true)]
    pub init: bool,

    #[arg(long, global = true)]
    pub remote: Option<String>,

    #[arg(long, global = true)]
    pub trunk: Option<String>,

    /// Do not fetch or pull before reading status
    #[arg(long, global = true)]
    pub no_auto_update: bool,

    /// Author name for this session
    #[arg(long, global = true)]
    pub author: Option<String>,

    /// Account email for this session
    #[arg(long, global = true)]
    pub email: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Commit pending changes if any, then push
    Push {
        #[arg(short, long)]
        message: Option<String>,
        /// Force the push
        #[arg(long)]
        force: bool,
        /// Force push without asking when the remote rejects the push
        #[arg(long)]
        yes: bool,
        /// Repository path or remote URL
        target: Option<String>,
    },
    /// Pull the current branch, or `BRANCH` from the remote
    Pull { branch: Option<String> },
    /// Show the working tree status
    Status { target: Option<String> },
    /// Commit all pending changes
    Commit {
        message: Option<String>,
        /// Repository path or remote URL
        target: Option<String>,
    },
    /// Stage all changes
    Add { target: Option<String> },
    /// Show commit history
    Log {
        /// Only the most recent commit
        #[arg(long)]
        last: bool,
        /// Print records as JSON
        #[arg(long)]
        json: bool,
        /// Branch or revision
        revision: Option<String>,
    },
    /// Switch to a branch, creating it when needed
    Branch {
        name: String,
        /// Create even if the name is known remotely
        #[arg(long, conflicts_with_all = ["from", "delete"])]
        create: bool,
        /// Start the new branch at this revision
        #[arg(long, conflicts_with = "delete")]
        from: Option<String>,
        /// Delete the local branch
        #[arg(long)]
        delete: bool,
    },
    /// Merge a branch into another and push the result
    Merge {
        from: String,
        /// Target branch (default: the trunk)
        #[arg(long)]
        into: Option<String>,
    },
    /// Merge the trunk into a working branch
    CatchUp { branch: String },
    /// List merge sources advertised by the remote
    Sources { target: Option<String> },
    /// Record the author identity in git configuration
    Identity {
        #[arg(long)]
        global: bool,
        target: Option<String>,
    },
}

impl Commands {
    /// Repository path or remote URL given after the command.
    pub fn target(&self) -> Option<&str> {
        match self {
            Commands::Push { target, .. }
            | Commands::Status { target }
            | Commands::Commit { target, .. }
            | Commands::Add { target }
            | Commands::Sources { target }
            | Commands::Identity { target, .. } => target.as_deref(),
            _ => None,
        }
    }
}

/// Where the session operates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub path: PathBuf,
    pub url: Option<String>,
}

/// Whether a positional argument names a remote rather than a directory.
pub fn is_remote_url(arg: &str) -> bool {
    arg.starts_with("http") || arg.starts_with("ssh://") || arg.starts_with("git@")
}

/// Directory a clone of `url` lands in, named after the repository.
pub fn clone_directory(base: &Path, url: &str) -> PathBuf {
    let name = url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or("repository");
    let name = name.strip_suffix(".git").unwrap_or(name);
    base.join(if name.is_empty() { "repository" } else { name })
}

impl Cli {
    /// Resolve path and URL from flags and the positional target.
    pub fn target(&self, cwd: &Path) -> Target {
        let (positional_path, positional_url) = match self.command.target() {
            Some(arg) if is_remote_url(arg) => (None, Some(arg.to_string())),
            Some(arg) => (Some(PathBuf::from(arg)), None),
            None => (None, None),
        };
        let url = self.url.clone().or(positional_url);
        let path = self.path.clone().or(positional_path).unwrap_or_else(|| match &url {
            Some(url) if !cwd.join(".git").exists() => clone_directory(cwd, url),
            _ => cwd.to_path_buf(),
        });
        let path = if path.is_absolute() { path } else { cwd.join(path) };
        Target { path, url }
    }

    /// Command-line configuration layer.
    pub fn to_json_overrides(&self) -> Value {
        gk_core::config::flags_overlay([
            ("remote", json!(self.remote)),
            ("trunk", json!(self.trunk)),
            ("auto-update", if self.no_auto_update { json!(false) } else { Value::Null }),
        ])
    }

    pub fn identity_scope(&self) -> Option<StoreScope> {
        match self.command {
            Commands::Identity { global: true, .. } => Some(StoreScope::Global),
            Commands::Identity { global: false, .. } => Some(StoreScope::Local),
            _ => None,
        }
    }
}
