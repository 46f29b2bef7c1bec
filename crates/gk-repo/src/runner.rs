// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Execution of version-control commands.
//!
//! Every command travels through a [`CommandRunner`]. Runners refuse anything
//! that does not invoke the version-control program, so this channel can never
//! be used to execute arbitrary shell input. Ordinary non-zero exits are
//! reported as data ([`CommandOutput::success`] is `false`), never as errors.

use crate::error::{VcsError, VcsResult};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Invocation token every command must start with.
pub const GIT: &str = "git";

/// A single version-control invocation: argument vector plus extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsCommand {
    argv: Vec<String>,
    env: Vec<(String, String)>,
}

impl VcsCommand {
    /// Build a `<program> <args>` invocation.
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = vec![program.to_string()];
        argv.extend(args.into_iter().map(Into::into));
        Self {
            argv,
            env: Vec::new(),
        }
    }

    /// Build a `git <args>` invocation.
    pub fn git<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(GIT, args)
    }

    /// Build an invocation from a raw argument vector. Nothing is checked here;
    /// runners apply [`ensure_invokes_program`] before spawning.
    pub fn raw<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            env: Vec::new(),
        }
    }

    /// Add an environment variable for the child process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Arguments after the program token.
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or(&[])
    }

    pub fn envs(&self) -> &[(String, String)] {
        &self.env
    }

    /// Whether the arguments start with the given sequence (e.g. `["push"]`).
    pub fn has_args_prefix(&self, prefix: &[&str]) -> bool {
        let args = self.args();
        args.len() >= prefix.len() && args.iter().zip(prefix).all(|(a, p)| a == p)
    }

    /// Human readable command line. Environment is deliberately omitted.
    pub fn display(&self) -> String {
        self.argv.join(" ")
    }
}

impl std::fmt::Display for VcsCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

/// Outcome of a command that could be spawned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub success: bool,
    /// Standard output on success; diagnostic text (stderr, then stdout) on failure.
    pub output: String,
}

impl CommandOutput {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }

    /// Convert an unsuccessful outcome into [`VcsError::CommandFailure`].
    pub fn into_result(self, command: &VcsCommand) -> VcsResult<String> {
        if self.success {
            Ok(self.output)
        } else {
            Err(VcsError::CommandFailure {
                command: command.display(),
                output: self.output,
            })
        }
    }
}

/// Executes version-control commands and captures their output.
#[cfg_attr(any(test, feature = "test-support"), mockall::automock)]
pub trait CommandRunner {
    /// Run `command`. Returns `Err` only for guard rejections and spawn failures.
    fn run(&self, command: &VcsCommand) -> VcsResult<CommandOutput>;
}

/// Reject commands whose first token is not `program`.
pub fn ensure_invokes_program(command: &VcsCommand, program: &str) -> VcsResult<()> {
    let invokes = command
        .argv()
        .first()
        .and_then(|first| Path::new(first).file_name())
        .map(|name| name == program)
        .unwrap_or(false);

    if invokes {
        Ok(())
    } else {
        Err(VcsError::InvalidCommand {
            program: program.to_string(),
            command: command.display(),
        })
    }
}

/// Runner backed by `std::process::Command`.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    executable: PathBuf,
    working_dir: PathBuf,
}

impl ProcessRunner {
    /// Create a runner spawning `executable` (`git` or a path to it) inside `working_dir`.
    pub fn new(executable: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            working_dir: working_dir.into(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Point the runner at another working directory (after clone or init).
    pub fn set_working_dir(&mut self, dir: impl Into<PathBuf>) {
        self.working_dir = dir.into();
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, command: &VcsCommand) -> VcsResult<CommandOutput> {
        ensure_invokes_program(command, GIT)?;
        tracing::debug!(command = %command, dir = %self.working_dir.display(), "running");

        let mut child = Command::new(&self.executable);
        child
            .args(command.args())
            .current_dir(&self.working_dir)
            // Messages are parsed against the English phrase table.
            .env("LC_ALL", "C")
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null());
        for (key, value) in command.envs() {
            child.env(key, value);
        }

        let output = child.output().map_err(|source| VcsError::Spawn {
            program: self.executable.display().to_string(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if output.status.success() {
            return Ok(CommandOutput::ok(stdout));
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        tracing::debug!(command = %command, status = ?output.status.code(), "command exited unsuccessfully");
        let diagnostic = match (stderr.is_empty(), stdout.is_empty()) {
            (false, false) => format!("{stderr}\n{stdout}"),
            (false, true) => stderr,
            _ => stdout,
        };
        Ok(CommandOutput::failed(diagnostic))
    }
}
