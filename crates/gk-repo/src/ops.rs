// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Working-tree operations shared by the branch manager and the orchestrator.

use crate::error::{VcsError, VcsResult};
use crate::runner::{CommandRunner, VcsCommand};

pub const DEFAULT_COMMIT_MESSAGE: &str = "Default commit message (generated by gitkeeper).";

/// Whether diagnostic text reports a push refused for diverged history.
pub fn is_rejection(output: &str) -> bool {
    ["[rejected]", "non-fast-forward", "fetch first", "Updates were rejected"]
        .iter()
        .any(|marker| output.contains(marker))
}

fn run_checked(runner: &dyn CommandRunner, cmd: VcsCommand) -> VcsResult<String> {
    runner.run(&cmd)?.into_result(&cmd)
}

/// `git add .`
pub fn stage_all(runner: &dyn CommandRunner) -> VcsResult<()> {
    run_checked(runner, VcsCommand::git(["add", "."])).map(drop)
}

/// `git commit -m <message>`
pub fn commit(runner: &dyn CommandRunner, message: &str) -> VcsResult<String> {
    run_checked(runner, VcsCommand::git(["commit", "-m", message]))
}

/// `git pull`, optionally from a named remote branch.
pub fn pull(runner: &dyn CommandRunner, source: Option<(&str, &str)>) -> VcsResult<String> {
    let mut args = vec!["pull".to_string()];
    if let Some((remote, branch)) = source {
        args.push(remote.to_string());
        args.push(branch.to_string());
    }
    run_checked(runner, VcsCommand::git(args))
}

/// Parameters of a push.
#[derive(Debug, Clone, Default)]
pub struct PushRequest {
    pub force: bool,
    /// `(remote, branch)` for `--set-upstream`.
    pub upstream: Option<(String, String)>,
    /// Environment for the credential helper.
    pub env: Vec<(String, String)>,
}

/// Push, separating rejected pushes from other failures.
pub fn push(runner: &dyn CommandRunner, request: &PushRequest) -> VcsResult<String> {
    let mut args = vec!["push".to_string()];
    if request.force {
        args.push("--force".to_string());
    }
    if let Some((remote, branch)) = &request.upstream {
        args.extend(["--set-upstream".to_string(), remote.clone(), branch.clone()]);
    }

    let mut cmd = VcsCommand::git(args);
    for (key, value) in &request.env {
        cmd = cmd.env(key.clone(), value.clone());
    }

    let output = runner.run(&cmd)?;
    if output.success {
        tracing::info!(command = %cmd, "push completed");
        Ok(output.output)
    } else if is_rejection(&output.output) {
        tracing::warn!(command = %cmd, "push rejected by remote");
        Err(VcsError::RejectedPush(output.output))
    } else {
        Err(VcsError::CommandFailure {
            command: cmd.display(),
            output: output.output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, MockCommandRunner};

    #[test]
    fn rejection_markers() {
        assert!(is_rejection(" ! [rejected]        main -> main (fetch first)"));
        assert!(is_rejection("hint: Updates were rejected because the tip ..."));
        assert!(!is_rejection("fatal: Authentication failed"));
    }

    #[test]
    fn push_classifies_rejection() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|cmd| cmd.has_args_prefix(&["push"]))
            .returning(|_| Ok(CommandOutput::failed(" ! [rejected] main -> main (non-fast-forward)")));

        let err = push(&runner, &PushRequest::default()).unwrap_err();
        assert!(err.is_rejected_push());
    }

    #[test]
    fn push_passes_flags_and_environment() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|cmd| {
                cmd.args() == ["push", "--force", "--set-upstream", "origin", "main"]
                    && cmd.envs() == [("GCM_PLAINTEXT_STORE_PATH".to_string(), "/tmp/t".to_string())]
            })
            .times(1)
            .returning(|_| Ok(CommandOutput::ok("")));

        let request = PushRequest {
            force: true,
            upstream: Some(("origin".into(), "main".into())),
            env: vec![("GCM_PLAINTEXT_STORE_PATH".into(), "/tmp/t".into())],
        };
        push(&runner, &request).unwrap();
    }

    #[test]
    fn other_push_failures_stay_command_failures() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_| Ok(CommandOutput::failed("fatal: Authentication failed")));
        let err = push(&runner, &PushRequest::default()).unwrap_err();
        assert!(matches!(err, VcsError::CommandFailure { .. }));
    }
}
