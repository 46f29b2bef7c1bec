// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Scoped exposure of a push credential on disk.
//!
//! An external credential helper reads the token from a plaintext file. The
//! file exists only while the body of [`with_exposed_credential`] runs and is
//! removed by a drop guard, so it also disappears when the body fails or
//! panics. A failed removal is reported as a [`CleanupFailure`] on the log and
//! on stderr, never as an error.

use crate::error::{CleanupFailure, CredentialError, Result};
use crate::prompt::Prompter;
use crate::secret::Secret;
use crate::vault::CredentialVault;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Environment variable the credential helper reads the token path from.
pub const STORE_PATH_ENV: &str = "GCM_PLAINTEXT_STORE_PATH";

/// Interactive capture gives up after this many mismatched pairs.
pub const CAPTURE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct ExposureRequest {
    pub service: String,
    pub account: String,
    pub token_file: PathBuf,
    /// Token supplied by the caller (argument or environment); bypasses the vault.
    pub preset: Option<Secret>,
}

/// Handle passed to the exposure body. Only the file location is visible.
#[derive(Debug)]
pub struct ExposedToken<'a> {
    path: &'a Path,
}

impl ExposedToken<'_> {
    pub fn path(&self) -> &Path {
        self.path
    }

    /// Environment pointing the credential helper at the token file.
    pub fn helper_env(&self) -> Vec<(String, String)> {
        vec![(STORE_PATH_ENV.to_string(), self.path.display().to_string())]
    }
}

/// Resolve the credential, expose it at `request.token_file`, run `body` and
/// remove the file on every exit path.
pub fn with_exposed_credential<T, E, F>(
    vault: &dyn CredentialVault,
    prompter: &dyn Prompter,
    request: &ExposureRequest,
    body: F,
) -> std::result::Result<T, E>
where
    F: FnOnce(&ExposedToken<'_>) -> std::result::Result<T, E>,
    E: From<CredentialError>,
{
    let secret = resolve_secret(vault, prompter, request)?;

    let guard = TokenFileGuard {
        path: request.token_file.clone(),
    };
    write_token_file(&guard.path, &secret)?;
    drop(secret);
    tracing::info!(path = %guard.path.display(), "credential exposed for push");

    let exposed = ExposedToken { path: &guard.path };
    body(&exposed)
}

/// Find the secret: preset, then vault, then two-entry interactive capture.
/// Newly supplied secrets are stored back into the vault.
pub fn resolve_secret(
    vault: &dyn CredentialVault,
    prompter: &dyn Prompter,
    request: &ExposureRequest,
) -> Result<Secret> {
    if let Some(preset) = request.preset.as_ref().filter(|s| !s.is_empty()) {
        tracing::debug!(account = %request.account, "using supplied token");
        remember(vault, request, preset);
        return Ok(preset.clone());
    }

    match vault.retrieve(&request.service, &request.account) {
        Ok(Some(secret)) => return Ok(secret),
        Ok(None) => {
            let miss = CredentialError::CredentialUnavailable {
                service: request.service.clone(),
                account: request.account.clone(),
            };
            tracing::info!(reason = %miss, "asking for the token interactively");
        }
        Err(err) => {
            tracing::warn!(error = %err, "credential vault unavailable; asking interactively");
        }
    }

    let captured = capture_with_confirmation(prompter, &request.account)?;
    remember(vault, request, &captured);
    Ok(captured)
}

fn remember(vault: &dyn CredentialVault, request: &ExposureRequest, secret: &Secret) {
    if let Err(err) = vault.store(&request.service, &request.account, secret) {
        tracing::warn!(error = %err, account = %request.account, "could not store credential in vault");
    }
}

/// Ask for the token twice and accept it once both entries match.
pub fn capture_with_confirmation(prompter: &dyn Prompter, account: &str) -> Result<Secret> {
    for attempt in 1..=CAPTURE_ATTEMPTS {
        let first = prompter.secret_input(&format!("Token for {account}: "))?;
        let second = prompter.secret_input("Confirm token: ")?;

        if first.is_empty() {
            tracing::warn!(attempt, "empty token entered");
        } else if first == second {
            return Ok(first);
        } else {
            tracing::warn!(attempt, "token entries did not match");
        }
    }
    Err(CredentialError::Mismatch {
        attempts: CAPTURE_ATTEMPTS,
    })
}

fn write_token_file(path: &Path, secret: &Secret) -> Result<()> {
    let wrap = |source| CredentialError::TokenFile {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(wrap)?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path).map_err(wrap)?;

    // A pre-existing file keeps its old mode; tighten it.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(wrap)?;
    }

    file.write_all(secret.expose().as_bytes()).map_err(wrap)?;
    file.sync_all().map_err(wrap)?;
    Ok(())
}

struct TokenFileGuard {
    path: PathBuf,
}

impl Drop for TokenFileGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::info!(path = %self.path.display(), "credential exposure released"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "token file already gone");
            }
            Err(source) => report_cleanup_failure(&CleanupFailure {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

fn report_cleanup_failure(failure: &CleanupFailure) {
    tracing::error!(path = %failure.path.display(), error = %failure.source, "token file cleanup failed");
    eprintln!("WARNING: {failure}. Remove it manually.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompter;
    use crate::vault::MemoryVault;

    fn request(path: PathBuf) -> ExposureRequest {
        ExposureRequest {
            service: "git_token".into(),
            account: "ada@example.com".into(),
            token_file: path,
            preset: None,
        }
    }

    #[test]
    fn vault_hit_needs_no_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let vault = MemoryVault::new().with_entry("git_token", "ada@example.com", "tok");
        let prompter = ScriptedPrompter::new();
        let req = request(dir.path().join("token"));

        let content = with_exposed_credential(&vault, &prompter, &req, |exposed| {
            fs::read_to_string(exposed.path()).map_err(CredentialError::from)
        })
        .unwrap();

        assert_eq!(content, "tok");
        assert!(prompter.asked().is_empty());
        assert!(!req.token_file.exists());
    }

    #[test]
    fn preset_is_stored_in_vault() {
        let vault = MemoryVault::new();
        let prompter = ScriptedPrompter::new();
        let mut req = request(PathBuf::from("/unused"));
        req.preset = Some(Secret::new("from-env"));

        let secret = resolve_secret(&vault, &prompter, &req).unwrap();
        assert_eq!(secret.expose(), "from-env");
        assert_eq!(
            vault.retrieve("git_token", "ada@example.com").unwrap().unwrap().expose(),
            "from-env"
        );
    }

    #[test]
    fn capture_retries_until_entries_match() {
        let prompter = ScriptedPrompter::new()
            .secret("abc")
            .secret("abd")
            .secret("abc")
            .secret("abc");
        let secret = capture_with_confirmation(&prompter, "ada").unwrap();
        assert_eq!(secret.expose(), "abc");
        assert_eq!(prompter.asked().len(), 4);
    }

    #[test]
    fn capture_gives_up_after_three_mismatches() {
        let mut prompter = ScriptedPrompter::new();
        for _ in 0..CAPTURE_ATTEMPTS {
            prompter = prompter.secret("one").secret("two");
        }
        let err = capture_with_confirmation(&prompter, "ada").unwrap_err();
        assert!(matches!(err, CredentialError::Mismatch { attempts: 3 }));
    }

    #[test]
    fn helper_env_names_the_file() {
        let path = PathBuf::from("/tmp/gk/token");
        let exposed = ExposedToken { path: &path };
        assert_eq!(
            exposed.helper_env(),
            vec![(STORE_PATH_ENV.to_string(), "/tmp/gk/token".to_string())]
        );
    }
}
