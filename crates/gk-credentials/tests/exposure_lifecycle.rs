// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The token file must exist only inside the exposure body.

use gk_credentials::{
    with_exposed_credential, CredentialError, ExposureRequest, MemoryVault, NonInteractivePrompter,
    ScriptedPrompter, Secret,
};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use tempfile::TempDir;

#[derive(Debug)]
enum PushError {
    Credential(CredentialError),
    Remote(String),
}

impl From<CredentialError> for PushError {
    fn from(err: CredentialError) -> Self {
        PushError::Credential(err)
    }
}

fn request(dir: &TempDir) -> ExposureRequest {
    ExposureRequest {
        service: "git_token".into(),
        account: "ada@example.com".into(),
        token_file: dir.path().join("nested").join("git_token"),
        preset: None,
    }
}

#[test]
fn file_is_absent_after_success() {
    let dir = TempDir::new().unwrap();
    let req = request(&dir);
    let vault = MemoryVault::new().with_entry("git_token", "ada@example.com", "s3cret");

    let result: Result<(), PushError> = with_exposed_credential(&vault, &NonInteractivePrompter, &req, |token| {
        assert!(token.path().exists());
        assert_eq!(fs::read_to_string(token.path()).unwrap(), "s3cret");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(token.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
        Ok(())
    });

    assert!(result.is_ok());
    assert!(!req.token_file.exists());
}

#[test]
fn file_is_absent_after_body_failure() {
    let dir = TempDir::new().unwrap();
    let req = request(&dir);
    let vault = MemoryVault::new().with_entry("git_token", "ada@example.com", "s3cret");

    let result: Result<(), PushError> = with_exposed_credential(&vault, &NonInteractivePrompter, &req, |_| {
        Err(PushError::Remote("fatal: unable to access remote".into()))
    });

    assert!(matches!(result, Err(PushError::Remote(_))));
    assert!(!req.token_file.exists());
}

#[test]
fn file_is_absent_after_panic() {
    let dir = TempDir::new().unwrap();
    let req = request(&dir);
    let vault = MemoryVault::new().with_entry("git_token", "ada@example.com", "s3cret");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let _: Result<(), PushError> =
            with_exposed_credential(&vault, &NonInteractivePrompter, &req, |_| panic!("push exploded"));
    }));

    assert!(outcome.is_err());
    assert!(!req.token_file.exists());
}

#[test]
fn unresolvable_credential_never_writes_file() {
    let dir = TempDir::new().unwrap();
    let req = request(&dir);
    let vault = MemoryVault::new();
    let mut called = false;

    let result: Result<(), PushError> = with_exposed_credential(&vault, &NonInteractivePrompter, &req, |_| {
        called = true;
        Ok(())
    });

    assert!(matches!(result, Err(PushError::Credential(CredentialError::Prompt(_)))));
    assert!(!called);
    assert!(!req.token_file.exists());
}

#[test]
fn vault_miss_captures_and_stores_token() {
    let dir = TempDir::new().unwrap();
    let req = request(&dir);
    let vault = MemoryVault::new();
    let prompter = ScriptedPrompter::new().secret("typed").secret("typed");

    let seen: Result<String, PushError> = with_exposed_credential(&vault, &prompter, &req, |token| {
        Ok(fs::read_to_string(token.path()).unwrap())
    });

    assert_eq!(seen.unwrap(), "typed");
    assert_eq!(vault.len(), 1);
    assert!(!req.token_file.exists());
}

#[test]
fn preset_token_bypasses_prompt() {
    let dir = TempDir::new().unwrap();
    let mut req = request(&dir);
    req.preset = Some(Secret::new("from-env"));
    let vault = MemoryVault::new();

    let result: Result<(), PushError> = with_exposed_credential(&vault, &NonInteractivePrompter, &req, |token| {
        assert_eq!(fs::read_to_string(token.path()).unwrap(), "from-env");
        Ok(())
    });
    assert!(result.is_ok());
}

#[test]
fn cleanup_failure_does_not_fail_the_operation() {
    let dir = TempDir::new().unwrap();
    let req = request(&dir);
    let vault = MemoryVault::new().with_entry("git_token", "ada@example.com", "s3cret");
    let path: PathBuf = req.token_file.clone();

    // Replace the file with a non-empty directory so removal fails.
    let result: Result<u8, PushError> = with_exposed_credential(&vault, &NonInteractivePrompter, &req, |token| {
        fs::remove_file(token.path()).unwrap();
        fs::create_dir(token.path()).unwrap();
        fs::write(token.path().join("blocker"), "x").unwrap();
        Ok(7)
    });

    assert_eq!(result.unwrap(), 7);
    assert!(path.is_dir());
}
