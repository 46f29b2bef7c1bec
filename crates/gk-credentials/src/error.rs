// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for credential handling

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for credential operations
pub type Result<T> = std::result::Result<T, CredentialError>;

/// Errors that can occur while resolving or exposing a credential
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The vault holds no secret for this pair. Triggers interactive capture.
    #[error("no credential stored for {account} in {service}")]
    CredentialUnavailable { service: String, account: String },

    #[error("entries did not match after {attempts} attempts")]
    Mismatch { attempts: u32 },

    #[error("credential vault error: {0}")]
    Vault(String),

    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("token file {path} could not be written: {source}")]
    TokenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Token-file removal failed; the secret remains on disk.
///
/// Reported loudly but never raised, so the surrounding push result survives.
#[derive(Debug, Error)]
#[error("failed to remove token file {path}; the credential is still on disk: {source}")]
pub struct CleanupFailure {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}
