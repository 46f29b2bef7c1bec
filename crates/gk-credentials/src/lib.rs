// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Credential handling for gitkeeper pushes.
//!
//! This crate provides:
//! - A [`CredentialVault`] capability with keyring and in-memory adapters
//! - A [`Prompter`] capability for confirmations and secret entry
//! - [`with_exposed_credential`], which keeps a token on disk only while a push runs

pub mod error;
pub mod exposure;
pub mod prompt;
pub mod secret;
pub mod vault;

pub use error::{CleanupFailure, CredentialError, Result};
pub use exposure::{
    capture_with_confirmation, resolve_secret, with_exposed_credential, ExposedToken, ExposureRequest,
    CAPTURE_ATTEMPTS, STORE_PATH_ENV,
};
pub use prompt::{ConsolePrompter, NonInteractivePrompter, Prompter, ScriptedPrompter};
pub use secret::Secret;
pub use vault::{require, CredentialVault, KeyctlVault, MemoryVault};
