// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Credential vault capability and its adapters.

use crate::error::{CredentialError, Result};
use crate::secret::Secret;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::process::{Command, Stdio};

/// Stores and retrieves secrets by `(service, account)`.
pub trait CredentialVault {
    fn store(&self, service: &str, account: &str, secret: &Secret) -> Result<()>;

    /// `Ok(None)` when nothing is stored for the pair.
    fn retrieve(&self, service: &str, account: &str) -> Result<Option<Secret>>;
}

/// Retrieve a secret, treating absence as [`CredentialError::CredentialUnavailable`].
pub fn require(vault: &dyn CredentialVault, service: &str, account: &str) -> Result<Secret> {
    vault
        .retrieve(service, account)?
        .ok_or_else(|| CredentialError::CredentialUnavailable {
            service: service.to_string(),
            account: account.to_string(),
        })
}

/// Process-local vault for tests and headless runs.
#[derive(Default)]
pub struct MemoryVault {
    entries: RefCell<HashMap<(String, String), Secret>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, service: &str, account: &str, secret: &str) -> Self {
        self.entries
            .borrow_mut()
            .insert((service.to_string(), account.to_string()), Secret::new(secret));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl CredentialVault for MemoryVault {
    fn store(&self, service: &str, account: &str, secret: &Secret) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert((service.to_string(), account.to_string()), secret.clone());
        Ok(())
    }

    fn retrieve(&self, service: &str, account: &str) -> Result<Option<Secret>> {
        Ok(self
            .entries
            .borrow()
            .get(&(service.to_string(), account.to_string()))
            .cloned())
    }
}

/// Vault backed by the Linux kernel keyring.
///
/// Keys are read and written through `linux-keyutils` syscalls; the `keyctl`
/// CLI is used when the native call fails or on other platforms.
#[derive(Debug, Clone)]
pub struct KeyctlVault {
    keyring: String,
}

impl Default for KeyctlVault {
    fn default() -> Self {
        Self {
            keyring: "@u".to_string(),
        }
    }
}

impl KeyctlVault {
    /// Use `keyring` (e.g. `@u` or `@s`) instead of the user keyring.
    pub fn with_keyring(keyring: impl Into<String>) -> Self {
        Self {
            keyring: keyring.into(),
        }
    }

    fn description(service: &str, account: &str) -> String {
        format!("{service}:{account}")
    }

    fn keyctl(args: &[&str]) -> Result<std::process::Output> {
        Command::new("keyctl")
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| CredentialError::Vault(format!("keyctl failed to execute: {e}")))
    }

    fn store_cli(&self, description: &str, secret: &Secret) -> Result<()> {
        // The payload goes through stdin so it never appears in the process list.
        let mut child = Command::new("keyctl")
            .args(["padd", "user", description, &self.keyring])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CredentialError::Vault(format!("keyctl failed to execute: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(secret.expose().as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(CredentialError::Vault(format!(
                "keyctl padd failed for '{description}': {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn retrieve_cli(&self, description: &str) -> Result<Option<Secret>> {
        let search = Self::keyctl(&["search", &self.keyring, "user", description])?;
        if !search.status.success() {
            tracing::debug!(key = %description, "credential not in keyring");
            return Ok(None);
        }

        let key_id = String::from_utf8_lossy(&search.stdout).trim().to_string();
        if key_id.is_empty() {
            return Ok(None);
        }

        let pipe = Self::keyctl(&["pipe", &key_id])?;
        if !pipe.status.success() {
            return Err(CredentialError::Vault(format!(
                "keyctl pipe failed for key id '{key_id}': {}",
                String::from_utf8_lossy(&pipe.stderr).trim()
            )));
        }

        let value = String::from_utf8(pipe.stdout)
            .map_err(|_| CredentialError::Vault("key data is not valid UTF-8".to_string()))?;
        Ok(Some(Secret::new(value)))
    }
}

#[cfg(target_os = "linux")]
mod native {
    use crate::secret::Secret;
    use linux_keyutils::{KeyError, KeyRing, KeyRingIdentifier};

    fn open(keyring: &str) -> Result<KeyRing, String> {
        let id = match keyring {
            "@u" => KeyRingIdentifier::User,
            "@us" => KeyRingIdentifier::UserSession,
            "@s" => KeyRingIdentifier::Session,
            "@p" => KeyRingIdentifier::Process,
            "@t" => KeyRingIdentifier::Thread,
            other => return Err(format!("no native handle for keyring '{other}'")),
        };
        KeyRing::from_special_id(id, false).map_err(|e| format!("failed to open keyring {keyring}: {e:?}"))
    }

    pub(super) fn store(keyring: &str, description: &str, secret: &Secret) -> Result<(), String> {
        open(keyring)?
            .add_key(description, secret.expose().as_bytes())
            .map(|_| ())
            .map_err(|e| format!("failed to add key '{description}': {e:?}"))
    }

    /// `Ok(None)` when the keyring holds no such key.
    pub(super) fn retrieve(keyring: &str, description: &str) -> Result<Option<Secret>, String> {
        let key = match open(keyring)?.search(description) {
            Ok(key) => key,
            Err(KeyError::KeyDoesNotExist) => return Ok(None),
            Err(e) => return Err(format!("key '{description}' search failed: {e:?}")),
        };
        let data = key
            .read_to_vec()
            .map_err(|e| format!("failed to read key payload: {e:?}"))?;
        String::from_utf8(data)
            .map(|value| Some(Secret::new(value)))
            .map_err(|_| "key payload is not valid UTF-8".to_string())
    }
}

impl CredentialVault for KeyctlVault {
    fn store(&self, service: &str, account: &str, secret: &Secret) -> Result<()> {
        let description = Self::description(service, account);

        #[cfg(target_os = "linux")]
        match native::store(&self.keyring, &description, secret) {
            Ok(()) => {
                tracing::debug!(key = %description, keyring = %self.keyring, "stored credential via native keyutils");
                return Ok(());
            }
            Err(error) => {
                tracing::warn!(key = %description, %error, "native keyring write failed, falling back to keyctl CLI");
            }
        }

        self.store_cli(&description, secret)?;
        tracing::debug!(key = %description, keyring = %self.keyring, "stored credential");
        Ok(())
    }

    fn retrieve(&self, service: &str, account: &str) -> Result<Option<Secret>> {
        let description = Self::description(service, account);

        #[cfg(target_os = "linux")]
        match native::retrieve(&self.keyring, &description) {
            Ok(found) => {
                tracing::debug!(key = %description, found = found.is_some(), "read keyring via native keyutils");
                return Ok(found);
            }
            Err(error) => {
                tracing::warn!(key = %description, %error, "native keyring read failed, falling back to keyctl CLI");
            }
        }

        self.retrieve_cli(&description)
    }
}
