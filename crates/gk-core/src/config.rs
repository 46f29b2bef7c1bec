// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Application configuration.
//!
//! Layers, lowest precedence first: built-in defaults, the user file
//! (`<config_dir>/gitkeeper/config.toml`), `GK_*` environment variables and
//! command-line flags. Layers are merged as JSON and deserialized once, so an
//! unknown key in any layer is rejected.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::Value as J;
use std::path::{Path, PathBuf};

/// Prefix of environment overrides (`GK_TRUNK`, `GK_AUTO_UPDATE`, ...).
pub const ENV_PREFIX: &str = "GK";

/// Where `git config` writes identity and credential-helper settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreScope {
    #[default]
    Local,
    Global,
}

impl StoreScope {
    pub fn flag(self) -> &'static str {
        match self {
            StoreScope::Local => "--local",
            StoreScope::Global => "--global",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct GkConfig {
    /// Executable spawned for version-control commands.
    pub program: String,
    pub remote: String,
    pub trunk: String,
    /// Fetch before reading status and pull when behind.
    pub auto_update: bool,
    /// File-name globs purged before every push.
    pub housekeeping_patterns: Vec<String>,
    pub token_file: Option<PathBuf>,
    pub credential_service: String,
    pub store_scope: StoreScope,
}

impl Default for GkConfig {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
            remote: "origin".to_string(),
            trunk: "main".to_string(),
            auto_update: true,
            housekeeping_patterns: vec!["__pycache__".to_string()],
            token_file: None,
            credential_service: "git_token".to_string(),
            store_scope: StoreScope::Local,
        }
    }
}

impl GkConfig {
    /// `<config_dir>/gitkeeper/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gitkeeper").join("config.toml"))
    }

    /// Token file location, `<home>/.gitkeeper/git_token` unless configured.
    pub fn token_file_path(&self) -> PathBuf {
        self.token_file.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(".gitkeeper")
                .join("git_token")
        })
    }

    /// Load every layer. `file` replaces the default user file when given.
    pub fn load(file: Option<&Path>, flags: J) -> Result<Self> {
        let file_layer = match file {
            Some(path) => Some(read_file_layer(path)?),
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Some(read_file_layer(&path)?),
                None => None,
            },
        };
        merge_layers(file_layer, env_overlay()?, flags)
    }
}

/// Parse a TOML config file into a JSON layer.
pub fn read_file_layer(path: &Path) -> Result<J> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        SyncError::Config(format!("reading config file {}: {e}", path.display()))
    })?;
    let value: toml::Value = text
        .parse()
        .map_err(|e| SyncError::Config(format!("parsing config file {}: {e}", path.display())))?;
    Ok(serde_json::to_value(value)?)
}

/// `GK_*` variables as a JSON layer. Variables naming no configuration key
/// (such as `GK_ACCOUNT`) are left out.
pub fn env_overlay() -> Result<J> {
    let built = config::Config::builder()
        .add_source(config::Environment::with_prefix(ENV_PREFIX).convert_case(config::Case::Kebab))
        .build()?;
    let raw = built.try_deserialize::<serde_json::Map<String, J>>()?;
    Ok(coerce_overlay(J::Object(raw)))
}

/// Build a JSON layer from command-line `key = value` pairs.
pub fn flags_overlay<'a>(pairs: impl IntoIterator<Item = (&'a str, J)>) -> J {
    let mut root = serde_json::Map::new();
    for (key, value) in pairs {
        if !value.is_null() {
            root.insert(key.to_string(), value);
        }
    }
    J::Object(root)
}

/// Keep known keys and convert string values to the type the default has.
fn coerce_overlay(overlay: J) -> J {
    let defaults = serde_json::to_value(GkConfig::default()).unwrap_or(J::Null);
    let J::Object(map) = overlay else {
        return J::Object(Default::default());
    };

    let mut out = serde_json::Map::new();
    for (key, value) in map {
        let Some(default) = defaults.get(&key) else {
            tracing::debug!(key = %key, "ignoring environment variable with no matching config key");
            continue;
        };
        let value = match (default, value) {
            (J::Bool(_), J::String(s)) => match s.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => J::Bool(true),
                "0" | "false" | "no" | "off" => J::Bool(false),
                _ => J::String(s),
            },
            (J::Array(_), J::String(s)) => J::Array(
                s.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(|p| J::String(p.to_string()))
                    .collect(),
            ),
            (_, other) => other,
        };
        out.insert(key, value);
    }
    J::Object(out)
}

/// Deep-merge `layer` into `base`. Arrays are replaced, nulls ignored.
pub fn merge_two_json(base: &mut J, layer: J) {
    match (base, layer) {
        (J::Object(a), J::Object(b)) => {
            for (k, v) in b {
                merge_two_json(a.entry(k).or_insert(J::Null), v);
            }
        }
        (_, J::Null) => {}
        (a, b) => *a = b,
    }
}

/// Merge file, environment and flag layers over the defaults.
pub fn merge_layers(file: Option<J>, env: J, flags: J) -> Result<GkConfig> {
    let mut merged = serde_json::to_value(GkConfig::default())?;
    for layer in [file, Some(env), Some(flags)].into_iter().flatten() {
        merge_two_json(&mut merged, layer);
    }
    let config: GkConfig = serde_json::from_value(merged)?;
    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}
