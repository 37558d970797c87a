use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::crypto::KEY_LEN;
use crate::error::{Error, Result};

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

/// Configuration for the vault, loadable from TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Hex-encoded 256-bit master encryption key. Falls back to the
    /// `STRONGROOM_MASTER_KEY` environment variable when unset, so the key
    /// can be kept out of the config file.
    #[serde(default)]
    pub master_key: Option<String>,
}

/// CLI or embedder overrides that can be applied on top of a config file.
#[derive(Debug, Default)]
pub struct VaultConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub master_key: Option<String>,
}

impl VaultConfig {
    /// Default config file search paths.
    const SEARCH_PATHS: &'static [&'static str] =
        &["./strongroom.toml", "/etc/strongroom/strongroom.toml"];

    pub const KEY_ENV_VAR: &'static str = "STRONGROOM_MASTER_KEY";

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("strongroom.db")
    }

    /// Resolves and decodes the master key.
    pub fn master_key_bytes(&self) -> Result<[u8; KEY_LEN]> {
        let hex = match &self.master_key {
            Some(key) => key.clone(),
            None => std::env::var(Self::KEY_ENV_VAR).map_err(|_| {
                Error::Config(format!(
                    "no master key: set `master_key` or the {} environment variable",
                    Self::KEY_ENV_VAR
                ))
            })?,
        };
        let bytes = decode_hex(hex.trim())
            .ok_or_else(|| Error::Config("master key is not valid hex".to_string()))?;
        bytes.try_into().map_err(|_| {
            Error::Config(format!("master key must be {KEY_LEN} bytes of hex"))
        })
    }

    /// Load config from a specific file path.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: VaultConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search for config file in default locations and load if found.
    pub fn load_from_search_paths() -> Option<Self> {
        for path_str in Self::SEARCH_PATHS {
            let path = Path::new(path_str);
            if path.exists() {
                if let Ok(config) = Self::load(path) {
                    return Some(config);
                }
            }
        }
        None
    }

    /// Load config with overrides.
    ///
    /// Priority: overrides > config file > defaults
    pub fn load_with_overrides(
        config_path: Option<&Path>,
        overrides: VaultConfigOverrides,
    ) -> anyhow::Result<Self> {
        let mut config = if let Some(path) = config_path {
            Self::load(path)?
        } else {
            Self::load_from_search_paths().unwrap_or_default()
        };

        if let Some(data_dir) = overrides.data_dir {
            config.data_dir = data_dir;
        }
        if overrides.master_key.is_some() {
            config.master_key = overrides.master_key;
        }

        Ok(config)
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            master_key: None,
        }
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_key_from_config() {
        let config = VaultConfig {
            data_dir: default_data_dir(),
            master_key: Some("07".repeat(KEY_LEN)),
        };
        assert_eq!(config.master_key_bytes().unwrap(), [7u8; KEY_LEN]);
    }

    #[test]
    fn test_short_key_rejected() {
        let config = VaultConfig {
            data_dir: default_data_dir(),
            master_key: Some("0badc0ffee".to_string()),
        };
        assert!(matches!(config.master_key_bytes(), Err(Error::Config(_))));
    }

    #[test]
    fn test_non_hex_key_rejected() {
        let config = VaultConfig {
            data_dir: default_data_dir(),
            master_key: Some("zz".repeat(KEY_LEN)),
        };
        assert!(matches!(config.master_key_bytes(), Err(Error::Config(_))));
    }

    #[test]
    fn test_toml_parsing_and_defaults() {
        let config: VaultConfig = toml::from_str("data_dir = \"/var/lib/strongroom\"").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/strongroom"));
        assert!(config.master_key.is_none());
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/strongroom/strongroom.db"));
    }
}
