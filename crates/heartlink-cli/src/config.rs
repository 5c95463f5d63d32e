//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use heartlink_core::CentralConfig;

use crate::cli::WatchArgs;

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Disable colored output
    #[serde(default)]
    pub no_color: bool,

    /// Central settings: target name, decoder, buffers and timeouts
    #[serde(default)]
    pub central: CentralConfig,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("heartlink")
            .join("config.toml")
    }

    /// Load config from the default path, or return default if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `path`, warning and falling back to defaults on error
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    /// Save config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

/// Central settings for a watch run: file values overridden by flags.
pub fn resolve_central(args: &WatchArgs, config: &Config) -> CentralConfig {
    let mut central = config.central.clone();
    if let Some(target) = &args.target {
        central = central.target_name(target.clone());
    }
    if let Some(decoder) = args.decoder {
        central = central.decoder(decoder.into());
    }
    if let Some(secs) = args.timeout {
        central = central.connect_timeout(Duration::from_secs(secs));
    }
    central
}

#[cfg(test)]
mod tests {
    use heartlink_types::DecoderMode;

    use super::*;
    use crate::cli::DecoderArg;

    fn watch_args() -> WatchArgs {
        WatchArgs {
            target: None,
            decoder: None,
            json: false,
            count: None,
            timeout: None,
        }
    }

    #[test]
    fn test_path_ends_with_app_dir() {
        let path = Config::path();
        assert!(path.ends_with("heartlink/config.toml"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            no_color: true,
            central: CentralConfig::default()
                .target_name("Polar H10")
                .decoder(DecoderMode::Standard),
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "central = [not toml").unwrap();

        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[central]\ntarget_name = \"Wahoo TICKR\"\n").unwrap();

        let config = Config::load_from(&path);
        assert!(!config.no_color);
        assert_eq!(config.central.target_name, "Wahoo TICKR");
        assert_eq!(config.central.event_buffer, CentralConfig::default().event_buffer);
    }

    #[test]
    fn test_resolve_central_uses_file_values() {
        let config = Config {
            central: CentralConfig::default().target_name("From File"),
            ..Default::default()
        };
        let central = resolve_central(&watch_args(), &config);
        assert_eq!(central.target_name, "From File");
        assert_eq!(central.decoder, DecoderMode::Literal);
    }

    #[test]
    fn test_resolve_central_flags_override() {
        let config = Config {
            central: CentralConfig::default().target_name("From File"),
            ..Default::default()
        };
        let args = WatchArgs {
            target: Some("From Flag".to_string()),
            decoder: Some(DecoderArg::Standard),
            timeout: Some(30),
            ..watch_args()
        };

        let central = resolve_central(&args, &config);
        assert_eq!(central.target_name, "From Flag");
        assert_eq!(central.decoder, DecoderMode::Standard);
        assert_eq!(central.connect_timeout_duration(), Duration::from_secs(30));
    }
}
