use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::ReentryPolicy;
use crate::srec::Codec;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Paths
    pub grammar_dir: String,
    pub cache_dir: String,
    pub log_dir: String,
    pub contacts_path: String,

    // Recognition
    pub codec: String,
    pub reentry_policy: String,

    // Meta
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grammar_dir: dirs::data_dir()
                .unwrap_or_default()
                .join("voxdial/grammars")
                .to_string_lossy()
                .to_string(),
            cache_dir: dirs::cache_dir()
                .unwrap_or_default()
                .join("voxdial")
                .to_string_lossy()
                .to_string(),
            log_dir: dirs::data_dir()
                .unwrap_or_default()
                .join("voxdial/logs")
                .to_string_lossy()
                .to_string(),
            contacts_path: dirs::config_dir()
                .unwrap_or_default()
                .join("voxdial/contacts.txt")
                .to_string_lossy()
                .to_string(),
            codec: Codec::Pcm16Bit11K.as_str().to_string(),
            reentry_policy: "force-reset".to_string(),
            log_level: "INFO".to_string(),
        }
    }
}

impl Config {
    /// Load config from file, or create default
    pub fn load() -> Result<Self> {
        let config_path = config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            match serde_json::from_str(&content) {
                Ok(config) => Ok(config),
                Err(e) => {
                    // Graceful degradation: log warning and use defaults
                    tracing::warn!("config file corrupted or invalid, using defaults: {}", e);
                    // Backup corrupt file for debugging
                    let backup_path = config_path.with_extension("json.corrupt");
                    let _ = std::fs::rename(&config_path, &backup_path);
                    Ok(Self::default())
                }
            }
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let config_path = config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn codec(&self) -> crate::error::DialResult<Codec> {
        self.codec.parse()
    }

    pub fn reentry_policy(&self) -> crate::error::DialResult<ReentryPolicy> {
        self.reentry_policy.parse()
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("voxdial")
        .join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.codec, "PCM/16bit/11KHz");
        assert_eq!(config.reentry_policy, "force-reset");
        assert_eq!(config.codec().unwrap(), Codec::Pcm16Bit11K);
        assert_eq!(config.reentry_policy().unwrap(), ReentryPolicy::ForceReset);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string(&config).expect("Failed to serialize");
        let restored: Config = serde_json::from_str(&json).expect("Failed to deserialize");
        assert_eq!(config.codec, restored.codec);
        assert_eq!(config.grammar_dir, restored.grammar_dir);
    }

    #[test]
    fn test_config_corrupt_json_handling() {
        let corrupt_json = "{ not valid json";
        let result: Result<Config, _> = serde_json::from_str(corrupt_json);
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_policy_string() {
        let config = Config {
            reentry_policy: "sideways".to_string(),
            ..Default::default()
        };
        assert!(config.reentry_policy().is_err());
    }
}
