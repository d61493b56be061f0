use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the recording-pair merge tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Asset naming conventions
    #[serde(default)]
    pub naming: NamingConfig,

    /// External stream-copy tool settings
    #[serde(default)]
    pub ffmpeg: FfmpegConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Fixed filename prefix shared by all recording assets
    pub prefix: String,

    /// Extension of video assets
    pub video_extension: String,

    /// Extension of GCSV log assets
    pub log_extension: String,

    /// Separator joining the two identifiers in merged output names
    pub separator: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            prefix: "RC_".to_string(),
            video_extension: "MP4".to_string(),
            log_extension: "gcsv".to_string(),
            separator: "-".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    /// Binary to invoke for lossless stream-copy concatenation
    pub binary: String,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the first file found in the search path,
    /// falling back to defaults when none exists.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "gyromerge.toml",
            "config/gyromerge.toml",
            "~/.config/gyromerge/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from an explicit file path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)?;
        let config = toml::from_str(&config_str)?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }
}
