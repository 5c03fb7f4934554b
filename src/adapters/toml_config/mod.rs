// TOML config adapter - Layered configuration from defaults, file and environment

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::model::OutputContainer;
use crate::engine::ToolCommand;
use crate::utils::logging::{LogFormat, LogLevel, LoggingConfig};

/// Config file picked up from the working directory when nothing else is given
pub const DEFAULT_CONFIG_FILE: &str = "ytclip.toml";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "YTCLIP_CONFIG";

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for the clipper, merged from every configuration layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClipperConfig {
    /// yt-dlp command line, e.g. `yt-dlp` or `python3 -m yt_dlp`
    pub ytdlp: String,
    /// ffmpeg command line
    pub ffmpeg: String,
    /// Preferred container for clips with video
    pub container: OutputContainer,
    /// Directory for clips without an explicit output path
    pub output_dir: PathBuf,
    /// Replace existing files
    pub overwrite: bool,
    /// Re-encode around cut points for frame-accurate starts
    pub force_keyframes_at_cuts: bool,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for ClipperConfig {
    fn default() -> Self {
        Self {
            ytdlp: "yt-dlp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            container: OutputContainer::Mkv,
            output_dir: PathBuf::from("."),
            overwrite: false,
            force_keyframes_at_cuts: true,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    ytclip: ClipperConfig,
}

impl ClipperConfig {
    /// Defaults, then the config file, then `YTCLIP_*` environment variables.
    ///
    /// `explicit` (from `--config`) and `YTCLIP_CONFIG` must point to an existing
    /// file; `./ytclip.toml` is only read when present.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    /// [`ClipperConfig::load`] with a custom environment lookup
    pub fn load_with<F>(explicit: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => env(CONFIG_ENV)
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
                .or_else(|| {
                    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                    local.is_file().then_some(local)
                }),
        };

        let mut config = match file {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Read the `[ytclip]` section of a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.ytclip)
    }

    /// Overlay `YTCLIP_*` environment variables
    pub fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ytdlp) = env("YTCLIP_YTDLP") {
            self.ytdlp = ytdlp;
        }
        if let Some(ffmpeg) = env("YTCLIP_FFMPEG") {
            self.ffmpeg = ffmpeg;
        }
        if let Some(container) = env("YTCLIP_CONTAINER") {
            self.container = OutputContainer::parse(&container).ok_or_else(|| {
                ConfigError::Invalid(format!("YTCLIP_CONTAINER: unknown container '{}'", container))
            })?;
        }
        if let Some(dir) = env("YTCLIP_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(overwrite) = env("YTCLIP_OVERWRITE") {
            self.overwrite = parse_flag(&overwrite).ok_or_else(|| {
                ConfigError::Invalid(format!("YTCLIP_OVERWRITE: expected a boolean, got '{}'", overwrite))
            })?;
        }
        if let Some(level) = env("YTCLIP_LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ytdlp.trim().is_empty() {
            return Err(ConfigError::Invalid("ytdlp command cannot be empty".to_string()));
        }
        if self.ffmpeg.trim().is_empty() {
            return Err(ConfigError::Invalid("ffmpeg command cannot be empty".to_string()));
        }
        if LogLevel::parse(&self.log_level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown log level '{}' (expected error, warn, info, debug or trace)",
                self.log_level
            )));
        }
        Ok(())
    }

    pub fn ytdlp_command(&self) -> Result<ToolCommand, ConfigError> {
        ToolCommand::parse(&self.ytdlp)
            .ok_or_else(|| ConfigError::Invalid("ytdlp command cannot be empty".to_string()))
    }

    pub fn ffmpeg_command(&self) -> Result<ToolCommand, ConfigError> {
        ToolCommand::parse(&self.ffmpeg)
            .ok_or_else(|| ConfigError::Invalid("ffmpeg command cannot be empty".to_string()))
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: LogLevel::parse(&self.log_level).unwrap_or_default(),
            format: if self.log_json {
                LogFormat::Json
            } else {
                LogFormat::Pretty
            },
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
