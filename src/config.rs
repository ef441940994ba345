//! Configuration for Skylight
//!
//! Loads configuration from TOML file at `~/.config/skylight/config.toml`
//! Auto-generates default config file on first run if missing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::compositor::planes::MAX_PLANE_ALIGNMENT;
use crate::shared::Point;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub renderer: RendererConfig,
    pub stream: StreamConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file, or use defaults if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            if let Err(e) = Self::save_default(&config_path) {
                warn!("Failed to create default config file: {}", e);
            }
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read config file {:?}", path))?;

        let config = Self::parse(&content)?;
        info!("Configuration loaded from {:?}", path);
        debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the renderer and placement code cannot represent.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.renderer.plane_alignment <= MAX_PLANE_ALIGNMENT,
            "renderer.plane_alignment {} exceeds {}",
            self.renderer.plane_alignment,
            MAX_PLANE_ALIGNMENT
        );
        self.output.bounds()?;
        Ok(())
    }

    /// Get the path to the config file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("skylight");

        Ok(config_dir.join("config.toml"))
    }

    /// Save default configuration to file
    fn save_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(&Self::default()).context("Failed to serialize default config")?;

        fs::write(path, toml_string).context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }
}

/// Renderer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Row and height alignment of coded planes (1 = unpadded, 16 = macroblocks)
    pub plane_alignment: u32,
    /// RGBA the target is cleared to before each composite
    pub clear_color: [f32; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            plane_alignment: 1,
            clear_color: [0.0, 0.0, 0.0, 0.0],
        }
    }
}

/// Frame stream configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Unix socket to listen on; `$XDG_RUNTIME_DIR/skylight.sock` if unset
    pub socket_path: Option<PathBuf>,
    /// Largest accepted message in bytes
    pub max_message_size: usize,
    /// Write every composited frame as PNG here
    pub dump_dir: Option<PathBuf>,
}

impl StreamConfig {
    pub fn socket_path(&self) -> PathBuf {
        self.socket_path.clone().unwrap_or_else(skylight_proto::socket_path)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            max_message_size: skylight_proto::stream::DEFAULT_MAX_MESSAGE_SIZE,
            dump_dir: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output size used as default placement bounds
    pub width: u32,
    pub height: u32,
}

impl OutputConfig {
    /// Bottom-right corner of the output as placement coordinates.
    pub fn bounds(&self) -> Result<Point> {
        let width = i32::try_from(self.width).context("output.width does not fit in a coordinate")?;
        let height = i32::try_from(self.height).context("output.height does not fit in a coordinate")?;
        Ok(Point::new(width, height))
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, overridden by `RUST_LOG`
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "skylight=debug,info".to_string(),
        }
    }
}
