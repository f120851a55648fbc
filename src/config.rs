// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// The launcher loads this file; the engine core only ever sees an
// `EngineConfig`. Defaults match the built-in fixed configuration, so a
// missing config.toml changes nothing.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::backend::ApiVersion;

/// Application name reported to the Vulkan driver
pub const APP_NAME: &str = "Vulkan Engine";

/// Lowest Vulkan version the engine accepts for instance and device
pub const MIN_API_VERSION: ApiVersion = ApiVersion::new(1, 3, 0);

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "vulkan".to_string(),
            width: 1500,
            height: 800,
            resizable: false,
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
        }
    }
}

/// Everything the engine core needs, resolved from `Config`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub app_name: String,
    pub window: WindowConfig,
    pub enable_validation: bool,
    pub min_api_version: ApiVersion,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Config::default().engine()
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve into the engine's view. Validation layers only ever turn on
    /// in debug builds.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            app_name: APP_NAME.to_string(),
            window: self.window.clone(),
            enable_validation: cfg!(debug_assertions) && self.debug.validation_layers,
            min_api_version: MIN_API_VERSION,
        }
    }
}
