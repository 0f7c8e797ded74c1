//! Configuration for the rendering core
//!
//! Read once at startup. None of these settings change what ends up on the
//! screen, only which optimization passes run and how output is paced.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::output::{Encoding, PaletteTheme};

/// Rendering configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Capability preset name or path to a JSON capability table
    pub terminal: String,
    /// Character encoding of the output stream
    pub encoding: Encoding,
    /// Merge adjacent SGR sequences
    pub coalesce_sequences: bool,
    /// Allow redefining the terminal palette
    pub palette_redefinable: bool,
    /// Palette loaded when redefinition is allowed
    pub palette_theme: PaletteTheme,
    /// Choose the cheapest cursor motion instead of always addressing
    pub cursor_optimization: bool,
    /// Run the post-flush pointer hook
    pub pointer_hook_enabled: bool,
    /// Output queue size in bytes before a forced flush
    pub queue_capacity: usize,
    /// Flush pacing
    pub pacing: PacingConfig,
    /// Run-length thresholds for the redraw heuristics
    pub thresholds: CostThresholds,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            terminal: "xterm-256color".to_string(),
            encoding: Encoding::Utf8,
            coalesce_sequences: true,
            palette_redefinable: false,
            palette_theme: PaletteTheme::default(),
            cursor_optimization: true,
            pointer_hook_enabled: false,
            queue_capacity: 32 * 1024,
            pacing: PacingConfig::default(),
            thresholds: CostThresholds::default(),
        }
    }
}

/// Adaptive flush pacing bounds, in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Shortest spacing between flushes
    pub min_wait_us: u64,
    /// Longest spacing between flushes
    pub max_wait_us: u64,
    /// Idle gap after which the estimators snap back to the minimum
    pub idle_reset_us: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_wait_us: 16_667, // one frame at 60 Hz
            max_wait_us: 200_000,
            idle_reset_us: 1_000_000,
        }
    }
}

impl PacingConfig {
    pub fn min_wait(&self) -> Duration {
        Duration::from_micros(self.min_wait_us)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_micros(self.max_wait_us.max(self.min_wait_us))
    }

    pub fn idle_reset(&self) -> Duration {
        Duration::from_micros(self.idle_reset_us)
    }
}

/// Minimum run lengths before a capability is considered at all.
///
/// A run must reach its threshold and the capability must also be cheaper
/// than the literal output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostThresholds {
    /// Blank run length before erase-characters is tried
    pub erase_min_run: usize,
    /// Identical-character run length before repeat is tried
    pub repeat_min_run: usize,
    /// Unchanged run length before a cursor jump is tried
    pub skip_min_run: usize,
}

impl Default for CostThresholds {
    fn default() -> Self {
        Self {
            erase_min_run: 2,
            repeat_min_run: 3,
            skip_min_run: 1,
        }
    }
}

impl RenderConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: RenderConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from `~/.config/mochi/render.json` or fall back to defaults
    pub fn load_or_default() -> Self {
        if let Some(config_path) = config_dir().map(|dir| dir.join("render.json")) {
            if config_path.exists() {
                match Self::load(&config_path) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Ignoring {}: {}", config_path.display(), e),
                }
            }
        }
        Self::default()
    }
}

fn config_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config").join("mochi"))
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
