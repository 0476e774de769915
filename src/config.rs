//! Defaults for input actions: target slots and settle delays.
//!
//! Loadable from TOML; every key is optional.
//!
//! ```toml
//! keyboard = 2
//! mouse = 11
//! key_press_delay_ms = 25
//! mouse_button_delay_ms = 30
//! scroll_delay_ms = 25
//! ```

use crate::device::{self, Device};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_keyboard() -> Device {
    device::keyboard(0)
}

fn default_mouse() -> Device {
    device::mouse(0)
}

fn default_key_press_delay_ms() -> u64 {
    25
}

fn default_mouse_button_delay_ms() -> u64 {
    30
}

fn default_scroll_delay_ms() -> u64 {
    25
}

/// Which slots actions address and how long they let strokes settle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Keyboard slot, 1..=10
    #[serde(default = "default_keyboard")]
    pub keyboard: Device,
    /// Mouse slot, 11..=20
    #[serde(default = "default_mouse")]
    pub mouse: Device,
    /// Pause after every key down or up
    #[serde(default = "default_key_press_delay_ms")]
    pub key_press_delay_ms: u64,
    /// Pause after every button down or up
    #[serde(default = "default_mouse_button_delay_ms")]
    pub mouse_button_delay_ms: u64,
    /// Pause after every wheel notch
    #[serde(default = "default_scroll_delay_ms")]
    pub scroll_delay_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            keyboard: default_keyboard(),
            mouse: default_mouse(),
            key_press_delay_ms: default_key_press_delay_ms(),
            mouse_button_delay_ms: default_mouse_button_delay_ms(),
            scroll_delay_ms: default_scroll_delay_ms(),
        }
    }
}

impl InputConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: InputConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !device::is_keyboard(self.keyboard) {
            return Err(ConfigError::Invalid(format!(
                "keyboard slot {} is outside 1..=10",
                self.keyboard
            )));
        }
        if !device::is_mouse(self.mouse) {
            return Err(ConfigError::Invalid(format!(
                "mouse slot {} is outside 11..=20",
                self.mouse
            )));
        }
        for (name, value) in [
            ("key_press_delay_ms", self.key_press_delay_ms),
            ("mouse_button_delay_ms", self.mouse_button_delay_ms),
            ("scroll_delay_ms", self.scroll_delay_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be non-zero")));
            }
        }
        Ok(())
    }

    pub fn key_press_delay(&self) -> Duration {
        Duration::from_millis(self.key_press_delay_ms)
    }

    pub fn mouse_button_delay(&self) -> Duration {
        Duration::from_millis(self.mouse_button_delay_ms)
    }

    pub fn scroll_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_delay_ms)
    }
}
