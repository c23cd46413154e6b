// SPDX-License-Identifier: CEPL-1.0
use crate::PresentMode;
use serde::Deserialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Everything supplied once at startup. Immutable afterwards.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub render: RenderSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub visible: bool,
    pub resizable: bool,
    /// Top-left corner in physical pixels. `None` centers the window.
    pub position: Option<[i32; 2]>,
    /// 0 leaves the frame rate to the present mode.
    pub max_framerate: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            title: "Vesper Application".to_string(),
            width: 800,
            height: 600,
            visible: true,
            resizable: true,
            position: None,
            max_framerate: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderSettings {
    pub present_mode: PresentMode,
    /// Enables validation layers and the diagnostic messenger.
    pub debug: bool,
    pub clear_color: [f32; 4],
    /// Directory holding the precompiled triangle shaders.
    pub shader_dir: PathBuf,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            present_mode: PresentMode::Vsync,
            debug: false,
            clear_color: default_clear(),
            shader_dir: PathBuf::from("shaders/triangle"),
        }
    }
}

fn default_clear() -> [f32; 4] {
    [0.02, 0.02, 0.04, 1.0]
}

impl AppConfig {
    /// Reads `path`. A missing file yields the defaults, a malformed one is
    /// an error.
    pub fn load(path: &Path) -> Result<AppConfig, ConfigError> {
        match fs::read_to_string(path) {
            Ok(s) => AppConfig::from_toml(&s).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("no config at {}, using defaults", path.display());
                Ok(AppConfig::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn from_toml(s: &str) -> Result<AppConfig, toml::de::Error> {
        toml::from_str(s)
    }
}
