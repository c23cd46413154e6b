// SPDX-License-Identifier: CEPL-1.0
//! Backend-agnostic contracts shared by the windowing host, the GPU backend
//! and the application: sizes, presentation modes, configuration, the
//! per-tick driver loop and the lifecycle holder for a backend.

mod app;
mod config;
mod driver;
mod host;
mod present;
mod renderer;

pub use app::Application;
pub use config::{AppConfig, ConfigError, RenderSettings, WindowConfig};
pub use driver::{RenderLoop, RunState};
pub use host::WindowHost;
pub use present::{ParsePresentModeError, PresentMode};
pub use renderer::{BackendSlot, RenderError, Renderer};

/// Drawable size in physical pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either axis is zero, e.g. a minimized window.
    pub fn is_zero_area(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for RenderSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_area_on_either_axis() {
        assert!(RenderSize::new(0, 600).is_zero_area());
        assert!(RenderSize::new(800, 0).is_zero_area());
        assert!(!RenderSize::new(1, 1).is_zero_area());
    }

    #[test]
    fn displays_as_width_by_height() {
        assert_eq!(RenderSize::new(1024, 768).to_string(), "1024x768");
    }
}
