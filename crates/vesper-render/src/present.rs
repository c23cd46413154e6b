// SPDX-License-Identifier: CEPL-1.0
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// How finished frames are handed to the display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentMode {
    /// Strict vsync. A full queue blocks the producer until the next vblank.
    /// Every conformant implementation supports it.
    #[default]
    Vsync,
    /// Vsync without blocking: queued frames are replaced by newer ones.
    TripleBuffering,
    /// Frames go out immediately, tearing allowed.
    Immediate,
    /// Vsync unless the application misses a vblank, then it tears.
    RelaxedVsync,
}

impl PresentMode {
    pub const ALL: [PresentMode; 4] = [
        PresentMode::Vsync,
        PresentMode::TripleBuffering,
        PresentMode::Immediate,
        PresentMode::RelaxedVsync,
    ];

    /// The mode every implementation must support.
    pub const GUARANTEED: PresentMode = PresentMode::Vsync;

    pub fn name(self) -> &'static str {
        match self {
            PresentMode::Vsync => "vsync",
            PresentMode::TripleBuffering => "triple_buffering",
            PresentMode::Immediate => "immediate",
            PresentMode::RelaxedVsync => "relaxed_vsync",
        }
    }
}

impl fmt::Display for PresentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown present mode `{0}` (expected vsync, triple_buffering, immediate or relaxed_vsync)")]
pub struct ParsePresentModeError(pub String);

impl FromStr for PresentMode {
    type Err = ParsePresentModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        PresentMode::ALL
            .into_iter()
            .find(|m| m.name() == normalized)
            .ok_or_else(|| ParsePresentModeError(s.to_string()))
    }
}
