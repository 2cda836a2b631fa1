//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`operations`](super::operations) module (which
//! decides which derivatives to create) and the [`backend`](super::backend)
//! (which does the pixel work), so a mock backend can stand in during tests.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100). Clamped on construction.
//! - [`Effort`]: Encoder effort (0–9, higher is slower and smaller). Clamped.
//! - [`EncodeSettings`]: Quality + effort for one output format.
//! - [`ResizeParams`]: Full specification for one derivative.

use crate::types::Format;
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Encoder effort (0 = fastest, 9 = slowest / smallest output).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effort(pub u8);

impl Effort {
    pub const MAX: u8 = 9;

    pub fn new(value: u8) -> Self {
        Self(value.min(Self::MAX))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// rav1e speed preset (1 = slowest, 10 = fastest) for this effort.
    pub fn avif_speed(self) -> u8 {
        10u8.saturating_sub(self.0).max(1)
    }
}

/// Fixed encoder parameters for one output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSettings {
    pub quality: Quality,
    pub effort: Effort,
}

/// Parameters for producing one derivative from a decoded source.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub settings: EncodeSettings,
}
