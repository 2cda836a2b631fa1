//! Shared test utilities for the srcsetter test suite.
//!
//! Synthetic images are tiny gradients so encodes stay fast; the mock backend
//! never reads them, the real backend decodes them like any other source.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! create_test_png(&tmp.path().join("banner.png"), 100, 50);
//! set_mtime(&tmp.path().join("banner.png"), SystemTime::UNIX_EPOCH);
//! let config = test_config();
//! ```

use crate::config::Config;
use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use std::fs::File;
use std::path::Path;
use std::time::SystemTime;

// =========================================================================
// Synthetic images
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}

/// Write an RGBA PNG of the given size.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let rgba = DynamicImage::ImageRgb8(gradient(width, height)).to_rgba8();
    rgba.save_with_format(path, image::ImageFormat::Png).unwrap();
}

/// Write an RGB JPEG of the given size. The extension of `path` is ignored.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    gradient(width, height)
        .save_with_format(path, image::ImageFormat::Jpeg)
        .unwrap();
}

// =========================================================================
// Filesystem
// =========================================================================

/// Set a file's modification time.
pub fn set_mtime(path: &Path, time: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

// =========================================================================
// Config
// =========================================================================

/// Stock configuration, as a project without `srcsetter.toml` would get.
pub fn test_config() -> Config {
    Config::default()
}
