//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait splits work into a header read ([`identify`]), a
//! decode step ([`load`]) and an encode step ([`resize`]). Planning only needs
//! the header, so an image whose derivatives are all fresh is never decoded.
//! When something is stale the source is decoded once and resized into every
//! stale derivative. A decode failure is a per-image problem, an encode
//! failure only affects one derivative.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust with no system
//! libraries.
//!
//! [`identify`]: ImageBackend::identify
//! [`load`]: ImageBackend::load
//! [`resize`]: ImageBackend::resize

use super::params::ResizeParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    DecodeFailed(String),
    #[error("Encode failed: {0}")]
    EncodeFailed(String),
}

/// Pixel dimensions of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Sync` so a single backend can be shared across rayon workers.
pub trait ImageBackend: Sync {
    /// A decoded source image, held in memory while its derivatives are made.
    type Image;

    /// Read the dimensions of the image at `path` without decoding pixels.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode the image at `path`.
    fn load(&self, path: &Path) -> Result<Self::Image, BackendError>;

    /// Resize `image` to the exact target size and write it in the target format.
    fn resize(&self, image: &Self::Image, params: &ResizeParams) -> Result<(), BackendError>;
}
