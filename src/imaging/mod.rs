//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (PNG, JPEG) |
//! | **Resize** | Lanczos3 via `DynamicImage::resize_exact` |
//! | **Encode** | rav1e AVIF + lossless WebP from the `image` crate |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for breakpoint and dimension math
//! - **Parameters**: Data structures describing encode operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Variant planning and per-variant encode

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{ResponsiveSize, calculate_responsive_sizes, plan_breakpoints, scaled_height};
pub use operations::{
    ResponsiveConfig, VariantPlan, encode_variant, plan_variants, variant_file_name,
};
pub use params::{EncodeSettings, Effort, Quality, ResizeParams};
pub use rust_backend::RustBackend;
