//! High-level image operations.
//!
//! Planning turns an original size plus configuration into a list of
//! [`VariantPlan`]s without touching the filesystem; [`encode_variant`] hands a
//! single plan to the backend.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{ResponsiveSize, calculate_responsive_sizes};
use super::params::{EncodeSettings, ResizeParams};
use crate::types::Format;
use std::path::{Path, PathBuf};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Configuration for responsive image generation.
#[derive(Debug, Clone)]
pub struct ResponsiveConfig {
    /// Candidate widths, ascending.
    pub breakpoints: Vec<u32>,
    /// Output formats with their encoder settings, in production order.
    pub formats: Vec<(Format, EncodeSettings)>,
}

/// One derivative to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantPlan {
    pub format: Format,
    pub settings: EncodeSettings,
    pub width: u32,
    pub height: u32,
    pub file_name: String,
    pub output: PathBuf,
}

/// `<stem>-<width>.<ext>`
pub fn variant_file_name(stem: &str, width: u32, format: Format) -> String {
    format!("{}-{}.{}", stem, width, format.extension())
}

/// Plan every derivative for an image, breakpoint-major then format.
pub fn plan_variants(
    original_dims: (u32, u32),
    output_dir: &Path,
    filename_stem: &str,
    config: &ResponsiveConfig,
) -> Vec<VariantPlan> {
    let sizes = calculate_responsive_sizes(original_dims, &config.breakpoints);
    let mut plans = Vec::with_capacity(sizes.len() * config.formats.len());

    for ResponsiveSize { width, height } in sizes {
        for &(format, settings) in &config.formats {
            let file_name = variant_file_name(filename_stem, width, format);
            plans.push(VariantPlan {
                format,
                settings,
                width,
                height,
                output: output_dir.join(&file_name),
                file_name,
            });
        }
    }

    plans
}

/// Encode one planned derivative from an already-decoded source.
pub fn encode_variant<B: ImageBackend>(
    backend: &B,
    image: &B::Image,
    plan: &VariantPlan,
) -> Result<()> {
    backend.resize(
        image,
        &ResizeParams {
            output: plan.output.clone(),
            width: plan.width,
            height: plan.height,
            format: plan.format,
            settings: plan.settings,
        },
    )
}
