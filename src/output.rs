//! CLI output formatting for all pipeline stages.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Found 3 images in static/img
//!     001 banner.png
//!     002 docs/setup.jpg
//!     003 docs/setup/step1.png
//! ```
//!
//! ## Process
//!
//! ```text
//! Processing 3 images
//!     001 banner.png (1000x500)
//!         320w avif: generated
//!         320w webp: reused
//!         640w webp: failed (Encode failed: ...)
//!     002 docs/broken.png
//!         Error: Decode failed: ...
//! ```
//!
//! ## Summary
//!
//! ```text
//! Variants: 6 generated, 2 reused (8 total)
//! Skipped 1 image
//! Manifest: 2 images → .docusaurus/image-manifest.json
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::cache::CacheStats;
use crate::process::{ProcessEvent, VariantInfo};
use crate::types::{SourceFile, VariantStatus};
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

fn status_label(status: VariantStatus) -> &'static str {
    match status {
        VariantStatus::Generated => "generated",
        VariantStatus::Reused => "reused",
        VariantStatus::Copied => "copied",
    }
}

fn variant_line(variant: &VariantInfo) -> String {
    match &variant.result {
        Ok(status) => format!("{}{}: {}", indent(2), variant.label, status_label(*status)),
        Err(message) => format!("{}{}: failed ({})", indent(2), variant.label, message),
    }
}

// ============================================================================
// Stage 1: Scan output
// ============================================================================

/// Format the list of images the scanner found.
pub fn format_scan_output(files: &[SourceFile], source_root: &Path) -> Vec<String> {
    let mut lines = vec![format!(
        "Found {} in {}",
        plural(files.len(), "image"),
        source_root.display()
    )];
    for (i, file) in files.iter().enumerate() {
        lines.push(format!("{}{} {}", indent(1), format_index(i + 1), file.relative));
    }
    lines
}

/// Print scan output to stdout.
pub fn print_scan_output(files: &[SourceFile], source_root: &Path) {
    for line in format_scan_output(files, source_root) {
        println!("{}", line);
    }
}

// ============================================================================
// Stage 2: Process output
// ============================================================================

/// Format a single process progress event as display lines.
///
/// Each image leads with its position in scan order and relative path; the
/// per-derivative status follows as indented context.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Started { image_count } => {
            vec![format!("Processing {}", plural(*image_count, "image"))]
        }
        ProcessEvent::ImageProcessed {
            index,
            relative,
            width,
            height,
            variants,
        } => {
            let mut lines = vec![format!(
                "{}{} {} ({}x{})",
                indent(1),
                format_index(*index),
                relative,
                width,
                height
            )];
            lines.extend(variants.iter().map(variant_line));
            lines
        }
        ProcessEvent::ImageFailed {
            index,
            relative,
            message,
        } => vec![
            format!("{}{} {}", indent(1), format_index(*index), relative),
            format!("{}Error: {}", indent(2), message),
        ],
    }
}

// ============================================================================
// Stage 3: Summary
// ============================================================================

/// Format the end-of-build summary.
pub fn format_summary(
    stats: &CacheStats,
    failed_images: usize,
    manifest_entries: usize,
    manifest_path: &Path,
) -> Vec<String> {
    let mut lines = vec![format!("Variants: {}", stats)];
    if failed_images > 0 {
        lines.push(format!("Skipped {}", plural(failed_images, "image")));
    }
    lines.push(format!(
        "Manifest: {} \u{2192} {}",
        plural(manifest_entries, "image"),
        manifest_path.display()
    ));
    lines
}

/// Print the end-of-build summary to stdout.
pub fn print_summary(
    stats: &CacheStats,
    failed_images: usize,
    manifest_entries: usize,
    manifest_path: &Path,
) {
    for line in format_summary(stats, failed_images, manifest_entries, manifest_path) {
        println!("{}", line);
    }
}
