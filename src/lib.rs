//! # srcsetter
//!
//! Build-time responsive images for static sites. Every raster image under
//! the asset root gets AVIF and WebP copies at a set of breakpoint widths, and
//! a JSON manifest maps each image's public URL to ready-made `srcset` strings
//! that the page-rendering layer drops into `<picture>` elements.
//!
//! # Architecture: Three-Stage Pipeline
//!
//! ```text
//! 1. Scan      static/img/   →  Vec<SourceFile>        (filesystem → file list)
//! 2. Process   file list     →  static/img/generated/  (AVIF + WebP derivatives)
//! 3. Manifest  derivatives   →  image-manifest.json    (URL → srcset strings)
//! ```
//!
//! Stages are plain functions over plain data, so each can be exercised on its
//! own. Processing talks to pixels only through the [`imaging::ImageBackend`]
//! trait; tests substitute a recording mock and never encode anything.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Stage 1: walks the asset root for `.png`/`.jpg`/`.jpeg` files |
//! | [`process`] | Stage 2: plans and encodes derivatives in parallel, reusing fresh ones |
//! | [`manifest`] | Stage 3: builds and atomically writes the JSON manifest |
//! | [`pipeline`] | Runs the three stages in order, as `srcsetter build` does |
//! | [`cache`] | Freshness: mtime comparison or content-hash cache manifest |
//! | [`config`] | `srcsetter.toml` loading, validation and stock defaults |
//! | [`imaging`] | Breakpoint math, encode parameters, backend trait, pure-Rust backend |
//! | [`types`] | Shared types passed between stages (`SourceFile`, `Derivative`, `VariantSet`) |
//! | [`output`] | CLI output formatting for progress and summaries |
//!
//! # Design Decisions
//!
//! ## Never Upscale
//!
//! Breakpoints wider than the original are skipped and the original width is
//! always included, so every image has at least one derivative per format and
//! no derivative is blurrier than its source.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, Lanczos3 resampling and encoding all come from the `image` crate
//! (AVIF via `rav1e`). There are no system libraries to install; the binary
//! runs the same on a laptop and in CI.
//!
//! ## Incremental by Default
//!
//! AVIF encoding dominates build time. A derivative is left alone while it is
//! at least as new as its source; `staleness = "content-hash"` switches to
//! SHA-256 keys for environments where checkouts reset modification times.
//! The manifest itself is always rebuilt from scratch, so it can never drift
//! from what is on disk.

pub mod cache;
pub mod config;
pub mod imaging;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod scan;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
