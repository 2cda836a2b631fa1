//! Responsive variant generation.
//!
//! Stage 2 of the pipeline. Takes the scanner's [`SourceFile`]s and produces,
//! for every image, an AVIF and a WebP derivative at each breakpoint that does
//! not exceed the original width, plus one at the original width.
//!
//! ## Output Structure
//!
//! The generated directory mirrors the asset root:
//!
//! ```text
//! static/img/generated/
//! ├── .cache-manifest.json       # content-hash mode only
//! ├── banner-320.avif
//! ├── banner-320.webp
//! ├── ...
//! ├── banner-1000.avif           # original width, always present
//! ├── banner-1000.webp
//! └── docs/
//!     ├── setup-320.avif
//!     └── setup-320.webp
//! ```
//!
//! ## Failure Model
//!
//! - An image that can't be read, identified or decoded is reported and
//!   skipped; it gets no manifest entry. Other images are unaffected.
//! - A derivative that fails to encode is dropped; the image keeps the
//!   derivatives that succeeded. An image left with none is reported and
//!   skipped.
//! - Two images in one directory that share a file stem (`logo.png`,
//!   `logo.jpg`) would write the same derivative files. The first in scan
//!   order is processed; the others are reported and skipped.
//! - Failing to create an output directory aborts the run.
//!
//! ## Parallel Processing
//!
//! Images are processed in parallel using [rayon](https://docs.rs/rayon); the
//! derivatives of one image are produced sequentially from a single decode.
//! Results come back in scan order. Progress is reported per image through an
//! optional [`ProcessEvent`] channel.
//!
//! ## Cancellation
//!
//! When the cancel flag is raised, images already in flight finish and no new
//! image starts. The run then returns [`ProcessError::Interrupted`].

use crate::cache::{self, Cache, CacheStats, Lookup, SourceKey};
use crate::config::{Config, ResolvedPaths, Staleness};
use crate::imaging::{
    EncodeSettings, ImageBackend, ResponsiveConfig, RustBackend, VariantPlan, encode_variant,
    plan_variants,
};
use crate::types::{Derivative, Format, SourceFile, SourceImage, VariantSet, VariantStatus};
use rayon::prelude::*;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Interrupted")]
    Interrupted,
}

/// Settings for one processing run.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub responsive: ResponsiveConfig,
    pub generated_dir: PathBuf,
    /// Public URL of the asset root.
    pub url_prefix: String,
    /// Public URL of the generated directory.
    pub generated_url_prefix: String,
    pub staleness: Staleness,
}

impl ProcessConfig {
    pub fn new(config: &Config, paths: &ResolvedPaths) -> Self {
        let formats: Vec<(Format, EncodeSettings)> = Format::ALL
            .into_iter()
            .map(|f| (f, config.formats.get(f).settings()))
            .collect();
        Self {
            responsive: ResponsiveConfig {
                breakpoints: config.images.breakpoints.clone(),
                formats,
            },
            generated_dir: paths.generated.clone(),
            url_prefix: config.paths.url_prefix.clone(),
            generated_url_prefix: config.paths.generated_url_prefix.clone(),
            staleness: config.images.staleness,
        }
    }
}

/// Progress events emitted during image processing.
///
/// Sent through an optional channel so callers can display progress as
/// images complete, while the final [`ProcessResult`] is still returned.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    Started {
        image_count: usize,
    },
    ImageProcessed {
        /// 1-based position in scan order.
        index: usize,
        relative: String,
        width: u32,
        height: u32,
        variants: Vec<VariantInfo>,
    },
    ImageFailed {
        index: usize,
        relative: String,
        message: String,
    },
}

/// Outcome of one planned derivative, for display.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantInfo {
    /// e.g. `"320w avif"`.
    pub label: String,
    pub result: Result<VariantStatus, String>,
}

/// A successfully processed source image and the derivatives it has on disk.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub source: SourceImage,
    pub variants: VariantSet,
}

/// An image left out of the run, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFailure {
    pub relative: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ProcessResult {
    /// Successful images, in scan order.
    pub images: Vec<ProcessedImage>,
    pub failures: Vec<ImageFailure>,
    pub stats: CacheStats,
}

/// Per-image outcome collected from the workers.
enum ImageOutcome {
    Processed(ProcessedImage, CacheStats),
    Failed(ImageFailure),
    Skipped,
}

/// Process images with the pure-Rust backend.
pub fn process(
    sources: &[SourceFile],
    config: &ProcessConfig,
    use_cache: bool,
    cancel: Option<&AtomicBool>,
    progress: Option<Sender<ProcessEvent>>,
) -> Result<ProcessResult, ProcessError> {
    let backend = RustBackend::new();
    process_with_backend(&backend, sources, config, use_cache, cancel, progress)
}

/// Process images using a specific backend (allows testing with mock).
pub fn process_with_backend<B: ImageBackend>(
    backend: &B,
    sources: &[SourceFile],
    config: &ProcessConfig,
    use_cache: bool,
    cancel: Option<&AtomicBool>,
    progress: Option<Sender<ProcessEvent>>,
) -> Result<ProcessResult, ProcessError> {
    let cache = Cache::open(config.staleness, use_cache, &config.generated_dir);

    if let Some(ref tx) = progress {
        tx.send(ProcessEvent::Started {
            image_count: sources.len(),
        })
        .ok();
    }

    let cancelled = || cancel.is_some_and(|flag| flag.load(Ordering::SeqCst));
    let clashes = name_clashes(sources);

    let outcomes: Vec<ImageOutcome> = sources
        .par_iter()
        .enumerate()
        .map(|(i, source)| {
            if cancelled() {
                return Ok(ImageOutcome::Skipped);
            }
            let outcome = match clashes[i] {
                Some(owner) => {
                    image_failure(source, format!("derivative names clash with {owner}"))
                }
                None => process_image(backend, source, config, &cache)?,
            };
            if let Some(ref tx) = progress {
                tx.send(progress_event(i + 1, &outcome)).ok();
            }
            Ok(match outcome {
                Ok(done) => ImageOutcome::Processed(done.image, done.stats),
                Err(failure) => ImageOutcome::Failed(failure),
            })
        })
        .collect::<Result<Vec<_>, ProcessError>>()?;

    // Derivatives written before an interruption are valid; keep their keys.
    cache.save()?;

    if cancelled() {
        return Err(ProcessError::Interrupted);
    }

    let mut result = ProcessResult::default();
    for outcome in outcomes {
        match outcome {
            ImageOutcome::Processed(image, stats) => {
                result.stats.merge(stats);
                result.images.push(image);
            }
            ImageOutcome::Failed(failure) => result.failures.push(failure),
            ImageOutcome::Skipped => {}
        }
    }
    Ok(result)
}

/// A processed image with its counters and per-derivative display info.
struct ImageDone {
    image: ProcessedImage,
    stats: CacheStats,
    infos: Vec<VariantInfo>,
}

type ImageResult = Result<ImageDone, ImageFailure>;

fn progress_event(index: usize, outcome: &ImageResult) -> ProcessEvent {
    match outcome {
        Ok(done) => ProcessEvent::ImageProcessed {
            index,
            relative: done.image.source.relative.clone(),
            width: done.image.source.width,
            height: done.image.source.height,
            variants: done.infos.clone(),
        },
        Err(failure) => ProcessEvent::ImageFailed {
            index,
            relative: failure.relative.clone(),
            message: failure.message.clone(),
        },
    }
}

/// Join a URL prefix and a `/`-separated relative path.
pub fn join_url(prefix: &str, relative: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), relative)
}

/// Directory part of a `/`-separated relative path (`""` at the root).
fn relative_dir(relative: &str) -> &str {
    relative.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// File stem that names an image's derivatives.
fn derivative_stem(relative: &str) -> String {
    Path::new(relative)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// For each source, the earlier source whose derivatives would land on the
/// same files. Stems compare case-insensitively so output stays distinct on
/// case-insensitive filesystems.
fn name_clashes(sources: &[SourceFile]) -> Vec<Option<&str>> {
    let mut owners: HashMap<(&str, String), &str> = HashMap::new();
    sources
        .iter()
        .map(|source| {
            let key = (
                relative_dir(&source.relative),
                derivative_stem(&source.relative).to_lowercase(),
            );
            match owners.entry(key) {
                Entry::Occupied(owner) => Some(*owner.get()),
                Entry::Vacant(slot) => {
                    slot.insert(&source.relative);
                    None
                }
            }
        })
        .collect()
}

fn image_failure(source: &SourceFile, message: String) -> ImageResult {
    tracing::warn!("skipping {}: {}", source.relative, message);
    Err(ImageFailure {
        relative: source.relative.clone(),
        message,
    })
}

fn join_relative(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Produce every derivative of one image.
///
/// The outer `Result` carries fatal errors; the inner one separates a
/// successfully processed image from a per-image failure.
fn process_image<B: ImageBackend>(
    backend: &B,
    source: &SourceFile,
    config: &ProcessConfig,
    cache: &Cache,
) -> Result<ImageResult, ProcessError> {
    let fail = |message: String| -> Result<ImageResult, ProcessError> {
        Ok(image_failure(source, message))
    };

    let modified = match std::fs::metadata(&source.path).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(e) => return fail(e.to_string()),
    };
    let key = match cache.source_key(&source.path, modified) {
        Ok(k) => k,
        Err(e) => return fail(e.to_string()),
    };
    let dims = match backend.identify(&source.path) {
        Ok(d) => d,
        Err(e) => return fail(e.to_string()),
    };
    if dims.width == 0 || dims.height == 0 {
        return fail(format!("zero-sized image ({}x{})", dims.width, dims.height));
    }

    let rel_dir = relative_dir(&source.relative);
    let output_dir = config.generated_dir.join(rel_dir);
    std::fs::create_dir_all(&output_dir).map_err(|e| ProcessError::CreateDir {
        path: output_dir.clone(),
        source: e,
    })?;

    let stem = derivative_stem(&source.relative);
    let plans = plan_variants(
        (dims.width, dims.height),
        &output_dir,
        &stem,
        &config.responsive,
    );

    // Settle what can be kept before deciding whether to decode at all.
    let decisions: Vec<(&VariantPlan, String, String, Option<VariantStatus>)> = plans
        .iter()
        .map(|plan| {
            let output_rel = join_relative(rel_dir, &plan.file_name);
            let params_hash = cache::hash_variant_params(
                plan.format,
                plan.width,
                plan.settings.quality.value(),
                plan.settings.effort.value(),
            );
            let kept = keep_existing(cache, &key, plan, &output_rel, &params_hash, config);
            (plan, output_rel, params_hash, kept)
        })
        .collect();

    let decoded = if decisions.iter().any(|(.., kept)| kept.is_none()) {
        match backend.load(&source.path) {
            Ok(image) => Some(image),
            Err(e) => return fail(e.to_string()),
        }
    } else {
        None
    };

    let mut variants = VariantSet::default();
    let mut stats = CacheStats::default();
    let mut infos = Vec::with_capacity(decisions.len());

    for (plan, output_rel, params_hash, kept) in decisions {
        let label = format!("{}w {}", plan.width, plan.format);
        let encoded = match (kept, decoded.as_ref()) {
            (Some(status), _) => Ok(status),
            (None, Some(image)) => encode(backend, image, plan).map(|()| VariantStatus::Generated),
            (None, None) => Err("source not decoded".to_string()),
        };
        let status = match encoded {
            Ok(status) => status,
            Err(message) => {
                tracing::warn!("{}: {}", output_rel, message);
                stats.failed += 1;
                infos.push(VariantInfo {
                    label,
                    result: Err(message),
                });
                continue;
            }
        };

        match status {
            VariantStatus::Reused => stats.reused += 1,
            VariantStatus::Copied => stats.copied += 1,
            VariantStatus::Generated => stats.generated += 1,
        }
        cache.record(&key, &output_rel, &params_hash);
        infos.push(VariantInfo {
            label,
            result: Ok(status),
        });
        variants.insert(Derivative {
            format: plan.format,
            width: plan.width,
            height: plan.height,
            path: plan.output.clone(),
            url: join_url(&config.generated_url_prefix, &output_rel),
            status,
        });
    }

    if variants.is_empty() {
        return fail(format!("no derivatives written ({} failed)", stats.failed));
    }

    Ok(Ok(ImageDone {
        image: ProcessedImage {
            source: SourceImage {
                path: source.path.clone(),
                relative: source.relative.clone(),
                url: join_url(&config.url_prefix, &source.relative),
                width: dims.width,
                height: dims.height,
                modified,
            },
            variants,
        },
        stats,
        infos,
    }))
}

/// Status of a derivative that needs no encode, or `None` when it must be
/// (re)generated.
fn keep_existing(
    cache: &Cache,
    key: &SourceKey,
    plan: &VariantPlan,
    output_rel: &str,
    params_hash: &str,
    config: &ProcessConfig,
) -> Option<VariantStatus> {
    match cache.lookup(key, &plan.output, output_rel, params_hash) {
        Lookup::Fresh => {
            tracing::debug!("{output_rel}: fresh");
            Some(VariantStatus::Reused)
        }
        Lookup::CopyFrom(stored) => {
            match std::fs::copy(config.generated_dir.join(&stored), &plan.output) {
                Ok(_) => {
                    tracing::debug!("{output_rel}: copied from {stored}");
                    Some(VariantStatus::Copied)
                }
                Err(e) => {
                    tracing::debug!("{output_rel}: copy from {stored} failed ({e})");
                    None
                }
            }
        }
        Lookup::Stale => {
            tracing::debug!("{output_rel}: stale");
            None
        }
    }
}

fn encode<B: ImageBackend>(backend: &B, image: &B::Image, plan: &VariantPlan) -> Result<(), String> {
    tracing::debug!("encoding {}", plan.output.display());
    encode_variant(backend, image, plan).map_err(|e| e.to_string())
}
