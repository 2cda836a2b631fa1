//! The full build: scan → process → manifest.
//!
//! Each stage is usable on its own; this module wires them together the way
//! `srcsetter build` runs them. The generated directory is excluded from the
//! scan so derivatives never become inputs, and the manifest is only written
//! once every image has been handled. An interrupted build leaves the previous
//! manifest untouched.

use crate::cache::CacheStats;
use crate::config::{Config, ResolvedPaths};
use crate::imaging::{ImageBackend, RustBackend};
use crate::manifest::{self, ManifestError};
use crate::process::{self, ImageFailure, ProcessConfig, ProcessError, ProcessEvent};
use crate::scan::{self, ScanError};
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("Processing failed: {0}")]
    Process(#[from] ProcessError),
    #[error("Manifest failed: {0}")]
    Manifest(#[from] ManifestError),
}

impl PipelineError {
    /// Whether the build stopped because it was cancelled.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, PipelineError::Process(ProcessError::Interrupted))
    }
}

/// What a completed build did.
#[derive(Debug)]
pub struct BuildOutcome {
    /// Raster images found by the scanner.
    pub found: usize,
    pub manifest_entries: usize,
    pub failures: Vec<ImageFailure>,
    pub stats: CacheStats,
}

/// Run the whole pipeline with the pure-Rust backend.
pub fn run(
    config: &Config,
    paths: &ResolvedPaths,
    use_cache: bool,
    cancel: Option<&AtomicBool>,
    progress: Option<Sender<ProcessEvent>>,
) -> Result<BuildOutcome, PipelineError> {
    run_with_backend(&RustBackend::new(), config, paths, use_cache, cancel, progress)
}

/// Run the whole pipeline using a specific backend (allows testing with mock).
pub fn run_with_backend<B: ImageBackend>(
    backend: &B,
    config: &Config,
    paths: &ResolvedPaths,
    use_cache: bool,
    cancel: Option<&AtomicBool>,
    progress: Option<Sender<ProcessEvent>>,
) -> Result<BuildOutcome, PipelineError> {
    let sources = scan::scan(&paths.source, Some(paths.generated.as_path()))?;
    tracing::info!(
        "found {} images under {}",
        sources.len(),
        paths.source.display()
    );

    let process_config = ProcessConfig::new(config, paths);
    let result = process::process_with_backend(
        backend,
        &sources,
        &process_config,
        use_cache,
        cancel,
        progress,
    )?;

    let image_manifest = manifest::build(&result.images);
    manifest::write(&image_manifest, &paths.manifest)?;
    tracing::info!(
        "wrote {} manifest entries to {}",
        image_manifest.len(),
        paths.manifest.display()
    );

    Ok(BuildOutcome {
        found: sources.len(),
        manifest_entries: image_manifest.len(),
        failures: result.failures,
        stats: result.stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::test_config;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn builds_manifest_for_banner() {
        let tmp = TempDir::new().unwrap();
        let config = test_config();
        let paths = config.resolve_paths(tmp.path());
        touch(&paths.source.join("banner.png"));
        touch(&paths.source.join("logo.svg"));
        let backend = MockBackend::new().with_image("banner.png", 1000, 500);

        let outcome = run_with_backend(&backend, &config, &paths, true, None, None).unwrap();
        assert_eq!(outcome.found, 1);
        assert_eq!(outcome.manifest_entries, 1);
        assert_eq!(outcome.stats.generated, 8);

        let written = manifest::load(&paths.manifest).unwrap();
        assert_eq!(
            written["/img/banner.png"].avif_src_set,
            "/img/generated/banner-320.avif 320w, /img/generated/banner-640.avif 640w, \
             /img/generated/banner-960.avif 960w, /img/generated/banner-1000.avif 1000w"
        );
        assert!(!serde_json::to_string(&written).unwrap().contains("svg"));
    }

    #[test]
    fn generated_directory_is_not_rescanned() {
        let tmp = TempDir::new().unwrap();
        let config = test_config();
        let paths = config.resolve_paths(tmp.path());
        touch(&paths.source.join("a.png"));
        let backend = MockBackend::new().with_image("a.png", 640, 480);

        run_with_backend(&backend, &config, &paths, true, None, None).unwrap();
        // Generated outputs now sit inside the asset root.
        touch(&paths.generated.join("stray-320.png"));
        let second = run_with_backend(&backend, &config, &paths, true, None, None).unwrap();
        assert_eq!(second.found, 1);
    }

    #[test]
    fn missing_asset_root_writes_empty_manifest() {
        let tmp = TempDir::new().unwrap();
        let config = test_config();
        let paths = config.resolve_paths(tmp.path());

        let outcome =
            run_with_backend(&MockBackend::new(), &config, &paths, true, None, None).unwrap();
        assert_eq!(outcome.found, 0);
        assert_eq!(fs::read_to_string(&paths.manifest).unwrap().trim(), "{}");
    }

    #[test]
    fn failed_image_is_left_out_of_manifest() {
        let tmp = TempDir::new().unwrap();
        let config = test_config();
        let paths = config.resolve_paths(tmp.path());
        touch(&paths.source.join("good.png"));
        touch(&paths.source.join("bad.jpg"));
        let backend = MockBackend::new().with_image("good.png", 320, 240);

        let outcome = run_with_backend(&backend, &config, &paths, true, None, None).unwrap();
        assert_eq!(outcome.failures.len(), 1);
        let written = manifest::load(&paths.manifest).unwrap();
        assert_eq!(written.keys().collect::<Vec<_>>(), vec!["/img/good.png"]);
    }

    #[test]
    fn interrupted_build_keeps_previous_manifest() {
        let tmp = TempDir::new().unwrap();
        let config = test_config();
        let paths = config.resolve_paths(tmp.path());
        touch(&paths.source.join("a.png"));
        touch(&paths.manifest);
        let backend = MockBackend::new().with_image("a.png", 320, 240);
        let cancel = AtomicBool::new(true);

        let err = run_with_backend(&backend, &config, &paths, true, Some(&cancel), None)
            .unwrap_err();
        assert!(err.is_interrupted());
        assert_eq!(fs::read(&paths.manifest).unwrap(), b"x");
    }

    #[test]
    fn scan_error_is_not_interrupted() {
        let tmp = TempDir::new().unwrap();
        let config = test_config();
        let paths = config.resolve_paths(tmp.path());
        touch(&paths.source);

        let err = run_with_backend(&MockBackend::new(), &config, &paths, true, None, None)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Scan(ScanError::NotADirectory(_))));
        assert!(!err.is_interrupted());
    }
}
