//! Pipeline configuration.
//!
//! Loaded from `srcsetter.toml` in the project root (or the file passed with
//! `--config`). Every key is optional; a missing file means stock defaults.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! source = "static/img"                    # Asset root that is scanned
//! generated = "static/img/generated"       # Where derivatives are written
//! manifest = ".docusaurus/image-manifest.json"
//! url_prefix = "/img"                      # Public URL of the asset root
//! generated_url_prefix = "/img/generated"  # Public URL of the generated dir
//!
//! [images]
//! breakpoints = [320, 640, 960, 1280]      # Candidate widths, ascending
//! staleness = "mtime"                      # "mtime" or "content-hash"
//!
//! [formats.avif]
//! quality = 80                             # 1-100
//! effort = 4                               # 0 (fastest) - 9 (smallest files)
//!
//! [formats.webp]
//! quality = 80
//! effort = 6
//!
//! [processing]
//! max_processes = 4                        # Omit for auto = CPU cores
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{EncodeSettings, Effort, Quality};
use crate::types::Format;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the project root.
pub const CONFIG_FILENAME: &str = "srcsetter.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub paths: PathsConfig,
    pub images: ImagesConfig,
    pub formats: FormatsConfig,
    pub processing: ProcessingConfig,
}

/// Input/output locations and their public URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub source: PathBuf,
    pub generated: PathBuf,
    pub manifest: PathBuf,
    pub url_prefix: String,
    pub generated_url_prefix: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("static/img"),
            generated: PathBuf::from("static/img/generated"),
            manifest: PathBuf::from(".docusaurus/image-manifest.json"),
            url_prefix: "/img".to_string(),
            generated_url_prefix: "/img/generated".to_string(),
        }
    }
}

/// How the process stage decides whether an existing derivative can be kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Staleness {
    /// Output is fresh when its mtime is at or after the source's.
    #[default]
    Mtime,
    /// Output is fresh when the source bytes and encode parameters hash to the
    /// same key as when it was written. Survives checkouts that reset mtimes.
    ContentHash,
}

/// Responsive variant settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Candidate target widths in pixels, strictly ascending.
    pub breakpoints: Vec<u32>,
    pub staleness: Staleness,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            breakpoints: vec![320, 640, 960, 1280],
            staleness: Staleness::default(),
        }
    }
}

/// Per-format encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatConfig {
    pub quality: u32,
    pub effort: u8,
}

impl FormatConfig {
    pub fn settings(&self) -> EncodeSettings {
        EncodeSettings {
            quality: Quality::new(self.quality),
            effort: Effort::new(self.effort),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatsConfig {
    pub avif: FormatConfig,
    pub webp: FormatConfig,
}

impl Default for FormatsConfig {
    fn default() -> Self {
        Self {
            avif: FormatConfig {
                quality: 80,
                effort: 4,
            },
            webp: FormatConfig {
                quality: 80,
                effort: 6,
            },
        }
    }
}

impl FormatsConfig {
    pub fn get(&self, format: Format) -> &FormatConfig {
        match format {
            Format::Avif => &self.avif,
            Format::Webp => &self.webp,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Filesystem locations with relative paths resolved against a project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub source: PathBuf,
    pub generated: PathBuf,
    pub manifest: PathBuf,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let breakpoints = &self.images.breakpoints;
        if breakpoints.is_empty() {
            return Err(ConfigError::Validation(
                "images.breakpoints must not be empty".into(),
            ));
        }
        if breakpoints.contains(&0) {
            return Err(ConfigError::Validation(
                "images.breakpoints values must be non-zero".into(),
            ));
        }
        if breakpoints.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::Validation(
                "images.breakpoints must be strictly ascending".into(),
            ));
        }
        for format in Format::ALL {
            let fc = self.formats.get(format);
            if !(1..=100).contains(&fc.quality) {
                return Err(ConfigError::Validation(format!(
                    "formats.{format}.quality must be 1-100"
                )));
            }
            if fc.effort > Effort::MAX {
                return Err(ConfigError::Validation(format!(
                    "formats.{format}.effort must be 0-{}",
                    Effort::MAX
                )));
            }
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Move the generated directory, keeping its public URL in step.
    ///
    /// When `dir` lies inside the asset root, `generated_url_prefix` becomes
    /// `url_prefix` plus the path between them. Otherwise the configured
    /// prefix is kept and a warning is logged, since it cannot be inferred.
    pub fn set_generated_dir(&mut self, dir: PathBuf) {
        match dir.strip_prefix(&self.paths.source) {
            Ok(inner) => {
                let base = self.paths.url_prefix.trim_end_matches('/');
                let inner: Vec<String> = inner
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                self.paths.generated_url_prefix = if inner.is_empty() {
                    base.to_string()
                } else {
                    format!("{}/{}", base, inner.join("/"))
                };
            }
            Err(_) => tracing::warn!(
                "{} is outside the asset root; derivative URLs keep prefix {}",
                dir.display(),
                self.paths.generated_url_prefix
            ),
        }
        self.paths.generated = dir;
    }

    /// Resolve the configured paths against `root`. Absolute paths are kept.
    pub fn resolve_paths(&self, root: &Path) -> ResolvedPaths {
        ResolvedPaths {
            source: root.join(&self.paths.source),
            generated: root.join(&self.paths.generated),
            manifest: root.join(&self.paths.manifest),
        }
    }
}

/// Parse and validate config from a TOML string.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load config from an explicit file. The file must exist.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Load `srcsetter.toml` from `root`, falling back to defaults when absent.
pub fn load_config(root: &Path) -> Result<Config, ConfigError> {
    let path = root.join(CONFIG_FILENAME);
    if !path.exists() {
        return Ok(Config::default());
    }
    load_config_file(&path)
}

/// A documented stock config, printed by `srcsetter gen-config`.
pub fn stock_config_toml() -> &'static str {
    r#"# srcsetter configuration
# All options are optional. Values shown are the defaults.

[paths]
# Asset root that is scanned for .png/.jpg/.jpeg files
source = "static/img"
# Where AVIF/WebP derivatives are written (mirrors the source layout)
generated = "static/img/generated"
# JSON manifest consumed by the page-rendering layer
manifest = ".docusaurus/image-manifest.json"
# Public URL of the asset root
url_prefix = "/img"
# Public URL of the generated directory
generated_url_prefix = "/img/generated"

[images]
# Candidate widths in pixels, strictly ascending. Widths above the original
# are skipped, and the original width is always generated.
breakpoints = [320, 640, 960, 1280]
# "mtime": regenerate when the source is newer than the derivative
# "content-hash": regenerate when source bytes or encode settings change
staleness = "mtime"

[formats.avif]
quality = 80   # 1-100
effort = 4     # 0 (fastest) - 9 (slowest, smallest)

[formats.webp]
quality = 80
effort = 6

[processing]
# Max parallel image workers (omit for auto = CPU cores)
# max_processes = 4
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.images.breakpoints, vec![320, 640, 960, 1280]);
        assert_eq!(config.images.staleness, Staleness::Mtime);
        assert_eq!(config.formats.avif.quality, 80);
        assert_eq!(config.formats.avif.effort, 4);
        assert_eq!(config.formats.webp.effort, 6);
        assert_eq!(config.paths.source, PathBuf::from("static/img"));
        assert_eq!(config.paths.url_prefix, "/img");
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config = parse_config(stock_config_toml()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn parse_partial_config() {
        let config = parse_config(
            r#"
[images]
breakpoints = [100, 200]

[formats.webp]
quality = 60
effort = 2
"#,
        )
        .unwrap();
        assert_eq!(config.images.breakpoints, vec![100, 200]);
        assert_eq!(config.formats.webp.quality, 60);
        // Unspecified defaults preserved
        assert_eq!(config.formats.avif, FormatsConfig::default().avif);
        assert_eq!(config.paths, PathsConfig::default());
    }

    #[test]
    fn parse_content_hash_staleness() {
        let config = parse_config("[images]\nstaleness = \"content-hash\"\n").unwrap();
        assert_eq!(config.images.staleness, Staleness::ContentHash);
    }

    #[test]
    fn generated_dir_inside_source_derives_url_prefix() {
        let mut config = Config::default();
        config.set_generated_dir(PathBuf::from("static/img/build/responsive"));
        assert_eq!(config.paths.generated, PathBuf::from("static/img/build/responsive"));
        assert_eq!(config.paths.generated_url_prefix, "/img/build/responsive");
    }

    #[test]
    fn generated_dir_outside_source_keeps_url_prefix() {
        let mut config = Config::default();
        config.paths.generated_url_prefix = "/cdn/responsive".into();
        config.set_generated_dir(PathBuf::from("public/responsive"));
        assert_eq!(config.paths.generated, PathBuf::from("public/responsive"));
        assert_eq!(config.paths.generated_url_prefix, "/cdn/responsive");
    }

    #[test]
    fn unknown_key_rejected() {
        let result = parse_config("[images]\nbreakpionts = [1]\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_section_rejected() {
        let result = parse_config("[thumbnails]\nsize = 1\n");
        assert!(result.is_err());
    }

    #[test]
    fn validate_breakpoints_empty() {
        let mut config = Config::default();
        config.images.breakpoints.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_breakpoints_not_ascending() {
        let mut config = Config::default();
        config.images.breakpoints = vec![640, 320];
        assert!(config.validate().is_err());
        config.images.breakpoints = vec![320, 320];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_breakpoint_zero() {
        let mut config = Config::default();
        config.images.breakpoints = vec![0, 320];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_quality_bounds() {
        let mut config = Config::default();
        config.formats.avif.quality = 100;
        assert!(config.validate().is_ok());
        config.formats.avif.quality = 0;
        assert!(config.validate().is_err());
        config.formats.avif.quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_effort_bound() {
        let mut config = Config::default();
        config.formats.webp.effort = 10;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("formats.webp.effort"), "{err}");
    }

    #[test]
    fn validate_max_processes_zero() {
        let mut config = Config::default();
        config.processing.max_processes = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[paths]\nsource = \"assets\"\n",
        )
        .unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.paths.source, PathBuf::from("assets"));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "[images\n").unwrap();
        assert!(load_config(tmp.path()).is_err());
    }

    #[test]
    fn load_config_file_missing_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config_file(&tmp.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn resolve_paths_joins_root() {
        let paths = Config::default().resolve_paths(Path::new("/site"));
        assert_eq!(paths.source, PathBuf::from("/site/static/img"));
        assert_eq!(paths.generated, PathBuf::from("/site/static/img/generated"));
        assert_eq!(
            paths.manifest,
            PathBuf::from("/site/.docusaurus/image-manifest.json")
        );
    }

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(cores + 100),
        };
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }
}
