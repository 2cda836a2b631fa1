//! Freshness checks for incremental builds.
//!
//! AVIF encoding is the bottleneck of the pipeline, so derivatives that are
//! still valid are left alone. Two strategies decide "still valid":
//!
//! ## mtime (default)
//!
//! A derivative is fresh when its modification time is at or after the
//! source's. Cheap, and right for a single machine where both files are
//! written locally. Touching a source makes every derivative stale.
//!
//! ## content-hash
//!
//! `git checkout` and CI cache restores reset modification times, which makes
//! mtime either useless or wrong. In this mode lookups are keyed by the pair
//! (`source_hash`, `params_hash`):
//!
//! - **`source_hash`**: SHA-256 of the source file contents, computed once per
//!   source and shared across all its derivatives.
//! - **`params_hash`**: SHA-256 of (format, width, quality, effort). Changing
//!   any encoder setting invalidates exactly the affected derivatives.
//!
//! A hit requires a matching entry **and** the output file still on disk.
//! Because the key is content-addressed, a renamed or moved source finds its
//! old derivatives under their old path; they are copied into place instead
//! of being re-encoded.
//!
//! The cache manifest is a JSON file at `<generated_dir>/.cache-manifest.json`
//! so it travels with the generated directory when cached in CI.
//!
//! ## Bypassing the cache
//!
//! `--no-cache` regenerates every derivative. In content-hash mode it starts
//! from an empty cache manifest, which is then saved with the new entries.

use crate::config::Staleness;
use crate::types::Format;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

/// Name of the cache manifest file within the generated directory.
const MANIFEST_FILENAME: &str = ".cache-manifest.json";

/// Version of the cache manifest format. Bump this to invalidate all
/// existing caches when the format or key computation changes.
const MANIFEST_VERSION: u32 = 1;

/// Whether the output exists and was modified at or after `source_mtime`.
pub fn is_output_fresh(output: &Path, source_mtime: SystemTime) -> bool {
    output
        .metadata()
        .and_then(|m| m.modified())
        .map(|output_time| output_time >= source_mtime)
        .unwrap_or(false)
}

/// A single cached output file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_hash: String,
    pub params_hash: String,
}

/// On-disk cache manifest mapping output paths (relative to the generated
/// directory) to their cache entries.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: HashMap<String, CacheEntry>,
    /// Runtime reverse index: `"{source_hash}:{params_hash}"` → output path.
    /// Built at load time, maintained on insert. Never serialized.
    #[serde(skip)]
    content_index: HashMap<String, String>,
}

impl CacheManifest {
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: HashMap::new(),
            content_index: HashMap::new(),
        }
    }

    /// Load from the generated directory. Returns an empty manifest if the
    /// file doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(generated_dir: &Path) -> Self {
        let path = manifest_path(generated_dir);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let mut manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("ignoring unreadable cache manifest {}: {e}", path.display());
                return Self::empty();
            }
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::empty();
        }
        manifest.content_index = build_content_index(&manifest.entries);
        manifest
    }

    /// Write to the generated directory, creating it if no image has yet.
    pub fn save(&self, generated_dir: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::create_dir_all(generated_dir)?;
        std::fs::write(manifest_path(generated_dir), json)
    }

    /// Look up an output by content hashes.
    ///
    /// Returns the stored relative output path if a matching entry exists and
    /// the file is still on disk. The path may differ from the caller's own
    /// output path (e.g. after the source moved).
    pub fn find_cached(
        &self,
        source_hash: &str,
        params_hash: &str,
        generated_dir: &Path,
    ) -> Option<String> {
        let content_key = format!("{}:{}", source_hash, params_hash);
        let stored_path = self.content_index.get(&content_key)?;
        if generated_dir.join(stored_path).exists() {
            Some(stored_path.clone())
        } else {
            None
        }
    }

    /// Record a cache entry for an output file.
    ///
    /// If the same content was recorded under a different path, the old entry
    /// is dropped so the manifest follows moved sources.
    pub fn insert(&mut self, output_path: String, source_hash: String, params_hash: String) {
        let content_key = format!("{}:{}", source_hash, params_hash);

        if let Some(old_path) = self.content_index.get(&content_key) {
            if *old_path != output_path {
                self.entries.remove(old_path.as_str());
            }
        }

        self.content_index.insert(content_key, output_path.clone());
        self.entries.insert(
            output_path,
            CacheEntry {
                source_hash,
                params_hash,
            },
        );
    }
}

fn build_content_index(entries: &HashMap<String, CacheEntry>) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(output_path, entry)| {
            let content_key = format!("{}:{}", entry.source_hash, entry.params_hash);
            (content_key, output_path.clone())
        })
        .collect()
}

/// Resolve the cache manifest path for a generated directory.
pub fn manifest_path(generated_dir: &Path) -> PathBuf {
    generated_dir.join(MANIFEST_FILENAME)
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

/// SHA-256 hash of the encoding parameters for one derivative.
pub fn hash_variant_params(format: Format, width: u32, quality: u32, effort: u8) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format.extension().as_bytes());
    hasher.update(b"\0");
    hasher.update(width.to_le_bytes());
    hasher.update(quality.to_le_bytes());
    hasher.update([effort]);
    format!("{:x}", hasher.finalize())
}

/// What to do with one planned derivative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The output on disk can be kept as is.
    Fresh,
    /// Identical content exists at this path (relative to the generated dir).
    CopyFrom(String),
    /// The derivative must be encoded.
    Stale,
}

/// Per-source facts the freshness check needs, gathered once per image.
#[derive(Debug, Clone)]
pub struct SourceKey {
    pub modified: SystemTime,
    /// Present only in content-hash mode.
    pub hash: Option<String>,
}

/// Freshness oracle for a whole run. Shared across workers.
#[derive(Debug)]
pub enum Cache {
    /// `--no-cache` in mtime mode: everything is stale.
    Disabled,
    Mtime,
    ContentHash {
        generated_dir: PathBuf,
        manifest: Mutex<CacheManifest>,
    },
}

impl Cache {
    pub fn open(mode: Staleness, use_cache: bool, generated_dir: &Path) -> Self {
        match (mode, use_cache) {
            (Staleness::Mtime, true) => Cache::Mtime,
            (Staleness::Mtime, false) => Cache::Disabled,
            (Staleness::ContentHash, use_cache) => {
                let manifest = if use_cache {
                    CacheManifest::load(generated_dir)
                } else {
                    CacheManifest::empty()
                };
                Cache::ContentHash {
                    generated_dir: generated_dir.to_path_buf(),
                    manifest: Mutex::new(manifest),
                }
            }
        }
    }

    /// Gather the source facts this cache needs. Hashing reads the whole file.
    pub fn source_key(&self, source: &Path, modified: SystemTime) -> io::Result<SourceKey> {
        let hash = match self {
            Cache::ContentHash { .. } => Some(hash_file(source)?),
            _ => None,
        };
        Ok(SourceKey { modified, hash })
    }

    /// Decide whether the derivative at `output` (whose path relative to the
    /// generated dir is `output_rel`) must be encoded.
    pub fn lookup(&self, source: &SourceKey, output: &Path, output_rel: &str, params_hash: &str) -> Lookup {
        match self {
            Cache::Disabled => Lookup::Stale,
            Cache::Mtime => {
                if is_output_fresh(output, source.modified) {
                    Lookup::Fresh
                } else {
                    Lookup::Stale
                }
            }
            Cache::ContentHash {
                generated_dir,
                manifest,
            } => {
                let Some(source_hash) = source.hash.as_deref() else {
                    return Lookup::Stale;
                };
                let manifest = match manifest.lock() {
                    Ok(m) => m,
                    Err(poisoned) => poisoned.into_inner(),
                };
                match manifest.find_cached(source_hash, params_hash, generated_dir) {
                    Some(stored) if stored == output_rel => Lookup::Fresh,
                    Some(stored) => Lookup::CopyFrom(stored),
                    None => Lookup::Stale,
                }
            }
        }
    }

    /// Remember that `output_rel` now holds the derivative for these hashes.
    pub fn record(&self, source: &SourceKey, output_rel: &str, params_hash: &str) {
        if let (
            Cache::ContentHash { manifest, .. },
            Some(source_hash),
        ) = (self, source.hash.as_deref())
        {
            let mut manifest = match manifest.lock() {
                Ok(m) => m,
                Err(poisoned) => poisoned.into_inner(),
            };
            manifest.insert(
                output_rel.to_string(),
                source_hash.to_string(),
                params_hash.to_string(),
            );
        }
    }

    /// Persist the cache manifest (content-hash mode only).
    pub fn save(&self) -> io::Result<()> {
        if let Cache::ContentHash {
            generated_dir,
            manifest,
        } = self
        {
            let manifest = match manifest.lock() {
                Ok(m) => m,
                Err(poisoned) => poisoned.into_inner(),
            };
            manifest.save(generated_dir)?;
        }
        Ok(())
    }
}

/// Counts of derivatives by how they were obtained in a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub reused: u32,
    pub copied: u32,
    pub generated: u32,
    pub failed: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.reused + self.copied + self.generated + self.failed
    }

    pub fn merge(&mut self, other: CacheStats) {
        self.reused += other.reused;
        self.copied += other.copied;
        self.generated += other.generated;
        self.failed += other.failed;
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} generated, {} reused", self.generated, self.reused)?;
        if self.copied > 0 {
            write!(f, ", {} copied", self.copied)?;
        }
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        write!(f, " ({} total)", self.total())
    }
}
