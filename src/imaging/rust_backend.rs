//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `ImageReader::into_dimensions` (header only) |
//! | Decode (JPEG, PNG) | `image` crate (pure Rust decoders) |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed from effort) |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |
//!
//! Outputs are written to a sibling `.part` file and renamed into place, so an
//! interrupted encode never leaves a truncated file whose fresh mtime would
//! make it look reusable on the next run.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{EncodeSettings, ResizeParams};
use crate::types::Format;
use image::codecs::avif::AvifEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk, sniffing the format from content.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| BackendError::DecodeFailed(format!("{}: {}", path.display(), e)))
}

/// Normalize to 8-bit RGB or RGBA, the layouts both encoders accept.
fn to_encodable(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

fn encode(
    img: &DynamicImage,
    writer: impl Write,
    format: Format,
    settings: EncodeSettings,
) -> Result<(), BackendError> {
    let result = match format {
        Format::Avif => img.write_with_encoder(AvifEncoder::new_with_speed_quality(
            writer,
            settings.effort.avif_speed(),
            settings.quality.value() as u8,
        )),
        // The pure-Rust WebP encoder is lossless only; quality/effort still
        // participate in the content-hash cache key.
        Format::Webp => img.write_with_encoder(WebPEncoder::new_lossless(writer)),
    };
    result.map_err(|e| BackendError::EncodeFailed(format!("{format} encode failed: {e}")))
}

/// Encode `img` into `path` via a temporary `.part` file.
fn save_image(
    img: &DynamicImage,
    path: &Path,
    format: Format,
    settings: EncodeSettings,
) -> Result<(), BackendError> {
    let tmp = partial_path(path);
    let written = (|| {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        encode(img, &mut writer, format, settings)?;
        writer.flush()?;
        Ok::<(), BackendError>(())
    })();
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

impl ImageBackend for RustBackend {
    type Image = DynamicImage;

    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::open(path)?
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| BackendError::DecodeFailed(format!("{}: {}", path.display(), e)))?;
        Ok(Dimensions { width, height })
    }

    fn load(&self, path: &Path) -> Result<DynamicImage, BackendError> {
        load_image(path).map(to_encodable)
    }

    fn resize(&self, image: &DynamicImage, params: &ResizeParams) -> Result<(), BackendError> {
        if params.width == image.width() && params.height == image.height() {
            return save_image(image, &params.output, params.format, params.settings);
        }
        let resized = image.resize_exact(params.width, params.height, FilterType::Lanczos3);
        save_image(&resized, &params.output, params.format, params.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::{Effort, Quality};
    use crate::test_helpers::{create_test_jpeg, create_test_png};

    fn fast_settings() -> EncodeSettings {
        EncodeSettings {
            quality: Quality::new(60),
            effort: Effort::new(0),
        }
    }

    #[test]
    fn load_synthetic_png() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.png");
        create_test_png(&path, 200, 150);

        let backend = RustBackend::new();
        let img = backend.load(&path).unwrap();
        assert_eq!((img.width(), img.height()), (200, 150));
    }

    #[test]
    fn identify_reads_header_dimensions() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("wide.png");
        create_test_png(&path, 300, 100);

        let dims = RustBackend::new().identify(&path).unwrap();
        assert_eq!(dims, Dimensions { width: 300, height: 100 });
    }

    #[test]
    fn load_jpeg_with_uppercase_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("PHOTO.JPG");
        create_test_jpeg(&path, 64, 48);

        let backend = RustBackend::new();
        let img = backend.load(&path).unwrap();
        assert_eq!(img.width(), 64);
    }

    #[test]
    fn load_nonexistent_file_errors() {
        let backend = RustBackend::new();
        let result = backend.load(Path::new("/nonexistent/image.png"));
        assert!(matches!(result, Err(BackendError::Io(_))));
    }

    #[test]
    fn load_corrupt_file_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nnot really a png").unwrap();

        let backend = RustBackend::new();
        assert!(matches!(
            backend.load(&path),
            Err(BackendError::DecodeFailed(_))
        ));
    }

    #[test]
    fn resize_to_webp_has_target_dimensions() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.png");
        create_test_png(&source, 100, 50);

        let backend = RustBackend::new();
        let img = backend.load(&source).unwrap();
        let output = tmp.path().join("source-40.webp");
        backend
            .resize(
                &img,
                &ResizeParams {
                    output: output.clone(),
                    width: 40,
                    height: 20,
                    format: Format::Webp,
                    settings: fast_settings(),
                },
            )
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (40, 20));
        assert!(!partial_path(&output).exists());
    }

    #[test]
    fn resize_to_avif_writes_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 64, 32);

        let backend = RustBackend::new();
        let img = backend.load(&source).unwrap();
        let output = tmp.path().join("source-32.avif");
        backend
            .resize(
                &img,
                &ResizeParams {
                    output: output.clone(),
                    width: 32,
                    height: 16,
                    format: Format::Avif,
                    settings: fast_settings(),
                },
            )
            .unwrap();

        assert!(std::fs::metadata(&output).unwrap().len() > 0);
    }

    #[test]
    fn resize_into_missing_directory_errors_without_leftovers() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.png");
        create_test_png(&source, 20, 20);

        let backend = RustBackend::new();
        let img = backend.load(&source).unwrap();
        let output = tmp.path().join("missing/dir/out-10.webp");
        let result = backend.resize(
            &img,
            &ResizeParams {
                output: output.clone(),
                width: 10,
                height: 10,
                format: Format::Webp,
                settings: fast_settings(),
            },
        );
        assert!(matches!(result, Err(BackendError::Io(_))));
        assert!(!output.exists());
    }

    #[test]
    fn to_encodable_normalizes_sixteen_bit() {
        let img = DynamicImage::ImageRgb16(image::ImageBuffer::new(2, 2));
        assert!(matches!(to_encodable(img), DynamicImage::ImageRgb8(_)));
        let img = DynamicImage::ImageLumaA8(image::ImageBuffer::new(2, 2));
        assert!(matches!(to_encodable(img), DynamicImage::ImageRgba8(_)));
    }
}
