use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

use crate::compressor::MediaCompressor;
use crate::error::CompressError;
use crate::job::options::{ImageFormat, ImageOptions};
use crate::job::{JobOptions, MediaKind};
use crate::sanitize::redact_path;

/// Re-encodes images in-process with the `image` crate.
pub struct ImageCompressor;

impl ImageCompressor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageCompressor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaCompressor for ImageCompressor {
    fn supports(&self, kind: MediaKind) -> bool {
        matches!(kind, MediaKind::Image)
    }

    fn output_extension(&self, options: &JobOptions) -> Result<&'static str, CompressError> {
        Ok(ImageOptions::parse(options)?.format.extension())
    }

    async fn compress(
        &self,
        source: &Path,
        options: &JobOptions,
        destination: &Path,
    ) -> Result<(), CompressError> {
        let opts = ImageOptions::parse(options)?;
        let source = source.to_path_buf();
        let destination = destination.to_path_buf();

        tokio::task::spawn_blocking(move || encode(&source, &opts, &destination))
            .await
            .map_err(|e| CompressError::Aborted(e.to_string()))?
    }
}

fn encode(source: &Path, opts: &ImageOptions, destination: &Path) -> Result<(), CompressError> {
    let _span = tracing::info_span!(
        "compressor.image",
        file = %redact_path(source),
        quality = opts.quality
    )
    .entered();

    let img = image::open(source).map_err(|e| CompressError::Image(e.to_string()))?;
    let img = fit_inside(img, opts.width, opts.height);

    let file = File::create(destination).map_err(|e| io_error(destination, e))?;
    let mut writer = BufWriter::new(file);

    let result = match opts.format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, opts.quality))
        }
        ImageFormat::Png => img.write_with_encoder(PngEncoder::new_with_quality(
            &mut writer,
            CompressionType::Best,
            PngFilter::Adaptive,
        )),
        // The pure-Rust WebP encoder is lossless only; quality does not apply.
        ImageFormat::Webp => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            rgba.write_with_encoder(WebPEncoder::new_lossless(&mut writer))
        }
    };

    result.map_err(|e| CompressError::Image(e.to_string()))?;

    // A short final write must fail the job, not leave a truncated result.
    let file = writer
        .into_inner()
        .map_err(|e| io_error(destination, e.into_error()))?;
    file.sync_all().map_err(|e| io_error(destination, e))?;

    log::debug!("Encoded {} as {:?}", redact_path(source), opts.format);
    Ok(())
}

/// Shrinks `img` to fit inside the requested box, keeping the aspect ratio.
/// Never enlarges.
fn fit_inside(img: DynamicImage, width: Option<u32>, height: Option<u32>) -> DynamicImage {
    if width.is_none() && height.is_none() {
        return img;
    }

    let max_w = width.unwrap_or(img.width()).min(img.width());
    let max_h = height.unwrap_or(img.height()).min(img.height());

    if max_w == img.width() && max_h == img.height() {
        return img;
    }

    img.resize(max_w, max_h, FilterType::Lanczos3)
}

fn io_error(path: &Path, source: std::io::Error) -> CompressError {
    CompressError::Io {
        path: PathBuf::from(path),
        source,
    }
}
