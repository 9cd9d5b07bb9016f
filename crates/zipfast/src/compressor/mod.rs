pub mod command;
pub mod image;
pub mod media;
pub mod pdf;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::schema::ToolsConfig;
use crate::error::CompressError;
use crate::job::{JobOptions, MediaKind};
use crate::sanitize::redact_path;

/// One codec back-end. Writes its output to exactly the path it is given.
#[async_trait]
pub trait MediaCompressor: Send + Sync {
    fn supports(&self, kind: MediaKind) -> bool;

    /// Extension of the produced file. Also validates the options.
    fn output_extension(&self, options: &JobOptions) -> Result<&'static str, CompressError>;

    async fn compress(
        &self,
        source: &Path,
        options: &JobOptions,
        destination: &Path,
    ) -> Result<(), CompressError>;
}

/// The compression executor as seen by the job processor.
///
/// On success the destination file exists, is fully written and its size is
/// returned. On failure nothing is left at the destination.
#[async_trait]
pub trait Compressor: Send + Sync {
    fn output_extension(
        &self,
        kind: MediaKind,
        options: &JobOptions,
    ) -> Result<&'static str, CompressError>;

    async fn compress(
        &self,
        source: &Path,
        kind: MediaKind,
        options: &JobOptions,
        destination: &Path,
    ) -> Result<u64, CompressError>;
}

/// Routes each media kind to its back-end and makes the output appear
/// atomically: back-ends write a hidden partial file that is renamed into
/// place only after they succeed.
pub struct CompressorRegistry {
    compressors: Vec<Box<dyn MediaCompressor>>,
}

impl CompressorRegistry {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self::with_compressors(vec![
            Box::new(image::ImageCompressor::new()),
            Box::new(pdf::PdfCompressor::new(tools.ghostscript.clone())),
            Box::new(media::FfmpegCompressor::video(tools.ffmpeg.clone())),
            Box::new(media::FfmpegCompressor::audio(tools.ffmpeg.clone())),
        ])
    }

    pub fn with_compressors(compressors: Vec<Box<dyn MediaCompressor>>) -> Self {
        Self { compressors }
    }

    fn find(&self, kind: MediaKind) -> Result<&dyn MediaCompressor, CompressError> {
        self.compressors
            .iter()
            .find(|c| c.supports(kind))
            .map(|c| c.as_ref())
            .ok_or_else(|| CompressError::UnsupportedKind(kind.to_string()))
    }
}

#[async_trait]
impl Compressor for CompressorRegistry {
    fn output_extension(
        &self,
        kind: MediaKind,
        options: &JobOptions,
    ) -> Result<&'static str, CompressError> {
        self.find(kind)?.output_extension(options)
    }

    async fn compress(
        &self,
        source: &Path,
        kind: MediaKind,
        options: &JobOptions,
        destination: &Path,
    ) -> Result<u64, CompressError> {
        let compressor = self.find(kind)?;

        tokio::fs::metadata(source)
            .await
            .map_err(|e| CompressError::ReadInput {
                path: source.to_path_buf(),
                source: e,
            })?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CompressError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let partial = partial_path(destination);
        if let Err(e) = compressor.compress(source, options, &partial).await {
            discard(&partial).await;
            return Err(e);
        }

        if tokio::fs::metadata(&partial).await.is_err() {
            return Err(CompressError::MissingOutput(destination.to_path_buf()));
        }

        if let Err(e) = tokio::fs::rename(&partial, destination).await {
            discard(&partial).await;
            return Err(CompressError::Io {
                path: destination.to_path_buf(),
                source: e,
            });
        }

        let size = tokio::fs::metadata(destination)
            .await
            .map_err(|e| CompressError::Io {
                path: destination.to_path_buf(),
                source: e,
            })?
            .len();

        log::debug!(
            "Compressed {} ({}) into {} bytes",
            redact_path(source),
            kind,
            size
        );
        Ok(size)
    }
}

/// `dir/name.ext` -> `dir/.name.partial.ext`. The extension stays last so
/// tools that pick a container from it still work.
fn partial_path(destination: &Path) -> PathBuf {
    let stem = destination
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let name = match destination.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!(".{}.partial.{}", stem, ext),
        None => format!(".{}.partial", stem),
    };
    destination.with_file_name(name)
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => log::debug!("Removed partial output {}", redact_path(path)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!(
            "Failed to remove partial output {}: {}",
            redact_path(path),
            e
        ),
    }
}
