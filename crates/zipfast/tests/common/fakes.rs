#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use zipfast::{CompressError, Compressor, JobOptions, MediaKind};

/// Writes a result of a fixed size, or fails with a tool error.
pub struct FakeCompressor {
    output_size: usize,
    failure: Option<String>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeCompressor {
    pub fn producing(output_size: usize) -> Self {
        Self {
            output_size,
            failure: None,
            gate: None,
        }
    }

    pub fn failing(stderr: &str) -> Self {
        Self {
            output_size: 0,
            failure: Some(stderr.to_string()),
            gate: None,
        }
    }

    /// Every compression waits until `gate` has a permit.
    pub fn gated(output_size: usize, gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::producing(output_size)
        }
    }
}

#[async_trait]
impl Compressor for FakeCompressor {
    fn output_extension(
        &self,
        kind: MediaKind,
        _options: &JobOptions,
    ) -> Result<&'static str, CompressError> {
        Ok(match kind {
            MediaKind::Image => "jpg",
            MediaKind::Pdf => "pdf",
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
        })
    }

    async fn compress(
        &self,
        source: &Path,
        _kind: MediaKind,
        _options: &JobOptions,
        destination: &Path,
    ) -> Result<u64, CompressError> {
        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| CompressError::Aborted(e.to_string()))?;
        }

        if let Some(stderr) = &self.failure {
            return Err(CompressError::ToolFailed {
                program: "ffmpeg".to_string(),
                status: "exit status: 1".to_string(),
                stderr: stderr.clone(),
            });
        }

        tokio::fs::metadata(source)
            .await
            .map_err(|e| CompressError::ReadInput {
                path: source.to_path_buf(),
                source: e,
            })?;
        tokio::fs::write(destination, vec![0u8; self.output_size])
            .await
            .map_err(|e| CompressError::Io {
                path: destination.to_path_buf(),
                source: e,
            })?;
        Ok(self.output_size as u64)
    }
}
