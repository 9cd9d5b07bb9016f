use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form compression parameters, interpreted only by the compressors.
pub type JobOptions = serde_json::Map<String, serde_json::Value>;

/// Lifecycle status of a compression job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// `completed` and `failed` are final; only deletion follows.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// The kind of media a job compresses. Fixed at upload time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Pdf,
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Pdf => "pdf",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    /// Detects the media kind from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "tiff" => Some(MediaKind::Image),
            "mp4" | "avi" | "mov" | "wmv" | "flv" | "webm" | "mkv" => Some(MediaKind::Video),
            "mp3" | "wav" | "flac" | "aac" | "ogg" | "wma" | "m4a" => Some(MediaKind::Audio),
            "pdf" => Some(MediaKind::Pdf),
            _ => None,
        }
    }

    /// Detects the media kind of an uploaded file name.
    pub fn from_filename(name: &str) -> Option<Self> {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaKind::Image),
            "pdf" => Ok(MediaKind::Pdf),
            "video" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            other => Err(format!("unknown media kind '{}'", other)),
        }
    }
}

/// A compression job as stored in the job store.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: i64,
    pub external_id: String,
    pub display_name: String,
    pub source_path: PathBuf,
    pub media_kind: MediaKind,
    pub status: JobStatus,
    pub options: JobOptions,
    pub result_path: Option<PathBuf>,
    pub original_size: u64,
    pub compressed_size: Option<u64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Percentage of bytes saved, formatted with two decimals (`"80.00%"`).
    ///
    /// `None` unless the job completed and the original size is non-zero.
    pub fn compression_ratio(&self) -> Option<String> {
        if self.status != JobStatus::Completed || self.original_size == 0 {
            return None;
        }
        let compressed = self.compressed_size? as f64;
        let original = self.original_size as f64;
        Some(format!("{:.2}%", (1.0 - compressed / original) * 100.0))
    }
}

/// Everything needed to insert a new pending job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub external_id: String,
    pub display_name: String,
    pub source_path: PathBuf,
    pub media_kind: MediaKind,
    pub options: JobOptions,
    pub original_size: u64,
    pub created_at: DateTime<Utc>,
}

impl NewJob {
    pub fn new(
        external_id: impl Into<String>,
        display_name: impl Into<String>,
        source_path: impl Into<PathBuf>,
        media_kind: MediaKind,
        options: JobOptions,
        original_size: u64,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            display_name: display_name.into(),
            source_path: source_path.into(),
            media_kind,
            options,
            original_size,
            created_at: Utc::now(),
        }
    }
}
