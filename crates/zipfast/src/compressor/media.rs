use std::ffi::OsString;
use std::path::Path;

use async_trait::async_trait;
use tracing::Instrument;

use crate::compressor::command::run_tool;
use crate::compressor::MediaCompressor;
use crate::error::CompressError;
use crate::job::options::{AudioOptions, VideoOptions};
use crate::job::{JobOptions, MediaKind};
use crate::sanitize::redact_path;

/// Video (H.264/AAC in MP4) and audio (MP3) transcoding through ffmpeg.
pub struct FfmpegCompressor {
    program: String,
    kind: MediaKind,
}

impl FfmpegCompressor {
    pub fn video(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            kind: MediaKind::Video,
        }
    }

    pub fn audio(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            kind: MediaKind::Audio,
        }
    }

    fn args(
        &self,
        source: &Path,
        options: &JobOptions,
        destination: &Path,
    ) -> Result<Vec<OsString>, CompressError> {
        match self.kind {
            MediaKind::Video => {
                let opts = VideoOptions::parse(options)?;
                Ok(video_args(source, &opts, destination))
            }
            MediaKind::Audio => {
                let opts = AudioOptions::parse(options)?;
                Ok(audio_args(source, &opts, destination))
            }
            other => Err(CompressError::UnsupportedKind(other.to_string())),
        }
    }
}

#[async_trait]
impl MediaCompressor for FfmpegCompressor {
    fn supports(&self, kind: MediaKind) -> bool {
        kind == self.kind
    }

    fn output_extension(&self, options: &JobOptions) -> Result<&'static str, CompressError> {
        match self.kind {
            MediaKind::Video => VideoOptions::parse(options).map(|_| "mp4"),
            MediaKind::Audio => AudioOptions::parse(options).map(|_| "mp3"),
            other => Err(CompressError::UnsupportedKind(other.to_string())),
        }
    }

    async fn compress(
        &self,
        source: &Path,
        options: &JobOptions,
        destination: &Path,
    ) -> Result<(), CompressError> {
        let args = self.args(source, options, destination)?;
        let span = tracing::info_span!(
            "compressor.ffmpeg",
            kind = self.kind.as_str(),
            file = %redact_path(source)
        );
        run_tool(&self.program, &args).instrument(span).await
    }
}

fn input_args(source: &Path) -> Vec<OsString> {
    vec![
        "-hide_banner".into(),
        "-nostdin".into(),
        "-y".into(),
        "-i".into(),
        source.as_os_str().to_owned(),
    ]
}

fn video_args(source: &Path, opts: &VideoOptions, destination: &Path) -> Vec<OsString> {
    let crf = opts.crf.to_string();
    let mut args = input_args(source);
    args.extend(
        [
            "-c:v",
            "libx264",
            "-crf",
            crf.as_str(),
            "-b:v",
            opts.bitrate.as_str(),
            "-preset",
            "medium",
            "-c:a",
            "aac",
            "-b:a",
            "128k",
            "-movflags",
            "+faststart",
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.push(destination.as_os_str().to_owned());
    args
}

fn audio_args(source: &Path, opts: &AudioOptions, destination: &Path) -> Vec<OsString> {
    let quality = opts.quality.to_string();
    let mut args = input_args(source);
    args.extend(
        [
            "-vn",
            "-c:a",
            "libmp3lame",
            "-b:a",
            opts.bitrate.as_str(),
            "-q:a",
            quality.as_str(),
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.push(destination.as_os_str().to_owned());
    args
}
