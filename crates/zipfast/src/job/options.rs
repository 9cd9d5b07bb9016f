//! Typed views over a job's free-form options.
//!
//! Options are stored exactly as submitted. Each compressor parses the subset
//! it understands here and rejects out-of-range values before running a tool.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::CompressError;
use crate::job::model::JobOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOptions {
    pub quality: u8,
    pub format: ImageFormat,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfPreset {
    Screen,
    Ebook,
    Printer,
    Prepress,
}

impl PdfPreset {
    /// Value for Ghostscript's `-dPDFSETTINGS`.
    pub fn gs_setting(&self) -> &'static str {
        match self {
            PdfPreset::Screen => "/screen",
            PdfPreset::Ebook => "/ebook",
            PdfPreset::Printer => "/printer",
            PdfPreset::Prepress => "/prepress",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfOptions {
    pub preset: PdfPreset,
    pub dpi: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoOptions {
    pub crf: u8,
    pub bitrate: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioOptions {
    pub quality: u8,
    pub bitrate: String,
}

const DEFAULT_IMAGE_QUALITY: u8 = 80;
const DEFAULT_PDF_DPI: u32 = 150;
const DEFAULT_VIDEO_CRF: u8 = 23;
const DEFAULT_VIDEO_BITRATE: &str = "1M";
const DEFAULT_AUDIO_QUALITY: u8 = 4;
const DEFAULT_AUDIO_BITRATE: &str = "128k";

static RE_BITRATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?[kKmM]?$").unwrap());

fn unsupported(message: String) -> CompressError {
    CompressError::UnsupportedParameters(message)
}

/// Reads an optional unsigned integer option within `[min, max]`.
fn int_in_range(
    options: &JobOptions,
    key: &str,
    min: u64,
    max: u64,
) -> Result<Option<u64>, CompressError> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let n = value.as_u64().ok_or_else(|| {
                unsupported(format!("{} must be a whole number, got {}", key, value))
            })?;
            if n < min || n > max {
                return Err(unsupported(format!(
                    "{} must be between {} and {}, got {}",
                    key, min, max, n
                )));
            }
            Ok(Some(n))
        }
    }
}

fn string_option<'a>(
    options: &'a JobOptions,
    key: &str,
) -> Result<Option<&'a str>, CompressError> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(unsupported(format!("{} must be a string, got {}", key, other))),
    }
}

fn bitrate_option(options: &JobOptions, default: &str) -> Result<String, CompressError> {
    match string_option(options, "bitrate")? {
        None => Ok(default.to_string()),
        Some(b) if RE_BITRATE.is_match(b) => Ok(b.to_string()),
        Some(b) => Err(unsupported(format!("invalid bitrate '{}'", b))),
    }
}

impl ImageOptions {
    pub fn parse(options: &JobOptions) -> Result<Self, CompressError> {
        let quality = int_in_range(options, "quality", 1, 100)?
            .map(|q| q as u8)
            .unwrap_or(DEFAULT_IMAGE_QUALITY);

        let format = match string_option(options, "format")? {
            None => ImageFormat::Jpeg,
            Some(f) => match f.to_lowercase().as_str() {
                "jpeg" | "jpg" => ImageFormat::Jpeg,
                "png" => ImageFormat::Png,
                "webp" => ImageFormat::Webp,
                other => {
                    return Err(unsupported(format!(
                        "unsupported image format '{}'",
                        other
                    )))
                }
            },
        };

        let width = int_in_range(options, "width", 1, u32::MAX as u64)?.map(|w| w as u32);
        let height = int_in_range(options, "height", 1, u32::MAX as u64)?.map(|h| h as u32);

        Ok(Self {
            quality,
            format,
            width,
            height,
        })
    }
}

impl PdfOptions {
    pub fn parse(options: &JobOptions) -> Result<Self, CompressError> {
        let preset = match options.get("quality") {
            None | Some(Value::Null) => PdfPreset::Ebook,
            Some(Value::String(s)) => match s.as_str() {
                "screen" => PdfPreset::Screen,
                "ebook" => PdfPreset::Ebook,
                "printer" => PdfPreset::Printer,
                "prepress" => PdfPreset::Prepress,
                other => return Err(unsupported(format!("unknown PDF preset '{}'", other))),
            },
            // A numeric quality carries no meaning for PDFs.
            Some(Value::Number(_)) => PdfPreset::Ebook,
            Some(other) => return Err(unsupported(format!("invalid PDF preset {}", other))),
        };

        let dpi = int_in_range(options, "dpi", 1, 2400)?
            .map(|d| d as u32)
            .unwrap_or(DEFAULT_PDF_DPI);

        Ok(Self { preset, dpi })
    }
}

impl VideoOptions {
    pub fn parse(options: &JobOptions) -> Result<Self, CompressError> {
        let crf = int_in_range(options, "quality", 0, 51)?
            .map(|q| q as u8)
            .unwrap_or(DEFAULT_VIDEO_CRF);
        let bitrate = bitrate_option(options, DEFAULT_VIDEO_BITRATE)?;
        Ok(Self { crf, bitrate })
    }
}

impl AudioOptions {
    pub fn parse(options: &JobOptions) -> Result<Self, CompressError> {
        let quality = int_in_range(options, "quality", 0, 9)?
            .map(|q| q as u8)
            .unwrap_or(DEFAULT_AUDIO_QUALITY);
        let bitrate = bitrate_option(options, DEFAULT_AUDIO_BITRATE)?;
        Ok(Self { quality, bitrate })
    }
}
