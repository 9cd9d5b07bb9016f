use std::ffi::OsString;
use std::path::Path;

use async_trait::async_trait;
use tracing::Instrument;

use crate::compressor::command::run_tool;
use crate::compressor::MediaCompressor;
use crate::error::CompressError;
use crate::job::options::PdfOptions;
use crate::job::{JobOptions, MediaKind};
use crate::sanitize::redact_path;

/// Rewrites PDFs through Ghostscript's `pdfwrite` device.
pub struct PdfCompressor {
    program: String,
}

impl PdfCompressor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl MediaCompressor for PdfCompressor {
    fn supports(&self, kind: MediaKind) -> bool {
        matches!(kind, MediaKind::Pdf)
    }

    fn output_extension(&self, options: &JobOptions) -> Result<&'static str, CompressError> {
        PdfOptions::parse(options)?;
        Ok("pdf")
    }

    async fn compress(
        &self,
        source: &Path,
        options: &JobOptions,
        destination: &Path,
    ) -> Result<(), CompressError> {
        let opts = PdfOptions::parse(options)?;
        let span = tracing::info_span!(
            "compressor.pdf",
            file = %redact_path(source),
            preset = opts.preset.gs_setting()
        );
        run_tool(&self.program, &gs_args(source, &opts, destination))
            .instrument(span)
            .await
    }
}

fn gs_args(source: &Path, opts: &PdfOptions, destination: &Path) -> Vec<OsString> {
    let mut output_file = OsString::from("-sOutputFile=");
    output_file.push(destination.as_os_str());

    vec![
        "-sDEVICE=pdfwrite".into(),
        "-dCompatibilityLevel=1.4".into(),
        format!("-dPDFSETTINGS={}", opts.preset.gs_setting()).into(),
        "-dNOPAUSE".into(),
        "-dQUIET".into(),
        "-dBATCH".into(),
        "-dSAFER".into(),
        "-dDetectDuplicateImages=true".into(),
        "-dCompressFonts=true".into(),
        format!("-r{}", opts.dpi).into(),
        output_file,
        source.as_os_str().to_owned(),
    ]
}
