//! Runs external codec tools (ffmpeg, Ghostscript).

use std::ffi::OsString;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::CompressError;

/// Bytes of stderr kept in a `ToolFailed` error.
const STDERR_TAIL: usize = 800;

/// Runs `program` with `args`, waiting for it to exit.
///
/// A missing binary maps to `ToolNotFound`; a nonzero exit to `ToolFailed`
/// carrying the end of stderr, which is where ffmpeg and gs put the reason.
pub async fn run_tool(program: &str, args: &[OsString]) -> Result<(), CompressError> {
    log::debug!("Running {} with {} arguments", program, args.len());

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CompressError::ToolNotFound {
                    program: program.to_string(),
                }
            } else {
                CompressError::ToolFailed {
                    program: program.to_string(),
                    status: "spawn error".to_string(),
                    stderr: e.to_string(),
                }
            }
        })?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(CompressError::ToolFailed {
        program: program.to_string(),
        status: output.status.to_string(),
        stderr: tail(stderr.trim(), STDERR_TAIL).to_string(),
    })
}

/// The last `max` bytes of `s`, cut on a char boundary.
fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
