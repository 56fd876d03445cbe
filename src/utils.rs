// utils.rs - FFmpeg process helpers and scratch-file bookkeeping
use crate::error::MediaError;
use crate::types::Canvas;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Format seconds the way ffmpeg expects them in `-t` / filter arguments.
pub fn format_seconds(seconds: f64) -> String {
    format!("{:.3}", seconds.max(0.0))
}

/// Execute an FFmpeg command, killing the child if the calling task is dropped.
pub async fn execute_ffmpeg_command(mut command: Command) -> Result<String, MediaError> {
    tracing::debug!("Executing FFmpeg: {:?}", command.as_std());

    let output = command
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| MediaError::Spawn {
            tool: "ffmpeg",
            source,
        })?;

    if !output.status.success() {
        return Err(MediaError::from_stderr("ffmpeg", &output.stderr));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Execute FFprobe for media analysis
pub async fn execute_ffprobe_command(args: &[&str]) -> Result<String, MediaError> {
    let output = Command::new("ffprobe")
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| MediaError::Spawn {
            tool: "ffprobe",
            source,
        })?;

    if !output.status.success() {
        return Err(MediaError::from_stderr("ffprobe", &output.stderr));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Check if FFmpeg and FFprobe are available
pub async fn check_ffmpeg_available() -> Result<(), String> {
    Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await
        .map_err(|_| "FFmpeg not found. Please install FFmpeg.".to_string())?;

    Command::new("ffprobe")
        .arg("-version")
        .output()
        .await
        .map_err(|_| "FFprobe not found. Please install FFmpeg with FFprobe.".to_string())?;

    Ok(())
}

/// Escape a value embedded in a filtergraph option (`key='value'`).
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' | '\'' | ':' | ',' | ';' | '[' | ']' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Letterbox a stream into the canvas without distorting it.
pub fn build_fit_filter(canvas: &Canvas, fps: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps}",
        w = canvas.width,
        h = canvas.height,
        fps = fps
    )
}

/// Line for an ffmpeg concat-demuxer list file.
pub fn concat_list_entry(path: &Path) -> String {
    let escaped = path.to_string_lossy().replace('\'', "'\\''");
    format!("file '{}'", escaped)
}

/// Intermediate files that must not outlive the operation that created them.
///
/// Every tracked path is removed when the guard drops, whichever way the
/// owning function returns.
#[derive(Debug, Default)]
pub struct ScratchFiles {
    paths: Vec<PathBuf>,
}

impl ScratchFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a path and hand it back for use.
    pub fn track(&mut self, path: PathBuf) -> PathBuf {
        self.paths.push(path.clone());
        path
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::trace!("released {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to release {}: {}", path.display(), e),
            }
        }
    }
}
