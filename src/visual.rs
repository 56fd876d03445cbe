// src/visual.rs

use crate::error::MediaError;
use crate::types::{Caption, CaptionStyle};
use crate::utils::{escape_filter_value, execute_ffmpeg_command, format_seconds};
use std::path::Path;
use tokio::process::Command;

/// drawtext filter for a bottom-centered, outlined caption read from `text_file`.
pub fn build_caption_filter(style: &CaptionStyle, text_file: &Path, duration: f64) -> String {
    let mut filter = format!(
        "drawtext=textfile='{}':fontsize={}:fontcolor={}:bordercolor={}:borderw={}:x=(w-text_w)/2:y=h-text_h-{}",
        escape_filter_value(&text_file.to_string_lossy()),
        style.font_size,
        style.color,
        style.stroke_color,
        style.stroke_width,
        style.font_size / 2,
    );
    if let Some(font) = &style.font_file {
        filter.push_str(&format!(
            ":fontfile='{}'",
            escape_filter_value(&font.to_string_lossy())
        ));
    }
    filter.push_str(&format!(":enable='between(t,0,{})'", format_seconds(duration)));
    filter
}

/// Burn the caption into the clip. The caption text goes through a file so
/// narration punctuation never has to survive filtergraph quoting.
pub async fn add_caption(
    input_file: &Path,
    output_file: &Path,
    caption: &Caption,
    text_file: &Path,
    fps: u32,
) -> Result<(), MediaError> {
    tokio::fs::write(text_file, caption.text.as_bytes()).await?;
    let filter = build_caption_filter(&caption.style, text_file, caption.duration_seconds);

    let mut command = Command::new("ffmpeg");
    command
        .arg("-i")
        .arg(input_file)
        .arg("-vf")
        .arg(filter)
        .arg("-an")
        .arg("-c:v")
        .arg("libx264")
        .arg("-preset")
        .arg("medium")
        .arg("-pix_fmt")
        .arg("yuv420p")
        .arg("-r")
        .arg(fps.to_string())
        .arg("-y")
        .arg(output_file);

    execute_ffmpeg_command(command).await.map(|_| ())
}
