// src/core.rs

use crate::error::MediaError;
use crate::types::{Canvas, MediaInfo};
use crate::utils::{
    build_fit_filter, concat_list_entry, execute_ffmpeg_command, execute_ffprobe_command,
    format_seconds,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::process::Command;

pub async fn analyze_media(file_path: &Path) -> Result<MediaInfo, MediaError> {
    let path_arg = file_path.to_string_lossy();
    let args = &[
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
        &*path_arg,
    ];
    let ffprobe_output = execute_ffprobe_command(args).await?;
    parse_ffprobe_output(file_path, &ffprobe_output)
}

pub(crate) fn parse_ffprobe_output(file_path: &Path, output: &str) -> Result<MediaInfo, MediaError> {
    let json: Value = serde_json::from_str(output)
        .map_err(|e| MediaError::probe(file_path, format!("unparseable ffprobe output: {}", e)))?;

    let format = &json["format"];
    let duration_seconds = parse_number(&format["duration"]).ok_or_else(|| {
        MediaError::probe(file_path, "container reports no duration")
    })?;

    let mut info = MediaInfo {
        duration_seconds,
        ..Default::default()
    };

    if let Some(streams) = json["streams"].as_array() {
        for stream in streams {
            if stream["codec_type"] == "video" && !info.has_video {
                info.has_video = true;
                info.width = stream["width"].as_u64().unwrap_or(0) as u32;
                info.height = stream["height"].as_u64().unwrap_or(0) as u32;
                info.fps = parse_frame_rate(stream["r_frame_rate"].as_str().unwrap_or("0/1"));
            } else if stream["codec_type"] == "audio" && !info.has_audio {
                info.has_audio = true;
                info.audio_duration_seconds =
                    parse_number(&stream["duration"]).or(Some(duration_seconds));
            }
        }
    }

    Ok(info)
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn parse_frame_rate(rate: &str) -> f64 {
    let parts: Vec<&str> = rate.split('/').collect();
    if parts.len() == 2 {
        let num = parts[0].parse::<f64>().unwrap_or(0.0);
        let den = parts[1].parse::<f64>().unwrap_or(1.0);
        if den != 0.0 {
            return num / den;
        }
    }
    rate.parse::<f64>().unwrap_or(0.0)
}

/// Keep `[0, duration)` of the input's video stream.
pub async fn trim_video(
    input_file: &Path,
    output_file: &Path,
    duration: f64,
    fps: u32,
) -> Result<(), MediaError> {
    let mut command = Command::new("ffmpeg");
    command
        .arg("-i")
        .arg(input_file)
        .arg("-t")
        .arg(format_seconds(duration))
        .arg("-an")
        .arg("-c:v")
        .arg("libx264")
        .arg("-pix_fmt")
        .arg("yuv420p")
        .arg("-r")
        .arg(fps.to_string())
        .arg("-y")
        .arg(output_file);

    execute_ffmpeg_command(command).await.map(|_| ())
}

/// Concatenate the same clip with itself `repeats` times.
pub async fn repeat_video(
    input_file: &Path,
    output_file: &Path,
    repeats: u32,
    list_file: &Path,
) -> Result<(), MediaError> {
    let absolute = tokio::fs::canonicalize(input_file).await?;
    let entry = concat_list_entry(&absolute);
    let concat_list = vec![entry; repeats.max(1) as usize].join("\n");
    tokio::fs::write(list_file, concat_list).await?;

    let mut command = Command::new("ffmpeg");
    command
        .arg("-f")
        .arg("concat")
        .arg("-safe")
        .arg("0")
        .arg("-i")
        .arg(list_file)
        .arg("-an")
        .arg("-c")
        .arg("copy")
        .arg("-y")
        .arg(output_file);

    execute_ffmpeg_command(command).await.map(|_| ())
}

/// Join clips in the given order, letterboxed onto a common canvas.
/// Audio carried by the inputs is dropped.
pub async fn concat_videos(
    input_files: &[PathBuf],
    output_file: &Path,
    canvas: &Canvas,
    fps: u32,
) -> Result<(), MediaError> {
    let fit = build_fit_filter(canvas, fps);
    let mut filter = String::new();
    for index in 0..input_files.len() {
        filter.push_str(&format!("[{index}:v]{fit}[v{index}];"));
    }
    for index in 0..input_files.len() {
        filter.push_str(&format!("[v{index}]"));
    }
    filter.push_str(&format!("concat=n={}:v=1:a=0[outv]", input_files.len()));

    let mut command = Command::new("ffmpeg");
    for input in input_files {
        command.arg("-i").arg(input);
    }
    command
        .arg("-filter_complex")
        .arg(filter)
        .arg("-map")
        .arg("[outv]")
        .arg("-an")
        .arg("-c:v")
        .arg("libx264")
        .arg("-pix_fmt")
        .arg("yuv420p")
        .arg("-y")
        .arg(output_file);

    execute_ffmpeg_command(command).await.map(|_| ())
}
