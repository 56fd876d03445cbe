// src/audio.rs

use crate::error::MediaError;
use crate::utils::execute_ffmpeg_command;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Join narration tracks end to end, in the given order.
pub async fn concat_audio(input_files: &[PathBuf], output_file: &Path) -> Result<(), MediaError> {
    let mut filter = String::new();
    for index in 0..input_files.len() {
        filter.push_str(&format!("[{index}:a]"));
    }
    filter.push_str(&format!("concat=n={}:v=0:a=1[outa]", input_files.len()));

    let mut command = Command::new("ffmpeg");
    for input in input_files {
        command.arg("-i").arg(input);
    }
    command
        .arg("-filter_complex")
        .arg(filter)
        .arg("-map")
        .arg("[outa]")
        .arg("-c:a")
        .arg("pcm_s16le")
        .arg("-y")
        .arg(output_file);

    execute_ffmpeg_command(command).await.map(|_| ())
}

/// Replace whatever audio the video carries with `audio_file`.
pub async fn add_audio(
    video_file: &Path,
    audio_file: &Path,
    output_file: &Path,
) -> Result<(), MediaError> {
    let mut command = Command::new("ffmpeg");
    command
        .arg("-i")
        .arg(video_file)
        .arg("-i")
        .arg(audio_file)
        .arg("-map")
        .arg("0:v:0")
        .arg("-map")
        .arg("1:a:0")
        .arg("-c:v")
        .arg("copy")
        .arg("-c:a")
        .arg("aac")
        .arg("-f")
        .arg("mp4")
        .arg("-y")
        .arg(output_file);

    execute_ffmpeg_command(command).await.map(|_| ())
}
