//! Scene-cut detection.
//!
//! Runs a single analysis pass with ffmpeg's scene-score filter and
//! reads the cut timestamps out of `showinfo` lines on stderr. The
//! output is an ordered sequence of non-overlapping ranges covering the
//! whole stream; a video with no detected cuts yields one range.

use std::path::Path;

use gifsmith_models::TimeRange;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Detect scene boundaries for a video of known duration.
///
/// `sensitivity` spans 10..=60 with lower values producing more cuts,
/// matching the convention of content-based detectors.
pub async fn detect_scenes(
    input: impl AsRef<Path>,
    duration: f64,
    sensitivity: u32,
    timeout_secs: u64,
) -> MediaResult<Vec<TimeRange>> {
    let input = input.as_ref();

    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    let threshold = scene_threshold(sensitivity);
    debug!(
        "Detecting scenes in {} (threshold {:.2})",
        input.display(),
        threshold
    );

    let cmd = FfmpegCommand::new(input, "unused")
        .video_filter(format!("select='gt(scene,{:.2})',showinfo", threshold))
        .log_level("info")
        .null_output();

    let runner = FfmpegRunner::new().with_timeout(timeout_secs);
    let stderr = runner.run_capture(&cmd).await?;

    let cuts = parse_cut_times(&stderr, duration);
    let ranges = ranges_from_cuts(&cuts, duration);

    info!(
        "Detected {} scene(s) over {:.1}s of video",
        ranges.len(),
        duration
    );
    Ok(ranges)
}

/// Map user sensitivity (10..=60, lower = more cuts) onto ffmpeg's
/// 0..1 scene score threshold.
fn scene_threshold(sensitivity: u32) -> f64 {
    f64::from(sensitivity.clamp(10, 60)) / 100.0
}

/// Extract `pts_time` values from showinfo stderr lines.
fn parse_cut_times(lines: &[String], duration: f64) -> Vec<f64> {
    let mut cuts = Vec::new();

    for line in lines {
        if !line.contains("showinfo") {
            continue;
        }
        let Some(rest) = line.split("pts_time:").nth(1) else {
            continue;
        };
        let token: String = rest
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        if let Ok(t) = token.parse::<f64>() {
            if t > 0.0 && t < duration {
                cuts.push(t);
            }
        }
    }

    cuts.sort_by(f64::total_cmp);
    cuts.dedup();
    cuts
}

/// Turn a sorted cut list into contiguous ranges covering [0, duration].
fn ranges_from_cuts(cuts: &[f64], duration: f64) -> Vec<TimeRange> {
    let mut ranges = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0.0;

    for &cut in cuts {
        let range = TimeRange::new(start, cut);
        if range.is_valid() {
            ranges.push(range);
        }
        start = cut;
    }

    let tail = TimeRange::new(start, duration);
    if tail.is_valid() {
        ranges.push(tail);
    }

    if ranges.is_empty() {
        // No usable cuts at all: the entire video is one scene.
        ranges.push(TimeRange::new(0.0, duration));
    }

    ranges
}
