//! GIF encoding operations.

use std::path::Path;

use gifsmith_models::TimeRange;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Extract one time range of a video as an optimized GIF.
pub async fn extract_clip_gif(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    range: TimeRange,
    fps: u32,
    width: u32,
    timeout_secs: u64,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();

    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }
    if !range.is_valid() {
        return Err(MediaError::InvalidRange(format!(
            "{:.3}..{:.3}",
            range.start, range.end
        )));
    }

    debug!(
        "Encoding GIF {} ({:.1}s-{:.1}s, fps={}, width={})",
        output.display(),
        range.start,
        range.end,
        fps,
        width
    );

    let cmd = FfmpegCommand::new(input, output)
        .seek(range.start)
        .duration(range.duration())
        .video_filter(format!("fps={},scale={}:-1:flags=fast_bilinear", fps, width))
        .loop_forever();

    FfmpegRunner::new().with_timeout(timeout_secs).run(&cmd).await
}

/// Convert an existing GIF to its grayscale variant.
pub async fn convert_grayscale(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    timeout_secs: u64,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();

    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    info!("Converting to grayscale: {}", output.display());

    let cmd = FfmpegCommand::new(input, output)
        .video_filter("format=gray")
        .loop_forever();

    FfmpegRunner::new().with_timeout(timeout_secs).run(&cmd).await
}

/// Concatenate several GIFs sequentially into one.
///
/// Inputs are scaled to a common width first so the concat filter sees
/// uniform frames.
pub async fn merge_concat(
    inputs: &[impl AsRef<Path>],
    output: impl AsRef<Path>,
    width: u32,
    timeout_secs: u64,
) -> MediaResult<()> {
    let output = output.as_ref();

    if inputs.len() < 2 {
        return Err(MediaError::InvalidVideo(
            "merge needs at least two inputs".to_string(),
        ));
    }
    for input in inputs {
        let input = input.as_ref();
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }
    }

    info!("Concatenating {} GIFs into {}", inputs.len(), output.display());

    let filter = build_concat_filter(inputs.len(), width);

    let mut cmd = FfmpegCommand::new(inputs[0].as_ref(), output);
    for input in &inputs[1..] {
        cmd = cmd.add_input(input.as_ref());
    }
    let cmd = cmd.filter_complex(filter).map("[out]").loop_forever();

    FfmpegRunner::new().with_timeout(timeout_secs).run(&cmd).await
}

/// Build the scale+setsar+concat filter graph for `n` inputs.
fn build_concat_filter(n: usize, width: u32) -> String {
    let mut parts = Vec::with_capacity(n + 1);
    let mut labels = String::new();

    for i in 0..n {
        parts.push(format!(
            "[{i}]scale={width}:-1:flags=fast_bilinear,setsar=1[v{i}]"
        ));
        labels.push_str(&format!("[v{i}]"));
    }
    parts.push(format!("{labels}concat=n={n}:v=1:a=0[out]"));
    parts.join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_filter_shape() {
        let filter = build_concat_filter(3, 480);
        assert!(filter.starts_with("[0]scale=480:-1:flags=fast_bilinear,setsar=1[v0];"));
        assert!(filter.ends_with("[v0][v1][v2]concat=n=3:v=1:a=0[out]"));
    }

    #[tokio::test]
    async fn test_merge_rejects_single_input() {
        let result = merge_concat(&["a.gif"], "out.gif", 480, 10).await;
        assert!(matches!(result, Err(MediaError::InvalidVideo(_))));
    }

    #[tokio::test]
    async fn test_extract_rejects_bad_range() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp4");
        std::fs::write(&input, b"stub").unwrap();

        let result = extract_clip_gif(
            &input,
            &dir.path().join("out.gif"),
            TimeRange::new(5.0, 2.0),
            10,
            480,
            10,
        )
        .await;
        assert!(matches!(result, Err(MediaError::InvalidRange(_))));
    }
}
