//! The per-job processing pipeline.
//!
//! One run takes an uploaded input from probe to a set of GIF artifacts:
//! probe the duration, detect scene boundaries, subdivide overlong
//! ranges, then encode each range as a clip. Cancellation is checked
//! between clips; a single failed clip is skipped rather than failing
//! the job. Exactly one terminal event is published per run.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{error, info, warn};

use gifsmith_models::{primary_name, Artifact, JobId, JobState, StreamEvent, TimeRange};

use crate::cache::ResultCache;
use crate::error::{sanitize_message, EngineError, EngineResult};
use crate::events::EventHub;
use crate::registry::JobRegistry;

/// Scene analysis over an input file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Segmenter: Send + Sync {
    async fn duration(&self, input: &Path) -> EngineResult<f64>;

    async fn detect(
        &self,
        input: &Path,
        duration: f64,
        sensitivity: u32,
    ) -> EngineResult<Vec<TimeRange>>;
}

/// Encodes one time range of an input as a GIF artifact.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClipEncoder: Send + Sync {
    async fn encode_range(
        &self,
        input: &Path,
        output: &Path,
        range: TimeRange,
        fps: u32,
        width: u32,
    ) -> EngineResult<()>;
}

/// Production segmenter backed by ffprobe and ffmpeg scene detection.
pub struct FfmpegSegmenter {
    pub segment_timeout_secs: u64,
}

#[async_trait]
impl Segmenter for FfmpegSegmenter {
    async fn duration(&self, input: &Path) -> EngineResult<f64> {
        let info = gifsmith_media::probe_video(input).await?;
        Ok(info.duration)
    }

    async fn detect(
        &self,
        input: &Path,
        duration: f64,
        sensitivity: u32,
    ) -> EngineResult<Vec<TimeRange>> {
        let ranges =
            gifsmith_media::detect_scenes(input, duration, sensitivity, self.segment_timeout_secs)
                .await?;
        Ok(ranges)
    }
}

/// Production encoder backed by ffmpeg.
pub struct FfmpegClipEncoder {
    pub encode_timeout_secs: u64,
}

#[async_trait]
impl ClipEncoder for FfmpegClipEncoder {
    async fn encode_range(
        &self,
        input: &Path,
        output: &Path,
        range: TimeRange,
        fps: u32,
        width: u32,
    ) -> EngineResult<()> {
        gifsmith_media::extract_clip_gif(input, output, range, fps, width, self.encode_timeout_secs)
            .await?;
        Ok(())
    }
}

/// Subdivide any range longer than `max_duration` into consecutive
/// chunks of at most that length, preserving overall ordering and
/// coverage. A non-zero `max_clips` truncates the result.
pub fn split_long_ranges(ranges: &[TimeRange], max_duration: f64, max_clips: usize) -> Vec<TimeRange> {
    let mut out = Vec::new();
    for range in ranges {
        if !range.is_valid() {
            continue;
        }
        let mut start = range.start;
        while range.end - start > max_duration {
            out.push(TimeRange::new(start, start + max_duration));
            start += max_duration;
        }
        if range.end > start {
            out.push(TimeRange::new(start, range.end));
        }
    }
    if max_clips > 0 && out.len() > max_clips {
        out.truncate(max_clips);
    }
    out
}

pub struct Pipeline {
    registry: Arc<JobRegistry>,
    hub: Arc<EventHub>,
    cache: Arc<ResultCache>,
    segmenter: Arc<dyn Segmenter>,
    encoder: Arc<dyn ClipEncoder>,
    max_input_duration: f64,
    max_clips: usize,
}

enum Outcome {
    Completed { artifacts: usize },
    Cancelled,
}

impl Pipeline {
    pub fn new(
        registry: Arc<JobRegistry>,
        hub: Arc<EventHub>,
        cache: Arc<ResultCache>,
        segmenter: Arc<dyn Segmenter>,
        encoder: Arc<dyn ClipEncoder>,
        max_input_duration: f64,
        max_clips: usize,
    ) -> Self {
        Self {
            registry,
            hub,
            cache,
            segmenter,
            encoder,
            max_input_duration,
            max_clips,
        }
    }

    /// Drive one job to a terminal state. The admission permit is held
    /// for the whole run and released on return.
    pub async fn run(&self, job_id: JobId, permit: OwnedSemaphorePermit) {
        let _permit = permit;

        match self.process(job_id).await {
            Ok(Outcome::Completed { artifacts }) => {
                self.registry.set_state(job_id, JobState::Completed);
                self.hub
                    .publish(job_id, StreamEvent::complete(artifacts as u32));
                info!(%job_id, artifacts, "job completed");
            }
            Ok(Outcome::Cancelled) => {
                self.registry.set_state(job_id, JobState::Cancelled);
                self.hub.publish(job_id, StreamEvent::cancelled());
                info!(%job_id, "job cancelled");
            }
            Err(err) => {
                self.registry.set_state(job_id, JobState::Failed);
                self.hub
                    .publish(job_id, StreamEvent::error(sanitize_message(&err.to_string())));
                error!(%job_id, error = %err, "job failed");
            }
        }
    }

    async fn process(&self, job_id: JobId) -> EngineResult<Outcome> {
        let record = self
            .registry
            .get(job_id)
            .ok_or_else(|| EngineError::not_found("job not found"))?;
        self.registry.set_state(job_id, JobState::Active);

        let duration = self.segmenter.duration(&record.input_path).await?;
        if self.max_input_duration > 0.0 && duration > self.max_input_duration {
            return Err(EngineError::validation(format!(
                "input duration {:.0}s exceeds the {:.0}s limit",
                duration, self.max_input_duration
            )));
        }

        let detected = self
            .segmenter
            .detect(&record.input_path, duration, record.settings.sensitivity)
            .await?;
        let ranges = split_long_ranges(&detected, record.settings.max_clip_duration, self.max_clips);
        if ranges.is_empty() {
            return Err(EngineError::processing("no usable scenes detected"));
        }

        tokio::fs::create_dir_all(&record.output_dir).await?;

        let total = ranges.len();
        let mut completed = 0usize;
        let mut encoded = 0usize;

        for (idx, range) in ranges.into_iter().enumerate() {
            if self.registry.cancel_requested(job_id) {
                return Ok(Outcome::Cancelled);
            }

            let filename = primary_name(idx);
            let output = record.output_dir.join(&filename);
            match self
                .encoder
                .encode_range(
                    &record.input_path,
                    &output,
                    range,
                    record.settings.fps,
                    record.settings.width,
                )
                .await
            {
                Ok(()) => {
                    encoded += 1;
                    let artifact = Artifact {
                        filename: filename.clone(),
                        url: format!("/output/{job_id}/{filename}"),
                        path: output,
                    };
                    self.registry.add_artifact(job_id, artifact);
                    self.hub.publish(
                        job_id,
                        StreamEvent::artifact_ready(
                            format!("/output/{job_id}/{filename}"),
                            filename,
                        ),
                    );
                }
                Err(err) => {
                    warn!(%job_id, clip = idx, error = %err, "clip encode failed, skipping");
                }
            }

            completed += 1;
            self.hub
                .publish(job_id, StreamEvent::progress(completed as u32, total as u32));
        }

        // Skipped encodes do not fail the run; a run with no artifacts
        // still completes, it just never earns a cache entry.
        if encoded > 0 {
            if let Err(err) = self.cache.store(record.fingerprint.clone(), job_id) {
                warn!(%job_id, error = %err, "failed to persist result cache");
            }
        }
        Ok(Outcome::Completed { artifacts: encoded })
    }
}
