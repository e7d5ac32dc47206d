//! Job service facade.
//!
//! Single entry point the transport layer talks to. Owns the registry,
//! result cache, event hub, and admission controller, and wires them
//! into pipeline runs. All filename and path decisions for artifacts
//! happen here so handlers never build filesystem paths themselves.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use gifsmith_models::{
    grayscale_name, is_safe_filename, merged_name, Artifact, ArtifactKind, JobId, JobState,
    ProcessSettings,
};

use crate::admission::AdmissionController;
use crate::cache::ResultCache;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::EventHub;
use crate::fingerprint::compute_fingerprint;
use crate::pipeline::{ClipEncoder, FfmpegClipEncoder, FfmpegSegmenter, Pipeline, Segmenter};
use crate::registry::{JobRecord, JobRegistry};

/// An upload that passed transport-level validation and has been written
/// to a temporary location, awaiting submission.
#[derive(Debug)]
pub struct StagedUpload {
    pub temp_path: PathBuf,
    /// Validated extension of the original upload, without the dot.
    pub ext: String,
}

/// Result of accepting an upload.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Submission {
    /// An identical input with identical settings already finished; its
    /// artifacts are served as-is without running the pipeline.
    CacheHit {
        job_id: JobId,
        artifacts: Vec<Artifact>,
    },
    /// A new pipeline run was started.
    Started { job_id: JobId },
}

pub struct JobService {
    config: EngineConfig,
    registry: Arc<JobRegistry>,
    cache: Arc<ResultCache>,
    hub: Arc<EventHub>,
    admission: AdmissionController,
    segmenter: Arc<dyn Segmenter>,
    encoder: Arc<dyn ClipEncoder>,
}

impl JobService {
    /// Build the production service with ffmpeg-backed components.
    pub fn new(config: EngineConfig) -> Self {
        let segmenter = Arc::new(FfmpegSegmenter {
            segment_timeout_secs: config.segment_timeout.as_secs(),
        });
        let encoder = Arc::new(FfmpegClipEncoder {
            encode_timeout_secs: config.encode_timeout.as_secs(),
        });
        Self::with_components(config, segmenter, encoder)
    }

    /// Build the service around caller-supplied pipeline components.
    pub fn with_components(
        config: EngineConfig,
        segmenter: Arc<dyn Segmenter>,
        encoder: Arc<dyn ClipEncoder>,
    ) -> Self {
        let cache = Arc::new(ResultCache::load(
            config.cache_file.clone(),
            config.max_cache_entries,
        ));
        let hub = EventHub::new(config.event_capacity, config.event_linger);
        let admission = AdmissionController::new(config.max_concurrent_jobs);
        Self {
            registry: Arc::new(JobRegistry::new()),
            cache,
            hub,
            admission,
            segmenter,
            encoder,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn reaper(&self) -> crate::reaper::ExpiryReaper {
        crate::reaper::ExpiryReaper::new(
            self.config.output_dir.clone(),
            self.config.upload_dir.clone(),
            self.config.job_expiry,
            self.config.reaper_interval,
            Arc::clone(&self.registry),
            Arc::clone(&self.cache),
            Arc::clone(&self.hub),
        )
    }

    /// Accept a staged upload: serve it from cache when an identical run
    /// already finished, otherwise claim a slot and start the pipeline.
    /// The staged file is consumed either way; on any failure it is
    /// removed rather than leaked.
    pub async fn submit(
        &self,
        staged: StagedUpload,
        settings: ProcessSettings,
    ) -> EngineResult<Submission> {
        let result = self.submit_staged(&staged, settings).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&staged.temp_path).await;
        }
        result
    }

    async fn submit_staged(
        &self,
        staged: &StagedUpload,
        settings: ProcessSettings,
    ) -> EngineResult<Submission> {
        let settings = settings.clamped();
        let fingerprint = compute_fingerprint(&staged.temp_path, &settings).await?;

        if let Some(job_id) = self.cache.lookup(&fingerprint) {
            let record = match self.registry.get(job_id) {
                Some(record) => Some(record),
                None => self.rehydrate(job_id),
            };
            match record {
                Some(record)
                    if record.state == JobState::Completed
                        && record.artifacts.iter().any(|a| a.path.is_file()) =>
                {
                    // Keep an input on disk so the hit stays reprocessable.
                    if tokio::fs::try_exists(&record.input_path).await? {
                        let _ = tokio::fs::remove_file(&staged.temp_path).await;
                    } else {
                        tokio::fs::create_dir_all(&self.config.upload_dir).await?;
                        gifsmith_media::move_file(&staged.temp_path, &record.input_path).await?;
                    }
                    info!(%job_id, "serving submission from result cache");
                    return Ok(Submission::CacheHit {
                        job_id,
                        artifacts: record.artifacts,
                    });
                }
                _ => {
                    // Stale mapping: the job is gone or its outputs are.
                    self.cache.purge_job(job_id)?;
                }
            }
        }

        let Some(permit) = self.admission.try_admit() else {
            return Err(EngineError::capacity("all processing slots are busy"));
        };

        let job_id = JobId::new();
        tokio::fs::create_dir_all(&self.config.upload_dir).await?;
        let input_path = self
            .config
            .upload_dir
            .join(format!("{job_id}.{}", staged.ext));
        gifsmith_media::move_file(&staged.temp_path, &input_path).await?;
        let output_dir = self.config.output_dir.join(job_id.to_string());

        self.registry.insert(JobRecord::new(
            job_id,
            input_path,
            output_dir,
            settings,
            fingerprint,
        ));
        self.hub.open(job_id);

        let pipeline = self.pipeline();
        tokio::spawn(async move { pipeline.run(job_id, permit).await });
        info!(%job_id, "job started");
        Ok(Submission::Started { job_id })
    }

    /// Re-run a finished job's input with new settings. The previous
    /// artifacts and cache entries are discarded first.
    pub async fn reprocess(
        &self,
        job_id: JobId,
        settings: ProcessSettings,
    ) -> EngineResult<Submission> {
        let record = self
            .registry
            .get(job_id)
            .ok_or_else(|| EngineError::not_found("unknown job"))?;
        if !record.state.can_reprocess() {
            return Err(EngineError::validation("job is still processing"));
        }
        if !tokio::fs::try_exists(&record.input_path).await? {
            return Err(EngineError::not_found(
                "original upload is no longer available",
            ));
        }

        let Some(permit) = self.admission.try_admit() else {
            return Err(EngineError::capacity("all processing slots are busy"));
        };

        let settings = settings.clamped();
        let fingerprint = compute_fingerprint(&record.input_path, &settings).await?;

        self.cache.purge_job(job_id)?;
        match tokio::fs::remove_dir_all(&record.output_dir).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        self.registry.insert(JobRecord::new(
            job_id,
            record.input_path,
            record.output_dir,
            settings,
            fingerprint,
        ));
        self.hub.open(job_id);

        let pipeline = self.pipeline();
        tokio::spawn(async move { pipeline.run(job_id, permit).await });
        info!(%job_id, "job reprocessing started");
        Ok(Submission::Started { job_id })
    }

    /// Flag an active job for cancellation. The run stops at its next
    /// checkpoint; already-produced artifacts are kept.
    pub fn cancel(&self, job_id: JobId) -> EngineResult<()> {
        match self.registry.state(job_id) {
            None => Err(EngineError::not_found("unknown job")),
            Some(JobState::Active) => {
                self.registry.request_cancel(job_id);
                info!(%job_id, "cancellation requested");
                Ok(())
            }
            // A finished job has nothing left to cancel; to this
            // operation it does not exist.
            Some(state) => Err(EngineError::not_found(format!(
                "job is {} and not active",
                state.as_str()
            ))),
        }
    }

    pub fn subscribe(&self, job_id: JobId) -> Option<crate::events::Subscription> {
        self.hub.subscribe(job_id)
    }

    pub fn load_job(&self, job_id: JobId) -> EngineResult<JobRecord> {
        if let Some(record) = self.registry.get(job_id) {
            return Ok(record);
        }
        self.rehydrate(job_id)
            .ok_or_else(|| EngineError::not_found("unknown job"))
    }

    /// List known jobs, newest first, bounded. Output directories that
    /// outlived their in-memory record (a restart, typically) are
    /// rehydrated into the registry first.
    pub fn list_jobs(&self) -> Vec<JobRecord> {
        const MAX_LISTED: usize = 50;

        if let Ok(entries) = std::fs::read_dir(&self.config.output_dir) {
            for entry in entries.flatten() {
                let Ok(name) = entry.file_name().into_string() else {
                    continue;
                };
                let Ok(job_id) = JobId::parse(&name) else {
                    continue;
                };
                if self.registry.get(job_id).is_none() {
                    self.rehydrate(job_id);
                }
            }
        }

        let mut jobs = self.registry.list();
        jobs.truncate(MAX_LISTED);
        jobs
    }

    /// Rebuild a record for a job whose artifacts are still on disk but
    /// whose in-memory state is gone. Requires at least one primary
    /// artifact in the job's directory; the record is registered as
    /// `Completed` with default settings.
    fn rehydrate(&self, job_id: JobId) -> Option<JobRecord> {
        let output_dir = self.config.output_dir.join(job_id.to_string());
        let entries = std::fs::read_dir(&output_dir).ok()?;

        let mut names: Vec<String> = entries
            .flatten()
            .filter(|e| e.path().is_file())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| is_safe_filename(name))
            .collect();
        if !names
            .iter()
            .any(|n| ArtifactKind::from_filename(n) == Some(ArtifactKind::Primary))
        {
            return None;
        }
        names.sort();

        let mut record = JobRecord::new(
            job_id,
            self.find_upload(job_id),
            output_dir.clone(),
            ProcessSettings::default(),
            String::new(),
        );
        record.state = JobState::Completed;
        record.artifacts = names
            .into_iter()
            .map(|name| {
                let path = output_dir.join(&name);
                Artifact::new(name.clone(), format!("/output/{job_id}/{name}"), path)
            })
            .collect();

        info!(%job_id, artifacts = record.artifacts.len(), "rehydrated job from disk");
        self.registry.insert(record.clone());
        Some(record)
    }

    /// Locate the stored upload for a job by its id-prefixed filename.
    /// Falls back to a non-existent path so reprocess reports the input
    /// as unavailable.
    fn find_upload(&self, job_id: JobId) -> PathBuf {
        let prefix = format!("{job_id}.");
        if let Ok(entries) = std::fs::read_dir(&self.config.upload_dir) {
            for entry in entries.flatten() {
                if entry.file_name().to_string_lossy().starts_with(&prefix) {
                    return entry.path();
                }
            }
        }
        self.config.upload_dir.join(format!("{job_id}.mp4"))
    }

    /// Resolve an artifact filename to its on-disk path, enforcing the
    /// filename grammar and directory containment.
    pub fn artifact_path(&self, job_id: JobId, filename: &str) -> EngineResult<PathBuf> {
        if !is_safe_filename(filename) {
            return Err(EngineError::validation("invalid filename"));
        }
        let dir = self.config.output_dir.join(job_id.to_string());
        let path = dir.join(filename);
        // The grammar forbids separators so the join cannot escape, but
        // the containment check stays as a second line of defense.
        if !path.starts_with(&dir) {
            return Err(EngineError::validation("invalid filename"));
        }
        if !path.is_file() {
            return Err(EngineError::not_found("artifact not found"));
        }
        Ok(path)
    }

    /// Concatenate several of a job's artifacts into a new merged one.
    pub async fn merge(&self, job_id: JobId, filenames: &[String]) -> EngineResult<Artifact> {
        let record = self
            .registry
            .get(job_id)
            .ok_or_else(|| EngineError::not_found("unknown job"))?;
        if filenames.len() < 2 {
            return Err(EngineError::validation("merge needs at least two clips"));
        }
        if filenames.len() > self.config.max_merge_inputs {
            return Err(EngineError::validation(format!(
                "merge accepts at most {} clips",
                self.config.max_merge_inputs
            )));
        }

        let mut inputs = Vec::with_capacity(filenames.len());
        for name in filenames {
            if !is_safe_filename(name) {
                return Err(EngineError::validation("invalid filename"));
            }
            if !record.artifacts.iter().any(|a| a.filename == *name) {
                return Err(EngineError::not_found(format!("no such clip: {name}")));
            }
            let path = record.output_dir.join(name);
            if !path.is_file() {
                return Err(EngineError::not_found(format!("no such clip: {name}")));
            }
            inputs.push(path);
        }

        // Next sequence number past every existing merge, so deletions
        // never cause a collision. Grayscale variants of merges keep the
        // original number and are excluded from the scan.
        let seq = record
            .artifacts
            .iter()
            .filter(|a| a.kind() == Some(ArtifactKind::Merged))
            .filter(|a| !a.filename.ends_with("_grayscale.gif"))
            .filter_map(|a| a.filename.split('_').nth(1)?.parse::<u32>().ok())
            .max()
            .map_or(1, |n| n + 1);
        let filename = merged_name(seq);
        let output = record.output_dir.join(&filename);

        gifsmith_media::merge_concat(
            &inputs,
            &output,
            record.settings.width,
            self.config.merge_timeout.as_secs(),
        )
        .await?;

        let artifact = Artifact {
            filename: filename.clone(),
            url: format!("/output/{job_id}/{filename}"),
            path: output,
        };
        self.registry.add_artifact(job_id, artifact.clone());
        info!(%job_id, %filename, inputs = inputs.len(), "merged clips");
        Ok(artifact)
    }

    /// Produce (or return the existing) grayscale variant of an artifact.
    pub async fn grayscale(&self, job_id: JobId, filename: &str) -> EngineResult<Artifact> {
        let record = self
            .registry
            .get(job_id)
            .ok_or_else(|| EngineError::not_found("unknown job"))?;
        if !is_safe_filename(filename) {
            return Err(EngineError::validation("invalid filename"));
        }
        if !record.artifacts.iter().any(|a| a.filename == filename) {
            return Err(EngineError::not_found(format!("no such clip: {filename}")));
        }
        let target = grayscale_name(filename)
            .ok_or_else(|| EngineError::validation("invalid filename"))?;

        if let Some(existing) = record.artifacts.iter().find(|a| a.filename == target) {
            return Ok(existing.clone());
        }

        let input = record.output_dir.join(filename);
        let output = record.output_dir.join(&target);
        gifsmith_media::convert_grayscale(&input, &output, self.config.encode_timeout.as_secs())
            .await?;

        let artifact = Artifact {
            filename: target.clone(),
            url: format!("/output/{job_id}/{target}"),
            path: output,
        };
        self.registry.add_artifact(job_id, artifact.clone());
        Ok(artifact)
    }

    /// Delete one artifact. When the last artifact of a job goes, its
    /// cache entries go with it so a future upload reprocesses.
    pub async fn delete_artifact(&self, job_id: JobId, filename: &str) -> EngineResult<()> {
        if !is_safe_filename(filename) {
            return Err(EngineError::validation("invalid filename"));
        }
        let record = self
            .registry
            .get(job_id)
            .ok_or_else(|| EngineError::not_found("unknown job"))?;
        if !record.artifacts.iter().any(|a| a.filename == filename) {
            return Err(EngineError::not_found(format!("no such clip: {filename}")));
        }

        let path = record.output_dir.join(filename);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(%job_id, %filename, "artifact file already gone");
            }
            Err(err) => return Err(err.into()),
        }
        self.registry.remove_artifact(job_id, filename);

        if self
            .registry
            .artifacts(job_id)
            .map(|a| a.is_empty())
            .unwrap_or(false)
        {
            self.cache.purge_job(job_id)?;
        }
        Ok(())
    }

    fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.hub),
            Arc::clone(&self.cache),
            Arc::clone(&self.segmenter),
            Arc::clone(&self.encoder),
            self.config.max_input_duration,
            self.config.max_clips,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use gifsmith_models::TimeRange;

    use crate::pipeline::{MockClipEncoder, MockSegmenter};

    fn test_config(root: &std::path::Path) -> EngineConfig {
        EngineConfig {
            upload_dir: root.join("uploads"),
            output_dir: root.join("output"),
            cache_file: root.join("cache.json"),
            max_concurrent_jobs: 2,
            ..EngineConfig::default()
        }
    }

    fn happy_segmenter() -> MockSegmenter {
        let mut segmenter = MockSegmenter::new();
        segmenter.expect_duration().returning(|_| Ok(12.0));
        segmenter
            .expect_detect()
            .returning(|_, _, _| Ok(vec![TimeRange::new(0.0, 5.0), TimeRange::new(5.0, 12.0)]));
        segmenter
    }

    fn writing_encoder() -> MockClipEncoder {
        let mut encoder = MockClipEncoder::new();
        encoder.expect_encode_range().returning(|_, output, _, _, _| {
            std::fs::write(output, b"gif")?;
            Ok(())
        });
        encoder
    }

    fn service(root: &std::path::Path) -> JobService {
        JobService::with_components(
            test_config(root),
            Arc::new(happy_segmenter()),
            Arc::new(writing_encoder()),
        )
    }

    fn stage(root: &std::path::Path, contents: &[u8]) -> StagedUpload {
        let temp_path = root.join(format!("staged-{}.tmp", uuid::Uuid::new_v4().simple()));
        std::fs::write(&temp_path, contents).unwrap();
        StagedUpload {
            temp_path,
            ext: "mp4".into(),
        }
    }

    async fn wait_terminal(service: &JobService, job_id: JobId) -> JobState {
        for _ in 0..200 {
            if let Some(state) = service.registry.state(job_id) {
                if state.is_terminal() {
                    return state;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job never reached a terminal state");
    }

    #[tokio::test]
    async fn test_submit_runs_to_completion() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path());

        let submission = svc
            .submit(stage(tmp.path(), b"video-bytes"), ProcessSettings::default())
            .await
            .unwrap();
        let Submission::Started { job_id } = submission else {
            panic!("expected a fresh run");
        };

        assert_eq!(wait_terminal(&svc, job_id).await, JobState::Completed);
        let record = svc.load_job(job_id).unwrap();
        assert_eq!(record.artifacts.len(), 3); // 5s cap splits (5,12) in two
        assert!(record.input_path.exists());
        assert!(svc
            .artifact_path(job_id, &record.artifacts[0].filename)
            .is_ok());
    }

    #[tokio::test]
    async fn test_identical_resubmission_hits_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path());

        let Submission::Started { job_id } = svc
            .submit(stage(tmp.path(), b"same"), ProcessSettings::default())
            .await
            .unwrap()
        else {
            panic!("expected a fresh run");
        };
        wait_terminal(&svc, job_id).await;

        let staged = stage(tmp.path(), b"same");
        let temp_path = staged.temp_path.clone();
        match svc.submit(staged, ProcessSettings::default()).await.unwrap() {
            Submission::CacheHit {
                job_id: hit,
                artifacts,
            } => {
                assert_eq!(hit, job_id);
                assert!(!artifacts.is_empty());
            }
            Submission::Started { .. } => panic!("expected a cache hit"),
        }
        // The duplicate upload is discarded.
        assert!(!temp_path.exists());
    }

    #[tokio::test]
    async fn test_different_settings_miss_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path());

        let Submission::Started { job_id } = svc
            .submit(stage(tmp.path(), b"same"), ProcessSettings::default())
            .await
            .unwrap()
        else {
            panic!("expected a fresh run");
        };
        wait_terminal(&svc, job_id).await;

        let settings = ProcessSettings {
            fps: 15,
            ..Default::default()
        };
        match svc.submit(stage(tmp.path(), b"same"), settings).await.unwrap() {
            Submission::Started { job_id: second } => assert_ne!(second, job_id),
            Submission::CacheHit { .. } => panic!("expected a fresh run"),
        }
    }

    #[tokio::test]
    async fn test_submit_rejected_at_capacity() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path());

        let _a = svc.admission.try_admit().unwrap();
        let _b = svc.admission.try_admit().unwrap();

        let staged = stage(tmp.path(), b"video");
        let temp_path = staged.temp_path.clone();
        let err = svc
            .submit(staged, ProcessSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Capacity(_)));
        assert!(!temp_path.exists());
    }

    #[tokio::test]
    async fn test_failed_submit_discards_staged_upload() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());
        // A file where the upload directory should be makes landing fail.
        std::fs::write(&config.upload_dir, b"in the way").unwrap();
        let svc = JobService::with_components(
            config,
            Arc::new(happy_segmenter()),
            Arc::new(writing_encoder()),
        );

        let staged = stage(tmp.path(), b"video");
        let temp_path = staged.temp_path.clone();
        let err = svc
            .submit(staged, ProcessSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Storage(_)));
        assert!(!temp_path.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submissions_respect_admission_ceiling() {
        let tmp = tempfile::tempdir().unwrap();
        let mut encoder = MockClipEncoder::new();
        // Holding each encode open keeps the slots occupied while the
        // burst lands.
        encoder.expect_encode_range().returning(|_, output, _, _, _| {
            std::fs::write(output, b"gif")?;
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        });
        let svc = Arc::new(JobService::with_components(
            test_config(tmp.path()),
            Arc::new(happy_segmenter()),
            Arc::new(encoder),
        ));

        let mut handles = Vec::new();
        for i in 0..6u8 {
            let svc = Arc::clone(&svc);
            let staged = stage(tmp.path(), &[i; 64]);
            handles.push(tokio::spawn(async move {
                svc.submit(staged, ProcessSettings::default()).await
            }));
        }

        let mut started = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(Submission::Started { .. }) => started += 1,
                Ok(Submission::CacheHit { .. }) => panic!("distinct inputs cannot hit the cache"),
                Err(EngineError::Capacity(_)) => rejected += 1,
                Err(err) => panic!("unexpected submit error: {err}"),
            }
        }
        assert!(started >= 1);
        assert!(started <= 2, "admission ceiling exceeded: {started} started");
        assert_eq!(started + rejected, 6);
    }

    #[tokio::test]
    async fn test_cancel_requires_active_job() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path());

        assert!(matches!(
            svc.cancel(JobId::new()),
            Err(EngineError::NotFound(_))
        ));

        let Submission::Started { job_id } = svc
            .submit(stage(tmp.path(), b"video"), ProcessSettings::default())
            .await
            .unwrap()
        else {
            panic!("expected a fresh run");
        };
        wait_terminal(&svc, job_id).await;
        // A finished job looks the same as one that never existed.
        assert!(matches!(svc.cancel(job_id), Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reprocess_discards_previous_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path());

        let Submission::Started { job_id } = svc
            .submit(stage(tmp.path(), b"video"), ProcessSettings::default())
            .await
            .unwrap()
        else {
            panic!("expected a fresh run");
        };
        wait_terminal(&svc, job_id).await;
        let old = svc.load_job(job_id).unwrap();
        assert!(!old.artifacts.is_empty());

        let settings = ProcessSettings {
            width: 640,
            ..Default::default()
        };
        let Submission::Started { job_id: again } =
            svc.reprocess(job_id, settings).await.unwrap()
        else {
            panic!("expected a fresh run");
        };
        assert_eq!(again, job_id);
        wait_terminal(&svc, job_id).await;

        let record = svc.load_job(job_id).unwrap();
        assert_eq!(record.settings.width, 640);
        assert_eq!(record.artifacts.len(), 3);
        // Old cache key no longer resolves.
        assert_eq!(svc.cache.lookup(&old.fingerprint), None);
    }

    #[tokio::test]
    async fn test_reprocess_rejects_unknown_job() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path());
        assert!(matches!(
            svc.reprocess(JobId::new(), ProcessSettings::default()).await,
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rehydrates_job_directories_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());
        let job_id = JobId::new();
        let dir = config.output_dir.join(job_id.to_string());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("clip_0000.gif"), b"gif").unwrap();
        std::fs::create_dir_all(config.output_dir.join("not-a-job")).unwrap();

        let svc = JobService::with_components(
            config,
            Arc::new(happy_segmenter()),
            Arc::new(writing_encoder()),
        );
        let record = svc.load_job(job_id).unwrap();
        assert_eq!(record.state, JobState::Completed);
        assert_eq!(record.artifacts.len(), 1);

        let listed = svc.list_jobs();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, job_id);
    }

    #[tokio::test]
    async fn test_artifact_path_rejects_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path());
        let id = JobId::new();

        for name in ["../cache.json", "..", "clip/../../x.gif", "clip.png", ""] {
            assert!(matches!(
                svc.artifact_path(id, name),
                Err(EngineError::Validation(_))
            ));
        }
        assert!(matches!(
            svc.artifact_path(id, "clip_0000.gif"),
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_merge_validates_inputs() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path());

        let Submission::Started { job_id } = svc
            .submit(stage(tmp.path(), b"video"), ProcessSettings::default())
            .await
            .unwrap()
        else {
            panic!("expected a fresh run");
        };
        wait_terminal(&svc, job_id).await;

        let one = vec!["clip_0000.gif".to_string()];
        assert!(matches!(
            svc.merge(job_id, &one).await,
            Err(EngineError::Validation(_))
        ));

        let unknown = vec!["clip_0000.gif".to_string(), "clip_9999.gif".to_string()];
        assert!(matches!(
            svc.merge(job_id, &unknown).await,
            Err(EngineError::NotFound(_))
        ));

        let traversal = vec!["clip_0000.gif".to_string(), "../escape.gif".to_string()];
        assert!(matches!(
            svc.merge(job_id, &traversal).await,
            Err(EngineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_last_artifact_purges_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let svc = service(tmp.path());

        let Submission::Started { job_id } = svc
            .submit(stage(tmp.path(), b"video"), ProcessSettings::default())
            .await
            .unwrap()
        else {
            panic!("expected a fresh run");
        };
        wait_terminal(&svc, job_id).await;
        let record = svc.load_job(job_id).unwrap();
        assert_eq!(svc.cache.lookup(&record.fingerprint), Some(job_id));

        for artifact in &record.artifacts {
            svc.delete_artifact(job_id, &artifact.filename).await.unwrap();
            assert!(!artifact.path.exists());
        }
        assert_eq!(svc.cache.lookup(&record.fingerprint), None);
    }
}
