//! Background expiry sweep.
//!
//! Periodically removes job output directories (and their uploads,
//! registry entries, and cache entries) once they pass the configured
//! age horizon. Age is judged by directory modification time so a job
//! stays alive as long as new artifacts land in it. A zero horizon
//! disables the sweep entirely.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tracing::{info, warn};

use gifsmith_models::{JobId, JobState};

use crate::cache::ResultCache;
use crate::events::EventHub;
use crate::registry::JobRegistry;

pub struct ExpiryReaper {
    output_dir: PathBuf,
    upload_dir: PathBuf,
    horizon: Duration,
    interval: Duration,
    registry: Arc<JobRegistry>,
    cache: Arc<ResultCache>,
    hub: Arc<EventHub>,
}

impl ExpiryReaper {
    pub fn new(
        output_dir: PathBuf,
        upload_dir: PathBuf,
        horizon: Duration,
        interval: Duration,
        registry: Arc<JobRegistry>,
        cache: Arc<ResultCache>,
        hub: Arc<EventHub>,
    ) -> Self {
        Self {
            output_dir,
            upload_dir,
            horizon,
            interval,
            registry,
            cache,
            hub,
        }
    }

    /// Spawn the periodic sweep. Returns None when expiry is disabled.
    pub fn spawn(self) -> Option<JoinHandle<()>> {
        if self.horizon.is_zero() {
            info!("job expiry disabled, reaper not started");
            return None;
        }
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match self.sweep_once().await {
                    Ok(0) => {}
                    Ok(n) => info!(reaped = n, "expiry sweep removed jobs"),
                    Err(err) => warn!(error = %err, "expiry sweep failed"),
                }
            }
        }))
    }

    /// Remove every expired job directory under the output root. Returns
    /// how many jobs were reaped.
    pub async fn sweep_once(&self) -> std::io::Result<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(self.horizon)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut reaped = 0usize;
        let mut entries = match tokio::fs::read_dir(&self.output_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(job_id) = name.to_str().and_then(|s| JobId::parse(s).ok()) else {
                continue;
            };
            let meta = match entry.metadata().await {
                Ok(meta) if meta.is_dir() => meta,
                _ => continue,
            };
            let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            if mtime > cutoff {
                continue;
            }
            // Never pull an active job's output out from under it.
            if self.registry.state(job_id) == Some(JobState::Active) {
                continue;
            }

            if let Err(err) = tokio::fs::remove_dir_all(entry.path()).await {
                warn!(%job_id, error = %err, "failed to remove expired output dir");
                continue;
            }
            self.remove_uploads(job_id).await;
            self.registry.remove(job_id);
            if let Err(err) = self.cache.purge_job(job_id) {
                warn!(%job_id, error = %err, "failed to purge cache for expired job");
            }
            self.hub.close_now(job_id);
            reaped += 1;
        }
        Ok(reaped)
    }

    async fn remove_uploads(&self, job_id: JobId) {
        let prefix = job_id.to_string();
        let Ok(mut entries) = tokio::fs::read_dir(&self.upload_dir).await else {
            return;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&prefix) {
                let _ = tokio::fs::remove_file(entry.path()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gifsmith_models::ProcessSettings;

    use crate::registry::JobRecord;

    struct Fixture {
        tmp: tempfile::TempDir,
        registry: Arc<JobRegistry>,
        cache: Arc<ResultCache>,
        hub: Arc<EventHub>,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("output")).unwrap();
        std::fs::create_dir_all(tmp.path().join("uploads")).unwrap();
        Fixture {
            registry: Arc::new(JobRegistry::new()),
            cache: Arc::new(ResultCache::load(tmp.path().join("cache.json"), 100)),
            hub: EventHub::new(16, Duration::from_secs(1)),
            tmp,
        }
    }

    fn reaper(f: &Fixture, horizon: Duration) -> ExpiryReaper {
        ExpiryReaper::new(
            f.tmp.path().join("output"),
            f.tmp.path().join("uploads"),
            horizon,
            Duration::from_secs(3600),
            Arc::clone(&f.registry),
            Arc::clone(&f.cache),
            Arc::clone(&f.hub),
        )
    }

    fn seed_job(f: &Fixture, state: JobState) -> JobId {
        let id = JobId::new();
        let out = f.tmp.path().join("output").join(id.to_string());
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("clip_0000.gif"), b"gif").unwrap();
        let upload = f.tmp.path().join("uploads").join(format!("{id}.mp4"));
        std::fs::write(&upload, b"video").unwrap();

        f.registry.insert(JobRecord::new(
            id,
            upload,
            out,
            ProcessSettings::default(),
            format!("fp-{id}"),
        ));
        f.registry.set_state(id, state);
        f.cache.store(format!("fp-{id}"), id).unwrap();
        id
    }

    #[tokio::test]
    async fn test_expired_job_is_fully_removed() {
        let f = fixture();
        let id = seed_job(&f, JobState::Completed);

        // Let the directory age past a deliberately tiny horizon.
        std::thread::sleep(Duration::from_millis(50));
        let reaped = reaper(&f, Duration::from_millis(10))
            .sweep_once()
            .await
            .unwrap();
        assert_eq!(reaped, 1);
        assert!(!f.tmp.path().join("output").join(id.to_string()).exists());
        assert!(!f.tmp.path().join("uploads").join(format!("{id}.mp4")).exists());
        assert!(f.registry.get(id).is_none());
        assert_eq!(f.cache.lookup(&format!("fp-{id}")), None);
    }

    #[tokio::test]
    async fn test_fresh_job_survives() {
        let f = fixture();
        let fresh = seed_job(&f, JobState::Completed);

        let reaped = reaper(&f, Duration::from_secs(3600)).sweep_once().await.unwrap();
        assert_eq!(reaped, 0);
        assert!(f.registry.get(fresh).is_some());
    }

    #[tokio::test]
    async fn test_active_job_survives_expiry() {
        let f = fixture();
        let active = seed_job(&f, JobState::Active);

        std::thread::sleep(Duration::from_millis(50));
        let reaped = reaper(&f, Duration::from_millis(10))
            .sweep_once()
            .await
            .unwrap();
        assert_eq!(reaped, 0);
        assert!(f.registry.get(active).is_some());
        assert!(f
            .tmp
            .path()
            .join("output")
            .join(active.to_string())
            .exists());
    }

    #[tokio::test]
    async fn test_non_job_directories_are_ignored() {
        let f = fixture();
        std::fs::create_dir_all(f.tmp.path().join("output").join("not-a-job")).unwrap();

        let reaped = reaper(&f, Duration::from_secs(1)).sweep_once().await.unwrap();
        assert_eq!(reaped, 0);
        assert!(f.tmp.path().join("output").join("not-a-job").exists());
    }
}
