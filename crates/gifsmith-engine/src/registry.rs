//! In-memory job registry.
//!
//! Authoritative record of every job the process knows about, including
//! its lifecycle state, produced artifacts, and any pending cancellation
//! request. All mutation goes through the registry so state transitions
//! stay consistent with cancel flags.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use gifsmith_models::{Artifact, JobId, JobState, ProcessSettings};

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub state: JobState,
    pub settings: ProcessSettings,
    #[serde(skip)]
    pub input_path: PathBuf,
    #[serde(skip)]
    pub output_dir: PathBuf,
    pub fingerprint: String,
    pub artifacts: Vec<Artifact>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(
        id: JobId,
        input_path: PathBuf,
        output_dir: PathBuf,
        settings: ProcessSettings,
        fingerprint: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: JobState::Submitted,
            settings,
            input_path,
            output_dir,
            fingerprint,
            artifacts: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    jobs: HashMap<JobId, JobRecord>,
    cancel_requested: HashSet<JobId>,
}

#[derive(Debug, Default)]
pub struct JobRegistry {
    inner: Mutex<Inner>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: JobRecord) {
        let mut inner = self.lock();
        inner.cancel_requested.remove(&record.id);
        inner.jobs.insert(record.id, record);
    }

    pub fn get(&self, id: JobId) -> Option<JobRecord> {
        self.lock().jobs.get(&id).cloned()
    }

    pub fn state(&self, id: JobId) -> Option<JobState> {
        self.lock().jobs.get(&id).map(|r| r.state)
    }

    /// Transition a job to `state`. Entering a terminal state clears any
    /// pending cancel flag. Returns false when the job is unknown.
    pub fn set_state(&self, id: JobId, state: JobState) -> bool {
        let mut inner = self.lock();
        if state.is_terminal() {
            inner.cancel_requested.remove(&id);
        }
        match inner.jobs.get_mut(&id) {
            Some(record) => {
                record.state = state;
                record.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn add_artifact(&self, id: JobId, artifact: Artifact) -> bool {
        let mut inner = self.lock();
        match inner.jobs.get_mut(&id) {
            Some(record) => {
                record.artifacts.push(artifact);
                record.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn artifacts(&self, id: JobId) -> Option<Vec<Artifact>> {
        self.lock().jobs.get(&id).map(|r| r.artifacts.clone())
    }

    pub fn remove_artifact(&self, id: JobId, filename: &str) -> bool {
        let mut inner = self.lock();
        match inner.jobs.get_mut(&id) {
            Some(record) => {
                let before = record.artifacts.len();
                record.artifacts.retain(|a| a.filename != filename);
                record.updated_at = Utc::now();
                record.artifacts.len() != before
            }
            None => false,
        }
    }

    /// Drop artifacts ahead of a reprocess run.
    pub fn clear_artifacts(&self, id: JobId) {
        let mut inner = self.lock();
        if let Some(record) = inner.jobs.get_mut(&id) {
            record.artifacts.clear();
            record.updated_at = Utc::now();
        }
    }

    /// Flag an active job for cancellation. Returns false when the job is
    /// unknown or not currently active.
    pub fn request_cancel(&self, id: JobId) -> bool {
        let mut inner = self.lock();
        match inner.jobs.get(&id) {
            Some(record) if record.state == JobState::Active => {
                inner.cancel_requested.insert(id);
                true
            }
            _ => false,
        }
    }

    pub fn cancel_requested(&self, id: JobId) -> bool {
        self.lock().cancel_requested.contains(&id)
    }

    pub fn remove(&self, id: JobId) -> Option<JobRecord> {
        let mut inner = self.lock();
        inner.cancel_requested.remove(&id);
        inner.jobs.remove(&id)
    }

    /// Snapshot of all jobs, newest first.
    pub fn list(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self.lock().jobs.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub fn ids(&self) -> Vec<JobId> {
        self.lock().jobs.keys().copied().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
