//! Persistent result cache.
//!
//! Maps an input fingerprint to the job that already produced results for
//! it, so re-uploads of the same file with the same settings skip the
//! pipeline entirely. Entries are kept in insertion order and evicted
//! oldest-first once the cap is reached. Every mutation is persisted to a
//! JSON file via a temp-file-and-rename so a crash never leaves a torn
//! cache on disk.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::warn;

use gifsmith_models::JobId;

use crate::error::EngineResult;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub job_id: JobId,
}

#[derive(Debug)]
pub struct ResultCache {
    path: PathBuf,
    max_entries: usize,
    entries: Mutex<Vec<CacheEntry>>,
}

impl ResultCache {
    /// Load the cache from `path`, starting empty when the file is missing
    /// or unreadable. A corrupt cache file is discarded, not fatal.
    pub fn load(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<CacheEntry>>(&bytes) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "discarding unreadable result cache");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self {
            path,
            max_entries,
            entries: Mutex::new(entries),
        }
    }

    /// Look up the job that previously processed this fingerprint.
    pub fn lookup(&self, key: &str) -> Option<JobId> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().find(|e| e.key == key).map(|e| e.job_id)
    }

    /// Record a completed job for `key`, evicting oldest entries past the
    /// cap. Replaces any existing entry for the same key in place.
    pub fn store(&self, key: String, job_id: JobId) -> EngineResult<()> {
        let snapshot = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(existing) = entries.iter_mut().find(|e| e.key == key) {
                existing.job_id = job_id;
            } else {
                entries.push(CacheEntry { key, job_id });
                while entries.len() > self.max_entries {
                    entries.remove(0);
                }
            }
            entries.clone()
        };
        self.persist(&snapshot)
    }

    /// Drop every entry pointing at `job_id`. Used when a job's artifacts
    /// are deleted or the job is reprocessed.
    pub fn purge_job(&self, job_id: JobId) -> EngineResult<()> {
        let snapshot = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            let before = entries.len();
            entries.retain(|e| e.job_id != job_id);
            if entries.len() == before {
                return Ok(());
            }
            entries.clone()
        };
        self.persist(&snapshot)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, entries: &[CacheEntry]) -> EngineResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = temp_sibling(&self.path);
        let json = serde_json::to_vec_pretty(entries)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jid() -> JobId {
        JobId::new()
    }

    #[test]
    fn test_lookup_hit_and_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::load(dir.path().join("cache.json"), 10);
        let id = jid();
        cache.store("abc_5.0_10_480_30".into(), id).unwrap();

        assert_eq!(cache.lookup("abc_5.0_10_480_30"), Some(id));
        assert_eq!(cache.lookup("other"), None);
    }

    #[test]
    fn test_fifo_eviction_past_cap() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::load(dir.path().join("cache.json"), 100);

        let first = jid();
        cache.store("key-0".into(), first).unwrap();
        for i in 1..150 {
            cache.store(format!("key-{i}"), jid()).unwrap();
        }

        assert_eq!(cache.len(), 100);
        assert_eq!(cache.lookup("key-0"), None);
        assert!(cache.lookup("key-149").is_some());
        assert!(cache.lookup("key-50").is_some());
        assert_eq!(cache.lookup("key-49"), None);
    }

    #[test]
    fn test_store_same_key_replaces_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::load(dir.path().join("cache.json"), 10);

        let a = jid();
        let b = jid();
        cache.store("key".into(), a).unwrap();
        cache.store("key".into(), b).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup("key"), Some(b));
    }

    #[test]
    fn test_persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let id = jid();
        {
            let cache = ResultCache::load(&path, 10);
            cache.store("key".into(), id).unwrap();
        }
        let cache = ResultCache::load(&path, 10);
        assert_eq!(cache.lookup("key"), Some(id));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, b"not json").unwrap();

        let cache = ResultCache::load(&path, 10);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_job_removes_all_its_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::load(dir.path().join("cache.json"), 10);

        let doomed = jid();
        let kept = jid();
        cache.store("a".into(), doomed).unwrap();
        cache.store("b".into(), kept).unwrap();
        cache.purge_job(doomed).unwrap();

        assert_eq!(cache.lookup("a"), None);
        assert_eq!(cache.lookup("b"), Some(kept));
    }
}
