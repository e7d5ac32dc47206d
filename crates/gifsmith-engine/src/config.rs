//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory for saved uploads
    pub upload_dir: PathBuf,
    /// Root directory for per-job output folders
    pub output_dir: PathBuf,
    /// Persisted cache table path
    pub cache_file: PathBuf,
    /// Maximum cache entries before oldest are evicted
    pub max_cache_entries: usize,
    /// Maximum simultaneous active jobs
    pub max_concurrent_jobs: usize,
    /// Jobs older than this are swept (zero disables the reaper)
    pub job_expiry: Duration,
    /// How often the reaper sweeps
    pub reaper_interval: Duration,
    /// Maximum input duration in seconds (zero = unlimited)
    pub max_input_duration: f64,
    /// Maximum clips per job (zero = unlimited)
    pub max_clips: usize,
    /// Per-clip ffmpeg timeout
    pub encode_timeout: Duration,
    /// Merge ffmpeg timeout
    pub merge_timeout: Duration,
    /// Scene detection ffmpeg timeout
    pub segment_timeout: Duration,
    /// Maximum artifacts per merge request
    pub max_merge_inputs: usize,
    /// Event channel capacity per job
    pub event_capacity: usize,
    /// How long a finished job's event channel lingers for slow readers
    pub event_linger: Duration,
    /// How long an event read blocks before a keepalive is synthesized
    pub stream_read_timeout: Duration,
    /// Rate limit window
    pub rate_limit_window: Duration,
    /// Maximum requests per window per client
    pub rate_limit_max_requests: u32,
    /// Maximum uploads per window per client
    pub rate_limit_max_uploads: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("output"),
            cache_file: PathBuf::from("cache.json"),
            max_cache_entries: 100,
            max_concurrent_jobs: 5,
            job_expiry: Duration::ZERO, // disabled
            reaper_interval: Duration::from_secs(3600),
            max_input_duration: 10_800.0, // 3 hours
            max_clips: 0,                 // unlimited
            encode_timeout: Duration::from_secs(60),
            merge_timeout: Duration::from_secs(300),
            segment_timeout: Duration::from_secs(600),
            max_merge_inputs: 20,
            event_capacity: 256,
            event_linger: Duration::from_secs(10),
            stream_read_timeout: Duration::from_secs(60),
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max_requests: 10,
            rate_limit_max_uploads: 3,
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            upload_dir: env_path("UPLOAD_DIR", defaults.upload_dir),
            output_dir: env_path("OUTPUT_DIR", defaults.output_dir),
            cache_file: env_path("CACHE_FILE", defaults.cache_file),
            max_cache_entries: env_parse("MAX_CACHE_ENTRIES", defaults.max_cache_entries),
            max_concurrent_jobs: env_parse("MAX_CONCURRENT_JOBS", defaults.max_concurrent_jobs),
            job_expiry: Duration::from_secs(env_parse("JOB_EXPIRY_HOURS", 0u64) * 3600),
            reaper_interval: Duration::from_secs(env_parse("REAPER_INTERVAL_SECS", 3600u64)),
            max_input_duration: env_parse("MAX_INPUT_DURATION", defaults.max_input_duration),
            max_clips: env_parse("MAX_CLIPS", defaults.max_clips),
            encode_timeout: Duration::from_secs(env_parse("FFMPEG_TIMEOUT", 60u64)),
            merge_timeout: Duration::from_secs(env_parse("FFMPEG_MERGE_TIMEOUT", 300u64)),
            segment_timeout: Duration::from_secs(env_parse("SEGMENT_TIMEOUT", 600u64)),
            max_merge_inputs: env_parse("MAX_MERGE_INPUTS", defaults.max_merge_inputs),
            event_capacity: env_parse("EVENT_CAPACITY", defaults.event_capacity),
            event_linger: Duration::from_secs(env_parse("EVENT_LINGER_SECS", 10u64)),
            stream_read_timeout: Duration::from_secs(env_parse("STREAM_READ_TIMEOUT", 60u64)),
            rate_limit_window: Duration::from_secs(env_parse("RATE_LIMIT_WINDOW", 60u64)),
            rate_limit_max_requests: env_parse(
                "RATE_LIMIT_MAX_REQUESTS",
                defaults.rate_limit_max_requests,
            ),
            rate_limit_max_uploads: env_parse(
                "RATE_LIMIT_MAX_UPLOADS",
                defaults.rate_limit_max_uploads,
            ),
        }
    }
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
