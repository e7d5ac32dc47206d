//! Job orchestration and streaming engine.
//!
//! This crate owns everything between the transport layer and the
//! ffmpeg wrappers: job identity and lifecycle, content-addressed
//! result caching, admission control, per-client rate limiting,
//! cooperative cancellation, the per-job ordered event channel, the
//! pipeline that drives one job from input to artifacts, and the
//! background expiry sweep.

pub mod admission;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod pipeline;
pub mod ratelimit;
pub mod reaper;
pub mod registry;
pub mod service;

pub use admission::AdmissionController;
pub use cache::ResultCache;
pub use config::EngineConfig;
pub use error::{sanitize_message, EngineError, EngineResult};
pub use events::{EventHub, Subscription};
pub use fingerprint::compute_fingerprint;
pub use pipeline::{
    split_long_ranges, ClipEncoder, FfmpegClipEncoder, FfmpegSegmenter, Pipeline, Segmenter,
};
pub use ratelimit::{AdmitKind, RateLimiter};
pub use reaper::ExpiryReaper;
pub use registry::{JobRecord, JobRegistry};
pub use service::{JobService, StagedUpload, Submission};
