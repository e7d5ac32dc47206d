//! Shared data models for the gifsmith backend.
//!
//! This crate provides Serde-serializable types for:
//! - Job identity and lifecycle state
//! - Processing settings (clamped, cache-addressable)
//! - Artifacts and time ranges
//! - Live event stream messages
//! - The safe artifact-filename grammar

pub mod artifact;
pub mod event;
pub mod job;
pub mod naming;
pub mod settings;

// Re-export common types
pub use artifact::{Artifact, ArtifactKind, TimeRange};
pub use event::StreamEvent;
pub use job::{JobId, JobIdError, JobState};
pub use naming::{grayscale_name, is_safe_filename, merged_name, primary_name};
pub use settings::ProcessSettings;
