//! Live event stream messages.
//!
//! Events for one job are strictly ordered as produced. Exactly one
//! terminal event (`complete`, `error` or `cancelled`) ends a run;
//! `keepalive` is synthesized reader-side and never stored in a queue.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Message published on a job's event channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// One artifact finished encoding and is available
    ArtifactReady { url: String, filename: String },

    /// Clip-count progress
    Progress { completed: u32, total: u32 },

    /// Run stopped at a cancellation checkpoint
    Cancelled { message: String },

    /// Run failed; message is sanitized before it gets here
    Error { message: String },

    /// Run exhausted all ranges
    Complete { total: u32 },

    /// Idle-connection heartbeat
    Keepalive,
}

impl StreamEvent {
    /// Create an artifact-ready event.
    pub fn artifact_ready(url: impl Into<String>, filename: impl Into<String>) -> Self {
        StreamEvent::ArtifactReady {
            url: url.into(),
            filename: filename.into(),
        }
    }

    /// Create a progress event.
    pub fn progress(completed: u32, total: u32) -> Self {
        StreamEvent::Progress { completed, total }
    }

    /// Create a cancelled event.
    pub fn cancelled() -> Self {
        StreamEvent::Cancelled {
            message: "Processing cancelled".to_string(),
        }
    }

    /// Create an error event.
    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
        }
    }

    /// Create a completion event.
    pub fn complete(total: u32) -> Self {
        StreamEvent::Complete { total }
    }

    /// Whether this event ends the job's stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::Cancelled { .. } | StreamEvent::Error { .. } | StreamEvent::Complete { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = StreamEvent::artifact_ready("/output/abc/clip_0000.gif", "clip_0000.gif");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"artifact_ready\""));
        assert!(json.contains("\"filename\":\"clip_0000.gif\""));
    }

    #[test]
    fn test_keepalive_serialization() {
        let json = serde_json::to_string(&StreamEvent::Keepalive).unwrap();
        assert_eq!(json, r#"{"type":"keepalive"}"#);
    }

    #[test]
    fn test_terminal_classification() {
        assert!(StreamEvent::complete(3).is_terminal());
        assert!(StreamEvent::error("boom").is_terminal());
        assert!(StreamEvent::cancelled().is_terminal());
        assert!(!StreamEvent::progress(1, 3).is_terminal());
        assert!(!StreamEvent::Keepalive.is_terminal());
        assert!(!StreamEvent::artifact_ready("u", "f").is_terminal());
    }
}
