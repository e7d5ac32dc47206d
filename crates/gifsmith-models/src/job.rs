//! Job identity and lifecycle state.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Error returned when a string is not a valid job identifier.
#[derive(Debug, Error)]
#[error("invalid job ID")]
pub struct JobIdError;

/// Unique identifier for a job.
///
/// A 128-bit random token. Job IDs double as directory names under the
/// output root, so parsing is strict: only the canonical hyphenated
/// UUID form is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an untrusted string as a job ID.
    pub fn parse(s: &str) -> Result<Self, JobIdError> {
        let uuid = Uuid::parse_str(s).map_err(|_| JobIdError)?;
        // Require the canonical hyphenated form so the ID round-trips
        // as a directory name.
        if uuid.to_string() != s.to_lowercase() {
            return Err(JobIdError);
        }
        Ok(Self(uuid))
    }
}

impl TryFrom<String> for JobId {
    type Error = JobIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0.to_string()
    }
}

impl JsonSchema for JobId {
    fn schema_name() -> String {
        "JobId".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        let mut schema = gen.subschema_for::<String>();
        if let schemars::schema::Schema::Object(ref mut obj) = schema {
            obj.format = Some("uuid".to_string());
        }
        schema
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = JobIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Job accepted but worker not yet launched
    #[default]
    Submitted,
    /// Worker task running
    Active,
    /// Worker exhausted the segment sequence
    Completed,
    /// Cancellation observed between artifacts
    Cancelled,
    /// Unrecoverable segmenter/encoder/I-O error
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Submitted => "submitted",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Cancelled => "cancelled",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Cancelled | JobState::Failed
        )
    }

    /// Re-processing is permitted only once a prior run has ended.
    pub fn can_reprocess(&self) -> bool {
        self.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_roundtrip() {
        let id = JobId::new();
        let parsed = JobId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_job_id_rejects_garbage() {
        assert!(JobId::parse("not-a-uuid").is_err());
        assert!(JobId::parse("").is_err());
        assert!(JobId::parse("../../etc").is_err());
        // Braced and simple forms are valid UUIDs but not valid directory names
        assert!(JobId::parse("{550e8400-e29b-41d4-a716-446655440000}").is_err());
        assert!(JobId::parse("550e8400e29b41d4a716446655440000").is_err());
    }

    #[test]
    fn test_state_transitions() {
        assert!(!JobState::Active.is_terminal());
        assert!(!JobState::Submitted.can_reprocess());
        assert!(JobState::Completed.can_reprocess());
        assert!(JobState::Failed.can_reprocess());
        assert!(JobState::Cancelled.can_reprocess());
    }
}
