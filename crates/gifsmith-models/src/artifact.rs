//! Artifacts and time ranges.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A contiguous time interval of the input, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Valid ranges are non-empty and non-negative.
    pub fn is_valid(&self) -> bool {
        self.start >= 0.0 && self.end > self.start
    }
}

/// Which family an artifact belongs to.
///
/// The filename prefix partitions a job directory so listing and
/// filtering are a single directory scan with no metadata lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Primary segment output (`clip_` prefix)
    Primary,
    /// Derived merged output (`merged_` prefix)
    Merged,
}

impl ArtifactKind {
    /// Classify a filename by its prefix convention.
    pub fn from_filename(name: &str) -> Option<Self> {
        if name.starts_with("clip_") {
            Some(ArtifactKind::Primary)
        } else if name.starts_with("merged_") {
            Some(ArtifactKind::Merged)
        } else {
            None
        }
    }
}

/// A produced output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Artifact {
    /// Generated name, always satisfying the safe-filename grammar
    pub filename: String,
    /// Public reference served to clients
    pub url: String,
    /// Storage path on disk
    #[serde(skip)]
    pub path: PathBuf,
}

impl Artifact {
    pub fn new(filename: impl Into<String>, url: impl Into<String>, path: PathBuf) -> Self {
        Self {
            filename: filename.into(),
            url: url.into(),
            path,
        }
    }

    pub fn kind(&self) -> Option<ArtifactKind> {
        ArtifactKind::from_filename(&self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_validity() {
        assert!(TimeRange::new(0.0, 3.0).is_valid());
        assert!(!TimeRange::new(3.0, 3.0).is_valid());
        assert!(!TimeRange::new(-1.0, 3.0).is_valid());
        assert!(!TimeRange::new(5.0, 2.0).is_valid());
    }

    #[test]
    fn test_kind_partition() {
        assert_eq!(
            ArtifactKind::from_filename("clip_0001.gif"),
            Some(ArtifactKind::Primary)
        );
        assert_eq!(
            ArtifactKind::from_filename("merged_1_a1b2c3d4.gif"),
            Some(ArtifactKind::Merged)
        );
        assert_eq!(ArtifactKind::from_filename("upload.gif"), None);
    }
}
