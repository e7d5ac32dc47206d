//! Processing settings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// User-tunable processing parameters.
///
/// Out-of-range values are clamped, never rejected, so a submission with
/// odd numbers still produces something sensible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ProcessSettings {
    /// Maximum seconds per output clip
    pub max_clip_duration: f64,
    /// Output frame rate
    pub fps: u32,
    /// Output width in pixels (height auto-scaled)
    pub width: u32,
    /// Scene detection sensitivity (lower = more cuts)
    pub sensitivity: u32,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            max_clip_duration: 5.0,
            fps: 10,
            width: 480,
            sensitivity: 30,
        }
    }
}

impl ProcessSettings {
    pub const DURATION_RANGE: (f64, f64) = (1.0, 30.0);
    pub const FPS_RANGE: (u32, u32) = (5, 30);
    pub const WIDTH_RANGE: (u32, u32) = (240, 1920);
    pub const SENSITIVITY_RANGE: (u32, u32) = (10, 60);

    /// Clamp every field into its valid range.
    pub fn clamped(self) -> Self {
        Self {
            max_clip_duration: self
                .max_clip_duration
                .clamp(Self::DURATION_RANGE.0, Self::DURATION_RANGE.1),
            fps: self.fps.clamp(Self::FPS_RANGE.0, Self::FPS_RANGE.1),
            width: self.width.clamp(Self::WIDTH_RANGE.0, Self::WIDTH_RANGE.1),
            sensitivity: self
                .sensitivity
                .clamp(Self::SENSITIVITY_RANGE.0, Self::SENSITIVITY_RANGE.1),
        }
    }

    /// Canonical encoding used as the settings half of the cache
    /// fingerprint. One decimal place on the duration keeps `5` and
    /// `5.0` identical.
    pub fn cache_token(&self) -> String {
        format!(
            "{:.1}_{}_{}_{}",
            self.max_clip_duration, self.fps, self.width, self.sensitivity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamping() {
        let settings = ProcessSettings {
            max_clip_duration: 99.0,
            fps: 1,
            width: 10_000,
            sensitivity: 0,
        }
        .clamped();

        assert_eq!(settings.max_clip_duration, 30.0);
        assert_eq!(settings.fps, 5);
        assert_eq!(settings.width, 1920);
        assert_eq!(settings.sensitivity, 10);
    }

    #[test]
    fn test_in_range_untouched() {
        let settings = ProcessSettings::default().clamped();
        assert_eq!(settings, ProcessSettings::default());
    }

    #[test]
    fn test_cache_token_is_canonical() {
        let a = ProcessSettings {
            max_clip_duration: 5.0,
            ..Default::default()
        };
        let b = ProcessSettings {
            max_clip_duration: 5.00,
            ..Default::default()
        };
        assert_eq!(a.cache_token(), b.cache_token());
        assert_eq!(a.cache_token(), "5.0_10_480_30");
    }
}
