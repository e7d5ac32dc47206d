//! Artifact filename grammar and generators.
//!
//! Every boundary that accepts a filename re-checks it against this
//! grammar before touching the filesystem. The grammar admits only
//! alphanumerics, underscore and hyphen plus the fixed `.gif`
//! extension, which makes path traversal unrepresentable.

use regex::Regex;
use std::sync::LazyLock;
use uuid::Uuid;

static SAFE_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+\.(gif|GIF)$").expect("valid regex"));

/// Check whether a filename is safe to use inside a job directory.
pub fn is_safe_filename(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    // Separators and NUL can never appear; the regex would reject them
    // too, but the explicit check keeps the intent obvious.
    if name.contains(['/', '\\', '\0']) || name.contains("..") {
        return false;
    }
    SAFE_FILENAME.is_match(name)
}

/// Name for the idx-th primary segment output.
pub fn primary_name(idx: usize) -> String {
    format!("clip_{:04}.gif", idx)
}

/// Name for a merged output. The sequence number keeps directory order
/// stable; the random suffix avoids clobbering after deletions.
pub fn merged_name(seq: u32) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("merged_{}_{}.gif", seq, &suffix[..8])
}

/// Name for the grayscale variant of an existing artifact.
pub fn grayscale_name(source: &str) -> Option<String> {
    let stem = source.strip_suffix(".gif").or_else(|| source.strip_suffix(".GIF"))?;
    Some(format!("{}_grayscale.gif", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_generated_names() {
        assert!(is_safe_filename("clip_0001.gif"));
        assert!(is_safe_filename(&primary_name(42)));
        assert!(is_safe_filename(&merged_name(3)));
        assert!(is_safe_filename("clip_0001_grayscale.gif"));
        assert!(is_safe_filename("CLIP.GIF"));
    }

    #[test]
    fn test_rejects_traversal() {
        assert!(!is_safe_filename("../../etc/passwd.gif"));
        assert!(!is_safe_filename("a/b.gif"));
        assert!(!is_safe_filename("a\\b.gif"));
        assert!(!is_safe_filename("clip\0.gif"));
        assert!(!is_safe_filename(""));
        assert!(!is_safe_filename("clip_0001.png"));
        assert!(!is_safe_filename("clip 0001.gif"));
        assert!(!is_safe_filename(".gif"));
    }

    #[test]
    fn test_grayscale_name() {
        assert_eq!(
            grayscale_name("clip_0001.gif").as_deref(),
            Some("clip_0001_grayscale.gif")
        );
        assert!(grayscale_name("clip_0001.png").is_none());
    }
}
