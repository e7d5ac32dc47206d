//! Content-addressed cache fingerprints.

use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

use gifsmith_models::ProcessSettings;

use crate::error::EngineResult;

/// How much of the input participates in the hash. Hashing a bounded
/// prefix keeps submission latency flat for multi-gigabyte files while
/// still making collisions between distinct uploads vanishingly rare.
const HASH_PREFIX_BYTES: u64 = 10 * 1024 * 1024;
const CHUNK_BYTES: usize = 1024 * 1024;

/// Compute the cache fingerprint for an input file under the given
/// settings: sha256 of the first 10 MiB combined with the canonical
/// settings token.
pub async fn compute_fingerprint(
    path: impl AsRef<Path>,
    settings: &ProcessSettings,
) -> EngineResult<String> {
    let mut file = tokio::fs::File::open(path.as_ref()).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_BYTES];
    let mut read_total: u64 = 0;

    while read_total < HASH_PREFIX_BYTES {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        read_total += n as u64;
    }

    let digest = hex::encode(hasher.finalize());
    Ok(format!("{}_{}", digest, settings.cache_token()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fingerprint_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.bin");
        tokio::fs::write(&path, b"same bytes").await.unwrap();

        let settings = ProcessSettings::default();
        let a = compute_fingerprint(&path, &settings).await.unwrap();
        let b = compute_fingerprint(&path, &settings).await.unwrap();
        assert_eq!(a, b);
        assert!(a.ends_with(&settings.cache_token()));
    }

    #[tokio::test]
    async fn test_fingerprint_varies_with_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.bin");
        tokio::fs::write(&path, b"same bytes").await.unwrap();

        let a = compute_fingerprint(&path, &ProcessSettings::default())
            .await
            .unwrap();
        let b = compute_fingerprint(
            &path,
            &ProcessSettings {
                fps: 15,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_fingerprint_varies_with_content() {
        let dir = tempfile::tempdir().unwrap();
        let a_path = dir.path().join("a.bin");
        let b_path = dir.path().join("b.bin");
        tokio::fs::write(&a_path, b"one").await.unwrap();
        tokio::fs::write(&b_path, b"two").await.unwrap();

        let settings = ProcessSettings::default();
        let a = compute_fingerprint(&a_path, &settings).await.unwrap();
        let b = compute_fingerprint(&b_path, &settings).await.unwrap();
        assert_ne!(a, b);
    }
}
