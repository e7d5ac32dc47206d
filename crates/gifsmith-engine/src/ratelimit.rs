//! Fixed-window per-client rate limiting.
//!
//! Each client IP gets a window of `window` length holding two counters,
//! one for all requests and one for uploads. Counters reset together the
//! moment the window deadline passes; a request arriving exactly at the
//! deadline starts a fresh window.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Which counter a request debits. Uploads debit both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitKind {
    General,
    Upload,
}

#[derive(Debug)]
struct Window {
    count: u32,
    upload_count: u32,
    reset_at: Instant,
}

/// Fixed-window limiter keyed by client IP.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    max_uploads: u32,
    clients: Mutex<HashMap<IpAddr, Window>>,
}

/// When the table exceeds this many tracked clients, a bounded sweep of
/// expired windows runs before the next admit.
const TRIM_THRESHOLD: usize = 10_000;
const TRIM_BATCH: usize = 1_000;

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32, max_uploads: u32) -> Self {
        Self {
            window,
            max_requests,
            max_uploads,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject a request from `ip`. Returns the remaining general
    /// budget on success, or `Err(retry_after)` when over the limit.
    pub fn admit(&self, ip: IpAddr, kind: AdmitKind) -> Result<u32, Duration> {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        if clients.len() > TRIM_THRESHOLD {
            let expired: Vec<IpAddr> = clients
                .iter()
                .filter(|(_, w)| w.reset_at <= now)
                .take(TRIM_BATCH)
                .map(|(ip, _)| *ip)
                .collect();
            for ip in expired {
                clients.remove(&ip);
            }
        }

        let entry = clients.entry(ip).or_insert_with(|| Window {
            count: 0,
            upload_count: 0,
            reset_at: now + self.window,
        });

        if entry.reset_at <= now {
            entry.count = 0;
            entry.upload_count = 0;
            entry.reset_at = now + self.window;
        }

        if entry.count >= self.max_requests {
            return Err(entry.reset_at.saturating_duration_since(now));
        }
        if kind == AdmitKind::Upload && entry.upload_count >= self.max_uploads {
            return Err(entry.reset_at.saturating_duration_since(now));
        }

        entry.count += 1;
        if kind == AdmitKind::Upload {
            entry.upload_count += 1;
        }
        Ok(self.max_requests - entry.count)
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.clients.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([10, 0, 0, last])
    }

    #[tokio::test(start_paused = true)]
    async fn test_general_limit_and_window_reset() {
        let rl = RateLimiter::new(Duration::from_secs(60), 3, 2);

        for _ in 0..3 {
            assert!(rl.admit(ip(1), AdmitKind::General).is_ok());
        }
        let retry = rl.admit(ip(1), AdmitKind::General).unwrap_err();
        assert!(retry <= Duration::from_secs(60));

        // Just before the deadline the request is still rejected.
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(rl.admit(ip(1), AdmitKind::General).is_err());

        // At the deadline the window resets and admits again.
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(rl.admit(ip(1), AdmitKind::General).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_limit_tighter_than_general() {
        let rl = RateLimiter::new(Duration::from_secs(60), 10, 2);

        assert!(rl.admit(ip(2), AdmitKind::Upload).is_ok());
        assert!(rl.admit(ip(2), AdmitKind::Upload).is_ok());
        assert!(rl.admit(ip(2), AdmitKind::Upload).is_err());
        // General traffic still has budget.
        assert!(rl.admit(ip(2), AdmitKind::General).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_uploads_debit_general_counter() {
        let rl = RateLimiter::new(Duration::from_secs(60), 3, 3);

        assert!(rl.admit(ip(3), AdmitKind::Upload).is_ok());
        assert!(rl.admit(ip(3), AdmitKind::Upload).is_ok());
        assert!(rl.admit(ip(3), AdmitKind::General).is_ok());
        assert!(rl.admit(ip(3), AdmitKind::Upload).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clients_are_independent() {
        let rl = RateLimiter::new(Duration::from_secs(60), 1, 1);

        assert!(rl.admit(ip(4), AdmitKind::General).is_ok());
        assert!(rl.admit(ip(4), AdmitKind::General).is_err());
        assert!(rl.admit(ip(5), AdmitKind::General).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trim_sweeps_expired_windows() {
        let rl = RateLimiter::new(Duration::from_secs(60), 5, 5);

        for i in 0..(TRIM_THRESHOLD as u32 + 10) {
            let addr = IpAddr::from((0x0a00_0000u32 + i).to_be_bytes());
            rl.admit(addr, AdmitKind::General).unwrap();
        }
        let before = rl.tracked();
        assert!(before > TRIM_THRESHOLD);

        tokio::time::advance(Duration::from_secs(61)).await;
        rl.admit(ip(6), AdmitKind::General).unwrap();
        assert!(rl.tracked() <= before + 1 - TRIM_BATCH);
    }
}
