use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::constants::{REDEEM_MAX_ATTEMPTS, REDEEM_WINDOW_MS};
use crate::round::now_ms;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at_ms: i64,
}

/// Fixed-window per-IP limiter. One process-wide instance; entries are
/// evicted by the sweeper once their window passes.
#[derive(Debug)]
pub struct RateLimiter {
    max_attempts: u32,
    window_ms: i64,
    windows: DashMap<IpAddr, Window>,
}

impl RateLimiter {
    pub fn new(max_attempts: u32, window_ms: i64) -> Self {
        Self {
            max_attempts,
            window_ms,
            windows: DashMap::new(),
        }
    }

    pub fn redeem_default() -> Self {
        Self::new(REDEEM_MAX_ATTEMPTS, REDEEM_WINDOW_MS)
    }

    /// Charges one attempt against `ip`. Over the limit returns the
    /// whole seconds until the window resets.
    pub fn check(&self, ip: IpAddr, now_ms: i64) -> Result<(), u64> {
        let mut entry = self.windows.entry(ip).or_insert(Window {
            count: 0,
            reset_at_ms: now_ms + self.window_ms,
        });
        if now_ms >= entry.reset_at_ms {
            *entry = Window {
                count: 0,
                reset_at_ms: now_ms + self.window_ms,
            };
        }
        if entry.count >= self.max_attempts {
            let retry = ((entry.reset_at_ms - now_ms).max(0) + 999) / 1_000;
            return Err(retry as u64);
        }
        entry.count += 1;
        Ok(())
    }

    /// Drops windows that have already reset. Bounds memory between
    /// sweeps to one entry per recently-seen IP.
    pub fn sweep(&self, now_ms: i64) {
        self.windows.retain(|_, w| w.reset_at_ms > now_ms);
    }

    pub fn tracked_ips(&self) -> usize {
        self.windows.len()
    }
}

/// Periodic eviction task. Runs for the lifetime of the process.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            limiter.sweep(now_ms());
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([10, 0, 0, last])
    }

    #[test]
    fn five_attempts_then_limited() {
        let rl = RateLimiter::new(5, 60_000);
        for _ in 0..5 {
            assert!(rl.check(ip(1), 1_000).is_ok());
        }
        let retry = rl.check(ip(1), 2_000).unwrap_err();
        assert_eq!(retry, 59); // window resets at t=61s, ceil from t=2s
    }

    #[test]
    fn windows_are_per_ip() {
        let rl = RateLimiter::new(1, 60_000);
        assert!(rl.check(ip(1), 0).is_ok());
        assert!(rl.check(ip(1), 0).is_err());
        assert!(rl.check(ip(2), 0).is_ok());
    }

    #[test]
    fn window_expiry_resets_the_count() {
        let rl = RateLimiter::new(2, 60_000);
        assert!(rl.check(ip(1), 0).is_ok());
        assert!(rl.check(ip(1), 0).is_ok());
        assert!(rl.check(ip(1), 59_999).is_err());
        assert!(rl.check(ip(1), 60_000).is_ok());
    }

    #[test]
    fn sweep_evicts_only_expired_windows() {
        let rl = RateLimiter::new(5, 60_000);
        rl.check(ip(1), 0).unwrap();
        rl.check(ip(2), 50_000).unwrap();
        rl.sweep(70_000);
        assert_eq!(rl.tracked_ips(), 1);
        rl.sweep(200_000);
        assert_eq!(rl.tracked_ips(), 0);
    }
}
