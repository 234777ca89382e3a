use serde::Serialize;

use crate::constants::MIN_ROUND_SECONDS;

/// Round timing parameters. A value of this type is always a consistent
/// snapshot: handlers copy it once per request and never read fields from
/// the live holder individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingParams {
    pub round_seconds: i64,
    pub close_bets_at: i64,
    pub anchor_ms: i64,
}

impl TimingParams {
    /// Applies the guardrails. The close offset must leave at least one
    /// second of open betting per round.
    pub fn sanitize(mut self) -> Self {
        if self.round_seconds < MIN_ROUND_SECONDS {
            self.round_seconds = MIN_ROUND_SECONDS;
        }
        if self.close_bets_at < 1 {
            self.close_bets_at = 1;
        }
        if self.close_bets_at >= self.round_seconds {
            self.close_bets_at = self.round_seconds - 1;
        }
        self
    }

    fn round_ms(&self) -> i64 {
        self.round_seconds * 1_000
    }
}

/// Snapshot of one round relative to a given instant.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundInfo {
    pub round_id: i64,
    pub start_ms: i64,
    pub end_ms: i64,
    pub close_at_ms: i64,
    pub bets_open: bool,
    pub seconds_left: i64,
    pub seconds_to_close: i64,
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn ceil_secs(ms: i64) -> i64 {
    (ms.max(0) + 999) / 1_000
}

/// The round containing `now_ms`. Ids are negative before the anchor;
/// `div_euclid` keeps them monotonic across it.
pub fn round_info(params: TimingParams, now_ms: i64) -> RoundInfo {
    let round_id = (now_ms - params.anchor_ms).div_euclid(params.round_ms());
    round_by_id(params, round_id, now_ms)
}

/// Timing snapshot for an arbitrary round id, evaluated at `now_ms`.
/// At `now == close_at` betting is already closed.
pub fn round_by_id(params: TimingParams, round_id: i64, now_ms: i64) -> RoundInfo {
    let start_ms = params.anchor_ms + round_id * params.round_ms();
    let end_ms = start_ms + params.round_ms();
    let close_at_ms = end_ms - params.close_bets_at * 1_000;
    RoundInfo {
        round_id,
        start_ms,
        end_ms,
        close_at_ms,
        bets_open: now_ms < close_at_ms,
        seconds_left: ceil_secs(end_ms - now_ms),
        seconds_to_close: ceil_secs(close_at_ms - now_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> TimingParams {
        TimingParams {
            round_seconds: 300,
            close_bets_at: 30,
            anchor_ms: 1_000_000,
        }
    }

    #[test]
    fn round_ids_are_monotonic_in_time() {
        let p = params();
        let mut last = i64::MIN;
        for t in (0..2_000_000).step_by(37_000) {
            let id = round_info(p, t).round_id;
            assert!(id >= last, "round id went backwards at t={t}");
            last = id;
        }
    }

    #[test]
    fn round_boundaries_line_up() {
        let p = params();
        let info = round_info(p, p.anchor_ms + 3 * 300_000 + 12_345);
        assert_eq!(info.round_id, 3);
        assert_eq!(info.start_ms, p.anchor_ms + 3 * 300_000);
        assert_eq!(info.end_ms, info.start_ms + 300_000);
        assert_eq!(info.close_at_ms, info.end_ms - 30_000);
    }

    #[test]
    fn bets_close_exactly_at_close_at() {
        let p = params();
        let close_at = round_info(p, p.anchor_ms).close_at_ms;
        assert!(round_info(p, close_at - 1).bets_open);
        assert!(!round_info(p, close_at).bets_open);
        assert!(!round_info(p, close_at + 1).bets_open);
    }

    #[test]
    fn seconds_left_rounds_up_and_clamps_at_zero() {
        let p = params();
        let info = round_info(p, p.anchor_ms + 1);
        assert_eq!(info.seconds_left, 300);
        let late = round_by_id(p, 0, p.anchor_ms + 400_000);
        assert_eq!(late.seconds_left, 0);
        assert_eq!(late.seconds_to_close, 0);
        assert!(!late.bets_open);
    }

    #[test]
    fn rounds_before_the_anchor_have_negative_ids() {
        let p = params();
        assert_eq!(round_info(p, p.anchor_ms - 1).round_id, -1);
        assert_eq!(round_info(p, p.anchor_ms).round_id, 0);
    }

    #[test]
    fn sanitize_clamps_the_guardrails() {
        let t = TimingParams {
            round_seconds: 5,
            close_bets_at: 0,
            anchor_ms: 0,
        }
        .sanitize();
        assert_eq!(t.round_seconds, 30);
        assert_eq!(t.close_bets_at, 1);

        let t = TimingParams {
            round_seconds: 60,
            close_bets_at: 60,
            anchor_ms: 0,
        }
        .sanitize();
        assert_eq!(t.close_bets_at, 59);

        let t = TimingParams {
            round_seconds: 120,
            close_bets_at: 500,
            anchor_ms: 0,
        }
        .sanitize();
        assert_eq!(t.close_bets_at, 119);
    }
}
