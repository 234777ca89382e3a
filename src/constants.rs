/// Basis-point denominator for every pot and weight computation.
pub const BPS_DENOM: i64 = 10_000;

// Pot split, in basis points of the round pot. The three shares sum to
// BPS_DENOM; floor losses from the split roll into carry.
pub const ADMIN_TAKE_BPS: i64 = 2_500;
pub const CARRY_BPS: i64 = 1_000;
pub const WIN_POOL_BPS: i64 = 6_500;

/// Prize categories in classification order, with their share of the
/// allocation base in basis points. Weights sum to BPS_DENOM.
pub const CATEGORY_WEIGHTS_BPS: [(&str, i64); 7] = [
    ("4+1", 3_500),
    ("4+0", 1_500),
    ("3+1", 1_800),
    ("3+0", 1_000),
    ("2+1", 1_000),
    ("2+0", 700),
    ("1+1", 500),
];

// Selection bounds for a bet: 4..=8 distinct numbers in 1..=20 plus a
// chance digit in 1..=5.
pub const NUM_MIN: i32 = 1;
pub const NUM_MAX: i32 = 20;
pub const PICK_MIN: usize = 4;
pub const PICK_MAX: usize = 8;
pub const CHANCE_MIN: i32 = 1;
pub const CHANCE_MAX: i32 = 5;

/// Domain tag mixed into the draw HMAC. Fixed: changing it changes every
/// historical outcome.
pub const DRAW_DOMAIN_TAG: &str = "ddj:round:";

/// Salt prefix for gift-code hashes. Fixed for the same reason.
pub const CODE_HASH_TAG: &str = "DDJ|";

/// Minimum length of SECRET_SEED accepted by draw and redemption.
pub const MIN_SEED_LEN: usize = 16;

/// Gift-code surface alphabet: uppercase alphanumerics without the
/// ambiguous glyphs O, 0, I, 1.
pub const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LEN: usize = 12;
pub const MAX_CODES_PER_BATCH: u32 = 500;

// Redemption rate limit: fixed windows per client IP.
pub const REDEEM_MAX_ATTEMPTS: u32 = 5;
pub const REDEEM_WINDOW_MS: i64 = 60_000;

// Timing defaults and guardrails.
pub const MIN_ROUND_SECONDS: i64 = 30;
pub const DEFAULT_ROUND_SECONDS: i64 = 300;
pub const DEFAULT_CLOSE_BETS_AT: i64 = 30;
/// 2025-01-01T00:00:00Z. Round ids are stable as long as this anchor is.
pub const DEFAULT_ANCHOR_MS: i64 = 1_735_689_600_000;

pub const DEFAULT_SIGNUP_BONUS_DOS: i64 = 50;
pub const DEFAULT_PORT: u16 = 3000;
