use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::constants::{DRAW_DOMAIN_TAG, MIN_SEED_LEN};

type HmacSha256 = Hmac<Sha256>;

/// Substituted when the seed hash yields an all-zero xorshift state,
/// which would otherwise produce a constant stream.
const STATE_FALLBACK: u32 = 0x9E37_79B9;

#[derive(Debug, thiserror::Error)]
pub enum DrawError {
    #[error("SECRET_SEED must be at least {MIN_SEED_LEN} characters")]
    SeedTooShort,
}

/// A drawn round outcome: four distinct mains in 1..=20, ascending, plus
/// a chance digit in 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub main: [u8; 4],
    pub chance: u8,
}

impl Outcome {
    pub fn main_contains(&self, n: i32) -> bool {
        self.main.iter().any(|&m| i32::from(m) == n)
    }
}

/// The exact step matters for compatibility: shifts 13/17/5, state never
/// zero, floats taken as `u32 / 2^32`.
struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    fn new(state: u32) -> Self {
        Self {
            state: if state == 0 { STATE_FALLBACK } else { state },
        }
    }

    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    fn next_unit(&mut self) -> f64 {
        f64::from(self.next_u32()) / 4_294_967_296.0
    }
}

/// Deterministic draw for a round: `HMAC-SHA256(seed, "ddj:round:" || id)`
/// keys a xorshift32 stream; mains are drawn by rejection, the chance
/// digit uniformly. Pure in `(seed, round_id)`.
pub fn draw(seed: &str, round_id: i64) -> Result<Outcome, DrawError> {
    if seed.len() < MIN_SEED_LEN {
        return Err(DrawError::SeedTooShort);
    }

    let mut mac =
        HmacSha256::new_from_slice(seed.as_bytes()).map_err(|_| DrawError::SeedTooShort)?;
    mac.update(format!("{DRAW_DOMAIN_TAG}{round_id}").as_bytes());
    let digest = mac.finalize().into_bytes();

    let state = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    let mut rng = XorShift32::new(state);

    let mut main = [0u8; 4];
    let mut picked = 0;
    let mut seen: u32 = 0;
    while picked < 4 {
        let n = (rng.next_unit() * 20.0) as u32 + 1;
        if seen & (1 << n) != 0 {
            continue;
        }
        seen |= 1 << n;
        main[picked] = n as u8;
        picked += 1;
    }
    main.sort_unstable();

    let chance = (rng.next_unit() * 5.0) as u8 + 1;

    Ok(Outcome { main, chance })
}
