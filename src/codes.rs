use rand::Rng;
use sha2::{Digest, Sha256};

use crate::constants::{CODE_ALPHABET, CODE_HASH_TAG, CODE_LEN};

/// True when `code` is a well-formed surface code: exactly twelve
/// characters from the unambiguous alphabet.
pub fn is_valid_format(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
}

/// Generates a fresh plaintext code. Shown once at generation; only the
/// salted hash is ever stored.
pub fn generate(rng: &mut impl Rng) -> String {
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Lookup hash: `hex(SHA-256("DDJ|" || seed || "|" || code))`. Salting
/// with the seed keeps a leaked table useless without the environment.
pub fn code_hash(seed: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(CODE_HASH_TAG.as_bytes());
    hasher.update(seed.as_bytes());
    hasher.update(b"|");
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SEED: &str = "test-seed-0123456789abcdef";

    #[test]
    fn format_accepts_the_alphabet_only() {
        assert!(is_valid_format("ABCDEFGHJKMN"));
        assert!(is_valid_format("23456789ZYXW"));

        assert!(!is_valid_format("ABCDEFGHJKM")); // 11 chars
        assert!(!is_valid_format("ABCDEFGHJKMNP")); // 13 chars
        assert!(!is_valid_format("abcdefghjkmn")); // lowercase
        assert!(!is_valid_format("ABCDEFGHJKM0")); // ambiguous 0
        assert!(!is_valid_format("ABCDEFGHJKM1")); // ambiguous 1
        assert!(!is_valid_format("ABCDEFGHJKMO")); // ambiguous O
        assert!(!is_valid_format("ABCDEFGHJKMI")); // ambiguous I
    }

    #[test]
    fn generated_codes_are_well_formed() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let code = generate(&mut rng);
            assert!(is_valid_format(&code), "bad code {code}");
        }
    }

    #[test]
    fn hash_is_stable_and_seed_salted() {
        let code = "ABCDEFGHJKMN";
        assert_eq!(code_hash(SEED, code), code_hash(SEED, code));
        assert_ne!(code_hash(SEED, code), code_hash("other-seed-0123456789", code));
        assert_ne!(code_hash(SEED, code), code_hash(SEED, "NMKJHGFEDCBA"));
        assert_eq!(code_hash(SEED, code).len(), 64);
    }

    #[test]
    fn distinct_codes_do_not_collide() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1_000 {
            assert!(seen.insert(code_hash(SEED, &generate(&mut rng))));
        }
    }
}
