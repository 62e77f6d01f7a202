//! Short-code identifier generation for new orders.
//!
//! Codes are random ASCII alphanumerics. No uniqueness check is made against
//! stored orders; a collision surfaces as a primary-key failure on insert.

use rand::distr::Alphanumeric;
use rand::Rng;

/// Default length of generated order ids.
pub const DEFAULT_ID_LENGTH: usize = 5;

/// Source of identifiers for newly created orders.
pub trait IdGenerator {
    fn generate(&self, length: usize) -> String;
}

/// Thread-local RNG backed short-code generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortCodeGenerator;

impl IdGenerator for ShortCodeGenerator {
    fn generate(&self, length: usize) -> String {
        generate_short_code(length)
    }
}

/// Generates a random alphanumeric code of `length` characters.
pub fn generate_short_code(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{generate_short_code, IdGenerator, ShortCodeGenerator, DEFAULT_ID_LENGTH};
    use std::collections::HashSet;

    #[test]
    fn short_code_has_requested_length_and_charset() {
        for length in [1, DEFAULT_ID_LENGTH, 32] {
            let code = generate_short_code(length);
            assert_eq!(code.len(), length);
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn zero_length_yields_empty_code() {
        assert!(ShortCodeGenerator.generate(0).is_empty());
    }

    #[test]
    fn generated_codes_are_not_repeated_in_small_batches() {
        let codes: HashSet<String> = (0..64)
            .map(|_| ShortCodeGenerator.generate(DEFAULT_ID_LENGTH))
            .collect();
        // 62^5 space; 64 draws colliding is astronomically unlikely.
        assert_eq!(codes.len(), 64);
    }
}
