//! Upload key generation.
//!
//! Keys are fixed-length strings drawn uniformly from a configured alphabet
//! using the operating system's cryptographic random source. Uniformity is
//! kept with rejection sampling: a random byte is only accepted while it is
//! below the largest multiple of the alphabet size, because folding the full
//! 0..=255 range with modulo would make the low symbols slightly more likely.

use rand::{TryRngCore, rngs::OsRng};

use crate::error::AppError;

/// Generates random upload keys.
///
/// Construct once at startup; the constructor validates the configured
/// alphabet and precomputes the rejection-sampling limit. Generation itself
/// has no side effects beyond consuming entropy.
pub struct KeyGenerator {
    alphabet: Vec<u8>,
    length: usize,
    /// First byte value rejected during sampling: the largest multiple of
    /// the alphabet size that fits in a byte.
    rejection_limit: u16,
}

impl KeyGenerator {
    /// Create a generator for `length`-character keys over `alphabet`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` when the alphabet is empty, not
    /// ASCII, larger than 256 symbols, or the length is zero. These are
    /// configuration mistakes and should fail startup.
    pub fn new(alphabet: &str, length: usize) -> Result<Self, AppError> {
        if length == 0 {
            return Err(AppError::Validation(
                "key length must be at least 1".to_string(),
            ));
        }
        if alphabet.is_empty() {
            return Err(AppError::Validation(
                "key alphabet must not be empty".to_string(),
            ));
        }
        if !alphabet.is_ascii() {
            return Err(AppError::Validation(
                "key alphabet must be ASCII".to_string(),
            ));
        }
        if alphabet.len() > 256 {
            return Err(AppError::Validation(
                "key alphabet cannot exceed 256 symbols".to_string(),
            ));
        }

        let symbols = alphabet.len() as u16;
        Ok(Self {
            alphabet: alphabet.as_bytes().to_vec(),
            length,
            rejection_limit: 256 - (256 % symbols),
        })
    }

    /// Generate one key from the OS random source.
    ///
    /// # Errors
    ///
    /// Returns `AppError::RandomSource` if the entropy source cannot be
    /// read. There is no fallback to a weaker source.
    pub fn generate(&self) -> Result<String, AppError> {
        self.generate_with(&mut OsRng)
    }

    /// Sampling core, generic over the random source so tests can drive it
    /// with deterministic or failing implementations.
    fn generate_with<R>(&self, rng: &mut R) -> Result<String, AppError>
    where
        R: TryRngCore + ?Sized,
    {
        let mut key = String::with_capacity(self.length);
        let mut buf = [0u8; 16];

        while key.len() < self.length {
            rng.try_fill_bytes(&mut buf)
                .map_err(|err| AppError::RandomSource(err.to_string()))?;

            for &byte in &buf {
                if key.len() == self.length {
                    break;
                }
                if u16::from(byte) < self.rejection_limit {
                    key.push(self.alphabet[byte as usize % self.alphabet.len()] as char);
                }
            }
        }

        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::fmt;

    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    use super::*;

    const ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    /// Yields a scripted byte sequence, then zeroes.
    struct ScriptedRng {
        bytes: VecDeque<u8>,
    }

    impl ScriptedRng {
        fn new(bytes: &[u8]) -> Self {
            Self {
                bytes: bytes.iter().copied().collect(),
            }
        }
    }

    impl RngCore for ScriptedRng {
        fn next_u32(&mut self) -> u32 {
            let mut buf = [0u8; 4];
            self.fill_bytes(&mut buf);
            u32::from_le_bytes(buf)
        }

        fn next_u64(&mut self) -> u64 {
            let mut buf = [0u8; 8];
            self.fill_bytes(&mut buf);
            u64::from_le_bytes(buf)
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            for slot in dst.iter_mut() {
                *slot = self.bytes.pop_front().unwrap_or(0);
            }
        }
    }

    /// Always fails, standing in for an unreadable entropy source.
    struct FailingRng;

    #[derive(Debug)]
    struct EntropyUnavailable;

    impl fmt::Display for EntropyUnavailable {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("entropy source unavailable")
        }
    }

    impl TryRngCore for FailingRng {
        type Error = EntropyUnavailable;

        fn try_next_u32(&mut self) -> Result<u32, Self::Error> {
            Err(EntropyUnavailable)
        }

        fn try_next_u64(&mut self) -> Result<u64, Self::Error> {
            Err(EntropyUnavailable)
        }

        fn try_fill_bytes(&mut self, _dst: &mut [u8]) -> Result<(), Self::Error> {
            Err(EntropyUnavailable)
        }
    }

    #[test]
    fn generated_keys_have_length_and_alphabet() {
        let generator = KeyGenerator::new(ALPHABET, 8).unwrap();

        for _ in 0..100 {
            let key = generator.generate().unwrap();
            assert_eq!(key.len(), 8);
            assert!(
                key.chars().all(|ch| ALPHABET.contains(ch)),
                "key {key} contains a symbol outside the alphabet"
            );
        }
    }

    #[test]
    fn symbol_distribution_is_uniform_at_every_position() {
        // Deterministic source, so the statistic itself is reproducible.
        let generator = KeyGenerator::new(ALPHABET, 8).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let samples = 100_000usize;
        let mut counts = [[0u64; 36]; 8];
        for _ in 0..samples {
            let key = generator.generate_with(&mut rng).unwrap();
            for (position, ch) in key.chars().enumerate() {
                counts[position][ALPHABET.find(ch).unwrap()] += 1;
            }
        }

        let expected = samples as f64 / 36.0;
        for (position, position_counts) in counts.iter().enumerate() {
            let chi_square: f64 = position_counts
                .iter()
                .map(|&count| {
                    let diff = count as f64 - expected;
                    diff * diff / expected
                })
                .sum();

            // Well past the critical value for 35 degrees of freedom at
            // p = 0.0001 (74.9); a biased sampler lands far above this.
            assert!(
                chi_square < 85.0,
                "chi-square statistic {chi_square} at position {position} exceeds uniformity bound"
            );
        }
    }

    #[test]
    fn bytes_past_the_rejection_limit_are_discarded() {
        // Alphabet size 36 gives a rejection limit of 252. The first four
        // scripted bytes must be skipped, not folded onto low symbols.
        let generator = KeyGenerator::new(ALPHABET, 8).unwrap();
        let mut rng = ScriptedRng::new(&[252, 253, 254, 255, 0, 1, 2, 3, 4, 5, 6, 7]);

        let key = generator.generate_with(&mut rng).unwrap();
        assert_eq!(key, "ABCDEFGH");
    }

    #[test]
    fn entropy_failure_surfaces_random_source_error() {
        let generator = KeyGenerator::new(ALPHABET, 8).unwrap();

        let result = generator.generate_with(&mut FailingRng);
        assert!(matches!(result, Err(AppError::RandomSource(_))));
    }

    #[test]
    fn constructor_rejects_bad_configuration() {
        assert!(KeyGenerator::new(ALPHABET, 0).is_err());
        assert!(KeyGenerator::new("", 8).is_err());
        assert!(KeyGenerator::new("ÅÄÖ", 8).is_err());
    }
}
