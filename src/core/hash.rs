//! Course Fingerprinting
//!
//! Provides deterministic hashing of generated course data for:
//! - Determinism audits between two independently seeded generators
//! - Cheap desync diagnostics in logs (hex of the first bytes)
//!
//! Floats are hashed by their exact IEEE-754 bit pattern, so two fingerprints
//! only match when every drawn value is bit-for-bit identical.

use sha2::{Sha256, Digest};

/// Hash output type (256 bits / 32 bytes)
pub type Fingerprint = [u8; 32];

/// Deterministic hasher for course data.
///
/// Wraps SHA-256 with helpers for the simulation's scalar types.
/// Order of updates is critical for determinism.
pub struct CourseHasher {
    hasher: Sha256,
}

impl CourseHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for a course spawn log.
    pub fn for_course() -> Self {
        Self::new(b"FLAPPYGULL_COURSE_V1")
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an i32 value (little-endian).
    #[inline]
    pub fn update_i32(&mut self, value: i32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an f64 by bit pattern (little-endian).
    #[inline]
    pub fn update_f64(&mut self, value: f64) {
        self.hasher.update(value.to_bits().to_le_bytes());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.hasher.update([u8::from(value)]);
    }

    /// Update with an optional f64 (presence byte, then value).
    #[inline]
    pub fn update_opt_f64(&mut self, value: Option<f64>) {
        self.update_bool(value.is_some());
        if let Some(v) = value {
            self.update_f64(v);
        }
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> Fingerprint {
        self.hasher.finalize().into()
    }
}

/// Short hex prefix of a fingerprint for log lines.
pub fn short_hex(fingerprint: &Fingerprint) -> String {
    hex::encode(&fingerprint[..6])
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hasher_determinism() {
        let make_hash = || {
            let mut hasher = CourseHasher::for_course();
            hasher.update_u32(100);
            hasher.update_f64(311.0);
            hasher.update_opt_f64(None);
            hasher.update_bool(true);
            hasher.finalize()
        };

        assert_eq!(make_hash(), make_hash());
    }

    #[test]
    fn test_hash_order_matters() {
        let hash1 = {
            let mut h = CourseHasher::new(b"test");
            h.update_i32(1);
            h.update_i32(2);
            h.finalize()
        };

        let hash2 = {
            let mut h = CourseHasher::new(b"test");
            h.update_i32(2);
            h.update_i32(1);
            h.finalize()
        };

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_float_bits_are_significant() {
        let hash_of = |v: f64| {
            let mut h = CourseHasher::for_course();
            h.update_f64(v);
            h.finalize()
        };

        // 0.0 and -0.0 compare equal but are different draws
        assert_ne!(hash_of(0.0), hash_of(-0.0));
        assert_ne!(hash_of(178.0), hash_of(178.000_000_000_1));
    }

    #[test]
    fn test_short_hex() {
        let fp = [0xABu8; 32];
        assert_eq!(short_hex(&fp), "abababababab");
    }
}
