//! Session state digest.
//!
//! FNV-1a 64-bit over a fixed field order, little-endian, with float
//! canonicalization so replays on the same build compare bit-for-bit.

/// Digest algorithm identifier recorded in replay artifacts.
pub const STATE_DIGEST_ALGO_ID: &str = "ubba-digest-v2-fnv1a64-le-f64canon";

const FNV1A_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV1A_PRIME: u64 = 0x100000001b3;

#[derive(Debug, Clone)]
pub(crate) struct Fnv1a64 {
    state: u64,
}

impl Fnv1a64 {
    pub(crate) fn new() -> Self {
        Self {
            state: FNV1A_OFFSET_BASIS,
        }
    }

    pub(crate) fn update(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= u64::from(byte);
            self.state = self.state.wrapping_mul(FNV1A_PRIME);
        }
    }

    pub(crate) fn u64(&mut self, value: u64) {
        self.update(&value.to_le_bytes());
    }

    pub(crate) fn f64(&mut self, value: f64) {
        self.update(&canonicalize_f64(value).to_le_bytes());
    }

    pub(crate) fn finish(self) -> u64 {
        self.state
    }
}

/// `-0.0` hashes as `+0.0`; every NaN hashes as the quiet NaN pattern.
pub(crate) fn canonicalize_f64(value: f64) -> u64 {
    const QUIET_NAN_BITS: u64 = 0x7ff8000000000000;

    if value.is_nan() {
        QUIET_NAN_BITS
    } else if value == 0.0 {
        0u64
    } else {
        value.to_bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv_known_vector() {
        // FNV-1a 64 of "a"
        let mut h = Fnv1a64::new();
        h.update(b"a");
        assert_eq!(h.finish(), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn test_f64_canonicalization() {
        assert_eq!(canonicalize_f64(-0.0), canonicalize_f64(0.0));
        assert_eq!(canonicalize_f64(-0.0), 0u64);

        let other_nan = f64::from_bits(0x7ff0000000000001);
        assert_eq!(canonicalize_f64(f64::NAN), canonicalize_f64(other_nan));

        assert_eq!(canonicalize_f64(1.0), 1.0f64.to_bits());
        assert_eq!(canonicalize_f64(-1.0), (-1.0f64).to_bits());
    }

    #[test]
    fn test_signed_zero_hashes_equal() {
        let mut a = Fnv1a64::new();
        let mut b = Fnv1a64::new();
        a.f64(0.0);
        b.f64(-0.0);
        assert_eq!(a.finish(), b.finish());
    }
}
