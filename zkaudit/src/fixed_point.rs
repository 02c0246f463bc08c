//! Secret float ↔ fixed-point conversion.
//!
//! `float_to_fixed` works on the binary32 layout directly: it copies exponent
//! and mantissa bits at fixed public positions, prepends the implicit leading
//! one and shifts by a secret amount. The input must lie in `[0, 1)`; outside
//! that range the result is numerically wrong but nothing fails, so callers
//! constrain inputs upstream.

use crate::params::FractionalBits;
use crate::substrate::{SecretBit, SecretFloat, SecretInt};

/// Width of the integers produced by the bit-level extraction.
pub const FIXED_POINT_BITS: u32 = 32;

const MANTISSA_BITS: usize = 23;
const EXPONENT_BITS: usize = 8;
/// Biased exponent of values in `[0.5, 1)`.
const HALF_EXPONENT: i64 = 126;

/// Biased exponent field of `x` as an unsigned integer.
pub fn float_exponent(x: SecretFloat) -> SecretInt {
    let mut exp = SecretInt::public(FIXED_POINT_BITS, 0);
    for i in 0..EXPONENT_BITS {
        exp.set_bit(i, x.bit(i + MANTISSA_BITS));
    }
    exp
}

/// The top `first_n` mantissa bits of `x` with the implicit one above them.
pub fn mantissa_with_leading_one(x: SecretFloat, first_n: usize) -> SecretInt {
    debug_assert!(first_n <= MANTISSA_BITS);
    let mut ret = SecretInt::public(FIXED_POINT_BITS, 0);
    for i in 0..first_n {
        ret.set_bit(i, x.bit(i + MANTISSA_BITS - first_n));
    }
    ret.set_bit(first_n, SecretBit::public(true));
    ret
}

/// `⌊x · 2^k⌋` for `x ∈ [0, 1)`. Truncates, never rounds.
pub fn float_to_fixed(x: SecretFloat, fractional_bits: FractionalBits) -> SecretInt {
    let k = fractional_bits.get() as usize;
    let aligned = mantissa_with_leading_one(x, k - 1);
    let shift = SecretInt::public(FIXED_POINT_BITS, HALF_EXPONENT) - float_exponent(x);
    aligned.shr(shift)
}

/// `x · 2^k`, exact while the product fits the width of `x`.
pub fn int_to_fixed(x: SecretInt, fractional_bits: FractionalBits) -> SecretInt {
    x.shl(fractional_bits.get())
}

/// Secret inverse of [`float_to_fixed`], exact up to binary32 precision.
pub fn fixed_to_float(x: SecretInt, fractional_bits: FractionalBits) -> SecretFloat {
    let scale = SecretFloat::public(decode_fixed(1, fractional_bits) as f32);
    x.to_float() * scale
}

/// Public encoding `⌊value · 2^k⌋`.
pub fn encode_fixed(value: f64, fractional_bits: FractionalBits) -> i64 {
    (value * (1u64 << fractional_bits.get()) as f64).floor() as i64
}

/// Public decoding of a revealed fixed-point integer.
pub fn decode_fixed(raw: i64, fractional_bits: FractionalBits) -> f64 {
    raw as f64 / (1u64 << fractional_bits.get()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::{Party, Session};
    use proptest::prelude::*;

    fn k(bits: u32) -> FractionalBits {
        FractionalBits::new(bits).expect("valid fractional bits")
    }

    #[test]
    fn test_exponent_and_mantissa_fields() {
        let mut s = Session::setup(Party::Prover);
        let x = SecretFloat::public(0.75);
        assert_eq!(float_exponent(x).reveal(&mut s), 126);
        // 0.75 = 1.1b * 2^-1: top 4 mantissa bits 1000, leading one at bit 4.
        assert_eq!(mantissa_with_leading_one(x, 4).reveal(&mut s), 0b11000);
    }

    #[test]
    fn test_float_to_fixed_known_values() {
        let mut s = Session::setup(Party::Prover);
        let cases = [(0.75f32, 24), (0.5, 16), (0.15, 4), (0.999, 31), (0.03, 0)];
        for (value, expected) in cases {
            let got = float_to_fixed(SecretFloat::public(value), k(5)).reveal(&mut s);
            assert_eq!(got, expected, "value {value}");
        }
    }

    #[test]
    fn test_zero_maps_to_zero() {
        let mut s = Session::setup(Party::Prover);
        assert_eq!(float_to_fixed(SecretFloat::public(0.0), k(8)).reveal(&mut s), 0);
        assert_eq!(float_to_fixed(SecretFloat::public(0.0), k(1)).reveal(&mut s), 0);
    }

    #[test]
    fn test_int_to_fixed_and_back() {
        let mut s = Session::setup(Party::Prover);
        let count = SecretInt::public(32, 7);
        let fp = int_to_fixed(count, k(5));
        assert_eq!(fp.reveal(&mut s), 7 * 32);
        assert_eq!(fixed_to_float(fp, k(5)).reveal(&mut s), 7.0);
    }

    #[test]
    fn test_public_codec() {
        assert_eq!(encode_fixed(0.15, k(5)), 4);
        assert_eq!(decode_fixed(24, k(5)), 0.75);
    }

    proptest! {
        #[test]
        fn prop_float_to_fixed_truncates(x in 0.0f32..1.0, bits in 1u32..=24) {
            let mut s = Session::setup(Party::Prover);
            let fb = k(bits);
            let raw = float_to_fixed(SecretFloat::public(x), fb).reveal(&mut s);
            prop_assert_eq!(raw, encode_fixed(x as f64, fb));
            let fixed = SecretInt::public(FIXED_POINT_BITS, raw);
            let back = fixed_to_float(fixed, fb).reveal(&mut s) as f64;
            let err = x as f64 - back;
            prop_assert!(err >= 0.0, "rounded up: x={} back={}", x, back);
            prop_assert!(err < 1.0 / (1u64 << bits) as f64, "error too large: {}", err);
        }
    }
}
