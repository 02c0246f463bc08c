//! Constant-time gate primitives for the in-process substrate
//!
//! Every secret operation exposed by [`crate::substrate`] bottoms out in one of
//! these functions. They are branchless and data-oblivious: the instruction
//! stream is the same whatever the operand values are.
//!
//! # Design Principles
//!
//! 1. **No conditional branches on secret data**: selection, comparison and
//!    shifting use masks and arithmetic instead of `if`.
//!
//! 2. **Fixed execution time**: `ct_select_u64` always computes the mask and
//!    XOR, even when both operands are equal.
//!
//! 3. **Choice values are 0 or 1**: every `choice` argument and every returned
//!    flag is a `u64` holding exactly 0 or 1, so flags compose by `&`, `|`, `^`.
//!
//! # Security Model
//!
//! These primitives remove timing side-channels from gate evaluation. Memory
//! obliviousness for indexed access is provided separately by the linear-scan
//! RAM in [`crate::substrate::ram`].

const SIGN_BIT_64: u64 = 1 << 63;
const SIGN_BIT_32: u32 = 1 << 31;

/// Branchless select: returns a if choice is 1, b if choice is 0
/// choice must be 0 or 1
#[inline]
pub fn ct_select_u64(choice: u64, a: u64, b: u64) -> u64 {
    // choice = 0 -> mask = 0, choice = 1 -> mask = u64::MAX
    let mask = choice.wrapping_neg();
    b ^ (mask & (a ^ b))
}

/// Branchless select for u32 words (float bit patterns).
#[inline]
pub fn ct_select_u32(choice: u64, a: u32, b: u32) -> u32 {
    let mask = choice.wrapping_neg() as u32;
    b ^ (mask & (a ^ b))
}

/// Returns 1 if a == b, 0 otherwise (constant-time)
#[inline]
pub fn ct_eq_u64(a: u64, b: u64) -> u64 {
    let diff = a ^ b;
    // If diff == 0, is_zero has high bit clear after this
    let is_zero = diff | diff.wrapping_neg();
    // High bit is 0 iff diff was 0; shift and invert
    1 ^ (is_zero >> 63)
}

/// Returns 1 if a < b, 0 otherwise (constant-time, unsigned)
#[inline]
pub fn ct_lt_u64(a: u64, b: u64) -> u64 {
    // Compute borrow bit of a - b
    let borrow = ((!a) & b) | (((!a) ^ b) & a.wrapping_sub(b));
    borrow >> 63
}

/// Returns 1 if a <= b, 0 otherwise (constant-time, unsigned)
#[inline]
pub fn ct_le_u64(a: u64, b: u64) -> u64 {
    1 ^ ct_lt_u64(b, a)
}

/// Returns 1 if a < b as two's complement `i64`, 0 otherwise.
///
/// Flipping the sign bit maps the signed order onto the unsigned order.
#[inline]
pub fn ct_lt_i64(a: u64, b: u64) -> u64 {
    ct_lt_u64(a ^ SIGN_BIT_64, b ^ SIGN_BIT_64)
}

/// Returns 1 if a <= b as two's complement `i64`, 0 otherwise.
#[inline]
pub fn ct_le_i64(a: u64, b: u64) -> u64 {
    1 ^ ct_lt_i64(b, a)
}

/// Constant-time absolute value of a two's complement `i64` bit pattern.
///
/// `i64::MIN` maps to itself, as with `wrapping_abs`.
#[inline]
pub fn ct_abs_i64(a: u64) -> u64 {
    let negative = a >> 63;
    ct_select_u64(negative, a.wrapping_neg(), a)
}

/// Constant-time logical right shift that yields 0 once `amount >= 64`.
///
/// The native `>>` masks the shift amount, so the out-of-range case is folded
/// in with a select rather than a branch.
#[inline]
pub fn ct_shr_u64(value: u64, amount: u64) -> u64 {
    let in_range = ct_lt_u64(amount, 64);
    let shifted = value >> (amount & 63);
    ct_select_u64(in_range, shifted, 0)
}

/// Maps an IEEE 754 binary32 bit pattern to a key whose unsigned order equals
/// the float order. `-0.0` and `+0.0` map to the same key.
///
/// NaN patterns are outside the contract.
#[inline]
pub fn ct_f32_order_key(bits: u32) -> u32 {
    let is_neg_zero = ct_eq_u64(bits as u64, SIGN_BIT_32 as u64);
    let bits = ct_select_u32(is_neg_zero, 0, bits);
    let negative_mask = (bits >> 31).wrapping_neg();
    bits ^ (negative_mask | SIGN_BIT_32)
}

/// Constant-time binary32 comparison: returns 1 if a < b, 0 otherwise.
#[inline]
pub fn ct_f32_lt(a: u32, b: u32) -> u64 {
    ct_lt_u64(ct_f32_order_key(a) as u64, ct_f32_order_key(b) as u64)
}

/// Constant-time binary32 comparison: returns 1 if a <= b, 0 otherwise.
#[inline]
pub fn ct_f32_le(a: u32, b: u32) -> u64 {
    ct_le_u64(ct_f32_order_key(a) as u64, ct_f32_order_key(b) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ct_select_basic() {
        assert_eq!(ct_select_u64(0, 100, 200), 200);
        assert_eq!(ct_select_u64(1, 100, 200), 100);
        assert_eq!(ct_select_u64(0, 0, u64::MAX), u64::MAX);
        assert_eq!(ct_select_u64(1, 0, u64::MAX), 0);
        assert_eq!(ct_select_u32(1, 7, 9), 7);
        assert_eq!(ct_select_u32(0, 7, 9), 9);
    }

    #[test]
    fn test_ct_eq_basic() {
        assert_eq!(ct_eq_u64(0, 0), 1);
        assert_eq!(ct_eq_u64(0, 1), 0);
        assert_eq!(ct_eq_u64(u64::MAX, u64::MAX), 1);
        assert_eq!(ct_eq_u64(u64::MAX, 0), 0);
    }

    #[test]
    fn test_ct_signed_lt_basic() {
        let neg_one = (-1i64) as u64;
        assert_eq!(ct_lt_i64(neg_one, 0), 1);
        assert_eq!(ct_lt_i64(0, neg_one), 0);
        assert_eq!(ct_lt_i64(i64::MIN as u64, i64::MAX as u64), 1);
        assert_eq!(ct_le_i64(neg_one, neg_one), 1);
        // Unsigned order disagrees here.
        assert_eq!(ct_lt_u64(neg_one, 0), 0);
    }

    #[test]
    fn test_ct_abs_basic() {
        assert_eq!(ct_abs_i64((-5i64) as u64), 5);
        assert_eq!(ct_abs_i64(5), 5);
        assert_eq!(ct_abs_i64(0), 0);
    }

    #[test]
    fn test_ct_shr_saturates() {
        assert_eq!(ct_shr_u64(0b1000, 3), 1);
        assert_eq!(ct_shr_u64(u64::MAX, 63), 1);
        assert_eq!(ct_shr_u64(u64::MAX, 64), 0);
        assert_eq!(ct_shr_u64(u64::MAX, 126), 0);
    }

    #[test]
    fn test_ct_f32_signed_zero_and_negatives() {
        let pz = 0.0f32.to_bits();
        let nz = (-0.0f32).to_bits();
        assert_eq!(ct_f32_lt(nz, pz), 0);
        assert_eq!(ct_f32_lt(pz, nz), 0);
        assert_eq!(ct_f32_le(nz, pz), 1);
        assert_eq!(ct_f32_lt((-2.0f32).to_bits(), (-1.0f32).to_bits()), 1);
        assert_eq!(ct_f32_lt((-1.0f32).to_bits(), 0.5f32.to_bits()), 1);
        assert_eq!(ct_f32_lt(0.5f32.to_bits(), (-1.0f32).to_bits()), 0);
    }

    proptest! {
        #[test]
        fn prop_ct_select(choice in 0u64..=1, a: u64, b: u64) {
            let expected = if choice == 1 { a } else { b };
            prop_assert_eq!(ct_select_u64(choice, a, b), expected);
        }

        #[test]
        fn prop_ct_lt_matches_less_than(a: u64, b: u64) {
            prop_assert_eq!(ct_lt_u64(a, b), (a < b) as u64);
        }

        #[test]
        fn prop_ct_lt_i64_matches(a: i64, b: i64) {
            prop_assert_eq!(ct_lt_i64(a as u64, b as u64), (a < b) as u64);
        }

        #[test]
        fn prop_ct_shr_matches_checked(value: u64, amount in 0u64..200) {
            let expected = value.checked_shr(amount as u32).unwrap_or(0);
            prop_assert_eq!(ct_shr_u64(value, amount), expected);
        }

        #[test]
        fn prop_ct_f32_lt_matches(a in -1.0e6f32..1.0e6, b in -1.0e6f32..1.0e6) {
            prop_assert_eq!(ct_f32_lt(a.to_bits(), b.to_bits()), (a < b) as u64);
            prop_assert_eq!(ct_f32_le(a.to_bits(), b.to_bits()), (a <= b) as u64);
        }
    }
}
