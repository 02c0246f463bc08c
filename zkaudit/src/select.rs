//! Oblivious selection helpers.
//!
//! Data-dependent choices in the audits go through [`select`]; plain `if` on
//! a secret-derived value is never used. The widening helpers build their
//! result bit by bit at public positions, so their structure is fixed.

use crate::substrate::{SecretBit, SecretFloat, SecretInt};

const FLOAT_BITS: usize = 32;

/// A secret type with a branchless two-way choice.
pub trait Select: Sized {
    fn select(flag: SecretBit, if_true: Self, if_false: Self) -> Self;
}

impl Select for SecretBit {
    #[inline]
    fn select(flag: SecretBit, if_true: Self, if_false: Self) -> Self {
        SecretBit::mux(flag, if_true, if_false)
    }
}

impl Select for SecretInt {
    #[inline]
    fn select(flag: SecretBit, if_true: Self, if_false: Self) -> Self {
        SecretInt::mux(flag, if_true, if_false)
    }
}

impl Select for SecretFloat {
    #[inline]
    fn select(flag: SecretBit, if_true: Self, if_false: Self) -> Self {
        float_select(flag, if_true, if_false)
    }
}

/// Returns `if_true` when `flag` is set, `if_false` otherwise.
#[inline]
pub fn select<T: Select>(flag: SecretBit, if_true: T, if_false: T) -> T {
    T::select(flag, if_true, if_false)
}

/// 0 or 1 widened to `width` bits: `b` at position 0, zero elsewhere.
pub fn bit_to_int(b: SecretBit, width: u32) -> SecretInt {
    let mut x = SecretInt::public(width, 0);
    x.set_bit(0, b);
    x
}

/// All-zero or all-one integer of `width` bits.
pub fn bit_to_mask(b: SecretBit, width: u32) -> SecretInt {
    let mut x = SecretInt::public(width, 0);
    for i in 0..width as usize {
        x.set_bit(i, b);
    }
    x
}

/// 0.0 or 1.0, by masking every bit of the constant 1.0 with `b`.
pub fn bit_to_float(b: SecretBit) -> SecretFloat {
    let one = SecretFloat::public(1.0);
    let mut ret = SecretFloat::public(0.0);
    for i in 0..FLOAT_BITS {
        ret.set_bit(i, one.bit(i) & b);
    }
    ret
}

/// Bitwise float select: each output bit is `(a & flag) | (b & !flag)`.
pub fn float_select(flag: SecretBit, if_true: SecretFloat, if_false: SecretFloat) -> SecretFloat {
    let not_flag = !flag;
    let mut ret = SecretFloat::public(0.0);
    for i in 0..FLOAT_BITS {
        ret.set_bit(i, (if_true.bit(i) & flag) | (if_false.bit(i) & not_flag));
    }
    ret
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::{Party, Session};

    #[test]
    fn test_bit_to_int_and_mask() {
        let mut s = Session::setup(Party::Prover);
        let t = SecretBit::public(true);
        let f = SecretBit::public(false);
        assert_eq!(bit_to_int(t, 32).reveal(&mut s), 1);
        assert_eq!(bit_to_int(f, 32).reveal(&mut s), 0);
        assert_eq!(bit_to_mask(t, 12).reveal(&mut s), -1);
        assert_eq!(bit_to_mask(f, 12).reveal(&mut s), 0);
        assert_eq!(bit_to_int(t, 12).width(), 12);
    }

    #[test]
    fn test_bit_to_float() {
        let mut s = Session::setup(Party::Prover);
        assert_eq!(bit_to_float(SecretBit::public(true)).reveal(&mut s), 1.0);
        assert_eq!(bit_to_float(SecretBit::public(false)).reveal(&mut s), 0.0);
    }

    #[test]
    fn test_select_all_types() {
        let mut s = Session::setup(Party::Prover);
        let t = SecretBit::public(true);
        let f = SecretBit::public(false);
        let a = SecretFloat::public(-2.5);
        let b = SecretFloat::public(0.125);
        assert_eq!(select(t, a, b).reveal(&mut s), -2.5);
        assert_eq!(select(f, a, b).reveal(&mut s), 0.125);
        let x = SecretInt::public(32, 7);
        let y = SecretInt::public(32, -7);
        assert_eq!(select(t, x, y).reveal(&mut s), 7);
        assert_eq!(select(f, x, y).reveal(&mut s), -7);
        assert!(select(f, f, t).reveal(&mut s));
    }
}
