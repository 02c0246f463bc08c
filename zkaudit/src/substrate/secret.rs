use super::Session;
use crate::constant_time::{
    ct_abs_i64, ct_eq_u64, ct_f32_le, ct_f32_lt, ct_le_i64, ct_lt_i64, ct_select_u32,
    ct_select_u64, ct_shr_u64,
};
use std::fmt;
use std::ops::{Add, BitAnd, BitOr, BitXor, Mul, Not, Sub};

/// Widest secret integer the substrate supports.
pub const MAX_INT_WIDTH: u32 = 64;

const FLOAT_WIDTH: usize = 32;

#[inline]
fn width_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

#[inline]
fn sign_extend(bits: u64, width: u32) -> u64 {
    let shift = 64 - width;
    (((bits << shift) as i64) >> shift) as u64
}

/// Secret boolean. Holds exactly 0 or 1.
#[derive(Clone, Copy)]
pub struct SecretBit {
    value: u64,
}

impl SecretBit {
    /// A public constant lifted into the secret domain.
    #[inline]
    pub fn public(value: bool) -> Self {
        Self {
            value: value as u64,
        }
    }

    #[inline]
    pub(crate) fn from_witness(value: bool) -> Self {
        Self::public(value)
    }

    #[inline]
    pub(crate) fn word(self) -> u64 {
        self.value
    }

    /// Returns 1 iff both bits agree.
    #[inline]
    pub fn equals(self, other: Self) -> Self {
        !(self ^ other)
    }

    /// `if_true` when `flag` is set, `if_false` otherwise.
    #[inline]
    pub fn mux(flag: Self, if_true: Self, if_false: Self) -> Self {
        Self {
            value: ct_select_u64(flag.value, if_true.value, if_false.value),
        }
    }

    pub fn reveal(self, session: &mut Session) -> bool {
        session.record_reveal();
        self.value == 1
    }
}

impl fmt::Debug for SecretBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBit(..)")
    }
}

impl BitAnd for SecretBit {
    type Output = Self;
    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self {
            value: self.value & rhs.value,
        }
    }
}

impl BitOr for SecretBit {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self {
            value: self.value | rhs.value,
        }
    }
}

impl BitXor for SecretBit {
    type Output = Self;
    #[inline]
    fn bitxor(self, rhs: Self) -> Self {
        Self {
            value: self.value ^ rhs.value,
        }
    }
}

impl Not for SecretBit {
    type Output = Self;
    #[inline]
    fn not(self) -> Self {
        Self {
            value: self.value ^ 1,
        }
    }
}

/// Secret two's complement integer of 1..=64 bits.
///
/// Arithmetic wraps modulo `2^width`. Mixing widths promotes both operands,
/// sign-extended, to the wider of the two.
#[derive(Clone, Copy)]
pub struct SecretInt {
    width: u32,
    bits: u64,
}

impl SecretInt {
    /// A public constant of `width` bits.
    pub fn public(width: u32, value: i64) -> Self {
        debug_assert!((1..=MAX_INT_WIDTH).contains(&width), "width {width}");
        let width = width.clamp(1, MAX_INT_WIDTH);
        Self {
            width,
            bits: (value as u64) & width_mask(width),
        }
    }

    #[inline]
    pub(crate) fn from_witness(width: u32, value: i64) -> Self {
        Self::public(width, value)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Raw unsigned bit pattern, for substrate-internal storage.
    #[inline]
    pub(crate) fn word(self) -> u64 {
        self.bits
    }

    #[inline]
    pub(crate) fn from_word(width: u32, bits: u64) -> Self {
        Self {
            width,
            bits: bits & width_mask(width),
        }
    }

    #[inline]
    fn signed(self) -> u64 {
        sign_extend(self.bits, self.width)
    }

    #[inline]
    fn align(self, rhs: Self) -> (u32, u64, u64) {
        (self.width.max(rhs.width), self.signed(), rhs.signed())
    }

    /// Bit at a public position; positions past the width read as 0.
    pub fn bit(&self, index: usize) -> SecretBit {
        debug_assert!(index < self.width as usize);
        SecretBit {
            value: (self.bits.checked_shr(index as u32).unwrap_or(0)) & 1,
        }
    }

    /// Overwrites the bit at a public position.
    pub fn set_bit(&mut self, index: usize, bit: SecretBit) {
        debug_assert!(index < self.width as usize);
        if index >= self.width as usize {
            return;
        }
        let clear = !(1u64 << index);
        self.bits = (self.bits & clear) | (bit.value << index);
    }

    /// Sign-extends or truncates to `width` bits.
    pub fn resize(self, width: u32) -> Self {
        let width = width.clamp(1, MAX_INT_WIDTH);
        Self::from_word(width, self.signed())
    }

    /// Left shift by a public amount.
    pub fn shl(self, amount: u32) -> Self {
        Self::from_word(self.width, self.bits.checked_shl(amount).unwrap_or(0))
    }

    /// Logical right shift by a secret amount, interpreted unsigned.
    /// Shifting by `width` or more yields 0.
    pub fn shr(self, amount: Self) -> Self {
        Self::from_word(self.width, ct_shr_u64(self.bits, amount.bits))
    }

    pub fn abs(self) -> Self {
        Self::from_word(self.width, ct_abs_i64(self.signed()))
    }

    pub fn lt(self, rhs: Self) -> SecretBit {
        let (_, a, b) = self.align(rhs);
        SecretBit {
            value: ct_lt_i64(a, b),
        }
    }

    pub fn le(self, rhs: Self) -> SecretBit {
        let (_, a, b) = self.align(rhs);
        SecretBit {
            value: ct_le_i64(a, b),
        }
    }

    pub fn gt(self, rhs: Self) -> SecretBit {
        rhs.lt(self)
    }

    pub fn ge(self, rhs: Self) -> SecretBit {
        rhs.le(self)
    }

    pub fn equals(self, rhs: Self) -> SecretBit {
        let (_, a, b) = self.align(rhs);
        SecretBit {
            value: ct_eq_u64(a, b),
        }
    }

    /// `if_true` when `flag` is set, `if_false` otherwise.
    pub fn mux(flag: SecretBit, if_true: Self, if_false: Self) -> Self {
        let (width, a, b) = if_true.align(if_false);
        Self::from_word(width, ct_select_u64(flag.value, a, b))
    }

    /// Converts the signed value to the nearest binary32.
    pub fn to_float(self) -> SecretFloat {
        SecretFloat {
            bits: ((self.signed() as i64) as f32).to_bits(),
        }
    }

    pub fn reveal(self, session: &mut Session) -> i64 {
        session.record_reveal();
        self.signed() as i64
    }
}

impl fmt::Debug for SecretInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretInt<{}>(..)", self.width)
    }
}

macro_rules! int_binop {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait for SecretInt {
            type Output = Self;
            #[inline]
            fn $method(self, rhs: Self) -> Self {
                let (width, a, b) = self.align(rhs);
                let f: fn(u64, u64) -> u64 = $op;
                Self::from_word(width, f(a, b))
            }
        }
    };
}

int_binop!(Add, add, |a, b| a.wrapping_add(b));
int_binop!(Sub, sub, |a, b| a.wrapping_sub(b));
int_binop!(Mul, mul, |a, b| a.wrapping_mul(b));
int_binop!(BitAnd, bitand, |a, b| a & b);
int_binop!(BitOr, bitor, |a, b| a | b);

/// Secret IEEE 754 binary32 value.
#[derive(Clone, Copy)]
pub struct SecretFloat {
    bits: u32,
}

impl SecretFloat {
    pub fn public(value: f32) -> Self {
        Self {
            bits: value.to_bits(),
        }
    }

    #[inline]
    pub(crate) fn from_witness(value: f32) -> Self {
        Self::public(value)
    }

    #[inline]
    fn value(self) -> f32 {
        f32::from_bits(self.bits)
    }

    /// Bit at a public position (0 = least significant mantissa bit).
    pub fn bit(&self, index: usize) -> SecretBit {
        debug_assert!(index < FLOAT_WIDTH);
        SecretBit {
            value: ((self.bits as u64).checked_shr(index as u32).unwrap_or(0)) & 1,
        }
    }

    /// Overwrites the bit at a public position.
    pub fn set_bit(&mut self, index: usize, bit: SecretBit) {
        debug_assert!(index < FLOAT_WIDTH);
        if index >= FLOAT_WIDTH {
            return;
        }
        let clear = !(1u32 << index);
        self.bits = (self.bits & clear) | ((bit.value as u32) << index);
    }

    pub fn less_than(self, rhs: Self) -> SecretBit {
        SecretBit {
            value: ct_f32_lt(self.bits, rhs.bits),
        }
    }

    pub fn less_equal(self, rhs: Self) -> SecretBit {
        SecretBit {
            value: ct_f32_le(self.bits, rhs.bits),
        }
    }

    /// `if_true` when `flag` is set, `if_false` otherwise.
    pub fn mux(flag: SecretBit, if_true: Self, if_false: Self) -> Self {
        Self {
            bits: ct_select_u32(flag.value, if_true.bits, if_false.bits),
        }
    }

    pub fn reveal(self, session: &mut Session) -> f32 {
        session.record_reveal();
        self.value()
    }
}

impl fmt::Debug for SecretFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretFloat(..)")
    }
}

macro_rules! float_binop {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait for SecretFloat {
            type Output = Self;
            #[inline]
            fn $method(self, rhs: Self) -> Self {
                Self::public(self.value() $op rhs.value())
            }
        }
    };
}

float_binop!(Add, add, +);
float_binop!(Sub, sub, -);
float_binop!(Mul, mul, *);
