//! Public audit parameters and secret-width derivation.
//!
//! Secret integers silently wrap at their width, so every width used by an
//! audit is derived here from the public sample bound and thresholds. A width
//! beyond what the substrate supports is a configuration error reported before
//! any secret is committed.

use crate::error::AuditError;
use crate::substrate::MAX_INT_WIDTH;

/// Default seed of the permutation shuffle.
pub const DEFAULT_PERMUTATION_SEED: u64 = 123;
/// Fractional bits used for confidences unless configured otherwise.
pub const DEFAULT_FRACTIONAL_BITS: u32 = 5;
/// Calibration gap threshold used by the benchmarks.
pub const DEFAULT_CALIBRATION_THRESHOLD: f64 = 0.15;
/// Per-class sample size ν of the class-balanced sample.
pub const DEFAULT_NU: usize = 500;
/// Width of class labels and predicted classes.
pub const LABEL_BITS: u32 = 32;
/// Width of permutation table entries (signed, holds the -1 sentinel).
pub const PERMUTATION_VALUE_BITS: u32 = 32;
/// Fixed-point scale of the demographic-parity threshold.
pub const DP_THRESHOLD_SCALE: i64 = 100_000;

/// Most fractional bits a binary32 mantissa can feed: k-1 stored bits plus
/// the implicit leading one.
pub const MAX_FRACTIONAL_BITS: u32 = 24;

/// Number of fractional bits of a fixed-point encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FractionalBits(u32);

impl FractionalBits {
    pub fn new(bits: u32) -> Result<Self, AuditError> {
        if bits == 0 || bits > MAX_FRACTIONAL_BITS {
            return Err(AuditError::InvalidParams(
                "fractional bits must be in 1..=24",
            ));
        }
        Ok(Self(bits))
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for FractionalBits {
    fn default() -> Self {
        Self(DEFAULT_FRACTIONAL_BITS)
    }
}

/// Bits needed to hold any value in `0..=n`, at least 1.
pub fn bits_for(n: u64) -> u32 {
    (64 - n.leading_zeros()).max(1)
}

/// Index bits needed to address `slots` cells, at least 1.
pub fn index_bits_for(slots: usize) -> u32 {
    if slots <= 2 {
        return 1;
    }
    bits_for(slots as u64 - 1)
}

/// Encodes a public non-negative threshold by truncation to `scale`.
pub fn encode_threshold(threshold: f64, scale: f64) -> Result<i64, AuditError> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(AuditError::InvalidParams(
            "threshold must be finite and non-negative",
        ));
    }
    let scaled = (threshold * scale).floor();
    if scaled >= i64::MAX as f64 {
        return Err(AuditError::InvalidParams("threshold too large"));
    }
    Ok(scaled as i64)
}

fn ensure_width(what: &'static str, bits: u32) -> Result<u32, AuditError> {
    if bits > MAX_INT_WIDTH {
        return Err(AuditError::WidthOverflow {
            what,
            required_bits: bits,
            max_bits: MAX_INT_WIDTH,
        });
    }
    Ok(bits)
}

/// Widths of the calibration histograms and of the final comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalibrationWidths {
    pub index_bits: u32,
    /// Holds counts (≤ N) and confidence sums (< N·2^k), plus a sign bit.
    pub cell_bits: u32,
    /// Holds `fp_theta · count · 2^k` and `|acc_fp − conf_fp| · 2^k`.
    pub compare_bits: u32,
}

impl CalibrationWidths {
    pub fn derive(
        max_samples: usize,
        num_bins: usize,
        fractional_bits: FractionalBits,
        fp_threshold: i64,
    ) -> Result<Self, AuditError> {
        if num_bins == 0 {
            return Err(AuditError::InvalidParams("num_bins must be > 0"));
        }
        let k = fractional_bits.get();
        let n = bits_for(max_samples as u64);
        let theta = bits_for(fp_threshold.max(0) as u64);
        Ok(Self {
            index_bits: index_bits_for(num_bins),
            cell_bits: ensure_width("calibration cell", n + k + 1)?,
            compare_bits: ensure_width("calibration comparison", (theta + k).max(2 * k) + n + 1)?,
        })
    }
}

/// Widths of the demographic-parity counters and the final comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FairnessWidths {
    pub counter_bits: u32,
    /// Holds `threshold · n0 · n1` and `|p0·n1 − p1·n0| · SCALE`.
    pub compare_bits: u32,
}

impl FairnessWidths {
    pub fn derive(max_samples: usize, threshold_scaled: i64) -> Result<Self, AuditError> {
        let n = bits_for(max_samples as u64);
        let factor =
            bits_for(threshold_scaled.max(0) as u64).max(bits_for(DP_THRESHOLD_SCALE as u64));
        Ok(Self {
            counter_bits: ensure_width("fairness counter", n + 1)?,
            compare_bits: ensure_width("fairness comparison", factor + 2 * n + 1)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_for() {
        assert_eq!(bits_for(0), 1);
        assert_eq!(bits_for(1), 1);
        assert_eq!(bits_for(2), 2);
        assert_eq!(bits_for(1000), 10);
        assert_eq!(bits_for(1023), 10);
        assert_eq!(bits_for(1024), 11);
    }

    #[test]
    fn test_index_bits_for() {
        assert_eq!(index_bits_for(1), 1);
        assert_eq!(index_bits_for(2), 1);
        assert_eq!(index_bits_for(3), 2);
        assert_eq!(index_bits_for(10), 4);
        assert_eq!(index_bits_for(16), 4);
        assert_eq!(index_bits_for(17), 5);
    }

    #[test]
    fn test_fractional_bits_bounds() {
        assert!(FractionalBits::new(0).is_err());
        assert!(FractionalBits::new(25).is_err());
        assert_eq!(FractionalBits::new(24).map(FractionalBits::get), Ok(24));
        assert_eq!(FractionalBits::default().get(), 5);
    }

    #[test]
    fn test_encode_threshold_truncates() {
        // 0.15 * 32 = 4.8
        assert_eq!(encode_threshold(0.15, 32.0), Ok(4));
        assert_eq!(encode_threshold(0.0, 32.0), Ok(0));
        assert!(encode_threshold(-0.1, 32.0).is_err());
        assert!(encode_threshold(f64::NAN, 32.0).is_err());
    }

    #[test]
    fn test_calibration_widths_default_sizes() {
        let w = CalibrationWidths::derive(100, 10, FractionalBits::default(), 4).expect("widths");
        assert_eq!(w.index_bits, 4);
        assert_eq!(w.cell_bits, 7 + 5 + 1);
        assert_eq!(w.compare_bits, 10 + 7 + 1);
    }

    #[test]
    fn test_fairness_widths_n1000() {
        // A fixed 32-bit comparison would overflow at N = 1000.
        // Fixed 32-bit counters would overflow at N = 1000.
        let w = FairnessWidths::derive(1000, 10_000).expect("widths");
        assert_eq!(w.compare_bits, 17 + 20 + 1);
        assert!(w.compare_bits > 32);
    }

    #[test]
    fn test_width_overflow_is_config_error() {
        let err = FairnessWidths::derive(usize::MAX, 10_000).unwrap_err();
        assert!(matches!(err, AuditError::WidthOverflow { .. }));
        let err =
            CalibrationWidths::derive(1 << 40, 10, FractionalBits::new(24).expect("k"), 1 << 24)
                .unwrap_err();
        assert!(matches!(err, AuditError::WidthOverflow { .. }));
    }
}
