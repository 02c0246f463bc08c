//! Oblivious calibration audit.
//!
//! Per-bin statistics are tallied into three oblivious histograms:
//! - `bins`: number of samples whose confidence falls in the bin
//! - `accuracy`: number of those whose prediction was correct
//! - `confidence`: sum of their fixed-point confidences
//!
//! Verification proves, for every bin `b`,
//! `θ · count_b ≥ |correct_b − Σ conf_b|` in fixed point, which is the
//! division-free form of `|acc_b − conf_b| ≤ θ`. Empty bins pass trivially.
//!
//! The auditor is a phase machine: accumulate samples, verify once, close.

use crate::error::AuditError;
use crate::fixed_point::{float_to_fixed, int_to_fixed};
use crate::histogram::ObliviousHistogram;
use crate::model::Prediction;
use crate::params::{
    encode_threshold, CalibrationWidths, FractionalBits, DEFAULT_CALIBRATION_THRESHOLD,
};
use crate::select::{bit_to_int, select};
use crate::substrate::{SecretBit, SecretFloat, SecretInt, Session};
use tracing::{debug, info};

/// Public parameters of a calibration audit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationParams {
    /// Number of equal-width confidence bins over `[0, 1)`.
    pub num_bins: usize,
    pub fractional_bits: FractionalBits,
    /// Largest tolerated per-bin gap between accuracy and mean confidence.
    pub threshold: f64,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            num_bins: 10,
            fractional_bits: FractionalBits::default(),
            threshold: DEFAULT_CALIBRATION_THRESHOLD,
        }
    }
}

impl CalibrationParams {
    /// The threshold in fixed point, `⌊θ · 2^k⌋`.
    pub fn fp_threshold(&self) -> Result<i64, AuditError> {
        encode_threshold(self.threshold, (1u64 << self.fractional_bits.get()) as f64)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Accumulating,
    Verified,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Self::Accumulating => "accumulate",
            Self::Verified => "verified",
        }
    }
}

/// Public `[lower, upper)` boundaries of `bin` among `num_bins` equal bins.
pub fn bin_bounds(bin: usize, num_bins: usize) -> (f32, f32) {
    let b = num_bins as f32;
    (bin as f32 / b, (bin + 1) as f32 / b)
}

/// Index of the bin whose `[lower, upper)` interval contains `confidence`.
///
/// Scans all bins and selects on each match, so the last matching bin wins.
/// Equal-width bins partition `[0, 1)`, so exactly one matches for valid
/// confidences; a confidence outside `[0, 1)` lands in bin 0.
///
/// The result is `index_bits + 1` bits wide so every bin index stays
/// non-negative; resize it to `index_bits` to address a histogram.
pub fn find_bin(confidence: SecretFloat, num_bins: usize, index_bits: u32) -> SecretInt {
    let width = index_bits + 1;
    let mut current = SecretInt::public(width, 0);
    for bin in 0..num_bins {
        let (lower, upper) = bin_bounds(bin, num_bins);
        let index = SecretInt::public(width, bin as i64);
        let above_lower = SecretFloat::public(lower).less_equal(confidence);
        let below_upper = confidence.less_than(SecretFloat::public(upper));
        current = select(above_lower & below_upper, index, current);
    }
    current
}

pub struct CalibrationAuditor {
    params: CalibrationParams,
    widths: CalibrationWidths,
    fp_threshold: i64,
    max_samples: usize,
    samples: usize,
    phase: Phase,
    bins: ObliviousHistogram,
    accuracy: ObliviousHistogram,
    confidence: ObliviousHistogram,
}

impl CalibrationAuditor {
    /// Derives widths for up to `max_samples` samples, allocates the three
    /// histograms and zeroes every bin.
    pub fn new(
        session: &mut Session,
        params: CalibrationParams,
        max_samples: usize,
    ) -> Result<Self, AuditError> {
        let fp_threshold = params.fp_threshold()?;
        let widths = CalibrationWidths::derive(
            max_samples,
            params.num_bins,
            params.fractional_bits,
            fp_threshold,
        )?;
        info!(
            num_bins = params.num_bins,
            max_samples,
            fractional_bits = params.fractional_bits.get(),
            fp_threshold,
            "calibration audit started"
        );

        let mut histogram = |label: &'static str| {
            ObliviousHistogram::new(
                session,
                label,
                params.num_bins,
                widths.index_bits,
                widths.cell_bits,
            )
        };
        let bins = histogram("calibration.bins")?;
        let confidence = histogram("calibration.confidence")?;
        let accuracy = histogram("calibration.accuracy")?;

        let mut auditor = Self {
            params,
            widths,
            fp_threshold,
            max_samples,
            samples: 0,
            phase: Phase::Accumulating,
            bins,
            accuracy,
            confidence,
        };
        auditor.bins.zero_fill(session)?;
        auditor.confidence.zero_fill(session)?;
        auditor.accuracy.zero_fill(session)?;
        Ok(auditor)
    }

    #[inline]
    pub fn params(&self) -> &CalibrationParams {
        &self.params
    }

    #[inline]
    pub fn widths(&self) -> &CalibrationWidths {
        &self.widths
    }

    #[inline]
    pub fn samples(&self) -> usize {
        self.samples
    }

    fn expect_phase(&self, operation: &'static str, phase: Phase) -> Result<(), AuditError> {
        if self.phase != phase {
            return Err(AuditError::PhaseOrder {
                operation,
                phase: self.phase.name(),
            });
        }
        Ok(())
    }

    /// Adds one sample to its confidence bin.
    pub fn accumulate(
        &mut self,
        session: &mut Session,
        prediction: &Prediction,
    ) -> Result<(), AuditError> {
        self.expect_phase("accumulate", Phase::Accumulating)?;
        if self.samples >= self.max_samples {
            return Err(AuditError::InvalidParams(
                "more samples than the declared maximum",
            ));
        }

        let cell_bits = self.widths.cell_bits;
        let index_bits = self.widths.index_bits;
        let bin = find_bin(prediction.confidence, self.params.num_bins, index_bits)
            .resize(index_bits);

        self.bins.add(session, bin, SecretInt::public(cell_bits, 1))?;

        let correct = bit_to_int(prediction.is_correct(), cell_bits);
        self.accuracy.add(session, bin, correct)?;

        let confidence_fp =
            float_to_fixed(prediction.confidence, self.params.fractional_bits).resize(cell_bits);
        self.confidence.add(session, bin, confidence_fp)?;

        self.samples += 1;
        Ok(())
    }

    /// Checks the gap inequality in every bin and returns the AND of all of
    /// them as a secret pass bit.
    pub fn verify(&mut self, session: &mut Session) -> Result<SecretBit, AuditError> {
        self.expect_phase("verify", Phase::Accumulating)?;
        debug!(samples = self.samples, "calibration verify");

        let width = self.widths.compare_bits;
        let k = self.params.fractional_bits;
        let fp_theta = SecretInt::public(width, self.fp_threshold);
        let mut pass = SecretBit::public(true);
        for bin in 0..self.params.num_bins {
            let count = self.bins.read_bin(session, bin)?.resize(width);
            let count_fp = int_to_fixed(count, k);

            let correct = self.accuracy.read_bin(session, bin)?.resize(width);
            let correct_fp = int_to_fixed(correct, k);

            let confidence_fp = self.confidence.read_bin(session, bin)?.resize(width);

            // Both sides scaled to 2^(2k).
            let gap = int_to_fixed((correct_fp - confidence_fp).abs(), k);
            let pass_bin = (fp_theta * count_fp).ge(gap);
            pass = pass & pass_bin;
        }
        self.phase = Phase::Verified;
        Ok(pass)
    }

    /// Checks all three histograms. Returns whether every access history was
    /// consistent; failures also surface at session finalize.
    pub fn close(mut self, session: &mut Session) -> Result<bool, AuditError> {
        self.expect_phase("close", Phase::Verified)?;
        let bins_ok = self.bins.check(session)?;
        let confidence_ok = self.confidence.check(session)?;
        let accuracy_ok = self.accuracy.check(session)?;
        Ok(bins_ok && confidence_ok && accuracy_ok)
    }
}

/// Runs a complete calibration audit over prediction records and reveals the
/// pass bit.
pub fn audit_predictions(
    session: &mut Session,
    params: CalibrationParams,
    predictions: &[Prediction],
) -> Result<bool, AuditError> {
    let mut auditor = CalibrationAuditor::new(session, params, predictions.len())?;
    for prediction in predictions {
        auditor.accumulate(session, prediction)?;
    }
    let pass = auditor.verify(session)?;
    auditor.close(session)?;
    let passed = pass.reveal(session);
    info!(passed, samples = predictions.len(), "calibration audit finished");
    Ok(passed)
}

/// Calibration audit over parallel secret vectors with equal-width bins and
/// the default fixed-point precision.
pub fn audit_calibration(
    session: &mut Session,
    predictions: &[SecretInt],
    labels: &[SecretInt],
    confidences: &[SecretFloat],
    num_bins: usize,
    threshold: f64,
) -> Result<bool, AuditError> {
    for (what, len) in [("labels", labels.len()), ("confidences", confidences.len())] {
        if len != predictions.len() {
            return Err(AuditError::LengthMismatch {
                what,
                expected: predictions.len(),
                got: len,
            });
        }
    }
    let records: Vec<Prediction> = predictions
        .iter()
        .zip(labels)
        .zip(confidences)
        .map(|((&predicted, &label), &confidence)| Prediction {
            predicted,
            confidence,
            label,
        })
        .collect();
    let params = CalibrationParams {
        num_bins,
        threshold,
        ..CalibrationParams::default()
    };
    audit_predictions(session, params, &records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::LABEL_BITS;
    use crate::substrate::Party;

    fn record(s: &mut Session, predicted: i64, label: i64, confidence: f32) -> Prediction {
        Prediction {
            predicted: s.input_int(LABEL_BITS, predicted),
            confidence: s.input_float(confidence),
            label: s.input_int(LABEL_BITS, label),
        }
    }

    #[test]
    fn test_find_bin_boundaries() {
        let mut s = Session::setup(Party::Prover);
        let num_bins = 10;
        for bin in 0..num_bins {
            let (lower, upper) = bin_bounds(bin, num_bins);
            let interior = (lower + upper) / 2.0;
            let just_below_upper = f32::from_bits(upper.to_bits() - 1);
            for value in [lower, interior, just_below_upper] {
                let got = find_bin(SecretFloat::public(value), num_bins, 4).reveal(&mut s);
                assert_eq!(got, bin as i64, "value {value}");
            }
            if bin + 1 < num_bins {
                let got = find_bin(SecretFloat::public(upper), num_bins, 4).reveal(&mut s);
                assert_eq!(got, bin as i64 + 1, "upper bound {upper} is exclusive");
            }
        }
    }

    #[test]
    fn test_find_bin_upper_half_is_non_negative() {
        let mut s = Session::setup(Party::Prover);
        let cases = [(0.75f32, 2usize, 1i64), (0.95, 10, 9), (0.5, 2, 1), (0.99, 16, 15)];
        for (value, num_bins, expected) in cases {
            let index_bits = crate::params::index_bits_for(num_bins);
            let got = find_bin(SecretFloat::public(value), num_bins, index_bits).reveal(&mut s);
            assert_eq!(got, expected, "{value} among {num_bins} bins");
        }
    }

    #[test]
    fn test_histogram_totals_match_samples() {
        let mut s = Session::setup(Party::Prover);
        let params = CalibrationParams {
            num_bins: 4,
            ..CalibrationParams::default()
        };
        let mut auditor = CalibrationAuditor::new(&mut s, params, 9).expect("auditor");
        let data = [
            (0, 0, 0.1),
            (1, 0, 0.3),
            (1, 1, 0.55),
            (2, 2, 0.9),
            (2, 1, 0.95),
            (0, 0, 0.6),
            (1, 1, 0.26),
            (0, 1, 0.74),
            (2, 2, 0.0),
        ];
        for (p, l, c) in data {
            let r = record(&mut s, p, l, c);
            auditor.accumulate(&mut s, &r).expect("accumulate");
        }
        let mut counts = 0;
        let mut correct = 0;
        for bin in 0..4 {
            let c = auditor.bins.read_bin(&mut s, bin).expect("read");
            let a = auditor.accuracy.read_bin(&mut s, bin).expect("read");
            let (c, a) = (c.reveal(&mut s), a.reveal(&mut s));
            assert!(a <= c, "bin {bin}: {a} correct of {c}");
            counts += c;
            correct += a;
        }
        assert_eq!(counts, 9);
        assert_eq!(correct, 6);
        auditor.verify(&mut s).expect("verify");
        assert!(auditor.close(&mut s).expect("close"));
        assert!(!s.finalize());
    }

    #[test]
    fn test_phase_order_enforced() {
        let mut s = Session::setup(Party::Prover);
        let mut auditor =
            CalibrationAuditor::new(&mut s, CalibrationParams::default(), 1).expect("auditor");
        let r = record(&mut s, 0, 0, 0.5);
        auditor.accumulate(&mut s, &r).expect("accumulate");
        assert!(matches!(
            auditor.accumulate(&mut s, &r),
            Err(AuditError::InvalidParams(_))
        ));
        auditor.verify(&mut s).expect("verify");
        assert_eq!(
            auditor.accumulate(&mut s, &r).unwrap_err(),
            AuditError::PhaseOrder {
                operation: "accumulate",
                phase: "verified"
            }
        );
        assert!(auditor.verify(&mut s).is_err());
        assert!(auditor.close(&mut s).expect("close"));
        assert!(!s.finalize());
    }

    #[test]
    fn test_close_before_verify_rejected() {
        let mut s = Session::setup(Party::Prover);
        let auditor =
            CalibrationAuditor::new(&mut s, CalibrationParams::default(), 4).expect("auditor");
        assert!(matches!(
            auditor.close(&mut s),
            Err(AuditError::PhaseOrder { operation: "close", .. })
        ));
        // The histograms were dropped unchecked.
        assert!(s.finalize());
    }

    #[test]
    fn test_single_bin_gap_against_threshold() {
        // Four samples at confidence 0.75 (24/32), three correct: gap 0.
        let mut s = Session::setup(Party::Prover);
        let records: Vec<Prediction> = [(1, 1), (1, 1), (1, 1), (0, 1)]
            .iter()
            .map(|&(p, l)| record(&mut s, p, l, 0.75))
            .collect();
        let params = CalibrationParams {
            threshold: 0.0,
            ..CalibrationParams::default()
        };
        assert!(audit_predictions(&mut s, params, &records).expect("audit"));
        assert!(!s.finalize());

        // All wrong: gap 0.75 > 0.15.
        let mut s = Session::setup(Party::Prover);
        let records: Vec<Prediction> = (0..4).map(|_| record(&mut s, 0, 1, 0.75)).collect();
        assert!(!audit_predictions(&mut s, CalibrationParams::default(), &records).expect("audit"));
        assert!(!s.finalize());
    }

    #[test]
    fn test_audit_calibration_length_mismatch() {
        let mut s = Session::setup(Party::Prover);
        let preds = vec![SecretInt::public(LABEL_BITS, 0); 2];
        let labels = vec![SecretInt::public(LABEL_BITS, 0); 1];
        let confs = vec![SecretFloat::public(0.5); 2];
        let err = audit_calibration(&mut s, &preds, &labels, &confs, 10, 0.1).unwrap_err();
        assert_eq!(
            err,
            AuditError::LengthMismatch {
                what: "labels",
                expected: 2,
                got: 1
            }
        );
    }
}
