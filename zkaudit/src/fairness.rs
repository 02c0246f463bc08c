//! Demographic-parity audit over secret outcome and attribute bits.
//!
//! Four secret counters track group sizes and positive outcomes per group.
//! The final check is the cross-multiplied form of
//! `|pos0/n0 − pos1/n1| ≤ θ`:
//!
//! `⌊θ·SCALE⌋ · n0 · n1 ≥ |pos0·n1 − pos1·n0| · SCALE`
//!
//! If either group is empty both sides are zero and the audit passes.

use crate::error::AuditError;
use crate::params::{encode_threshold, FairnessWidths, DP_THRESHOLD_SCALE};
use crate::sampling::ClassBalancedSampler;
use crate::select::bit_to_int;
use crate::substrate::{SecretBit, SecretInt, Session};
use tracing::{debug, info};

pub struct FairnessAuditor {
    widths: FairnessWidths,
    threshold_scaled: i64,
    max_samples: usize,
    samples: usize,
    verified: bool,
    count_attr0: SecretInt,
    count_attr1: SecretInt,
    count_attr0_pos: SecretInt,
    count_attr1_pos: SecretInt,
}

impl FairnessAuditor {
    pub fn new(threshold: f64, max_samples: usize) -> Result<Self, AuditError> {
        let threshold_scaled = encode_threshold(threshold, DP_THRESHOLD_SCALE as f64)?;
        let widths = FairnessWidths::derive(max_samples, threshold_scaled)?;
        let zero = SecretInt::public(widths.counter_bits, 0);
        info!(max_samples, threshold_scaled, "fairness audit started");
        Ok(Self {
            widths,
            threshold_scaled,
            max_samples,
            samples: 0,
            verified: false,
            count_attr0: zero,
            count_attr1: zero,
            count_attr0_pos: zero,
            count_attr1_pos: zero,
        })
    }

    #[inline]
    pub fn widths(&self) -> &FairnessWidths {
        &self.widths
    }

    #[inline]
    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn accumulate(
        &mut self,
        outcome: SecretBit,
        attribute: SecretBit,
    ) -> Result<(), AuditError> {
        self.accumulate_masked(outcome, attribute, SecretBit::public(true))
    }

    /// Like [`accumulate`](Self::accumulate) but the sample only counts when
    /// `included` is set.
    pub fn accumulate_masked(
        &mut self,
        outcome: SecretBit,
        attribute: SecretBit,
        included: SecretBit,
    ) -> Result<(), AuditError> {
        if self.verified {
            return Err(AuditError::PhaseOrder {
                operation: "accumulate",
                phase: "verified",
            });
        }
        if self.samples >= self.max_samples {
            return Err(AuditError::InvalidParams(
                "more samples than the declared maximum",
            ));
        }

        let width = self.widths.counter_bits;
        let attr0 = !attribute & included;
        let attr1 = attribute & included;
        let attr0_pos = attr0 & outcome;
        let attr1_pos = attr1 & outcome;

        self.count_attr0 = self.count_attr0 + bit_to_int(attr0, width);
        self.count_attr1 = self.count_attr1 + bit_to_int(attr1, width);
        self.count_attr0_pos = self.count_attr0_pos + bit_to_int(attr0_pos, width);
        self.count_attr1_pos = self.count_attr1_pos + bit_to_int(attr1_pos, width);
        self.samples += 1;
        Ok(())
    }

    /// Secret pass bit of the parity inequality. Callable once.
    pub fn verify(&mut self) -> Result<SecretBit, AuditError> {
        if self.verified {
            return Err(AuditError::PhaseOrder {
                operation: "verify",
                phase: "verified",
            });
        }
        debug!(samples = self.samples, "fairness verify");
        let width = self.widths.compare_bits;
        let n0 = self.count_attr0.resize(width);
        let n1 = self.count_attr1.resize(width);
        let pos0 = self.count_attr0_pos.resize(width);
        let pos1 = self.count_attr1_pos.resize(width);

        let threshold = SecretInt::public(width, self.threshold_scaled);
        let scale = SecretInt::public(width, DP_THRESHOLD_SCALE);
        let gap = (pos0 * n1 - pos1 * n0).abs() * scale;
        self.verified = true;
        Ok((threshold * n0 * n1).ge(gap))
    }
}

fn check_lengths(
    outcomes: &[SecretBit],
    attributes: &[SecretBit],
) -> Result<(), AuditError> {
    if outcomes.len() != attributes.len() {
        return Err(AuditError::LengthMismatch {
            what: "attributes",
            expected: outcomes.len(),
            got: attributes.len(),
        });
    }
    Ok(())
}

/// Demographic-parity audit over all samples; reveals the pass bit.
pub fn audit_fairness(
    session: &mut Session,
    outcomes: &[SecretBit],
    attributes: &[SecretBit],
    threshold: f64,
) -> Result<bool, AuditError> {
    check_lengths(outcomes, attributes)?;
    let mut auditor = FairnessAuditor::new(threshold, outcomes.len())?;
    for (&outcome, &attribute) in outcomes.iter().zip(attributes) {
        auditor.accumulate(outcome, attribute)?;
    }
    let passed = auditor.verify()?.reveal(session);
    info!(passed, samples = outcomes.len(), "fairness audit finished");
    Ok(passed)
}

/// Draws a secret class-balanced subsample with `sampler`, then audits
/// demographic parity over the selected samples only.
pub fn audit_fairness_on_sample(
    session: &mut Session,
    sampler: ClassBalancedSampler,
    outcomes: &[SecretBit],
    attributes: &[SecretBit],
    threshold: f64,
) -> Result<bool, AuditError> {
    check_lengths(outcomes, attributes)?;
    let included = sampler.sample(session, attributes)?;
    let mut auditor = FairnessAuditor::new(threshold, outcomes.len())?;
    for ((&outcome, &attribute), &keep) in outcomes.iter().zip(attributes).zip(&included) {
        auditor.accumulate_masked(outcome, attribute, keep)?;
    }
    let passed = auditor.verify()?.reveal(session);
    info!(passed, samples = outcomes.len(), "fairness audit on subsample finished");
    Ok(passed)
}
