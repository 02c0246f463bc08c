//! Threshold-count certification: exactly `C` scores lie above `τ`.

use crate::error::AuditError;
use crate::params::bits_for;
use crate::select::bit_to_int;
use crate::substrate::{SecretBit, SecretFloat, SecretInt};
use tracing::debug;

/// Secret bit stating that exactly `expected` of `scores` satisfy
/// `threshold < score`.
pub fn certify_threshold_count(
    scores: &[SecretFloat],
    threshold: SecretFloat,
    expected: usize,
) -> Result<SecretBit, AuditError> {
    if expected > scores.len() {
        return Err(AuditError::InvalidParams(
            "expected count exceeds number of scores",
        ));
    }
    let width = bits_for(scores.len() as u64) + 1;
    let mut above = SecretInt::public(width, 0);
    for &score in scores {
        above = above + bit_to_int(threshold.less_than(score), width);
    }
    debug!(scores = scores.len(), expected, "threshold count certified");
    Ok(above.equals(SecretInt::public(width, expected as i64)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::{Party, Session};

    #[test]
    fn test_exact_count() {
        let mut s = Session::setup(Party::Prover);
        let scores: Vec<SecretFloat> = [0.2f32, 0.9, 0.5, 0.51, -3.0]
            .iter()
            .map(|&v| s.input_float(v))
            .collect();
        let tau = SecretFloat::public(0.5);
        // 0.5 itself is not above the threshold.
        assert!(certify_threshold_count(&scores, tau, 2).expect("certify").reveal(&mut s));
        assert!(!certify_threshold_count(&scores, tau, 3).expect("certify").reveal(&mut s));
        assert!(certify_threshold_count(&scores, tau, 6).is_err());
    }

    #[test]
    fn test_empty_scores() {
        let mut s = Session::setup(Party::Prover);
        let tau = SecretFloat::public(0.0);
        assert!(certify_threshold_count(&[], tau, 0).expect("certify").reveal(&mut s));
    }
}
