//! Oblivious argmax over a secret float vector.

use crate::error::AuditError;
use crate::params::LABEL_BITS;
use crate::select::{bit_to_float, select};
use crate::substrate::{SecretFloat, SecretInt};

/// Index and value of the maximum of `xs`.
///
/// One linear pass with a running `(index, value)` pair and no early exit.
/// The comparison is strict, so the first occurrence of a repeated maximum
/// wins. The index is a `LABEL_BITS`-wide integer so it compares directly
/// against class labels.
pub fn argmax(xs: &[SecretFloat]) -> Result<(SecretInt, SecretFloat), AuditError> {
    let Some((&first, rest)) = xs.split_first() else {
        return Err(AuditError::EmptyInput("argmax input"));
    };

    let mut index = SecretInt::public(LABEL_BITS, 0);
    let mut current_max = first;
    for (offset, &x) in rest.iter().enumerate() {
        let candidate = SecretInt::public(LABEL_BITS, offset as i64 + 1);
        let flag = current_max.less_than(x);
        index = select(flag, candidate, index);
        // Float blend rather than a bitwise select: max*(1-t) + x*t.
        let t = bit_to_float(flag);
        let not_t = bit_to_float(!flag);
        current_max = current_max * not_t + x * t;
    }
    Ok((index, current_max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::{Party, Session};
    use proptest::prelude::*;

    fn secret_vec(values: &[f32]) -> Vec<SecretFloat> {
        values.iter().copied().map(SecretFloat::public).collect()
    }

    #[test]
    fn test_unique_maximum() {
        let mut s = Session::setup(Party::Prover);
        let (index, value) = argmax(&secret_vec(&[0.1, 0.7, 0.2])).expect("argmax");
        assert_eq!(index.reveal(&mut s), 1);
        assert_eq!(value.reveal(&mut s), 0.7);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let mut s = Session::setup(Party::Prover);
        let (index, value) = argmax(&secret_vec(&[0.2, 0.4, 0.1, 0.4])).expect("argmax");
        assert_eq!(index.reveal(&mut s), 1);
        assert_eq!(value.reveal(&mut s), 0.4);
    }

    #[test]
    fn test_maximum_at_front_and_negative_logits() {
        let mut s = Session::setup(Party::Prover);
        let (index, _) = argmax(&secret_vec(&[5.0, -1.0, 4.9])).expect("argmax");
        assert_eq!(index.reveal(&mut s), 0);
        let (index, value) = argmax(&secret_vec(&[-3.0, -0.5, -2.0])).expect("argmax");
        assert_eq!(index.reveal(&mut s), 1);
        assert_eq!(value.reveal(&mut s), -0.5);
    }

    #[test]
    fn test_single_and_empty() {
        let mut s = Session::setup(Party::Prover);
        let (index, value) = argmax(&secret_vec(&[0.3])).expect("argmax");
        assert_eq!(index.reveal(&mut s), 0);
        assert_eq!(value.reveal(&mut s), 0.3);
        assert_eq!(argmax(&[]).unwrap_err(), AuditError::EmptyInput("argmax input"));
    }

    proptest! {
        #[test]
        fn prop_matches_first_max(values in proptest::collection::vec(-100.0f32..100.0, 1..12)) {
            let mut s = Session::setup(Party::Prover);
            let (index, value) = argmax(&secret_vec(&values)).expect("argmax");
            let mut expected = 0usize;
            for (i, &v) in values.iter().enumerate() {
                if values[expected] < v {
                    expected = i;
                }
            }
            prop_assert_eq!(index.reveal(&mut s), expected as i64);
            prop_assert_eq!(value.reveal(&mut s), values[expected]);
        }
    }
}
