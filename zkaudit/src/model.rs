//! Prediction records and the seam to the model-evaluation collaborator.
//!
//! The forward pass itself lives outside this crate. Whatever computes class
//! scores implements [`ModelEvaluator`]; the audits only see the resulting
//! [`Prediction`] records.

use crate::argmax::argmax;
use crate::error::AuditError;
use crate::params::LABEL_BITS;
use crate::substrate::{SecretBit, SecretFloat, SecretInt, Session};

/// One validation sample's secret prediction. Consumed once by an auditor.
#[derive(Clone, Copy, Debug)]
pub struct Prediction {
    pub predicted: SecretInt,
    pub confidence: SecretFloat,
    pub label: SecretInt,
}

impl Prediction {
    /// Predicted class and confidence from per-class scores.
    pub fn from_scores(scores: &[SecretFloat], label: SecretInt) -> Result<Self, AuditError> {
        let (predicted, confidence) = argmax(scores)?;
        Ok(Self {
            predicted,
            confidence,
            label,
        })
    }

    /// Whether the predicted class equals the true label.
    pub fn is_correct(&self) -> SecretBit {
        self.predicted.equals(self.label)
    }
}

/// Source of per-sample class scores (probabilities) inside a session.
pub trait ModelEvaluator {
    fn num_samples(&self) -> usize;

    fn class_scores(
        &self,
        session: &mut Session,
        sample: usize,
    ) -> Result<Vec<SecretFloat>, AuditError>;
}

/// Prover-held score vectors and labels committed as witnesses. Scores must
/// lie in `[0, 1)`.
///
/// Stands in for a forward pass whose outputs the prover already holds.
#[derive(Clone, Debug, Default)]
pub struct CommittedScores {
    scores: Vec<Vec<f32>>,
    labels: Vec<i64>,
}

impl CommittedScores {
    pub fn new(scores: Vec<Vec<f32>>, labels: Vec<i64>) -> Result<Self, AuditError> {
        if scores.len() != labels.len() {
            return Err(AuditError::LengthMismatch {
                what: "labels",
                expected: scores.len(),
                got: labels.len(),
            });
        }
        if let Some(width) = scores.first().map(Vec::len) {
            if width == 0 {
                return Err(AuditError::EmptyInput("class scores"));
            }
            if let Some(row) = scores.iter().find(|row| row.len() != width) {
                return Err(AuditError::LengthMismatch {
                    what: "class scores",
                    expected: width,
                    got: row.len(),
                });
            }
        }
        if let Some(sample) = scores
            .iter()
            .position(|row| row.iter().any(|p| !(0.0..1.0).contains(p)))
        {
            return Err(AuditError::ConfidenceOutOfRange { sample });
        }
        Ok(Self { scores, labels })
    }

    /// Commits sample `i`'s scores and label and forms its prediction.
    pub fn prediction(
        &self,
        session: &mut Session,
        sample: usize,
    ) -> Result<Prediction, AuditError> {
        let scores = self.class_scores(session, sample)?;
        let label = session.input_int(LABEL_BITS, self.labels[sample]);
        Prediction::from_scores(&scores, label)
    }
}

impl ModelEvaluator for CommittedScores {
    fn num_samples(&self) -> usize {
        self.scores.len()
    }

    fn class_scores(
        &self,
        session: &mut Session,
        sample: usize,
    ) -> Result<Vec<SecretFloat>, AuditError> {
        let row = self.scores.get(sample).ok_or(AuditError::LengthMismatch {
            what: "sample index",
            expected: self.scores.len(),
            got: sample,
        })?;
        Ok(row.iter().map(|&p| session.input_float(p)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::Party;

    #[test]
    fn test_prediction_from_committed_scores() {
        let mut s = Session::setup(Party::Prover);
        let model = CommittedScores::new(vec![vec![0.1, 0.2, 0.7], vec![0.6, 0.3, 0.1]], vec![2, 1])
            .expect("model");
        let first = model.prediction(&mut s, 0).expect("prediction");
        let second = model.prediction(&mut s, 1).expect("prediction");
        assert!(first.is_correct().reveal(&mut s));
        assert!(!second.is_correct().reveal(&mut s));
        assert_eq!(second.confidence.reveal(&mut s), 0.6);
        assert_eq!(s.transcript().witness_inputs, 8);
    }

    #[test]
    fn test_ragged_scores_rejected() {
        let err = CommittedScores::new(vec![vec![0.5, 0.5], vec![1.0]], vec![0, 0]).unwrap_err();
        assert_eq!(
            err,
            AuditError::LengthMismatch {
                what: "class scores",
                expected: 2,
                got: 1
            }
        );
        assert!(CommittedScores::new(vec![vec![0.5]], vec![]).is_err());
    }

    #[test]
    fn test_certain_scores_rejected() {
        let scores = vec![vec![0.5, 0.25], vec![1.0, 0.0], vec![1.0, 0.0]];
        assert_eq!(
            CommittedScores::new(scores, vec![0, 0, 0]).unwrap_err(),
            AuditError::ConfidenceOutOfRange { sample: 1 }
        );
    }
}
