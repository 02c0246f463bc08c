//! Plaintext datasets for tests, scenarios and the CLI.
//!
//! Everything here is prover-side data before commitment; nothing in this
//! module touches a [`Session`](crate::substrate::Session).

use crate::error::AuditError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Per-sample model scores, labels, binary outcomes and sensitive attributes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub scores: Vec<Vec<f32>>,
    pub labels: Vec<i64>,
    pub outcomes: Vec<bool>,
    pub attributes: Vec<bool>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Every column must have one entry per sample and every score must lie
    /// in `[0, 1)`, the domain of the confidence bins and of the fixed-point
    /// conversion. A softmax top score of exactly 1.0 is rejected.
    pub fn validate(&self) -> Result<(), AuditError> {
        let n = self.labels.len();
        for (what, len) in [
            ("scores", self.scores.len()),
            ("outcomes", self.outcomes.len()),
            ("attributes", self.attributes.len()),
        ] {
            if len != n {
                return Err(AuditError::LengthMismatch {
                    what,
                    expected: n,
                    got: len,
                });
            }
        }
        for (sample, row) in self.scores.iter().enumerate() {
            if row.iter().any(|p| !(0.0..1.0).contains(p)) {
                return Err(AuditError::ConfidenceOutOfRange { sample });
            }
        }
        Ok(())
    }

    /// Members of class 0 and class 1 by sensitive attribute.
    pub fn class_sizes(&self) -> [usize; 2] {
        let ones = self.attributes.iter().filter(|&&a| a).count();
        [self.attributes.len() - ones, ones]
    }
}

/// Outcome and attribute vectors with controlled positive rates.
///
/// The first `⌊n·split⌋` samples have attribute 0, of which the first
/// `⌊n0·a0_pos⌋` are positive; the rest have attribute 1 with the first
/// `⌊n1·a1_pos⌋` positive. Returns `(outcomes, attributes)`.
pub fn dp_bit_vectors(n: usize, a0_pos: f64, a1_pos: f64, split: f64) -> (Vec<bool>, Vec<bool>) {
    let n0 = (n as f64 * split) as usize;
    let n1 = n - n0.min(n);
    let n0_pos = (n0 as f64 * a0_pos) as usize;
    let n1_pos = (n1 as f64 * a1_pos) as usize;

    let mut outcomes = Vec::with_capacity(n);
    let mut attributes = Vec::with_capacity(n);
    for i in 0..n {
        if i < n0 {
            attributes.push(false);
            outcomes.push(i < n0_pos);
        } else {
            attributes.push(true);
            outcomes.push(i - n0 < n1_pos);
        }
    }
    (outcomes, attributes)
}

/// Contents of one confidence bin for [`binned_predictions`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BinSpec {
    /// Confidence of every sample in the bin.
    pub confidence: f32,
    pub samples: usize,
    /// How many of `samples` are predicted correctly.
    pub correct: usize,
}

/// Class scores whose argmax is `predicted` with value `confidence`.
pub fn scores_for(predicted: usize, confidence: f32, num_classes: usize) -> Vec<f32> {
    let spread = (1.0 - confidence) / (num_classes.max(2) - 1) as f32;
    let other = if spread < confidence {
        spread
    } else {
        confidence / 2.0
    };
    (0..num_classes)
        .map(|c| if c == predicted { confidence } else { other })
        .collect()
}

/// Scores and labels realising the per-bin accuracy given by `bins`.
/// Predicted classes cycle through `0..num_classes`; wrong samples get the
/// next class as label.
pub fn binned_predictions(
    bins: &[BinSpec],
    num_classes: usize,
) -> Result<(Vec<Vec<f32>>, Vec<i64>), AuditError> {
    if num_classes < 2 {
        return Err(AuditError::InvalidParams("need at least two classes"));
    }
    if bins.iter().any(|b| b.correct > b.samples) {
        return Err(AuditError::InvalidParams("bin has more correct than samples"));
    }
    let mut scores = Vec::new();
    let mut labels = Vec::new();
    for bin in bins {
        for i in 0..bin.samples {
            let predicted = scores.len() % num_classes;
            let label = if i < bin.correct {
                predicted
            } else {
                (predicted + 1) % num_classes
            };
            scores.push(scores_for(predicted, bin.confidence, num_classes));
            labels.push(label as i64);
        }
    }
    Ok((scores, labels))
}

/// Seeded random dataset from a roughly calibrated model: each sample's
/// confidence is uniform in `[1/K, 1)` and it is correct with that
/// probability. Attribute 1 has a slightly lower positive rate.
pub fn generate(seed: u64, samples: usize, num_classes: usize) -> Result<Dataset, AuditError> {
    if num_classes < 2 {
        return Err(AuditError::InvalidParams("need at least two classes"));
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let floor = 1.0 / num_classes as f32;

    let mut data = Dataset::default();
    for _ in 0..samples {
        let confidence: f32 = rng.gen_range(floor..1.0);
        let predicted = rng.gen_range(0..num_classes);
        let label = if rng.gen_bool(confidence as f64) {
            predicted
        } else {
            (predicted + rng.gen_range(1..num_classes)) % num_classes
        };
        let attribute = rng.gen_bool(0.5);
        let positive_rate = if attribute { 0.45 } else { 0.5 };

        data.scores.push(scores_for(predicted, confidence, num_classes));
        data.labels.push(label as i64);
        data.attributes.push(attribute);
        data.outcomes.push(rng.gen_bool(positive_rate));
    }
    Ok(data)
}
