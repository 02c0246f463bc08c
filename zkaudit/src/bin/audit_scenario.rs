//! Deterministic audit scenario for transcript comparisons across runs.

use clap::Parser;
use eyre::{bail, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use zkaudit::calibration::{audit_predictions, CalibrationParams};
use zkaudit::fairness::{audit_fairness, audit_fairness_on_sample};
use zkaudit::model::{CommittedScores, ModelEvaluator, Prediction};
use zkaudit::params::FractionalBits;
use zkaudit::sampling::{ClassBalancedSampler, PermutationSeed, SamplerParams};
use zkaudit::substrate::{Party, SecretBit, SecretFloat, Session, Transcript};
use zkaudit::synthetic::{binned_predictions, dp_bit_vectors, BinSpec};
use zkaudit::threshold::certify_threshold_count;

#[derive(Parser, Debug)]
#[command(about = "Run deterministic in-memory audit scenario")]
struct Args {
    /// Optional path to write JSON summary.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Samples per fairness group.
    #[arg(long, default_value_t = 40)]
    group_size: usize,

    /// Samples per class drawn by the balanced sampler.
    #[arg(long, default_value_t = 10)]
    nu: usize,

    /// Fixed-point fractional bits.
    #[arg(long, default_value_t = 5)]
    fractional_bits: u32,
}

#[derive(Serialize)]
struct AuditSummary {
    name: &'static str,
    passed: bool,
    transcript: Transcript,
    transcript_sha256: String,
}

#[derive(Serialize)]
struct ScenarioSummary {
    seed: String,
    audits: Vec<AuditSummary>,
}

fn sha256_hex(transcript: &Transcript) -> Result<String> {
    Ok(hex::encode(Sha256::digest(serde_json::to_vec(transcript)?)))
}

fn summarize(name: &'static str, passed: bool, session: Session) -> Result<AuditSummary> {
    let transcript = session.finish()?;
    Ok(AuditSummary {
        name,
        passed,
        transcript_sha256: sha256_hex(&transcript)?,
        transcript,
    })
}

fn commit_bits(session: &mut Session, bits: &[bool]) -> Vec<SecretBit> {
    bits.iter().map(|&b| session.input_bit(b)).collect()
}

fn calibration(fractional_bits: FractionalBits) -> Result<AuditSummary> {
    let bins = [(0.25, 8, 2), (0.5, 6, 3), (0.75, 8, 6), (0.875, 8, 7)].map(
        |(confidence, samples, correct)| BinSpec {
            confidence,
            samples,
            correct,
        },
    );
    let (scores, labels) = binned_predictions(&bins, 3)?;
    let model = CommittedScores::new(scores, labels)?;

    let mut session = Session::setup(Party::Prover);
    let predictions = (0..model.num_samples())
        .map(|i| model.prediction(&mut session, i))
        .collect::<Result<Vec<Prediction>, _>>()?;
    let params = CalibrationParams {
        num_bins: 8,
        fractional_bits,
        ..CalibrationParams::default()
    };
    let passed = audit_predictions(&mut session, params, &predictions)?;
    summarize("calibration", passed, session)
}

fn fairness(group_size: usize) -> Result<AuditSummary> {
    let (outcomes, attributes) = dp_bit_vectors(2 * group_size, 0.8, 0.35, 0.5);
    let mut session = Session::setup(Party::Prover);
    let outcomes = commit_bits(&mut session, &outcomes);
    let attributes = commit_bits(&mut session, &attributes);
    let passed = audit_fairness(&mut session, &outcomes, &attributes, 0.1)?;
    summarize("fairness", passed, session)
}

fn fairness_on_sample(
    group_size: usize,
    nu: usize,
    seed: &PermutationSeed,
) -> Result<AuditSummary> {
    let (outcomes, attributes) = dp_bit_vectors(2 * group_size, 0.5, 0.5, 0.5);
    let mut session = Session::setup(Party::Prover);
    let outcomes = commit_bits(&mut session, &outcomes);
    let attributes = commit_bits(&mut session, &attributes);
    let params = SamplerParams {
        nu,
        class_sizes: [group_size, group_size],
    };
    let sampler = ClassBalancedSampler::new(&mut session, params, seed)?;
    let passed = audit_fairness_on_sample(&mut session, sampler, &outcomes, &attributes, 0.5)?;
    summarize("fairness_on_sample", passed, session)
}

fn threshold_count() -> Result<AuditSummary> {
    let mut session = Session::setup(Party::Prover);
    let scores: Vec<SecretFloat> = [0.1f32, 0.7, 0.4, 0.9, 0.55, 0.2]
        .iter()
        .map(|&v| session.input_float(v))
        .collect();
    let passed =
        certify_threshold_count(&scores, SecretFloat::public(0.5), 3)?.reveal(&mut session);
    summarize("threshold_count", passed, session)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    if args.nu > args.group_size {
        bail!("nu must not exceed group_size");
    }
    let fractional_bits = FractionalBits::new(args.fractional_bits)?;
    let seed = PermutationSeed::development();

    let summary = ScenarioSummary {
        seed: seed.to_hex(),
        audits: vec![
            calibration(fractional_bits)?,
            fairness(args.group_size)?,
            fairness_on_sample(args.group_size, args.nu, &seed)?,
            threshold_count()?,
        ],
    };

    let output = serde_json::to_string_pretty(&summary)?;
    println!("{output}");
    if let Some(path) = args.output {
        std::fs::write(path, format!("{output}\n"))?;
    }

    Ok(())
}
