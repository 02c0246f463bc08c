use clap::{Args, Parser, Subcommand};
use eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use zkaudit::calibration::{CalibrationAuditor, CalibrationParams};
use zkaudit::fairness::{audit_fairness_on_sample, FairnessAuditor};
use zkaudit::model::{CommittedScores, ModelEvaluator};
use zkaudit::params::{FractionalBits, DEFAULT_CALIBRATION_THRESHOLD, DEFAULT_NU};
use zkaudit::sampling::{ClassBalancedSampler, PermutationSeed, SamplerParams};
use zkaudit::substrate::{Party, SecretBit, SecretFloat, Session, Transcript};
use zkaudit::synthetic::{generate, Dataset};
use zkaudit::threshold::certify_threshold_count;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    data: DataArgs,

    /// Optional path to write the JSON summary
    #[arg(long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DataArgs {
    /// JSON dataset (scores, labels, outcomes, attributes); synthetic if omitted
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    /// Number of synthetic samples
    #[arg(long, global = true, default_value_t = 1000)]
    samples: usize,

    /// Number of classes of the synthetic model
    #[arg(long, global = true, default_value_t = 4)]
    classes: usize,

    /// Seed of the synthetic dataset
    #[arg(long, global = true, default_value_t = 42)]
    data_seed: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Per-bin calibration-gap audit
    Calibration {
        #[arg(long, default_value_t = 10)]
        bins: usize,

        #[arg(long, default_value_t = DEFAULT_CALIBRATION_THRESHOLD)]
        threshold: f64,

        #[arg(long, default_value_t = 5)]
        fractional_bits: u32,
    },
    /// Demographic-parity audit over all samples
    Fairness {
        #[arg(long, default_value_t = 0.1)]
        threshold: f64,
    },
    /// Demographic-parity audit over a secret class-balanced subsample
    Sample {
        #[arg(long, default_value_t = 0.1)]
        threshold: f64,

        /// Samples drawn per class
        #[arg(long, default_value_t = DEFAULT_NU)]
        nu: usize,

        /// Permutation seed (32 bytes hex); random if omitted
        #[arg(long, env = "ZK_AUDIT_SEED")]
        seed: Option<String>,

        /// Use the fixed development seed instead of a random one
        #[arg(long, default_value_t = false, conflicts_with = "seed")]
        development_seed: bool,
    },
    /// Certify that exactly `count` confidences exceed `threshold`
    ThresholdCount {
        #[arg(long)]
        threshold: f32,

        #[arg(long)]
        count: usize,
    },
}

#[derive(Serialize)]
struct Summary {
    audit: &'static str,
    party: Party,
    samples: usize,
    passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<String>,
    transcript: Transcript,
}

fn parse_or_generate_seed(seed: Option<&str>, development: bool) -> Result<PermutationSeed> {
    if development {
        return Ok(PermutationSeed::development());
    }
    match seed {
        Some(hex_seed) => Ok(PermutationSeed::from_hex(hex_seed)?),
        None => Ok(PermutationSeed::random()),
    }
}

fn load_dataset(args: &DataArgs) -> Result<Dataset> {
    let data = match &args.input {
        Some(path) => {
            info!(?path, "loading dataset");
            serde_json::from_str(&std::fs::read_to_string(path)?)?
        }
        None => generate(args.data_seed, args.samples, args.classes)?,
    };
    data.validate()?;
    Ok(data)
}

fn progress(len: usize, msg: &'static str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )?
            .progress_chars("#>-"),
    );
    pb.set_message(msg);
    Ok(pb)
}

fn commit_bits(session: &mut Session, bits: &[bool]) -> Vec<SecretBit> {
    bits.iter().map(|&b| session.input_bit(b)).collect()
}

fn run_calibration(
    session: &mut Session,
    data: Dataset,
    params: CalibrationParams,
) -> Result<bool> {
    let model = CommittedScores::new(data.scores, data.labels)?;
    let mut auditor = CalibrationAuditor::new(session, params, model.num_samples())?;
    let pb = progress(model.num_samples(), "accumulating")?;
    for i in 0..model.num_samples() {
        let prediction = model.prediction(session, i)?;
        auditor.accumulate(session, &prediction)?;
        pb.inc(1);
    }
    pb.finish_with_message("verifying");
    info!(
        samples = auditor.samples(),
        num_bins = auditor.params().num_bins,
        cell_bits = auditor.widths().cell_bits,
        compare_bits = auditor.widths().compare_bits,
        "calibration histograms filled"
    );
    let pass = auditor.verify(session)?;
    auditor.close(session)?;
    Ok(pass.reveal(session))
}

fn run_fairness(session: &mut Session, data: &Dataset, threshold: f64) -> Result<bool> {
    let mut auditor = FairnessAuditor::new(threshold, data.len())?;
    let pb = progress(data.len(), "accumulating")?;
    for (&outcome, &attribute) in data.outcomes.iter().zip(&data.attributes) {
        let outcome = session.input_bit(outcome);
        let attribute = session.input_bit(attribute);
        auditor.accumulate(outcome, attribute)?;
        pb.inc(1);
    }
    pb.finish_with_message("verifying");
    info!(
        samples = auditor.samples(),
        counter_bits = auditor.widths().counter_bits,
        compare_bits = auditor.widths().compare_bits,
        "fairness counters filled"
    );
    Ok(auditor.verify()?.reveal(session))
}

fn run_threshold_count(
    session: &mut Session,
    data: &Dataset,
    threshold: f32,
    count: usize,
) -> Result<bool> {
    // Each sample's top score.
    let scores: Vec<SecretFloat> = data
        .scores
        .iter()
        .map(|row| session.input_float(row.iter().cloned().fold(f32::MIN, f32::max)))
        .collect();
    Ok(certify_threshold_count(&scores, SecretFloat::public(threshold), count)?.reveal(session))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let data = load_dataset(&cli.data)?;
    let samples = data.len();
    info!(samples, "dataset ready");

    let mut session = Session::setup(Party::Prover);
    let mut seed_hex = None;
    let (audit, passed) = match cli.command {
        Command::Calibration {
            bins,
            threshold,
            fractional_bits,
        } => {
            let params = CalibrationParams {
                num_bins: bins,
                fractional_bits: FractionalBits::new(fractional_bits)?,
                threshold,
            };
            ("calibration", run_calibration(&mut session, data, params)?)
        }
        Command::Fairness { threshold } => {
            ("fairness", run_fairness(&mut session, &data, threshold)?)
        }
        Command::Sample {
            threshold,
            nu,
            seed,
            development_seed,
        } => {
            let seed = parse_or_generate_seed(seed.as_deref(), development_seed)?;
            seed_hex = Some(seed.to_hex());
            let params = SamplerParams {
                nu,
                class_sizes: data.class_sizes(),
            };
            let outcomes = commit_bits(&mut session, &data.outcomes);
            let attributes = commit_bits(&mut session, &data.attributes);
            let sampler = ClassBalancedSampler::new(&mut session, params, &seed)?;
            let passed =
                audit_fairness_on_sample(&mut session, sampler, &outcomes, &attributes, threshold)?;
            ("sample", passed)
        }
        Command::ThresholdCount { threshold, count } => (
            "threshold-count",
            run_threshold_count(&mut session, &data, threshold, count)?,
        ),
    };

    let party = session.party();
    // Cheat detection aborts here; a failed audit does not.
    let transcript = session.finish()?;
    let summary = Summary {
        audit,
        party,
        samples,
        passed,
        seed: seed_hex,
        transcript,
    };

    let output = serde_json::to_string_pretty(&summary)?;
    println!("{output}");
    if let Some(path) = cli.output {
        std::fs::write(path, format!("{output}\n"))?;
    }

    Ok(())
}
