//! Oblivious zero-knowledge audits of classifier predictions
//!
//! This crate proves properties of secret model outputs without revealing
//! them. Every algorithm is oblivious: control flow and memory access never
//! depend on secret values.
//! - `substrate`: in-process secure-arithmetic session, secret types, oblivious RAM
//! - `constant_time`: branch-free word operations the substrate is built on
//! - `select`, `fixed_point`, `argmax`, `histogram`: oblivious building blocks
//! - `calibration`: per-bin calibration-gap audit
//! - `fairness`: demographic-parity audit
//! - `sampling`: secret class-balanced subsampling via permutation tables
//! - `threshold`: exact threshold-count certification
//! - `params`: public constants and integer-width derivation
//! - `synthetic`: plaintext datasets for tests and demos

pub mod argmax;
pub mod calibration;
pub mod constant_time;
pub mod error;
pub mod fairness;
pub mod fixed_point;
pub mod histogram;
pub mod model;
pub mod params;
pub mod sampling;
pub mod select;
pub mod substrate;
pub mod synthetic;
pub mod threshold;

pub use error::AuditError;

#[cfg(any(kani, test))]
#[path = "kani_proofs.rs"]
mod kani_proofs;
