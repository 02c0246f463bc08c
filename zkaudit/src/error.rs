use crate::substrate::{RamOp, RamState};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditError {
    InvalidParams(&'static str),
    /// A derived secret width exceeds what the substrate can represent.
    WidthOverflow {
        what: &'static str,
        required_bits: u32,
        max_bits: u32,
    },
    /// A RAM index width cannot address the requested number of slots.
    IndexWidthTooSmall {
        index_bits: u32,
        required_slots: usize,
    },
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    EmptyInput(&'static str),
    /// A sample's confidence lies outside `[0, 1)`.
    ConfidenceOutOfRange {
        sample: usize,
    },
    RamSequence {
        ram: &'static str,
        op: RamOp,
        state: RamState,
    },
    RamInitSize {
        ram: &'static str,
        expected: usize,
        got: usize,
    },
    PhaseOrder {
        operation: &'static str,
        phase: &'static str,
    },
    /// The substrate reported a failed integrity check at finalize.
    CheatDetected,
}

impl Display for AuditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidParams(msg) => write!(f, "invalid params: {msg}"),
            Self::WidthOverflow {
                what,
                required_bits,
                max_bits,
            } => write!(
                f,
                "{what} needs {required_bits} bits, substrate supports at most {max_bits}"
            ),
            Self::IndexWidthTooSmall {
                index_bits,
                required_slots,
            } => write!(
                f,
                "index width {index_bits} cannot address {required_slots} slots"
            ),
            Self::LengthMismatch {
                what,
                expected,
                got,
            } => write!(f, "{what}: expected length {expected}, got {got}"),
            Self::EmptyInput(what) => write!(f, "{what} must not be empty"),
            Self::ConfidenceOutOfRange { sample } => {
                write!(f, "sample {sample}: confidence must lie in [0, 1)")
            }
            Self::RamSequence { ram, op, state } => {
                write!(f, "ram '{ram}': {op:?} not allowed in state {state:?}")
            }
            Self::RamInitSize { ram, expected, got } => {
                write!(f, "ram '{ram}': init expects {expected} values, got {got}")
            }
            Self::PhaseOrder { operation, phase } => {
                write!(f, "{operation} is not allowed during the {phase} phase")
            }
            Self::CheatDetected => write!(f, "substrate integrity check failed: cheat detected"),
        }
    }
}

impl Error for AuditError {}
