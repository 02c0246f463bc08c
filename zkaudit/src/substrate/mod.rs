//! In-process secure-arithmetic substrate.
//!
//! The audits only ever talk to the substrate through this module:
//! - `Session`: explicit proof-session handle (setup / finalize with cheat detection)
//! - `SecretBit`, `SecretInt`, `SecretFloat`: opaque secret values
//! - `ZkRam`, `ReadOnlyZkRam`: oblivious RAM with enforced access sequencing
//!
//! Both protocol roles are evaluated in one process. Secret values carry their
//! plaintext internally but expose it only through `reveal`, and every gate is
//! evaluated with the branchless primitives in [`crate::constant_time`].

pub mod ram;
mod secret;

pub use ram::{RamOp, RamState, ReadOnlyZkRam, ZkRam};
pub use secret::{SecretBit, SecretFloat, SecretInt, MAX_INT_WIDTH};

use crate::error::AuditError;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Protocol role of the local process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Prover,
    Verifier,
}

/// Public record of protocol activity. Two sessions over different secret
/// data of the same public shape produce identical transcripts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Transcript {
    pub witness_inputs: u64,
    pub ram_inits: u64,
    pub ram_reads: u64,
    pub ram_writes: u64,
    pub ram_refreshes: u64,
    pub ram_checks: u64,
    pub reveals: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RamId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CheckStatus {
    Pending,
    Passed,
    Failed,
}

struct RamRecord {
    label: &'static str,
    status: CheckStatus,
}

/// Explicit handle for one proof session.
///
/// Every core operation that touches protocol state takes `&mut Session`.
/// A session must end in [`Session::finalize`] (or [`Session::finish`]);
/// partial sessions are not resumable.
pub struct Session {
    party: Party,
    transcript: Transcript,
    rams: Vec<RamRecord>,
}

impl Session {
    pub fn setup(party: Party) -> Self {
        debug!(?party, "proof session setup");
        Self {
            party,
            transcript: Transcript::default(),
            rams: Vec::new(),
        }
    }

    #[inline]
    pub fn party(&self) -> Party {
        self.party
    }

    #[inline]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Commits a prover-held bit.
    pub fn input_bit(&mut self, value: bool) -> SecretBit {
        self.transcript.witness_inputs += 1;
        SecretBit::from_witness(value)
    }

    /// Commits a prover-held two's complement integer of `width` bits.
    pub fn input_int(&mut self, width: u32, value: i64) -> SecretInt {
        self.transcript.witness_inputs += 1;
        SecretInt::from_witness(width, value)
    }

    /// Commits a prover-held binary32 float.
    pub fn input_float(&mut self, value: f32) -> SecretFloat {
        self.transcript.witness_inputs += 1;
        SecretFloat::from_witness(value)
    }

    /// Closes the session and reports whether cheating was detected.
    ///
    /// Any RAM array that failed its integrity check, or that was never
    /// checked, invalidates the proof.
    pub fn finalize(self) -> bool {
        let mut cheat = false;
        for record in &self.rams {
            match record.status {
                CheckStatus::Passed => {}
                CheckStatus::Pending => {
                    warn!(ram = record.label, "ram array was never checked");
                    cheat = true;
                }
                CheckStatus::Failed => {
                    warn!(ram = record.label, "ram integrity check failed");
                    cheat = true;
                }
            }
        }
        info!(
            party = ?self.party,
            cheat_detected = cheat,
            rams = self.rams.len(),
            reveals = self.transcript.reveals,
            "proof session finalized"
        );
        cheat
    }

    /// Finalizes and turns a detected cheat into a fatal error.
    pub fn finish(self) -> Result<Transcript, AuditError> {
        let transcript = self.transcript.clone();
        if self.finalize() {
            return Err(AuditError::CheatDetected);
        }
        Ok(transcript)
    }

    pub(crate) fn register_ram(&mut self, label: &'static str) -> RamId {
        self.rams.push(RamRecord {
            label,
            status: CheckStatus::Pending,
        });
        RamId(self.rams.len() - 1)
    }

    pub(crate) fn record_check(&mut self, id: RamId, passed: bool) {
        self.transcript.ram_checks += 1;
        if let Some(record) = self.rams.get_mut(id.0) {
            record.status = if passed {
                CheckStatus::Passed
            } else {
                CheckStatus::Failed
            };
        }
    }

    pub(crate) fn record_ram_op(&mut self, op: RamOp) {
        match op {
            RamOp::Init => self.transcript.ram_inits += 1,
            RamOp::Read => self.transcript.ram_reads += 1,
            RamOp::Write => self.transcript.ram_writes += 1,
            RamOp::Refresh => self.transcript.ram_refreshes += 1,
            RamOp::Check => {}
        }
    }

    pub(crate) fn record_reveal(&mut self) {
        self.transcript.reveals += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalize_without_rams_is_clean() {
        let mut session = Session::setup(Party::Prover);
        let a = session.input_int(32, 3);
        let b = session.input_int(32, 2);
        assert_eq!((a - b).reveal(&mut session), 1);
        assert_eq!(session.transcript().witness_inputs, 2);
        assert_eq!(session.transcript().reveals, 1);
        assert!(!session.finalize());
    }

    #[test]
    fn test_unchecked_ram_is_cheat() {
        let mut session = Session::setup(Party::Prover);
        let _ram = ZkRam::new(&mut session, "unchecked", 2, 8).expect("ram");
        assert!(session.finalize());
    }

    #[test]
    fn test_finish_maps_cheat_to_error() {
        let mut session = Session::setup(Party::Verifier);
        let _ram = ZkRam::new(&mut session, "unchecked", 2, 8).expect("ram");
        assert_eq!(session.finish(), Err(AuditError::CheatDetected));
    }
}
