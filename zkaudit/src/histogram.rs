//! Oblivious-RAM-backed histogram.
//!
//! Bins are addressed by secret indices, so which bin a sample lands in does
//! not show in the access pattern. The wrapped [`ZkRam`] enforces that every
//! read and write is followed by a refresh and that `check` runs exactly once.
//!
//! The read-modify-write in [`ObliviousHistogram::add`] is not atomic: all
//! accesses to one histogram must be issued strictly in sequence.

use crate::error::AuditError;
use crate::substrate::{RamOp, RamState, SecretInt, Session, ZkRam};
use tracing::debug;

pub struct ObliviousHistogram {
    ram: ZkRam,
    num_bins: usize,
}

impl ObliviousHistogram {
    /// Allocates `2^index_bits` cells of `value_bits` bits, `num_bins` of
    /// which are used.
    pub fn new(
        session: &mut Session,
        label: &'static str,
        num_bins: usize,
        index_bits: u32,
        value_bits: u32,
    ) -> Result<Self, AuditError> {
        if num_bins == 0 {
            return Err(AuditError::InvalidParams("histogram needs at least one bin"));
        }
        if index_bits >= usize::BITS || num_bins > (1usize << index_bits) {
            return Err(AuditError::IndexWidthTooSmall {
                index_bits,
                required_slots: num_bins,
            });
        }
        let ram = ZkRam::new(session, label, index_bits, value_bits)?;
        Ok(Self { ram, num_bins })
    }

    #[inline]
    pub fn index_bits(&self) -> u32 {
        self.ram.index_bits()
    }

    #[inline]
    pub fn value_bits(&self) -> u32 {
        self.ram.value_bits()
    }

    #[inline]
    pub fn state(&self) -> RamState {
        self.ram.state()
    }

    pub fn trace(&self) -> &[RamOp] {
        self.ram.trace()
    }

    pub fn write(
        &mut self,
        session: &mut Session,
        index: SecretInt,
        value: SecretInt,
    ) -> Result<(), AuditError> {
        self.ram.write(session, index, value)
    }

    pub fn read(
        &mut self,
        session: &mut Session,
        index: SecretInt,
    ) -> Result<SecretInt, AuditError> {
        self.ram.read(session, index)
    }

    pub fn refresh(&mut self, session: &mut Session) -> Result<(), AuditError> {
        self.ram.refresh(session)
    }

    /// Verifies the access history. Call once, after the last access.
    pub fn check(&mut self, session: &mut Session) -> Result<bool, AuditError> {
        let passed = self.ram.check(session)?;
        debug!(histogram = self.ram.label(), passed, "histogram checked");
        Ok(passed)
    }

    /// Writes zero into every used bin at public indices.
    pub fn zero_fill(&mut self, session: &mut Session) -> Result<(), AuditError> {
        let zero = SecretInt::public(self.value_bits(), 0);
        for bin in 0..self.num_bins {
            let index = SecretInt::public(self.index_bits(), bin as i64);
            self.write(session, index, zero)?;
            self.refresh(session)?;
        }
        Ok(())
    }

    /// `bins[index] += delta` as read, refresh, write, refresh.
    pub fn add(
        &mut self,
        session: &mut Session,
        index: SecretInt,
        delta: SecretInt,
    ) -> Result<(), AuditError> {
        let current = self.read(session, index)?;
        self.refresh(session)?;
        self.write(session, index, current + delta.resize(self.value_bits()))?;
        self.refresh(session)
    }

    /// Reads a bin at a public index, followed by its refresh.
    pub fn read_bin(&mut self, session: &mut Session, bin: usize) -> Result<SecretInt, AuditError> {
        let index = SecretInt::public(self.index_bits(), bin as i64);
        let value = self.read(session, index)?;
        self.refresh(session)?;
        Ok(value)
    }
}
