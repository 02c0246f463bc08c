//! Oblivious RAM arrays with enforced access sequencing.
//!
//! `ZkRam` is the read/write variant: every `read` or `write` must be followed
//! by `refresh` before the next access, and `check` closes the array exactly
//! once. `ReadOnlyZkRam` is initialized once from public data and then only
//! read. Call sequences that break these rules are rejected with
//! [`AuditError::RamSequence`] and leave the array untouched.
//!
//! Physical access is a full linear scan with branchless selection, so the
//! touched cells never depend on the secret index. Each array also keeps a
//! public trace of operation kinds; indices and values never appear in it.

use super::{RamId, SecretInt, Session, MAX_INT_WIDTH};
use crate::constant_time::{ct_eq_u64, ct_select_u64};
use crate::error::AuditError;
use serde::Serialize;

/// Largest supported index width (16 Mi cells).
pub const MAX_INDEX_BITS: u32 = 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RamOp {
    Init,
    Read,
    Write,
    Refresh,
    Check,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RamState {
    Uninitialized,
    Ready,
    AwaitingRefresh,
    Checked,
}

#[derive(Clone, Copy)]
enum AccessKind {
    Read,
    Write,
}

#[derive(Clone, Copy)]
struct Access {
    kind: AccessKind,
    slot: u64,
    value: u64,
}

/// Storage shared by both RAM flavours.
struct CellStore {
    label: &'static str,
    index_bits: u32,
    value_bits: u32,
    cells: Vec<u64>,
    initial: Option<Vec<u64>>,
    log: Vec<Access>,
    trace: Vec<RamOp>,
}

impl CellStore {
    fn new(label: &'static str, index_bits: u32, value_bits: u32) -> Result<Self, AuditError> {
        if index_bits == 0 || index_bits > MAX_INDEX_BITS {
            return Err(AuditError::WidthOverflow {
                what: "ram index",
                required_bits: index_bits,
                max_bits: MAX_INDEX_BITS,
            });
        }
        if value_bits == 0 || value_bits > MAX_INT_WIDTH {
            return Err(AuditError::WidthOverflow {
                what: "ram value",
                required_bits: value_bits,
                max_bits: MAX_INT_WIDTH,
            });
        }
        Ok(Self {
            label,
            index_bits,
            value_bits,
            cells: vec![0u64; 1usize << index_bits],
            initial: None,
            log: Vec::new(),
            trace: Vec::new(),
        })
    }

    #[inline]
    fn slot_of(&self, index: SecretInt) -> u64 {
        index.word() & ((1u64 << self.index_bits) - 1)
    }

    /// Reads one cell by scanning all of them.
    fn scan_read(&self, slot: u64) -> u64 {
        let mut acc = 0u64;
        for (j, &cell) in self.cells.iter().enumerate() {
            let hit = ct_eq_u64(j as u64, slot);
            acc = ct_select_u64(hit, cell, acc);
        }
        acc
    }

    /// Writes one cell by rewriting all of them.
    fn scan_write(&mut self, slot: u64, value: u64) {
        for (j, cell) in self.cells.iter_mut().enumerate() {
            let hit = ct_eq_u64(j as u64, slot);
            *cell = ct_select_u64(hit, value, *cell);
        }
    }

    fn read(&mut self, index: SecretInt) -> SecretInt {
        let slot = self.slot_of(index);
        let value = self.scan_read(slot);
        self.log.push(Access {
            kind: AccessKind::Read,
            slot,
            value,
        });
        self.trace.push(RamOp::Read);
        SecretInt::from_word(self.value_bits, value)
    }

    fn write(&mut self, index: SecretInt, value: SecretInt) {
        let slot = self.slot_of(index);
        let value = value.resize(self.value_bits).word();
        self.scan_write(slot, value);
        self.log.push(Access {
            kind: AccessKind::Write,
            slot,
            value,
        });
        self.trace.push(RamOp::Write);
    }

    /// Replays the access history: each read must return the latest value
    /// written (or initialized) at its slot. Reads of cells that were never
    /// written fail.
    fn replay(&self) -> bool {
        let mut shadow: Vec<Option<u64>> = match &self.initial {
            Some(initial) => initial.iter().copied().map(Some).collect(),
            None => vec![None; self.cells.len()],
        };
        for access in &self.log {
            let slot = access.slot as usize;
            match access.kind {
                AccessKind::Write => shadow[slot] = Some(access.value),
                AccessKind::Read => {
                    if shadow[slot] != Some(access.value) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// Read/write oblivious RAM of `2^index_bits` cells of `value_bits` bits.
pub struct ZkRam {
    id: RamId,
    store: CellStore,
    state: RamState,
}

impl ZkRam {
    pub fn new(
        session: &mut Session,
        label: &'static str,
        index_bits: u32,
        value_bits: u32,
    ) -> Result<Self, AuditError> {
        let store = CellStore::new(label, index_bits, value_bits)?;
        let id = session.register_ram(label);
        Ok(Self {
            id,
            store,
            state: RamState::Ready,
        })
    }

    #[inline]
    pub fn state(&self) -> RamState {
        self.state
    }

    #[inline]
    pub fn label(&self) -> &'static str {
        self.store.label
    }

    #[inline]
    pub fn index_bits(&self) -> u32 {
        self.store.index_bits
    }

    #[inline]
    pub fn value_bits(&self) -> u32 {
        self.store.value_bits
    }

    /// Public operation trace (kinds only).
    pub fn trace(&self) -> &[RamOp] {
        &self.store.trace
    }

    fn guard(&self, op: RamOp, allowed: &[RamState]) -> Result<(), AuditError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(AuditError::RamSequence {
                ram: self.store.label,
                op,
                state: self.state,
            })
        }
    }

    pub fn write(
        &mut self,
        session: &mut Session,
        index: SecretInt,
        value: SecretInt,
    ) -> Result<(), AuditError> {
        self.guard(RamOp::Write, &[RamState::Ready])?;
        self.store.write(index, value);
        session.record_ram_op(RamOp::Write);
        self.state = RamState::AwaitingRefresh;
        Ok(())
    }

    pub fn read(
        &mut self,
        session: &mut Session,
        index: SecretInt,
    ) -> Result<SecretInt, AuditError> {
        self.guard(RamOp::Read, &[RamState::Ready])?;
        let value = self.store.read(index);
        session.record_ram_op(RamOp::Read);
        self.state = RamState::AwaitingRefresh;
        Ok(value)
    }

    /// Advances the access-consistency state. Required after every read and
    /// every write.
    pub fn refresh(&mut self, session: &mut Session) -> Result<(), AuditError> {
        self.guard(RamOp::Refresh, &[RamState::Ready, RamState::AwaitingRefresh])?;
        self.store.trace.push(RamOp::Refresh);
        session.record_ram_op(RamOp::Refresh);
        self.state = RamState::Ready;
        Ok(())
    }

    /// Verifies the whole access history and closes the array. Returns
    /// whether the history was consistent; the outcome is also recorded in
    /// the session and surfaces at finalize.
    pub fn check(&mut self, session: &mut Session) -> Result<bool, AuditError> {
        self.guard(RamOp::Check, &[RamState::Ready])?;
        let passed = self.store.replay();
        self.store.trace.push(RamOp::Check);
        session.record_check(self.id, passed);
        self.state = RamState::Checked;
        Ok(passed)
    }

    /// Overwrites a cell without logging it, as a dishonest prover would.
    #[cfg(test)]
    pub(crate) fn corrupt_cell(&mut self, slot: usize, value: u64) {
        self.store.cells[slot] = value;
    }
}

/// Oblivious RAM initialized once from public data and read-only afterwards.
pub struct ReadOnlyZkRam {
    id: RamId,
    store: CellStore,
    state: RamState,
}

impl ReadOnlyZkRam {
    pub fn new(
        session: &mut Session,
        label: &'static str,
        index_bits: u32,
        value_bits: u32,
    ) -> Result<Self, AuditError> {
        let store = CellStore::new(label, index_bits, value_bits)?;
        let id = session.register_ram(label);
        Ok(Self {
            id,
            store,
            state: RamState::Uninitialized,
        })
    }

    #[inline]
    pub fn state(&self) -> RamState {
        self.state
    }

    #[inline]
    pub fn index_bits(&self) -> u32 {
        self.store.index_bits
    }

    #[inline]
    pub fn value_bits(&self) -> u32 {
        self.store.value_bits
    }

    pub fn trace(&self) -> &[RamOp] {
        &self.store.trace
    }

    fn guard(&self, op: RamOp, expected: RamState) -> Result<(), AuditError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(AuditError::RamSequence {
                ram: self.store.label,
                op,
                state: self.state,
            })
        }
    }

    /// Loads all `2^index_bits` cells.
    pub fn init(&mut self, session: &mut Session, data: &[SecretInt]) -> Result<(), AuditError> {
        self.guard(RamOp::Init, RamState::Uninitialized)?;
        if data.len() != self.store.cells.len() {
            return Err(AuditError::RamInitSize {
                ram: self.store.label,
                expected: self.store.cells.len(),
                got: data.len(),
            });
        }
        let value_bits = self.store.value_bits;
        for (cell, value) in self.store.cells.iter_mut().zip(data) {
            *cell = value.resize(value_bits).word();
        }
        self.store.initial = Some(self.store.cells.clone());
        self.store.trace.push(RamOp::Init);
        session.record_ram_op(RamOp::Init);
        self.state = RamState::Ready;
        Ok(())
    }

    pub fn read(
        &mut self,
        session: &mut Session,
        index: SecretInt,
    ) -> Result<SecretInt, AuditError> {
        self.guard(RamOp::Read, RamState::Ready)?;
        let value = self.store.read(index);
        session.record_ram_op(RamOp::Read);
        Ok(value)
    }

    pub fn check(&mut self, session: &mut Session) -> Result<bool, AuditError> {
        self.guard(RamOp::Check, RamState::Ready)?;
        let passed = self.store.replay();
        self.store.trace.push(RamOp::Check);
        session.record_check(self.id, passed);
        self.state = RamState::Checked;
        Ok(passed)
    }
}
