//! Oblivious class-balanced sampling.
//!
//! For each of the two classes a public random permutation of `[0, N_c)` is
//! loaded into a read-only RAM with slot 0 holding the sentinel `-1`. A linear
//! scan hands the j-th member of the class the table entry at slot j and every
//! other sample slot 0, so each sample receives either its class-relative
//! random rank or `-1`. Samples ranked below `ν` form the subsample.
//!
//! The class sizes `N_c` are public parameters. If a class turns out to have
//! more members than declared, the surplus reads the padding and is never
//! selected; if it has fewer, the shortfall is not corrected.

use crate::error::AuditError;
use crate::params::{bits_for, index_bits_for, DEFAULT_PERMUTATION_SEED, PERMUTATION_VALUE_BITS};
use crate::select::{bit_to_int, bit_to_mask, select};
use crate::substrate::{ReadOnlyZkRam, SecretBit, SecretInt, Session};
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

const SEED_LABEL_PERMUTATION: &[u8] = b"zkaudit_class_permutation";

/// Sentinel rank of samples outside a table's class.
pub const NO_RANK: i64 = -1;

/// 32-byte master seed of the permutation tables.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PermutationSeed([u8; 32]);

impl PermutationSeed {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Fixed seed for reproducible runs. Not for production audits: anyone
    /// can recompute the tables.
    pub fn development() -> Self {
        let mut seed = [0u8; 32];
        seed[..8].copy_from_slice(&DEFAULT_PERMUTATION_SEED.to_le_bytes());
        Self(seed)
    }

    pub fn random() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self(seed)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses 64 hex characters, with or without a `0x` prefix.
    pub fn from_hex(text: &str) -> Result<Self, AuditError> {
        let bytes = hex::decode(text.trim_start_matches("0x"))
            .map_err(|_| AuditError::InvalidParams("seed is not valid hex"))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AuditError::InvalidParams("seed must be exactly 32 bytes"))?;
        Ok(Self(seed))
    }

    /// Independent ChaCha20 stream for one class's table.
    pub fn class_rng(&self, class: bool) -> ChaCha20Rng {
        let mut hasher = Sha256::new();
        hasher.update(self.0);
        hasher.update(SEED_LABEL_PERMUTATION);
        hasher.update((class as u64).to_le_bytes());
        let hash = hasher.finalize();
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&hash[0..32]);
        ChaCha20Rng::from_seed(seed)
    }
}

impl std::fmt::Debug for PermutationSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PermutationSeed(..)")
    }
}

/// Public sampling parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplerParams {
    /// Samples drawn per class.
    pub nu: usize,
    /// Declared member count of class 0 and class 1.
    pub class_sizes: [usize; 2],
}

impl SamplerParams {
    pub fn validate(&self) -> Result<(), AuditError> {
        let limit = i32::MAX as usize;
        if self.nu > limit || self.class_sizes.iter().any(|&n| n > limit) {
            return Err(AuditError::InvalidParams(
                "nu and class sizes must fit the permutation value width",
            ));
        }
        Ok(())
    }
}

/// Plaintext table contents for one class: a seeded shuffle of
/// `[0, class_size)` with its first entry moved to slot `class_size`, the
/// sentinel at slot 0 and sentinel padding up to `2^index_bits` slots.
pub fn permutation_layout(
    seed: &PermutationSeed,
    class: bool,
    class_size: usize,
    index_bits: u32,
) -> Result<Vec<i64>, AuditError> {
    if index_bits >= usize::BITS || class_size + 1 >= (1usize << index_bits) {
        return Err(AuditError::IndexWidthTooSmall {
            index_bits,
            required_slots: class_size + 2,
        });
    }
    let mut xs: Vec<i64> = (0..class_size as i64).collect();
    xs.shuffle(&mut seed.class_rng(class));

    xs.push(NO_RANK);
    if class_size > 0 {
        xs.swap(0, class_size);
    }
    xs.resize(1usize << index_bits, NO_RANK);
    Ok(xs)
}

/// Read-only permutation table of one class.
pub struct PermutationTable {
    class: bool,
    class_size: usize,
    ram: ReadOnlyZkRam,
}

impl PermutationTable {
    #[inline]
    pub fn class(&self) -> bool {
        self.class
    }

    #[inline]
    pub fn class_size(&self) -> usize {
        self.class_size
    }

    #[inline]
    pub fn index_bits(&self) -> u32 {
        self.ram.index_bits()
    }

    #[inline]
    pub fn slots(&self) -> usize {
        1usize << self.ram.index_bits()
    }

    pub fn check(&mut self, session: &mut Session) -> Result<bool, AuditError> {
        let passed = self.ram.check(session)?;
        debug!(
            class = self.class,
            class_size = self.class_size,
            passed,
            "permutation table checked"
        );
        Ok(passed)
    }
}

/// Builds and loads the permutation table of `class`.
///
/// `index_bits` must leave room for the sentinel slot and one padding slot:
/// `class_size + 1 < 2^index_bits`.
pub fn init_pi_in(
    session: &mut Session,
    seed: &PermutationSeed,
    class: bool,
    class_size: usize,
    index_bits: u32,
) -> Result<PermutationTable, AuditError> {
    let layout = permutation_layout(seed, class, class_size, index_bits)?;
    let label = if class {
        "sampler.permutation.class1"
    } else {
        "sampler.permutation.class0"
    };
    let mut ram = ReadOnlyZkRam::new(session, label, index_bits, PERMUTATION_VALUE_BITS)?;
    let data: Vec<SecretInt> = layout
        .iter()
        .map(|&v| SecretInt::public(PERMUTATION_VALUE_BITS, v))
        .collect();
    ram.init(session, &data)?;
    Ok(PermutationTable {
        class,
        class_size,
        ram,
    })
}

/// Per-sample class-relative rank, or [`NO_RANK`] for samples outside the
/// table's class.
pub fn class_specific_rank_permutation(
    session: &mut Session,
    table: &mut PermutationTable,
    attributes: &[SecretBit],
) -> Result<Vec<SecretInt>, AuditError> {
    let index_bits = table.index_bits();
    // Holds both N + 1 and the last slot as non-negative values.
    let width = (bits_for(attributes.len() as u64 + 1) + 1).max(index_bits + 1);
    let last_slot = SecretInt::public(width, table.slots() as i64 - 1);
    let target = SecretBit::public(table.class());

    let mut rank_counter = SecretInt::public(width, 1);
    let mut ranks = Vec::with_capacity(attributes.len());
    for &attribute in attributes {
        let in_class = target.equals(attribute);
        // Surplus members read the last slot, which is always padding.
        let slot = select(rank_counter.le(last_slot), rank_counter, last_slot);
        let index = (bit_to_mask(in_class, width) & slot).resize(index_bits);
        ranks.push(table.ram.read(session, index)?);
        rank_counter = rank_counter + bit_to_int(in_class, width);
    }
    Ok(ranks)
}

fn in_sample(rank: SecretInt, nu: SecretInt, no_rank: SecretInt) -> SecretBit {
    rank.lt(nu) & rank.gt(no_rank)
}

/// Inclusion bits `-1 < rank < ν` for one class.
pub fn class_specific_sample(ranks: &[SecretInt], nu: usize) -> Vec<SecretBit> {
    let nu = SecretInt::public(PERMUTATION_VALUE_BITS, nu as i64);
    let no_rank = SecretInt::public(PERMUTATION_VALUE_BITS, NO_RANK);
    ranks.iter().map(|&r| in_sample(r, nu, no_rank)).collect()
}

/// Union of both classes' inclusion bits.
pub fn class_balanced_sample(
    ranks0: &[SecretInt],
    ranks1: &[SecretInt],
    nu: usize,
) -> Result<Vec<SecretBit>, AuditError> {
    if ranks0.len() != ranks1.len() {
        return Err(AuditError::LengthMismatch {
            what: "class 1 ranks",
            expected: ranks0.len(),
            got: ranks1.len(),
        });
    }
    let picked0 = class_specific_sample(ranks0, nu);
    let picked1 = class_specific_sample(ranks1, nu);
    Ok(picked0
        .into_iter()
        .zip(picked1)
        .map(|(a, b)| a | b)
        .collect())
}

/// Both permutation tables plus the sampling parameters. Consumed by
/// [`sample`](Self::sample), which also checks the tables.
pub struct ClassBalancedSampler {
    params: SamplerParams,
    tables: [PermutationTable; 2],
}

impl ClassBalancedSampler {
    pub fn new(
        session: &mut Session,
        params: SamplerParams,
        seed: &PermutationSeed,
    ) -> Result<Self, AuditError> {
        params.validate()?;
        let [n0, n1] = params.class_sizes;
        info!(nu = params.nu, n0, n1, "building permutation tables");
        let class0 = init_pi_in(session, seed, false, n0, index_bits_for(n0 + 2))?;
        let class1 = init_pi_in(session, seed, true, n1, index_bits_for(n1 + 2))?;
        Ok(Self {
            params,
            tables: [class0, class1],
        })
    }

    /// Secret inclusion vector over `attributes`.
    pub fn sample(
        mut self,
        session: &mut Session,
        attributes: &[SecretBit],
    ) -> Result<Vec<SecretBit>, AuditError> {
        let [table0, table1] = &mut self.tables;
        let ranks0 = class_specific_rank_permutation(session, table0, attributes)?;
        let ranks1 = class_specific_rank_permutation(session, table1, attributes)?;
        let included = class_balanced_sample(&ranks0, &ranks1, self.params.nu)?;
        table0.check(session)?;
        table1.check(session)?;
        debug!(samples = attributes.len(), "class-balanced sample drawn");
        Ok(included)
    }
}
