//! Kani harnesses for the branch-free primitives, plus proptest harnesses for
//! properties that are too large for symbolic execution.
//!
//! Run with: `cargo kani --tests`
//!
//! Float comparisons, the RAM linear scan and SHA-256 seeding are outside what
//! Kani handles in reasonable time; they are covered by the proptests below.

#[cfg(kani)]
mod kani_harnesses {
    use crate::constant_time::*;

    #[kani::proof]
    fn proof_ct_select_matches_branch() {
        let choice: bool = kani::any();
        let a: u64 = kani::any();
        let b: u64 = kani::any();
        let got = ct_select_u64(choice as u64, a, b);
        kani::assert(got == if choice { a } else { b }, "ct_select_u64 differs from if");
    }

    #[kani::proof]
    fn proof_ct_signed_lt_matches_native() {
        let a: i64 = kani::any();
        let b: i64 = kani::any();
        let got = ct_lt_i64(a as u64, b as u64);
        kani::assert(got == (a < b) as u64, "ct_lt_i64 differs from <");
        let got = ct_le_i64(a as u64, b as u64);
        kani::assert(got == (a <= b) as u64, "ct_le_i64 differs from <=");
    }

    #[kani::proof]
    fn proof_ct_unsigned_cmp_matches_native() {
        let a: u64 = kani::any();
        let b: u64 = kani::any();
        kani::assert(ct_lt_u64(a, b) == (a < b) as u64, "ct_lt_u64 differs from <");
        kani::assert(ct_eq_u64(a, b) == (a == b) as u64, "ct_eq_u64 differs from ==");
    }

    #[kani::proof]
    fn proof_ct_shr_saturates() {
        let value: u64 = kani::any();
        let amount: u64 = kani::any();
        let expected = if amount >= 64 { 0 } else { value >> amount };
        kani::assert(ct_shr_u64(value, amount) == expected, "ct_shr_u64 wrong");
    }

    #[kani::proof]
    fn proof_ct_abs() {
        let a: i64 = kani::any();
        kani::assert(
            ct_abs_i64(a as u64) == a.wrapping_abs() as u64,
            "ct_abs_i64 differs from wrapping_abs",
        );
    }
}

#[cfg(test)]
mod proptest_harnesses {
    use crate::calibration::{bin_bounds, find_bin};
    use crate::params::index_bits_for;
    use crate::sampling::{
        permutation_layout, ClassBalancedSampler, PermutationSeed, SamplerParams, NO_RANK,
    };
    use crate::substrate::{Party, SecretBit, SecretFloat, Session};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_find_bin_matches_plaintext(x in 0.0f32..1.0, num_bins in 1usize..40) {
            let mut s = Session::setup(Party::Prover);
            let index_bits = index_bits_for(num_bins);
            let got = find_bin(SecretFloat::public(x), num_bins, index_bits).reveal(&mut s);
            let expected = (0..num_bins)
                .filter(|&b| {
                    let (lo, hi) = bin_bounds(b, num_bins);
                    lo <= x && x < hi
                })
                .last()
                .unwrap_or(0);
            prop_assert_eq!(got, expected as i64);
        }

        #[test]
        fn test_layout_is_padded_permutation(
            seed in proptest::array::uniform32(0u8..),
            class in any::<bool>(),
            class_size in 0usize..300,
        ) {
            let bits = index_bits_for(class_size + 2);
            let layout = permutation_layout(&PermutationSeed::new(seed), class, class_size, bits)
                .expect("layout");
            prop_assert_eq!(layout.len(), 1usize << bits);
            prop_assert_eq!(layout[0], NO_RANK);
            let mut ranks = layout[1..=class_size].to_vec();
            ranks.sort_unstable();
            prop_assert_eq!(ranks, (0..class_size as i64).collect::<Vec<_>>());
            prop_assert!(layout[class_size + 1..].iter().all(|&v| v == NO_RANK));
        }

        #[test]
        fn test_sampler_selects_nu_from_each_class(
            attributes in proptest::collection::vec(any::<bool>(), 1..48),
            pick in any::<usize>(),
        ) {
            let ones = attributes.iter().filter(|&&a| a).count();
            let class_sizes = [attributes.len() - ones, ones];
            let nu = pick % (class_sizes[0].min(class_sizes[1]) + 1);

            let mut s = Session::setup(Party::Prover);
            let params = SamplerParams { nu, class_sizes };
            let sampler = ClassBalancedSampler::new(&mut s, params, &PermutationSeed::development())
                .expect("sampler");
            let secret: Vec<SecretBit> = attributes.iter().map(|&a| s.input_bit(a)).collect();
            let included = sampler.sample(&mut s, &secret).expect("sample");
            let mut counts = [0usize; 2];
            for (bit, &a) in included.into_iter().zip(&attributes) {
                counts[a as usize] += bit.reveal(&mut s) as usize;
            }
            prop_assert_eq!(counts, [nu, nu]);
            prop_assert!(!s.finalize());
        }
    }
}
