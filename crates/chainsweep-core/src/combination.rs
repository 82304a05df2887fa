//! Rank ↔ word-index conversion.
//!
//! Ranks are decomposed in a falling mixed radix: the first digit is taken
//! modulo `n`, the second modulo `n - 1`, and so on for `k` digits. The
//! digits are then sorted to give the word indices of a task.
//!
//! This is not a combinatorial-number-system unranking. Two different ranks
//! can sort to the same index list, and the list itself can repeat an index
//! (rank 0 yields `k` zeros). Already-issued task IDs depend on this exact
//! arithmetic, so it must not be changed.

use num_bigint::BigUint;
use num_traits::{One, Zero};

/// Exact binomial coefficient `n! / (k! · (n-k)!)`. Returns zero when `k > n`.
pub fn binomial(n: usize, k: usize) -> BigUint {
    if k > n {
        return BigUint::zero();
    }
    factorial(n) / (factorial(k) * factorial(n - k))
}

fn factorial(n: usize) -> BigUint {
    (2..=n).fold(BigUint::one(), |acc, i| acc * BigUint::from(i))
}

/// Falling mixed-radix codec over a vocabulary of `n` words, `k` digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixedRadix {
    n: usize,
    k: usize,
}

impl MixedRadix {
    /// `k` must not exceed `n`; the allocator checks this when loading the vocabulary.
    pub fn new(n: usize, k: usize) -> Self {
        debug_assert!(k <= n, "digit count {k} exceeds radix {n}");
        Self { n, k }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Raw digits of `rank`, least significant first, before sorting.
    ///
    /// Digit `i` lies in `[0, n - i)`. Any part of `rank` beyond the last
    /// radix is discarded.
    pub fn digits(&self, rank: &BigUint) -> Vec<usize> {
        let mut x = rank.clone();
        let mut radix = self.n;
        let mut out = Vec::with_capacity(self.k);
        for _ in 0..self.k {
            let a = BigUint::from(radix);
            let digit = (&x % &a).iter_u64_digits().next().unwrap_or(0);
            out.push(digit as usize);
            x /= a;
            radix -= 1;
        }
        out
    }

    /// Inverse of [`digits`](Self::digits) for in-range digit vectors.
    ///
    /// Returns `None` if the length is wrong or a digit exceeds its radix.
    pub fn rank(&self, digits: &[usize]) -> Option<BigUint> {
        if digits.len() != self.k {
            return None;
        }
        let mut rank = BigUint::zero();
        for (i, &d) in digits.iter().enumerate().rev() {
            let radix = self.n - i;
            if d >= radix {
                return None;
            }
            rank = rank * BigUint::from(radix) + BigUint::from(d);
        }
        Some(rank)
    }

    /// Sorted word indices for `rank`.
    pub fn combination(&self, rank: &BigUint) -> Vec<usize> {
        let mut indices = self.digits(rank);
        indices.sort_unstable();
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::ToPrimitive;

    fn big(n: u64) -> BigUint {
        BigUint::from(n)
    }

    #[test]
    fn binomial_small_values() {
        assert_eq!(binomial(5, 2), big(10));
        assert_eq!(binomial(13, 12), big(13));
        assert_eq!(binomial(12, 12), big(1));
        assert_eq!(binomial(3, 4), big(0));
    }

    #[test]
    fn binomial_bip39_twelve() {
        // C(2048, 12)
        let expected =
            BigUint::parse_bytes(b"11005261717918037175659349191168", 10).unwrap();
        assert_eq!(binomial(2048, 12), expected);
    }

    #[test]
    fn digits_follow_falling_radix() {
        let codec = MixedRadix::new(10, 3);
        // 123 = 3 + 10 * (12) ; 12 = 3 + 9 * 1 ; 1 = 1 mod 8
        assert_eq!(codec.digits(&big(123)), vec![3, 3, 1]);
        assert_eq!(codec.combination(&big(123)), vec![1, 3, 3]);
    }

    #[test]
    fn rank_zero_repeats_first_word() {
        let codec = MixedRadix::new(13, 12);
        assert_eq!(codec.combination(&big(0)), vec![0; 12]);
    }

    #[test]
    fn digits_rank_inverse_over_small_space() {
        let codec = MixedRadix::new(6, 3);
        let product = 6 * 5 * 4;
        for r in 0..product {
            let d = codec.digits(&big(r));
            for (i, digit) in d.iter().enumerate() {
                assert!(*digit < 6 - i);
            }
            assert_eq!(codec.rank(&d).unwrap(), big(r));
        }
    }

    #[test]
    fn combination_matches_documented_algorithm_for_all_ranks() {
        let (n, k) = (7usize, 3usize);
        let codec = MixedRadix::new(n, k);
        let total = binomial(n, k).to_u64().unwrap();
        for r in 0..total {
            let mut x = r as usize;
            let mut a = n;
            let mut expected = Vec::new();
            for _ in 0..k {
                expected.push(x % a);
                x /= a;
                a -= 1;
            }
            expected.sort();
            assert_eq!(codec.combination(&big(r)), expected, "rank {r}");
        }
    }

    #[test]
    fn rank_rejects_out_of_range_digits() {
        let codec = MixedRadix::new(6, 3);
        assert!(codec.rank(&[0, 5, 0]).is_none()); // second radix is 5
        assert!(codec.rank(&[0, 0]).is_none());
    }

    #[test]
    fn large_rank_uses_full_precision() {
        let codec = MixedRadix::new(2048, 12);
        let rank = binomial(2048, 12) - big(1);
        let digits = codec.digits(&rank);
        assert_eq!(codec.rank(&digits).unwrap(), rank);
        assert!(codec.combination(&rank).iter().all(|&i| i < 2048));
    }
}
