//! Implements the CWRS enumeration of PVQ codewords.
//!
//! A PVQ shape is an integer vector whose absolute values sum to K pulses.
//! V(N, K) counts those vectors for N dimensions; a codeword is decoded as a
//! single uniform integer below V(N, K) and unranked position by position:
//! a zero at the current position contributes one index slot, every non-zero
//! magnitude contributes two (the sign rides in the least significant bit).
//!
//! V grows super-exponentially and is consulted many times per frame, so the
//! values are memoised. Probes that overflow saturate, which keeps the
//! ordering intact for the bit-limit searches while never materialising
//! numbers that could not be coded anyway.

use std::collections::HashMap;

use crate::math::ilog64;
use crate::range_coder::RangeDecoder;

/// Hard limit of pulses in a single band.
pub(crate) const MAX_PULSES: u32 = 128;
/// A codeword index must fit the uniform decoder's 32 bit budget.
const MAX_SHAPE_BITS: u32 = 31;

/// Memoised V(N, K) table plus the unranking routines using it.
pub(crate) struct PulseCodebook {
    /// Keyed by `(N << 32) | K`.
    cache: HashMap<u64, u64>,
}

impl PulseCodebook {
    pub(crate) fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// The number of N dimensional integer vectors with an absolute value
    /// sum of exactly K, saturating at u64::MAX.
    ///
    /// Note that V(1, K) is 2 for every K > 0: only +K and -K exist in one
    /// dimension.
    pub(crate) fn v(&mut self, n: u32, k: u32) -> u64 {
        if k == 0 {
            return 1;
        }
        if n == 0 {
            return 0;
        }
        if n == 1 {
            return 2;
        }

        let key = (u64::from(n) << 32) | u64::from(k);
        if let Some(&value) = self.cache.get(&key) {
            return value;
        }

        let value = self
            .v(n - 1, k)
            .saturating_add(self.v(n, k - 1))
            .saturating_add(self.v(n - 1, k - 1));
        self.cache.insert(key, value);

        value
    }

    /// The largest pulse count whose codebook still fits into `bits` whole
    /// bits, or 0 when even a single pulse does not fit.
    pub(crate) fn bits_to_pulses(&mut self, n: u32, bits: u32) -> u32 {
        let bits = u32::min(bits, MAX_SHAPE_BITS);

        let mut low = 0;
        let mut high = MAX_PULSES;
        while low < high {
            let mid = (low + high + 1) / 2;
            if ilog64(self.v(n, mid).saturating_sub(1)) <= bits {
                low = mid;
            } else {
                high = mid - 1;
            }
        }

        low
    }

    /// Decodes the uniform codeword index of an (N, K) shape and unranks it.
    ///
    /// `pulses` receives the signed pulse vector; its absolute values sum to
    /// exactly `k`.
    pub(crate) fn decode_pulses(&mut self, dec: &mut RangeDecoder, k: u32, pulses: &mut [i32]) {
        let n = pulses.len() as u32;
        debug_assert!(k > 0);

        let size = self.v(n, k);
        debug_assert!(ilog64(size - 1) <= MAX_SHAPE_BITS);
        let index = u64::from(dec.decode_uint(size as u32));

        self.pulses_from_index(index, k, pulses);
    }

    /// Unranks a codeword index into its pulse vector.
    ///
    /// `index` must be below V(N, K).
    pub(crate) fn pulses_from_index(&mut self, mut index: u64, k: u32, pulses: &mut [i32]) {
        let n = pulses.len() as u32;
        debug_assert!(index < self.v(n, k));

        let mut k_left = k;
        for (i, pulse) in pulses.iter_mut().enumerate() {
            let dims_left = n - i as u32 - 1;

            if k_left == 0 {
                *pulse = 0;
                continue;
            }

            let zero_slots = self.v(dims_left, k_left);
            if index < zero_slots {
                *pulse = 0;
                continue;
            }
            index -= zero_slots;

            let mut p = 1;
            loop {
                let slots = self.v(dims_left, k_left - p);
                if index < 2 * slots {
                    break;
                }
                index -= 2 * slots;
                p += 1;
            }

            let negative = index & 1 == 1;
            index >>= 1;

            *pulse = if negative { -(p as i32) } else { p as i32 };
            k_left -= p;
        }

        debug_assert_eq!(k_left, 0);
    }
}

/// Scales a pulse vector to unit L2 norm.
pub(crate) fn normalize_shape(pulses: &[i32], shape: &mut [f32]) {
    debug_assert_eq!(pulses.len(), shape.len());

    let energy: f32 = pulses.iter().map(|&p| (p * p) as f32).sum();
    debug_assert!(energy > 0.0);
    let gain = 1.0 / energy.sqrt();

    shape
        .iter_mut()
        .zip(pulses.iter())
        .for_each(|(s, &p)| *s = p as f32 * gain);
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_v_base_cases() {
        let mut cb = PulseCodebook::new();

        assert_eq!(cb.v(0, 0), 1);
        assert_eq!(cb.v(0, 3), 0);
        assert_eq!(cb.v(4, 0), 1);
        assert_eq!(cb.v(1, 1), 2);
        assert_eq!(cb.v(1, 7), 2);
        assert_eq!(cb.v(2, 1), 4);
        assert_eq!(cb.v(2, 2), 8);
        assert_eq!(cb.v(2, 3), 12);
        assert_eq!(cb.v(3, 1), 6);
        assert_eq!(cb.v(3, 2), 18);
    }

    #[test]
    fn test_v_counts_vectors() {
        // Brute force count over a small grid.
        let mut cb = PulseCodebook::new();

        for n in 1..=4_u32 {
            for k in 0..=4_u32 {
                let mut count = 0_u64;
                let side = 2 * k as i64 + 1;
                let total = (side as u64).pow(n);
                for code in 0..total {
                    let mut c = code;
                    let mut sum = 0_i64;
                    for _ in 0..n {
                        let v = (c % side as u64) as i64 - k as i64;
                        sum += v.abs();
                        c /= side as u64;
                    }
                    if sum == k as i64 {
                        count += 1;
                    }
                }
                assert_eq!(cb.v(n, k), count, "N = {}, K = {}", n, k);
            }
        }
    }

    #[test]
    fn test_unrank_sums_to_k() {
        let mut cb = PulseCodebook::new();

        for n in 1..=5_usize {
            for k in 1..=5_u32 {
                let size = cb.v(n as u32, k);
                let mut seen = HashSet::new();

                for index in 0..size {
                    let mut pulses = vec![0_i32; n];
                    cb.pulses_from_index(index, k, &mut pulses);

                    let sum: u32 = pulses.iter().map(|p| p.unsigned_abs()).sum();
                    assert_eq!(sum, k, "N = {}, K = {}, index = {}", n, k, index);
                    assert!(seen.insert(pulses), "duplicate codeword at index {}", index);
                }
            }
        }
    }

    #[test]
    fn test_unrank_large_dimensions() {
        let mut cb = PulseCodebook::new();

        // Sampled indices of larger codebooks.
        for &(n, k) in &[(24_u32, 8_u32), (96, 5), (176, 3)] {
            let size = cb.v(n, k);
            let step = u64::max(size / 64, 1);
            let mut index = 0;
            while index < size {
                let mut pulses = vec![0_i32; n as usize];
                cb.pulses_from_index(index, k, &mut pulses);
                let sum: u32 = pulses.iter().map(|p| p.unsigned_abs()).sum();
                assert_eq!(sum, k);
                index += step;
            }
        }
    }

    #[test]
    fn test_bits_to_pulses() {
        let mut cb = PulseCodebook::new();

        // No budget, no pulses.
        assert_eq!(cb.bits_to_pulses(4, 0), 0);
        // V(2, 1) = 4 needs 2 bits.
        assert_eq!(cb.bits_to_pulses(2, 1), 0);
        assert_eq!(cb.bits_to_pulses(2, 2), 1);

        for n in 1..=32_u32 {
            for bits in 0..=31_u32 {
                let k = cb.bits_to_pulses(n, bits);
                // The chosen codebook fits.
                assert!(ilog64(cb.v(n, k).saturating_sub(1)) <= bits);
                // The next one would not.
                if k < MAX_PULSES {
                    assert!(ilog64(cb.v(n, k + 1).saturating_sub(1)) > bits);
                }
            }
        }
    }

    #[test]
    fn test_normalize_shape() {
        let pulses = [3, 0, -4, 0, 0];
        let mut shape = [0.0_f32; 5];
        normalize_shape(&pulses, &mut shape);

        let norm: f32 = shape.iter().map(|s| s * s).sum();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((shape[0] - 0.6).abs() < 1e-6);
        assert!((shape[2] + 0.8).abs() < 1e-6);
    }
}
