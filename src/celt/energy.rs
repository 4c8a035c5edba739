//! Implements the band energy decoders.
//!
//! Band energies live in the log2 domain where one unit equals 6 dB. The
//! coarse pass predicts each band from the same band of the previous frame
//! (scaled by alpha) and from the running error of the previous bands of the
//! current frame (scaled by beta), then adds a Laplace coded delta. The fine
//! pass refines the result with uniform raw bits, and whatever whole bits
//! remain at the end of the frame buy one extra bit of resolution per band.

use std::ops::Range;

use crate::celt::mode::{ALPHA_COEF, BETA_COEF, E_PROB_MODEL, INTRA_BETA, SMALL_ENERGY_ICDF};
use crate::celt::MAX_BANDS;
use crate::range_coder::{RangeDecoder, Tell};

/// Decodes the coarse band energies with a 6 dB resolution.
///
/// `energy` carries the previous frame's energies in and the new coarse
/// energies out. Bands outside `bands` are cleared.
///
/// The delta coding degrades with the remaining budget: a Laplace model
/// while at least 15 bits are left, a small two sided model down to two
/// bits, a single sign bit down to one, and an implied -1 after that.
pub(crate) fn decode_coarse_energy(
    dec: &mut RangeDecoder,
    energy: &mut [[f32; MAX_BANDS]; 2],
    channels: usize,
    bands: Range<usize>,
    lm: usize,
    intra: bool,
    total_bits: u32,
) {
    let (alpha, beta, model) = if intra {
        (0.0, INTRA_BETA, &E_PROB_MODEL[lm][1])
    } else {
        (ALPHA_COEF[lm], BETA_COEF[lm], &E_PROB_MODEL[lm][0])
    };

    let mut prev = [0.0_f32; 2];
    (0..MAX_BANDS).into_iter().for_each(|band| {
        (0..channels).into_iter().for_each(|channel| {
            if !bands.contains(&band) {
                energy[channel][band] = 0.0;
                return;
            }

            let budget = total_bits.saturating_sub(dec.tell());
            let qi = if budget >= 15 {
                let pi = 2 * usize::min(band, 20);
                let fs = u32::from(model[pi]) << 7;
                let decay = u32::from(model[pi + 1]) << 6;
                dec.decode_laplace(fs, decay)
            } else if budget >= 2 {
                let v = dec.decode_icdf(&SMALL_ENERGY_ICDF, 2) as i32;
                (v >> 1) ^ -(v & 1)
            } else if budget >= 1 {
                -i32::from(dec.decode_bit_logp(1))
            } else {
                -1
            };

            let predicted = f32::max(energy[channel][band], -9.0) * alpha + prev[channel];
            energy[channel][band] = predicted + qi as f32;
            prev[channel] += beta * qi as f32;
        });
    });
}

/// Refines the coarse energies with `fine_bits[band]` uniform raw bits each.
pub(crate) fn decode_fine_energy(
    dec: &mut RangeDecoder,
    energy: &mut [[f32; MAX_BANDS]; 2],
    channels: usize,
    bands: Range<usize>,
    fine_bits: &[u32; MAX_BANDS],
) {
    bands.for_each(|band| {
        if fine_bits[band] == 0 {
            return;
        }
        (0..channels).into_iter().for_each(|channel| {
            let q = dec.decode_bits(fine_bits[band]);
            let offset = (q as f32 + 0.5) / (1 << fine_bits[band]) as f32 - 0.5;
            energy[channel][band] += offset;
        });
    });
}

/// Spends the bits left over after shape decoding on the least significant
/// bit of the fine energy grid, one bit per band and channel in band order.
pub(crate) fn decode_energy_remainder(
    dec: &mut RangeDecoder,
    energy: &mut [[f32; MAX_BANDS]; 2],
    channels: usize,
    bands: Range<usize>,
    fine_bits: &[u32; MAX_BANDS],
    mut bits_left: i32,
) {
    for band in bands {
        if bits_left < channels as i32 {
            break;
        }
        if fine_bits[band] >= 8 {
            continue;
        }
        (0..channels).into_iter().for_each(|channel| {
            let q = dec.decode_bits(1);
            let offset = (q as f32 - 0.5) / (1 << (fine_bits[band] + 1)) as f32;
            energy[channel][band] += offset;
            bits_left -= 1;
        });
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::range_coder::RangeEncoder;

    #[test]
    fn test_coarse_roundtrip() {
        // Encode a known delta sequence with the inter model of the 20 ms
        // frame and verify the prediction recursion.
        let lm = 3;
        let model = &E_PROB_MODEL[lm][0];
        let deltas: [i32; MAX_BANDS] = [
            2, -1, 0, 0, 1, 0, -2, 3, 0, 0, 1, -1, 0, 2, 0, 0, -1, 1, 0, 0, 1,
        ];

        let mut buffer = vec![0_u8; 256];
        let mut enc = RangeEncoder::new(&mut buffer);
        (0..MAX_BANDS).into_iter().for_each(|band| {
            let pi = 2 * usize::min(band, 20);
            let fs = u32::from(model[pi]) << 7;
            let decay = u32::from(model[pi + 1]) << 6;
            let mut value = deltas[band];
            enc.encode_laplace(&mut value, fs, decay).unwrap();
            assert_eq!(value, deltas[band]);
        });
        enc.done().unwrap();
        drop(enc);

        let mut dec = RangeDecoder::new(&buffer);
        let mut energy = [[0.0_f32; MAX_BANDS]; 2];
        decode_coarse_energy(&mut dec, &mut energy, 1, 0..MAX_BANDS, lm, false, 256 * 8);

        // Replay the prediction recursion. The previous energies are zero,
        // so the alpha term stays silent.
        let beta = BETA_COEF[lm];
        let mut prev = 0.0_f32;
        (0..MAX_BANDS).into_iter().for_each(|band| {
            let expected = prev + deltas[band] as f32;
            assert!(
                (energy[0][band] - expected).abs() < 1e-5,
                "band {}: {} != {}",
                band,
                energy[0][band],
                expected
            );
            prev += beta * deltas[band] as f32;
        });
    }

    #[test]
    fn test_coarse_without_budget() {
        // An empty packet implies a -1 delta per band without reading bits.
        let buffer = [0_u8; 0];
        let mut dec = RangeDecoder::new(&buffer);
        let before = dec.tell();

        let mut energy = [[0.0_f32; MAX_BANDS]; 2];
        decode_coarse_energy(&mut dec, &mut energy, 2, 0..MAX_BANDS, 0, true, 0);

        assert_eq!(dec.tell(), before);
        (0..2).into_iter().for_each(|channel| {
            let mut prev = 0.0_f32;
            (0..MAX_BANDS).into_iter().for_each(|band| {
                assert!((energy[channel][band] - (prev - 1.0)).abs() < 1e-5);
                prev += INTRA_BETA * -1.0;
            });
        });
    }

    #[test]
    fn test_fine_energy_roundtrip() {
        let mut fine_bits = [0_u32; MAX_BANDS];
        fine_bits[0] = 3;
        fine_bits[1] = 1;
        fine_bits[3] = 8;

        let mut buffer = vec![0_u8; 64];
        let mut enc = RangeEncoder::new(&mut buffer);
        enc.encode_bits(5, 3).unwrap();
        enc.encode_bits(1, 1).unwrap();
        enc.encode_bits(200, 8).unwrap();
        enc.done().unwrap();
        drop(enc);

        let mut dec = RangeDecoder::new(&buffer);
        let mut energy = [[0.0_f32; MAX_BANDS]; 2];
        decode_fine_energy(&mut dec, &mut energy, 1, 0..MAX_BANDS, &fine_bits);

        assert!((energy[0][0] - ((5.0 + 0.5) / 8.0 - 0.5)).abs() < 1e-6);
        assert!((energy[0][1] - ((1.0 + 0.5) / 2.0 - 0.5)).abs() < 1e-6);
        assert!((energy[0][3] - ((200.0 + 0.5) / 256.0 - 0.5)).abs() < 1e-6);
        // Untouched bands stay put.
        assert_eq!(energy[0][2], 0.0);
    }

    #[test]
    fn test_energy_remainder_budget() {
        let mut fine_bits = [0_u32; MAX_BANDS];
        fine_bits[2] = 8;

        let mut buffer = vec![0_u8; 16];
        let mut enc = RangeEncoder::new(&mut buffer);
        (0..4).into_iter().for_each(|i| {
            enc.encode_bits(i & 1, 1).unwrap();
        });
        enc.done().unwrap();
        drop(enc);

        let mut dec = RangeDecoder::new(&buffer);
        let mut energy = [[0.0_f32; MAX_BANDS]; 2];
        decode_energy_remainder(&mut dec, &mut energy, 1, 0..MAX_BANDS, &fine_bits, 4);

        // Bands 0, 1, 3 and 4 get one bit each; band 2 is already at the
        // finest grid and is skipped.
        assert!((energy[0][0] - -0.25).abs() < 1e-6);
        assert!((energy[0][1] - 0.25).abs() < 1e-6);
        assert_eq!(energy[0][2], 0.0);
        assert!((energy[0][3] - -0.25).abs() < 1e-6);
        assert!((energy[0][4] - 0.25).abs() < 1e-6);
        assert_eq!(energy[0][5], 0.0);
    }
}
