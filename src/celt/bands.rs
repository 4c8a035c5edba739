//! Implements the band shape pipeline.
//!
//! Every band is reconstructed as a unit norm shape vector: decoded through
//! the PVQ codebook when it got pulses, folded from a lower band when it got
//! none, or filled with pseudo-random noise when no fold source exists.
//! Stereo bands additionally run through the mid-side rotation or intensity
//! duplication before the shapes are scaled by the decoded band energies.

use crate::celt::alloc::Allocation;
use crate::celt::cwrs::{normalize_shape, PulseCodebook};
use crate::celt::mode::{band_width, EBANDS};
use crate::celt::MAX_BANDS;
use crate::math::{bitexact_cos, bitexact_log2tan, fast_exp2, frac_mul16};
use crate::range_coder::{RangeDecoder, Tell};

/// Multiplier of the folding LCG.
const LCG_MUL: u32 = 1_664_525;
/// Increment of the folding LCG.
const LCG_ADD: u32 = 1_013_904_223;

/// Advances the folding RNG and returns the new state.
#[inline(always)]
pub(crate) fn lcg_next(seed: &mut u32) -> u32 {
    *seed = seed.wrapping_mul(LCG_MUL).wrapping_add(LCG_ADD);
    *seed
}

/// How a band shape came to be, deciding its collapse bit.
enum ShapeSource {
    /// At least one pulse was decoded.
    Pulses,
    /// Folded from a lower coded band.
    Folded,
    /// No pulses and no fold source; noise filled.
    Noise,
}

/// Scales a band back to unit norm. All-zero bands stay put.
fn renormalize_band(x: &mut [f32]) {
    let energy: f32 = x.iter().map(|v| v * v).sum();
    if energy > 1e-15 {
        let gain = 1.0 / energy.sqrt();
        x.iter_mut().for_each(|v| *v *= gain);
    }
}

/// Reconstructs the unit norm shape of one band and channel.
///
/// `spectrum` is the channel's spectrum decoded so far; lower bands serve
/// as folding sources. `out` has the band's width.
#[allow(clippy::too_many_arguments)]
fn band_shape(
    dec: &mut RangeDecoder,
    codebook: &mut PulseCodebook,
    bits_whole: i32,
    band: usize,
    lm: usize,
    spectrum: &[f32],
    has_pulses: &[bool; MAX_BANDS],
    seed: &mut u32,
    out: &mut [f32],
) -> ShapeSource {
    let n = out.len();

    let k = if bits_whole > 0 {
        codebook.bits_to_pulses(n as u32, bits_whole as u32)
    } else {
        0
    };

    if k > 0 {
        let mut pulses = vec![0_i32; n];
        codebook.decode_pulses(dec, k, &mut pulses);
        normalize_shape(&pulses, out);
        return ShapeSource::Pulses;
    }

    // No pulses: fold from the nearest lower coded band that is at least as
    // wide, with a pseudo-random sign per coefficient.
    let source = (0..band)
        .rev()
        .find(|&b| has_pulses[b] && band_width(b) >= band_width(band));

    match source {
        Some(src) => {
            let src_start = EBANDS[src] << lm;
            let src_n = band_width(src) << lm;
            (0..n).into_iter().for_each(|i| {
                let sign = if lcg_next(seed) & 0x8000_0000 != 0 {
                    -1.0
                } else {
                    1.0
                };
                out[i] = sign * spectrum[src_start + i % src_n];
            });
            renormalize_band(out);
            ShapeSource::Folded
        }
        None => {
            let gain = 1.0 / (n as f32).sqrt();
            (0..n).into_iter().for_each(|i| {
                let sign = if lcg_next(seed) & 0x8000_0000 != 0 {
                    -1.0
                } else {
                    1.0
                };
                out[i] = sign * gain;
            });
            ShapeSource::Noise
        }
    }
}

/// Decodes the shapes of all coded bands.
///
/// Returns one bitmask per channel with a set bit for every band that
/// received pulses or was folded from a coded source.
#[allow(clippy::too_many_arguments)]
pub(crate) fn decode_bands(
    dec: &mut RangeDecoder,
    codebook: &mut PulseCodebook,
    channels: usize,
    end: usize,
    lm: usize,
    alloc: &Allocation,
    shapes: &mut [Vec<f32>],
    seed: &mut u32,
    total_bits: u32,
) -> [u32; 2] {
    let mut collapse = [0_u32; 2];
    let mut has_pulses = [[false; MAX_BANDS]; 2];
    let total8 = (total_bits << 3) as i32;

    for band in 0..end {
        let n = band_width(band) << lm;
        let start = EBANDS[band] << lm;
        let bits8 = if band < alloc.coded_bands {
            alloc.shape_bits8[band]
        } else {
            0
        };

        if channels == 1 {
            let mut out = vec![0.0_f32; n];
            let source = band_shape(
                dec,
                codebook,
                bits8 >> 3,
                band,
                lm,
                &shapes[0],
                &has_pulses[0],
                seed,
                &mut out,
            );
            shapes[0][start..start + n].copy_from_slice(&out);
            mark(&mut collapse, &mut has_pulses, 0, band, &source);
            continue;
        }

        if band >= alloc.intensity {
            // Intensity stereo: one shape, per-channel energy, optional
            // inversion of the second channel.
            let mut out = vec![0.0_f32; n];
            let source = band_shape(
                dec,
                codebook,
                bits8 >> 3,
                band,
                lm,
                &shapes[0],
                &has_pulses[0],
                seed,
                &mut out,
            );

            let invert =
                total8 - (dec.tell_frac() as i32) >= 2 << 3 && dec.decode_bit_logp(2);

            (0..n).into_iter().for_each(|i| {
                shapes[0][start + i] = out[i];
                shapes[1][start + i] = if invert { -out[i] } else { out[i] };
            });
            mark(&mut collapse, &mut has_pulses, 0, band, &source);
            mark(&mut collapse, &mut has_pulses, 1, band, &source);
        } else if alloc.dual_stereo {
            // Dual stereo: both channels coded independently on half the
            // band's budget.
            for channel in 0..2 {
                let mut out = vec![0.0_f32; n];
                let source = band_shape(
                    dec,
                    codebook,
                    (bits8 / 2) >> 3,
                    band,
                    lm,
                    &shapes[channel],
                    &has_pulses[channel],
                    seed,
                    &mut out,
                );
                shapes[channel][start..start + n].copy_from_slice(&out);
                mark(&mut collapse, &mut has_pulses, channel, band, &source);
            }
        } else if n == 1 {
            // A one-bin stereo band degenerates under the rotation; it
            // carries one sign per channel instead.
            for channel in 0..2 {
                let value = if total8 - (dec.tell_frac() as i32) >= 1 << 3 {
                    if dec.decode_bits(1) == 1 {
                        -1.0
                    } else {
                        1.0
                    }
                } else {
                    1.0
                };
                shapes[channel][start] = value;
                mark(&mut collapse, &mut has_pulses, channel, band, &ShapeSource::Pulses);
            }
        } else {
            // Mid-side rotation. The angle is uniform over nine steps so
            // that both endpoints are reachable: 0 is mid only, 8 is side
            // only.
            let itheta_q = if bits8 > 0 { dec.decode_uint(9) } else { 0 };

            if itheta_q == 8 {
                // Side only: the mid signal is silent and the whole budget
                // codes the side, which folds like any other shape when it
                // has no pulses.
                let mut side = vec![0.0_f32; n];
                let source = band_shape(
                    dec,
                    codebook,
                    bits8 >> 3,
                    band,
                    lm,
                    &shapes[0],
                    &has_pulses[0],
                    seed,
                    &mut side,
                );
                (0..n).into_iter().for_each(|i| {
                    shapes[0][start + i] = side[i];
                    shapes[1][start + i] = -side[i];
                });
                mark(&mut collapse, &mut has_pulses, 0, band, &source);
                mark(&mut collapse, &mut has_pulses, 1, band, &source);
                continue;
            }

            let (cos_t, sin_t, mbits8, sbits8) = if itheta_q == 0 {
                (1.0_f32, 0.0_f32, bits8, 0)
            } else {
                let itheta = (itheta_q as i16) * 2048;
                let imid = bitexact_cos(itheta);
                let iside = bitexact_cos(16384 - itheta);
                // Bias the split towards the channel carrying the energy.
                let delta = i32::from(frac_mul16(
                    (((n - 1) << 7) as i16).min(i16::MAX),
                    bitexact_log2tan(i32::from(iside), i32::from(imid)) as i16,
                ));
                let mbits = i32::max(0, i32::min(bits8, (bits8 - delta) / 2));
                (
                    f32::from(imid) / 32768.0,
                    f32::from(iside) / 32768.0,
                    mbits,
                    bits8 - mbits,
                )
            };

            let mut mid = vec![0.0_f32; n];
            let mid_source = band_shape(
                dec,
                codebook,
                mbits8 >> 3,
                band,
                lm,
                &shapes[0],
                &has_pulses[0],
                seed,
                &mut mid,
            );

            let mut side = vec![0.0_f32; n];
            let ks = if sbits8 > 0 {
                codebook.bits_to_pulses(n as u32, (sbits8 >> 3) as u32)
            } else {
                0
            };
            if ks > 0 {
                let mut pulses = vec![0_i32; n];
                codebook.decode_pulses(dec, ks, &mut pulses);
                normalize_shape(&pulses, &mut side);
            }

            (0..n).into_iter().for_each(|i| {
                shapes[0][start + i] = cos_t * mid[i] + sin_t * side[i];
                shapes[1][start + i] = cos_t * mid[i] - sin_t * side[i];
            });
            renormalize_band(&mut shapes[0][start..start + n]);
            renormalize_band(&mut shapes[1][start..start + n]);

            let source = match (mid_source, ks > 0) {
                (ShapeSource::Pulses, _) | (_, true) => ShapeSource::Pulses,
                (ShapeSource::Folded, false) => ShapeSource::Folded,
                (ShapeSource::Noise, false) => ShapeSource::Noise,
            };
            mark(&mut collapse, &mut has_pulses, 0, band, &source);
            mark(&mut collapse, &mut has_pulses, 1, band, &source);
        }
    }

    collapse
}

/// Records the collapse bit and fold eligibility of a decoded band.
fn mark(
    collapse: &mut [u32; 2],
    has_pulses: &mut [[bool; MAX_BANDS]; 2],
    channel: usize,
    band: usize,
    source: &ShapeSource,
) {
    match source {
        ShapeSource::Pulses => {
            has_pulses[channel][band] = true;
            collapse[channel] |= 1 << band;
        }
        ShapeSource::Folded => {
            collapse[channel] |= 1 << band;
        }
        ShapeSource::Noise => {}
    }
}

/// Refills collapsed bands of a transient frame with noise at the level of
/// the previous frame's energy.
pub(crate) fn anti_collapse(
    shapes: &mut [Vec<f32>],
    channels: usize,
    end: usize,
    lm: usize,
    collapse: &[u32; 2],
    energy: &[[f32; MAX_BANDS]; 2],
    prev_energy: &[[f32; MAX_BANDS]; 2],
    seed: &mut u32,
) {
    (0..channels).into_iter().for_each(|channel| {
        (0..end).into_iter().for_each(|band| {
            if collapse[channel] & (1 << band) != 0 {
                return;
            }

            let n = band_width(band) << lm;
            let start = EBANDS[band] << lm;

            // After denormalisation the band plays at the lower of its own
            // and the previous frame's level.
            let depth = f32::max(0.0, energy[channel][band] - prev_energy[channel][band]);
            let r = fast_exp2(-depth) / (n as f32).sqrt();

            (0..n).into_iter().for_each(|i| {
                let sign = if lcg_next(seed) & 0x8000_0000 != 0 {
                    -1.0
                } else {
                    1.0
                };
                shapes[channel][start + i] = sign * r;
            });
        });
    });
}

/// Scales the unit norm shapes by the decoded band energies and clears the
/// uncoded part of the spectrum.
pub(crate) fn denormalise_bands(
    shapes: &mut [Vec<f32>],
    energy: &[[f32; MAX_BANDS]; 2],
    channels: usize,
    end: usize,
    lm: usize,
    frame_size: usize,
) {
    (0..channels).into_iter().for_each(|channel| {
        (0..end).into_iter().for_each(|band| {
            let n = band_width(band) << lm;
            let start = EBANDS[band] << lm;
            // Corrupt streams can push the log energy arbitrarily high;
            // saturate to keep the linear gain finite.
            let gain = fast_exp2(f32::min(energy[channel][band], 32.0));
            (start..start + n).into_iter().for_each(|i| {
                shapes[channel][i] *= gain;
            });
        });

        let coded = EBANDS[end] << lm;
        shapes[channel][coded..frame_size]
            .iter_mut()
            .for_each(|v| *v = 0.0);
    });
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use nanorand::RNG;

    use super::*;
    use crate::celt::alloc::compute_allocation;
    use crate::range_coder::RangeDecoder;

    fn band_norm(shape: &[f32], band: usize, lm: usize) -> f32 {
        let n = band_width(band) << lm;
        let start = EBANDS[band] << lm;
        shape[start..start + n].iter().map(|v| v * v).sum()
    }

    #[test]
    fn test_all_bands_are_unit_norm() {
        let mut rnd = nanorand::WyRand::new_seed(31);

        for _ in 0..32 {
            let len = rnd.generate_range::<usize>(20, 300);
            let mut packet = vec![0_u8; len];
            packet
                .iter_mut()
                .for_each(|b| *b = rnd.generate_range::<u32>(0, 256) as u8);

            let channels = 1 + rnd.generate_range::<usize>(0, 2);
            let lm = rnd.generate_range::<usize>(0, 4);
            let end = MAX_BANDS;
            let frame_size = 120 << lm;

            let mut dec = RangeDecoder::new(&packet);
            let alloc = compute_allocation(&mut dec, channels, end, lm, false, len as u32 * 8);

            let mut codebook = PulseCodebook::new();
            let mut shapes = vec![vec![0.0_f32; frame_size]; channels];
            let mut seed = 22222_u32;

            decode_bands(
                &mut dec,
                &mut codebook,
                channels,
                end,
                lm,
                &alloc,
                &mut shapes,
                &mut seed,
                len as u32 * 8,
            );

            (0..channels).into_iter().for_each(|channel| {
                (0..end).into_iter().for_each(|band| {
                    let norm = band_norm(&shapes[channel], band, lm);
                    assert!(
                        (norm - 1.0).abs() < 1e-3,
                        "channel {} band {} norm {}",
                        channel,
                        band,
                        norm
                    );
                });
            });
        }
    }

    #[test]
    fn test_folding_is_deterministic() {
        let run = || {
            let mut seed = 22222_u32;
            let mut spectrum = vec![0.0_f32; 200];
            // Pretend band 8 was coded.
            let mut has_pulses = [false; MAX_BANDS];
            has_pulses[8] = true;
            spectrum[EBANDS[8]] = 0.6;
            spectrum[EBANDS[8] + 1] = -0.8;

            let packet = [0_u8; 4];
            let mut dec = RangeDecoder::new(&packet);
            let mut codebook = PulseCodebook::new();
            let mut out = vec![0.0_f32; band_width(9)];
            let source = band_shape(
                &mut dec,
                &mut codebook,
                0,
                9,
                0,
                &spectrum,
                &has_pulses,
                &mut seed,
                &mut out,
            );
            assert!(matches!(source, ShapeSource::Folded));
            (out, seed)
        };

        let (a, seed_a) = run();
        let (b, seed_b) = run();
        assert_eq!(a, b);
        assert_eq!(seed_a, seed_b);

        let norm: f32 = a.iter().map(|v| v * v).sum();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_noise_fill_without_source() {
        let mut seed = 22222_u32;
        let spectrum = vec![0.0_f32; 200];
        let has_pulses = [false; MAX_BANDS];

        let packet = [0_u8; 4];
        let mut dec = RangeDecoder::new(&packet);
        let mut codebook = PulseCodebook::new();
        let n = band_width(12) << 1;
        let mut out = vec![0.0_f32; n];
        let source = band_shape(
            &mut dec,
            &mut codebook,
            0,
            12,
            1,
            &spectrum,
            &has_pulses,
            &mut seed,
            &mut out,
        );

        assert!(matches!(source, ShapeSource::Noise));
        let norm: f32 = out.iter().map(|v| v * v).sum();
        assert!((norm - 1.0).abs() < 1e-5);
        let expected = 1.0 / (n as f32).sqrt();
        out.iter().for_each(|v| {
            assert!((v.abs() - expected).abs() < 1e-6);
        });
    }

    #[test]
    fn test_anti_collapse_level() {
        let lm = 2;
        let frame_size = 480;
        let band = 5;
        let n = band_width(band) << lm;

        let mut shapes = vec![vec![0.0_f32; frame_size]];
        let mut energy = [[0.0_f32; MAX_BANDS]; 2];
        let mut prev_energy = [[0.0_f32; MAX_BANDS]; 2];
        energy[0][band] = 3.0;
        prev_energy[0][band] = 1.0;

        let collapse = [!(1_u32 << band), 0];
        let mut seed = 22222_u32;

        anti_collapse(
            &mut shapes,
            1,
            MAX_BANDS,
            lm,
            &collapse,
            &energy,
            &prev_energy,
            &mut seed,
        );

        // Two units below the current energy, spread over the band.
        let expected = fast_exp2(-2.0) / (n as f32).sqrt();
        let start = EBANDS[band] << lm;
        (0..n).into_iter().for_each(|i| {
            assert!((shapes[0][start + i].abs() - expected).abs() < 1e-6);
        });
        // Other bands untouched.
        assert_eq!(shapes[0][0], 0.0);
    }

    #[test]
    fn test_denormalise_applies_energy() {
        let lm = 0;
        let frame_size = 120;
        let mut shapes = vec![vec![0.0_f32; frame_size]];
        let mut energy = [[0.0_f32; MAX_BANDS]; 2];

        shapes[0][EBANDS[3]] = 1.0;
        energy[0][3] = 2.0;

        denormalise_bands(&mut shapes, &energy, 1, MAX_BANDS, lm, frame_size);

        assert!((shapes[0][EBANDS[3]] - 4.0).abs() < 1e-5);
        // Beyond the last band edge everything is cleared.
        (EBANDS[MAX_BANDS]..frame_size).into_iter().for_each(|i| {
            assert_eq!(shapes[0][i], 0.0);
        });
    }
}
