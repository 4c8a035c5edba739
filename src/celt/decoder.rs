//! Implements the CELT decoder.

use crate::celt::alloc::compute_allocation;
use crate::celt::bands::{anti_collapse, decode_bands, denormalise_bands};
use crate::celt::comb_filter::comb_filter_inplace;
use crate::celt::cwrs::PulseCodebook;
use crate::celt::mode::{
    effective_bands, frame_size_lm, Mode, GAIN_ICDF, TAPSET_ICDF, TF_SELECT,
};
use crate::celt::{
    energy, MAX_BANDS, MAX_FRAME_SIZE, MAX_PERIOD, MIN_PERIOD, SHORT_BLOCK_SIZE, SILENCE_FLOOR,
};
use crate::range_coder::{RangeDecoder, Tell};
use crate::{Bandwidth, DecoderError};

/// De-emphasis filter coefficient.
const DEEMPHASIS_COEF: f32 = 0.85;
/// Default seed of the folding RNG, restored on creation and reset.
const RNG_SEED: u32 = 22222;
/// Crossfade length between the previous and current post-filter settings.
const PF_OVERLAP: usize = SHORT_BLOCK_SIZE;
/// Post-filter history kept per channel. The filter looks back at most
/// `MAX_PERIOD + 2` samples.
const PF_HISTORY: usize = MAX_PERIOD + 2;

/// Long-term pitch filter parameters of one frame.
#[derive(Clone, Copy)]
struct PostFilter {
    period: usize,
    gain: f32,
    tapset: usize,
}

impl PostFilter {
    fn off() -> Self {
        Self {
            period: 0,
            gain: 0.0,
            tapset: 0,
        }
    }
}

/// The CELT decoder.
///
/// Holds every piece of state that survives a frame: the band energies of
/// the previous frame, the synthesis tail awaiting overlap-add, the
/// de-emphasis and post-filter memories and the folding RNG. One instance
/// decodes one stream; it is not safe to share between streams or threads.
pub(crate) struct CeltDecoder {
    channels: usize,
    mode: Mode,
    codebook: PulseCodebook,
    /// Band energies of the previous frame in the log2 domain.
    pub(crate) prev_energy: [[f32; MAX_BANDS]; 2],
    /// Windowed synthesis tail of the previous frame, per channel.
    overlap: Vec<Vec<f32>>,
    /// De-emphasis filter state per channel.
    deemph_state: [f32; 2],
    /// Post-filter history per channel.
    pf_history: Vec<Vec<f32>>,
    /// Post-filter parameters of the previous frame.
    pf: PostFilter,
    /// Folding RNG state, carried across frames.
    rng_seed: u32,
    /// Collapse mask of the previous frame, one bit per band.
    pub(crate) collapse_mask: [u32; 2],
}

impl CeltDecoder {
    /// Creates a new CELT decoder for up to `channels` channels.
    pub(crate) fn new(channels: usize) -> Self {
        Self {
            channels,
            mode: Mode::new(),
            codebook: PulseCodebook::new(),
            prev_energy: [[0.0; MAX_BANDS]; 2],
            overlap: vec![vec![0.0; MAX_FRAME_SIZE]; channels],
            deemph_state: [0.0; 2],
            pf_history: vec![vec![0.0; PF_HISTORY]; channels],
            pf: PostFilter::off(),
            rng_seed: RNG_SEED,
            collapse_mask: [0; 2],
        }
    }

    /// Zeroes all cross-frame state, keeping the configuration.
    pub(crate) fn reset(&mut self) {
        self.prev_energy = [[0.0; MAX_BANDS]; 2];
        self.overlap
            .iter_mut()
            .for_each(|o| o.iter_mut().for_each(|v| *v = 0.0));
        self.deemph_state = [0.0; 2];
        self.pf_history
            .iter_mut()
            .for_each(|h| h.iter_mut().for_each(|v| *v = 0.0));
        self.pf = PostFilter::off();
        self.rng_seed = RNG_SEED;
        self.collapse_mask = [0; 2];
    }

    /// Copies the state of channel 0 over channel 1.
    ///
    /// Called after decoding a mono frame on a stereo decoder so that both
    /// channels resume from identical energies, overlap and filter
    /// memories. This includes the silence floor after a silent mono frame.
    pub(crate) fn sync_mono_to_stereo(&mut self) {
        if self.channels < 2 {
            return;
        }
        self.prev_energy[1] = self.prev_energy[0];
        let (first, second) = self.overlap.split_at_mut(1);
        second[0].copy_from_slice(&first[0]);
        self.deemph_state[1] = self.deemph_state[0];
        let (first, second) = self.pf_history.split_at_mut(1);
        second[0].copy_from_slice(&first[0]);
        self.collapse_mask[1] = self.collapse_mask[0];
    }

    /// Decodes one CELT frame into per-channel PCM.
    ///
    /// `pcm` must hold `channels` buffers of `frame_size` samples each.
    pub(crate) fn decode_frame(
        &mut self,
        frame: &[u8],
        frame_size: usize,
        channels: usize,
        bandwidth: Bandwidth,
        pcm: &mut [Vec<f32>],
    ) -> Result<(), DecoderError> {
        let lm = frame_size_lm(frame_size)
            .ok_or(DecoderError::InvalidConfiguration("unsupported frame size"))?;
        if channels > self.channels {
            return Err(DecoderError::InvalidConfiguration(
                "more stream channels than decoder channels",
            ));
        }

        let end = effective_bands(bandwidth);
        let mut dec = RangeDecoder::new(frame);
        let total_bits = (dec.bytes_len() * 8) as u32;

        let silence = if dec.tell() >= total_bits {
            true
        } else {
            dec.decode_bit_logp(15)
        };

        let mut shapes = vec![vec![0.0_f32; frame_size]; channels];
        let mut band_energy = self.prev_energy;
        let mut pf_new = PostFilter::off();
        let mut transient = false;

        if silence {
            (0..channels).into_iter().for_each(|channel| {
                band_energy[channel] = [SILENCE_FLOOR; MAX_BANDS];
            });
            log::debug!("silence frame, {} bytes", frame.len());
        } else {
            // Post-filter parameters.
            if dec.tell() + 16 <= total_bits && dec.decode_bit_logp(1) {
                let octave = dec.decode_uint(7);
                let period = (16_usize << octave) + dec.decode_bits(4 + octave) as usize - 1;
                let qg = dec.decode_icdf(&GAIN_ICDF, 3);
                let tapset = if total_bits.saturating_sub(dec.tell()) >= 2 {
                    dec.decode_icdf(&TAPSET_ICDF, 2) as usize
                } else {
                    0
                };
                pf_new = PostFilter {
                    period: period.max(MIN_PERIOD).min(MAX_PERIOD),
                    gain: 0.09375 * (qg + 1) as f32,
                    tapset,
                };
                log::debug!(
                    "post-filter: period {}, gain {}, tapset {}",
                    pf_new.period,
                    pf_new.gain,
                    pf_new.tapset
                );
            }

            transient = lm > 0 && dec.tell() + 3 <= total_bits && dec.decode_bit_logp(3);
            let intra = dec.tell() + 3 <= total_bits && dec.decode_bit_logp(3);
            log::debug!(
                "frame: {} bytes, lm {}, transient {}, intra {}",
                frame.len(),
                lm,
                transient,
                intra
            );

            energy::decode_coarse_energy(
                &mut dec,
                &mut band_energy,
                channels,
                0..end,
                lm,
                intra,
                total_bits,
            );

            let tf_change = decode_tf_changes(&mut dec, lm, transient, end, total_bits);
            log::trace!("tf_change: {:?}", &tf_change[..end]);

            let alloc = compute_allocation(&mut dec, channels, end, lm, transient, total_bits);
            log::trace!(
                "allocation: coded {}, intensity {}, dual {}, spread {}",
                alloc.coded_bands,
                alloc.intensity,
                alloc.dual_stereo,
                alloc.spread
            );

            energy::decode_fine_energy(
                &mut dec,
                &mut band_energy,
                channels,
                0..end,
                &alloc.fine_bits,
            );

            let collapse = decode_bands(
                &mut dec,
                &mut self.codebook,
                channels,
                end,
                lm,
                &alloc,
                &mut shapes,
                &mut self.rng_seed,
                total_bits,
            );

            let anti_collapse_on = alloc.anti_collapse_rsv && dec.decode_bits(1) == 1;

            let bits_left = total_bits as i32 - dec.tell() as i32;
            energy::decode_energy_remainder(
                &mut dec,
                &mut band_energy,
                channels,
                0..end,
                &alloc.fine_bits,
                bits_left,
            );

            if transient && anti_collapse_on {
                anti_collapse(
                    &mut shapes,
                    channels,
                    end,
                    lm,
                    &collapse,
                    &band_energy,
                    &self.prev_energy,
                    &mut self.rng_seed,
                );
            }

            (0..channels).into_iter().for_each(|channel| {
                self.collapse_mask[channel] = collapse[channel];
            });

            denormalise_bands(&mut shapes, &band_energy, channels, end, lm, frame_size);
        }

        // Synthesis: IMDCT per block, window, overlap-add.
        let blocks = if transient { 1 << lm } else { 1 };
        let block_lm = if transient { 0 } else { lm };
        let block_bins = frame_size / blocks;
        let imdct = &self.mode.imdct[block_lm];
        let window = &self.mode.window[block_lm];
        let scale = 2.0 / block_bins as f32;

        for channel in 0..channels {
            let mut synth = vec![0.0_f32; frame_size + MAX_FRAME_SIZE];
            synth[..MAX_FRAME_SIZE].copy_from_slice(&self.overlap[channel]);

            let mut time = vec![0.0_f32; 2 * block_bins];
            (0..blocks).into_iter().for_each(|block| {
                imdct.inverse(&shapes[channel], block, blocks, &mut time, scale);
                let t0 = block * block_bins;
                (0..2 * block_bins).into_iter().for_each(|i| {
                    synth[t0 + i] += time[i] * window[i];
                });
            });

            self.overlap[channel].copy_from_slice(&synth[frame_size..frame_size + MAX_FRAME_SIZE]);

            // Long-term pitch post-filter with parameter crossfade.
            let mut work = vec![0.0_f32; PF_HISTORY + frame_size];
            work[..PF_HISTORY].copy_from_slice(&self.pf_history[channel]);
            work[PF_HISTORY..].copy_from_slice(&synth[..frame_size]);
            comb_filter_inplace(
                &mut work,
                PF_HISTORY,
                self.pf.period,
                pf_new.period,
                frame_size,
                self.pf.gain,
                pf_new.gain,
                self.pf.tapset,
                pf_new.tapset,
                &self.mode.window[0],
                PF_OVERLAP,
            );
            self.pf_history[channel].copy_from_slice(&work[frame_size..frame_size + PF_HISTORY]);

            // De-emphasis.
            let mut state = self.deemph_state[channel];
            let out = &mut pcm[channel];
            (0..frame_size).into_iter().for_each(|i| {
                let v = work[PF_HISTORY + i] + DEEMPHASIS_COEF * state;
                state = v;
                out[i] = v;
            });
            self.deemph_state[channel] = state;
        }

        self.pf = pf_new;

        (0..channels).into_iter().for_each(|channel| {
            (0..MAX_BANDS).into_iter().for_each(|band| {
                self.prev_energy[channel][band] = f32::max(band_energy[channel][band], SILENCE_FLOOR);
            });
        });

        Ok(())
    }
}

/// Decodes the per-band time-frequency resolution changes.
///
/// The bitstream position has to advance exactly as the encoder's did; the
/// resolved values are reported back for diagnostics but the band pipeline
/// codes every band at its native resolution.
fn decode_tf_changes(
    dec: &mut RangeDecoder,
    lm: usize,
    transient: bool,
    end: usize,
    total_bits: u32,
) -> [i8; MAX_BANDS] {
    let mut tf_change = [0_i8; MAX_BANDS];
    let mut tf_changed = [false; MAX_BANDS];
    let (first_logp, next_logp) = if transient { (2, 4) } else { (4, 5) };

    let mut available = total_bits.saturating_sub(dec.tell());
    let select_bit = lm != 0 && available > first_logp;

    let mut field_logp = first_logp;
    let mut diff = false;
    let mut changed = false;
    (0..end).into_iter().for_each(|band| {
        if available > field_logp + u32::from(select_bit) {
            diff ^= dec.decode_bit_logp(field_logp);
            available = total_bits.saturating_sub(dec.tell());
            changed |= diff;
        }
        tf_changed[band] = diff;
        field_logp = next_logp;
    });

    let selector = TF_SELECT[lm][usize::from(transient)];
    let select = if select_bit
        && selector[0][usize::from(changed)] != selector[1][usize::from(changed)]
    {
        dec.decode_bit_logp(1)
    } else {
        false
    };

    (0..end).into_iter().for_each(|band| {
        tf_change[band] = selector[usize::from(select)][usize::from(tf_changed[band])];
    });

    tf_change
}
