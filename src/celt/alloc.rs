//! Implements the bit allocation.
//!
//! The decoder mirrors the encoder's allocation exactly; every input is
//! either a static table or a symbol read from the stream, so the same
//! frame always produces the same allocation. All intermediate accounting
//! happens in 1/8 bit units.

use crate::celt::mode::{
    band_width, LOG2_FRAC, SPREAD_ICDF, STATIC_ALLOC, STATIC_CAPS, TRIM_ICDF,
};
use crate::celt::MAX_BANDS;
use crate::range_coder::{RangeDecoder, Tell};

/// Number of quality rows of the static allocation matrix.
const ALLOC_ROWS: usize = 11;
/// Fractional interpolation steps between two quality rows.
const QUALITY_STEPS: usize = 8;
/// Highest interpolated quality level.
const MAX_QUALITY: usize = (ALLOC_ROWS - 1) * QUALITY_STEPS;

/// The outcome of the allocation for one frame.
pub(crate) struct Allocation {
    /// Shape bits per band in 1/8 bit units, across all channels.
    pub(crate) shape_bits8: [i32; MAX_BANDS],
    /// Fine energy bits per band and channel.
    pub(crate) fine_bits: [u32; MAX_BANDS],
    /// Bands actually coded after the skip decisions.
    pub(crate) coded_bands: usize,
    /// First band coded with intensity stereo.
    pub(crate) intensity: usize,
    /// Whether the channels are coded independently.
    pub(crate) dual_stereo: bool,
    /// Whether a bit was reserved for the anti-collapse flag.
    pub(crate) anti_collapse_rsv: bool,
    /// The decoded spreading decision.
    pub(crate) spread: u32,
}

/// Interpolated allocation of one band at quality `q`, before trim, boosts
/// and caps. `q` blends two adjacent rows of the static matrix in eighths.
fn interpolated_bits8(q: usize, band: usize, n: i32, stereo: usize) -> i32 {
    let row = q / QUALITY_STEPS;
    let frac = (q % QUALITY_STEPS) as i32;

    // The matrix rows are 1/32 bit per sample: bits8 = alloc * N * C / 4.
    let row_bits = |row: usize| -> i32 { (n * STATIC_ALLOC[row][band] as i32) << stereo >> 2 };

    let base = row_bits(row);
    if frac == 0 {
        base
    } else {
        base + (frac * (row_bits(row + 1) - base) >> 3)
    }
}

/// Decodes the allocation symbols and partitions the frame's bit budget.
///
/// Decodes, in order: the spreading decision, the per-band dynalloc boosts,
/// the allocation trim, the trailing band skip flags and the stereo
/// parameters. The quality level search itself consumes no bits and is a
/// pure function of the decoded values.
pub(crate) fn compute_allocation(
    dec: &mut RangeDecoder,
    channels: usize,
    end: usize,
    lm: usize,
    transient: bool,
    total_bits: u32,
) -> Allocation {
    let stereo = channels - 1;
    let total8 = (total_bits << 3) as i32;

    // Spreading decision, when there is room for it.
    let spread = if total_bits.saturating_sub(dec.tell()) >= 4 {
        dec.decode_icdf(&SPREAD_ICDF, 5)
    } else {
        2
    };

    // Static caps per band.
    let mut caps = [0_i32; MAX_BANDS];
    (0..end).into_iter().for_each(|b| {
        let width = band_width(b) as i32;
        caps[b] = ((STATIC_CAPS[lm][stereo][b] as i32 + 64) * width) << stereo << lm >> 2;
    });

    // Dynalloc boosts. The first boost of a band is expensive, further
    // boosts of the same band cost a single bit.
    let mut boost = [0_i32; MAX_BANDS];
    let mut total_boost = 0_i32;
    let mut dynalloc_logp = 6_i32;
    (0..end).into_iter().for_each(|b| {
        let quanta_base = (band_width(b) << lm << stereo) as i32;
        let quanta = i32::min(quanta_base << 3, i32::max(6 << 3, quanta_base));

        let mut loop_logp = dynalloc_logp;
        while (dec.tell_frac() as i32) + (loop_logp << 3) < total8 - total_boost
            && boost[b] < caps[b]
        {
            if !dec.decode_bit_logp(loop_logp as u32) {
                break;
            }
            boost[b] += quanta;
            total_boost += quanta;
            loop_logp = 1;
        }

        if boost[b] > 0 && dynalloc_logp > 2 {
            dynalloc_logp -= 1;
        }
    });

    // Allocation trim, biasing the budget towards low or high bands.
    let trim = if (dec.tell_frac() as i32) + (6 << 3) <= total8 - total_boost {
        dec.decode_icdf(&TRIM_ICDF, 7) as i32
    } else {
        5
    };

    // Reservations off the top of what is left.
    let mut available8 = total8 - dec.tell_frac() as i32 - 1;

    let anti_collapse_rsv =
        transient && lm >= 2 && available8 >= ((lm as i32) + 2) << 3;
    if anti_collapse_rsv {
        available8 -= 1 << 3;
    }

    let mut skip_rsv = false;
    if available8 >= 1 << 3 {
        skip_rsv = true;
        available8 -= 1 << 3;
    }

    let mut intensity_rsv = 0_i32;
    let mut dual_rsv = false;
    if channels == 2 {
        intensity_rsv = i32::from(LOG2_FRAC[end]);
        if intensity_rsv > available8 {
            intensity_rsv = 0;
        } else {
            available8 -= intensity_rsv;
            if available8 >= 1 << 3 {
                dual_rsv = true;
                available8 -= 1 << 3;
            }
        }
    }

    // Per-band thresholds below which coding the shape is pointless, and
    // the trim bias.
    let mut threshold = [0_i32; MAX_BANDS];
    let mut trim_offset = [0_i32; MAX_BANDS];
    (0..end).into_iter().for_each(|b| {
        let n = (band_width(b) << lm) as i32;
        threshold[b] = i32::max((channels as i32) << 3, (3 * n) << 3 >> 4);

        trim_offset[b] =
            (trim - 5 - lm as i32) * (end - b - 1) as i32 * (n * (channels as i32)) << 3 >> 6;
        if n == 1 {
            trim_offset[b] -= (channels as i32) << 3;
        }
    });

    // Bits of one band at quality q after trim, boost and caps, following
    // the same "done" rule the total uses: once a higher band is worth
    // coding, lower bands always count fully.
    let band_bits8 = |q: usize, b: usize, done: bool| -> (i32, bool) {
        let n = (band_width(b) << lm) as i32;
        let mut bits = interpolated_bits8(q, b, n, stereo);
        if bits != 0 {
            bits = i32::max(0, bits + trim_offset[b]);
        }
        bits += boost[b];

        if bits >= threshold[b] || done {
            (i32::min(bits, caps[b]), true)
        } else if bits >= (channels as i32) << 3 {
            ((channels as i32) << 3, false)
        } else {
            (0, false)
        }
    };

    let total_at = |q: usize| -> i32 {
        let mut total = 0;
        let mut done = false;
        (0..end).rev().for_each(|b| {
            let (bits, new_done) = band_bits8(q, b, done);
            done = new_done;
            total += bits;
        });
        total
    };

    // The largest quality level that still fits the budget.
    let mut quality = 0;
    for q in (0..=MAX_QUALITY).rev() {
        if total_at(q) <= available8 {
            quality = q;
            break;
        }
    }

    let mut shape_bits8 = [0_i32; MAX_BANDS];
    {
        let mut done = false;
        (0..end).rev().for_each(|b| {
            let (bits, new_done) = band_bits8(quality, b, done);
            done = new_done;
            shape_bits8[b] = bits;
        });
    }

    // Skip decisions for the trailing bands. Bands under their threshold
    // are dropped outright; bands above it spend one flag each until a
    // band is kept.
    let mut coded_bands = end;
    for b in (1..end).rev() {
        if shape_bits8[b] < threshold[b] {
            coded_bands = b;
            continue;
        }
        if !skip_rsv {
            break;
        }
        if dec.decode_bit_logp(1) {
            break;
        }
        coded_bands = b;
    }
    (coded_bands..end).into_iter().for_each(|b| {
        shape_bits8[b] = 0;
    });

    // Boosts are priced against the budget as they are decoded, so in
    // pathological streams the lowest quality row can still overshoot by a
    // reservation's worth. Truncate front to back; a band never goes
    // negative.
    let mut remaining8 = i32::max(available8, 0);
    (0..coded_bands).into_iter().for_each(|b| {
        shape_bits8[b] = i32::min(shape_bits8[b], remaining8);
        remaining8 -= shape_bits8[b];
    });

    // Stereo parameters.
    let mut intensity = 0;
    if intensity_rsv > 0 {
        intensity = dec.decode_uint(end as u32 + 1) as usize;
    }
    let mut dual_stereo = false;
    if dual_rsv {
        dual_stereo = dec.decode_bit_logp(1);
    }

    // Split each band's budget between fine energy and shape.
    let mut fine_bits = [0_u32; MAX_BANDS];
    (0..coded_bands).into_iter().for_each(|b| {
        let n = (band_width(b) << lm) as i32;
        let whole_bits = shape_bits8[b] >> 3;
        let mut fine = u32::min(8, (whole_bits / (2 * n)) as u32);

        loop {
            let cost8 = ((fine * channels as u32) << 3) as i32;
            if cost8 <= shape_bits8[b] {
                shape_bits8[b] -= cost8;
                break;
            }
            fine -= 1;
        }

        fine_bits[b] = fine;
    });

    Allocation {
        shape_bits8,
        fine_bits,
        coded_bands,
        intensity,
        dual_stereo,
        anti_collapse_rsv,
        spread,
    }
}
