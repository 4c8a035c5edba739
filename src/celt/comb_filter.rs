//! Implements the comb filter.
//!
//! The long-term pitch post-filter of the decoder. Runs over the
//! synthesized signal before de-emphasis, with the previous frame's
//! parameters crossfaded into the current ones over the overlap region.

use crate::celt::MIN_PERIOD;

/// The three tap weights of each tapset, flattened.
const GAINS: [f32; 9] = [
    0.30664063,
    0.21704102,
    0.12963867,
    0.4638672,
    0.2680664,
    0.0,
    0.7998047,
    0.100097656,
    0.0,
];

/// Applies the comb filter in place.
///
/// `y[y_offset..y_offset + n]` is filtered using up to `t1 + 2` samples of
/// history before `y_offset`. The filter transitions from the old
/// parameters `(t0, g0, tapset0)` to `(t1, g1, tapset1)` over the first
/// `overlap` samples, weighted by the square of `window`.
#[allow(clippy::too_many_arguments)]
#[allow(clippy::many_single_char_names)]
pub(crate) fn comb_filter_inplace(
    y: &mut [f32],
    y_offset: usize,
    mut t0: usize,
    mut t1: usize,
    n: usize,
    g0: f32,
    g1: f32,
    tapset0: usize,
    tapset1: usize,
    window: &[f32],
    mut overlap: usize,
) {
    if g0 == 0.0 && g1 == 0.0 {
        return;
    }

    // When the gain is zero, t0 and/or t1 is set to zero.
    // We need to have them be at least 2 to avoid processing garbage data.
    t0 = usize::max(t0, MIN_PERIOD);
    t1 = usize::max(t1, MIN_PERIOD);

    let g00 = g0 * GAINS[tapset0 * 3];
    let g01 = g0 * GAINS[tapset0 * 3 + 1];
    let g02 = g0 * GAINS[tapset0 * 3 + 2];
    let g10 = g1 * GAINS[tapset1 * 3];
    let g11 = g1 * GAINS[tapset1 * 3 + 1];
    let g12 = g1 * GAINS[tapset1 * 3 + 2];

    let mut x1 = y[y_offset - t1 + 1];
    let mut x2 = y[y_offset - t1];
    let mut x3 = y[y_offset - t1 - 1];
    let mut x4 = y[y_offset - t1 - 2];

    // If the filter didn't change, we don't need the overlap.
    if (g0 - g1).abs() < f32::EPSILON && t0 == t1 && tapset0 == tapset1 {
        overlap = 0;
    }

    let mut j = 0;
    (0..overlap).into_iter().for_each(|i| {
        let x0 = y[y_offset + i - t1 + 2];
        let f = window[i] * window[i];
        y[y_offset + i] = y[y_offset + i]
            + (((1.0 - f) * g00) * y[y_offset + i - t0])
            + (((1.0 - f) * g01) * (y[y_offset + i - t0 + 1] + y[y_offset + i - t0 - 1]))
            + (((1.0 - f) * g02) * (y[y_offset + i - t0 + 2] + y[y_offset + i - t0 - 2]))
            + ((f * g10) * x2)
            + ((f * g11) * (x1 + x3))
            + ((f * g12) * (x0 + x4));
        x4 = x3;
        x3 = x2;
        x2 = x1;
        x1 = x0;

        j += 1;
    });

    if g1 == 0.0 {
        return;
    }

    // Compute the part with the constant filter.
    comb_filter_const_inplace(y, y_offset + j, t1, n - j, g10, g11, g12);
}

#[inline(always)]
fn comb_filter_const_inplace(
    y: &mut [f32],
    y_offset: usize,
    t: usize,
    n: usize,
    g10: f32,
    g11: f32,
    g12: f32,
) {
    let mut x4 = y[y_offset - t - 2];
    let mut x3 = y[y_offset - t - 1];
    let mut x2 = y[y_offset - t];
    let mut x1 = y[y_offset - t + 1];
    (0..n).into_iter().for_each(|i| {
        let x0 = y[y_offset + i - t + 2];
        y[y_offset + i] = y[y_offset + i] + (g10 * x2) + (g11 * (x1 + x3)) + (g12 * (x0 + x4));
        x4 = x3;
        x3 = x2;
        x2 = x1;
        x1 = x0;
    });
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use super::*;

    const SIZE: usize = 80;
    const N: usize = 24;
    const OFFSET: usize = SIZE - N;
    const T0: usize = 40;
    const T1: usize = 32;
    const G0: f32 = 0.5;
    const G1: f32 = 0.25;
    const TAPSET0: usize = 1;
    const TAPSET1: usize = 2;
    const OVERLAP: usize = 6;

    /// The leading taps of the 240 sample synthesis window, as the decoder
    /// would pass them.
    fn synthesis_window() -> Vec<f32> {
        (0..240)
            .into_iter()
            .map(|i| {
                let s = (std::f32::consts::PI * (i as f32 + 0.5) / 240.0).sin();
                (std::f32::consts::PI / 2.0 * s * s).sin()
            })
            .collect()
    }

    fn test_signal() -> Vec<f32> {
        (0..SIZE)
            .into_iter()
            .map(|i| (i as f32 * 0.37).sin() + i as f32 * 0.01)
            .collect()
    }

    #[test]
    fn test_matches_filter_definition() {
        // Both periods reach past the filtered region, so every lagged tap
        // reads untouched history and the expected output follows straight
        // from the filter definition.
        let window = synthesis_window();
        let input = test_signal();

        let mut expected = input.clone();
        (0..N).into_iter().for_each(|i| {
            let j = OFFSET + i;
            let f = if i < OVERLAP {
                window[i] * window[i]
            } else {
                1.0
            };
            let old = (1.0 - f) * G0;
            let new = f * G1;
            expected[j] = input[j]
                + old * GAINS[TAPSET0 * 3] * input[j - T0]
                + old * GAINS[TAPSET0 * 3 + 1] * (input[j - T0 + 1] + input[j - T0 - 1])
                + old * GAINS[TAPSET0 * 3 + 2] * (input[j - T0 + 2] + input[j - T0 - 2])
                + new * GAINS[TAPSET1 * 3] * input[j - T1]
                + new * GAINS[TAPSET1 * 3 + 1] * (input[j - T1 + 1] + input[j - T1 - 1])
                + new * GAINS[TAPSET1 * 3 + 2] * (input[j - T1 + 2] + input[j - T1 - 2]);
        });

        let mut output = input;
        comb_filter_inplace(
            &mut output,
            OFFSET,
            T0,
            T1,
            N,
            G0,
            G1,
            TAPSET0,
            TAPSET1,
            &window,
            OVERLAP,
        );

        (0..SIZE).into_iter().for_each(|i| {
            assert!(
                (output[i] - expected[i]).abs() < 1e-5,
                "sample {}: {} != {}",
                i,
                output[i],
                expected[i]
            );
        });
    }

    #[test]
    fn test_constant_parameters_skip_the_crossfade() {
        // Identical old and new parameters collapse to the constant
        // filter over the whole region.
        let window = synthesis_window();
        let input = test_signal();

        let mut faded = input.clone();
        comb_filter_inplace(
            &mut faded,
            OFFSET,
            T1,
            T1,
            N,
            G1,
            G1,
            TAPSET1,
            TAPSET1,
            &window,
            OVERLAP,
        );

        let mut expected = input;
        (0..N).into_iter().for_each(|i| {
            let j = OFFSET + i;
            expected[j] += G1 * GAINS[TAPSET1 * 3] * expected[j - T1]
                + G1 * GAINS[TAPSET1 * 3 + 1] * (expected[j - T1 + 1] + expected[j - T1 - 1])
                + G1 * GAINS[TAPSET1 * 3 + 2] * (expected[j - T1 + 2] + expected[j - T1 - 2]);
        });

        (0..SIZE).into_iter().for_each(|i| {
            assert!((faded[i] - expected[i]).abs() < 1e-5);
        });
    }

    #[test]
    fn test_zero_gain_is_identity() {
        let mut output = test_signal();
        let expected = output.clone();

        comb_filter_inplace(&mut output, OFFSET, T0, T1, N, 0.0, 0.0, 0, 0, &[], 0);

        assert_eq!(output, expected);
    }
}
