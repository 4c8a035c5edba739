//! Static configuration of the 48 kHz CELT mode.
//!
//! CELT operates on a fixed 21 band layout defined on a 2.5 ms MDCT grid.
//! Larger frames scale every band edge by the frame duration, narrower
//! bandwidths stop coding bands early. All probability models of the
//! bitstream are static and collected here.

use std::f32::consts::PI;

use crate::celt::mdct::Imdct;
use crate::celt::{MAX_BANDS, SHORT_BLOCK_SIZE};
use crate::Bandwidth;

/// Band edges on the 2.5 ms grid. Scaled by `1 << LM` for larger frames.
pub(crate) const EBANDS: [usize; MAX_BANDS + 1] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 12, 14, 16, 20, 24, 28, 34, 40, 48, 60, 78, 100,
];

/// Energy prediction coefficients over the previous frame, indexed by LM.
pub(crate) const ALPHA_COEF: [f32; 4] = [
    29440.0 / 32768.0,
    26112.0 / 32768.0,
    21248.0 / 32768.0,
    16384.0 / 32768.0,
];

/// Energy prediction coefficients over the previous band, indexed by LM.
pub(crate) const BETA_COEF: [f32; 4] = [
    1.0 - 30147.0 / 32768.0,
    1.0 - 22282.0 / 32768.0,
    1.0 - 12124.0 / 32768.0,
    1.0 - 6554.0 / 32768.0,
];

/// Inter-band prediction coefficient of intra coded frames.
pub(crate) const INTRA_BETA: f32 = 1.0 - 4915.0 / 32768.0;

/// Laplace probability model of the coarse energy, as `(fs, decay)` byte
/// pairs per band. Indexed by LM and the intra flag.
pub(crate) const E_PROB_MODEL: [[[u8; 2 * MAX_BANDS]; 2]; 4] = [
    [
        // 120-sample inter
        [
            72, 127, 65, 129, 66, 128, 65, 128, 64, 128, 62, 128, 64, 128, 64, 128, 92, 78, 92, 79,
            92, 78, 90, 79, 116, 41, 115, 40, 114, 40, 132, 26, 132, 26, 145, 17, 161, 12, 176, 10,
            177, 11,
        ],
        // 120-sample intra
        [
            24, 179, 48, 138, 54, 135, 54, 132, 53, 134, 56, 133, 55, 132, 55, 132, 61, 114, 70,
            96, 74, 88, 75, 88, 87, 74, 89, 66, 91, 67, 100, 59, 108, 50, 120, 40, 122, 37, 97, 43,
            78, 50,
        ],
    ],
    [
        // 240-sample inter
        [
            83, 78, 84, 81, 88, 75, 86, 74, 87, 71, 90, 73, 93, 74, 93, 74, 109, 40, 114, 36, 117,
            34, 117, 34, 143, 17, 145, 18, 146, 19, 162, 12, 165, 10, 178, 7, 189, 6, 190, 8, 177,
            9,
        ],
        // 240-sample intra
        [
            23, 178, 54, 115, 63, 102, 66, 98, 69, 99, 74, 89, 71, 91, 73, 91, 78, 89, 86, 80, 92,
            66, 93, 64, 102, 59, 103, 60, 104, 60, 117, 52, 123, 44, 138, 35, 133, 31, 97, 38, 77,
            45,
        ],
    ],
    [
        // 480-sample inter
        [
            61, 90, 93, 60, 105, 42, 107, 41, 110, 45, 116, 38, 113, 38, 112, 38, 124, 26, 132, 27,
            136, 19, 140, 20, 155, 14, 159, 16, 158, 18, 170, 13, 177, 10, 187, 8, 192, 6, 175, 9,
            159, 10,
        ],
        // 480-sample intra
        [
            21, 178, 59, 110, 71, 86, 75, 85, 84, 83, 91, 66, 88, 73, 87, 72, 92, 75, 98, 72, 105,
            58, 107, 54, 115, 52, 114, 55, 112, 56, 129, 51, 132, 40, 150, 33, 140, 29, 98, 35, 77,
            42,
        ],
    ],
    [
        // 960-sample inter
        [
            42, 121, 96, 66, 108, 43, 111, 40, 117, 44, 123, 32, 120, 36, 119, 33, 127, 33, 134,
            34, 139, 21, 147, 23, 152, 20, 158, 25, 154, 26, 166, 21, 173, 16, 184, 13, 184, 10,
            150, 13, 139, 15,
        ],
        // 960-sample intra
        [
            22, 178, 63, 114, 74, 82, 84, 83, 92, 82, 103, 62, 96, 72, 96, 67, 101, 73, 107, 72,
            113, 55, 118, 52, 125, 52, 118, 52, 117, 55, 135, 49, 137, 39, 157, 32, 145, 29, 97,
            33, 77, 40,
        ],
    ],
];

/// Two sided model of energy deltas when the budget runs low.
pub(crate) const SMALL_ENERGY_ICDF: [u8; 3] = [2, 1, 0];

/// Spreading decision model (ftb = 5).
pub(crate) const SPREAD_ICDF: [u8; 4] = [25, 23, 2, 0];

/// Post-filter tapset model (ftb = 2).
pub(crate) const TAPSET_ICDF: [u8; 3] = [2, 1, 0];

/// Post-filter gain model, uniform over eight steps (ftb = 3).
pub(crate) const GAIN_ICDF: [u8; 8] = [7, 6, 5, 4, 3, 2, 1, 0];

/// Allocation trim model (ftb = 7).
pub(crate) const TRIM_ICDF: [u8; 11] = [126, 124, 119, 109, 87, 41, 19, 9, 4, 2, 0];

/// Quality rows of the static allocation matrix in 1/32 bit per sample.
pub(crate) const STATIC_ALLOC: [[u8; MAX_BANDS]; 11] = [
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    [90, 80, 75, 69, 63, 56, 49, 40, 34, 29, 20, 18, 10, 0, 0, 0, 0, 0, 0, 0, 0],
    [110, 100, 90, 84, 78, 71, 65, 58, 51, 45, 39, 32, 26, 20, 12, 0, 0, 0, 0, 0, 0],
    [118, 110, 103, 93, 86, 80, 75, 70, 65, 59, 53, 47, 40, 31, 23, 15, 4, 0, 0, 0, 0],
    [126, 119, 112, 104, 95, 89, 83, 78, 72, 66, 60, 54, 47, 39, 32, 25, 17, 12, 1, 0, 0],
    [134, 127, 120, 114, 103, 97, 91, 85, 78, 72, 66, 60, 54, 47, 41, 35, 29, 23, 16, 10, 1],
    [144, 137, 130, 124, 113, 107, 101, 95, 88, 82, 76, 70, 64, 57, 51, 45, 39, 33, 26, 15, 1],
    [152, 145, 138, 132, 123, 117, 111, 105, 98, 92, 86, 80, 74, 67, 61, 55, 49, 43, 36, 20, 1],
    [162, 155, 148, 142, 133, 127, 121, 115, 108, 102, 96, 90, 84, 77, 71, 65, 59, 53, 46, 30, 1],
    [172, 165, 158, 152, 143, 137, 131, 125, 118, 112, 106, 100, 94, 87, 81, 75, 69, 63, 56, 45, 20],
    [200, 200, 200, 200, 200, 200, 200, 200, 198, 193, 188, 183, 178, 173, 168, 163, 158, 153, 148, 129, 104],
];

/// Allocation caps per band, indexed by LM and the channel count.
pub(crate) const STATIC_CAPS: [[[u8; MAX_BANDS]; 2]; 4] = [
    [
        // 120-sample
        [224, 224, 224, 224, 224, 224, 224, 224, 160, 160, 160, 160, 185, 185, 185, 178, 178, 168, 134, 61, 37],
        [224, 224, 224, 224, 224, 224, 224, 224, 240, 240, 240, 240, 207, 207, 207, 198, 198, 183, 144, 66, 40],
    ],
    [
        // 240-sample
        [160, 160, 160, 160, 160, 160, 160, 160, 185, 185, 185, 185, 193, 193, 193, 183, 183, 172, 138, 64, 38],
        [240, 240, 240, 240, 240, 240, 240, 240, 207, 207, 207, 207, 204, 204, 204, 193, 193, 180, 143, 66, 40],
    ],
    [
        // 480-sample
        [185, 185, 185, 185, 185, 185, 185, 185, 193, 193, 193, 193, 193, 193, 193, 183, 183, 172, 138, 65, 39],
        [207, 207, 207, 207, 207, 207, 207, 207, 204, 204, 204, 204, 201, 201, 201, 188, 188, 176, 141, 66, 40],
    ],
    [
        // 960-sample
        [193, 193, 193, 193, 193, 193, 193, 193, 193, 193, 193, 193, 194, 194, 194, 184, 184, 173, 139, 65, 39],
        [204, 204, 204, 204, 204, 204, 204, 204, 201, 201, 201, 201, 198, 198, 198, 187, 187, 175, 140, 66, 40],
    ],
];

/// log2 of the band count in 1/8 bit units, used to price the intensity
/// stereo threshold.
pub(crate) const LOG2_FRAC: [u8; 24] = [
    0, 8, 13, 16, 19, 21, 23, 24, 26, 27, 28, 29, 30, 31, 32, 32, 33, 34, 34, 35, 36, 36, 37, 37,
];

/// Time-frequency resolution adjustments, indexed by LM, the transient
/// flag, the tf_select flag and the per-band change flag.
pub(crate) const TF_SELECT: [[[[i8; 2]; 2]; 2]; 4] = [
    [[[0, -1], [0, -1]], [[0, -1], [0, -1]]],
    [[[0, -1], [0, -2]], [[1, 0], [1, -1]]],
    [[[0, -2], [0, -3]], [[2, 0], [1, -1]]],
    [[[0, -2], [0, -3]], [[3, 0], [1, -1]]],
];

/// Width of a band on the 2.5 ms grid.
#[inline(always)]
pub(crate) fn band_width(band: usize) -> usize {
    EBANDS[band + 1] - EBANDS[band]
}

/// The number of coded bands of a bandwidth.
pub(crate) fn effective_bands(bandwidth: Bandwidth) -> usize {
    match bandwidth {
        Bandwidth::Narrowband => 13,
        Bandwidth::Mediumband => 15,
        Bandwidth::Wideband => 17,
        Bandwidth::Superwideband => 19,
        Bandwidth::Fullband => 21,
    }
}

/// LM of a frame size: the number of band edge doublings relative to a
/// 2.5 ms frame. `None` for unsupported frame sizes.
pub(crate) fn frame_size_lm(frame_size: usize) -> Option<usize> {
    match frame_size {
        120 => Some(0),
        240 => Some(1),
        480 => Some(2),
        960 => Some(3),
        _ => None,
    }
}

/// The power complementary window w[i] = sin(pi/2 * sin^2(pi*(i+0.5)/n)).
fn vorbis_window(n: usize) -> Vec<f32> {
    (0..n)
        .into_iter()
        .map(|i| {
            let s = (PI * (i as f32 + 0.5) / n as f32).sin();
            (PI / 2.0 * s * s).sin()
        })
        .collect()
}

/// Precomputed transforms and windows of the 48 kHz mode, one per LM.
pub(crate) struct Mode {
    /// IMDCT of block size `120 << lm`.
    pub(crate) imdct: [Imdct; 4],
    /// Window of length `240 << lm`.
    pub(crate) window: [Vec<f32>; 4],
}

impl Mode {
    pub(crate) fn new() -> Self {
        let imdct = [
            Imdct::new(SHORT_BLOCK_SIZE),
            Imdct::new(SHORT_BLOCK_SIZE << 1),
            Imdct::new(SHORT_BLOCK_SIZE << 2),
            Imdct::new(SHORT_BLOCK_SIZE << 3),
        ];
        let window = [
            vorbis_window(2 * SHORT_BLOCK_SIZE),
            vorbis_window(2 * (SHORT_BLOCK_SIZE << 1)),
            vorbis_window(2 * (SHORT_BLOCK_SIZE << 2)),
            vorbis_window(2 * (SHORT_BLOCK_SIZE << 3)),
        ];

        Self { imdct, window }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_band_edges() {
        assert_eq!(EBANDS[MAX_BANDS], 100);
        (0..MAX_BANDS).into_iter().for_each(|b| {
            assert!(EBANDS[b] < EBANDS[b + 1]);
        });
        // Band widths never shrink.
        (1..MAX_BANDS).into_iter().for_each(|b| {
            assert!(band_width(b) >= band_width(b - 1));
        });
    }

    #[test]
    fn test_window_power_complementary() {
        [240_usize, 480, 960, 1920].iter().for_each(|&n| {
            let w = vorbis_window(n);
            let half = n / 2;
            (0..half).into_iter().for_each(|i| {
                let p = w[i] * w[i] + w[i + half] * w[i + half];
                assert!((p - 1.0).abs() < 1e-6, "n = {}, i = {}, p = {}", n, i, p);
            });
            // Symmetric rise and fall.
            (0..n).into_iter().for_each(|i| {
                assert!((w[i] - w[n - 1 - i]).abs() < 1e-6);
            });
        });
    }

    #[test]
    fn test_effective_bands() {
        assert_eq!(effective_bands(crate::Bandwidth::Narrowband), 13);
        assert_eq!(effective_bands(crate::Bandwidth::Mediumband), 15);
        assert_eq!(effective_bands(crate::Bandwidth::Wideband), 17);
        assert_eq!(effective_bands(crate::Bandwidth::Superwideband), 19);
        assert_eq!(effective_bands(crate::Bandwidth::Fullband), 21);
    }

    #[test]
    fn test_frame_size_lm() {
        assert_eq!(frame_size_lm(120), Some(0));
        assert_eq!(frame_size_lm(240), Some(1));
        assert_eq!(frame_size_lm(480), Some(2));
        assert_eq!(frame_size_lm(960), Some(3));
        assert_eq!(frame_size_lm(480 + 1), None);
        assert_eq!(frame_size_lm(1920), None);
    }
}
