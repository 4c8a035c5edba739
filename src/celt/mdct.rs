//! Implements the modified discrete cosine transform.

use num_complex::Complex32;
use num_traits::Zero;

use crate::celt::kiss_fft::KissFft;

/// The inverse MDCT, computed through a complex FFT of a quarter of the
/// output size.
///
/// This is a simple MDCT implementation that uses a N/4 complex FFT to do
/// most of the work. The algorithm is similar to (and inspired from) Fabrice
/// Bellard's MDCT implementation in FFMPEG, but has differences in signs,
/// ordering and scaling in many places.
///
/// `b` coefficients produce `2b` time samples:
///
/// `y[n] = scale * sum_k X[k] * cos(pi/b * (n + 1/2 + b/2) * (k + 1/2))`
///
/// The even coefficients and the reversed odd coefficients are paired into
/// complex values, rotated by `e^(i pi (r + 1/8) / b)`, pushed through the
/// FFT, rotated again by the same twiddles and unfolded into the output
/// using the DCT-IV boundary symmetries.
pub(crate) struct Imdct {
    /// The number of input coefficients. The output is twice as long.
    b: usize,
    /// FFT of size b/2.
    fft: KissFft,
    /// e^(i pi (x + 1/8) / b) for x in 0..b/2, shared by both rotations.
    twiddles: Vec<Complex32>,
}

impl Imdct {
    pub(crate) fn new(b: usize) -> Self {
        debug_assert!(b % 2 == 0);
        let m = b / 2;
        let twiddles = (0..m)
            .into_iter()
            .map(|x| {
                let phase = std::f64::consts::PI * (x as f64 + 0.125) / b as f64;
                Complex32::new(phase.cos() as f32, phase.sin() as f32)
            })
            .collect();

        Self {
            b,
            fft: KissFft::new(m),
            twiddles,
        }
    }

    /// Transforms `b` spectral coefficients into `2b` time samples.
    ///
    /// # Arguments
    /// * `spectrum` - Coefficient storage, read at `offset + k * stride`.
    ///                Transient frames interleave their short blocks, hence
    ///                the strided access.
    /// * `out`      - Receives the `2b` time samples, multiplied by `scale`.
    pub(crate) fn inverse(
        &self,
        spectrum: &[f32],
        offset: usize,
        stride: usize,
        out: &mut [f32],
        scale: f32,
    ) {
        let b = self.b;
        let m = b / 2;
        let half = b / 2;
        debug_assert_eq!(out.len(), 2 * b);

        // Pre-rotation. Pairs X[2r] with X[b-1-2r].
        let z: Vec<Complex32> = (0..m)
            .into_iter()
            .map(|r| {
                let u = spectrum[offset + (2 * r) * stride];
                let v = spectrum[offset + (b - 1 - 2 * r) * stride];
                (Complex32::new(u, -v) * self.twiddles[r]).conj()
            })
            .collect();

        // The derivation asks for an unnormalized inverse DFT; conjugating
        // around the forward transform provides it.
        let mut zf = vec![Complex32::zero(); m];
        self.fft.forward(&z, &mut zf);

        // Post-rotation yields the DCT-IV of the coefficients.
        let mut c = vec![0.0_f32; b];
        (0..m).into_iter().for_each(|s| {
            let sc = zf[s].conj() * self.twiddles[s];
            c[2 * s] = sc.re;
            c[b - 1 - 2 * s] = sc.im;
        });

        // Unfold the DCT-IV symmetries into the full output: even symmetric
        // around -1/2, odd symmetric around b - 1/2.
        (0..half).into_iter().for_each(|n| {
            out[n] = scale * c[half + n];
        });
        (half..half + b).into_iter().for_each(|n| {
            out[n] = -scale * c[b + half - 1 - n];
        });
        (half + b..2 * b).into_iter().for_each(|n| {
            out[n] = -scale * c[n - b - half];
        });
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use nanorand::RNG;

    use super::*;

    /// The transform straight from its definition.
    fn imdct_direct(x: &[f32], y: &mut [f32], scale: f64) {
        let b = x.len();
        assert_eq!(y.len(), 2 * b);

        (0..2 * b).into_iter().for_each(|n| {
            let mut acc = 0.0_f64;
            (0..b).into_iter().for_each(|k| {
                let phase = std::f64::consts::PI / b as f64
                    * (n as f64 + 0.5 + b as f64 / 2.0)
                    * (k as f64 + 0.5);
                acc += x[k] as f64 * phase.cos();
            });
            y[n] = (scale * acc) as f32;
        });
    }

    fn random_coeffs(n: usize, rnd: &mut nanorand::WyRand) -> Vec<f32> {
        (0..n)
            .into_iter()
            .map(|_| rnd.generate_range::<u32>(0, 2000) as f32 / 1000.0 - 1.0)
            .collect()
    }

    #[test]
    fn test_against_direct_transform() {
        let mut rnd = nanorand::WyRand::new_seed(11);

        [60_usize, 120, 240, 480, 960].iter().for_each(|&b| {
            let x = random_coeffs(b, &mut rnd);

            let mut expected = vec![0.0_f32; 2 * b];
            imdct_direct(&x, &mut expected, 1.0);

            let imdct = Imdct::new(b);
            let mut actual = vec![0.0_f32; 2 * b];
            imdct.inverse(&x, 0, 1, &mut actual, 1.0);

            let tolerance = 1e-3 * (b as f32).sqrt();
            (0..2 * b).into_iter().for_each(|n| {
                assert!(
                    (actual[n] - expected[n]).abs() < tolerance,
                    "b = {}, n = {}: {} != {}",
                    b,
                    n,
                    actual[n],
                    expected[n]
                );
            });
        });
    }

    #[test]
    fn test_strided_access() {
        let mut rnd = nanorand::WyRand::new_seed(12);
        let b = 120;
        let stride = 4;
        let x = random_coeffs(b, &mut rnd);

        // Spread the coefficients over an interleaved buffer.
        let mut interleaved = vec![0.0_f32; b * stride];
        (0..b).into_iter().for_each(|k| {
            interleaved[1 + k * stride] = x[k];
        });

        let imdct = Imdct::new(b);
        let mut plain = vec![0.0_f32; 2 * b];
        let mut strided = vec![0.0_f32; 2 * b];
        imdct.inverse(&x, 0, 1, &mut plain, 0.5);
        imdct.inverse(&interleaved, 1, stride, &mut strided, 0.5);

        (0..2 * b).into_iter().for_each(|n| {
            assert!((plain[n] - strided[n]).abs() < 1e-6);
        });
    }

    /// Windowed analysis followed by windowed synthesis with a power
    /// complementary window reconstructs the signal through overlap-add.
    #[test]
    fn test_tdac_reconstruction() {
        let mut rnd = nanorand::WyRand::new_seed(13);
        let b = 120;
        let frames = 6;

        let window: Vec<f32> = (0..2 * b)
            .into_iter()
            .map(|i| {
                let s = (std::f32::consts::PI * (i as f32 + 0.5) / (2 * b) as f32).sin();
                (std::f32::consts::PI / 2.0 * s * s).sin()
            })
            .collect();

        let signal = random_coeffs(b * frames, &mut rnd);

        // Analysis: windowed MDCT over half-overlapped frames.
        let mdct_forward = |frame: &[f32]| -> Vec<f32> {
            (0..b)
                .into_iter()
                .map(|k| {
                    let mut acc = 0.0_f64;
                    (0..2 * b).into_iter().for_each(|n| {
                        let phase = std::f64::consts::PI / b as f64
                            * (n as f64 + 0.5 + b as f64 / 2.0)
                            * (k as f64 + 0.5);
                        acc += (frame[n] * window[n]) as f64 * phase.cos();
                    });
                    acc as f32
                })
                .collect()
        };

        let imdct = Imdct::new(b);
        let mut reconstructed = vec![0.0_f32; b * frames];
        let mut time = vec![0.0_f32; 2 * b];

        (0..frames - 1).into_iter().for_each(|f| {
            let start = f * b;
            let spectrum = mdct_forward(&signal[start..start + 2 * b]);
            imdct.inverse(&spectrum, 0, 1, &mut time, 2.0 / b as f32);

            (0..2 * b).into_iter().for_each(|n| {
                reconstructed[start + n] += time[n] * window[n];
            });
        });

        // The interior samples see both halves of the overlap and must match.
        (b..(frames - 1) * b).into_iter().for_each(|n| {
            assert!(
                (reconstructed[n] - signal[n]).abs() < 1e-3,
                "sample {}: {} != {}",
                n,
                reconstructed[n],
                signal[n]
            );
        });
    }
}
