//! Implements the FFT used for the MDCT.

use num_complex::Complex32;
use num_traits::Zero;

/// A mixed-radix Fast Fourier Transform based up on the principle, "Keep It
/// Simple, Stupid."
///
/// The MDCT block sizes of the 48 kHz mode factor into powers of 2, 3 and 5,
/// so the recursion handles those radixes and falls back to a naive DFT for
/// any remaining prime factor. Performance is adequate for the small sizes
/// involved; correctness and clarity win over speed here.
pub(crate) struct KissFft {
    n: usize,
    /// e^(-2 pi i k / n) for k in 0..n.
    twiddles: Vec<Complex32>,
}

impl KissFft {
    pub(crate) fn new(n: usize) -> Self {
        debug_assert!(n > 0);
        let twiddles = (0..n)
            .into_iter()
            .map(|k| {
                let phase = -2.0 * std::f64::consts::PI * k as f64 / n as f64;
                Complex32::new(phase.cos() as f32, phase.sin() as f32)
            })
            .collect();

        Self { n, twiddles }
    }

    /// Forward transform: `out[k] = sum_j input[j] * e^(-2 pi i j k / n)`.
    pub(crate) fn forward(&self, input: &[Complex32], out: &mut [Complex32]) {
        debug_assert_eq!(input.len(), self.n);
        debug_assert_eq!(out.len(), self.n);
        self.transform(input, out, 1);
    }

    /// Decimation in time over the smallest prime factor. `out.len()` is the
    /// size of the current sub-transform, `stride` the distance of its
    /// samples in the original input.
    fn transform(&self, input: &[Complex32], out: &mut [Complex32], stride: usize) {
        let n = out.len();
        if n == 1 {
            out[0] = input[0];
            return;
        }

        let p = smallest_factor(n);
        let m = n / p;

        out.chunks_exact_mut(m)
            .enumerate()
            .for_each(|(q, sub)| self.transform(&input[q * stride..], sub, stride * p));

        // Combine the p sub-transforms. Y_q lives in out[q*m..(q+1)*m].
        let mut merged = vec![Complex32::zero(); n];
        (0..n).into_iter().for_each(|k| {
            let mut acc = Complex32::zero();
            (0..p).into_iter().for_each(|q| {
                let tw = self.twiddles[(k * q * stride) % self.n];
                acc += out[q * m + k % m] * tw;
            });
            merged[k] = acc;
        });
        out.copy_from_slice(&merged);
    }
}

fn smallest_factor(n: usize) -> usize {
    if n % 2 == 0 {
        2
    } else if n % 3 == 0 {
        3
    } else if n % 5 == 0 {
        5
    } else {
        n
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use nanorand::RNG;
    use num_complex::Complex32;
    use num_traits::Zero;

    use super::*;

    fn naive_dft(input: &[Complex32]) -> Vec<Complex32> {
        let n = input.len();
        (0..n)
            .into_iter()
            .map(|k| {
                let mut acc = num_complex::Complex64::zero();
                input.iter().enumerate().for_each(|(j, x)| {
                    let phase = -2.0 * std::f64::consts::PI * (j * k) as f64 / n as f64;
                    acc += num_complex::Complex64::new(x.re as f64, x.im as f64)
                        * num_complex::Complex64::new(phase.cos(), phase.sin());
                });
                Complex32::new(acc.re as f32, acc.im as f32)
            })
            .collect()
    }

    fn random_signal(n: usize, rnd: &mut nanorand::WyRand) -> Vec<Complex32> {
        (0..n)
            .into_iter()
            .map(|_| {
                let re = rnd.generate_range::<u32>(0, 2000) as f32 / 1000.0 - 1.0;
                let im = rnd.generate_range::<u32>(0, 2000) as f32 / 1000.0 - 1.0;
                Complex32::new(re, im)
            })
            .collect()
    }

    #[test]
    fn test_against_naive_dft() {
        let mut rnd = nanorand::WyRand::new_seed(7);

        [1_usize, 2, 3, 4, 5, 6, 12, 15, 60, 120, 240, 480]
            .iter()
            .for_each(|&n| {
                let input = random_signal(n, &mut rnd);
                let expected = naive_dft(&input);

                let fft = KissFft::new(n);
                let mut out = vec![Complex32::zero(); n];
                fft.forward(&input, &mut out);

                let tolerance = 1e-3 * n as f32;
                (0..n).into_iter().for_each(|k| {
                    assert!(
                        (out[k].re - expected[k].re).abs() < tolerance
                            && (out[k].im - expected[k].im).abs() < tolerance,
                        "size {} bin {}: {:?} != {:?}",
                        n,
                        k,
                        out[k],
                        expected[k]
                    );
                });
            });
    }

    #[test]
    fn test_impulse() {
        // The transform of a unit impulse is flat.
        let fft = KissFft::new(60);
        let mut input = vec![Complex32::zero(); 60];
        input[0] = Complex32::new(1.0, 0.0);
        let mut out = vec![Complex32::zero(); 60];
        fft.forward(&input, &mut out);

        out.iter().for_each(|x| {
            assert!((x.re - 1.0).abs() < 1e-5);
            assert!(x.im.abs() < 1e-5);
        });
    }
}
