use rustfft::num_complex::Complex;

use super::tables::{BaseRadix, FftError, FftTables, Window};

/// Transform length used by the logger.
pub const FFT_LENGTH: usize = 1024;

/// Real-input mixed-radix FFT with precomputed tables.
///
/// Output is an interleaved `(re, im)` buffer of `2 * len` floats of which only
/// the first `len/2 + 1` bins are written. Call [`complete_spectrum`] when the
/// upper half is needed.
pub struct RealFft {
    tables: FftTables,
}

impl RealFft {
    pub fn new(length: usize, window: Window) -> Result<Self, FftError> {
        Ok(Self {
            tables: FftTables::new(length, window)?,
        })
    }

    /// Transform length `N`.
    pub fn points(&self) -> usize {
        self.tables.length
    }

    /// Number of meaningful bins after a transform.
    pub fn half_len(&self) -> usize {
        self.tables.length / 2 + 1
    }

    /// Floats needed for the output buffer.
    pub fn spectrum_len(&self) -> usize {
        2 * self.tables.length
    }

    pub fn transform(&self, samples: &[i16], spectrum: &mut [f32]) {
        let n = self.tables.length;
        debug_assert_eq!(samples.len(), n);
        debug_assert!(spectrum.len() >= 2 * n);

        self.base_stage(samples, spectrum);

        let mut segment = self.tables.base.points() * 4;
        while segment <= n {
            self.combine_stage(segment, spectrum);
            segment *= 4;
        }
    }

    fn base_stage(&self, samples: &[i16], spectrum: &mut [f32]) {
        let n = self.tables.length;
        let weighted = |index: usize| samples[index] as f32 * self.tables.coefficients[index];

        match self.tables.base {
            BaseRadix::Two => {
                let stride = n / 2;
                for (group, &r) in self.tables.reversal.iter().enumerate() {
                    let even = weighted(r);
                    let odd = weighted(r + stride);
                    let out = 4 * group;
                    spectrum[out..out + 4].copy_from_slice(&[even + odd, 0.0, even - odd, 0.0]);
                }
            }
            BaseRadix::Four => {
                let stride = n / 4;
                for (group, &r) in self.tables.reversal.iter().enumerate() {
                    let a = weighted(r);
                    let b = weighted(r + stride);
                    let c = weighted(r + 2 * stride);
                    let d = weighted(r + 3 * stride);

                    let t0 = a + c;
                    let t1 = a - c;
                    let t2 = b + d;
                    let t3 = b - d;

                    let out = 8 * group;
                    spectrum[out..out + 8]
                        .copy_from_slice(&[t0 + t2, 0.0, t1, -t3, t0 - t2, 0.0, t1, t3]);
                }
            }
        }
    }

    /// Merge groups of four `segment/4`-point spectra into `segment`-point ones.
    ///
    /// Only bins `0..=segment/2` of each result are produced; the sub-spectra are
    /// Hermitian, so the bins past `segment/8` come from conjugate relations on
    /// the butterfly terms rather than a second butterfly.
    fn combine_stage(&self, segment: usize, spectrum: &mut [f32]) {
        let n = self.tables.length;
        let step = n / segment;
        let quarter = segment / 4;
        let half = segment / 2;
        let eighth = segment / 8;

        for start in (0..n).step_by(segment) {
            for i in 0..=eighth {
                let k = i * step;
                let a = start + i;
                let b = a + quarter;
                let c = b + quarter;
                let d = c + quarter;

                let ma = load(spectrum, a);
                let mb = load(spectrum, b) * self.tables.twiddles[k];
                let mc = load(spectrum, c) * self.tables.twiddles[2 * k];
                let md = load(spectrum, d) * self.tables.twiddles[3 * k];

                let t0 = ma + mc;
                let t1 = ma - mc;
                let t2 = mb + md;
                let t3 = mb - md;

                store(spectrum, a, t0 + t2);
                store(spectrum, b, t1 + rotate_neg_quarter(t3));

                if i == 0 {
                    store(spectrum, c, t0 - t2);
                    continue;
                }

                if i == eighth {
                    continue;
                }

                let s0 = t1.conj();
                let s1 = t0.conj();
                let s2 = Complex::new(-t3.im, -t3.re);
                let s3 = Complex::new(-t2.im, -t2.re);

                store(spectrum, start + quarter - i, s0 + s2);
                store(spectrum, start + half - i, s1 + rotate_neg_quarter(s3));
            }
        }
    }
}

/// Mirror bins `1..N/2` into `N/2+1..N` as complex conjugates.
pub fn complete_spectrum(spectrum: &mut [f32]) {
    let n = spectrum.len() / 2;
    for i in 1..n / 2 {
        spectrum[2 * (n - i)] = spectrum[2 * i];
        spectrum[2 * (n - i) + 1] = -spectrum[2 * i + 1];
    }
}

/// Complex value of bin `index` in an interleaved spectrum.
pub fn bin(spectrum: &[f32], index: usize) -> Complex<f32> {
    load(spectrum, index)
}

#[inline]
fn load(spectrum: &[f32], index: usize) -> Complex<f32> {
    Complex::new(spectrum[2 * index], spectrum[2 * index + 1])
}

#[inline]
fn store(spectrum: &mut [f32], index: usize, value: Complex<f32>) {
    spectrum[2 * index] = value.re;
    spectrum[2 * index + 1] = value.im;
}

// z * -i
#[inline]
fn rotate_neg_quarter(z: Complex<f32>) -> Complex<f32> {
    Complex::new(z.im, -z.re)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::reference::reference_spectrum;

    fn run(fft: &RealFft, samples: &[i16]) -> Vec<f32> {
        let mut spectrum = vec![0.0; fft.spectrum_len()];
        fft.transform(samples, &mut spectrum);
        spectrum
    }

    fn pseudo_random(len: usize, seed: u32) -> Vec<i16> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 16) as i16
            })
            .collect()
    }

    fn sine(len: usize, bin: usize, amplitude: f32) -> Vec<i16> {
        (0..len)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * (bin * i) as f32 / len as f32;
                (amplitude * phase.sin()).round() as i16
            })
            .collect()
    }

    #[test]
    fn buffer_sizes_follow_length() {
        let fft = RealFft::new(FFT_LENGTH, Window::Rectangular).unwrap();
        assert_eq!(fft.points(), 1024);
        assert_eq!(fft.half_len(), 513);
        assert_eq!(fft.spectrum_len(), 2048);
        assert!(RealFft::new(0, Window::Rectangular).is_err());
    }

    #[test]
    fn zero_input_gives_zero_spectrum() {
        let fft = RealFft::new(FFT_LENGTH, Window::Rectangular).unwrap();
        let spectrum = run(&fft, &vec![0; FFT_LENGTH]);
        assert!(spectrum[..2 * fft.half_len()].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn dc_input_lands_in_bin_zero() {
        for &n in &[16, 32, 1024] {
            let fft = RealFft::new(n, Window::Rectangular).unwrap();
            let spectrum = run(&fft, &vec![100; n]);
            assert!((bin(&spectrum, 0).re - 100.0 * n as f32).abs() < 1e-3);
            for i in 1..fft.half_len() {
                assert!(bin(&spectrum, i).norm() < 1e-2, "n={} bin {} leaked", n, i);
            }
        }
    }

    #[test]
    fn sine_energy_concentrates_in_its_bin() {
        let fft = RealFft::new(FFT_LENGTH, Window::Rectangular).unwrap();
        let samples = sine(FFT_LENGTH, 64, 16383.0);
        let spectrum = run(&fft, &samples);
        let reference = reference_spectrum(&samples, Window::Rectangular);

        let peak = bin(&spectrum, 64).norm_sqr();
        for i in 0..fft.half_len() {
            if i != 64 {
                assert!(bin(&spectrum, i).norm_sqr() < peak * 1e-6, "bin {}", i);
            }
        }
        let expected = reference[64].norm_sqr();
        assert!((peak - expected).abs() / expected < 1e-3);
    }

    #[test]
    fn matches_reference_dft_for_every_base() {
        for &n in &[4, 8, 16, 32, 64, 128, 512, 1024] {
            let fft = RealFft::new(n, Window::Rectangular).unwrap();
            let samples = pseudo_random(n, n as u32);
            let spectrum = run(&fft, &samples);
            let reference = reference_spectrum(&samples, Window::Rectangular);

            let scale = reference.iter().map(|c| c.norm()).fold(0.0f32, f32::max);
            for i in 0..fft.half_len() {
                let err = (bin(&spectrum, i) - reference[i]).norm();
                assert!(err <= scale * 1e-4, "n={} bin {}: {} vs {}", n, i, bin(&spectrum, i), reference[i]);
            }
        }
    }

    #[test]
    fn edge_bins_are_real() {
        let fft = RealFft::new(FFT_LENGTH, Window::Rectangular).unwrap();
        let spectrum = run(&fft, &pseudo_random(FFT_LENGTH, 7));
        assert_eq!(bin(&spectrum, 0).im, 0.0);
        assert_eq!(bin(&spectrum, FFT_LENGTH / 2).im, 0.0);
    }

    #[test]
    fn completed_spectrum_is_hermitian() {
        let fft = RealFft::new(FFT_LENGTH, Window::Rectangular).unwrap();
        let samples = pseudo_random(FFT_LENGTH, 42);
        let mut spectrum = run(&fft, &samples);
        complete_spectrum(&mut spectrum);

        for i in 1..FFT_LENGTH {
            assert_eq!(bin(&spectrum, FFT_LENGTH - i), bin(&spectrum, i).conj(), "bin {}", i);
        }

        let reference = reference_spectrum(&samples, Window::Rectangular);
        let scale = reference.iter().map(|c| c.norm()).fold(0.0f32, f32::max);
        for i in FFT_LENGTH / 2..FFT_LENGTH {
            assert!((bin(&spectrum, i) - reference[i]).norm() <= scale * 1e-4);
        }
    }

    #[test]
    fn hann_window_spreads_dc_over_three_bins() {
        let fft = RealFft::new(256, Window::Hann).unwrap();
        let spectrum = run(&fft, &vec![1000; 256]);
        assert!((bin(&spectrum, 0).re - 1000.0 * 128.0).abs() < 1.0);
        assert!((bin(&spectrum, 1).re + 1000.0 * 64.0).abs() < 1.0);
        for i in 2..fft.half_len() {
            assert!(bin(&spectrum, i).norm() < 0.5, "bin {}", i);
        }
    }
}
