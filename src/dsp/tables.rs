use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FftError {
    #[error("FFT length {0} is not a power of two >= 4")]
    InvalidLength(usize),
}

/// Per-sample weighting folded into the coefficient table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Window {
    #[default]
    Rectangular,
    Hann,
}

/// Size of the first butterfly applied to the raw samples.
///
/// Every later stage is radix-4, so the base has to soak up the odd factor of
/// two when `log2(length)` is odd.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseRadix {
    Two,
    Four,
}

impl BaseRadix {
    pub fn points(self) -> usize {
        match self {
            BaseRadix::Two => 2,
            BaseRadix::Four => 4,
        }
    }
}

/// Precomputed tables for one fixed transform length.
#[derive(Debug, Clone)]
pub struct FftTables {
    pub length: usize,
    pub base: BaseRadix,
    /// Sample residue feeding each base group, in output order (base-4 digit reversal).
    pub reversal: Vec<usize>,
    /// `exp(-2πi·m/length)` for `m` in `0..length/2`.
    pub twiddles: Vec<Complex<f32>>,
    /// Weight applied to each input sample before the first butterfly.
    pub coefficients: Vec<f32>,
}

impl FftTables {
    pub fn new(length: usize, window: Window) -> Result<Self, FftError> {
        if length < 4 || !length.is_power_of_two() {
            return Err(FftError::InvalidLength(length));
        }

        let log2 = length.trailing_zeros();
        let base = if log2 % 2 == 0 { BaseRadix::Four } else { BaseRadix::Two };

        let groups = length / base.points();
        let digits = groups.trailing_zeros() / 2;
        let reversal = (0..groups).map(|t| digit_reverse(t, digits)).collect();

        let twiddles = (0..length / 2)
            .map(|m| {
                let angle = 2.0 * std::f64::consts::PI * m as f64 / length as f64;
                Complex::new(angle.cos() as f32, -angle.sin() as f32)
            })
            .collect();

        Ok(Self {
            length,
            base,
            reversal,
            twiddles,
            coefficients: coefficients(length, window),
        })
    }
}

fn digit_reverse(mut value: usize, digits: u32) -> usize {
    let mut reversed = 0;
    for _ in 0..digits {
        reversed = (reversed << 2) | (value & 3);
        value >>= 2;
    }
    reversed
}

fn coefficients(length: usize, window: Window) -> Vec<f32> {
    match window {
        Window::Rectangular => vec![1.0; length],
        Window::Hann => (0..length)
            .map(|i| {
                let s = (std::f64::consts::PI * i as f64 / length as f64).sin();
                (s * s) as f32
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_lengths() {
        assert_eq!(FftTables::new(0, Window::Rectangular).unwrap_err(), FftError::InvalidLength(0));
        assert!(FftTables::new(2, Window::Rectangular).is_err());
        assert!(FftTables::new(48, Window::Rectangular).is_err());
    }

    #[test]
    fn base_radix_follows_log2_parity() {
        assert_eq!(FftTables::new(1024, Window::Rectangular).unwrap().base, BaseRadix::Four);
        assert_eq!(FftTables::new(512, Window::Rectangular).unwrap().base, BaseRadix::Two);
    }

    #[test]
    fn reversal_is_a_permutation() {
        let tables = FftTables::new(1024, Window::Rectangular).unwrap();
        let mut seen = tables.reversal.clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..256).collect::<Vec<_>>());
        assert_eq!(&tables.reversal[..5], &[0, 64, 128, 192, 16]);
    }

    #[test]
    fn hann_coefficients_taper_to_zero() {
        let tables = FftTables::new(64, Window::Hann).unwrap();
        assert_eq!(tables.coefficients[0], 0.0);
        assert!((tables.coefficients[32] - 1.0).abs() < 1e-6);
    }
}
