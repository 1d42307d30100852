use rustfft::{num_complex::Complex, FftPlanner};

use super::tables::{FftTables, Window};

/// Full complex spectrum of `samples` computed with rustfft.
///
/// Used to check the table-driven engine; weights match [`FftTables`] so both
/// paths see the same windowed input.
pub fn reference_spectrum(samples: &[i16], window: Window) -> Vec<Complex<f32>> {
    let weights = FftTables::new(samples.len(), window)
        .map(|t| t.coefficients)
        .unwrap_or_else(|_| vec![1.0; samples.len()]);

    let mut buffer: Vec<Complex<f32>> = samples
        .iter()
        .zip(weights.iter())
        .map(|(&s, &w)| Complex::new(s as f32 * w, 0.0))
        .collect();

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(samples.len());
    fft.process(&mut buffer);
    buffer
}
