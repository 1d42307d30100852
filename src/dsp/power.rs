use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};

use super::fft::bin;

/// How successive spectra are combined over one accumulation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccumulationPolicy {
    /// Sum `re² + im²` of every block.
    #[default]
    Power,
    /// Sum the complex bins and square once in `finalize`.
    Complex,
}

enum Running {
    Power(Vec<f32>),
    Complex(Vec<Complex<f32>>),
}

/// Running per-bin power over the half-spectrum.
pub struct PowerAccumulator {
    running: Running,
    power: Vec<f32>,
    blocks: u32,
}

impl PowerAccumulator {
    pub fn new(bins: usize, policy: AccumulationPolicy) -> Self {
        let running = match policy {
            AccumulationPolicy::Power => Running::Power(vec![0.0; bins]),
            AccumulationPolicy::Complex => Running::Complex(vec![Complex::new(0.0, 0.0); bins]),
        };
        Self {
            running,
            power: vec![0.0; bins],
            blocks: 0,
        }
    }

    pub fn policy(&self) -> AccumulationPolicy {
        match self.running {
            Running::Power(_) => AccumulationPolicy::Power,
            Running::Complex(_) => AccumulationPolicy::Complex,
        }
    }

    pub fn bins(&self) -> usize {
        self.power.len()
    }

    pub fn blocks(&self) -> u32 {
        self.blocks
    }

    /// Fold one interleaved half-spectrum in; `is_first` overwrites instead of adding.
    pub fn accumulate(&mut self, spectrum: &[f32], is_first: bool) {
        if is_first {
            self.blocks = 0;
        }

        match &mut self.running {
            Running::Power(sums) => {
                for (i, sum) in sums.iter_mut().enumerate() {
                    let p = bin(spectrum, i).norm_sqr();
                    if is_first {
                        *sum = p;
                    } else {
                        *sum += p;
                    }
                }
            }
            Running::Complex(sums) => {
                for (i, sum) in sums.iter_mut().enumerate() {
                    let z = bin(spectrum, i);
                    if is_first {
                        *sum = z;
                    } else {
                        *sum += z;
                    }
                }
            }
        }

        self.blocks += 1;
    }

    /// Scale the running sums into mean power over `blocks` blocks.
    pub fn finalize(&mut self, blocks: u32, normalizing_constant: f32) -> &[f32] {
        let m = blocks.max(1) as f32;
        let k = normalizing_constant;

        match &self.running {
            Running::Power(sums) => {
                let scale = 4.0 / k / k / m;
                for (out, &sum) in self.power.iter_mut().zip(sums.iter()) {
                    *out = sum * scale;
                }
            }
            Running::Complex(sums) => {
                let scale = 4.0 / k / k / m / m;
                for (out, sum) in self.power.iter_mut().zip(sums.iter()) {
                    *out = sum.norm_sqr() * scale;
                }
            }
        }

        &self.power
    }

    /// Output of the last `finalize`.
    pub fn power(&self) -> &[f32] {
        &self.power
    }
}

/// Index and value of the strongest bin; `None` for an empty spectrum.
pub fn peak_bin(power: &[f32]) -> Option<(usize, f32)> {
    power
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
}
