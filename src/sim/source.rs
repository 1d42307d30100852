use anyhow::Result;
use std::path::Path;

use super::decode::decode_recording;

/// Default synthetic tone: 16 samples per period at 32 kHz, just under half scale.
pub const SINE_FREQUENCY_HZ: f32 = 2000.0;
pub const SINE_AMPLITUDE: i16 = 16383;

/// What the simulated microphone hears.
#[derive(Debug, Clone)]
pub enum SampleSource {
    Silence,
    Sine { frequency_hz: f32, amplitude: i16 },
    /// Looped recording.
    Recording(Vec<i16>),
}

impl SampleSource {
    /// `silence`, `sine`, `sine:<hz>` or a path to an audio file.
    pub fn parse(spec: &str, sample_rate: u32) -> Result<Self> {
        match spec {
            "silence" => Ok(SampleSource::Silence),
            "sine" => Ok(SampleSource::Sine {
                frequency_hz: SINE_FREQUENCY_HZ,
                amplitude: SINE_AMPLITUDE,
            }),
            _ => {
                if let Some(hz) = spec.strip_prefix("sine:") {
                    let frequency_hz: f32 = hz
                        .parse()
                        .map_err(|_| anyhow::anyhow!("Invalid sine frequency '{}'", hz))?;
                    return Ok(SampleSource::Sine {
                        frequency_hz,
                        amplitude: SINE_AMPLITUDE,
                    });
                }

                let recording = decode_recording(Path::new(spec))?;
                if recording.sample_rate != sample_rate {
                    log::warn!(
                        "{} is {}Hz but capture runs at {}Hz; playing samples unchanged",
                        spec,
                        recording.sample_rate,
                        sample_rate
                    );
                }
                Ok(SampleSource::Recording(recording.samples))
            }
        }
    }

    /// Fill `block` with the samples starting at absolute index `position`.
    pub fn fill(&self, block: &mut [i16], position: u64, sample_rate: u32) {
        match self {
            SampleSource::Silence => block.fill(0),
            SampleSource::Sine {
                frequency_hz,
                amplitude,
            } => {
                let cycles_per_sample = *frequency_hz as f64 / sample_rate as f64;
                for (i, sample) in block.iter_mut().enumerate() {
                    let phase = ((position + i as u64) as f64 * cycles_per_sample).fract();
                    let value = *amplitude as f64 * (2.0 * std::f64::consts::PI * phase).sin();
                    *sample = value.round() as i16;
                }
            }
            SampleSource::Recording(samples) if samples.is_empty() => block.fill(0),
            SampleSource::Recording(samples) => {
                for (i, sample) in block.iter_mut().enumerate() {
                    *sample = samples[((position + i as u64) % samples.len() as u64) as usize];
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sine_has_sixteen_sample_period() {
        let source = SampleSource::parse("sine", 32000).unwrap();
        let mut block = [0i16; 32];
        source.fill(&mut block, 0, 32000);
        assert_eq!(block[0], 0);
        assert_eq!(block[4], SINE_AMPLITUDE);
        assert_eq!(block[12], -SINE_AMPLITUDE);
        assert_eq!(&block[..16], &block[16..]);
    }

    #[test]
    fn sine_phase_continues_across_blocks() {
        let source = SampleSource::parse("sine:1000", 32000).unwrap();
        let mut whole = [0i16; 64];
        source.fill(&mut whole, 0, 32000);
        let mut tail = [0i16; 32];
        source.fill(&mut tail, 32, 32000);
        assert_eq!(&whole[32..], &tail);
    }

    #[test]
    fn recording_loops() {
        let source = SampleSource::Recording(vec![1, 2, 3]);
        let mut block = [0i16; 5];
        source.fill(&mut block, 2, 32000);
        assert_eq!(block, [3, 1, 2, 3, 1]);
    }

    #[test]
    fn bad_sine_frequency_is_an_error() {
        assert!(SampleSource::parse("sine:loud", 32000).is_err());
    }
}
