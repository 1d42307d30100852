use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::device::controller::AcquisitionSettings;
use crate::device::hal::{CaptureSettings, Gain};
use crate::dsp::fft::FFT_LENGTH;
use crate::dsp::power::AccumulationPolicy;
use crate::dsp::tables::Window;

/// Full-scale amplitude of one ADC sample before oversampling.
const ADC_HALF_SCALE: u32 = 1 << 11;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub fft: FftConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct AcquisitionConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_oversample_rate")]
    pub oversample_rate: u8,
    #[serde(default = "default_clock_divider")]
    pub clock_divider: u8,
    #[serde(default = "default_acquisition_cycles")]
    pub acquisition_cycles: u8,
    #[serde(default)]
    pub gain: Gain,
    #[serde(default = "default_buffers_to_collect")]
    pub buffers_to_collect: u32,
    /// Seconds between accumulation cycles.
    #[serde(default = "default_sample_interval")]
    pub sample_interval: u32,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct FftConfig {
    #[serde(default)]
    pub window: Window,
    #[serde(default)]
    pub policy: AccumulationPolicy,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_write_file")]
    pub write_file: bool,
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            oversample_rate: default_oversample_rate(),
            clock_divider: default_clock_divider(),
            acquisition_cycles: default_acquisition_cycles(),
            gain: Gain::default(),
            buffers_to_collect: default_buffers_to_collect(),
            sample_interval: default_sample_interval(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            write_file: default_write_file(),
            directory: default_directory(),
        }
    }
}

fn default_sample_rate() -> u32 { 32000 }
fn default_oversample_rate() -> u8 { 8 }
fn default_clock_divider() -> u8 { 1 }
fn default_acquisition_cycles() -> u8 { 16 }
fn default_buffers_to_collect() -> u32 { 31 }
fn default_sample_interval() -> u32 { 60 }
fn default_settle_delay_ms() -> u32 { 30 }
fn default_write_file() -> bool { true }
fn default_directory() -> PathBuf { PathBuf::from(".") }

impl AcquisitionConfig {
    /// Amplitude scale matching the microphone's oversampling.
    pub fn normalizing_constant(&self) -> f32 {
        (ADC_HALF_SCALE * self.oversample_rate as u32) as f32
    }
}

impl Config {
    pub fn acquisition_settings(&self) -> Result<AcquisitionSettings> {
        let acq = &self.acquisition;
        ensure!(acq.sample_rate > 0, "acquisition.sample_rate must be positive");
        ensure!(acq.oversample_rate > 0, "acquisition.oversample_rate must be positive");
        ensure!(acq.buffers_to_collect > 0, "acquisition.buffers_to_collect must be at least 1");
        ensure!(acq.sample_interval > 0, "acquisition.sample_interval must be at least 1 second");

        Ok(AcquisitionSettings {
            capture: CaptureSettings {
                sample_rate: acq.sample_rate,
                gain: acq.gain,
                clock_divider: acq.clock_divider,
                acquisition_cycles: acq.acquisition_cycles,
                oversample_rate: acq.oversample_rate,
            },
            block_len: FFT_LENGTH,
            buffers_to_collect: acq.buffers_to_collect,
            sample_interval: acq.sample_interval,
            settle_delay_ms: acq.settle_delay_ms,
            normalizing_constant: acq.normalizing_constant(),
            window: self.fft.window,
            policy: self.fft.policy,
            write_file: self.output.write_file,
        })
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// `spectro-logger.toml` in the working directory, then the user config dir.
pub fn find_config() -> Option<PathBuf> {
    let local = PathBuf::from("spectro-logger.toml");
    if local.exists() {
        return Some(local);
    }
    let global = dirs::config_dir()?.join("spectro-logger").join("config.toml");
    global.exists().then_some(global)
}
