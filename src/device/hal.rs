use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::backup::SCHEDULE_STATE_LEN;
use super::handoff::{BufferHandoff, DoubleBuffer};

/// Position of the mode switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwitchPosition {
    /// USB/OFF: the host owns the device.
    Usb,
    Custom,
    Default,
    /// Between detents, or never read.
    None,
}

impl SwitchPosition {
    pub fn code(self) -> u32 {
        match self {
            SwitchPosition::Usb => 0,
            SwitchPosition::Custom => 1,
            SwitchPosition::Default => 2,
            SwitchPosition::None => 3,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            0 => SwitchPosition::Usb,
            1 => SwitchPosition::Custom,
            2 => SwitchPosition::Default,
            _ => SwitchPosition::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Led {
    Red,
    Green,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockDivider {
    Div1,
    Div4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Gain {
    Low,
    LowMedium,
    #[default]
    Medium,
    MediumHigh,
    High,
}

/// Microphone/ADC configuration applied before each capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSettings {
    pub sample_rate: u32,
    pub gain: Gain,
    pub clock_divider: u8,
    pub acquisition_cycles: u8,
    pub oversample_rate: u8,
}

/// Wall-clock time as read from the RTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub seconds: u32,
    pub milliseconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("failed to open {filename}: {reason}")]
    Open { filename: String, reason: String },
    #[error("failed to write record: {0}")]
    Write(String),
    #[error("failed to close file: {0}")]
    Close(String),
}

pub trait Board {
    fn current_time(&self) -> Timestamp;
    fn switch_position(&self) -> SwitchPosition;
    /// True only on the first boot after the backup domain lost power.
    fn is_initial_power_up(&self) -> bool;
    fn set_led(&mut self, led: Led, on: bool);
    /// Busy/low-power wait; returns after `milliseconds`.
    fn delay(&mut self, milliseconds: u32);
    fn set_clock_divider(&mut self, divider: ClockDivider);
    /// Hand over to the USB/host interaction handler until it releases the device.
    fn handle_usb(&mut self);
}

pub trait Microphone {
    fn configure_capture(&mut self, settings: &CaptureSettings);
    /// Arm ping-pong DMA over two buffers of `block_len` samples.
    fn begin_double_buffered_capture(&mut self, block_len: usize);
    fn start_samples(&mut self, sample_rate: u32);
    fn stop_capture(&mut self);
    /// Suspend the CPU until the next interrupt.
    ///
    /// DMA writes into `buffers` only while suspended here, and the interrupt
    /// handler reports each filled buffer through `handoff`.
    fn suspend_until_interrupt(&mut self, buffers: &mut DoubleBuffer, handoff: &BufferHandoff);
}

/// Memory that survives power-down but not a full reset.
pub trait BackupDomain {
    fn read_backup(&self) -> [u8; SCHEDULE_STATE_LEN];
    fn write_backup(&mut self, bytes: &[u8; SCHEDULE_STATE_LEN]);
}

pub trait FileSink {
    fn enable_file_system(&mut self);
    fn disable_file_system(&mut self);
    /// Open `filename` for appending, creating it if needed.
    fn append_file(&mut self, filename: &str) -> Result<(), StorageError>;
    fn write_to_file(&mut self, bytes: &[u8]) -> Result<(), StorageError>;
    fn close_file(&mut self) -> Result<(), StorageError>;
}

/// Everything the controller needs from the board.
///
/// Each method is a thin I/O call on real hardware; `crate::sim::SimBoard`
/// implements the same traits on the host.
pub trait Hal: Board + Microphone + BackupDomain + FileSink {}

impl<T: Board + Microphone + BackupDomain + FileSink> Hal for T {}
