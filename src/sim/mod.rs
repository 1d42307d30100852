pub mod decode;
pub mod source;

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::device::backup::SCHEDULE_STATE_LEN;
use crate::device::handoff::{BufferHandoff, BufferSlot, DoubleBuffer};
use crate::device::hal::{
    BackupDomain, Board, CaptureSettings, ClockDivider, FileSink, Led, Microphone, StorageError,
    SwitchPosition, Timestamp,
};

use source::SampleSource;

pub const BACKUP_FILE: &str = "backup.bin";

/// Idle tick when the CPU is suspended with nothing armed to wake it.
const IDLE_TICK_US: u64 = 1000;

struct CaptureStream {
    sample_rate: u32,
    next_slot: BufferSlot,
    running: bool,
}

/// Host-side stand-in for the logger board.
///
/// Time is simulated. The backup domain lives in a small file so it survives
/// process restarts the way it survives power-downs on the device.
pub struct SimBoard {
    clock_us: u64,
    switch: SwitchPosition,
    initial_power_up: bool,
    backup: [u8; SCHEDULE_STATE_LEN],
    backup_path: PathBuf,
    output_dir: PathBuf,
    file_system: bool,
    open_file: Option<File>,
    fail_writes: bool,
    source: SampleSource,
    capture: Option<CaptureStream>,
    position: u64,
}

impl SimBoard {
    /// Boot a board whose backup domain is kept in `state_dir`.
    pub fn new(
        state_dir: &Path,
        output_dir: &Path,
        start_seconds: u32,
        switch: SwitchPosition,
        source: SampleSource,
    ) -> Result<Self> {
        std::fs::create_dir_all(state_dir)
            .with_context(|| format!("Failed to create state dir: {}", state_dir.display()))?;
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output dir: {}", output_dir.display()))?;

        let backup_path = state_dir.join(BACKUP_FILE);
        let (backup, initial_power_up) = match std::fs::read(&backup_path) {
            Ok(bytes) if bytes.len() == SCHEDULE_STATE_LEN => {
                let mut backup = [0u8; SCHEDULE_STATE_LEN];
                backup.copy_from_slice(&bytes);
                (backup, false)
            }
            Ok(bytes) => {
                log::warn!(
                    "Ignoring {} ({} bytes), treating as first power-up",
                    backup_path.display(),
                    bytes.len()
                );
                ([0u8; SCHEDULE_STATE_LEN], true)
            }
            Err(_) => ([0u8; SCHEDULE_STATE_LEN], true),
        };

        Ok(Self {
            clock_us: start_seconds as u64 * 1_000_000,
            switch,
            initial_power_up,
            backup,
            backup_path,
            output_dir: output_dir.to_path_buf(),
            file_system: false,
            open_file: None,
            fail_writes: false,
            source,
            capture: None,
            position: 0,
        })
    }

    /// Make every file open fail, as with a missing or full card.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Flush the backup domain and sleep for `milliseconds`.
    pub fn power_down(&mut self, milliseconds: u32) -> Result<()> {
        std::fs::write(&self.backup_path, self.backup)
            .with_context(|| format!("Failed to persist {}", self.backup_path.display()))?;
        self.capture = None;
        self.open_file = None;
        self.file_system = false;
        self.initial_power_up = false;
        self.clock_us += milliseconds as u64 * 1000;
        Ok(())
    }
}

impl Board for SimBoard {
    fn current_time(&self) -> Timestamp {
        Timestamp {
            seconds: (self.clock_us / 1_000_000) as u32,
            milliseconds: ((self.clock_us / 1000) % 1000) as u32,
        }
    }

    fn switch_position(&self) -> SwitchPosition {
        self.switch
    }

    fn is_initial_power_up(&self) -> bool {
        self.initial_power_up
    }

    fn set_led(&mut self, led: Led, on: bool) {
        log::trace!("LED {:?} {}", led, if on { "on" } else { "off" });
    }

    fn delay(&mut self, milliseconds: u32) {
        self.clock_us += milliseconds as u64 * 1000;
    }

    fn set_clock_divider(&mut self, divider: ClockDivider) {
        log::trace!("Clock divider {:?}", divider);
    }

    fn handle_usb(&mut self) {
        log::info!("USB/OFF position: nothing to serve in simulation");
    }
}

impl Microphone for SimBoard {
    fn configure_capture(&mut self, settings: &CaptureSettings) {
        log::debug!(
            "Microphone: {}Hz, {:?} gain, {}x oversample",
            settings.sample_rate,
            settings.gain,
            settings.oversample_rate
        );
    }

    fn begin_double_buffered_capture(&mut self, _block_len: usize) {
        self.capture = Some(CaptureStream {
            sample_rate: 0,
            next_slot: BufferSlot::Primary,
            running: false,
        });
    }

    fn start_samples(&mut self, sample_rate: u32) {
        if let Some(stream) = self.capture.as_mut() {
            stream.sample_rate = sample_rate;
            stream.running = true;
        }
    }

    fn stop_capture(&mut self) {
        self.capture = None;
    }

    fn suspend_until_interrupt(&mut self, buffers: &mut DoubleBuffer, handoff: &BufferHandoff) {
        let stream = match self.capture.as_mut() {
            Some(stream) if stream.running && stream.sample_rate > 0 => stream,
            _ => {
                self.clock_us += IDLE_TICK_US;
                return;
            }
        };

        let slot = stream.next_slot;
        let block = buffers.get_mut(slot);
        let block_len = block.len() as u64;
        self.source.fill(block, self.position, stream.sample_rate);

        self.position += block_len;
        self.clock_us += block_len * 1_000_000 / stream.sample_rate as u64;
        stream.next_slot = slot.other();
        handoff.signal(slot);
    }
}

impl BackupDomain for SimBoard {
    fn read_backup(&self) -> [u8; SCHEDULE_STATE_LEN] {
        self.backup
    }

    fn write_backup(&mut self, bytes: &[u8; SCHEDULE_STATE_LEN]) {
        self.backup = *bytes;
    }
}

impl FileSink for SimBoard {
    fn enable_file_system(&mut self) {
        self.file_system = true;
    }

    fn disable_file_system(&mut self) {
        self.file_system = false;
        self.open_file = None;
    }

    fn append_file(&mut self, filename: &str) -> Result<(), StorageError> {
        let open_error = |reason: String| StorageError::Open {
            filename: filename.to_string(),
            reason,
        };
        if !self.file_system {
            return Err(open_error("file system not enabled".into()));
        }
        if self.fail_writes {
            return Err(open_error("simulated card failure".into()));
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.output_dir.join(filename))
            .map_err(|e| open_error(e.to_string()))?;
        self.open_file = Some(file);
        Ok(())
    }

    fn write_to_file(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        let file = self
            .open_file
            .as_mut()
            .ok_or_else(|| StorageError::Write("no file open".into()))?;
        file.write_all(bytes)
            .map_err(|e| StorageError::Write(e.to_string()))
    }

    fn close_file(&mut self) -> Result<(), StorageError> {
        let file = self
            .open_file
            .take()
            .ok_or_else(|| StorageError::Close("no file open".into()))?;
        file.sync_all().map_err(|e| StorageError::Close(e.to_string()))
    }
}
