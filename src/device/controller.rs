use crate::dsp::fft::RealFft;
use crate::dsp::power::{AccumulationPolicy, PowerAccumulator};
use crate::dsp::tables::{FftError, Window};
use crate::record;

use super::backup::ScheduleState;
use super::handoff::{BufferHandoff, DoubleBuffer};
use super::hal::{CaptureSettings, ClockDivider, Hal, Led, StorageError, SwitchPosition, Timestamp};
use super::schedule::{align_to_interval, milliseconds_until, record_filename};

pub const DEFAULT_WAIT_INTERVAL_MS: u32 = 1000;
pub const SHORT_WAIT_INTERVAL_MS: u32 = 100;
/// Beyond this the controller polls again instead of waiting in place.
pub const COARSE_POLL_THRESHOLD_MS: i64 = 1000;

const VERY_SHORT_LED_FLASH_MS: u32 = 1;
const LONG_LED_FLASH_MS: u32 = 500;

/// Everything the controller needs to know about one deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionSettings {
    pub capture: CaptureSettings,
    pub block_len: usize,
    pub buffers_to_collect: u32,
    /// Seconds between accumulation cycles.
    pub sample_interval: u32,
    /// Wait after enabling the microphone before the first sample.
    pub settle_delay_ms: u32,
    pub normalizing_constant: f32,
    pub window: Window,
    pub policy: AccumulationPolicy,
    pub write_file: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    WaitingForAlignment,
    Capturing,
    Finalizing,
    Persisting,
}

/// What one wake did before powering down.
#[derive(Debug, Clone, PartialEq)]
pub enum WakeKind {
    Usb,
    Inactive,
    Realigned { time_of_next_sample: u32 },
    Waiting { remaining_ms: i64 },
    Completed { filename: Option<String> },
    WriteFailed { filename: String, error: StorageError },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WakeOutcome {
    pub kind: WakeKind,
    pub state: ScheduleState,
    /// How long to power down before the next wake.
    pub sleep_ms: u32,
}

pub struct Controller {
    settings: AcquisitionSettings,
    fft: RealFft,
    spectrum: Vec<f32>,
    accumulator: PowerAccumulator,
    buffers: DoubleBuffer,
    handoff: BufferHandoff,
    phase: Phase,
}

impl Controller {
    pub fn new(settings: AcquisitionSettings) -> Result<Self, FftError> {
        let fft = RealFft::new(settings.block_len, settings.window)?;
        let spectrum = vec![0.0; fft.spectrum_len()];
        let accumulator = PowerAccumulator::new(fft.half_len(), settings.policy);
        let buffers = DoubleBuffer::new(fft.points());

        log::debug!(
            "Controller ready: {}-point FFT, {} bins, {:?} accumulation",
            fft.points(),
            accumulator.bins(),
            accumulator.policy()
        );

        Ok(Self {
            settings,
            fft,
            spectrum,
            accumulator,
            buffers,
            handoff: BufferHandoff::new(),
            phase: Phase::Idle,
        })
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Normalized power of the last completed cycle.
    pub fn power(&self) -> &[f32] {
        self.accumulator.power()
    }

    /// Run one wake of the schedule and persist state for the next one.
    ///
    /// On hardware the caller powers down for `sleep_ms` and the device boots
    /// back into this function.
    pub fn wake<H: Hal>(&mut self, hal: &mut H) -> WakeOutcome {
        let now = hal.current_time();

        let mut state = if hal.is_initial_power_up() {
            let state = ScheduleState::first_power_up();
            hal.write_backup(&state.to_bytes());
            state
        } else {
            ScheduleState::from_bytes(&hal.read_backup())
        };

        let switch = hal.switch_position();
        let kind = self.step(hal, &mut state, switch, now);

        let sleep_ms = match kind {
            WakeKind::Usb | WakeKind::Inactive => SHORT_WAIT_INTERVAL_MS,
            _ => DEFAULT_WAIT_INTERVAL_MS,
        };

        state.previous_switch_position = switch;
        hal.write_backup(&state.to_bytes());
        self.enter(Phase::Idle);

        WakeOutcome {
            kind,
            state,
            sleep_ms,
        }
    }

    fn step<H: Hal>(
        &mut self,
        hal: &mut H,
        state: &mut ScheduleState,
        switch: SwitchPosition,
        now: Timestamp,
    ) -> WakeKind {
        match switch {
            SwitchPosition::Usb => {
                log::debug!("Switch in USB/OFF, handing over to USB handler");
                hal.handle_usb();
                return WakeKind::Usb;
            }
            SwitchPosition::None => return WakeKind::Inactive,
            SwitchPosition::Custom | SwitchPosition::Default => {}
        }

        if switch != state.previous_switch_position {
            state.time_of_next_sample = align_to_interval(now.seconds, self.settings.sample_interval);
            state.time_of_first_sample = state.time_of_next_sample;
            log::info!(
                "Switch moved {:?} -> {:?}, first sample at {}",
                state.previous_switch_position,
                switch,
                state.time_of_next_sample
            );
            return WakeKind::Realigned {
                time_of_next_sample: state.time_of_next_sample,
            };
        }

        self.enter(Phase::WaitingForAlignment);
        let remaining = milliseconds_until(state.time_of_next_sample, now);
        if remaining > COARSE_POLL_THRESHOLD_MS {
            flash(hal, Led::Green, VERY_SHORT_LED_FLASH_MS);
            return WakeKind::Waiting {
                remaining_ms: remaining,
            };
        }

        hal.set_clock_divider(ClockDivider::Div4);
        if remaining > 0 {
            hal.delay(remaining as u32);
        }

        self.enter(Phase::Capturing);
        self.capture(hal);

        self.enter(Phase::Finalizing);
        hal.set_clock_divider(ClockDivider::Div1);
        self.accumulator
            .finalize(self.settings.buffers_to_collect, self.settings.normalizing_constant);

        self.enter(Phase::Persisting);
        self.persist(hal, state)
    }

    fn capture<H: Hal>(&mut self, hal: &mut H) {
        let total = self.settings.buffers_to_collect;

        self.handoff.reset();
        hal.configure_capture(&self.settings.capture);
        hal.begin_double_buffered_capture(self.buffers.block_len());
        hal.delay(self.settings.settle_delay_ms);
        hal.start_samples(self.settings.capture.sample_rate);

        let mut collected = 0;
        loop {
            if let Some(slot) = self.handoff.take() {
                if collected + 1 == total {
                    hal.stop_capture();
                }

                hal.set_led(Led::Green, true);
                self.fft.transform(self.buffers.get(slot), &mut self.spectrum);
                hal.set_led(Led::Green, false);

                self.accumulator.accumulate(&self.spectrum, collected == 0);
                collected += 1;
            }

            if collected == total {
                break;
            }

            if !self.handoff.is_ready() {
                hal.suspend_until_interrupt(&mut self.buffers, &self.handoff);
            }
        }

        log::debug!("Captured {} buffers", self.accumulator.blocks());
    }

    fn persist<H: Hal>(&mut self, hal: &mut H, state: &mut ScheduleState) -> WakeKind {
        let interval = self.settings.sample_interval;

        if !self.settings.write_file {
            state.time_of_next_sample = state.time_of_next_sample.saturating_add(interval);
            return WakeKind::Completed { filename: None };
        }

        let filename = record_filename(state.time_of_first_sample);

        hal.set_led(Led::Red, true);
        hal.enable_file_system();
        let result = self.write_record(hal, &filename, state.time_of_next_sample);
        hal.disable_file_system();
        hal.set_led(Led::Red, false);

        match result {
            Ok(()) => {
                log::info!("Appended record for {} to {}", state.time_of_next_sample, filename);
                state.time_of_next_sample = state.time_of_next_sample.saturating_add(interval);
                WakeKind::Completed {
                    filename: Some(filename),
                }
            }
            Err(error) => {
                log::warn!("Skipping cycle at {}: {}", state.time_of_next_sample, error);
                flash_error(hal);
                state.time_of_first_sample = state.time_of_next_sample.saturating_add(interval);
                WakeKind::WriteFailed { filename, error }
            }
        }
    }

    fn write_record<H: Hal>(
        &self,
        hal: &mut H,
        filename: &str,
        time_of_next_sample: u32,
    ) -> Result<(), StorageError> {
        hal.append_file(filename)?;
        hal.write_to_file(&record::encode_header(time_of_next_sample))?;
        hal.write_to_file(&record::encode_power(self.accumulator.power()))?;
        hal.close_file()
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            log::debug!("{:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }
}

fn flash<H: Hal>(hal: &mut H, led: Led, milliseconds: u32) {
    hal.set_led(led, true);
    hal.delay(milliseconds);
    hal.set_led(led, false);
}

fn flash_error<H: Hal>(hal: &mut H) {
    hal.set_led(Led::Both, false);
    hal.delay(LONG_LED_FLASH_MS);
    flash(hal, Led::Both, LONG_LED_FLASH_MS);
}
