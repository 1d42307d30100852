use byteorder::{ByteOrder, LittleEndian};

use super::hal::SwitchPosition;

/// Size of the persisted record in the backup domain.
pub const SCHEDULE_STATE_LEN: usize = 12;

/// `time_of_next_sample` before the first alignment.
pub const UNSET_TIME: u32 = u32::MAX;

/// Schedule record kept in the backup domain across power-downs.
///
/// Layout: three little-endian `u32` words, in field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleState {
    pub time_of_next_sample: u32,
    pub time_of_first_sample: u32,
    pub previous_switch_position: SwitchPosition,
}

impl ScheduleState {
    pub fn first_power_up() -> Self {
        Self {
            time_of_next_sample: UNSET_TIME,
            time_of_first_sample: UNSET_TIME,
            previous_switch_position: SwitchPosition::None,
        }
    }

    pub fn to_bytes(&self) -> [u8; SCHEDULE_STATE_LEN] {
        let mut bytes = [0u8; SCHEDULE_STATE_LEN];
        LittleEndian::write_u32(&mut bytes[0..4], self.time_of_next_sample);
        LittleEndian::write_u32(&mut bytes[4..8], self.time_of_first_sample);
        LittleEndian::write_u32(&mut bytes[8..12], self.previous_switch_position.code());
        bytes
    }

    pub fn from_bytes(bytes: &[u8; SCHEDULE_STATE_LEN]) -> Self {
        Self {
            time_of_next_sample: LittleEndian::read_u32(&bytes[0..4]),
            time_of_first_sample: LittleEndian::read_u32(&bytes[4..8]),
            previous_switch_position: SwitchPosition::from_code(LittleEndian::read_u32(&bytes[8..12])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_three_le_words() {
        let state = ScheduleState {
            time_of_next_sample: 0x0102_0304,
            time_of_first_sample: 0x0A0B_0C0D,
            previous_switch_position: SwitchPosition::Default,
        };
        assert_eq!(
            state.to_bytes(),
            [0x04, 0x03, 0x02, 0x01, 0x0D, 0x0C, 0x0B, 0x0A, 2, 0, 0, 0]
        );
        assert_eq!(ScheduleState::from_bytes(&state.to_bytes()), state);
    }

    #[test]
    fn garbage_switch_code_reads_as_none() {
        let mut bytes = ScheduleState::first_power_up().to_bytes();
        bytes[8] = 0xEE;
        let state = ScheduleState::from_bytes(&bytes);
        assert_eq!(state.previous_switch_position, SwitchPosition::None);
        assert_eq!(state.time_of_next_sample, UNSET_TIME);
    }
}
