use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

use crate::dsp::power::peak_bin;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{len} bytes is not a whole number of {record_len}-byte records")]
    Truncated { len: usize, record_len: usize },
}

/// One accumulation cycle as stored in a `.BIN` file.
///
/// On disk: a little-endian `u32` sample time followed by one `f32` of
/// normalized power per bin. Successive cycles of a session append to the
/// same file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub time_of_next_sample: u32,
    pub power: Vec<f32>,
}

impl Record {
    pub fn peak_bin(&self) -> Option<(usize, f32)> {
        peak_bin(&self.power)
    }

    pub fn total_power(&self) -> f32 {
        self.power.iter().sum()
    }
}

pub fn record_len(bins: usize) -> usize {
    4 + 4 * bins
}

pub fn encode_header(time_of_next_sample: u32) -> [u8; 4] {
    let mut bytes = [0u8; 4];
    LittleEndian::write_u32(&mut bytes, time_of_next_sample);
    bytes
}

pub fn encode_power(power: &[f32]) -> Vec<u8> {
    let mut bytes = vec![0u8; 4 * power.len()];
    LittleEndian::write_f32_into(power, &mut bytes);
    bytes
}

pub fn decode_records(bytes: &[u8], bins: usize) -> Result<Vec<Record>, RecordError> {
    let len = record_len(bins);
    if bytes.len() % len != 0 {
        return Err(RecordError::Truncated {
            len: bytes.len(),
            record_len: len,
        });
    }

    Ok(bytes
        .chunks_exact(len)
        .map(|chunk| {
            let mut power = vec![0.0f32; bins];
            LittleEndian::read_f32_into(&chunk[4..], &mut power);
            Record {
                time_of_next_sample: LittleEndian::read_u32(&chunk[..4]),
                power,
            }
        })
        .collect())
}

pub fn read_records(path: &Path, bins: usize) -> Result<Vec<Record>, RecordError> {
    let bytes = std::fs::read(path).map_err(|source| RecordError::Io {
        path: path.display().to_string(),
        source,
    })?;
    decode_records(&bytes, bins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appended_records_decode_in_order() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&encode_header(60));
        bytes.extend_from_slice(&encode_power(&[1.0, 2.5, 0.25]));
        bytes.extend_from_slice(&encode_header(120));
        bytes.extend_from_slice(&encode_power(&[0.0, 0.5, 8.0]));

        assert_eq!(&bytes[..4], &[60, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &1.0f32.to_le_bytes());

        let records = decode_records(&bytes, 3).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].time_of_next_sample, 120);
        assert_eq!(records[1].peak_bin(), Some((2, 8.0)));
        assert_eq!(records[0].total_power(), 3.75);
    }

    #[test]
    fn partial_record_is_rejected() {
        let mut bytes = encode_header(60).to_vec();
        bytes.extend_from_slice(&encode_power(&[1.0]));
        let err = decode_records(&bytes, 2).unwrap_err();
        assert!(matches!(err, RecordError::Truncated { len: 8, record_len: 12 }));
    }

    #[test]
    fn read_records_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_records(&dir.path().join("missing.BIN"), 513).unwrap_err();
        assert!(err.to_string().contains("missing.BIN"));
    }
}
