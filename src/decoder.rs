//! Packet decoding for the FNB58 power-path tester
//!
//! A transfer is 64 bytes and carries four consecutive 15-byte sample
//! records. Each record is little-endian fixed point:
//!
//! | offset | width | field | scale |
//! |---|---|---|---|
//! | 0 | u32 | VBUS | 1e-5 V |
//! | 4 | u32 | IBUS | 1e-5 A |
//! | 8 | u16 | D+ | 1e-3 V |
//! | 10 | u16 | D− | 1e-3 V |
//! | 12 | u8 | padding | |
//! | 13 | u16 | temperature | 0.1 °C |
//!
//! [`decode`] expects the records at offsets 0/15/30/45. Frames read off the
//! wire carry a two byte `AA 04` header in front of the records; those go
//! through [`decode_frame`].

use crate::error::DecodeError;
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

/// Size of one USB transfer
pub const PACKET_LEN: usize = 64;
/// Size of one sample record
pub const RECORD_LEN: usize = 15;
/// Samples per transfer
pub const SAMPLES_PER_PACKET: usize = 4;

/// First byte of every device frame
pub const FRAME_SYNC: u8 = 0xAA;
/// Second byte of a frame that carries sample records
pub const FRAME_KIND_DATA: u8 = 0x04;
/// Records start right after the two header bytes in a device frame
const FRAME_RECORDS_OFFSET: usize = 2;

const VOLTAGE_SCALE: f64 = 100_000.0;
const CURRENT_SCALE: f64 = 100_000.0;
const DATA_LINE_SCALE: f64 = 1_000.0;
const TEMPERATURE_SCALE: f64 = 10.0;

/// One decoded measurement instant
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sample {
    pub voltage_v: f64,
    pub current_a: f64,
    pub dplus_v: f64,
    pub dminus_v: f64,
    pub temperature_c: f64,
}

impl Sample {
    /// Instantaneous power in watts
    pub fn power_w(&self) -> f64 {
        self.voltage_v * self.current_a
    }
}

/// How a source lays out its transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Records start at byte 0
    Bare,
    /// `AA <kind>` header, records start at byte 2
    Fnb58,
}

/// Decode a bare 64-byte packet into four samples, in chronological order.
pub fn decode(bytes: &[u8]) -> Result<[Sample; SAMPLES_PER_PACKET], DecodeError> {
    check_len(bytes)?;
    Ok(decode_records(bytes, 0))
}

/// Decode a device frame.
///
/// Returns `Ok(None)` for well-formed frames that carry no samples (command
/// acknowledgements and the like).
pub fn decode_frame(bytes: &[u8]) -> Result<Option<[Sample; SAMPLES_PER_PACKET]>, DecodeError> {
    check_len(bytes)?;
    if bytes[0] != FRAME_SYNC {
        return Err(DecodeError::BadHeader { found: bytes[0] });
    }
    if bytes[1] != FRAME_KIND_DATA {
        return Ok(None);
    }
    Ok(Some(decode_records(bytes, FRAME_RECORDS_OFFSET)))
}

/// Decode a transfer according to the source's framing
pub fn decode_framed(
    bytes: &[u8],
    framing: Framing,
) -> Result<Option<[Sample; SAMPLES_PER_PACKET]>, DecodeError> {
    match framing {
        Framing::Bare => decode(bytes).map(Some),
        Framing::Fnb58 => decode_frame(bytes),
    }
}

/// Decode a single 15-byte record
pub fn decode_record(record: &[u8; RECORD_LEN]) -> Sample {
    let mut buf = &record[..];
    let voltage_raw = buf.get_u32_le();
    let current_raw = buf.get_u32_le();
    let dplus_raw = buf.get_u16_le();
    let dminus_raw = buf.get_u16_le();
    buf.advance(1);
    let temperature_raw = buf.get_u16_le();

    Sample {
        voltage_v: f64::from(voltage_raw) / VOLTAGE_SCALE,
        current_a: f64::from(current_raw) / CURRENT_SCALE,
        dplus_v: f64::from(dplus_raw) / DATA_LINE_SCALE,
        dminus_v: f64::from(dminus_raw) / DATA_LINE_SCALE,
        temperature_c: f64::from(temperature_raw) / TEMPERATURE_SCALE,
    }
}

/// Encode a sample into the record layout.
///
/// Values are rounded to the wire resolution and saturate at the field
/// bounds; negative inputs encode as zero.
pub fn encode_record(sample: &Sample) -> [u8; RECORD_LEN] {
    let mut out = [0u8; RECORD_LEN];
    let mut buf = &mut out[..];
    buf.put_u32_le(to_raw_u32(sample.voltage_v, VOLTAGE_SCALE));
    buf.put_u32_le(to_raw_u32(sample.current_a, CURRENT_SCALE));
    buf.put_u16_le(to_raw_u16(sample.dplus_v, DATA_LINE_SCALE));
    buf.put_u16_le(to_raw_u16(sample.dminus_v, DATA_LINE_SCALE));
    buf.put_u8(0);
    buf.put_u16_le(to_raw_u16(sample.temperature_c, TEMPERATURE_SCALE));
    out
}

/// Encode four samples as a bare packet (records at 0/15/30/45)
pub fn encode_packet(samples: &[Sample; SAMPLES_PER_PACKET]) -> [u8; PACKET_LEN] {
    let mut out = [0u8; PACKET_LEN];
    for (i, sample) in samples.iter().enumerate() {
        let start = i * RECORD_LEN;
        out[start..start + RECORD_LEN].copy_from_slice(&encode_record(sample));
    }
    out
}

fn check_len(bytes: &[u8]) -> Result<(), DecodeError> {
    if bytes.len() != PACKET_LEN {
        return Err(DecodeError::LengthMismatch {
            expected: PACKET_LEN,
            actual: bytes.len(),
        });
    }
    Ok(())
}

// Caller guarantees base + 4 * RECORD_LEN <= bytes.len()
fn decode_records(bytes: &[u8], base: usize) -> [Sample; SAMPLES_PER_PACKET] {
    std::array::from_fn(|i| {
        let start = base + i * RECORD_LEN;
        let mut record = [0u8; RECORD_LEN];
        record.copy_from_slice(&bytes[start..start + RECORD_LEN]);
        decode_record(&record)
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_raw_u32(value: f64, scale: f64) -> u32 {
    // float-to-int `as` saturates and maps NaN to 0
    (value * scale).round() as u32
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_raw_u16(value: f64, scale: f64) -> u16 {
    (value * scale).round() as u16
}
