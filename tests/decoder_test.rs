use magbank::decoder::{
    FRAME_KIND_DATA, FRAME_SYNC, Framing, PACKET_LEN, RECORD_LEN, Sample, decode, decode_frame,
    decode_framed, encode_packet,
};
use magbank::error::DecodeError;

fn sample(v: f64, a: f64) -> Sample {
    Sample {
        voltage_v: v,
        current_a: a,
        dplus_v: 0.6,
        dminus_v: 0.6,
        temperature_c: 25.0,
    }
}

#[test]
fn voltage_field_is_little_endian_hundred_thousandths() {
    let mut packet = [0u8; PACKET_LEN];
    packet[0..4].copy_from_slice(&[0x40, 0x42, 0x0F, 0x00]);
    let samples = decode(&packet).unwrap();
    assert_eq!(samples[0].voltage_v, 10.0);
    assert_eq!(samples[1].voltage_v, 0.0);
}

#[test]
fn every_64_byte_input_decodes() {
    for fill in [0x00u8, 0x7F, 0xA5, 0xFF] {
        let samples = decode(&[fill; PACKET_LEN]).unwrap();
        for s in samples {
            assert!(s.voltage_v.is_finite() && s.voltage_v >= 0.0);
            assert!(s.current_a.is_finite() && s.current_a >= 0.0);
        }
    }
}

#[test]
fn other_lengths_are_rejected() {
    for len in [0usize, 1, 60, 63, 65, 128] {
        let bytes = vec![0u8; len];
        assert_eq!(
            decode(&bytes),
            Err(DecodeError::LengthMismatch {
                expected: PACKET_LEN,
                actual: len
            })
        );
        assert!(decode_frame(&bytes).is_err());
    }
}

#[test]
fn framing_selects_record_offset() {
    let samples = [sample(5.0, 1.0), sample(5.1, 1.1), sample(5.2, 1.2), sample(5.3, 1.3)];
    let bare = encode_packet(&samples);
    let decoded = decode_framed(&bare, Framing::Bare).unwrap().unwrap();
    assert_eq!(decoded, samples);

    let mut frame = [0u8; PACKET_LEN];
    frame[0] = FRAME_SYNC;
    frame[1] = FRAME_KIND_DATA;
    frame[2..2 + 4 * RECORD_LEN].copy_from_slice(&bare[..4 * RECORD_LEN]);
    let decoded = decode_framed(&frame, Framing::Fnb58).unwrap().unwrap();
    assert_eq!(decoded, samples);
}

#[test]
fn power_is_voltage_times_current() {
    assert!((sample(9.0, 2.0).power_w() - 18.0).abs() < 1e-12);
}
