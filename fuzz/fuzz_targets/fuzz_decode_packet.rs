#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary lengths must be rejected, never panic
    let _ = magbank::decoder::decode(data);
    let _ = magbank::decoder::decode_frame(data);

    // Every 64-byte input decodes to finite, non-negative samples
    if let Ok(samples) = magbank::decoder::decode(data) {
        for s in samples {
            assert!(s.voltage_v.is_finite() && s.voltage_v >= 0.0);
            assert!(s.current_a.is_finite() && s.current_a >= 0.0);
            assert!(s.temperature_c.is_finite());
        }
    }
});
