use magbank::decoder::Sample;
use magbank::session::{SessionAccumulator, SessionState};

fn sample(v: f64, a: f64) -> Sample {
    Sample {
        voltage_v: v,
        current_a: a,
        dplus_v: 0.0,
        dminus_v: 0.0,
        temperature_c: 28.0,
    }
}

#[test]
fn capacity_is_monotonic_for_non_negative_current() {
    let mut acc = SessionAccumulator::default();
    let mut last = 0.0;
    for i in 0..2_000 {
        let amps = f64::from(i % 7) * 0.3;
        acc.ingest(&sample(5.0, amps), 0.01);
        let now = acc.state().capacity_mah();
        assert!(now >= last);
        last = now;
    }
}

#[test]
fn reset_is_idempotent_after_any_history() {
    let mut acc = SessionAccumulator::default();
    for i in 0..500 {
        acc.ingest(&sample(5.0 + f64::from(i) * 0.001, 1.5), 0.01);
    }
    acc.set_counting(false);

    acc.reset();
    let once = acc.state().clone();
    acc.reset();
    assert_eq!(acc.state(), &once);
    assert_eq!(once, SessionState::default());
    assert_eq!(once.capacity_mah(), 0.0);
    assert_eq!(once.energy_wh(), 0.0);
    assert_eq!(once.voltage_stats.count(), 0);
    assert!(acc.is_counting());
}

#[test]
fn average_lies_between_min_and_max() {
    let mut acc = SessionAccumulator::default();
    for v in [4.9, 5.0, 5.1, 5.05, 4.95] {
        acc.ingest(&sample(v, 1.0), 0.01);
    }
    let summary = acc.state().voltage_stats.summary();
    let (min, avg, max) = (
        summary.min.unwrap(),
        summary.avg.unwrap(),
        summary.max.unwrap(),
    );
    assert!(min <= avg && avg <= max);
    assert!((avg - 5.0).abs() < 1e-9);
    assert_eq!(summary.count, 5);
}
