use magbank::rates::{CounterStatus, RateComputer};
use std::time::{Duration, Instant};

#[test]
fn counter_reset_never_yields_negative_rate() {
    let t0 = Instant::now();
    let mut rc = RateComputer::new();
    rc.observe("usb0/rx_packets", 10_000, t0);
    rc.observe("usb0/rx_packets", 12_000, t0 + Duration::from_secs(1));

    let after_reset = rc.observe("usb0/rx_packets", 50, t0 + Duration::from_secs(2));
    assert_eq!(after_reset.rate_per_sec, 0.0);
    assert_eq!(after_reset.discontinuities, 1);
    assert_eq!(after_reset.total, 2_000);

    let resumed = rc.observe("usb0/rx_packets", 550, t0 + Duration::from_secs(3));
    assert!((resumed.rate_per_sec - 500.0).abs() < 1e-9);
    assert_eq!(resumed.total, 2_500);
}

#[test]
fn totals_never_decrease() {
    let t0 = Instant::now();
    let mut rc = RateComputer::new();
    let values = [5u64, 9, 3, 3, 20, 1, 40];
    let mut last_total = 0;
    for (i, v) in values.iter().enumerate() {
        let snap = rc.observe("c", *v, t0 + Duration::from_millis(100 * i as u64));
        assert!(snap.rate_per_sec >= 0.0);
        assert!(snap.total >= last_total);
        last_total = snap.total;
    }
}

#[test]
fn disconnected_is_distinct_from_zero_rate() {
    let t0 = Instant::now();
    let mut rc = RateComputer::new();
    rc.observe("eth0/tx_bytes", 100, t0);
    let idle = rc.observe("eth0/tx_bytes", 100, t0 + Duration::from_secs(1));
    assert_eq!(idle.status, CounterStatus::Live);
    assert_eq!(idle.rate_per_sec, 0.0);

    let gone = rc.mark_unreadable("eth0/tx_bytes");
    assert_eq!(gone.status, CounterStatus::Disconnected);
    assert_eq!(rc.snapshot()[0].status, CounterStatus::Disconnected);
}
