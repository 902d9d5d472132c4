/// Integration tests for the timing primitives nodes are driven by

use std::time::{Duration, Instant};

use peerlink_shared::{PeriodicTimer, Timer};

#[test]
fn periodic_timer_does_not_drift_under_jitter() {
    let start = Instant::now();
    let period = Duration::from_millis(100);
    let mut timer = PeriodicTimer::new(period, start);

    // every poll lands a little late, by a varying amount
    let mut fired = 0;
    for tick in 1..=50u32 {
        let jitter = Duration::from_millis(u64::from(tick % 7) * 3);
        if timer.poll(start + period * tick + jitter) {
            fired += 1;
        }
    }

    assert_eq!(fired, 50);
    assert_eq!(timer.next_deadline(), start + period * 51);
}

#[test]
fn periodic_timer_coalesces_missed_deadlines() {
    let start = Instant::now();
    let period = Duration::from_millis(100);
    let mut timer = PeriodicTimer::new(period, start);

    // the caller stalls for ten periods
    assert!(timer.poll(start + Duration::from_millis(1_050)));
    assert!(!timer.poll(start + Duration::from_millis(1_060)));
    assert_eq!(timer.next_deadline(), start + Duration::from_millis(1_100));
    assert!(timer.poll(start + Duration::from_millis(1_100)));
}

#[test]
fn timer_tracks_time_since_reset() {
    let start = Instant::now();
    let mut timer = Timer::new(Duration::from_millis(500), start);

    assert_eq!(
        timer.elapsed(start + Duration::from_millis(200)),
        Duration::from_millis(200)
    );
    assert!(!timer.ringing(start + Duration::from_millis(499)));
    assert!(timer.ringing(start + Duration::from_millis(500)));

    timer.reset(start + Duration::from_millis(600));
    assert!(!timer.ringing(start + Duration::from_millis(700)));
    // a clock reading before the reset counts as no time elapsed
    assert_eq!(timer.elapsed(start), Duration::ZERO);
}
