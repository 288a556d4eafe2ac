//! REMB send-scheduling state (§4.7): periodic cadence plus the
//! force-send-on-drop rule. Shaped like the teacher's small, field-level
//! state structs (e.g. `TwccSendInfo`) rather than a dedicated trait —
//! there is only ever one scheduling policy.

use std::time::{Duration, Instant};

pub struct REMBScheduler {
    interval: Duration,
    force_send_decrease_ratio: f64,
    last_sent: Option<Instant>,
    last_sent_bitrate: Option<u64>,
}

impl REMBScheduler {
    pub fn new(interval: Duration, force_send_decrease_ratio: f64) -> REMBScheduler {
        REMBScheduler {
            interval,
            force_send_decrease_ratio,
            last_sent: None,
            last_sent_bitrate: None,
        }
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
        self.last_sent_bitrate = None;
    }

    /// Should a REMB go out right now for `estimate_bps` observed at `now`?
    /// True on the first call, once the interval has elapsed, or
    /// immediately when the estimate has dropped by at least the
    /// configured ratio since the last send (§4.7 "force-send").
    pub fn should_send(&self, estimate_bps: u64, now: Instant) -> bool {
        let Some(last_sent) = self.last_sent else {
            return true;
        };

        if now.saturating_duration_since(last_sent) >= self.interval {
            return true;
        }

        if let Some(last_bitrate) = self.last_sent_bitrate {
            if last_bitrate > 0 {
                let drop_ratio = (last_bitrate.saturating_sub(estimate_bps)) as f64 / last_bitrate as f64;
                if drop_ratio >= self.force_send_decrease_ratio {
                    return true;
                }
            }
        }

        false
    }

    /// Record that a REMB carrying `estimate_bps` was just sent at `now`.
    /// Callers must only call this once per actual send (I6: strictly
    /// increasing send timestamps; P6: idempotent between ticks).
    pub fn record_sent(&mut self, estimate_bps: u64, now: Instant) {
        self.last_sent = Some(now);
        self.last_sent_bitrate = Some(estimate_bps);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_always_sends() {
        let scheduler = REMBScheduler::new(Duration::from_secs(1), 0.03);
        assert!(scheduler.should_send(1_000_000, Instant::now()));
    }

    #[test]
    fn does_not_resend_before_interval_without_a_drop() {
        let mut scheduler = REMBScheduler::new(Duration::from_secs(1), 0.03);
        let base = Instant::now();
        scheduler.record_sent(1_000_000, base);
        assert!(!scheduler.should_send(1_000_000, base + Duration::from_millis(500)));
    }

    #[test]
    fn resends_once_interval_elapses() {
        let mut scheduler = REMBScheduler::new(Duration::from_secs(1), 0.03);
        let base = Instant::now();
        scheduler.record_sent(1_000_000, base);
        assert!(scheduler.should_send(1_000_000, base + Duration::from_millis(1001)));
    }

    #[test]
    fn force_sends_on_a_sufficient_drop() {
        let mut scheduler = REMBScheduler::new(Duration::from_secs(1), 0.03);
        let base = Instant::now();
        scheduler.record_sent(1_000_000, base);
        // 5% drop, well before the interval elapses.
        assert!(scheduler.should_send(950_000, base + Duration::from_millis(100)));
    }

    #[test]
    fn small_drop_below_ratio_does_not_force_send() {
        let mut scheduler = REMBScheduler::new(Duration::from_secs(1), 0.03);
        let base = Instant::now();
        scheduler.record_sent(1_000_000, base);
        // 1% drop, below the 3% force-send ratio.
        assert!(!scheduler.should_send(990_000, base + Duration::from_millis(100)));
    }
}
