//! Sliding-window measured receive bitrate (§4.5). Grounded on `History`
//! in `interceptor/twcc/estimator/delay_based/history.rs` (same
//! `VecDeque`-backed running-sum trick), but keyed on a fixed wall-clock
//! duration rather than a fixed packet-group count.

use crate::config::RateStatsConfig;
use std::collections::VecDeque;
use std::time::Instant;

struct Entry {
    arrival: Instant,
    bytes: u64,
}

pub struct RateStats {
    config: RateStatsConfig,
    entries: VecDeque<Entry>,
    bytes_in_window: u64,
}

impl RateStats {
    pub fn new(config: RateStatsConfig) -> RateStats {
        RateStats {
            config,
            entries: VecDeque::new(),
            bytes_in_window: 0,
        }
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.bytes_in_window = 0;
    }

    pub fn insert(&mut self, arrival: Instant, bytes: u64) {
        self.entries.push_back(Entry { arrival, bytes });
        self.bytes_in_window += bytes;
        self.evict_stale(arrival);
    }

    /// Discard entries older than `now - window`, then return the
    /// measured bitrate in bits/s over whatever remains.
    pub fn bits_per_second(&mut self, now: Instant) -> f64 {
        self.evict_stale(now);
        8.0 * self.bytes_in_window as f64 / self.config.window.as_secs_f64()
    }

    fn evict_stale(&mut self, now: Instant) {
        while let Some(front) = self.entries.front() {
            if now.saturating_duration_since(front.arrival) > self.config.window {
                let front = self.entries.pop_front().unwrap();
                self.bytes_in_window -= front.bytes;
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn empty_stats_report_zero() {
        let mut stats = RateStats::new(RateStatsConfig::default());
        assert_eq!(stats.bits_per_second(Instant::now()), 0.0);
    }

    #[test]
    fn evicts_entries_outside_the_window() {
        let mut stats = RateStats::new(RateStatsConfig {
            window: Duration::from_millis(500),
        });
        let base = Instant::now();
        stats.insert(base, 1200);
        stats.insert(base + Duration::from_millis(100), 1200);

        let rate_inside = stats.bits_per_second(base + Duration::from_millis(200));
        assert!(rate_inside > 0.0);

        let rate_after_window = stats.bits_per_second(base + Duration::from_secs(2));
        assert_eq!(rate_after_window, 0.0);
    }

    #[test]
    fn rate_scales_with_inserted_bytes() {
        let mut stats = RateStats::new(RateStatsConfig {
            window: Duration::from_millis(500),
        });
        let base = Instant::now();
        for i in 0..25u64 {
            stats.insert(base + Duration::from_millis(20 * i), 1200);
        }
        let rate = stats.bits_per_second(base + Duration::from_millis(500));
        assert!(rate > 0.0);
    }
}
