//! Windowed linear-regression ("trendline") delay-gradient estimator
//! (§4.3.2). The teacher's delay-based estimator only implements the
//! Kalman variant; this filter is grounded on the same module shape
//! (`update`/state struct) generalized to the windowed-regression
//! behavior §4.3.2 specifies.

use crate::config::TrendlineConfig;
use std::collections::VecDeque;
use std::time::Instant;

const SAMPLE_COUNT_CAP: u32 = 60;

pub struct TrendlineFilter {
    config: TrendlineConfig,
    smoothed: f64,
    window: VecDeque<(f64, f64)>,
    samples_seen: u32,
    first_arrival: Option<Instant>,
}

impl TrendlineFilter {
    pub fn new(config: TrendlineConfig) -> TrendlineFilter {
        TrendlineFilter {
            config,
            smoothed: 0.0,
            window: VecDeque::with_capacity(config.window_size + 1),
            samples_seen: 0,
            first_arrival: None,
        }
    }

    pub fn reset(&mut self) {
        self.smoothed = 0.0;
        self.window.clear();
        self.samples_seen = 0;
        self.first_arrival = None;
    }

    /// Feed one delay-variation sample `d` (milliseconds) observed at
    /// `arrival`, return the modified trend.
    pub fn update(&mut self, d: f64, arrival: Instant) -> f64 {
        let first_arrival = *self.first_arrival.get_or_insert(arrival);
        let t_ms = arrival.duration_since(first_arrival).as_secs_f64() * 1000.0;

        self.smoothed = self.config.smoothing_alpha * self.smoothed
            + (1.0 - self.config.smoothing_alpha) * d;

        self.window.push_back((t_ms, self.smoothed));
        while self.window.len() > self.config.window_size {
            self.window.pop_front();
        }

        self.samples_seen = (self.samples_seen + 1).min(SAMPLE_COUNT_CAP);

        if self.config.window_size < 2 || self.window.len() < 2 {
            return 0.0;
        }

        let slope = least_squares_slope(&self.window);
        self.samples_seen as f64 * slope * self.config.threshold_gain
    }
}

fn least_squares_slope(window: &VecDeque<(f64, f64)>) -> f64 {
    let n = window.len() as f64;
    let mean_x = window.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = window.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (x, y) in window.iter() {
        let dx = x - mean_x;
        numerator += dx * (y - mean_y);
        denominator += dx * dx;
    }

    if denominator.abs() < f64::EPSILON {
        0.0
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fewer_than_two_samples_emits_zero() {
        let mut filter = TrendlineFilter::new(TrendlineConfig::default());
        let now = Instant::now();
        assert_eq!(filter.update(10.0, now), 0.0);
    }

    #[test]
    fn window_size_below_two_always_emits_zero() {
        let mut filter = TrendlineFilter::new(TrendlineConfig {
            window_size: 1,
            ..TrendlineConfig::default()
        });
        let now = Instant::now();
        for i in 0..10 {
            assert_eq!(filter.update(5.0, now + Duration::from_millis(20 * i)), 0.0);
        }
    }

    #[test]
    fn constant_input_trends_toward_zero_slope() {
        let mut filter = TrendlineFilter::new(TrendlineConfig::default());
        let now = Instant::now();
        let mut last = 0.0;
        for i in 0..40u64 {
            last = filter.update(3.0, now + Duration::from_millis(20 * i));
        }
        assert!(last.abs() < 0.5, "expected near-zero trend, got {last}");
    }

    #[test]
    fn rising_delay_yields_positive_trend() {
        let mut filter = TrendlineFilter::new(TrendlineConfig::default());
        let now = Instant::now();
        let mut last = 0.0;
        for i in 0..40u64 {
            last = filter.update(i as f64, now + Duration::from_millis(20 * i));
        }
        assert!(last > 0.0, "expected positive trend for rising delay, got {last}");
    }
}
