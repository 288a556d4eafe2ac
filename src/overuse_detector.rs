//! Adaptive-threshold overuse detector (§4.4). Grounded on `DelayThreshold`
//! and `DelayDetector` in
//! `interceptor/twcc/estimator/delay_based/overuse_detector.rs`, but keeps
//! the in-overuse-region timer separate from the reported hypothesis (the
//! teacher collapses both into one `Option<TwccTime>` and never reports a
//! third "Underusing" state) and adds the explicit state-change callback
//! and clamp §4.4/§8 require.

use crate::config::OveruseDetectorConfig;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hypothesis {
    Normal,
    Overusing,
    Underusing,
}

pub struct OveruseDetector {
    config: OveruseDetectorConfig,
    hypothesis: Hypothesis,
    threshold_ms: f64,
    last_threshold_update: Option<Instant>,
    in_overuse_region: bool,
    overuse_region_start: Option<Instant>,
    prev_sample: Option<f64>,
    on_change: Option<Box<dyn FnMut(Hypothesis) + Send>>,
}

impl OveruseDetector {
    pub fn new(config: OveruseDetectorConfig) -> OveruseDetector {
        let threshold_ms = config.initial_threshold_ms;
        OveruseDetector {
            config,
            hypothesis: Hypothesis::Normal,
            threshold_ms,
            last_threshold_update: None,
            in_overuse_region: false,
            overuse_region_start: None,
            prev_sample: None,
            on_change: None,
        }
    }

    pub fn reset(&mut self) {
        self.hypothesis = Hypothesis::Normal;
        self.threshold_ms = self.config.initial_threshold_ms;
        self.last_threshold_update = None;
        self.in_overuse_region = false;
        self.overuse_region_start = None;
        self.prev_sample = None;
    }

    /// Register a callback that fires only on actual transitions of the
    /// reported hypothesis (§4.4 "State-change callback").
    pub fn set_on_change(&mut self, callback: impl FnMut(Hypothesis) + Send + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    pub fn hypothesis(&self) -> Hypothesis {
        self.hypothesis
    }

    pub fn threshold_ms(&self) -> f64 {
        self.threshold_ms
    }

    /// Feed one gradient sample `m` (ms) observed at `t`, returning the
    /// (possibly unchanged) hypothesis.
    pub fn process_sample(&mut self, m: f64, t: Instant) -> Hypothesis {
        self.adapt_threshold(m, t);

        let new_hypothesis = if m > self.threshold_ms {
            self.classify_above_threshold(m, t)
        } else if m < -self.threshold_ms {
            self.in_overuse_region = false;
            self.overuse_region_start = None;
            Hypothesis::Underusing
        } else {
            self.in_overuse_region = false;
            self.overuse_region_start = None;
            Hypothesis::Normal
        };

        self.prev_sample = Some(m);
        self.set_hypothesis(new_hypothesis);
        self.hypothesis
    }

    fn adapt_threshold(&mut self, m: f64, t: Instant) {
        let Some(last_update) = self.last_threshold_update else {
            self.last_threshold_update = Some(t);
            return;
        };

        let delta_t_s = t
            .saturating_duration_since(last_update)
            .min(self.config.max_time_delta)
            .as_secs_f64();
        self.last_threshold_update = Some(t);

        let threshold_delta = m.abs() - self.threshold_ms;
        if threshold_delta.abs() <= self.config.outlier_margin_ms {
            let k = if threshold_delta > 0.0 {
                self.config.k_up
            } else {
                self.config.k_down
            };
            self.threshold_ms = (self.threshold_ms + delta_t_s * k * threshold_delta)
                .clamp(self.config.min_threshold_ms, self.config.max_threshold_ms);
        }
    }

    /// Handles the `m > threshold` branch: region tracking plus the
    /// signal-suppression rule (§4.4).
    fn classify_above_threshold(&mut self, m: f64, t: Instant) -> Hypothesis {
        if !self.in_overuse_region {
            self.in_overuse_region = true;
            self.overuse_region_start = Some(t);
        }

        let region_start = self.overuse_region_start.expect("set above");
        let sustained = t.saturating_duration_since(region_start) >= self.config.sustained_overuse;
        let decreasing = self.prev_sample.is_some_and(|prev| m < prev);

        if sustained && !decreasing {
            Hypothesis::Overusing
        } else {
            Hypothesis::Normal
        }
    }

    fn set_hypothesis(&mut self, new: Hypothesis) {
        if new != self.hypothesis {
            log::debug!("hypothesis transition: {:?} -> {new:?}", self.hypothesis);
            self.hypothesis = new;
            if let Some(callback) = &mut self.on_change {
                callback(new);
            }
        }
    }
}
