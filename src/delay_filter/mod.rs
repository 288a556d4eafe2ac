//! The two interchangeable delay-gradient smoothers (§4.3), selected by
//! [`crate::config::DelayFilterKind`] and exposed behind one two-method
//! capability as §9 ("Polymorphism over DelayFilter") describes: a tagged
//! enum, since both variants are known at compile time and per-packet
//! dispatch should not allocate.

mod kalman;
mod trendline;

pub use kalman::KalmanFilter;
pub use trendline::TrendlineFilter;

use crate::config::{DelayFilterKind, KalmanConfig, TrendlineConfig};
use std::time::Instant;

pub enum DelayFilter {
    Kalman(KalmanFilter),
    Trendline(TrendlineFilter),
}

impl DelayFilter {
    pub fn new(kind: DelayFilterKind, kalman: KalmanConfig, trendline: TrendlineConfig) -> DelayFilter {
        match kind {
            DelayFilterKind::Kalman => DelayFilter::Kalman(KalmanFilter::new(kalman)),
            DelayFilterKind::Trendline => DelayFilter::Trendline(TrendlineFilter::new(trendline)),
        }
    }

    /// Consume one delay-variation sample (milliseconds) observed at
    /// `arrival`, return the smoothed gradient.
    pub fn update(&mut self, delay_ms: f64, arrival: Instant) -> f64 {
        match self {
            DelayFilter::Kalman(f) => f.update(delay_ms),
            DelayFilter::Trendline(f) => f.update(delay_ms, arrival),
        }
    }

    pub fn reset(&mut self) {
        match self {
            DelayFilter::Kalman(f) => f.reset(),
            DelayFilter::Trendline(f) => f.reset(),
        }
    }
}
