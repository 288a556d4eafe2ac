//! Scalar 1-D Kalman filter over delay-variation samples (§4.3.1).
//! Modeled on `ArrivalTimeFilter` in
//! `interceptor/twcc/estimator/delay_based/overuse_detector.rs`, adjusted
//! to the spec's fixed variance-adaptation coefficient and explicit
//! ±3·√var outlier cap (the teacher computes `alpha` from `min_send_interval`
//! instead; this crate's §4.3.1 contract fixes the smoothing coefficient).

use crate::config::KalmanConfig;

pub struct KalmanFilter {
    config: KalmanConfig,
    m_hat: f64,
    e: f64,
    var_v: f64,
}

impl KalmanFilter {
    pub fn new(config: KalmanConfig) -> KalmanFilter {
        KalmanFilter {
            config,
            m_hat: 0.0,
            e: config.initial_error_covariance,
            var_v: config.measurement_noise_floor,
        }
    }

    pub fn reset(&mut self) {
        self.m_hat = 0.0;
        self.e = self.config.initial_error_covariance;
        self.var_v = self.config.measurement_noise_floor;
    }

    /// Feed one delay-variation sample (milliseconds) and return the
    /// smoothed gradient.
    pub fn update(&mut self, z: f64) -> f64 {
        let innovation = z - self.m_hat;

        let cap = 3.0 * self.var_v.sqrt();
        let capped_innovation = innovation.clamp(-cap, cap);

        self.var_v = (self.var_v * (1.0 - self.config.chi)
            + self.config.chi * capped_innovation * capped_innovation)
            .max(self.config.measurement_noise_floor);

        let q = self.config.process_noise_variance;
        let k = (self.e + q) / (self.var_v + self.e + q);

        // State update uses the uncapped innovation (§4.3.1 step 5).
        self.m_hat += k * innovation;
        self.e = (1.0 - k) * (self.e + q);

        self.m_hat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_zero_input_stays_near_zero() {
        let mut filter = KalmanFilter::new(KalmanConfig::default());
        for _ in 0..100 {
            let m = filter.update(0.0);
            assert!(m.abs() < 1e-6);
        }
    }

    #[test]
    fn tracks_a_sustained_step() {
        let mut filter = KalmanFilter::new(KalmanConfig::default());
        let mut last = 0.0;
        for _ in 0..500 {
            last = filter.update(50.0);
        }
        assert!(last > 30.0, "expected filter to converge toward the step, got {last}");
    }
}
