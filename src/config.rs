//! Aggregate configuration for a `BandwidthEstimator`, following the
//! teacher's pattern of small `Default`-implementing structs passed by
//! value at construction (see `WebRtcBuilder`/`DataRate` in `peer.rs`).

use std::time::Duration;

/// Which smoothing filter turns delay-variation samples into a gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayFilterKind {
    Kalman,
    Trendline,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterArrivalConfig {
    pub burst_time: Duration,
    pub max_burst_duration: Duration,
}

impl Default for InterArrivalConfig {
    fn default() -> Self {
        InterArrivalConfig {
            burst_time: Duration::from_millis(5),
            max_burst_duration: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanConfig {
    pub process_noise_variance: f64,
    pub initial_error_covariance: f64,
    pub chi: f64,
    pub measurement_noise_floor: f64,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        KalmanConfig {
            process_noise_variance: 1e-3,
            initial_error_covariance: 0.1,
            chi: 0.01,
            measurement_noise_floor: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendlineConfig {
    pub window_size: usize,
    pub smoothing_alpha: f64,
    pub threshold_gain: f64,
}

impl Default for TrendlineConfig {
    fn default() -> Self {
        TrendlineConfig {
            window_size: 20,
            smoothing_alpha: 0.9,
            threshold_gain: 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OveruseDetectorConfig {
    pub initial_threshold_ms: f64,
    pub min_threshold_ms: f64,
    pub max_threshold_ms: f64,
    pub k_up: f64,
    pub k_down: f64,
    pub sustained_overuse: Duration,
    pub outlier_margin_ms: f64,
    pub max_time_delta: Duration,
}

impl Default for OveruseDetectorConfig {
    fn default() -> Self {
        OveruseDetectorConfig {
            initial_threshold_ms: 12.5,
            min_threshold_ms: 6.0,
            max_threshold_ms: 600.0,
            k_up: 0.01,
            k_down: 0.00018,
            sustained_overuse: Duration::from_millis(10),
            outlier_margin_ms: 15.0,
            max_time_delta: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateControllerConfig {
    pub min_bitrate_bps: u64,
    pub max_bitrate_bps: u64,
    pub initial_bitrate_bps: u64,
    pub decrease_factor: f64,
    pub multiplicative_factor_per_sec: f64,
    pub additive_packet_size_bytes: u64,
    pub default_rtt: Duration,
    pub convergence_sigma_multiplier: f64,
    pub cap_over_measured: f64,
}

impl Default for RateControllerConfig {
    fn default() -> Self {
        RateControllerConfig {
            min_bitrate_bps: 30_000,
            max_bitrate_bps: 1_500_000_000,
            initial_bitrate_bps: 300_000,
            decrease_factor: 0.85,
            multiplicative_factor_per_sec: 1.08,
            additive_packet_size_bytes: 1200,
            default_rtt: Duration::from_millis(100),
            convergence_sigma_multiplier: 3.0,
            cap_over_measured: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateStatsConfig {
    pub window: Duration,
}

impl Default for RateStatsConfig {
    fn default() -> Self {
        RateStatsConfig {
            window: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RembConfig {
    pub interval: Duration,
    pub sender_ssrc: u32,
    pub force_send_decrease_ratio: f64,
}

impl Default for RembConfig {
    fn default() -> Self {
        RembConfig {
            interval: Duration::from_secs(1),
            sender_ssrc: 0,
            force_send_decrease_ratio: 0.03,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorConfig {
    pub inter_arrival: InterArrivalConfig,
    pub filter_kind: DelayFilterKind,
    pub kalman: KalmanConfig,
    pub trendline: TrendlineConfig,
    pub overuse: OveruseDetectorConfig,
    pub rate_controller: RateControllerConfig,
    pub rate_stats: RateStatsConfig,
    pub remb: RembConfig,
    /// Streams silent for longer than this are dropped from the active
    /// SSRC set by the adapter's cleanup task.
    pub stream_timeout: Duration,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig {
            inter_arrival: InterArrivalConfig::default(),
            filter_kind: DelayFilterKind::Kalman,
            kalman: KalmanConfig::default(),
            trendline: TrendlineConfig::default(),
            overuse: OveruseDetectorConfig::default(),
            rate_controller: RateControllerConfig::default(),
            rate_stats: RateStatsConfig::default(),
            remb: RembConfig::default(),
            stream_timeout: Duration::from_secs(2),
        }
    }
}
