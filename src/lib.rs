pub mod adapter;
pub mod codec;
pub mod config;
pub mod delay_filter;
pub mod error;
pub mod estimator;
pub mod inter_arrival;
pub mod overuse_detector;
pub mod packet;
pub mod rate_controller;
pub mod rate_stats;
pub mod remb;
pub mod time;

pub use self::{
    adapter::{GccBandwidthAdapter, GccBandwidthAdapterBuilder},
    config::EstimatorConfig,
    error::EstimatorError,
    estimator::BandwidthEstimator,
    packet::PacketInfo,
    time::SendTime,
};
