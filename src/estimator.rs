//! The facade tying every sub-component into one control loop (§4.8).
//! Shaped like `TwccBandwidthEstimator` in
//! `interceptor/twcc/estimator/mod.rs`: one struct owning every piece of
//! mutable state, one method per pipeline stage, wrapped in a single
//! exclusive lock by the caller (the adapter) per §5.

use crate::config::EstimatorConfig;
use crate::delay_filter::DelayFilter;
use crate::error::EstimatorError;
use crate::inter_arrival::InterArrival;
use crate::overuse_detector::OveruseDetector;
use crate::packet::PacketInfo;
use crate::rate_controller::RateController;
use crate::rate_stats::RateStats;
use crate::remb::{self, REMBScheduler};
use bytes::Bytes;
use std::time::Instant;

/// Preserves insertion order (I7) while still giving O(1)-ish membership
/// checks for the packet-rate-sensitive path; the active-SSRC set is tiny
/// in practice (one entry per simultaneously active stream).
struct SsrcSet {
    order: Vec<u32>,
}

impl SsrcSet {
    fn new() -> SsrcSet {
        SsrcSet { order: Vec::new() }
    }

    fn insert(&mut self, ssrc: u32) {
        if !self.order.contains(&ssrc) {
            self.order.push(ssrc);
        }
    }

    fn remove(&mut self, ssrc: u32) {
        self.order.retain(|&s| s != ssrc);
    }

    fn as_slice(&self) -> &[u32] {
        &self.order
    }

    fn clear(&mut self) {
        self.order.clear();
    }
}

pub struct BandwidthEstimator {
    config: EstimatorConfig,
    inter_arrival: InterArrival,
    delay_filter: DelayFilter,
    overuse_detector: OveruseDetector,
    rate_stats: RateStats,
    rate_controller: RateController,
    scheduler: REMBScheduler,
    active_ssrcs: SsrcSet,
    last_arrival: Option<Instant>,
}

impl BandwidthEstimator {
    pub fn new(config: EstimatorConfig) -> BandwidthEstimator {
        let delay_filter = DelayFilter::new(config.filter_kind, config.kalman, config.trendline);
        let scheduler = REMBScheduler::new(config.remb.interval, config.remb.force_send_decrease_ratio);
        BandwidthEstimator {
            inter_arrival: InterArrival::new(config.inter_arrival),
            delay_filter,
            overuse_detector: OveruseDetector::new(config.overuse),
            rate_stats: RateStats::new(config.rate_stats),
            rate_controller: RateController::new(config.rate_controller),
            scheduler,
            active_ssrcs: SsrcSet::new(),
            last_arrival: None,
            config,
        }
    }

    /// Restore every sub-component to its initial state (§6, used by tests
    /// / reconfiguration only).
    pub fn reset(&mut self) {
        self.inter_arrival.reset();
        self.delay_filter.reset();
        self.overuse_detector.reset();
        self.rate_stats.reset();
        self.rate_controller.reset();
        self.scheduler.reset();
        self.active_ssrcs.clear();
        self.last_arrival = None;
    }

    /// Run one packet through the full pipeline (§4.8 steps 1-6),
    /// returning the current estimate in bits/s.
    pub fn on_packet(&mut self, packet: PacketInfo) -> u64 {
        self.check_arrival_order(packet.arrival);
        self.active_ssrcs.insert(packet.ssrc);
        self.rate_stats.insert(packet.arrival, packet.size);

        if let Some(delay_variation_us) =
            self.inter_arrival.on_packet(packet.send_time, packet.arrival, packet.size)
        {
            let delay_variation_ms = delay_variation_us as f64 / 1000.0;
            let gradient = self.delay_filter.update(delay_variation_ms, packet.arrival);
            self.overuse_detector.process_sample(gradient, packet.arrival);
        }

        let hypothesis = self.overuse_detector.hypothesis();
        let measured_bps = self.rate_stats.bits_per_second(packet.arrival);
        let estimate = self.rate_controller.update(hypothesis, measured_bps, packet.arrival);
        self.last_arrival = Some(self.last_arrival.map_or(packet.arrival, |last| last.max(packet.arrival)));
        estimate
    }

    /// §7's `InvariantViolation`: packet arrival must be non-decreasing.
    /// Fatal in debug builds, logged and coerced (the largest arrival seen
    /// so far is kept, the out-of-order packet is still processed) in
    /// release.
    fn check_arrival_order(&self, arrival: Instant) {
        let Some(last) = self.last_arrival else { return };
        if arrival < last {
            let err = EstimatorError::InvariantViolation {
                detail: "packet arrival went backwards relative to the previous packet",
            };
            debug_assert!(false, "{err}");
            log::error!("{err}");
        }
    }

    /// Remove a stream that the adapter has determined is gone (unbound or
    /// timed out). Does not touch the estimate itself.
    pub fn remove_ssrc(&mut self, ssrc: u32) {
        self.active_ssrcs.remove(ssrc);
    }

    pub fn current_estimate(&self) -> u64 {
        self.rate_controller.estimate_bps()
    }

    pub fn active_ssrcs(&self) -> &[u32] {
        self.active_ssrcs.as_slice()
    }

    /// Ask the scheduler whether a REMB is due at `now`; if so, build and
    /// marshal it. Returns `(bytes, should_send, error)`: `should_send` is
    /// false on a quiet tick, true with `Some(bytes)` on a successful send,
    /// and true with `bytes = None` plus an error when the builder failed
    /// (the scheduler still advances so a persistently unencodable bitrate
    /// cannot spin the tick, matching §7's "skips the cycle, no retry").
    pub fn maybe_build_remb(&mut self, now: Instant) -> (Option<Bytes>, bool, Option<EstimatorError>) {
        let estimate = self.current_estimate();
        if !self.scheduler.should_send(estimate, now) {
            log::debug!("REMB tick skipped: {estimate} bps not yet due for a send");
            return (None, false, None);
        }

        self.scheduler.record_sent(estimate, now);
        log::debug!("REMB tick: sending {estimate} bps for {} ssrc(s)", self.active_ssrcs.as_slice().len());

        match remb::build_remb(self.config.remb.sender_ssrc, estimate, self.active_ssrcs.as_slice()) {
            Ok(bytes) => (Some(bytes), true, None),
            Err(err) => (None, true, Some(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::SendTime;
    use std::time::Duration;

    fn packet(ssrc: u32, arrival: Instant, send_units: u32, size: u64) -> PacketInfo {
        PacketInfo {
            arrival,
            send_time: SendTime::from_raw(send_units),
            size,
            ssrc,
        }
    }

    #[test]
    fn tracks_active_ssrcs_in_insertion_order() {
        let mut estimator = BandwidthEstimator::new(EstimatorConfig::default());
        let base = Instant::now();
        estimator.on_packet(packet(2, base, 0, 1200));
        estimator.on_packet(packet(1, base + Duration::from_millis(1), 100, 1200));
        estimator.on_packet(packet(2, base + Duration::from_millis(2), 200, 1200));
        assert_eq!(estimator.active_ssrcs(), &[2, 1]);
    }

    #[test]
    fn removing_an_ssrc_drops_it_from_the_active_set() {
        let mut estimator = BandwidthEstimator::new(EstimatorConfig::default());
        let base = Instant::now();
        estimator.on_packet(packet(7, base, 0, 1200));
        estimator.remove_ssrc(7);
        assert!(estimator.active_ssrcs().is_empty());
    }

    #[test]
    fn estimate_stays_within_configured_clamp() {
        let config = EstimatorConfig::default();
        let mut estimator = BandwidthEstimator::new(config);
        let base = Instant::now();
        for i in 0..500u64 {
            let t = base + Duration::from_millis(20 * i);
            let send = SendTime::from_raw((5243u32).wrapping_mul(i as u32));
            let estimate = estimator.on_packet(PacketInfo {
                arrival: t,
                send_time: send,
                size: 1200,
                ssrc: 1,
            });
            assert!(estimate >= config.rate_controller.min_bitrate_bps);
            assert!(estimate <= config.rate_controller.max_bitrate_bps);
        }
    }

    #[test]
    fn reset_clears_active_ssrcs_and_restores_initial_estimate() {
        let config = EstimatorConfig::default();
        let mut estimator = BandwidthEstimator::new(config);
        let base = Instant::now();
        estimator.on_packet(packet(1, base, 0, 1200));
        estimator.reset();
        assert!(estimator.active_ssrcs().is_empty());
        assert_eq!(estimator.current_estimate(), config.rate_controller.initial_bitrate_bps);
    }

    #[test]
    fn maybe_build_remb_is_idempotent_between_ticks() {
        let mut estimator = BandwidthEstimator::new(EstimatorConfig::default());
        let base = Instant::now();
        estimator.on_packet(packet(1, base, 0, 1200));

        let (bytes, should_send, err) = estimator.maybe_build_remb(base);
        assert!(should_send);
        assert!(bytes.is_some());
        assert!(err.is_none());

        let (bytes_again, should_send_again, _) = estimator.maybe_build_remb(base);
        assert!(!should_send_again);
        assert!(bytes_again.is_none());
    }

    #[test]
    fn maybe_build_remb_resends_after_the_interval_elapses() {
        let config = EstimatorConfig::default();
        let interval = config.remb.interval;
        let mut estimator = BandwidthEstimator::new(config);
        let base = Instant::now();
        estimator.on_packet(packet(1, base, 0, 1200));

        let (_, first_send, _) = estimator.maybe_build_remb(base);
        assert!(first_send);

        let (_, too_soon, _) = estimator.maybe_build_remb(base + interval / 2);
        assert!(!too_soon);

        let (_, later, _) = estimator.maybe_build_remb(base + interval + Duration::from_millis(1));
        assert!(later);
    }
}
