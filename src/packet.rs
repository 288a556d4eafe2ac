//! The per-packet record the adapter produces and the facade consumes.

use crate::time::SendTime;
use std::time::Instant;

/// An immutable record produced once per accepted packet. Consumed once
/// by [`crate::estimator::BandwidthEstimator::on_packet`] then discarded;
/// callers on a hot path should reuse storage rather than allocate a fresh
/// one per packet (§3).
#[derive(Clone, Copy, Debug)]
pub struct PacketInfo {
    pub arrival: Instant,
    pub send_time: SendTime,
    pub size: u64,
    pub ssrc: u32,
}
