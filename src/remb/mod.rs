//! REMB packet construction (§4.7). Marshalling is delegated to
//! `webrtc::rtcp::payload_feedbacks::receiver_estimated_maximum_bitrate::ReceiverEstimatedMaximumBitrate`,
//! a vetted RTCP implementation, per §4.7's recommendation. This module
//! only owns the scheduling decision and the bits-per-second -> f32
//! conversion at the boundary.

mod scheduler;

pub use scheduler::REMBScheduler;

use crate::error::EstimatorError;
use bytes::Bytes;
use webrtc::rtcp::payload_feedbacks::receiver_estimated_maximum_bitrate::ReceiverEstimatedMaximumBitrate;
use webrtc::util::marshal::Marshal;

/// The largest bitrate representable by REMB's 6-bit-exponent/18-bit-mantissa
/// encoding (mirrors the `webrtc` crate's own `BITRATE_MAX` constant).
const BITRATE_MAX: f64 = 2.417_842_4e24;

/// Build one REMB packet carrying `bits_per_second` for `ssrcs`, marshalled
/// to wire bytes.
pub fn build_remb(
    sender_ssrc: u32,
    bits_per_second: u64,
    ssrcs: &[u32],
) -> Result<Bytes, EstimatorError> {
    let bitrate = bits_per_second as f64;
    if bitrate < 0.0 || bitrate > BITRATE_MAX {
        return Err(EstimatorError::RembBitrateOutOfRange { bits_per_second });
    }

    let packet = ReceiverEstimatedMaximumBitrate {
        sender_ssrc,
        bitrate: bitrate as f32,
        ssrcs: ssrcs.to_vec(),
    };

    packet.marshal().map_err(|_| EstimatorError::RembMarshal)
}
