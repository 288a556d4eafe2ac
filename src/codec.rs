//! Parses the two sender-timestamp RTP header extensions into a
//! [`SendTime`] in the shared 6.18 fixed-point space (§4.1).

use crate::error::{EstimatorError, ExtensionKind};
use crate::time::SendTime;

/// `http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time`
pub const ABS_SEND_TIME_URI: &str = "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time";

/// `http://www.webrtc.org/experiments/rtp-hdrext/abs-capture-time`
pub const ABS_CAPTURE_TIME_URI: &str =
    "http://www.webrtc.org/experiments/rtp-hdrext/abs-capture-time";

/// Decode a 3-byte big-endian abs-send-time payload (6.18 fixed point,
/// wraps every 2^24 units).
pub fn decode_abs_send_time(data: &[u8]) -> Result<SendTime, EstimatorError> {
    if data.len() < 3 {
        return Err(EstimatorError::InvalidExtensionLength {
            extension: ExtensionKind::AbsSendTime,
            got: data.len(),
        });
    }
    let raw = u32::from_be_bytes([0, data[0], data[1], data[2]]);
    Ok(SendTime::from_raw(raw))
}

/// Decode an 8-byte big-endian abs-capture-time payload (UQ32.32) and
/// downshift it into the same 6.18 units abs-send-time uses: 6 bits of
/// whole seconds, 18 bits taken from bits 14..31 of the fraction.
pub fn decode_abs_capture_time(data: &[u8]) -> Result<SendTime, EstimatorError> {
    if data.len() < 8 {
        return Err(EstimatorError::InvalidExtensionLength {
            extension: ExtensionKind::AbsCaptureTime,
            got: data.len(),
        });
    }
    let whole_seconds = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    let fraction = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);

    let six_bits_whole = whole_seconds & 0x3F;
    let eighteen_bits_frac = (fraction >> 14) & 0x3FFFF;
    let raw = (six_bits_whole << 18) | eighteen_bits_frac;
    Ok(SendTime::from_raw(raw))
}

/// Picks whichever of the two extension payloads is preferred and decodes
/// it. abs-send-time wins when both are present (§4.1, §6).
pub fn decode_preferred(
    abs_send_time: Option<&[u8]>,
    abs_capture_time: Option<&[u8]>,
) -> Option<Result<SendTime, EstimatorError>> {
    if let Some(data) = abs_send_time {
        return Some(decode_abs_send_time(data));
    }
    abs_capture_time.map(decode_abs_capture_time)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abs_send_time_roundtrip() {
        let raw: u32 = 0x123456;
        let bytes = [
            ((raw >> 16) & 0xFF) as u8,
            ((raw >> 8) & 0xFF) as u8,
            (raw & 0xFF) as u8,
        ];
        let decoded = decode_abs_send_time(&bytes).unwrap();
        assert_eq!(decoded.as_raw(), raw);
    }

    #[test]
    fn abs_send_time_too_short() {
        assert_eq!(
            decode_abs_send_time(&[1, 2]),
            Err(EstimatorError::InvalidExtensionLength {
                extension: ExtensionKind::AbsSendTime,
                got: 2
            })
        );
    }

    #[test]
    fn abs_capture_time_too_short() {
        assert_eq!(
            decode_abs_capture_time(&[0; 4]),
            Err(EstimatorError::InvalidExtensionLength {
                extension: ExtensionKind::AbsCaptureTime,
                got: 4
            })
        );
    }

    #[test]
    fn abs_capture_time_downshift() {
        // whole_seconds = 0x41 (low 6 bits = 1), fraction = 0x4000_0000
        // (bits 14..31 -> 0x10000 truncated to 18 bits)
        let whole_seconds: u32 = 0x41;
        let fraction: u32 = 0x4000_0000;
        let mut bytes = [0u8; 8];
        bytes[0..4].copy_from_slice(&whole_seconds.to_be_bytes());
        bytes[4..8].copy_from_slice(&fraction.to_be_bytes());

        let decoded = decode_abs_capture_time(&bytes).unwrap();
        let expected = ((whole_seconds & 0x3F) << 18) | ((fraction >> 14) & 0x3FFFF);
        assert_eq!(decoded.as_raw(), expected);
    }

    #[test]
    fn prefers_abs_send_time_when_both_present() {
        let send = [0x00, 0x00, 0x01];
        let capture = [0; 8];
        let decoded = decode_preferred(Some(&send), Some(&capture)).unwrap().unwrap();
        assert_eq!(decoded.as_raw(), 1);
    }
}
