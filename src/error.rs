//! The estimator's error model (§7): every locally-raised error condition
//! lives in one `EstimatorError` enum. Framework-boundary errors are
//! reported through `webrtc::Error`/`webrtc::interceptor::Error` instead,
//! as the teacher's own interceptors do.

use std::fmt;

/// Which timestamp extension a length error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    AbsSendTime,
    AbsCaptureTime,
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionKind::AbsSendTime => write!(f, "abs-send-time"),
            ExtensionKind::AbsCaptureTime => write!(f, "abs-capture-time"),
        }
    }
}

/// Every error condition this crate raises locally (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorError {
    /// An extension's payload was shorter than its format requires.
    InvalidExtensionLength { extension: ExtensionKind, got: usize },
    /// A stream negotiated header extensions, but none of them were a
    /// timestamp extension this estimator understands.
    UnknownExtension { id: u8 },
    /// The bitrate cannot be represented as a 6-bit-exponent/18-bit-mantissa
    /// pair (out of range after rounding).
    RembBitrateOutOfRange { bits_per_second: u64 },
    /// The underlying RTCP marshal call for a REMB packet failed.
    RembMarshal,
    /// The RTCP writer returned an error while delivering a REMB packet.
    WriterError,
    /// An internal invariant was violated. Debug builds panic via
    /// `debug_assert!` at the call site; release builds log this variant
    /// and keep running on a best-effort basis.
    InvariantViolation { detail: &'static str },
}

impl fmt::Display for EstimatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimatorError::InvalidExtensionLength { extension, got } => {
                let need = match extension {
                    ExtensionKind::AbsSendTime => 3,
                    ExtensionKind::AbsCaptureTime => 8,
                };
                write!(f, "{extension} extension too short: {got} bytes, need {need}")
            }
            EstimatorError::UnknownExtension { id } => write!(
                f,
                "no recognized timestamp extension among the negotiated IDs (first seen: {id})"
            ),
            EstimatorError::RembBitrateOutOfRange { bits_per_second } => {
                write!(f, "bitrate {bits_per_second} bps is not representable in a REMB packet")
            }
            EstimatorError::RembMarshal => write!(f, "failed to marshal REMB packet"),
            EstimatorError::WriterError => {
                write!(f, "RTCP writer returned an error delivering a REMB packet")
            }
            EstimatorError::InvariantViolation { detail } => {
                write!(f, "internal invariant violated: {detail}")
            }
        }
    }
}

impl std::error::Error for EstimatorError {}
