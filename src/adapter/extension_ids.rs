//! Negotiated extension-ID discovery (§4.9 step 1): "first non-zero value
//! wins across streams; subsequent stream binds do not overwrite." Modeled
//! on the teacher's inline scan in `TwccInterceptor::bind_local_stream`
//! (`interceptor/twcc/interceptor.rs`), generalized to two extensions and
//! given sticky, lock-free storage since every bound stream reads it on
//! the packet-rate-sensitive path.

use crate::codec::{ABS_CAPTURE_TIME_URI, ABS_SEND_TIME_URI};
use crate::error::EstimatorError;
use std::sync::atomic::{AtomicU8, Ordering};
use webrtc::interceptor::stream_info::RTPHeaderExtension;

pub struct ExtensionIds {
    abs_send_time: AtomicU8,
    abs_capture_time: AtomicU8,
}

impl ExtensionIds {
    pub fn new() -> ExtensionIds {
        ExtensionIds {
            abs_send_time: AtomicU8::new(0),
            abs_capture_time: AtomicU8::new(0),
        }
    }

    /// Scan one stream's negotiated extensions, latching onto the first
    /// non-zero ID seen for each of the two URIs this estimator consumes.
    /// Returns `UnknownExtension` when the stream advertised at least one
    /// extension but none of them matched either URI.
    pub fn bind(&self, extensions: &[RTPHeaderExtension]) -> Option<EstimatorError> {
        let mut recognized = false;
        for ext in extensions {
            if ext.id == 0 {
                continue;
            }
            if ext.uri == ABS_SEND_TIME_URI {
                let _ = self
                    .abs_send_time
                    .compare_exchange(0, ext.id as u8, Ordering::AcqRel, Ordering::Acquire);
                recognized = true;
            } else if ext.uri == ABS_CAPTURE_TIME_URI {
                let _ = self
                    .abs_capture_time
                    .compare_exchange(0, ext.id as u8, Ordering::AcqRel, Ordering::Acquire);
                recognized = true;
            }
        }

        if !recognized && !extensions.is_empty() {
            return Some(EstimatorError::UnknownExtension {
                id: extensions[0].id as u8,
            });
        }
        None
    }

    /// `(abs_send_time_id, abs_capture_time_id)`, `0` meaning "not negotiated".
    pub fn get(&self) -> (u8, u8) {
        (
            self.abs_send_time.load(Ordering::Acquire),
            self.abs_capture_time.load(Ordering::Acquire),
        )
    }
}
