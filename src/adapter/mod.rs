//! The framework-side observer (§4.9): binds incoming RTP streams and the
//! outgoing RTCP feedback writer to a [`BandwidthEstimator`], and runs the
//! two background tasks (REMB ticker, stale-stream cleanup) the facade
//! itself knows nothing about. Shaped directly on
//! `interceptor::twcc::interceptor::{TwccStream, TwccInterceptor,
//! TwccInterceptorBuilder}`: a thin `Interceptor` implementation wrapping
//! the next reader/writer in the chain, plus a `Mutex`-guarded estimator
//! shared between the packet path and the two tickers.

mod extension_ids;

use self::extension_ids::ExtensionIds;
use crate::codec;
use crate::config::EstimatorConfig;
use crate::error::EstimatorError;
use crate::estimator::BandwidthEstimator;
use crate::packet::PacketInfo;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use webrtc::interceptor::{
    self, stream_info::StreamInfo, Attributes, Interceptor, InterceptorBuilder, RTCPReader,
    RTCPWriter, RTPReader, RTPWriter,
};
use webrtc::rtp;

const CLEANUP_TICK: Duration = Duration::from_secs(1);

/// Per-stream bookkeeping the adapter owns directly (not part of the
/// framework-agnostic facade): when this SSRC last delivered a packet.
struct StreamState {
    last_packet: Instant,
}

struct Shared {
    estimator: Mutex<BandwidthEstimator>,
    extension_ids: ExtensionIds,
    streams: Mutex<HashMap<u32, StreamState>>,
    writer: Mutex<Option<Arc<dyn RTCPWriter + Send + Sync>>>,
    config: EstimatorConfig,
    shutdown: Notify,
}

impl Shared {
    /// §4.9 step 2: extract the preferred timestamp, stamp arrival, and
    /// drive the facade. Silently drops packets carrying neither
    /// extension or a malformed one.
    async fn process_incoming(&self, packet: &rtp::packet::Packet, ssrc: u32) {
        let (send_id, capture_id) = self.extension_ids.get();
        let abs_send_time = (send_id != 0).then(|| packet.header.get_extension(send_id)).flatten();
        let abs_capture_time = (capture_id != 0)
            .then(|| packet.header.get_extension(capture_id))
            .flatten();

        let Some(decoded) = codec::decode_preferred(
            abs_send_time.as_deref(),
            abs_capture_time.as_deref(),
        ) else {
            log::warn!("dropping packet from ssrc {ssrc}: no timestamp extension present");
            return;
        };

        let send_time = match decoded {
            Ok(send_time) => send_time,
            Err(err) => {
                log::warn!("dropping packet from ssrc {ssrc}: {err}");
                return;
            }
        };

        let arrival = Instant::now();
        {
            let mut streams = self.streams.lock().await;
            if let Some(state) = streams.get_mut(&ssrc) {
                state.last_packet = arrival;
            }
        }

        let mut estimator = self.estimator.lock().await;
        estimator.on_packet(PacketInfo {
            arrival,
            send_time,
            size: packet.payload.len() as u64,
            ssrc,
        });
    }

    async fn remove_stream(&self, ssrc: u32) {
        self.streams.lock().await.remove(&ssrc);
        self.estimator.lock().await.remove_ssrc(ssrc);
    }
}

struct RemoteReaderStream {
    shared: Arc<Shared>,
    ssrc: u32,
    next_reader: Arc<dyn RTPReader + Send + Sync>,
}

#[async_trait]
impl RTPReader for RemoteReaderStream {
    async fn read(
        &self,
        buf: &mut [u8],
        attributes: &Attributes,
    ) -> Result<(rtp::packet::Packet, Attributes), interceptor::Error> {
        let (packet, attr) = self.next_reader.read(buf, attributes).await?;
        self.shared.process_incoming(&packet, self.ssrc).await;
        Ok((packet, attr))
    }
}

struct FeedbackWriterStream {
    shared: Arc<Shared>,
    next_writer: Arc<dyn RTCPWriter + Send + Sync>,
}

#[async_trait]
impl RTCPWriter for FeedbackWriterStream {
    async fn write(
        &self,
        pkts: &[Box<dyn webrtc::rtcp::packet::Packet + Send + Sync>],
        attributes: &Attributes,
    ) -> Result<usize, interceptor::Error> {
        self.next_writer.write(pkts, attributes).await
    }
}

/// The bound adapter: implements [`Interceptor`] against a single
/// [`BandwidthEstimator`] instance plus its two background tasks.
pub struct GccBandwidthAdapter {
    shared: Arc<Shared>,
    remb_task: Mutex<Option<JoinHandle<()>>>,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

impl GccBandwidthAdapter {
    fn new(config: EstimatorConfig) -> GccBandwidthAdapter {
        let shared = Arc::new(Shared {
            estimator: Mutex::new(BandwidthEstimator::new(config.clone())),
            extension_ids: ExtensionIds::new(),
            streams: Mutex::new(HashMap::new()),
            writer: Mutex::new(None),
            config,
            shutdown: Notify::new(),
        });
        GccBandwidthAdapter {
            shared,
            remb_task: Mutex::new(None),
            cleanup_task: Mutex::new(None),
        }
    }

    /// Current bandwidth estimate in bits/s, for callers that want it
    /// outside the REMB path (e.g. a UI or logging sink).
    pub async fn current_estimate(&self) -> u64 {
        self.shared.estimator.lock().await.current_estimate()
    }

    fn ensure_cleanup_task(&self) {
        let mut guard = self.cleanup_task.try_lock().expect("only touched at bind time");
        if guard.is_some() {
            return;
        }
        let shared = self.shared.clone();
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CLEANUP_TICK);
            loop {
                tokio::select! {
                    _ = ticker.tick() => cleanup_stale_streams(&shared).await,
                    _ = shared.shutdown.notified() => break,
                }
            }
        }));
    }
}

async fn cleanup_stale_streams(shared: &Shared) {
    let timeout = shared.config.stream_timeout;
    let now = Instant::now();
    let stale: Vec<u32> = {
        let streams = shared.streams.lock().await;
        streams
            .iter()
            .filter(|(_, state)| now.saturating_duration_since(state.last_packet) > timeout)
            .map(|(ssrc, _)| *ssrc)
            .collect()
    };
    for ssrc in stale {
        log::info!("cleanup sweep removing ssrc {ssrc}: silent for longer than {timeout:?}");
        shared.remove_stream(ssrc).await;
    }
}

async fn remb_loop(shared: Arc<Shared>) {
    let mut ticker = tokio::time::interval(shared.config.remb.interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shared.shutdown.notified() => break,
        }

        let writer = shared.writer.lock().await.clone();
        let Some(writer) = writer else { continue };

        let (bytes, should_send, err) = {
            let mut estimator = shared.estimator.lock().await;
            estimator.maybe_build_remb(Instant::now())
        };

        if let Some(err) = err {
            log::warn!("failed to encode REMB packet: {err}");
            continue;
        }
        if !should_send {
            continue;
        }
        let Some(bytes) = bytes else { continue };

        if let Err(err) = deliver_remb(writer.as_ref(), bytes).await {
            log::warn!("{}: {err}", EstimatorError::WriterError);
        }
    }
}

async fn deliver_remb(
    writer: &(dyn RTCPWriter + Send + Sync),
    bytes: bytes::Bytes,
) -> Result<usize, interceptor::Error> {
    use webrtc::util::marshal::Unmarshal;
    let mut buf = bytes;
    let packet = webrtc::rtcp::payload_feedbacks::receiver_estimated_maximum_bitrate::ReceiverEstimatedMaximumBitrate::unmarshal(&mut buf)?;
    writer
        .write(&[Box::new(packet)], &Attributes::default())
        .await
}

#[async_trait]
impl Interceptor for GccBandwidthAdapter {
    async fn bind_rtcp_reader(
        &self,
        reader: Arc<dyn RTCPReader + Send + Sync>,
    ) -> Arc<dyn RTCPReader + Send + Sync> {
        reader
    }

    async fn bind_rtcp_writer(
        &self,
        writer: Arc<dyn RTCPWriter + Send + Sync>,
    ) -> Arc<dyn RTCPWriter + Send + Sync> {
        {
            let mut guard = self.shared.writer.lock().await;
            *guard = Some(writer.clone());
        }

        let mut remb_task = self.remb_task.lock().await;
        if remb_task.is_none() {
            let shared = self.shared.clone();
            *remb_task = Some(tokio::spawn(remb_loop(shared)));
        }

        Arc::new(FeedbackWriterStream {
            shared: self.shared.clone(),
            next_writer: writer,
        })
    }

    async fn bind_local_stream(
        &self,
        _info: &StreamInfo,
        writer: Arc<dyn RTPWriter + Send + Sync>,
    ) -> Arc<dyn RTPWriter + Send + Sync> {
        writer
    }

    async fn unbind_local_stream(&self, _info: &StreamInfo) {}

    async fn bind_remote_stream(
        &self,
        info: &StreamInfo,
        reader: Arc<dyn RTPReader + Send + Sync>,
    ) -> Arc<dyn RTPReader + Send + Sync> {
        if let Some(err) = self.shared.extension_ids.bind(&info.rtp_header_extensions) {
            log::warn!("ssrc {}: {err}", info.ssrc);
        }

        self.shared.streams.lock().await.insert(
            info.ssrc,
            StreamState {
                last_packet: Instant::now(),
            },
        );
        log::info!("bound remote stream ssrc {}", info.ssrc);

        self.ensure_cleanup_task();

        Arc::new(RemoteReaderStream {
            shared: self.shared.clone(),
            ssrc: info.ssrc,
            next_reader: reader,
        })
    }

    async fn unbind_remote_stream(&self, info: &StreamInfo) {
        log::info!("unbound remote stream ssrc {}", info.ssrc);
        self.shared.remove_stream(info.ssrc).await;
    }

    async fn close(&self) -> Result<(), interceptor::Error> {
        log::info!("closing adapter");
        self.shared.shutdown.notify_waiters();

        if let Some(task) = self.remb_task.lock().await.take() {
            let _ = task.await;
        }
        if let Some(task) = self.cleanup_task.lock().await.take() {
            let _ = task.await;
        }
        Ok(())
    }
}

/// Builds a [`GccBandwidthAdapter`] for each peer connection, mirroring
/// `TwccInterceptorBuilder`.
pub struct GccBandwidthAdapterBuilder {
    config: EstimatorConfig,
}

impl GccBandwidthAdapterBuilder {
    pub fn new(config: EstimatorConfig) -> GccBandwidthAdapterBuilder {
        GccBandwidthAdapterBuilder { config }
    }
}

impl InterceptorBuilder for GccBandwidthAdapterBuilder {
    fn build(&self, _id: &str) -> Result<Arc<dyn Interceptor + Send + Sync>, interceptor::Error> {
        Ok(Arc::new(GccBandwidthAdapter::new(self.config.clone())))
    }
}
