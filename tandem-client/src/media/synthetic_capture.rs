use crate::media::{LocalStream, LocalTrack, MediaCapture, MediaConstraints, MediaError, TrackKind};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

const AUDIO_FRAME: Duration = Duration::from_millis(20);
const VIDEO_FRAME: Duration = Duration::from_millis(33);

// Opus DTX silence frame.
const SILENCE: &[u8] = &[0xf8, 0xff, 0xfe];
const PLACEHOLDER_FRAME: &[u8] = &[0x10, 0x02, 0x00, 0x9d, 0x01, 0x2a, 0x10, 0x00, 0x10, 0x00];

/// Build an unbound WebRTC sample track for a capture of the given kind.
pub fn sample_track(kind: TrackKind, stream_id: &str) -> Arc<TrackLocalStaticSample> {
    let codec = match kind {
        TrackKind::Audio => RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            clock_rate: 48000,
            channels: 2,
            ..Default::default()
        },
        TrackKind::Video => RTCRtpCodecCapability {
            mime_type: MIME_TYPE_VP8.to_owned(),
            clock_rate: 90000,
            ..Default::default()
        },
    };
    Arc::new(TrackLocalStaticSample::new(
        codec,
        kind.to_string(),
        stream_id.to_owned(),
    ))
}

/// Headless capture device. Feeds placeholder samples into each track at a
/// fixed cadence while the track is enabled.
#[derive(Debug, Clone)]
pub struct SyntheticCapture {
    audio_interval: Duration,
    video_interval: Duration,
}

impl Default for SyntheticCapture {
    fn default() -> Self {
        Self {
            audio_interval: AUDIO_FRAME,
            video_interval: VIDEO_FRAME,
        }
    }
}

impl SyntheticCapture {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MediaCapture for SyntheticCapture {
    async fn acquire(&self, constraints: MediaConstraints) -> Result<LocalStream, MediaError> {
        if !constraints.audio && !constraints.video {
            return Err(MediaError::DeviceUnavailable(
                "no audio or video track requested".into(),
            ));
        }

        let stream_id = Uuid::new_v4().to_string();
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(LocalTrack::new(
                TrackKind::Audio,
                sample_track(TrackKind::Audio, &stream_id),
            ));
        }
        if constraints.video {
            tracks.push(LocalTrack::new(
                TrackKind::Video,
                sample_track(TrackKind::Video, &stream_id),
            ));
        }

        let stream = LocalStream::new(stream_id, tracks);
        for track in stream.tracks() {
            let (payload, interval) = match track.kind() {
                TrackKind::Audio => (Bytes::from_static(SILENCE), self.audio_interval),
                TrackKind::Video => (Bytes::from_static(PLACEHOLDER_FRAME), self.video_interval),
            };
            tokio::spawn(pump(track.clone(), stream.stop_token(), payload, interval));
        }

        info!("Synthetic capture started: {:?}", stream);
        Ok(stream)
    }
}

async fn pump(track: LocalTrack, stop: CancellationToken, payload: Bytes, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                if !track.is_enabled() {
                    continue;
                }
                let sample = Sample {
                    data: payload.clone(),
                    duration: interval,
                    ..Default::default()
                };
                if let Err(e) = track.rtc().write_sample(&sample).await {
                    debug!("Dropping {} sample: {}", track.kind(), e);
                }
            }
        }
    }
    debug!("Capture pump for {} track stopped", track.kind());
}
