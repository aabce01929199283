use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// Which tracks to request from the capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// One captured track. Disabling it keeps it attached to any call; the
/// capture side just stops feeding samples, so the remote end sees a frozen
/// picture or silence.
#[derive(Clone)]
pub struct LocalTrack {
    kind: TrackKind,
    enabled: Arc<AtomicBool>,
    rtc: Arc<TrackLocalStaticSample>,
}

impl LocalTrack {
    pub fn new(kind: TrackKind, rtc: Arc<TrackLocalStaticSample>) -> Self {
        Self {
            kind,
            enabled: Arc::new(AtomicBool::new(true)),
            rtc,
        }
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn rtc(&self) -> Arc<TrackLocalStaticSample> {
        self.rtc.clone()
    }
}

struct LocalStreamInner {
    id: String,
    tracks: Vec<LocalTrack>,
    stop: CancellationToken,
}

impl Drop for LocalStreamInner {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// Handle to captured local media. Clones share the same tracks; the capture
/// stops on `stop()` or when the last handle is dropped.
#[derive(Clone)]
pub struct LocalStream {
    inner: Arc<LocalStreamInner>,
}

impl LocalStream {
    pub fn new(id: impl Into<String>, tracks: Vec<LocalTrack>) -> Self {
        Self {
            inner: Arc::new(LocalStreamInner {
                id: id.into(),
                tracks,
                stop: CancellationToken::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.inner.tracks
    }

    pub fn track(&self, kind: TrackKind) -> Option<&LocalTrack> {
        self.inner.tracks.iter().find(|track| track.kind == kind)
    }

    /// False when the stream has no track of that kind.
    pub fn is_enabled(&self, kind: TrackKind) -> bool {
        self.track(kind).is_some_and(LocalTrack::is_enabled)
    }

    /// Flip a track's enabled flag. Returns the new value, `None` if there is
    /// no such track or the stream is stopped.
    pub fn toggle(&self, kind: TrackKind) -> Option<bool> {
        if self.is_stopped() {
            return None;
        }
        let track = self.track(kind)?;
        let enabled = !track.is_enabled();
        track.set_enabled(enabled);
        Some(enabled)
    }

    /// Stop capturing. Idempotent.
    pub fn stop(&self) {
        self.inner.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stop.is_cancelled()
    }

    /// Token cancelled when capture must stop; capture pumps select on it.
    pub fn stop_token(&self) -> CancellationToken {
        self.inner.stop.clone()
    }
}

impl fmt::Debug for LocalStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStream")
            .field("id", &self.inner.id)
            .field(
                "tracks",
                &self
                    .inner
                    .tracks
                    .iter()
                    .map(|t| (t.kind, t.is_enabled()))
                    .collect::<Vec<_>>(),
            )
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
