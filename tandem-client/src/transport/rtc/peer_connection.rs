use crate::media::LocalStream;
use crate::transport::rtc::broker_link::EndpointInner;
use crate::transport::{
    CallAnswerer, CallControl, CallError, CallEvent, MediaCall, RemoteStream,
};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tandem_core::{CallId, IceServerConfig, SignalMessage, TransportId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

const EVENT_BUFFER: usize = 16;

/// `Disconnected` may still recover, so only `Failed` and `Closed` end a call.
fn state_event(state: RTCPeerConnectionState) -> Option<CallEvent> {
    match state {
        RTCPeerConnectionState::Failed => Some(CallEvent::Error(CallError::Transport(
            "peer connection failed".into(),
        ))),
        RTCPeerConnectionState::Closed => Some(CallEvent::Closed),
        _ => None,
    }
}

async fn new_peer_connection(ice_servers: &[IceServerConfig]) -> Result<Arc<RTCPeerConnection>> {
    let mut media = MediaEngine::default();
    media.register_default_codecs()?;
    let registry = register_default_interceptors(Registry::new(), &mut media)?;

    let api = APIBuilder::new()
        .with_media_engine(media)
        .with_interceptor_registry(registry)
        .build();

    let rtc_config = RTCConfiguration {
        ice_servers: ice_servers
            .iter()
            .map(|server| RTCIceServer {
                urls: server.urls.clone(),
                username: server.username.clone().unwrap_or_default(),
                credential: server.credential.clone().unwrap_or_default(),
            })
            .collect(),
        ..Default::default()
    };

    let peer_connection = api
        .new_peer_connection(rtc_config)
        .await
        .context("Failed to create peer connection")?;
    Ok(Arc::new(peer_connection))
}

/// Peer connection with the state, ICE and track callbacks of one call wired in.
async fn prepare(
    endpoint: &Arc<EndpointInner>,
    peer: &TransportId,
    call_id: &CallId,
) -> Result<(Arc<RTCPeerConnection>, mpsc::Sender<CallEvent>, mpsc::Receiver<CallEvent>)> {
    let pc = new_peer_connection(&endpoint.ice_servers).await?;
    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

    let state_tx = events_tx.clone();
    let state_call = call_id.clone();
    pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
        let tx = state_tx.clone();
        let call_id = state_call.clone();
        Box::pin(async move {
            info!("Peer connection state of call {}: {:?}", call_id, s);
            if let Some(event) = state_event(s) {
                let _ = tx.send(event).await;
            }
        })
    }));

    let ice_endpoint = endpoint.clone();
    let ice_peer = peer.clone();
    let ice_call = call_id.clone();
    pc.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
        let endpoint = ice_endpoint.clone();
        let peer = ice_peer.clone();
        let call_id = ice_call.clone();
        Box::pin(async move {
            let Some(candidate) = c else { return };
            let Ok(init) = candidate.to_json() else {
                return;
            };
            endpoint.send(SignalMessage::IceCandidate {
                peer,
                call_id,
                candidate: init.candidate,
                sdp_mid: init.sdp_mid,
                sdp_m_line_index: init.sdp_mline_index,
            });
        })
    }));

    let track_tx = events_tx.clone();
    let track_call = call_id.clone();
    let received: Arc<Mutex<Vec<Arc<TrackRemote>>>> = Arc::new(Mutex::new(Vec::new()));
    pc.on_track(Box::new(
        move |track: Arc<TrackRemote>,
              _receiver: Arc<RTCRtpReceiver>,
              _transceiver: Arc<RTCRtpTransceiver>| {
            let tx = track_tx.clone();
            let call_id = track_call.clone();
            let received = received.clone();
            Box::pin(async move {
                debug!("Remote track arrived on call {}", call_id);
                let tracks = {
                    let mut guard = received.lock().unwrap_or_else(|e| e.into_inner());
                    guard.push(track);
                    guard.clone()
                };
                let _ = tx
                    .send(CallEvent::Stream(RemoteStream::new(call_id, tracks)))
                    .await;
            })
        },
    ));

    Ok((pc, events_tx, events_rx))
}

async fn attach_local(pc: &RTCPeerConnection, local: &LocalStream) -> Result<()> {
    for track in local.tracks() {
        let sender = pc
            .add_track(track.rtc() as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .with_context(|| format!("Failed to attach local {} track", track.kind()))?;
        // RTCP has to be drained for the interceptors to run.
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        });
    }
    Ok(())
}

async fn close_quietly(pc: &RTCPeerConnection) {
    if let Err(e) = pc.close().await {
        debug!("Error closing peer connection: {}", e);
    }
}

pub(super) async fn place_call(
    endpoint: Arc<EndpointInner>,
    peer: TransportId,
    call_id: CallId,
    local: &LocalStream,
) -> Result<MediaCall> {
    // Owns the route and the peer connection from here on, also if this
    // future is dropped half way.
    let control = Arc::new(RtcCallControl::new(endpoint.clone(), peer.clone(), call_id.clone()));
    let inbox = endpoint.open_route(&call_id, &peer);
    let (pc, events_tx, events_rx) = prepare(&endpoint, &peer, &call_id).await?;
    control.bind(pc.clone());

    let offered: Result<()> = async {
        attach_local(&pc, local).await?;
        let offer = pc.create_offer(None).await.context("Failed to create offer")?;
        pc.set_local_description(offer.clone())
            .await
            .context("Failed to set local description")?;
        if !endpoint.send(SignalMessage::Offer {
            peer: peer.clone(),
            call_id: call_id.clone(),
            sdp: offer.sdp,
        }) {
            bail!("Broker connection is closed");
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;
    if let Err(e) = offered {
        control.close().await;
        return Err(e);
    }

    info!("Offer for call {} sent to {}", call_id, peer);
    tokio::spawn(negotiate(pc, inbox, events_tx, false, control.closed.clone()));
    Ok(MediaCall::new(peer, events_rx, control))
}

async fn accept_offer(
    control: Arc<RtcCallControl>,
    offer: String,
    local: &LocalStream,
    inbox: mpsc::UnboundedReceiver<SignalMessage>,
) -> Result<MediaCall> {
    let endpoint = control.endpoint.clone();
    let peer = control.peer.clone();
    let call_id = control.call_id.clone();
    let (pc, events_tx, events_rx) = prepare(&endpoint, &peer, &call_id).await?;
    control.bind(pc.clone());

    let answered: Result<()> = async {
        let desc = RTCSessionDescription::offer(offer)?;
        pc.set_remote_description(desc)
            .await
            .context("Failed to apply remote offer")?;
        attach_local(&pc, local).await?;
        let answer = pc.create_answer(None).await.context("Failed to create answer")?;
        pc.set_local_description(answer.clone())
            .await
            .context("Failed to set local description")?;
        if !endpoint.send(SignalMessage::Answer {
            peer: peer.clone(),
            call_id: call_id.clone(),
            sdp: answer.sdp,
        }) {
            bail!("Broker connection is closed");
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;
    answered?;

    info!("Answered call {} from {}", call_id, peer);
    tokio::spawn(negotiate(pc, inbox, events_tx, true, control.closed.clone()));
    Ok(MediaCall::new(peer, events_rx, control))
}

/// Applies the remote side's negotiation messages for one call. Candidates
/// that arrive before the remote description are held back.
async fn negotiate(
    pc: Arc<RTCPeerConnection>,
    mut inbox: mpsc::UnboundedReceiver<SignalMessage>,
    events: mpsc::Sender<CallEvent>,
    mut remote_set: bool,
    closed: Arc<AtomicBool>,
) {
    let mut pending: Vec<RTCIceCandidateInit> = Vec::new();

    loop {
        let Some(msg) = inbox.recv().await else {
            // Route gone without a hangup: either closed here or the broker
            // connection dropped. Only the latter matters, and only before
            // the peers are connected directly.
            if !closed.load(Ordering::Acquire)
                && pc.connection_state() != RTCPeerConnectionState::Connected
            {
                warn!("Broker connection lost while negotiating a call");
                let _ = events.send(CallEvent::Error(CallError::SignalingLost)).await;
            }
            break;
        };
        match msg {
            SignalMessage::Answer { sdp, .. } if !remote_set => {
                let applied = match RTCSessionDescription::answer(sdp) {
                    Ok(desc) => pc.set_remote_description(desc).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = applied {
                    let _ = events
                        .send(CallEvent::Error(CallError::Negotiation(e.to_string())))
                        .await;
                    break;
                }
                remote_set = true;
                for candidate in pending.drain(..) {
                    if let Err(e) = pc.add_ice_candidate(candidate).await {
                        warn!("Failed to add ICE candidate: {}", e);
                    }
                }
            }
            SignalMessage::Answer { call_id, .. } => {
                debug!("Ignoring repeated answer for call {}", call_id)
            }
            SignalMessage::IceCandidate {
                candidate,
                sdp_mid,
                sdp_m_line_index,
                ..
            } => {
                let candidate = RTCIceCandidateInit {
                    candidate,
                    sdp_mid,
                    sdp_mline_index: sdp_m_line_index,
                    username_fragment: None,
                };
                if !remote_set {
                    pending.push(candidate);
                } else if let Err(e) = pc.add_ice_candidate(candidate).await {
                    warn!("Failed to add ICE candidate: {}", e);
                }
            }
            SignalMessage::Hangup { peer, call_id } => {
                info!("{} hung up call {}", peer, call_id);
                let _ = events.send(CallEvent::Closed).await;
                break;
            }
            SignalMessage::Expire { peer } => {
                let _ = events
                    .send(CallEvent::Error(CallError::PeerUnavailable(peer)))
                    .await;
                break;
            }
            other => debug!("Unexpected message on call: {:?}", other),
        }
    }
}

/// An offer waiting to be answered. Dropping it unanswered declines the call.
pub(super) struct RtcAnswerer {
    endpoint: Arc<EndpointInner>,
    peer: TransportId,
    call_id: CallId,
    offer: String,
    inbox: Option<mpsc::UnboundedReceiver<SignalMessage>>,
    settled: bool,
}

impl RtcAnswerer {
    pub(super) fn new(
        endpoint: Arc<EndpointInner>,
        peer: TransportId,
        call_id: CallId,
        offer: String,
        inbox: mpsc::UnboundedReceiver<SignalMessage>,
    ) -> Self {
        Self {
            endpoint,
            peer,
            call_id,
            offer,
            inbox: Some(inbox),
            settled: false,
        }
    }

    fn reject(&mut self) {
        if std::mem::replace(&mut self.settled, true) {
            return;
        }
        self.endpoint.send(SignalMessage::Hangup {
            peer: self.peer.clone(),
            call_id: self.call_id.clone(),
        });
        self.endpoint.close_route(&self.call_id);
    }
}

#[async_trait]
impl CallAnswerer for RtcAnswerer {
    async fn answer(self: Box<Self>, local: &LocalStream) -> Result<MediaCall, CallError> {
        let mut this = self;
        this.settled = true;
        let control = Arc::new(RtcCallControl::new(
            this.endpoint.clone(),
            this.peer.clone(),
            this.call_id.clone(),
        ));
        let Some(inbox) = this.inbox.take() else {
            control.close().await;
            return Err(CallError::Negotiation("offer was already consumed".into()));
        };
        let offer = std::mem::take(&mut this.offer);

        match accept_offer(control.clone(), offer, local, inbox).await {
            Ok(call) => Ok(call),
            Err(e) => {
                control.close().await;
                Err(CallError::Negotiation(format!("{:#}", e)))
            }
        }
    }

    async fn decline(self: Box<Self>) {
        let mut this = self;
        info!("Declining call {} from {}", this.call_id, this.peer);
        this.reject();
    }
}

impl Drop for RtcAnswerer {
    fn drop(&mut self) {
        if !self.settled {
            debug!("Call {} from {} dropped unanswered", self.call_id, self.peer);
            self.reject();
        }
    }
}

/// Owner of one call's route and peer connection. Closing hangs up; dropping
/// it while still open does the same in the background.
struct RtcCallControl {
    endpoint: Arc<EndpointInner>,
    peer: TransportId,
    call_id: CallId,
    pc: OnceLock<Arc<RTCPeerConnection>>,
    closed: Arc<AtomicBool>,
}

impl RtcCallControl {
    fn new(endpoint: Arc<EndpointInner>, peer: TransportId, call_id: CallId) -> Self {
        Self {
            endpoint,
            peer,
            call_id,
            pc: OnceLock::new(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn bind(&self, pc: Arc<RTCPeerConnection>) {
        let _ = self.pc.set(pc);
    }

    /// Tell the peer and forget the route. False if that already happened.
    fn hang_up(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.endpoint.send(SignalMessage::Hangup {
            peer: self.peer.clone(),
            call_id: self.call_id.clone(),
        });
        self.endpoint.close_route(&self.call_id);
        true
    }
}

#[async_trait]
impl CallControl for RtcCallControl {
    async fn close(&self) {
        if !self.hang_up() {
            return;
        }
        if let Some(pc) = self.pc.get() {
            close_quietly(pc).await;
        }
        info!("Call {} with {} closed", self.call_id, self.peer);
    }
}

impl Drop for RtcCallControl {
    fn drop(&mut self) {
        if !self.hang_up() {
            return;
        }
        debug!("Call {} with {} dropped while open", self.call_id, self.peer);
        let Some(pc) = self.pc.take() else { return };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { close_quietly(&pc).await });
            }
            Err(_) => warn!("No runtime to close the peer connection of call {}", self.call_id),
        }
    }
}
