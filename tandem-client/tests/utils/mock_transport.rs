use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tandem_client::{
    CallAnswerer, CallControl, CallError, CallEvent, IdentityError, IncomingCall, LocalStream,
    MediaCall, PeerEndpoint, RemoteStream, Transport,
};
use tandem_core::TransportId;
use tokio::sync::{Notify, mpsc};

#[derive(Default)]
struct HubState {
    endpoints: HashMap<TransportId, mpsc::UnboundedSender<IncomingCall>>,
    calls: Vec<(TransportId, TransportId)>,
    destroyed: Vec<TransportId>,
    closed_calls: usize,
    links: Vec<Weak<CallLink>>,
}

/// In-memory stand-in for the broker and the peer-to-peer network. Calls
/// between endpoints of the same hub connect instantly once answered.
#[derive(Default)]
pub struct MockHub {
    state: Mutex<HubState>,
    next_id: AtomicUsize,
    fail_identity: AtomicBool,
    fail_calls: AtomicBool,
    reconnectable: AtomicBool,
    identity_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn transport(self: &Arc<Self>) -> Arc<MockTransport> {
        Arc::new(MockTransport { hub: self.clone() })
    }

    pub fn set_fail_identity(&self, fail: bool) {
        self.fail_identity.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_calls(&self, fail: bool) {
        self.fail_calls.store(fail, Ordering::SeqCst);
    }

    pub fn set_reconnectable(&self, reconnectable: bool) {
        self.reconnectable.store(reconnectable, Ordering::SeqCst);
    }

    /// Hold every identity request until the returned gate is notified.
    pub fn gate_identities(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.identity_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Deliver `err` to both ends of every call that is still open.
    pub fn fail_open_calls(&self, err: CallError) {
        let links: Vec<Arc<CallLink>> = self
            .state
            .lock()
            .unwrap()
            .links
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for link in links.iter().filter(|link| !link.closed.load(Ordering::SeqCst)) {
            let _ = link.caller_tx.try_send(CallEvent::Error(err.clone()));
            let _ = link.callee_tx.try_send(CallEvent::Error(err.clone()));
        }
    }

    /// (caller, callee) of every call placed so far.
    pub fn calls(&self) -> Vec<(TransportId, TransportId)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn destroyed(&self) -> Vec<TransportId> {
        self.state.lock().unwrap().destroyed.clone()
    }

    pub fn closed_calls(&self) -> usize {
        self.state.lock().unwrap().closed_calls
    }

    pub fn is_online(&self, id: &TransportId) -> bool {
        self.state.lock().unwrap().endpoints.contains_key(id)
    }

    /// Identities currently registered with the hub.
    pub fn online(&self) -> usize {
        self.state.lock().unwrap().endpoints.len()
    }

    /// Simulate the broker dropping an identity.
    pub fn drop_identity(&self, id: &TransportId) {
        self.state.lock().unwrap().endpoints.remove(id);
    }
}

pub struct MockTransport {
    hub: Arc<MockHub>,
}

impl MockTransport {
    pub async fn endpoint(&self) -> Arc<dyn PeerEndpoint> {
        self.create_identity().await.unwrap()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn create_identity(&self) -> Result<Arc<dyn PeerEndpoint>, IdentityError> {
        let gate = self.hub.identity_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.hub.fail_identity.load(Ordering::SeqCst) {
            return Err(IdentityError::Unreachable("broker is down".into()));
        }
        let n = self.hub.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = TransportId::try_from(format!("peer-{}", n)).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        self.hub
            .state
            .lock()
            .unwrap()
            .endpoints
            .insert(id.clone(), tx);

        Ok(Arc::new(MockEndpoint {
            id,
            hub: self.hub.clone(),
            incoming: tokio::sync::Mutex::new(rx),
            destroyed: AtomicBool::new(false),
        }))
    }
}

pub struct MockEndpoint {
    id: TransportId,
    hub: Arc<MockHub>,
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<IncomingCall>>,
    destroyed: AtomicBool,
}

#[async_trait]
impl PeerEndpoint for MockEndpoint {
    fn id(&self) -> TransportId {
        self.id.clone()
    }

    async fn call(
        &self,
        remote: &TransportId,
        local: &LocalStream,
    ) -> Result<MediaCall, CallError> {
        let callee = {
            let mut state = self.hub.state.lock().unwrap();
            state.calls.push((self.id.clone(), remote.clone()));
            state.endpoints.get(remote).cloned()
        };
        if self.hub.fail_calls.load(Ordering::SeqCst) {
            return Err(CallError::Negotiation("offer rejected".into()));
        }
        let callee = callee.ok_or_else(|| CallError::PeerUnavailable(remote.clone()))?;

        let (caller_tx, caller_rx) = mpsc::channel(8);
        let (callee_tx, callee_rx) = mpsc::channel(8);
        let link = Arc::new(CallLink {
            hub: self.hub.clone(),
            caller_tx,
            callee_tx,
            closed: AtomicBool::new(false),
        });
        self.hub
            .state
            .lock()
            .unwrap()
            .links
            .push(Arc::downgrade(&link));
        let answerer = MockAnswerer {
            caller: self.id.clone(),
            caller_stream: local.id().to_owned(),
            link: link.clone(),
            events: callee_rx,
        };
        callee
            .send(IncomingCall::new(self.id.clone(), Box::new(answerer)))
            .map_err(|_| CallError::PeerUnavailable(remote.clone()))?;

        Ok(MediaCall::new(remote.clone(), caller_rx, link))
    }

    async fn accept(&self) -> Result<IncomingCall, IdentityError> {
        self.incoming
            .lock()
            .await
            .recv()
            .await
            .ok_or(IdentityError::Lost)
    }

    async fn reconnect(&self) -> Result<(), IdentityError> {
        if !self.hub.reconnectable.load(Ordering::SeqCst) {
            return Err(IdentityError::ReconnectUnsupported);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.hub
            .state
            .lock()
            .unwrap()
            .endpoints
            .insert(self.id.clone(), tx);
        *self.incoming.lock().await = rx;
        Ok(())
    }

    async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut state = self.hub.state.lock().unwrap();
        state.endpoints.remove(&self.id);
        state.destroyed.push(self.id.clone());
    }
}

struct CallLink {
    hub: Arc<MockHub>,
    caller_tx: mpsc::Sender<CallEvent>,
    callee_tx: mpsc::Sender<CallEvent>,
    closed: AtomicBool,
}

#[async_trait]
impl CallControl for CallLink {
    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.hub.state.lock().unwrap().closed_calls += 1;
        let _ = self.caller_tx.try_send(CallEvent::Closed);
        let _ = self.callee_tx.try_send(CallEvent::Closed);
    }
}

struct MockAnswerer {
    caller: TransportId,
    caller_stream: String,
    link: Arc<CallLink>,
    events: mpsc::Receiver<CallEvent>,
}

#[async_trait]
impl CallAnswerer for MockAnswerer {
    async fn answer(self: Box<Self>, local: &LocalStream) -> Result<MediaCall, CallError> {
        let _ = self
            .link
            .caller_tx
            .send(CallEvent::Stream(RemoteStream::new(local.id(), Vec::new())))
            .await;
        let _ = self
            .link
            .callee_tx
            .send(CallEvent::Stream(RemoteStream::new(
                self.caller_stream.clone(),
                Vec::new(),
            )))
            .await;
        Ok(MediaCall::new(self.caller, self.events, self.link))
    }

    async fn decline(self: Box<Self>) {
        self.link.close().await;
    }
}
