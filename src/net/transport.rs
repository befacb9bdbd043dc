//! Transport collaborator seam
//!
//! The session core never talks to a socket. It consumes the [`Transport`]
//! trait, injected at construction, and relies on three properties of the
//! underlying channel: delivery is FIFO per participant, at-least-once
//! (duplicates possible), and arbitrarily delayed. [`LoopbackNetwork`]
//! provides the in-memory implementation used by tests and the demo host.

use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Network connection id, unique per session, assigned by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// One host-authoritative field value on the wire
///
/// Replication is last-write-wins per field; receivers apply values
/// idempotently, so redelivery is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FieldUpdate {
    PlayerCount(u32),
    OccupiedSpawnSlots(u32),
    GameStarted(bool),
    /// One joiner's spawn ordinal, written once by the host at join time
    SpawnAssigned { target: ClientId, ordinal: u32 },
}

/// Replication and membership primitive consumed by the session core
///
/// `replicate` is fire-and-forget and must never block; `poll_updates`
/// returns whatever has arrived since the last poll, in delivery order,
/// without waiting.
pub trait Transport: Send + Sync {
    fn local_participant_id(&self) -> ClientId;
    fn is_host(&self) -> bool;
    fn connected_participant_count(&self) -> u32;
    fn connected_participants(&self) -> Vec<ClientId>;
    fn replicate(&self, update: FieldUpdate);
    fn poll_updates(&self) -> Vec<FieldUpdate>;
}

struct PeerQueue {
    id: ClientId,
    sender: Sender<Vec<u8>>,
}

#[derive(Default)]
struct HubState {
    next_client: u64,
    peers: Vec<PeerQueue>,
}

/// In-memory hub connecting loopback endpoints
///
/// The first endpoint to connect becomes the host. Field updates are
/// bincode-encoded and fanned out to every connected endpoint, the host's
/// own included, so all participants observe replicated state through the
/// same path.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    state: Arc<Mutex<HubState>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a new endpoint; the first one is the host
    pub fn connect(&self) -> LoopbackEndpoint {
        let mut state = self.state.lock();
        let id = ClientId(state.next_client);
        state.next_client += 1;

        let (sender, receiver) = unbounded();
        let is_host = state.peers.is_empty();
        state.peers.push(PeerQueue { id, sender });

        LoopbackEndpoint {
            id,
            is_host,
            hub: self.state.clone(),
            inbox: receiver,
        }
    }

    /// Drop an endpoint's membership (its queue closes with it)
    pub fn disconnect(&self, id: ClientId) {
        let mut state = self.state.lock();
        state.peers.retain(|p| p.id != id);
    }

    /// Redeliver `update` to every endpoint, simulating the channel's
    /// at-least-once behavior
    pub fn redeliver(&self, update: FieldUpdate) {
        broadcast(&self.state, update);
    }
}

fn broadcast(state: &Mutex<HubState>, update: FieldUpdate) {
    let bytes = match bincode::serde::encode_to_vec(update, bincode::config::standard()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to encode field update {:?}: {}", update, e);
            return;
        }
    };

    let state = state.lock();
    for peer in &state.peers {
        // A closed queue means the endpoint is gone; membership catches up
        // on the next disconnect sweep
        let _ = peer.sender.send(bytes.clone());
    }
}

/// One participant's view of the loopback network
pub struct LoopbackEndpoint {
    id: ClientId,
    is_host: bool,
    hub: Arc<Mutex<HubState>>,
    inbox: Receiver<Vec<u8>>,
}

impl Transport for LoopbackEndpoint {
    fn local_participant_id(&self) -> ClientId {
        self.id
    }

    fn is_host(&self) -> bool {
        self.is_host
    }

    fn connected_participant_count(&self) -> u32 {
        self.hub.lock().peers.len() as u32
    }

    fn connected_participants(&self) -> Vec<ClientId> {
        self.hub.lock().peers.iter().map(|p| p.id).collect()
    }

    fn replicate(&self, update: FieldUpdate) {
        if !self.is_host {
            warn!("{} attempted to replicate {:?} without host role", self.id, update);
            return;
        }
        broadcast(&self.hub, update);
    }

    fn poll_updates(&self) -> Vec<FieldUpdate> {
        self.inbox
            .try_iter()
            .filter_map(|bytes| {
                match bincode::serde::decode_from_slice(&bytes, bincode::config::standard()) {
                    Ok((update, _)) => Some(update),
                    Err(e) => {
                        warn!("{} dropped undecodable field update: {}", self.id, e);
                        None
                    }
                }
            })
            .collect()
    }
}
