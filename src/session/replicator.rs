//! Host-authoritative session counters and game-start gating
//!
//! The host mirrors the transport's membership into the replicated
//! `SessionState` every tick and flips the game-started flag when the
//! player cap is reached (or when the host starts the game manually).
//! Every other participant holds a read-only replica and turns incoming
//! field updates into local lifecycle events.

use std::sync::Arc;

use hashbrown::HashMap;
use tracing::{debug, info, warn};

use crate::net::transport::{ClientId, FieldUpdate, Transport};
use crate::session::participant::ParticipantRegistry;
use crate::session::state::{Authority, AuthorityError, SessionState};

/// What changed during one replicator tick, in observation order
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicatorEvent {
    PlayerJoined { count: u32 },
    PlayerLeft { count: u32 },
    /// A participant received its spawn ordinal (host-assigned, replicated
    /// explicitly so every process sees the same target/ordinal pairs)
    SpawnAssigned { client_id: ClientId, ordinal: u32 },
    GameStarted,
}

/// Replicated-counter state machine over [`SessionState`]
pub struct SessionReplicator {
    transport: Arc<dyn Transport>,
    role: Authority,
    replica: SessionState,
    registry: ParticipantRegistry,
    /// Spawn ordinals by participant, filled from explicit assignment
    /// updates; also the dedup set for their redelivery
    assignments: HashMap<ClientId, u32>,
    max_players: u32,
    pending: Vec<ReplicatorEvent>,
}

impl SessionReplicator {
    pub fn new(transport: Arc<dyn Transport>, max_players: u32) -> Self {
        let role = if transport.is_host() {
            Authority::HostOnly
        } else {
            Authority::ReadOnlyReplica
        };
        Self {
            transport,
            role,
            replica: SessionState::new(),
            registry: ParticipantRegistry::new(),
            assignments: HashMap::new(),
            max_players,
            pending: Vec::new(),
        }
    }

    /// Replicated spawn ordinal for `client_id`, if one has arrived
    pub fn spawn_ordinal(&self, client_id: ClientId) -> Option<u32> {
        self.assignments.get(&client_id).copied()
    }

    /// Latest locally-known replicated state
    pub fn replica(&self) -> &SessionState {
        &self.replica
    }

    pub fn is_host(&self) -> bool {
        self.role == Authority::HostOnly
    }

    pub fn max_players(&self) -> u32 {
        self.max_players
    }

    /// Host-side participant records; empty on replicas
    pub fn registry(&self) -> &ParticipantRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ParticipantRegistry {
        &mut self.registry
    }

    /// Advance one fixed step; returns the lifecycle events it produced
    pub fn tick(&mut self) -> Vec<ReplicatorEvent> {
        let mut events = std::mem::take(&mut self.pending);

        self.apply_incoming(&mut events);
        if self.is_host() {
            self.sync_membership(&mut events);
            self.check_capacity(&mut events);
        }

        events
    }

    /// Host start trigger (lobby "press enter" path)
    ///
    /// The same monotonic flag as the capacity gate: starting an already
    /// started game is a no-op, and a replica calling this is an authority
    /// violation.
    pub fn start_game(&mut self) -> Result<(), AuthorityError> {
        if self.set_game_started()? {
            info!("Host has started the game");
        }
        Ok(())
    }

    /// Host bookkeeping after a spawn assignment
    pub fn set_occupied_slots(&mut self, occupied: u32) -> Result<(), AuthorityError> {
        self.write_field(FieldUpdate::OccupiedSpawnSlots(occupied))?;
        Ok(())
    }

    /// Mutate one replicated field and fan it out; host only
    fn write_field(&mut self, update: FieldUpdate) -> Result<bool, AuthorityError> {
        if !self.role.can_write(self.transport.local_participant_id()) {
            warn!(
                "{} rejected: {:?} requires host authority",
                self.transport.local_participant_id(),
                update
            );
            return Err(AuthorityError::NotHost);
        }
        let changed = self.replica.apply(update);
        if changed {
            self.transport.replicate(update);
        }
        Ok(changed)
    }

    fn set_game_started(&mut self) -> Result<bool, AuthorityError> {
        let changed = self.write_field(FieldUpdate::GameStarted(true))?;
        if changed {
            self.pending.push(ReplicatorEvent::GameStarted);
        }
        Ok(changed)
    }

    /// Drain the transport and apply updates idempotently
    ///
    /// The host discards its inbox wholesale: every update on the wire
    /// originated from its own `write_field`, which already mutated the
    /// replica at write time, and a queued echo may carry a value older
    /// than the current one. Replicas apply everything.
    fn apply_incoming(&mut self, events: &mut Vec<ReplicatorEvent>) {
        if self.is_host() {
            let _ = self.transport.poll_updates();
            return;
        }

        for update in self.transport.poll_updates() {
            if let FieldUpdate::SpawnAssigned { target, ordinal } = update {
                // One assignment per participant; redeliveries are dropped
                if self.assignments.insert(target, ordinal).is_none() {
                    debug!("{} assigned spawn ordinal {}", target, ordinal);
                    events.push(ReplicatorEvent::SpawnAssigned {
                        client_id: target,
                        ordinal,
                    });
                }
                continue;
            }

            let previous = self.replica;
            if !self.replica.apply(update) {
                continue;
            }
            match update {
                FieldUpdate::PlayerCount(count) => {
                    debug!(
                        "Player count changed from {} to {}",
                        previous.player_count, count
                    );
                    if count > previous.player_count {
                        events.push(ReplicatorEvent::PlayerJoined { count });
                    } else {
                        events.push(ReplicatorEvent::PlayerLeft { count });
                    }
                }
                FieldUpdate::GameStarted(true) => {
                    info!("Game started");
                    events.push(ReplicatorEvent::GameStarted);
                }
                FieldUpdate::GameStarted(false)
                | FieldUpdate::OccupiedSpawnSlots(_)
                | FieldUpdate::SpawnAssigned { .. } => {}
            }
        }
    }

    /// Host only: mirror transport membership into the replicated count
    fn sync_membership(&mut self, events: &mut Vec<ReplicatorEvent>) {
        let connected = self.transport.connected_participants();
        let (joined, left) = self.registry.diff(&connected);

        for client_id in left {
            if self.registry.leave(client_id).is_some() {
                let count = self.registry.len() as u32;
                debug!("{} left, {} players connected", client_id, count);
                // Floored at zero by construction: count mirrors the registry
                if self.write_field(FieldUpdate::PlayerCount(count)).unwrap_or(false) {
                    events.push(ReplicatorEvent::PlayerLeft { count });
                }
            }
        }

        for client_id in joined {
            if let Some(participant) = self.registry.join(client_id) {
                let count = self.registry.len() as u32;
                debug!(
                    "{} joined as player {}, {} players connected",
                    client_id, participant.ordinal, count
                );
                if self.write_field(FieldUpdate::PlayerCount(count)).unwrap_or(false) {
                    events.push(ReplicatorEvent::PlayerJoined { count });
                }
                self.replicate_assignment(client_id, participant.ordinal, events);
            }
        }
    }

    /// Host only: record one joiner's ordinal and fan it out
    ///
    /// Written after the `PlayerCount` for the same join, so with FIFO
    /// delivery no replica sees an assignment before the count it belongs
    /// to.
    fn replicate_assignment(
        &mut self,
        client_id: ClientId,
        ordinal: u32,
        events: &mut Vec<ReplicatorEvent>,
    ) {
        if self.assignments.insert(client_id, ordinal).is_none() {
            self.transport.replicate(FieldUpdate::SpawnAssigned {
                target: client_id,
                ordinal,
            });
            events.push(ReplicatorEvent::SpawnAssigned { client_id, ordinal });
        }
    }

    /// Host only: flip the start flag once the cap is reached
    fn check_capacity(&mut self, events: &mut Vec<ReplicatorEvent>) {
        if self.replica.game_started || self.replica.player_count < self.max_players {
            return;
        }
        if self.write_field(FieldUpdate::GameStarted(true)).unwrap_or(false) {
            info!(
                "Player cap {} reached, starting the game",
                self.max_players
            );
            events.push(ReplicatorEvent::GameStarted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::transport::LoopbackNetwork;

    fn pair(max_players: u32) -> (LoopbackNetwork, SessionReplicator, SessionReplicator) {
        let hub = LoopbackNetwork::new();
        let host = SessionReplicator::new(Arc::new(hub.connect()), max_players);
        let peer = SessionReplicator::new(Arc::new(hub.connect()), max_players);
        (hub, host, peer)
    }

    #[test]
    fn test_host_counts_joins() {
        let (_hub, mut host, _peer) = pair(4);

        let events = host.tick();
        assert_eq!(host.replica().player_count, 2);
        assert!(events.contains(&ReplicatorEvent::PlayerJoined { count: 1 }));
        assert!(events.contains(&ReplicatorEvent::PlayerJoined { count: 2 }));
    }

    #[test]
    fn test_count_sequence_reaches_cap_and_starts_once() {
        let hub = LoopbackNetwork::new();
        let mut host = SessionReplicator::new(Arc::new(hub.connect()), 4);

        let mut counts = Vec::new();
        let mut starts = 0;
        let mut endpoints = Vec::new();
        for _ in 0..3 {
            endpoints.push(hub.connect());
            for event in host.tick() {
                match event {
                    ReplicatorEvent::PlayerJoined { count } => counts.push(count),
                    ReplicatorEvent::GameStarted => starts += 1,
                    _ => {}
                }
            }
        }

        // Host itself plus three peers joined one tick at a time
        assert_eq!(counts, vec![1, 2, 3, 4]);
        assert_eq!(starts, 1);
        assert!(host.replica().game_started);

        // Further ticks never re-fire the start edge
        for event in host.tick() {
            assert_ne!(event, ReplicatorEvent::GameStarted);
        }
    }

    #[test]
    fn test_spawn_assignments_carry_join_ordinals() {
        let (_hub, mut host, _peer) = pair(4);

        let ordinals: Vec<u32> = host
            .tick()
            .into_iter()
            .filter_map(|e| match e {
                ReplicatorEvent::SpawnAssigned { ordinal, .. } => Some(ordinal),
                _ => None,
            })
            .collect();
        assert_eq!(ordinals, vec![1, 2]);
    }

    #[test]
    fn test_replica_receives_every_assignment() {
        let hub = LoopbackNetwork::new();
        let mut host = SessionReplicator::new(Arc::new(hub.connect()), 8);
        let peer_endpoint = hub.connect();
        let peer_id = peer_endpoint.local_participant_id();
        let mut peer = SessionReplicator::new(Arc::new(peer_endpoint), 8);
        let late = hub.connect();
        let late_id = late.local_participant_id();

        host.tick();
        let assigned: Vec<(ClientId, u32)> = peer
            .tick()
            .into_iter()
            .filter_map(|e| match e {
                ReplicatorEvent::SpawnAssigned { client_id, ordinal } => {
                    Some((client_id, ordinal))
                }
                _ => None,
            })
            .collect();

        // Three endpoints joined in one host tick, each with its own ordinal
        assert_eq!(assigned.len(), 3);
        assert_eq!(peer.spawn_ordinal(peer_id), Some(2));
        assert_eq!(peer.spawn_ordinal(late_id), Some(3));

        // Redelivery of an assignment does not re-fire the event
        hub.redeliver(FieldUpdate::SpawnAssigned {
            target: peer_id,
            ordinal: 2,
        });
        assert!(peer.tick().is_empty());
    }

    #[test]
    fn test_host_discards_echoes_of_own_writes() {
        let (_hub, mut host, _peer) = pair(8);

        let first = host.tick();
        assert!(first.contains(&ReplicatorEvent::PlayerJoined { count: 1 }));
        assert!(first.contains(&ReplicatorEvent::PlayerJoined { count: 2 }));

        // The queued echo of PlayerCount(1) is stale relative to the
        // replica; it must not regress the count or fabricate events
        assert!(host.tick().is_empty());
        assert!(host.tick().is_empty());
        assert_eq!(host.replica().player_count, 2);
    }

    #[test]
    fn test_replica_observes_joins_then_start() {
        let (_hub, mut host, mut peer) = pair(2);

        host.tick();
        let events = peer.tick();

        // Causal order: the count that triggered the start is seen first
        let start_pos = events
            .iter()
            .position(|e| *e == ReplicatorEvent::GameStarted)
            .expect("start observed");
        let count_pos = events
            .iter()
            .position(|e| *e == ReplicatorEvent::PlayerJoined { count: 2 })
            .expect("count observed");
        assert!(count_pos < start_pos);
        assert!(peer.replica().game_started);
        assert_eq!(peer.replica().player_count, 2);
    }

    #[test]
    fn test_replica_rejects_local_mutation() {
        let (_hub, mut host, mut peer) = pair(4);
        host.tick();
        peer.tick();

        assert_eq!(peer.start_game(), Err(AuthorityError::NotHost));
        assert_eq!(peer.set_occupied_slots(3), Err(AuthorityError::NotHost));
        assert!(!peer.replica().game_started);
        assert_eq!(peer.replica().occupied_spawn_slots, 0);
    }

    #[test]
    fn test_duplicate_delivery_is_idempotent() {
        let (hub, mut host, mut peer) = pair(8);
        host.tick();
        let first = peer.tick();
        let joins = first
            .iter()
            .filter(|e| matches!(e, ReplicatorEvent::PlayerJoined { .. }))
            .count();
        assert_eq!(joins, 2);

        // At-least-once channel redelivers the last count
        hub.redeliver(FieldUpdate::PlayerCount(2));
        let again = peer.tick();
        assert!(again.is_empty());
        assert_eq!(peer.replica().player_count, 2);
    }

    #[test]
    fn test_manual_start_before_cap() {
        let (_hub, mut host, mut peer) = pair(4);
        host.tick();
        peer.tick();

        host.start_game().unwrap();
        let events = host.tick();
        assert!(events.contains(&ReplicatorEvent::GameStarted));
        assert!(host.replica().game_started);

        // Starting twice stays a single edge
        host.start_game().unwrap();
        assert!(!host.tick().contains(&ReplicatorEvent::GameStarted));

        assert!(peer.tick().contains(&ReplicatorEvent::GameStarted));
    }

    #[test]
    fn test_leave_decrements_count() {
        let hub = LoopbackNetwork::new();
        let mut host = SessionReplicator::new(Arc::new(hub.connect()), 8);
        let peer_endpoint = hub.connect();
        let peer_id = peer_endpoint.local_participant_id();
        host.tick();
        assert_eq!(host.replica().player_count, 2);

        hub.disconnect(peer_id);
        let events = host.tick();
        assert_eq!(host.replica().player_count, 1);
        assert!(events.contains(&ReplicatorEvent::PlayerLeft { count: 1 }));
    }

    #[test]
    fn test_occupied_slots_replicates() {
        let (_hub, mut host, mut peer) = pair(4);
        host.tick();
        peer.tick();

        host.set_occupied_slots(2).unwrap();
        peer.tick();
        assert_eq!(peer.replica().occupied_spawn_slots, 2);
    }
}
