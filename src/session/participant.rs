//! Participant records and the host-side membership registry

use hashbrown::HashMap;

use crate::net::transport::ClientId;

/// One connected participant as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Participant {
    /// Transport-assigned connection id
    pub client_id: ClientId,
    /// 1-based join index, assigned at join time, immutable
    pub ordinal: u32,
    /// Set once when the participant's vehicle is owner-bound
    pub vehicle_bound: bool,
}

/// Host-side registry tracking who is connected and in which join order
///
/// Ordinals are handed out monotonically and never reused, which keeps
/// spawn assignment reproducible for a fixed join order even across
/// departures (slots are not recycled either; see the spawn allocator).
#[derive(Default)]
pub struct ParticipantRegistry {
    participants: HashMap<ClientId, Participant>,
    next_ordinal: u32,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.participants.contains_key(&client_id)
    }

    pub fn get(&self, client_id: ClientId) -> Option<&Participant> {
        self.participants.get(&client_id)
    }

    /// Record a join and assign the next ordinal
    ///
    /// Returns `None` when the id is already registered (duplicate
    /// membership notifications are possible and harmless).
    pub fn join(&mut self, client_id: ClientId) -> Option<Participant> {
        if self.participants.contains_key(&client_id) {
            return None;
        }
        self.next_ordinal += 1;
        let participant = Participant {
            client_id,
            ordinal: self.next_ordinal,
            vehicle_bound: false,
        };
        self.participants.insert(client_id, participant);
        Some(participant)
    }

    /// Record a departure; releases the participant's vehicle slot with it
    pub fn leave(&mut self, client_id: ClientId) -> Option<Participant> {
        self.participants.remove(&client_id)
    }

    pub fn mark_vehicle_bound(&mut self, client_id: ClientId) {
        if let Some(p) = self.participants.get_mut(&client_id) {
            p.vehicle_bound = true;
        }
    }

    /// Split the transport's current membership into new joins and
    /// departures relative to the registry
    pub fn diff(&self, connected: &[ClientId]) -> (Vec<ClientId>, Vec<ClientId>) {
        let joined = connected
            .iter()
            .copied()
            .filter(|id| !self.participants.contains_key(id))
            .collect();
        let left = self
            .participants
            .keys()
            .copied()
            .filter(|id| !connected.contains(id))
            .collect();
        (joined, left)
    }
}
