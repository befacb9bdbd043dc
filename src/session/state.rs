//! Replicated session state and mutation authority

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::net::transport::{ClientId, FieldUpdate};

/// Who may mutate a piece of shared state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// Mutated only by the host, read everywhere
    HostOnly,
    /// Mutated only by the owning participant
    OwnerOnly(ClientId),
    /// Local mirror of host state; all local mutation attempts are rejected
    ReadOnlyReplica,
}

impl Authority {
    /// Whether the local process holds write authority
    pub fn can_write(&self, local: ClientId) -> bool {
        match self {
            Authority::HostOnly => true,
            Authority::OwnerOnly(owner) => *owner == local,
            Authority::ReadOnlyReplica => false,
        }
    }
}

/// Authority violation conditions
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthorityError {
    #[error("session state is host-authoritative; local replica is read-only")]
    NotHost,
}

/// Host-owned counters and flags, mirrored to every participant
///
/// `player_count` reflects currently connected participants and is mutated
/// only by the host. `game_started` is monotonic: once true it stays true
/// for the remainder of the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub player_count: u32,
    pub occupied_spawn_slots: u32,
    pub game_started: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one replicated field value, idempotently
    ///
    /// Last write wins per field; applying a value equal to the current one
    /// is a no-op. Returns true when the field actually changed, which is
    /// what gates event publication downstream.
    pub fn apply(&mut self, update: FieldUpdate) -> bool {
        match update {
            FieldUpdate::PlayerCount(count) => {
                if self.player_count == count {
                    return false;
                }
                self.player_count = count;
                true
            }
            FieldUpdate::OccupiedSpawnSlots(occupied) => {
                if self.occupied_spawn_slots == occupied {
                    return false;
                }
                self.occupied_spawn_slots = occupied;
                true
            }
            FieldUpdate::GameStarted(started) => {
                if self.game_started == started {
                    return false;
                }
                if self.game_started && !started {
                    // Monotonic flag: never reset mid-session
                    warn!("Ignoring game-started reset from replication");
                    return false;
                }
                self.game_started = started;
                true
            }
            // Per-participant, tracked by the replicator's assignment map
            FieldUpdate::SpawnAssigned { .. } => false,
        }
    }
}
