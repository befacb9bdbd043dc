//! Session context: one participant's view of a shared race session
//!
//! Owns the event bus, the replicated counters, the spawn table, and the
//! locally-owned vehicle, and drives them in a fixed order every tick:
//! replication first, then spawn assignment, then vehicle simulation.

pub mod participant;
pub mod replicator;
pub mod spawn;
pub mod state;

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::events::{EventBus, SessionEvent};
use crate::net::transport::{ClientId, Transport};
use crate::session::replicator::{ReplicatorEvent, SessionReplicator};
use crate::session::spawn::{SpawnAllocator, SpawnTransform};
use crate::session::state::{AuthorityError, SessionState};
use crate::vehicle::input::{InputBuffer, InputSender};
use crate::vehicle::ownership::OwnershipError;
use crate::vehicle::{Vehicle, VehicleTuning};

pub use participant::{Participant, ParticipantRegistry};
pub use spawn::starting_grid;

/// One participant's session runtime
///
/// Every participant (host included) runs its own `Session` over a shared
/// transport. The host additionally carries the authority side: membership
/// bookkeeping, spawn assignment, and the game-start flag.
pub struct Session {
    id: Uuid,
    bus: Arc<EventBus>,
    replicator: SessionReplicator,
    spawns: SpawnAllocator,
    inputs: InputBuffer,
    vehicle: Vehicle,
    tuning: VehicleTuning,
    local_id: ClientId,
    local_ordinal: Option<u32>,
    input_focus: bool,
}

impl Session {
    pub fn new(
        transport: Arc<dyn Transport>,
        spawns: SpawnAllocator,
        config: &SessionConfig,
    ) -> Self {
        let id = Uuid::new_v4();
        let local_id = transport.local_participant_id();
        let replicator = SessionReplicator::new(transport, config.max_players);

        spawns.check_capacity(config.max_players);
        info!(
            session_id = %id,
            participant = %local_id,
            host = replicator.is_host(),
            "Session created"
        );

        Self {
            id,
            bus: Arc::new(EventBus::new()),
            replicator,
            spawns,
            inputs: InputBuffer::default(),
            vehicle: Vehicle::new(),
            tuning: VehicleTuning::default(),
            local_id,
            local_ordinal: None,
            input_focus: true,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_host(&self) -> bool {
        self.replicator.is_host()
    }

    pub fn local_id(&self) -> ClientId {
        self.local_id
    }

    /// 1-based join ordinal, known once the first spawn assignment lands
    pub fn local_ordinal(&self) -> Option<u32> {
        self.local_ordinal
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn replica(&self) -> &SessionState {
        self.replicator.replica()
    }

    pub fn vehicle(&self) -> &Vehicle {
        &self.vehicle
    }

    /// Handle for feeding control samples into the next tick
    pub fn input_sender(&self) -> InputSender {
        self.inputs.sender()
    }

    /// Gate input sampling on window/application focus
    ///
    /// Losing focus also resets the sampled axes so the vehicle coasts
    /// instead of replaying the last held controls.
    pub fn set_input_focus(&mut self, focused: bool) {
        if self.input_focus != focused {
            debug!(focused, "Input focus changed");
        }
        self.input_focus = focused;
        if !focused {
            self.vehicle.clear_input();
        }
    }

    /// Host start trigger; replicas get [`AuthorityError::NotHost`]
    pub fn start_game(&mut self) -> Result<(), AuthorityError> {
        self.replicator.start_game()
    }

    /// Advance one fixed step of `dt` seconds
    pub fn tick(&mut self, dt: f32) {
        let events = self.replicator.tick();
        for event in events {
            self.dispatch(event);
        }
        self.step_vehicle(dt);
    }

    fn dispatch(&mut self, event: ReplicatorEvent) {
        match event {
            ReplicatorEvent::PlayerJoined { count } => {
                self.bus.publish(&SessionEvent::PlayerJoined { count });
            }
            ReplicatorEvent::PlayerLeft { count } => {
                self.bus.publish(&SessionEvent::PlayerLeft { count });
            }
            ReplicatorEvent::SpawnAssigned { client_id, ordinal } => {
                // The host mutates the occupancy bookkeeping; replicas map
                // the replicated ordinal through the same pure lookup
                let transform = if self.is_host() {
                    let transform = self.spawns.assign_slot(ordinal);
                    if let Err(err) = self.replicator.set_occupied_slots(self.spawns.occupied()) {
                        warn!(%client_id, %err, "Failed to replicate occupied slots");
                    }
                    transform
                } else {
                    self.spawns.slot_for(ordinal)
                };
                self.on_spawn_assigned(client_id, ordinal, transform);
            }
            ReplicatorEvent::GameStarted => {
                self.bus.publish(&SessionEvent::GameStart);
            }
        }
    }

    /// Record a spawn assignment, placing the local vehicle when it is ours
    fn on_spawn_assigned(&mut self, target: ClientId, ordinal: u32, transform: SpawnTransform) {
        if target == self.local_id {
            self.local_ordinal = Some(ordinal);
            match self.vehicle.bind_owner(target) {
                Ok(()) => {
                    self.replicator.registry_mut().mark_vehicle_bound(target);
                    debug!(%target, ordinal, "Local vehicle bound and placed");
                }
                // Redelivered assignment: the binding already happened
                Err(OwnershipError::AlreadyBound(_)) => {}
            }
            self.vehicle.apply_spawn(transform);
        }
        self.bus.publish(&SessionEvent::SpawnAssigned {
            target,
            ordinal,
            transform,
        });
    }

    fn accepts_input(&self) -> bool {
        self.input_focus && self.replica().game_started
    }

    fn step_vehicle(&mut self, dt: f32) {
        // Always drain so stale samples do not pile up while gated
        let sample = self.inputs.latest_for(self.local_id);
        if self.accepts_input() {
            if let Some(axes) = sample {
                self.vehicle.apply_input(self.local_id, axes);
            }
        } else {
            self.vehicle.clear_input();
        }

        if self.vehicle.is_spawn_placed() && self.replica().game_started {
            self.vehicle.integrate(&self.tuning, dt);
        }
    }
}
