//! Owner binding and input routing for a vehicle
//!
//! A vehicle binds to exactly one participant for its whole lifetime.
//! Control input is only ever taken from that participant; samples from
//! anyone else are dropped without touching the simulation state.

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::net::transport::ClientId;
use crate::session::spawn::SpawnTransform;
use crate::util::vec2::Vec2;
use crate::vehicle::input::AxisInput;
use crate::vehicle::Vehicle;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipError {
    /// The vehicle is already bound to another participant
    #[error("vehicle is already bound to {0}")]
    AlreadyBound(ClientId),
}

impl Vehicle {
    /// Bind this vehicle to its owning participant
    ///
    /// Binding happens exactly once; any later attempt fails and leaves
    /// the original binding intact, even for the same participant.
    pub fn bind_owner(&mut self, owner: ClientId) -> Result<(), OwnershipError> {
        if let Some(bound) = self.owner {
            warn!(%owner, %bound, "Rejected rebind attempt on owned vehicle");
            return Err(OwnershipError::AlreadyBound(bound));
        }
        self.owner = Some(owner);
        debug!(%owner, "Vehicle bound to owner");
        Ok(())
    }

    /// Apply a control sample if it comes from the bound owner
    ///
    /// Samples from any other participant (or from anyone while unbound)
    /// are dropped; this is routine during ownership handover at join, so
    /// it is not an error.
    pub fn apply_input(&mut self, source: ClientId, axes: AxisInput) {
        if self.owner != Some(source) {
            trace!(%source, "Dropped input from non-owner");
            return;
        }
        self.throttle = axes.throttle;
        self.steering = axes.steering;
    }

    /// Reset the sampled controls to neutral
    ///
    /// Used when the owner loses input focus so the vehicle coasts instead
    /// of replaying the last sampled axes forever.
    pub fn clear_input(&mut self) {
        self.throttle = 0.0;
        self.steering = 0.0;
    }

    /// Place the vehicle at its assigned spawn transform
    ///
    /// Placement happens once per session. Redeliveries of the same spawn
    /// assignment are ignored so the car is not teleported back to the
    /// grid mid-race.
    pub fn apply_spawn(&mut self, transform: SpawnTransform) {
        if self.spawn_placed {
            debug!("Ignoring repeated spawn placement");
            return;
        }
        self.position = transform.position;
        self.heading = transform.heading;
        self.velocity = Vec2::ZERO;
        self.spawn_placed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::VehicleTuning;

    #[test]
    fn test_bind_owner_once() {
        let mut vehicle = Vehicle::new();
        assert!(vehicle.bind_owner(ClientId(1)).is_ok());
        assert_eq!(vehicle.owner(), Some(ClientId(1)));
    }

    #[test]
    fn test_rebind_fails_and_keeps_original() {
        let mut vehicle = Vehicle::new();
        vehicle.bind_owner(ClientId(1)).unwrap();

        let err = vehicle.bind_owner(ClientId(2)).unwrap_err();
        assert_eq!(err, OwnershipError::AlreadyBound(ClientId(1)));
        assert_eq!(vehicle.owner(), Some(ClientId(1)));

        // Same participant binding twice is rejected too
        let err = vehicle.bind_owner(ClientId(1)).unwrap_err();
        assert_eq!(err, OwnershipError::AlreadyBound(ClientId(1)));
    }

    #[test]
    fn test_input_from_owner_applies() {
        let mut vehicle = Vehicle::new();
        vehicle.bind_owner(ClientId(1)).unwrap();

        vehicle.apply_input(ClientId(1), AxisInput::clamped(0.8, -0.5));
        assert_eq!(vehicle.throttle(), 0.8);
        assert_eq!(vehicle.steering(), -0.5);
    }

    #[test]
    fn test_input_from_non_owner_dropped() {
        let mut vehicle = Vehicle::new();
        vehicle.bind_owner(ClientId(1)).unwrap();
        vehicle.apply_input(ClientId(1), AxisInput::clamped(1.0, 1.0));

        vehicle.apply_input(ClientId(2), AxisInput::clamped(-1.0, 0.0));
        assert_eq!(vehicle.throttle(), 1.0);
        assert_eq!(vehicle.steering(), 1.0);
    }

    #[test]
    fn test_input_dropped_while_unbound() {
        let mut vehicle = Vehicle::new();
        vehicle.apply_input(ClientId(1), AxisInput::clamped(1.0, 0.0));
        assert_eq!(vehicle.throttle(), 0.0);
    }

    #[test]
    fn test_clear_input_resets_axes() {
        let mut vehicle = Vehicle::new();
        vehicle.bind_owner(ClientId(1)).unwrap();
        vehicle.apply_input(ClientId(1), AxisInput::clamped(1.0, 1.0));

        vehicle.clear_input();
        assert_eq!(vehicle.throttle(), 0.0);
        assert_eq!(vehicle.steering(), 0.0);
    }

    #[test]
    fn test_apply_spawn_places_once() {
        let mut vehicle = Vehicle::new();
        vehicle.velocity = Vec2::new(3.0, 0.0);

        let grid = SpawnTransform {
            position: Vec2::new(0.0, 8.0),
            heading: 1.0,
        };
        vehicle.apply_spawn(grid);
        assert!(vehicle.is_spawn_placed());
        assert!(vehicle.position.approx_eq(Vec2::new(0.0, 8.0), 1e-6));
        assert_eq!(vehicle.heading, 1.0);
        assert_eq!(vehicle.speed(), 0.0);

        // Redelivery does not move the car again
        vehicle.position = Vec2::new(50.0, 50.0);
        vehicle.apply_spawn(grid);
        assert!(vehicle.position.approx_eq(Vec2::new(50.0, 50.0), 1e-6));
    }

    #[test]
    fn test_owned_vehicle_drives_after_spawn() {
        let tuning = VehicleTuning::default();
        let mut vehicle = Vehicle::new();
        vehicle.bind_owner(ClientId(1)).unwrap();
        vehicle.apply_spawn(SpawnTransform {
            position: Vec2::ZERO,
            heading: 0.0,
        });

        vehicle.apply_input(ClientId(1), AxisInput::clamped(1.0, 0.0));
        vehicle.integrate(&tuning, 0.02);
        assert!(vehicle.speed() > 0.0);
    }
}
