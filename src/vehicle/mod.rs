//! Owner-authoritative vehicle entity and simulation
//!
//! Each participant simulates exactly the vehicle it owns; everything
//! another participant sees of it arrives through the transport's
//! owner-authoritative transform replication, which is outside this core.

pub mod controller;
pub mod input;
pub mod ownership;

use crate::net::transport::ClientId;
use crate::util::vec2::{inverse_lerp01, Vec2};

/// Drive direction of the gearbox
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GearDirection {
    #[default]
    Forward,
    Backward,
}

/// Engine and steering tuning
///
/// Defaults match the reference handling: a car that tops out at 20 u/s,
/// reverses at half the forward acceleration, and only drops into reverse
/// gear once nearly stationary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleTuning {
    /// Hard speed cap for engine force
    pub max_velocity: f32,
    /// Acceleration when driving forward (u/s^2)
    pub forward_acceleration: f32,
    /// Acceleration when reversing (u/s^2)
    pub reverse_acceleration: f32,
    /// Steering rate at full speed (rad/s)
    pub steering_speed: f32,
    /// Speed at or below which braking turns into reverse gear
    pub reverse_threshold: f32,
    /// Fixed braking deceleration (u/s^2)
    pub brake_force: f32,
}

impl Default for VehicleTuning {
    fn default() -> Self {
        Self {
            max_velocity: 20.0,
            forward_acceleration: 100.0,
            reverse_acceleration: 50.0,
            // 100 degrees per second
            steering_speed: 1.745_329_3,
            reverse_threshold: 0.1,
            brake_force: 10.0,
        }
    }
}

/// One simulated vehicle
///
/// Position and heading live on the driving plane; velocity is a free
/// vector (engine forces act along the heading, but momentum carries).
#[derive(Debug, Clone, Default)]
pub struct Vehicle {
    pub position: Vec2,
    /// Facing angle in radians
    pub heading: f32,
    pub velocity: Vec2,
    gear: GearDirection,
    throttle: f32,
    steering: f32,
    owner: Option<ClientId>,
    spawn_placed: bool,
}

impl Vehicle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gear(&self) -> GearDirection {
        self.gear
    }

    pub fn throttle(&self) -> f32 {
        self.throttle
    }

    pub fn steering(&self) -> f32 {
        self.steering
    }

    pub fn owner(&self) -> Option<ClientId> {
        self.owner
    }

    pub fn is_spawn_placed(&self) -> bool {
        self.spawn_placed
    }

    /// Current speed (velocity magnitude)
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    /// Speed mapped into [0, 1] against the tuning's cap
    ///
    /// Steering authority scales with this, so a stationary car cannot
    /// turn in place.
    pub fn normalized_speed(&self, tuning: &VehicleTuning) -> f32 {
        inverse_lerp01(tuning.max_velocity, self.speed())
    }

    /// Unit vector along the current heading
    pub fn forward(&self) -> Vec2 {
        Vec2::from_angle(self.heading)
    }
}
