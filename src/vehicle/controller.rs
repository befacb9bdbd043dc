//! Per-tick vehicle physics integrator
//!
//! This is the only hot path in the core: it runs every fixed simulation
//! step for the locally-owned vehicle, allocates nothing, and never
//! blocks. Gear selection, acceleration, braking, and steering follow the
//! reference handling model; position integrates from the velocity last.

use crate::util::vec2::{clamp01, Vec2};
use crate::vehicle::{GearDirection, Vehicle, VehicleTuning};

impl Vehicle {
    /// Advance one fixed step of `dt` seconds
    ///
    /// The caller gates this on ownership, game start, and input focus;
    /// the integrator itself only looks at the sampled control inputs.
    pub fn integrate(&mut self, tuning: &VehicleTuning, dt: f32) {
        self.handle_acceleration(tuning, dt);
        self.handle_steering(tuning, dt);
        self.position += self.velocity * dt;
    }

    /// Gear state machine and engine/brake force
    fn handle_acceleration(&mut self, tuning: &VehicleTuning, dt: f32) {
        let throttle = self.throttle();
        if throttle > 0.0 {
            self.shift(GearDirection::Forward);
            self.accelerate(tuning, throttle, dt);
        } else if throttle < 0.0 {
            if self.is_reversible(tuning) {
                self.shift(GearDirection::Backward);
                self.accelerate(tuning, throttle.abs(), dt);
            } else {
                self.brake(tuning, dt);
            }
        }
    }

    /// Reverse gear engages only near standstill, or when already reversing
    fn is_reversible(&self, tuning: &VehicleTuning) -> bool {
        self.speed() <= tuning.reverse_threshold || self.gear() == GearDirection::Backward
    }

    fn shift(&mut self, gear: GearDirection) {
        self.gear = gear;
    }

    /// Apply engine force along the gear direction
    ///
    /// No engine force is applied above the speed cap, and the engine's
    /// own contribution is trimmed back to the cap, so throttle alone can
    /// never push the car past `max_velocity`. Outside impulses still can,
    /// and velocity the engine did not add is never touched.
    fn accelerate(&mut self, tuning: &VehicleTuning, amount: f32, dt: f32) {
        if self.speed() > tuning.max_velocity {
            return;
        }

        let (acceleration, direction) = match self.gear {
            GearDirection::Forward => (tuning.forward_acceleration, self.forward()),
            GearDirection::Backward => (tuning.reverse_acceleration, -self.forward()),
        };
        let delta = direction * (amount * acceleration * dt);
        self.velocity += cap_engine_delta(self.velocity, delta, tuning.max_velocity);
    }

    /// Fixed-magnitude deceleration opposing the forward axis
    ///
    /// Braking never reverses the car by itself: the forward velocity
    /// component is reduced toward zero and stops there. Reversing is the
    /// gear state machine's job.
    fn brake(&mut self, tuning: &VehicleTuning, dt: f32) {
        let forward = self.forward();
        let forward_speed = self.velocity.dot(forward);
        if forward_speed <= 0.0 {
            return;
        }
        let reduced = (forward_speed - tuning.brake_force * dt).max(0.0);
        self.velocity += forward * (reduced - forward_speed);
    }

    /// Rotate the heading from the steering input
    ///
    /// Steering authority scales with normalized speed (none at rest, full
    /// at the cap) and inverts while reversing.
    fn handle_steering(&mut self, tuning: &VehicleTuning, dt: f32) {
        let steering = self.steering();
        if steering == 0.0 {
            return;
        }

        let mut step = steering * tuning.steering_speed * dt;
        if self.gear == GearDirection::Backward {
            step = -step;
        }
        self.heading += step * self.normalized_speed(tuning);
    }

    #[cfg(test)]
    pub(crate) fn set_controls(&mut self, throttle: f32, steering: f32) {
        self.throttle = throttle;
        self.steering = steering;
    }
}

/// Largest fraction of `delta` that keeps `velocity + delta` within `cap`
///
/// Scales the engine step, never the existing velocity, so a lateral
/// component picked up from outside the engine survives the same tick the
/// engine reaches the cap. The scale factor solves
/// `|velocity + t * delta| = cap` for the larger root.
fn cap_engine_delta(velocity: Vec2, delta: Vec2, cap: f32) -> Vec2 {
    if (velocity + delta).length() <= cap {
        return delta;
    }
    let dd = delta.length_sq();
    if dd <= 0.0 {
        return delta;
    }
    let vd = velocity.dot(delta);
    let disc = vd * vd + dd * (cap * cap - velocity.length_sq());
    if disc <= 0.0 {
        return Vec2::ZERO;
    }
    delta * clamp01((-vd + disc.sqrt()) / dd)
}

#[cfg(test)]
fn run_ticks(vehicle: &mut Vehicle, tuning: &VehicleTuning, dt: f32, ticks: usize) {
    for _ in 0..ticks {
        vehicle.integrate(tuning, dt);
    }
}
