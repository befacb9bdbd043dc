//! Spawn slot assignment
//!
//! A joining player's ordinal index maps to a fixed grid transform. The
//! mapping is deterministic for a given slot configuration, so a fixed
//! join order always reproduces the same placements. Slots are never
//! reused within a session: the occupied counter is monotonic.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::util::vec2::Vec2;

/// Fixed spawn placement: position plus heading in radians
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpawnTransform {
    pub position: Vec2,
    pub heading: f32,
}

impl SpawnTransform {
    pub fn new(position: Vec2, heading: f32) -> Self {
        Self { position, heading }
    }
}

/// Spawn allocation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpawnError {
    #[error("no spawn slots configured")]
    NoSlots,
}

/// Maps 1-based join ordinals to spawn transforms
#[derive(Debug)]
pub struct SpawnAllocator {
    slots: Vec<SpawnTransform>,
    occupied: u32,
}

impl SpawnAllocator {
    /// Build an allocator over a fixed, ordered slot table
    ///
    /// At least one slot is required: slot 0 doubles as the overflow
    /// fallback, so an empty table leaves nothing to fall back to.
    pub fn new(slots: Vec<SpawnTransform>) -> Result<Self, SpawnError> {
        if slots.is_empty() {
            return Err(SpawnError::NoSlots);
        }
        Ok(Self { slots, occupied: 0 })
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Occupied slots this session (monotonic, never decremented)
    pub fn occupied(&self) -> u32 {
        self.occupied
    }

    /// Log a startup warning when the table cannot seat the configured cap
    ///
    /// Non-fatal: late joiners past the table length share slot 0.
    pub fn check_capacity(&self, max_players: u32) {
        if (self.slots.len() as u32) < max_players {
            warn!(
                "Not enough spawn slots: {} configured for {} players, overflow shares slot 0",
                self.slots.len(),
                max_players
            );
        }
    }

    /// Deterministic lookup for a 1-based join ordinal
    ///
    /// Out-of-range ordinals (including 0) resolve to slot 0; this never
    /// indexes out of bounds.
    pub fn slot_for(&self, ordinal: u32) -> SpawnTransform {
        let index = ordinal.wrapping_sub(1) as usize;
        match self.slots.get(index) {
            Some(slot) => *slot,
            None => self.slots[0],
        }
    }

    /// Host-side assignment for a joining participant
    ///
    /// Same mapping as [`slot_for`], plus the occupied-slot bookkeeping and
    /// an overflow log line. The join itself never fails. Only in-range
    /// assignments count as occupying a slot; overflow joiners share slot 0
    /// without claiming it.
    ///
    /// [`slot_for`]: SpawnAllocator::slot_for
    pub fn assign_slot(&mut self, ordinal: u32) -> SpawnTransform {
        let index = ordinal.wrapping_sub(1) as usize;
        if index >= self.slots.len() {
            warn!(
                "Spawn ordinal {} exceeds {} slots, falling back to slot 0",
                ordinal,
                self.slots.len()
            );
        } else {
            self.occupied += 1;
        }
        self.slot_for(ordinal)
    }
}

/// Default starting grid: `count` slots in a row across the start line,
/// all facing +x, spaced 4 units apart
pub fn starting_grid(count: usize) -> Vec<SpawnTransform> {
    (0..count)
        .map(|i| SpawnTransform::new(Vec2::new(0.0, i as f32 * 4.0), 0.0))
        .collect()
}
