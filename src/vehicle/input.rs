//! Lock-free control input buffer
//!
//! Uses crossbeam-channel for lock-free MPSC communication from input
//! sources (local sampling, tests, bots) to the fixed-step simulation,
//! which drains all pending inputs at the start of each tick.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::net::transport::ClientId;
use crate::util::vec2::clamp01;

/// Raw control axes for one sample
///
/// Both axes live in [-1, 1]: positive throttle drives forward, negative
/// brakes or reverses; positive steering turns left.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisInput {
    pub throttle: f32,
    pub steering: f32,
}

impl AxisInput {
    /// Build a sample with both axes clamped to [-1, 1]
    ///
    /// Non-finite values clamp to zero rather than poisoning the integrator.
    pub fn clamped(throttle: f32, steering: f32) -> Self {
        Self {
            throttle: clamp_axis(throttle),
            steering: clamp_axis(steering),
        }
    }

    /// True when both axes are at rest
    pub fn is_neutral(&self) -> bool {
        self.throttle == 0.0 && self.steering == 0.0
    }
}

fn clamp_axis(value: f32) -> f32 {
    if !value.is_finite() {
        return 0.0;
    }
    // clamp01 covers [0, 1]; mirror it for the negative half
    if value < 0.0 {
        -clamp01(-value)
    } else {
        clamp01(value)
    }
}

/// One buffered input addressed to a vehicle owner
#[derive(Debug, Clone, Copy)]
pub struct InputEvent {
    pub target: ClientId,
    pub axes: AxisInput,
}

/// Lock-free input buffer using a bounded channel
///
/// Multiple sources can submit without blocking; the simulation drains
/// everything pending at the start of each fixed step and keeps only the
/// latest sample per vehicle.
pub struct InputBuffer {
    /// Sender side - cloned to each input source
    sender: Sender<InputEvent>,
    /// Receiver side - drained by the simulation tick
    receiver: Receiver<InputEvent>,
    capacity: usize,
}

impl InputBuffer {
    /// Create a new input buffer with given capacity
    ///
    /// Capacity should cover the burst of samples arriving between two
    /// fixed steps from every source feeding this buffer.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Create a new sender handle for an input source
    pub fn sender(&self) -> InputSender {
        InputSender {
            sender: self.sender.clone(),
        }
    }

    /// Try to submit a sample (non-blocking)
    ///
    /// Returns true if successful, false if the buffer is full.
    #[inline]
    pub fn try_submit(&self, target: ClientId, axes: AxisInput) -> bool {
        self.sender.try_send(InputEvent { target, axes }).is_ok()
    }

    /// Drain all pending samples for this tick
    pub fn drain(&self) -> Vec<InputEvent> {
        self.receiver.try_iter().collect()
    }

    /// Drain pending samples and keep only the latest one for `target`
    ///
    /// Control axes are level signals, not deltas, so intermediate samples
    /// within one fixed step carry no information.
    pub fn latest_for(&self, target: ClientId) -> Option<AxisInput> {
        self.receiver
            .try_iter()
            .filter(|event| event.target == target)
            .last()
            .map(|event| event.axes)
    }

    /// Get number of pending samples
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        // Plenty for one local source sampling faster than the tick rate
        Self::new(256)
    }
}

/// Clonable sender handle for input sources
#[derive(Clone)]
pub struct InputSender {
    sender: Sender<InputEvent>,
}

impl InputSender {
    /// Submit a sample (non-blocking)
    #[inline]
    pub fn try_send(&self, target: ClientId, axes: AxisInput) -> Result<(), InputBufferError> {
        self.sender
            .try_send(InputEvent { target, axes })
            .map_err(|e| match e {
                TrySendError::Full(_) => InputBufferError::Full,
                TrySendError::Disconnected(_) => InputBufferError::Disconnected,
            })
    }
}

/// Input buffer errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputBufferError {
    /// Buffer is full (backpressure)
    Full,
    /// Channel disconnected (simulation stopped)
    Disconnected,
}
