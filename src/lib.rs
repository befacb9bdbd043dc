//! Slipstream Server Library
//!
//! A host-authoritative session layer for a small real-time multiplayer
//! racing game: replicated lobby counters, deterministic spawn-grid
//! assignment, owner-bound vehicle simulation, and a session-scoped
//! event bus, all driven at a fixed tick.

pub mod config;
pub mod events;
pub mod net;
pub mod scheduler;
pub mod session;
pub mod util;
pub mod vehicle;
