pub mod bus;

pub use bus::{EventBus, EventKind, SessionEvent, SubscriberId};
