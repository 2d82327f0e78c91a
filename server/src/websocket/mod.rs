//! WebSocket support for real-time collaboration.
//!
//! Clients subscribe per session and receive the core's broadcast events
//! (`operation_applied`, `user_joined`, `lock_acquired`, ...) as they
//! happen. Delivery is fire-and-forget, at-most-once: a client that
//! misses an event recovers through the reconnect endpoint.

mod hub;
mod protocol;

pub use hub::SessionHub;
pub use protocol::*;
