//! Request handlers for the collaboration core.

mod lock;
mod presence;
mod reconnect;
mod session;
mod submit;
mod websocket;

pub use lock::*;
pub use presence::*;
pub use reconnect::*;
pub use session::*;
pub use submit::*;
pub use websocket::*;
