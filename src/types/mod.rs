//! Core type definitions using newtype patterns for type safety.
//!
//! These types make invalid ports, hosts and identifiers unrepresentable
//! once they have been parsed.

mod host;
mod port;
mod session_id;

pub use host::{Host, HostError};
pub use port::{Port, PortError, PortSelection, PortSpec};
pub use session_id::{SessionId, SessionIdError};
