//! Scanner module: the connection prober and the worker pool that drives it.

pub mod pool;
pub mod tcp;
pub mod traits;

pub use tcp::TcpProber;
pub use traits::{ProbeOutcome, ProbeStatus, Prober};
