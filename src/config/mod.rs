//! Configuration management for skiff.
//!
//! `ScanConfig` is the validated per-session configuration; `AppSettings`
//! holds persisted defaults in an XDG-compliant location.

mod scan;
mod settings;

pub use scan::{BoundsPolicy, ScanConfig};
pub use settings::{AppSettings, Paths};
