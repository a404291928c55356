//! Client for the ground-station backend.
//!
//! [`BackendClient`] implements every service trait the engine consumes, so
//! one instance can back the link manager, the pollers, mission upload and
//! coverage planning.

pub mod client;
pub mod error;
pub mod events;
pub mod wire;

pub use client::*;
pub use error::*;
pub use events::*;
