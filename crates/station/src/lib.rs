//! Panels and the station that mounts them.
//!
//! Panels share one waypoint store and one map reconciler and otherwise only
//! talk through the notification bus.

pub mod config;
pub mod error;
pub mod fleet_panel;
pub mod geofile_panel;
pub mod mission_panel;
pub mod station;
pub mod status;

pub use config::*;
pub use error::*;
pub use fleet_panel::*;
pub use geofile_panel::*;
pub use mission_panel::*;
pub use station::*;
pub use status::*;
