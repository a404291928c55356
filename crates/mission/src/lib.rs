pub mod request;
pub mod service;
pub mod store;
pub mod waypoint;

pub use request::*;
pub use service::*;
pub use store::*;
pub use waypoint::*;
