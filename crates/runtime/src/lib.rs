pub mod event_bus;
pub mod event_feed;
pub mod future;

pub use event_bus::*;
pub use event_feed::*;
pub use future::*;
