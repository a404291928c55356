pub mod fleet;
pub mod poller;
pub mod snapshot;
pub mod source;

pub use fleet::*;
pub use poller::*;
pub use snapshot::*;
pub use source::*;
