pub mod reconciler;
pub mod recording;
pub mod style;
pub mod surface;
pub mod world;

pub use reconciler::*;
pub use recording::*;
pub use style::*;
pub use surface::*;
pub use world::*;
