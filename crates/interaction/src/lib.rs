pub mod controller;
pub mod pointer;

pub use controller::*;
pub use pointer::*;
