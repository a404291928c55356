pub mod backend;
pub mod config;
pub mod manager;

pub use backend::*;
pub use config::*;
pub use manager::*;
