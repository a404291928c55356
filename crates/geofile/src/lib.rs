pub mod client;
pub mod coverage;
pub mod error;
pub mod geojson;
pub mod geometry;
pub mod kml;
pub mod parser;
pub mod planner;

pub use client::*;
pub use coverage::*;
pub use error::*;
pub use geojson::GeoJsonParser;
pub use geometry::*;
pub use kml::KmlParser;
pub use parser::*;
pub use planner::LocalPlanner;
