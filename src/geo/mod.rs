//! GeoJSON geometries, named coordinate reference systems and the legacy
//! 2d shapes accepted by `$geoWithin`.

mod crs;
mod geometry;
mod shape;

pub use crs::Crs;
pub use geometry::{Geometry, Position};
pub use shape::{LegacyPoint, Shape};
