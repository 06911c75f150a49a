//! Geoprocessing steps: clip, union and resultant cleanup
//!
//! Polygon boolean operations and planar area come from `geo`; this module
//! only decides which polygons meet and what attributes the output carries.

pub mod cleanup;
pub mod clip;
pub mod overlay;

pub use cleanup::{delete_identical, drop_empty};
pub use clip::{clip_layer, dissolve};
pub use overlay::{union_layers, SHAPE_AREA_FIELD};
