//! Clip
//!
//! Intersects every feature of a layer with the AOI boundary. Attributes are
//! carried unchanged; features left with no area are dropped.

use super::cleanup::MIN_PIECE_AREA;
use crate::layer::{Feature, Layer};
use geo::{Area, BooleanOps, BoundingRect, Intersects, MultiPolygon};
use rayon::prelude::*;

/// Union of all feature geometries in a layer
pub fn dissolve(layer: &Layer) -> MultiPolygon<f64> {
    layer
        .features
        .iter()
        .fold(MultiPolygon::new(Vec::new()), |acc, feature| {
            if acc.0.is_empty() {
                feature.geometry.clone()
            } else {
                acc.union(&feature.geometry)
            }
        })
}

/// Clip `layer` to `boundary`, naming the output `output_name`
pub fn clip_layer(layer: &Layer, boundary: &MultiPolygon<f64>, output_name: &str) -> Layer {
    let mut clipped = Layer::new(output_name, layer.fields.clone());

    let Some(extent) = boundary.bounding_rect() else {
        return clipped;
    };

    clipped.features = layer
        .features
        .par_iter()
        .filter_map(|feature| {
            let bbox = feature.geometry.bounding_rect()?;
            if !bbox.intersects(&extent) {
                return None;
            }
            let geometry = feature.geometry.intersection(boundary);
            (geometry.unsigned_area() > MIN_PIECE_AREA).then(|| Feature {
                geometry,
                attributes: feature.attributes.clone(),
            })
        })
        .collect();

    clipped
}
