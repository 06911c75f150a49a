//! Resultant cleanup
//!
//! Removes slivers left by the overlay and, on request, polygons whose
//! geometry duplicates an earlier one (first occurrence wins).

use crate::layer::Layer;
use geo::{Area, LineString, MultiPolygon, Polygon};
use rustc_hash::FxHashSet;

/// Pieces at or below this area (map units²) are numerical noise
pub const MIN_PIECE_AREA: f64 = 1e-6;

/// Drop features without area or with sliver area; returns how many were removed
pub fn drop_empty(layer: &mut Layer) -> usize {
    let before = layer.len();
    layer
        .features
        .retain(|f| f.geometry.unsigned_area() > MIN_PIECE_AREA);
    before - layer.len()
}

/// Drop features whose geometry repeats an earlier feature's
///
/// Geometries match when they have the same polygons and rings with exactly
/// the same vertices, regardless of ring start vertex, ring orientation,
/// hole order or polygon order.
pub fn delete_identical(layer: &mut Layer) -> usize {
    let before = layer.len();
    let mut seen: FxHashSet<Vec<Vec<u64>>> = FxHashSet::default();
    layer.features.retain(|f| seen.insert(geometry_key(&f.geometry)));
    before - layer.len()
}

fn geometry_key(geometry: &MultiPolygon<f64>) -> Vec<Vec<u64>> {
    let mut key: Vec<Vec<u64>> = geometry.0.iter().map(polygon_key).collect();
    key.sort_unstable();
    key
}

fn polygon_key(polygon: &Polygon<f64>) -> Vec<u64> {
    let mut holes: Vec<Vec<u64>> = polygon.interiors().iter().map(ring_key).collect();
    holes.sort_unstable();

    let mut key = ring_key(polygon.exterior());
    for hole in holes {
        // Ring separator
        key.push(u64::MAX);
        key.extend(hole);
    }
    key
}

/// Vertex bits of a ring, rotated to its smallest vertex, in whichever
/// direction sorts first
fn ring_key(ring: &LineString<f64>) -> Vec<u64> {
    let mut vertices: Vec<(u64, u64)> = ring
        .coords()
        .map(|c| (c.x.to_bits(), c.y.to_bits()))
        .collect();
    if vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }

    let forward = rotate_to_min(vertices.clone());
    vertices.reverse();
    let backward = rotate_to_min(vertices);

    forward
        .min(backward)
        .into_iter()
        .flat_map(|(x, y)| [x, y])
        .collect()
}

fn rotate_to_min(mut vertices: Vec<(u64, u64)>) -> Vec<(u64, u64)> {
    let start = vertices
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| **v)
        .map_or(0, |(i, _)| i);
    vertices.rotate_left(start);
    vertices
}
