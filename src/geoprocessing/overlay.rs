//! Union (spatial overlay)
//!
//! Produces one output polygon for every distinct combination of
//! overlapping input polygons. Layers are folded in one at a time: each
//! existing piece is split by the features of the next layer, and the parts
//! of that layer not covered by any existing piece become new pieces.
//!
//! Output schema, per input layer in order:
//! - `FID_<layer>`: 1-based position of the contributing feature in its
//!   layer, or -1 where the layer has no polygon
//! - the layer's own fields (a name already taken gets a `_1`, `_2`, ... suffix)
//!
//! followed by `Shape_Area`, the planar area of the piece in map units².
//! Attributes of layers that do not cover a piece are null.
//!
//! Overlapping features within one layer are not dissolved first; each one
//! splits the pieces it touches, so such overlaps appear once per feature.

use crate::layer::{AttrValue, Feature, Field, FieldKind, Layer};
use geo::{Area, BooleanOps, BoundingRect, Intersects, MultiPolygon, Rect};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::debug;

pub const SHAPE_AREA_FIELD: &str = "Shape_Area";

/// Intermediate overlay piece: geometry plus, per layer, the source feature index
#[derive(Debug, Clone)]
struct Piece {
    geometry: MultiPolygon<f64>,
    sources: Vec<Option<usize>>,
}

/// Union every layer into a single resultant named `output_name`
pub fn union_layers(layers: &[Layer], output_name: &str) -> Layer {
    let schema = UnionSchema::new(layers);
    let mut pieces: Vec<Piece> = Vec::new();

    for (layer_idx, layer) in layers.iter().enumerate() {
        pieces = overlay_step(pieces, layer, layer_idx, layers.len());
        debug!("Union after {}: {} pieces", layer.name, pieces.len());
    }

    let mut resultant = Layer::new(output_name, schema.fields.clone());
    resultant.features = pieces
        .into_iter()
        .map(|piece| schema.feature(layers, piece))
        .collect();
    resultant
}

fn overlay_step(existing: Vec<Piece>, layer: &Layer, layer_idx: usize, n_layers: usize) -> Vec<Piece> {
    let layer_boxes: Vec<Option<Rect<f64>>> = layer
        .features
        .iter()
        .map(|f| f.geometry.bounding_rect())
        .collect();
    let piece_boxes: Vec<Option<Rect<f64>>> = existing
        .iter()
        .map(|p| p.geometry.bounding_rect())
        .collect();

    // Split existing pieces: one part per overlapping feature, plus the uncovered remainder
    let mut pieces: Vec<Piece> = existing
        .par_iter()
        .zip(piece_boxes.par_iter())
        .flat_map_iter(|(piece, piece_box)| {
            let mut parts = Vec::new();
            let Some(piece_box) = *piece_box else {
                return parts;
            };

            let mut remainder = piece.geometry.clone();
            for (feature_idx, feature) in layer.features.iter().enumerate() {
                if !overlaps(layer_boxes[feature_idx], piece_box) {
                    continue;
                }
                let geometry = piece.geometry.intersection(&feature.geometry);
                if has_area(&geometry) {
                    let mut sources = piece.sources.clone();
                    sources[layer_idx] = Some(feature_idx);
                    parts.push(Piece { geometry, sources });
                    if !remainder.0.is_empty() {
                        remainder = remainder.difference(&feature.geometry);
                    }
                }
            }

            if has_area(&remainder) {
                parts.push(Piece {
                    geometry: remainder,
                    sources: piece.sources.clone(),
                });
            }
            parts
        })
        .collect();

    // Parts of the new layer outside every existing piece
    let fresh: Vec<Piece> = layer
        .features
        .par_iter()
        .zip(layer_boxes.par_iter())
        .enumerate()
        .filter_map(|(feature_idx, (feature, feature_box))| {
            let feature_box = (*feature_box)?;
            let geometry = existing
                .iter()
                .zip(&piece_boxes)
                .filter(|(_, piece_box)| overlaps(**piece_box, feature_box))
                .fold(feature.geometry.clone(), |rest, (piece, _)| {
                    if rest.0.is_empty() {
                        rest
                    } else {
                        rest.difference(&piece.geometry)
                    }
                });
            if !has_area(&geometry) {
                return None;
            }
            let mut sources = vec![None; n_layers];
            sources[layer_idx] = Some(feature_idx);
            Some(Piece { geometry, sources })
        })
        .collect();

    pieces.extend(fresh);
    pieces
}

/// Zero-area results of the boolean ops; slivers are left to `drop_empty`
fn has_area(geometry: &MultiPolygon<f64>) -> bool {
    geometry.unsigned_area() > 0.0
}

fn overlaps(a: Option<Rect<f64>>, b: Rect<f64>) -> bool {
    a.map_or(false, |a| a.intersects(&b))
}

/// Output field layout and the mapping back to each layer's attributes
struct UnionSchema {
    fields: Vec<Field>,
    /// Position of each layer's `FID_` field; its own fields follow it
    offsets: Vec<usize>,
}

impl UnionSchema {
    fn new(layers: &[Layer]) -> Self {
        let mut taken: FxHashSet<String> = FxHashSet::default();
        taken.insert(SHAPE_AREA_FIELD.to_string());

        let mut fields = Vec::new();
        let mut offsets = Vec::with_capacity(layers.len());

        for layer in layers {
            offsets.push(fields.len());
            let fid = unique_name(&mut taken, &format!("FID_{}", layer.name));
            fields.push(Field::new(fid, FieldKind::Number));
            for field in &layer.fields {
                let name = unique_name(&mut taken, &field.name);
                fields.push(Field::new(name, field.kind));
            }
        }
        fields.push(Field::new(SHAPE_AREA_FIELD, FieldKind::Number));

        Self { fields, offsets }
    }

    fn feature(&self, layers: &[Layer], piece: Piece) -> Feature {
        let mut attributes = vec![AttrValue::Null; self.fields.len()];

        for (layer_idx, (layer, source)) in layers.iter().zip(&piece.sources).enumerate() {
            let offset = self.offsets[layer_idx];
            match source {
                Some(feature_idx) => {
                    attributes[offset] = AttrValue::Number((*feature_idx + 1) as f64);
                    let values = &layer.features[*feature_idx].attributes;
                    for (i, value) in values.iter().enumerate() {
                        attributes[offset + 1 + i] = value.clone();
                    }
                }
                None => attributes[offset] = AttrValue::Number(-1.0),
            }
        }

        let last = attributes.len() - 1;
        attributes[last] = AttrValue::Number(piece.geometry.unsigned_area());

        Feature {
            geometry: piece.geometry,
            attributes,
        }
    }
}

fn unique_name(taken: &mut FxHashSet<String>, name: &str) -> String {
    let mut candidate = name.to_string();
    let mut suffix = 1;
    while taken.contains(&candidate) {
        candidate = format!("{}_{}", name, suffix);
        suffix += 1;
    }
    taken.insert(candidate.clone());
    candidate
}
