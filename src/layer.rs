//! Feature Layers and GeoJSON I/O
//!
//! A `Layer` is an in-memory polygon feature collection: an ordered field
//! schema plus features whose attribute vectors line up with that schema.
//! Layers are read from and written to GeoJSON `FeatureCollection` files.
//!
//! Writing also stores the field schema as a `fields` foreign member, so a
//! layer with no features keeps its attributes through a round trip.
//!
//! Loading also performs the null/empty geometry check: features without
//! polygon area are dropped with a warning instead of failing the run.

use crate::error::ThlbError;
use anyhow::{Context, Result};
use geo::{Area, Coord, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, warn};

/// A single attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Text(String),
    Number(f64),
}

impl AttrValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Coerce a value to the kind of the field it is stored under
    pub fn coerce(self, kind: FieldKind) -> AttrValue {
        match (kind, self) {
            (_, AttrValue::Null) => AttrValue::Null,
            (FieldKind::Text, AttrValue::Number(n)) => AttrValue::Text(format_number(n)),
            (FieldKind::Number, AttrValue::Text(s)) => match s.trim().parse::<f64>() {
                Ok(n) => AttrValue::Number(n),
                Err(_) => AttrValue::Null,
            },
            (_, value) => value,
        }
    }

    fn from_json(value: &Value) -> AttrValue {
        match value {
            Value::Null => AttrValue::Null,
            Value::Number(n) => n.as_f64().map_or(AttrValue::Null, AttrValue::Number),
            Value::String(s) => AttrValue::Text(s.clone()),
            Value::Bool(b) => AttrValue::Text(b.to_string()),
            other => AttrValue::Text(other.to_string()),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            AttrValue::Null => Value::Null,
            AttrValue::Text(s) => Value::String(s.clone()),
            AttrValue::Number(n) => json!(n),
        }
    }

    fn parses_as_number(&self) -> bool {
        match self {
            AttrValue::Text(s) => s.trim().parse::<f64>().is_ok(),
            _ => true,
        }
    }

    fn kind(&self) -> Option<FieldKind> {
        match self {
            AttrValue::Null => None,
            AttrValue::Text(_) => Some(FieldKind::Text),
            AttrValue::Number(_) => Some(FieldKind::Number),
        }
    }
}

/// Integral numbers print without a trailing ".0" (ids stored as numbers)
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self { name: name.into(), kind }
    }
}

/// Polygon feature; `attributes[i]` belongs to `Layer::fields[i]`
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: MultiPolygon<f64>,
    pub attributes: Vec<AttrValue>,
}

/// Polygon feature collection with a fixed schema
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub fields: Vec<Field>,
    pub features: Vec<Feature>,
}

impl Layer {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
            features: Vec::new(),
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Attribute of feature `row` by field name
    pub fn value(&self, row: usize, field: &str) -> Option<&AttrValue> {
        let idx = self.field_index(field)?;
        self.features.get(row).and_then(|f| f.attributes.get(idx))
    }

    /// Total planar area of all features (map units²)
    pub fn area(&self) -> f64 {
        self.features.iter().map(|f| f.geometry.unsigned_area()).sum()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Read a GeoJSON FeatureCollection; the layer is named after the file stem
    pub fn read_geojson(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("layer")
            .to_string();
        Self::read_geojson_named(path, &name)
    }

    pub fn read_geojson_named(path: &Path, name: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read layer: {:?}", path))?;
        let doc: FeatureCollectionDoc = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse GeoJSON: {:?}", path))?;

        if doc.kind != "FeatureCollection" {
            return Err(ThlbError::NotAFeatureCollection {
                path: path.to_path_buf(),
                found: doc.kind,
            }
            .into());
        }

        let layer = Self::from_documents(name, doc.fields, doc.features)?;
        debug!("Read {} features ({} fields) from {:?}", layer.len(), layer.fields.len(), path);
        Ok(layer)
    }

    fn from_documents(name: &str, declared: Vec<Field>, docs: Vec<FeatureDoc>) -> Result<Self> {
        // Schema: declared fields, then property names in first-seen order
        // with the kind taken from the first non-null value. A number field
        // that later holds non-numeric text is widened to text.
        let mut resolved: Vec<bool> = vec![true; declared.len()];
        let mut fields = declared;
        let mut pending: Vec<(MultiPolygon<f64>, Map<String, Value>)> = Vec::with_capacity(docs.len());

        for (index, doc) in docs.into_iter().enumerate() {
            let properties = doc.properties.unwrap_or_default();

            for (key, value) in &properties {
                let idx = match fields.iter().position(|f| &f.name == key) {
                    Some(idx) => idx,
                    None => {
                        fields.push(Field::new(key.clone(), FieldKind::Text));
                        resolved.push(false);
                        fields.len() - 1
                    }
                };
                let value = AttrValue::from_json(value);
                match value.kind() {
                    Some(kind) if !resolved[idx] => {
                        fields[idx].kind = kind;
                        resolved[idx] = true;
                    }
                    Some(FieldKind::Text) if fields[idx].kind == FieldKind::Number => {
                        if !value.parses_as_number() {
                            debug!("{}: field {} widened to text", name, key);
                            fields[idx].kind = FieldKind::Text;
                        }
                    }
                    _ => {}
                }
            }

            let geometry = match doc.geometry {
                Some(geometry) => geometry.into_multipolygon().map_err(|reason| {
                    ThlbError::InvalidGeometry {
                        layer: name.to_string(),
                        index,
                        reason,
                    }
                })?,
                None => None,
            };

            match geometry {
                Some(mp) if mp.unsigned_area() > 0.0 => pending.push((mp, properties)),
                _ => warn!("{}: dropping feature {} with null or empty geometry", name, index),
            }
        }

        let mut layer = Layer::new(name, fields);
        layer.features = pending
            .into_iter()
            .map(|(geometry, properties)| {
                let attributes = layer
                    .fields
                    .iter()
                    .map(|field| {
                        properties
                            .get(&field.name)
                            .map(AttrValue::from_json)
                            .unwrap_or(AttrValue::Null)
                            .coerce(field.kind)
                    })
                    .collect();
                Feature { geometry, attributes }
            })
            .collect();

        Ok(layer)
    }

    /// Write as a GeoJSON FeatureCollection, overwriting any existing file
    pub fn write_geojson(&self, path: &Path, epsg: Option<u32>) -> Result<()> {
        let features: Vec<Value> = self
            .features
            .iter()
            .map(|feature| {
                let properties: Map<String, Value> = self
                    .fields
                    .iter()
                    .zip(&feature.attributes)
                    .map(|(field, value)| (field.name.clone(), value.to_json()))
                    .collect();
                json!({
                    "type": "Feature",
                    "geometry": multipolygon_to_json(&feature.geometry),
                    "properties": properties,
                })
            })
            .collect();

        let mut doc = json!({
            "type": "FeatureCollection",
            "name": self.name,
            "fields": self.fields,
            "features": features,
        });
        if let Some(code) = epsg {
            doc["crs"] = json!({
                "type": "name",
                "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", code) },
            });
        }

        let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
        serde_json::to_writer(BufWriter::new(file), &doc)
            .with_context(|| format!("Failed to write GeoJSON: {:?}", path))?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollectionDoc {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    fields: Vec<Field>,
    #[serde(default)]
    features: Vec<FeatureDoc>,
}

#[derive(Debug, Deserialize)]
struct FeatureDoc {
    #[serde(default)]
    geometry: Option<GeometryDoc>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct GeometryDoc {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

type Position = Vec<f64>;
type Ring = Vec<Position>;

impl GeometryDoc {
    /// `Ok(None)` for non-polygonal or empty geometry, `Err` for malformed coordinates
    fn into_multipolygon(self) -> std::result::Result<Option<MultiPolygon<f64>>, String> {
        let polygons = match self.kind.as_str() {
            "Polygon" => {
                let rings: Vec<Ring> =
                    serde_json::from_value(self.coordinates).map_err(|e| e.to_string())?;
                vec![rings]
            }
            "MultiPolygon" => {
                serde_json::from_value::<Vec<Vec<Ring>>>(self.coordinates).map_err(|e| e.to_string())?
            }
            other => {
                warn!("Unsupported geometry type '{}'", other);
                return Ok(None);
            }
        };

        let polygons: Vec<Polygon<f64>> = polygons
            .into_iter()
            .map(polygon_from_rings)
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect();

        if polygons.is_empty() {
            return Ok(None);
        }
        Ok(Some(MultiPolygon::new(polygons)))
    }
}

fn polygon_from_rings(rings: Vec<Ring>) -> std::result::Result<Option<Polygon<f64>>, String> {
    let mut rings = rings
        .into_iter()
        .map(ring_to_linestring)
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter();

    match rings.next() {
        Some(exterior) => Ok(Some(Polygon::new(exterior, rings.collect()))),
        None => Ok(None),
    }
}

fn ring_to_linestring(ring: Ring) -> std::result::Result<LineString<f64>, String> {
    ring.into_iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(format!("position {:?} has fewer than two coordinates", position)),
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(LineString::new)
}

fn multipolygon_to_json(mp: &MultiPolygon<f64>) -> Value {
    let coordinates: Vec<Vec<Vec<[f64; 2]>>> = mp
        .0
        .iter()
        .map(|polygon| {
            std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .map(|ring| ring.coords().map(|c| [c.x, c.y]).collect())
                .collect()
        })
        .collect();
    json!({ "type": "MultiPolygon", "coordinates": coordinates })
}
