//! Domain errors for the THLB analysis
//!
//! Geometry, schema and configuration failures that callers may want to
//! match on. Everything else travels as `anyhow::Error` with context.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThlbError {
    /// A field the analysis reads is absent from the resultant table
    #[error("{context}: missing required field '{field}' (available: {available:?})")]
    MissingField {
        context: String,
        field: String,
        available: Vec<String>,
    },

    #[error("{path:?} is not a GeoJSON FeatureCollection (found type '{found}')")]
    NotAFeatureCollection { path: PathBuf, found: String },

    #[error("feature {index} in {layer}: {reason}")]
    InvalidGeometry {
        layer: String,
        index: usize,
        reason: String,
    },

    /// The AOI source has no usable polygon area
    #[error("AOI {0:?} contains no polygon area")]
    EmptyAoi(PathBuf),

    #[error("no source layers configured")]
    NoSources,
}
