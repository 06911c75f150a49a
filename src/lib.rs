//! THLB Analysis
//!
//! Timber harvesting land base (THLB) area and volume metrics for an area
//! of interest:
//!
//! - `geoprocessing/`: clip to the AOI, union overlay, resultant cleanup
//! - `rules/`: OGMA / MATURE / MERCHANTABILITY flags and area/volume measures
//! - `summary`: grouped THLB sums by operating area and tenure
//! - `export`: CSV and spreadsheet output
//! - `pipeline`: the end-to-end run over a scratch `workspace`

pub mod config;
pub mod error;
pub mod export;
pub mod geoprocessing;
pub mod layer;
pub mod pipeline;
pub mod rules;
pub mod summary;
pub mod table;
pub mod workspace;

// Re-export commonly used types
pub use config::{AnalysisConfig, CliArgs, FieldNames, OgmaRule, SourceLayer};
pub use error::ThlbError;
pub use layer::{AttrValue, Feature, Field, FieldKind, Layer};
pub use pipeline::{RunReport, ThlbAnalysis};
pub use workspace::Workspace;
