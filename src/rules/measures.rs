//! Area and volume measures
//!
//! Expressions here depend on each other (THLB area reads `new_AREA_ha`,
//! THLB volume reads `THLB_area_ha` and the zero-filled live volume), so
//! they must run in separate `with_columns` passes.

use super::{AREA_HA, THLB_AREA_HA, THLB_VOLUME_M3};
use polars::prelude::*;

pub const SQ_METRES_PER_HECTARE: f64 = 10_000.0;

/// Area in hectares from the raw area field (map units², metres in BC Albers)
pub fn area_ha(area_field: &str) -> Expr {
    (col(area_field).cast(DataType::Float64).fill_null(lit(0.0)) / lit(SQ_METRES_PER_HECTARE))
        .alias(AREA_HA)
}

/// Hectares weighted by the THLB factor; a missing factor counts as outside the THLB
pub fn thlb_area_ha(thlb_factor: &str) -> Expr {
    (col(AREA_HA) * col(thlb_factor).cast(DataType::Float64).fill_null(lit(0.0)))
        .alias(THLB_AREA_HA)
}

/// Live stand volume with nulls replaced by 0, written back under its own name
pub fn live_volume_or_zero(live_volume: &str) -> Expr {
    col(live_volume)
        .cast(DataType::Float64)
        .fill_null(lit(0.0))
        .alias(live_volume)
}

pub fn thlb_volume_m3(live_volume: &str) -> Expr {
    (col(THLB_AREA_HA) * col(live_volume)).alias(THLB_VOLUME_M3)
}
