//! Summary statistics
//!
//! Sums THLB area and volume over the harvestable rows of the resultant
//! (not OGMA, mature, merchantable), grouped by an administrative field.
//!
//! Output columns: `<key>`, `FREQUENCY`, `SUM_THLB_area_ha`,
//! `SUM_THLB_volume_m3`, sorted by key with the null group last.

use crate::config::FieldNames;
use crate::rules::{MATURE, MERCHANTABILITY, OGMA, THLB_AREA_HA, THLB_VOLUME_M3};
use crate::table::require_columns;
use anyhow::{Context, Result};
use polars::prelude::*;

pub const ALL_STATS: &str = "AllStats";
pub const BCTS_STATS: &str = "BCTSStats";

pub const FREQUENCY: &str = "FREQUENCY";
pub const SUM_THLB_AREA_HA: &str = "SUM_THLB_area_ha";
pub const SUM_THLB_VOLUME_M3: &str = "SUM_THLB_volume_m3";

/// OGMA = 'N' AND MATURE = 'Y' AND MERCHANTABILITY = 'Y'
pub fn harvestable() -> Expr {
    col(OGMA)
        .eq(lit("N"))
        .and(col(MATURE).eq(lit("Y")))
        .and(col(MERCHANTABILITY).eq(lit("Y")))
}

/// Grouped sums of THLB area and volume over rows matching `filter`
pub fn summarize(df: &DataFrame, filter: Expr, key: &str, context: &str) -> Result<DataFrame> {
    require_columns(
        df,
        &[key, OGMA, MATURE, MERCHANTABILITY, THLB_AREA_HA, THLB_VOLUME_M3],
        context,
    )?;

    df.clone()
        .lazy()
        .filter(filter.fill_null(lit(false)))
        .group_by([col(key)])
        .agg([
            len().cast(DataType::Int64).alias(FREQUENCY),
            col(THLB_AREA_HA).sum().alias(SUM_THLB_AREA_HA),
            col(THLB_VOLUME_M3).sum().alias(SUM_THLB_VOLUME_M3),
        ])
        .sort_by_exprs([col(key)], SortMultipleOptions::default().with_nulls_last(true))
        .collect()
        .with_context(|| format!("{}: failed to compute summary statistics", context))
}

/// Harvestable THLB by licensee operating area
pub fn all_licensees(df: &DataFrame, fields: &FieldNames) -> Result<DataFrame> {
    summarize(df, harvestable(), &fields.operating_area_name, ALL_STATS)
}

/// Harvestable THLB by tenure within one operating area
pub fn operating_area_tenures(df: &DataFrame, fields: &FieldNames, operating_area: &str) -> Result<DataFrame> {
    require_columns(df, &[fields.operating_area_name.as_str()], BCTS_STATS)?;
    let filter = harvestable().and(col(fields.operating_area_name.as_str()).eq(lit(operating_area)));
    summarize(df, filter, &fields.tenure, BCTS_STATS)
}
