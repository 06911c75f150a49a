//! Field derivation for the union resultant
//!
//! Adds three classification flags and three area/volume measures to every
//! resultant row. Each derived value depends only on the row's own
//! attributes.
//!
//! Evaluation order:
//! 1. `OGMA`, `MATURE`, `MERCHANTABILITY`, `new_AREA_ha`
//! 2. `THLB_area_ha` (needs `new_AREA_ha`)
//! 3. null live volume → 0 (after the merchantability check)
//! 4. `THLB_volume_m3` (needs `THLB_area_ha` and the filled volume)
//!
//! Columns that already exist under a derived name are overwritten.

pub mod flags;
pub mod measures;

pub use flags::{mature_flag, merchantability_flag, ogma_flag};
pub use measures::{area_ha, live_volume_or_zero, thlb_area_ha, thlb_volume_m3};

use crate::config::{FieldNames, OgmaRule};
use crate::table::require_columns;
use anyhow::{Context, Result};
use polars::prelude::*;

pub const OGMA: &str = "OGMA";
pub const MATURE: &str = "MATURE";
pub const MERCHANTABILITY: &str = "MERCHANTABILITY";
pub const AREA_HA: &str = "new_AREA_ha";
pub const THLB_AREA_HA: &str = "THLB_area_ha";
pub const THLB_VOLUME_M3: &str = "THLB_volume_m3";

/// Derived fields, flags first
pub const DERIVED_FIELDS: [&str; 6] = [OGMA, MATURE, MERCHANTABILITY, AREA_HA, THLB_AREA_HA, THLB_VOLUME_M3];

/// Populate the derived fields on a resultant attribute table
pub fn derive_fields(df: DataFrame, fields: &FieldNames, ogma_rule: OgmaRule) -> Result<DataFrame> {
    require_columns(
        &df,
        &[
            fields.ogma_provider_id.as_str(),
            fields.maturity_threshold.as_str(),
            fields.age.as_str(),
            fields.live_volume.as_str(),
            fields.thlb_factor.as_str(),
            fields.area.as_str(),
        ],
        "field derivation",
    )?;

    df.lazy()
        .with_columns([
            ogma_flag(&fields.ogma_provider_id, ogma_rule),
            mature_flag(&fields.maturity_threshold, &fields.age),
            merchantability_flag(&fields.live_volume),
            area_ha(&fields.area),
        ])
        .with_columns([thlb_area_ha(&fields.thlb_factor)])
        .with_columns([live_volume_or_zero(&fields.live_volume)])
        .with_columns([thlb_volume_m3(&fields.live_volume)])
        .collect()
        .with_context(|| "Failed to populate derived fields")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ThlbError;
    use approx::assert_relative_eq;

    fn resultant() -> DataFrame {
        df![
            "NON_LEGAL_OGMA_PROVID" => &[None, Some("OGMA-3"), None],
            "MATURE_YRS" => &[Some(">100"), Some(">120"), Some(">120")],
            "PROJ_AGE_1" => &[Some(101.0), Some(200.0), Some(120.0)],
            "LIVE_STAND_VOLUME_125" => &[Some(101.0), None, Some(300.0)],
            "THLB_FACT" => &[Some(0.5), Some(1.0), Some(0.8)],
            "Shape_Area" => &[20_000.0, 10_000.0, 30_000.0],
        ]
        .unwrap()
    }

    #[test]
    fn test_derive_fields_row_by_row() {
        let df = derive_fields(resultant(), &FieldNames::default(), OgmaRule::Present).unwrap();

        let text = |name: &str| -> Vec<String> {
            df.column(name)
                .unwrap()
                .str()
                .unwrap()
                .into_iter()
                .map(|v| v.unwrap().to_string())
                .collect()
        };
        assert_eq!(text(OGMA), vec!["N", "Y", "N"]);
        assert_eq!(text(MATURE), vec!["Y", "Y", "N"]);
        assert_eq!(text(MERCHANTABILITY), vec!["Y", "N", "Y"]);

        let area = df.column(AREA_HA).unwrap().f64().unwrap();
        let thlb_area = df.column(THLB_AREA_HA).unwrap().f64().unwrap();
        let thlb_volume = df.column(THLB_VOLUME_M3).unwrap().f64().unwrap();

        assert_relative_eq!(area.get(0).unwrap(), 2.0);
        assert_relative_eq!(thlb_area.get(0).unwrap(), 1.0);
        assert_relative_eq!(thlb_volume.get(0).unwrap(), 101.0);

        // Null volume: not merchantable, filled with 0, zero THLB volume
        assert_eq!(
            df.column("LIVE_STAND_VOLUME_125").unwrap().f64().unwrap().get(1),
            Some(0.0)
        );
        assert_eq!(thlb_volume.get(1), Some(0.0));

        assert_relative_eq!(thlb_area.get(2).unwrap(), 2.4, epsilon = 1e-12);
        assert_relative_eq!(thlb_volume.get(2).unwrap(), 720.0, epsilon = 1e-9);
    }

    #[test]
    fn test_existing_derived_columns_are_overwritten() {
        let mut df = resultant();
        df.with_column(Column::new(OGMA.into(), &["X", "X", "X"])).unwrap();

        let derived = derive_fields(df, &FieldNames::default(), OgmaRule::Present).unwrap();

        assert_eq!(
            derived.get_column_names().iter().filter(|n| n.as_str() == OGMA).count(),
            1
        );
        assert_eq!(derived.column(OGMA).unwrap().str().unwrap().get(0), Some("N"));
    }

    #[test]
    fn test_missing_source_field() {
        let df = resultant().drop("THLB_FACT").unwrap();

        let err = derive_fields(df, &FieldNames::default(), OgmaRule::Present).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ThlbError>(),
            Some(ThlbError::MissingField { field, .. }) if field == "THLB_FACT"
        ));
    }

    #[test]
    fn test_area_field_is_configurable() {
        let df = resultant()
            .lazy()
            .with_column(lit(40_000.0).alias("GEOMETRY_Area"))
            .collect()
            .unwrap();
        let fields = FieldNames {
            area: "GEOMETRY_Area".into(),
            ..FieldNames::default()
        };

        let derived = derive_fields(df, &fields, OgmaRule::Present).unwrap();
        assert_relative_eq!(derived.column(AREA_HA).unwrap().f64().unwrap().get(1).unwrap(), 4.0);
    }
}
