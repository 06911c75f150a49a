//! Classification flags: OGMA, MATURE, MERCHANTABILITY
//!
//! Each flag is a `"Y"`/`"N"` text column. A comparison against a null value
//! counts as false, so missing inputs yield `"N"` (except the legacy OGMA
//! rule, which only says `"N"` for an empty string).

use super::{MATURE, MERCHANTABILITY, OGMA};
use crate::config::OgmaRule;
use polars::prelude::*;

/// Minimum live stand volume (m³) for a merchantable stand, exclusive
pub const MERCHANTABLE_VOLUME: f64 = 100.0;

/// Maturity threshold codes and the age (years) each requires, exclusive
pub const MATURITY_THRESHOLDS: [(&str, f64); 2] = [(">100", 100.0), (">120", 120.0)];

fn yes_no(condition: Expr) -> Expr {
    when(condition.fill_null(lit(false)))
        .then(lit("Y"))
        .otherwise(lit("N"))
}

/// OGMA flag from the provider id field
pub fn ogma_flag(provider_id: &str, rule: OgmaRule) -> Expr {
    let id = col(provider_id).cast(DataType::String);
    let in_ogma = match rule {
        OgmaRule::Present => id.clone().is_not_null().and(id.neq(lit(""))),
        OgmaRule::Legacy => id.eq(lit("")).fill_null(lit(false)).not(),
    };
    yes_no(in_ogma).alias(OGMA)
}

/// MATURE flag: stand age beyond the threshold its maturity code names
pub fn mature_flag(threshold: &str, age: &str) -> Expr {
    let mature = MATURITY_THRESHOLDS
        .iter()
        .map(|&(code, years)| {
            col(threshold)
                .cast(DataType::String)
                .eq(lit(code))
                .and(col(age).cast(DataType::Float64).gt(lit(years)))
                .fill_null(lit(false))
        })
        .reduce(|a, b| a.or(b))
        .unwrap_or_else(|| lit(false));
    yes_no(mature).alias(MATURE)
}

/// MERCHANTABILITY flag from live stand volume
pub fn merchantability_flag(live_volume: &str) -> Expr {
    yes_no(
        col(live_volume)
            .cast(DataType::Float64)
            .gt(lit(MERCHANTABLE_VOLUME)),
    )
    .alias(MERCHANTABILITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(df: DataFrame, expr: Expr, name: &str) -> Vec<String> {
        df.lazy()
            .select([expr])
            .collect()
            .unwrap()
            .column(name)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap_or("<null>").to_string())
            .collect()
    }

    #[test]
    fn test_mature_boundaries() {
        let df = df![
            "MATURE_YRS" => &[Some(">100"), Some(">100"), Some(">120"), Some(">120"), Some(">120"), None],
            "PROJ_AGE_1" => &[Some(101.0), Some(100.0), Some(121.0), Some(120.0), Some(110.0), Some(300.0)],
        ]
        .unwrap();

        assert_eq!(
            flags(df, mature_flag("MATURE_YRS", "PROJ_AGE_1"), MATURE),
            vec!["Y", "N", "Y", "N", "N", "N"]
        );
    }

    #[test]
    fn test_mature_null_age_is_not_mature() {
        let df = df![
            "MATURE_YRS" => &[">100"],
            "PROJ_AGE_1" => &[None::<f64>],
        ]
        .unwrap();

        assert_eq!(flags(df, mature_flag("MATURE_YRS", "PROJ_AGE_1"), MATURE), vec!["N"]);
    }

    #[test]
    fn test_merchantability_boundary() {
        let df = df!["LIVE_STAND_VOLUME_125" => &[Some(100.0), Some(101.0), Some(100.5), None]].unwrap();

        assert_eq!(
            flags(df, merchantability_flag("LIVE_STAND_VOLUME_125"), MERCHANTABILITY),
            vec!["N", "Y", "Y", "N"]
        );
    }

    #[test]
    fn test_ogma_present_rule() {
        let df = df!["NON_LEGAL_OGMA_PROVID" => &[Some("OGMA-17"), Some(""), None]].unwrap();

        assert_eq!(
            flags(df, ogma_flag("NON_LEGAL_OGMA_PROVID", OgmaRule::Present), OGMA),
            vec!["Y", "N", "N"]
        );
    }

    #[test]
    fn test_ogma_legacy_rule_flags_null() {
        let df = df!["NON_LEGAL_OGMA_PROVID" => &[Some("OGMA-17"), Some(""), None]].unwrap();

        assert_eq!(
            flags(df, ogma_flag("NON_LEGAL_OGMA_PROVID", OgmaRule::Legacy), OGMA),
            vec!["Y", "N", "Y"]
        );
    }

    #[test]
    fn test_numeric_provider_id_counts_as_present() {
        let df = df!["NON_LEGAL_OGMA_PROVID" => &[Some(42.0), None]].unwrap();

        assert_eq!(
            flags(df, ogma_flag("NON_LEGAL_OGMA_PROVID", OgmaRule::Present), OGMA),
            vec!["Y", "N"]
        );
    }
}
