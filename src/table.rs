//! Attribute table conversion
//!
//! Moves a layer's attributes into a Polars `DataFrame` (one row per
//! feature, in feature order) and back. Text fields become `String`
//! columns, number fields `Float64`.

use crate::error::ThlbError;
use crate::layer::{AttrValue, Feature, Field, FieldKind, Layer};
use anyhow::{Context, Result};
use polars::prelude::*;

/// Attribute table of `layer` as a DataFrame
pub fn layer_to_frame(layer: &Layer) -> Result<DataFrame> {
    let columns: Vec<Column> = layer
        .fields
        .iter()
        .enumerate()
        .map(|(idx, field)| match field.kind {
            FieldKind::Text => {
                let values: Vec<Option<String>> = layer
                    .features
                    .iter()
                    .map(|f| f.attributes[idx].as_text().map(str::to_string))
                    .collect();
                Column::new(field.name.as_str().into(), values)
            }
            FieldKind::Number => {
                let values: Vec<Option<f64>> = layer
                    .features
                    .iter()
                    .map(|f| f.attributes[idx].as_number())
                    .collect();
                Column::new(field.name.as_str().into(), values)
            }
        })
        .collect();

    DataFrame::new(columns)
        .with_context(|| format!("Failed to build attribute table for {}", layer.name))
}

/// Copy of `layer` whose attributes are replaced by the rows of `df`
///
/// The schema follows `df`, so columns added by field derivation appear on
/// the features.
pub fn frame_to_layer(layer: &Layer, df: &DataFrame) -> Result<Layer> {
    anyhow::ensure!(
        df.height() == layer.len(),
        "{}: attribute table has {} rows for {} features",
        layer.name,
        df.height(),
        layer.len()
    );

    let fields: Vec<Field> = df
        .get_columns()
        .iter()
        .map(|column| Field::new(column.name().to_string(), kind_of(column.dtype())))
        .collect();

    let mut features: Vec<Feature> = layer
        .features
        .iter()
        .map(|f| Feature {
            geometry: f.geometry.clone(),
            attributes: Vec::with_capacity(fields.len()),
        })
        .collect();

    for (column, field) in df.get_columns().iter().zip(&fields) {
        for (row, feature) in features.iter_mut().enumerate() {
            let value = column
                .get(row)
                .with_context(|| format!("Failed to read {}[{}]", field.name, row))?;
            feature.attributes.push(to_attr(value).coerce(field.kind));
        }
    }

    let mut output = Layer::new(layer.name.clone(), fields);
    output.features = features;
    Ok(output)
}

fn kind_of(dtype: &DataType) -> FieldKind {
    match dtype {
        DataType::Float64
        | DataType::Float32
        | DataType::Int64
        | DataType::Int32
        | DataType::Int16
        | DataType::Int8
        | DataType::UInt64
        | DataType::UInt32
        | DataType::UInt16
        | DataType::UInt8 => FieldKind::Number,
        _ => FieldKind::Text,
    }
}

fn to_attr(value: AnyValue) -> AttrValue {
    match value {
        AnyValue::Null => AttrValue::Null,
        AnyValue::String(s) => AttrValue::Text(s.to_string()),
        AnyValue::StringOwned(s) => AttrValue::Text(s.to_string()),
        AnyValue::Boolean(b) => AttrValue::Text(b.to_string()),
        other => match other.extract::<f64>() {
            Some(n) => AttrValue::Number(n),
            None => AttrValue::Text(other.to_string()),
        },
    }
}

/// Fail with `ThlbError::MissingField` unless every column is present
pub fn require_columns(df: &DataFrame, columns: &[&str], context: &str) -> Result<()> {
    let available: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    for &expected in columns {
        if !available.iter().any(|name| name == expected) {
            return Err(ThlbError::MissingField {
                context: context.to_string(),
                field: expected.to_string(),
                available,
            }
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn layer() -> Layer {
        let mut layer = Layer::new(
            "resultant",
            vec![
                Field::new("ZONE", FieldKind::Text),
                Field::new("PROJ_AGE_1", FieldKind::Number),
            ],
        );
        for (zone, age) in [(Some("ICH"), Some(130.0)), (None, None)] {
            layer.features.push(Feature {
                geometry: MultiPolygon::new(vec![polygon![
                    (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0),
                ]]),
                attributes: vec![
                    zone.map_or(AttrValue::Null, |z| AttrValue::Text(z.into())),
                    age.map_or(AttrValue::Null, AttrValue::Number),
                ],
            });
        }
        layer
    }

    #[test]
    fn test_layer_to_frame_types_and_nulls() {
        let df = layer_to_frame(&layer()).unwrap();

        assert_eq!(df.shape(), (2, 2));
        assert_eq!(df.column("ZONE").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("PROJ_AGE_1").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("ZONE").unwrap().null_count(), 1);
    }

    #[test]
    fn test_frame_to_layer_adds_new_columns() {
        let source = layer();
        let df = layer_to_frame(&source)
            .unwrap()
            .lazy()
            .with_column(lit("Y").alias("MATURE"))
            .collect()
            .unwrap();

        let updated = frame_to_layer(&source, &df).unwrap();

        assert_eq!(updated.field_names(), vec!["ZONE", "PROJ_AGE_1", "MATURE"]);
        assert_eq!(updated.value(1, "MATURE"), Some(&AttrValue::Text("Y".into())));
        assert_eq!(updated.value(0, "PROJ_AGE_1"), Some(&AttrValue::Number(130.0)));
        assert_eq!(updated.value(1, "ZONE"), Some(&AttrValue::Null));
    }

    #[test]
    fn test_frame_to_layer_rejects_row_mismatch() {
        let df = df!["ZONE" => &["ICH"]].unwrap();
        assert!(frame_to_layer(&layer(), &df).is_err());
    }

    #[test]
    fn test_require_columns_reports_missing_field() {
        let df = df!["PROJ_AGE_1" => &[1.0]].unwrap();

        assert!(require_columns(&df, &["PROJ_AGE_1"], "test").is_ok());

        let err = require_columns(&df, &["PROJ_AGE_1", "MATURE_YRS"], "test").unwrap_err();
        match err.downcast_ref::<ThlbError>() {
            Some(ThlbError::MissingField { field, .. }) => assert_eq!(field, "MATURE_YRS"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
