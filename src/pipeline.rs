//! THLB Analysis - main coordinator
//!
//! Runs the five stages in order, each finishing before the next starts:
//!
//! 1. Clip every source layer to the AOI into the workspace `inputs` dataset
//! 2. Union the clipped layers into the resultant
//! 3. Populate the derived fields
//! 4. Summary statistics by operating area and by tenure
//! 5. Export both summaries to spreadsheets
//!
//! Any failure aborts the run; outputs already written are left in place.

use crate::config::AnalysisConfig;
use crate::error::ThlbError;
use crate::export::{write_csv, write_xlsx};
use crate::geoprocessing::{clip_layer, delete_identical, dissolve, drop_empty, union_layers};
use crate::layer::Layer;
use crate::rules::{derive_fields, DERIVED_FIELDS};
use crate::summary::{all_licensees, operating_area_tenures, ALL_STATS, BCTS_STATS};
use crate::table::{frame_to_layer, layer_to_frame};
use crate::workspace::Workspace;
use anyhow::{Context, Result};
use geo::{Area, MultiPolygon};
use polars::prelude::DataFrame;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// What one run produced
#[derive(Debug)]
pub struct RunReport {
    /// Clipped layer name and feature count, in source order
    pub clipped: Vec<(String, usize)>,
    pub resultant_path: PathBuf,
    pub resultant_features: usize,
    pub all_stats: DataFrame,
    pub bcts_stats: DataFrame,
    /// Spreadsheet files written
    pub exports: Vec<PathBuf>,
}

pub struct ThlbAnalysis {
    config: AnalysisConfig,
}

impl ThlbAnalysis {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn run(&self) -> Result<RunReport> {
        let config = &self.config;
        let workspace = Workspace::create(&config.workspace, config.spatial_reference)?;

        let clipped = self.clip_inputs(&workspace)?;
        let resultant = self.build_resultant(&workspace)?;
        let (resultant, table) = self.populate_fields(resultant)?;
        let resultant_path = workspace.write_resultant(&resultant)?;

        let (all_stats, bcts_stats) = self.summarize(&workspace, &table)?;
        let exports = self.export(&all_stats, &bcts_stats)?;

        info!("THLB analysis completed successfully");
        Ok(RunReport {
            clipped,
            resultant_path,
            resultant_features: resultant.len(),
            all_stats,
            bcts_stats,
            exports,
        })
    }

    /// Stage 1: clip each source to the dissolved AOI boundary
    fn clip_inputs(&self, workspace: &Workspace) -> Result<Vec<(String, usize)>> {
        let config = &self.config;
        let aoi = Layer::read_geojson(&config.aoi)
            .with_context(|| format!("Failed to load AOI {:?}", config.aoi))?;
        let boundary = aoi_boundary(&aoi, config)?;
        info!("AOI {} ({:.1} ha)", aoi.name, boundary.unsigned_area() / 10_000.0);

        let mut clipped = Vec::with_capacity(config.sources.len());
        for source in &config.sources {
            let name = source.layer_name();
            info!("Preparing input layers. Clipping {}", name);

            let layer = Layer::read_geojson_named(&source.path, &name)
                .with_context(|| format!("Failed to load source layer {:?}", source.path))?;
            let output = clip_layer(&layer, &boundary, &format!("{}_{}", aoi.name, name));
            debug!("{}: {} of {} features inside the AOI", name, output.len(), layer.len());

            workspace.add_input(&output)?;
            clipped.push((output.name.clone(), output.len()));
        }
        Ok(clipped)
    }

    /// Stage 2: union every layer of the `inputs` dataset
    fn build_resultant(&self, workspace: &Workspace) -> Result<Layer> {
        info!("Creating the THLB analysis resultant... spatial overlay (union) in progress");
        let inputs = workspace.read_inputs()?;
        let mut resultant = union_layers(&inputs, workspace.resultant_name());

        let empty = drop_empty(&mut resultant);
        if empty > 0 {
            info!("Removed {} empty or sliver polygons", empty);
        }
        if self.config.delete_identical {
            let identical = delete_identical(&mut resultant);
            info!("Deleted {} polygons with identical geometry", identical);
        }

        info!("Resultant has {} polygons", resultant.len());
        Ok(resultant)
    }

    /// Stage 3: derived fields, returned both on the features and as a table
    fn populate_fields(&self, resultant: Layer) -> Result<(Layer, DataFrame)> {
        for field in DERIVED_FIELDS {
            if resultant.field_index(field).is_none() {
                info!("Adding field {}", field);
            }
        }

        info!("Populating new fields... in progress");
        let table = layer_to_frame(&resultant)?;
        let table = derive_fields(table, &self.config.fields, self.config.ogma_rule)?;
        let resultant = frame_to_layer(&resultant, &table)?;
        info!("New fields populated");

        Ok((resultant, table))
    }

    /// Stage 4: both summary tables, also saved as CSV in the workspace
    fn summarize(&self, workspace: &Workspace, table: &DataFrame) -> Result<(DataFrame, DataFrame)> {
        info!("Computing summary statistics");
        let config = &self.config;

        let all_stats = all_licensees(table, &config.fields)?;
        write_csv(&all_stats, &workspace.table_path(ALL_STATS))?;
        info!("Created summary statistics for all licensees ({} groups)", all_stats.height());

        let bcts_stats = operating_area_tenures(table, &config.fields, &config.operating_area)?;
        write_csv(&bcts_stats, &workspace.table_path(BCTS_STATS))?;
        info!(
            "Created summary statistics for {} ({} tenures)",
            config.operating_area,
            bcts_stats.height()
        );

        Ok((all_stats, bcts_stats))
    }

    /// Stage 5: spreadsheets into the output directory
    fn export(&self, all_stats: &DataFrame, bcts_stats: &DataFrame) -> Result<Vec<PathBuf>> {
        let output_dir = &self.config.output_dir;
        fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;

        let mut exports = Vec::with_capacity(2);
        for (name, df) in [(ALL_STATS, all_stats), (BCTS_STATS, bcts_stats)] {
            let path = output_dir.join(format!("{}.xlsx", name));
            write_xlsx(df, &path, name)?;
            info!("Converted {} to Excel: {:?}", name, path);
            exports.push(path);
        }
        Ok(exports)
    }
}

fn aoi_boundary(aoi: &Layer, config: &AnalysisConfig) -> Result<MultiPolygon<f64>> {
    let boundary = dissolve(aoi);
    if boundary.unsigned_area() <= 0.0 {
        return Err(ThlbError::EmptyAoi(config.aoi.clone()).into());
    }
    Ok(boundary)
}
