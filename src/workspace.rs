//! Scratch Workspace
//!
//! Directory holding everything one run produces:
//!
//! ```text
//! <workspace>/
//!   inputs/                           clipped layers + dataset.json
//!   thlb_analysis_resultant.geojson   union resultant with derived fields
//!   AllStats.csv, BCTSStats.csv       summary tables
//! ```
//!
//! The `inputs` dataset records its spatial reference and member layers in
//! `dataset.json`; listing reads that manifest, so files left over from a
//! previous run are never picked up by the union.

use crate::layer::Layer;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const INPUTS_DATASET: &str = "inputs";
const MANIFEST_FILE: &str = "dataset.json";
const RESULTANT_NAME: &str = "thlb_analysis_resultant";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub name: String,
    pub spatial_reference: u32,
    /// File names inside the dataset, in the order they were added
    pub layers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    spatial_reference: u32,
}

impl Workspace {
    /// Create (or reset) the workspace and its empty `inputs` dataset
    pub fn create(root: &Path, spatial_reference: u32) -> Result<Self> {
        let workspace = Self {
            root: root.to_path_buf(),
            spatial_reference,
        };
        fs::create_dir_all(workspace.inputs_dir())
            .with_context(|| format!("Failed to create workspace {:?}", root))?;

        workspace.write_manifest(&DatasetManifest {
            name: INPUTS_DATASET.to_string(),
            spatial_reference,
            layers: Vec::new(),
        })?;
        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn spatial_reference(&self) -> u32 {
        self.spatial_reference
    }

    pub fn inputs_dir(&self) -> PathBuf {
        self.root.join(INPUTS_DATASET)
    }

    pub fn resultant_path(&self) -> PathBuf {
        self.root.join(format!("{}.geojson", RESULTANT_NAME))
    }

    pub fn resultant_name(&self) -> &'static str {
        RESULTANT_NAME
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{}.csv", table))
    }

    /// Write a clipped layer into the `inputs` dataset
    pub fn add_input(&self, layer: &Layer) -> Result<PathBuf> {
        let file_name = format!("{}.geojson", layer.name);
        let path = self.inputs_dir().join(&file_name);
        layer.write_geojson(&path, Some(self.spatial_reference))?;

        let mut manifest = self.read_manifest()?;
        manifest.layers.retain(|existing| existing != &file_name);
        manifest.layers.push(file_name);
        self.write_manifest(&manifest)?;

        debug!("Added {:?} to {} dataset", path, INPUTS_DATASET);
        Ok(path)
    }

    pub fn list_inputs(&self) -> Result<Vec<PathBuf>> {
        let manifest = self.read_manifest()?;
        Ok(manifest
            .layers
            .iter()
            .map(|name| self.inputs_dir().join(name))
            .collect())
    }

    pub fn read_inputs(&self) -> Result<Vec<Layer>> {
        self.list_inputs()?
            .iter()
            .map(|path| Layer::read_geojson(path))
            .collect()
    }

    pub fn write_resultant(&self, layer: &Layer) -> Result<PathBuf> {
        let path = self.resultant_path();
        layer.write_geojson(&path, Some(self.spatial_reference))?;
        Ok(path)
    }

    pub fn read_manifest(&self) -> Result<DatasetManifest> {
        let path = self.inputs_dir().join(MANIFEST_FILE);
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read dataset manifest {:?}", path))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse dataset manifest {:?}", path))
    }

    fn write_manifest(&self, manifest: &DatasetManifest) -> Result<()> {
        let path = self.inputs_dir().join(MANIFEST_FILE);
        let contents = serde_json::to_string_pretty(manifest)?;
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write dataset manifest {:?}", path))
    }
}
