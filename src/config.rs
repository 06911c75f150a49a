//! Run configuration
//!
//! Two positional parameters (workspace, AOI) come from the command line.
//! Everything else has a built-in default that a JSON config file, then
//! CLI flags / environment variables, may override.

use crate::error::ThlbError;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// BC Albers
pub const DEFAULT_SPATIAL_REFERENCE: u32 = 3005;
pub const DEFAULT_OPERATING_AREA: &str = "BC Timber Sales - Kootenay";

/// Vegetation inventory, OGMA, licensee operating areas, THLB, BEC zones
pub const DEFAULT_SOURCES: &[&str] = &[
    "data/WHSE_FOREST_VEGETATION.VEG_COMP_LYR_R1_POLY.geojson",
    "data/WHSE_LAND_USE_PLANNING.RMP_OGMA_NON_LEGAL_ALL_SVW.geojson",
    "data/REG_LAND_AND_NATURAL_RESOURCE.FOREST_LICENSEE_OPER_SP.geojson",
    "data/THLB_TSA_TKO.geojson",
    "data/BEC_FTBO.geojson",
];

/// How the OGMA flag reads the provider id field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OgmaRule {
    /// "Y" when a provider id is present (non-null, non-empty)
    #[default]
    Present,
    /// "Y" unless the provider id is exactly the empty string
    Legacy,
}

impl std::fmt::Display for OgmaRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OgmaRule::Present => write!(f, "present"),
            OgmaRule::Legacy => write!(f, "legacy"),
        }
    }
}

/// Attribute names read from the resultant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    pub ogma_provider_id: String,
    pub maturity_threshold: String,
    pub age: String,
    pub live_volume: String,
    pub thlb_factor: String,
    /// Area of each resultant piece in map units², written by the union as
    /// `Shape_Area` (a geodatabase union names it `<shape field>_Area`)
    pub area: String,
    pub operating_area_name: String,
    pub tenure: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            ogma_provider_id: "NON_LEGAL_OGMA_PROVID".into(),
            maturity_threshold: "MATURE_YRS".into(),
            age: "PROJ_AGE_1".into(),
            live_volume: "LIVE_STAND_VOLUME_125".into(),
            thlb_factor: "THLB_FACT".into(),
            area: "Shape_Area".into(),
            operating_area_name: "LICENSEE_OPER_AREAS_NAME".into(),
            tenure: "LICENSEE_OPER_AREAS_TENURE".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceLayer {
    pub path: PathBuf,
    /// Defaults to the file stem
    #[serde(default)]
    pub name: Option<String>,
}

impl SourceLayer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: None,
        }
    }

    pub fn layer_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("layer")
                .to_string()
        })
    }
}

/// Fully resolved, validated configuration for one run
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub workspace: PathBuf,
    pub aoi: PathBuf,
    pub sources: Vec<SourceLayer>,
    pub output_dir: PathBuf,
    pub operating_area: String,
    pub ogma_rule: OgmaRule,
    pub spatial_reference: u32,
    pub fields: FieldNames,
    pub delete_identical: bool,
}

impl AnalysisConfig {
    /// Defaults for everything but the two required paths
    pub fn new(workspace: impl Into<PathBuf>, aoi: impl Into<PathBuf>) -> Self {
        let workspace = workspace.into();
        Self {
            output_dir: workspace.clone(),
            workspace,
            aoi: aoi.into(),
            sources: DEFAULT_SOURCES.iter().map(|p| SourceLayer::new(*p)).collect(),
            operating_area: DEFAULT_OPERATING_AREA.to_string(),
            ogma_rule: OgmaRule::default(),
            spatial_reference: DEFAULT_SPATIAL_REFERENCE,
            fields: FieldNames::default(),
            delete_identical: false,
        }
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            workspace,
            aoi,
            config,
            output_dir: cli_output_dir,
            operating_area: cli_operating_area,
            ogma_rule: cli_ogma_rule,
            delete_identical: cli_delete_identical,
        } = args;

        let file_config = match config.as_ref() {
            Some(path) => load_config_file(path)?,
            None => PartialConfig::default(),
        };

        let PartialConfig {
            sources: file_sources,
            output_dir: file_output_dir,
            operating_area: file_operating_area,
            ogma_rule: file_ogma_rule,
            spatial_reference: file_spatial_reference,
            fields: file_fields,
            area_field: file_area_field,
            delete_identical: file_delete_identical,
        } = file_config;

        let mut resolved = AnalysisConfig::new(workspace, aoi);

        if let Some(sources) = file_sources {
            resolved.sources = sources;
        }
        if let Some(dir) = cli_output_dir.or(file_output_dir) {
            resolved.output_dir = dir;
        }
        if let Some(name) = cli_operating_area.or(file_operating_area) {
            resolved.operating_area = name;
        }
        if let Some(rule) = cli_ogma_rule.or(file_ogma_rule) {
            resolved.ogma_rule = rule;
        }
        if let Some(code) = file_spatial_reference {
            resolved.spatial_reference = code;
        }
        if let Some(fields) = file_fields {
            resolved.fields = fields;
        }
        if let Some(area) = file_area_field {
            resolved.fields.area = area;
        }
        resolved.delete_identical = cli_delete_identical || file_delete_identical.unwrap_or(false);

        resolved.validate()?;
        Ok(resolved)
    }

    /// Check inputs before any geoprocessing starts
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(ThlbError::NoSources.into());
        }
        anyhow::ensure!(self.aoi.is_file(), "AOI {:?} does not exist or is not a file", self.aoi);
        for source in &self.sources {
            anyhow::ensure!(
                source.path.is_file(),
                "source layer {:?} does not exist or is not a file",
                source.path
            );
        }
        anyhow::ensure!(
            !self.workspace.is_file(),
            "workspace {:?} is a file, expected a directory",
            self.workspace
        );
        anyhow::ensure!(
            !self.operating_area.trim().is_empty(),
            "operating area name must not be empty"
        );
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "thlb_analysis",
    about = "Timber harvesting land base area and volume metrics for an area of interest",
    version
)]
pub struct CliArgs {
    /// Workspace directory for clipped inputs, the resultant and summary tables
    #[arg(value_name = "WORKSPACE")]
    pub workspace: PathBuf,

    /// AOI boundary (GeoJSON FeatureCollection)
    #[arg(value_name = "AOI")]
    pub aoi: PathBuf,

    #[arg(long, value_name = "FILE", help = "Path to a JSON configuration file")]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "THLB_OUTPUT_DIR",
        value_name = "DIR",
        help = "Directory for the spreadsheet exports (defaults to the workspace)"
    )]
    pub output_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "THLB_OPERATING_AREA",
        value_name = "NAME",
        help = "Operating area whose tenures are summarized separately"
    )]
    pub operating_area: Option<String>,

    #[arg(
        long,
        env = "THLB_OGMA_RULE",
        value_enum,
        value_name = "RULE",
        help = "How the OGMA flag reads the provider id field"
    )]
    pub ogma_rule: Option<OgmaRule>,

    #[arg(
        long,
        env = "THLB_DELETE_IDENTICAL",
        help = "Delete resultant polygons whose geometry duplicates an earlier one"
    )]
    pub delete_identical: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    sources: Option<Vec<SourceLayer>>,
    output_dir: Option<PathBuf>,
    operating_area: Option<String>,
    ogma_rule: Option<OgmaRule>,
    spatial_reference: Option<u32>,
    fields: Option<FieldNames>,
    area_field: Option<String>,
    delete_identical: Option<bool>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse JSON config {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, "{}").unwrap();
        path
    }

    fn args(dir: &TempDir, aoi: PathBuf) -> CliArgs {
        CliArgs {
            workspace: dir.path().join("work"),
            aoi,
            config: None,
            output_dir: None,
            operating_area: None,
            ogma_rule: None,
            delete_identical: false,
        }
    }

    #[test]
    fn test_defaults_follow_workspace() {
        let config = AnalysisConfig::new("/tmp/work", "/tmp/aoi.geojson");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/work"));
        assert_eq!(config.sources.len(), 5);
        assert_eq!(config.sources[3].layer_name(), "THLB_TSA_TKO");
        assert_eq!(config.spatial_reference, 3005);
        assert_eq!(config.ogma_rule, OgmaRule::Present);
        assert_eq!(config.fields.live_volume, "LIVE_STAND_VOLUME_125");
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = TempDir::new().unwrap();
        let aoi = touch(&dir, "aoi.geojson");
        let vri = touch(&dir, "vri.geojson");
        let config_path = dir.path().join("thlb.json");
        fs::write(
            &config_path,
            serde_json::json!({
                "sources": [{"path": vri, "name": "VRI"}],
                "operating_area": "From File",
                "ogma_rule": "legacy",
                "area_field": "GEOMETRY_Area",
                "spatial_reference": 26911
            })
            .to_string(),
        )
        .unwrap();

        let mut cli = args(&dir, aoi);
        cli.config = Some(config_path);
        cli.operating_area = Some("From CLI".into());

        let config = AnalysisConfig::from_args(cli).unwrap();
        assert_eq!(config.operating_area, "From CLI");
        assert_eq!(config.ogma_rule, OgmaRule::Legacy);
        assert_eq!(config.fields.area, "GEOMETRY_Area");
        assert_eq!(config.fields.age, "PROJ_AGE_1");
        assert_eq!(config.spatial_reference, 26911);
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].layer_name(), "VRI");
    }

    #[test]
    fn test_missing_source_fails_validation() {
        let dir = TempDir::new().unwrap();
        let aoi = touch(&dir, "aoi.geojson");

        // Built-in source paths are relative and absent here
        let err = AnalysisConfig::from_args(args(&dir, aoi)).unwrap_err();
        assert!(err.to_string().contains("source layer"));
    }

    #[test]
    fn test_empty_sources_is_typed_error() {
        let mut config = AnalysisConfig::new("/tmp/work", "/tmp/aoi.geojson");
        config.sources.clear();
        let err = config.validate().unwrap_err();
        assert!(matches!(err.downcast_ref::<ThlbError>(), Some(ThlbError::NoSources)));
    }

    #[test]
    fn test_parse_command_line() {
        let args = CliArgs::try_parse_from([
            "thlb_analysis",
            "work",
            "aoi.geojson",
            "--ogma-rule",
            "legacy",
            "--delete-identical",
            "--output-dir",
            "exports",
        ])
        .unwrap();

        assert_eq!(args.workspace, PathBuf::from("work"));
        assert_eq!(args.aoi, PathBuf::from("aoi.geojson"));
        assert_eq!(args.ogma_rule, Some(OgmaRule::Legacy));
        assert!(args.delete_identical);
        assert_eq!(args.output_dir, Some(PathBuf::from("exports")));

        assert!(CliArgs::try_parse_from(["thlb_analysis", "work", "aoi.geojson", "--ogma-rule", "blank"]).is_err());
        assert!(CliArgs::try_parse_from(["thlb_analysis", "work"]).is_err());
    }

    #[test]
    fn test_operating_area_from_environment() {
        std::env::set_var("THLB_OPERATING_AREA", "BC Timber Sales - Chinook");
        let from_env = CliArgs::try_parse_from(["thlb_analysis", "work", "aoi.geojson"]);
        let from_flag = CliArgs::try_parse_from([
            "thlb_analysis",
            "work",
            "aoi.geojson",
            "--operating-area",
            "Canfor",
        ]);
        std::env::remove_var("THLB_OPERATING_AREA");

        assert_eq!(
            from_env.unwrap().operating_area.as_deref(),
            Some("BC Timber Sales - Chinook")
        );
        assert_eq!(from_flag.unwrap().operating_area.as_deref(), Some("Canfor"));
    }

    #[test]
    fn test_unknown_config_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"operating_areas": "typo"}"#).unwrap();
        assert!(load_config_file(&path).is_err());
    }
}
